// src/events.rs

//! Outbound events and the sinks that deliver them to the host.
//!
//! The core never renders anything. Notifications, badge updates and
//! broadcasts are emitted as plain data and a host decides how to show them.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::TabId;
use crate::services::EmissionLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    HighEmissionPage,
    DailyLimitExceeded,
    LevelUp,
    BadgeEarned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn high_emission_page(grams: f64, threshold: f64) -> Self {
        Self {
            kind: NotificationKind::HighEmissionPage,
            title: "High Emission Page".to_string(),
            message: format!(
                "This page emitted {:.2}g CO2e (threshold: {}g)",
                grams, threshold
            ),
        }
    }

    pub fn daily_limit_exceeded(daily_grams: f64) -> Self {
        Self {
            kind: NotificationKind::DailyLimitExceeded,
            title: "Daily Emission Limit Exceeded".to_string(),
            message: format!("Today's emissions: {:.2}g CO2e", daily_grams),
        }
    }

    pub fn level_up(level: u64) -> Self {
        Self {
            kind: NotificationKind::LevelUp,
            title: "Level Up!".to_string(),
            message: format!("You've reached level {}!", level),
        }
    }

    pub fn eco_warrior_badge() -> Self {
        Self {
            kind: NotificationKind::BadgeEarned,
            title: "Badge Earned!".to_string(),
            message: "You earned the Eco Warrior badge!".to_string(),
        }
    }
}

/// Per-tab badge shown next to the extension icon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeUpdate {
    pub tab_id: TabId,
    pub text: String,
    pub color: String,
}

impl BadgeUpdate {
    /// One decimal below a gram, whole grams otherwise.
    pub fn for_emissions(tab_id: TabId, grams: f64) -> Self {
        let text = if grams < 1.0 {
            format!("{:.1}g", grams)
        } else {
            format!("{}g", grams.round())
        };
        Self {
            tab_id,
            text,
            color: EmissionLevel::from_grams(grams).color().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Broadcast {
    SettingsUpdated,
}

/// Everything the core sends back to its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundEvent {
    Notification(Notification),
    Badge(BadgeUpdate),
    Broadcast { message: Broadcast },
}

impl From<Notification> for OutboundEvent {
    fn from(notification: Notification) -> Self {
        OutboundEvent::Notification(notification)
    }
}

impl From<BadgeUpdate> for OutboundEvent {
    fn from(badge: BadgeUpdate) -> Self {
        OutboundEvent::Badge(badge)
    }
}

impl From<Broadcast> for OutboundEvent {
    fn from(message: Broadcast) -> Self {
        OutboundEvent::Broadcast { message }
    }
}

/// Destination for outbound events.
///
/// Emitting never fails the caller; a sink that cannot deliver logs it.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: OutboundEvent);
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: OutboundEvent) {
        match event {
            OutboundEvent::Notification(n) => log::info!("[{}] {}", n.title, n.message),
            OutboundEvent::Badge(b) => {
                log::debug!("Badge for tab {}: {} ({})", b.tab_id, b.text, b.color)
            }
            OutboundEvent::Broadcast { message } => log::debug!("Broadcast: {:?}", message),
        }
    }
}

/// Forwards events to an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        Self { tx }
    }

    /// A sink together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: OutboundEvent) {
        if let Err(e) = self.tx.send(event) {
            log::warn!("Event receiver dropped, discarding {:?}", e.0);
        }
    }
}
