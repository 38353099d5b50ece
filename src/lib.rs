// src/lib.rs

//! LeafByte core library.
//!
//! Estimates the carbon emissions of web browsing from the bytes a page
//! transfers, keeps per-site and global totals in a key-value store, and
//! emits notification, badge and gamification events for a host to render.

pub mod error;
pub mod events;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod tracker;
pub mod utils;

pub use tracker::{ExportDocument, HostCapabilities, Tracker};
