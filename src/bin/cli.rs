//! LeafByte CLI
//!
//! Local front end over a file-backed store: replay recorded page loads,
//! fire reset alarms, print reports and manage settings.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use leafbyte::{
    Tracker,
    error::{AppError, Result},
    events::LogSink,
    models::{Config, NetworkType, REGION_INTENSITY},
    pipeline,
    services::{EmissionLevel, SiteQuery, SiteSort},
    storage::LocalStore,
    utils::log as console,
};

/// LeafByte - carbon footprint of web browsing
#[derive(Parser, Debug)]
#[command(
    name = "leafbyte",
    version,
    about = "Estimate the carbon emissions of web browsing"
)]
struct Cli {
    /// Path to storage directory containing config and data files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write default config, settings and statistics
    Init {
        /// Overwrite existing statistics and gamification state
        #[arg(long)]
        force: bool,
    },

    /// Replay a JSON array of recorded page loads
    Replay {
        /// Path to the page load file
        file: PathBuf,
    },

    /// Fire a reset alarm (dailyReset, weeklyReset, monthlyReset)
    Alarm { name: String },

    /// Print statistics, goals and sites
    Report {
        /// Site order: emissions, visits or alphabetical
        #[arg(long, default_value = "emissions")]
        sort: SiteSort,

        /// Only show sites of this impact level: low, medium or high
        #[arg(long)]
        level: Option<EmissionLevel>,

        /// Maximum number of sites to show
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Export all data as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete all site data and reset statistics (settings are kept)
    Clear,

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Validate configuration and stored settings
    Validate,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print current settings
    Show,

    /// Switch region and its carbon intensity
    Region { code: String },

    /// Set the network type: wifi, ethernet, 4g, 5g or 3g
    Network { kind: NetworkType },

    /// Restore default settings
    Reset,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    console::init(if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    });

    log::debug!("Loaded configuration from {}", config_path.display());

    let store_path = cli.storage_dir.join(&config.store.file_name);
    let store = Arc::new(LocalStore::open_file(&store_path).await?);
    let tracker = Arc::new(Tracker::new(store, Arc::new(LogSink), config.clone()));

    match cli.command {
        Command::Init { force } => {
            if !config_path.exists() {
                std::fs::create_dir_all(&cli.storage_dir)?;
                config.save(&config_path)?;
                log::info!("Config written to {}", config_path.display());
            }

            if tracker.is_installed().await? && !force {
                log::warn!(
                    "Store already initialized at {}. Use --force to overwrite.",
                    store_path.display()
                );
                return Ok(());
            }
            tracker.install().await?;
            console::success(&format!("Initialized {}", store_path.display()));
        }

        Command::Replay { file } => {
            if !file.exists() {
                log::error!("Page load file not found at {}", file.display());
                return Err(AppError::config("Page load file not found"));
            }
            if !tracker.is_installed().await? {
                tracker.install().await?;
            }
            pipeline::run_replay(Arc::clone(&tracker), &file).await?;
        }

        Command::Alarm { name } => {
            let stats = tracker.handle_alarm(&name).await?;
            console::success(&format!(
                "{} applied (daily {:.2} g, weekly {:.2} g, monthly {:.2} g)",
                name,
                stats.daily_emissions_grams,
                stats.weekly_emissions_grams,
                stats.monthly_emissions_grams
            ));
        }

        Command::Report { sort, level, limit } => {
            let query = SiteQuery { level, sort, limit };
            pipeline::run_report(&tracker, &query).await?;
        }

        Command::Export { output } => {
            pipeline::run_export(&tracker, output.as_deref()).await?;
        }

        Command::Clear => {
            tracker.clear_data().await?;
            console::success("All site data and statistics cleared");
        }

        Command::Settings { action } => {
            let settings = match action {
                SettingsAction::Show => tracker.settings().await?,
                SettingsAction::Region { code } => tracker.set_region(&code).await?,
                SettingsAction::Network { kind } => tracker.set_network_type(kind).await?,
                SettingsAction::Reset => tracker.reset_settings().await?,
            };

            console::summary(
                "Settings",
                &[
                    ("Region", settings.region.clone()),
                    (
                        "Carbon intensity",
                        format!("{} gCO2/kWh", settings.carbon_intensity_factor),
                    ),
                    ("Network", settings.network_type.to_string()),
                    ("Device factor", format!("{}", settings.device_factor)),
                    ("Page threshold", format!("{} g", settings.thresholds.page)),
                    ("Daily threshold", format!("{} g", settings.thresholds.daily)),
                    ("Weekly threshold", format!("{} g", settings.thresholds.weekly)),
                    ("Notifications", settings.notifications_enabled.to_string()),
                    ("Gamification", settings.gamification_enabled.to_string()),
                ],
            );
            let regions: Vec<&str> = REGION_INTENSITY.iter().map(|(code, _)| *code).collect();
            console::sub_item(&format!("Known regions: {}", regions.join(", ")));
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            if let Err(e) = tracker.settings().await?.validate() {
                log::error!("Stored settings are invalid: {}", e);
                return Err(e);
            }
            log::info!("✓ Settings OK");

            log::info!("All validations passed!");
        }
    }

    Ok(())
}
