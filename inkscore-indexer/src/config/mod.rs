//! Configuration loading and validation for the inkscore indexer.
//!
//! Configuration is loaded from multiple sources in order of precedence:
//! 1. Environment variables (highest)
//! 2. Environment-specific file (e.g., `development.toml`)
//! 3. Default file (`default.toml`)
//!
//! # Example
//!
//! ```ignore
//! use inkscore_indexer::config::Settings;
//!
//! let settings = Settings::load("development")?;
//! println!("Explorer: {}", settings.explorer.base_url);
//! ```

mod settings;

pub use settings::{
    BackfillSettings, DatabaseSettings, EnrichmentSettings, ExplorerSettings, LoggingSettings,
    MetricsSettings, PollerSettings, RpcSettings, Settings,
};
