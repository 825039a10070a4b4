//! Configuration for the core crate
//!
//! This module provides configuration options for the store, including
//! transaction policy, notification delivery, scan defaults and the table
//! declarations to load at startup.

use serde::{Serialize, Deserialize};
use std::path::Path;
use log::LevelFilter;

use crate::error::{StoreError, Result};
use crate::notify::NotificationMode;
use crate::schema::TableSpec;
use crate::store::MemoryDriver;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Log level
    pub log_level: String,

    /// Allow at most one open write transaction
    pub single_writer: bool,

    /// When Ops produced inside a transaction reach subscribers
    pub notification: NotificationMode,

    /// Limit applied to scans that pass none
    pub default_scan_limit: Option<usize>,

    /// Tables to declare at startup
    pub tables: Vec<TableSpec>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            log_level: "info".to_string(),
            single_writer: true,
            notification: NotificationMode::PerTransaction,
            default_scan_limit: None,
            tables: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(file)?;

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;

        Ok(())
    }

    /// Create a development configuration
    pub fn development() -> Self {
        let mut config = Self::default();
        config.log_level = "debug".to_string();
        config
    }

    /// Create a production configuration
    pub fn production() -> Self {
        let mut config = Self::default();
        config.log_level = "warn".to_string();
        config.single_writer = true;
        config.default_scan_limit = Some(10_000);
        config
    }

    /// Create a testing configuration
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.log_level = "debug".to_string();
        config.notification = NotificationMode::Immediate;
        config
    }

    /// Parsed log level
    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| StoreError::Config(format!("Invalid log level: {}", self.log_level)))
    }

    /// Initialize `env_logger` at the configured level
    ///
    /// Calling this more than once is harmless; later calls keep the first logger.
    pub fn init_logging(&self) -> Result<()> {
        let level = self.level_filter()?;

        let _ = env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .try_init();

        Ok(())
    }

    /// Build an in-memory driver following this configuration
    pub fn memory_driver(&self) -> MemoryDriver {
        MemoryDriver::new().with_single_writer(self.single_writer)
    }
}
