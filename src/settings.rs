use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

pub const REGISTER_URL: &str = "https://www2.health.vic.gov.au/about/convictions-register";
pub const ARCHIVE_URL: &str = "https://web.archive.org";

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub use_ca_bundle: bool,
    #[serde(default = "default_ca_bundle_path")]
    pub ca_bundle_path: PathBuf,
    #[serde(default = "default_ssl_version")]
    pub ssl_version: String,
    #[serde(default)]
    pub disable_wayback_machine: bool,
    #[serde(default)]
    pub google_api_key: Option<String>,
    #[serde(default)]
    pub morph_google_api_key: Option<String>,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_register_url")]
    pub register_url: String,
    #[serde(default = "default_archive_url")]
    pub archive_url: String,
}

fn default_true() -> bool {
    true
}

fn default_ca_bundle_path() -> PathBuf {
    PathBuf::from("./bundle.pem")
}

fn default_ssl_version() -> String {
    "TLSv1_2".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data.sqlite")
}

fn default_register_url() -> String {
    REGISTER_URL.to_string()
}

fn default_archive_url() -> String {
    ARCHIVE_URL.to_string()
}

impl Settings {
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let config = Config::builder()
            .add_source(Environment::default().try_parsing(true))
            .build()
            .context("Failed to read configuration from environment")?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// The CA bundle to pin, if enabled and present on disk.
    pub fn ca_bundle(&self) -> Option<&PathBuf> {
        if self.use_ca_bundle && self.ca_bundle_path.exists() {
            Some(&self.ca_bundle_path)
        } else {
            None
        }
    }

    pub fn archive_enabled(&self) -> bool {
        !self.disable_wayback_machine
    }

    pub fn api_key(&self) -> Option<&str> {
        self.google_api_key
            .as_deref()
            .or(self.morph_google_api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }
}
