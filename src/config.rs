use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "carson_scraper.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub catalog_url: String,
    pub origin: String,
    pub csv_path: PathBuf,
    pub xlsx_path: PathBuf,
    pub responses_dir: PathBuf,
    pub page_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub referer: String,
    pub accept_language: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        let catalog_url = "https://www.carson-modelsport.com/carson_en/brands/carson/".to_string();
        Self {
            referer: catalog_url.clone(),
            catalog_url,
            origin: "https://www.carson-modelsport.com".to_string(),
            csv_path: PathBuf::from("carson_products.csv"),
            xlsx_path: PathBuf::from("carson_products.xlsx"),
            responses_dir: PathBuf::from("responses"),
            page_delay_ms: 500,
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Reads `path` when it exists, otherwise falls back to the built-in defaults.
    /// A broken file is reported and ignored.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::from_file(path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
