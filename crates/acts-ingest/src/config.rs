//! Configuration for the acts pipeline
//!
//! Loaded once at startup (TOML file plus environment overrides for
//! credentials) and shared read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::Issuer;

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "ACTS_INGEST_CONFIG";

/// Prefix of per-issuer forwarding credential overrides
pub const FORWARD_KEY_ENV_PREFIX: &str = "ACTS_FORWARD_KEY_";

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Record store API
    pub store: StoreConfig,
    /// Downstream aggregation service
    pub forwarding: ForwardingConfig,
    /// Document downloads
    pub fetch: FetchConfig,
    /// Text extraction
    pub extraction: ExtractionConfig,
    /// Source parsers
    pub sources: SourcesConfig,
}

impl IngestConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from an explicit path, `ACTS_INGEST_CONFIG`, or defaults, then
    /// apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => {
                tracing::info!("No config file given, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override forwarding credentials from `ACTS_FORWARD_KEY_<ISSUER>` variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for issuer in Issuer::ALL {
            let key = format!("{}{}", FORWARD_KEY_ENV_PREFIX, issuer.env_suffix());
            if let Some(value) = lookup(&key).filter(|v| !v.is_empty()) {
                self.forwarding
                    .api_keys
                    .insert(issuer.as_str().to_string(), value);
            }
        }
    }

    /// Reject configurations that cannot work at all
    pub fn validate(&self) -> Result<()> {
        if self.store.base_url.trim().is_empty() {
            return Err(Error::Config("store.base_url is empty".to_string()));
        }
        if self.forwarding.base_url.trim().is_empty() {
            return Err(Error::Config("forwarding.base_url is empty".to_string()));
        }
        for key in self.forwarding.api_keys.keys() {
            key.parse::<Issuer>()?;
        }
        for key in self.fetch.issuer_timeouts.keys() {
            key.parse::<Issuer>()?;
        }
        for issuer in &self.sources.enabled {
            if self.forwarding.api_key(*issuer).is_none() {
                tracing::warn!(
                    "No forwarding credential for {}; its acts will not be forwarded",
                    issuer
                );
            }
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Record store API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store API
    pub base_url: String,
    /// Timeout for ordinary store calls
    pub timeout_secs: u64,
    /// Timeout for the acts-to-forward listing, which is expensive server-side
    pub listing_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api:8000".to_string(),
            timeout_secs: 10,
            listing_timeout_secs: 20,
        }
    }
}

/// Aggregation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Base URL of the aggregation service
    pub base_url: String,
    /// Submission endpoint, relative to `base_url`
    pub push_path: String,
    /// Submission timeout
    pub timeout_secs: u64,
    /// Suffix appended to the forwarded file name
    pub file_name_suffix: String,
    /// Authorization header value per issuer name
    pub api_keys: HashMap<String, String>,
}

impl ForwardingConfig {
    /// Credential for an issuer, if configured
    pub fn api_key(&self, issuer: Issuer) -> Option<&str> {
        self.api_keys.get(issuer.as_str()).map(String::as_str)
    }
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://interes.shtab.net".to_string(),
            push_path: "api/document/push".to_string(),
            timeout_secs: 10,
            file_name_suffix: ".txt".to_string(),
            api_keys: HashMap::new(),
        }
    }
}

/// Document download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Download timeout used when an issuer has no override
    pub timeout_secs: u64,
    /// Per-issuer download timeouts in seconds
    pub issuer_timeouts: HashMap<String, u64>,
    /// Pause after each download, to spare the source servers
    pub delay_ms: u64,
    /// Abort the issuer's remaining downloads on the first failure
    pub stop_on_error: bool,
}

impl FetchConfig {
    /// Download timeout for an issuer
    pub fn timeout_for(&self, issuer: Issuer) -> Duration {
        let secs = self
            .issuer_timeouts
            .get(issuer.as_str())
            .copied()
            .unwrap_or(self.timeout_secs);
        Duration::from_secs(secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            issuer_timeouts: HashMap::new(),
            delay_ms: 1000,
            stop_on_error: false,
        }
    }
}

/// Text extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Directory the store's file references are relative to
    pub data_dir: PathBuf,
    /// Character every correctly extracted document must contain
    pub quality_marker: char,
    /// Tesseract language
    pub ocr_language: String,
    /// Rasterization resolution for OCR
    pub ocr_dpi: u32,
    /// Watchdog for the native PDF extractor
    pub pdf_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/api-data"),
            // Cyrillic small letter o
            quality_marker: '\u{043E}',
            ocr_language: "ukr".to_string(),
            ocr_dpi: 300,
            pdf_timeout_secs: 60,
        }
    }
}

/// Source parser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Issuers whose parsers take part in a run
    pub enabled: Vec<Issuer>,
    pub dnipro: DniproConfig,
    pub sumy: SumyConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: vec![Issuer::Dnipro],
            dnipro: DniproConfig::default(),
            sumy: SumyConfig::default(),
        }
    }
}

/// Dnipro city council listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DniproConfig {
    pub base_url: String,
    pub page_path: String,
    pub media_path: String,
    /// First date of the listing window (dd.mm.yyyy)
    pub since: String,
    pub timeout_secs: u64,
}

impl Default for DniproConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dniprorada.gov.ua/".to_string(),
            page_path: "uk/Widgets/GetAcceptCouncilDocuments".to_string(),
            media_path: "/uk/Widgets/GetWidgetContent?url=".to_string(),
            since: "01.01.2021".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Sumy city council listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SumyConfig {
    pub base_url: String,
    pub page_path: String,
    pub timeout_secs: u64,
}

impl Default for SumyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://smr.gov.ua".to_string(),
            page_path: "/uk/dokumenti/rishennya-miskoji-radi/2021.html".to_string(),
            timeout_secs: 10,
        }
    }
}
