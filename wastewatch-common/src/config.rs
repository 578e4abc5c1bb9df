//! Configuration loading and root folder resolution
//!
//! Settings resolve in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the service logs a warning and starts
//! with compiled defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable overriding the root folder
pub const ENV_ROOT_FOLDER: &str = "WASTEWATCH_ROOT_FOLDER";

/// Environment variable carrying the inference endpoint bearer token
pub const ENV_VISION_TOKEN: &str = "WASTEWATCH_VISION_TOKEN";

/// Environment variable overriding the inference endpoint base URL
pub const ENV_VISION_ENDPOINT: &str = "WASTEWATCH_VISION_ENDPOINT";

/// Environment variable overriding the inference model identifier
pub const ENV_VISION_MODEL: &str = "WASTEWATCH_VISION_MODEL";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder holding the SQLite database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database file; defaults to `<root_folder>/wastewatch.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP bind address and port
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

/// Multimodal inference endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Base URL; requests go to `{endpoint}/model/{model_id}/converse`
    #[serde(default = "default_vision_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_vision_model")]
    pub model_id: String,
    /// Bearer token; ENV `WASTEWATCH_VISION_TOKEN` takes precedence
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_vision_endpoint(),
            model_id: default_vision_model(),
            bearer_token: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

/// Analysis pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Attempts per classifier stage
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Neighbour / hotspot matching radius
    #[serde(default = "default_cluster_radius_km")]
    pub cluster_radius_km: f64,
    /// Neighbours required (besides the new report) to form a hotspot
    #[serde(default = "default_min_cluster_neighbors")]
    pub min_cluster_neighbors: usize,
    /// Queue rows scheduled per drain request
    #[serde(default = "default_queue_batch_size")]
    pub queue_batch_size: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            cluster_radius_km: default_cluster_radius_km(),
            min_cluster_neighbors: default_min_cluster_neighbors(),
            queue_batch_size: default_queue_batch_size(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_filter() -> String {
    "wastewatch_ai=debug,tower_http=debug".to_string()
}

fn default_vision_endpoint() -> String {
    "https://bedrock-runtime.us-east-1.amazonaws.com".to_string()
}

fn default_vision_model() -> String {
    "amazon.nova-pro-v1:0".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    2000
}

fn default_cluster_radius_km() -> f64 {
    0.5
}

fn default_min_cluster_neighbors() -> usize {
    2
}

fn default_queue_batch_size() -> u32 {
    10
}

impl TomlConfig {
    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))
    }

    /// Load from `explicit` if given, else the platform config file; fall
    /// back to defaults when no file exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_file() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Resolve the bearer token: ENV first, then TOML
    pub fn resolve_vision_token(&self) -> Result<String> {
        if let Ok(token) = std::env::var(ENV_VISION_TOKEN) {
            if is_valid_secret(&token) {
                info!("Vision bearer token loaded from environment variable");
                return Ok(token);
            }
        }

        if let Some(token) = &self.vision.bearer_token {
            if is_valid_secret(token) {
                info!("Vision bearer token loaded from TOML config");
                return Ok(token.clone());
            }
        }

        Err(Error::Config(format!(
            "Vision bearer token not configured. Set {} or [vision].bearer_token in config.toml",
            ENV_VISION_TOKEN
        )))
    }

    /// Apply ENV overrides for the inference endpoint and model
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(ENV_VISION_ENDPOINT) {
            if is_valid_secret(&endpoint) {
                self.vision.endpoint = endpoint;
            }
        }
        if let Ok(model) = std::env::var(ENV_VISION_MODEL) {
            if is_valid_secret(&model) {
                self.vision.model_id = model;
            }
        }
    }

    /// Database file: explicit TOML path, else `<root>/wastewatch.db`
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| root_folder.join("wastewatch.db"))
    }
}

/// Non-empty, non-whitespace
pub fn is_valid_secret(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Root folder per the priority order in the module docs
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
        if is_valid_secret(&path) {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// First existing config file: `~/.config/wastewatch/config.toml`, then
/// `/etc/wastewatch/config.toml` on Linux
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("wastewatch").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/wastewatch/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default data folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("wastewatch"))
        .unwrap_or_else(|| PathBuf::from("./wastewatch_data"))
}

/// Create the root folder if missing
pub fn ensure_root_folder(root_folder: &Path) -> Result<()> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(())
}
