//! Configuration System
//!
//! Layered configuration for the generation capability, the persistence
//! gateway, pipeline policy and logging. Sources are merged lowest to highest:
//! built-in defaults, the global config file, workspace config files, then
//! `WOODVISION__SECTION__KEY` environment variables.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

mod merge_policy;
mod sources;

pub use sources::global_file::global_config_path;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudioConfig {
    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Generation capability settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used to describe the source image
    #[serde(default = "default_text_model")]
    pub analysis_model: String,

    /// Model used for master and scene images
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Model used for listing metadata
    #[serde(default = "default_text_model")]
    pub metadata_model: String,

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_generation_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Fallback capability key, used only when login issues none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_text_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_aspect_ratio() -> String {
    "1:1".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_generation_timeout_secs() -> u64 {
    180
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            analysis_model: default_text_model(),
            image_model: default_image_model(),
            metadata_model: default_text_model(),
            aspect_ratio: default_aspect_ratio(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_generation_timeout_secs(),
            api_key: None,
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !is_http_url(&self.base_url) {
            return Err(format!("base_url must be an http(s) URL: {}", self.base_url));
        }
        for (name, model) in [
            ("analysis_model", &self.analysis_model),
            ("image_model", &self.image_model),
            ("metadata_model", &self.metadata_model),
        ] {
            if model.trim().is_empty() {
                return Err(format!("{} cannot be empty", name));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Persistence gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Web-app endpoint receiving JSON actions; unset means no remote gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_gateway_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gateway_timeout_secs() -> u64 {
    60
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

impl GatewaySettings {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = &self.endpoint {
            if !is_http_url(endpoint) {
                return Err(format!("endpoint must be an http(s) URL: {}", endpoint));
            }
        }
        Ok(())
    }
}

/// Pipeline policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Percentage of the original structure the master pass keeps
    #[serde(default = "default_soul_percent")]
    pub soul_percent: u8,

    /// Extra attempts for a fan-out step after a transient failure
    #[serde(default = "default_max_fanout_retries")]
    pub max_fanout_retries: usize,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Title persisted when listing metadata is absent
    #[serde(default = "default_fallback_title")]
    pub fallback_title: String,
}

fn default_soul_percent() -> u8 {
    40
}

fn default_max_fanout_retries() -> usize {
    1
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_fallback_title() -> String {
    "Premium Wood Design".to_string()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            soul_percent: default_soul_percent(),
            max_fanout_retries: default_max_fanout_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            fallback_title: default_fallback_title(),
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=99).contains(&self.soul_percent) {
            return Err(format!(
                "soul_percent must be between 1 and 99, got {}",
                self.soul_percent
            ));
        }
        if self.fallback_title.trim().is_empty() {
            return Err("fallback_title cannot be empty".to_string());
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Generation(String),
    Gateway(String),
    Pipeline(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::Gateway(msg) => write!(f, "Gateway: {}", msg),
            ValidationError::Pipeline(msg) => write!(f, "Pipeline: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl StudioConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Err(e) = self.generation.validate() {
            errors.push(ValidationError::Generation(e));
        }
        if let Err(e) = self.gateway.validate() {
            errors.push(ValidationError::Gateway(e));
        }
        if let Err(e) = self.pipeline.validate() {
            errors.push(ValidationError::Pipeline(e));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every violation into one error.
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })
    }
}

/// Loads [`StudioConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace root.
    pub fn load(workspace_root: &Path) -> Result<StudioConfig, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::environment::add_to_builder(builder);
        let config: StudioConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load configuration from a single file (plus defaults and environment).
    pub fn load_from_file(path: &Path) -> Result<StudioConfig, ApiError> {
        let path_str = path.to_str().ok_or_else(|| {
            ApiError::ConfigError(format!("Config path is not valid UTF-8: {:?}", path))
        })?;
        let builder = merge_policy::builder_with_defaults()?
            .add_source(config::File::with_name(path_str).required(true));
        let builder = sources::environment::add_to_builder(builder);
        let config: StudioConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Write the default configuration as TOML, creating parent directories.
    pub fn write_default(path: &Path) -> Result<PathBuf, ApiError> {
        let rendered = toml::to_string_pretty(&StudioConfig::default())
            .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ApiError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }
        std::fs::write(path, rendered)
            .map_err(|e| ApiError::ConfigError(format!("Failed to write config: {}", e)))?;
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
pub(crate) static ENV_MUTEX: parking_lot::Mutex<()> = parking_lot::const_mutex(());
