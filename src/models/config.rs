//! Deployment configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root deployment configuration, as read from `deploy.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Named input variables
    #[serde(default)]
    pub variables: Variables,

    /// Function resource parameters
    #[serde(default)]
    pub function: FunctionConfig,

    /// Log group parameters
    #[serde(default)]
    pub log_sink: LogSinkConfig,

    /// Values passed to the function through its environment
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Where reconciliation state is kept
    #[serde(default)]
    pub state: StateConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Render the configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values for basic sanity.
    ///
    /// Platform limits are checked later on the built descriptor.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in self.variables.entries() {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("variable {key} is empty")));
            }
        }
        if self.function.name.trim().is_empty() {
            return Err(AppError::validation("function.name is empty"));
        }
        if self.function.artifact_path.as_os_str().is_empty() {
            return Err(AppError::validation("function.artifact_path is empty"));
        }
        if self.runtime.max_file_size_mb == 0 {
            return Err(AppError::validation("runtime.max_file_size_mb must be > 0"));
        }
        if self.runtime.allowed_extensions.is_empty() {
            return Err(AppError::validation("runtime.allowed_extensions is empty"));
        }
        Ok(())
    }

    /// Bucket name, derived from project and environment unless set.
    pub fn bucket_name(&self) -> String {
        self.runtime.bucket_name.clone().unwrap_or_else(|| {
            format!(
                "{}-{}-media",
                self.variables.project_name, self.variables.environment
            )
        })
    }

    /// Table name, derived from project and environment unless set.
    pub fn table_name(&self) -> String {
        self.runtime.table_name.clone().unwrap_or_else(|| {
            format!(
                "{}-{}-uploads",
                self.variables.project_name, self.variables.environment
            )
        })
    }
}

/// The input variables of the deployment unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variables {
    /// Target region for all resources
    #[serde(default = "defaults::region")]
    pub region: String,

    /// Execution role assumed by the function
    #[serde(default = "defaults::role_arn")]
    pub role_arn: String,

    /// Environment tag (dev, staging, prod, ...)
    #[serde(default = "defaults::environment")]
    pub environment: String,

    /// Prebuilt FFmpeg layer attached to the function
    #[serde(default = "defaults::layer_arn")]
    pub layer_arn: String,

    /// Naming and tagging context
    #[serde(default = "defaults::project_name")]
    pub project_name: String,
}

impl Variables {
    /// Recognized variable keys, in declaration order.
    pub const KEYS: [&'static str; 5] = [
        "region",
        "role_arn",
        "environment",
        "layer_arn",
        "project_name",
    ];

    /// Override a single variable by key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        match key {
            "region" => self.region = value,
            "role_arn" => self.role_arn = value,
            "environment" => self.environment = value,
            "layer_arn" => self.layer_arn = value,
            "project_name" => self.project_name = value,
            other => {
                return Err(AppError::config(format!(
                    "unknown variable '{other}' (expected one of {})",
                    Self::KEYS.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Current value of a variable by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "region" => Some(&self.region),
            "role_arn" => Some(&self.role_arn),
            "environment" => Some(&self.environment),
            "layer_arn" => Some(&self.layer_arn),
            "project_name" => Some(&self.project_name),
            _ => None,
        }
    }

    /// All variables as key/value pairs.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        Self::KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
            .collect()
    }
}

impl Default for Variables {
    fn default() -> Self {
        Self {
            region: defaults::region(),
            role_arn: defaults::role_arn(),
            environment: defaults::environment(),
            layer_arn: defaults::layer_arn(),
            project_name: defaults::project_name(),
        }
    }
}

/// Function resource parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionConfig {
    #[serde(default = "defaults::function_name")]
    pub name: String,

    /// Entry point, `module.function`
    #[serde(default = "defaults::handler")]
    pub handler: String,

    #[serde(default = "defaults::runtime")]
    pub runtime: String,

    #[serde(default = "defaults::memory_size")]
    pub memory_size_mb: u32,

    #[serde(default = "defaults::ephemeral_storage")]
    pub ephemeral_storage_mb: u32,

    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u32,

    /// Path of the prebuilt deployment package
    #[serde(default = "defaults::artifact_path")]
    pub artifact_path: PathBuf,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            name: defaults::function_name(),
            handler: defaults::handler(),
            runtime: defaults::runtime(),
            memory_size_mb: defaults::memory_size(),
            ephemeral_storage_mb: defaults::ephemeral_storage(),
            timeout_secs: defaults::timeout(),
            artifact_path: defaults::artifact_path(),
        }
    }
}

/// Log group parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogSinkConfig {
    #[serde(default = "defaults::retention_days")]
    pub retention_days: u32,
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self {
            retention_days: defaults::retention_days(),
        }
    }
}

/// Values exposed to the running function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Output bucket; `{project}-{environment}-media` when unset
    #[serde(default)]
    pub bucket_name: Option<String>,

    /// Upload record table; `{project}-{environment}-uploads` when unset
    #[serde(default)]
    pub table_name: Option<String>,

    #[serde(default = "defaults::ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "defaults::cache_dir")]
    pub cache_dir: String,

    #[serde(default = "defaults::log_level")]
    pub log_level: String,

    #[serde(default = "defaults::max_file_size")]
    pub max_file_size_mb: u64,

    #[serde(default = "defaults::allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bucket_name: None,
            table_name: None,
            ffmpeg_path: defaults::ffmpeg_path(),
            cache_dir: defaults::cache_dir(),
            log_level: defaults::log_level(),
            max_file_size_mb: defaults::max_file_size(),
            allowed_extensions: defaults::allowed_extensions(),
        }
    }
}

/// State location settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    #[serde(default = "defaults::state_dir")]
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: defaults::state_dir(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Variable defaults
    pub fn region() -> String {
        "us-east-1".into()
    }
    pub fn role_arn() -> String {
        "arn:aws:iam::123456789012:role/LabRole".into()
    }
    pub fn environment() -> String {
        "dev".into()
    }
    pub fn layer_arn() -> String {
        "arn:aws:lambda:us-east-1:123456789012:layer:ffmpeg:1".into()
    }
    pub fn project_name() -> String {
        "upload-lambda".into()
    }

    // Function defaults
    pub fn function_name() -> String {
        "upload-function".into()
    }
    pub fn handler() -> String {
        "upload-function.lambda_handler".into()
    }
    pub fn runtime() -> String {
        "python3.12".into()
    }
    pub fn memory_size() -> u32 {
        2048
    }
    pub fn ephemeral_storage() -> u32 {
        2048
    }
    pub fn timeout() -> u32 {
        900
    }
    pub fn artifact_path() -> PathBuf {
        PathBuf::from("dist/upload-function.zip")
    }

    pub fn retention_days() -> u32 {
        14
    }

    // Runtime defaults
    pub fn ffmpeg_path() -> String {
        "/opt/bin/ffmpeg".into()
    }
    pub fn cache_dir() -> String {
        "/tmp/cache".into()
    }
    pub fn log_level() -> String {
        "INFO".into()
    }
    pub fn max_file_size() -> u64 {
        500
    }
    pub fn allowed_extensions() -> Vec<String> {
        ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"]
            .iter()
            .map(|ext| ext.to_string())
            .collect()
    }

    pub fn state_dir() -> PathBuf {
        PathBuf::from(".upload-deploy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.function.name, "upload-function");
        assert_eq!(config.variables.region, "us-east-1");
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [variables]
            region = "sa-east-1"

            [function]
            timeout_secs = 300

            [runtime]
            bucket_name = "videos"
            "#,
        )
        .unwrap();
        assert_eq!(config.variables.region, "sa-east-1");
        assert_eq!(config.variables.environment, "dev");
        assert_eq!(config.function.timeout_secs, 300);
        assert_eq!(config.function.memory_size_mb, 2048);
        assert_eq!(config.bucket_name(), "videos");
        assert_eq!(config.table_name(), "upload-lambda-dev-uploads");
    }

    #[test]
    fn set_rejects_unknown_variable() {
        let mut vars = Variables::default();
        assert!(vars.set("environment", "prod").is_ok());
        assert_eq!(vars.environment, "prod");
        assert!(matches!(vars.set("zone", "x"), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_empty_variable() {
        let mut config = Config::default();
        config.variables.role_arn = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_file_size() {
        let mut config = Config::default();
        config.runtime.max_file_size_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_roundtrip_preserves_overrides() {
        let mut config = Config::default();
        config.variables.project_name = "media".into();
        let text = config.to_toml().unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.variables.project_name, "media");
    }
}
