//! Function resource descriptor.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RuntimeEnv;
use crate::utils::arn;

/// Platform limits for a function.
pub mod limits {
    pub const MAX_NAME_LEN: usize = 64;
    pub const MIN_MEMORY_MB: u32 = 128;
    pub const MAX_MEMORY_MB: u32 = 10_240;
    pub const MIN_EPHEMERAL_STORAGE_MB: u32 = 512;
    pub const MAX_EPHEMERAL_STORAGE_MB: u32 = 10_240;
    pub const MIN_TIMEOUT_SECS: u32 = 1;
    pub const MAX_TIMEOUT_SECS: u32 = 900;
    pub const MAX_LAYERS: usize = 5;
    /// Combined size of all environment keys and values
    pub const MAX_ENVIRONMENT_BYTES: usize = 4 * 1024;

    pub const SUPPORTED_RUNTIMES: &[&str] = &[
        "python3.9",
        "python3.10",
        "python3.11",
        "python3.12",
        "python3.13",
        "nodejs18.x",
        "nodejs20.x",
        "nodejs22.x",
        "java17",
        "java21",
        "provided.al2",
        "provided.al2023",
    ];

    /// Keys the platform sets itself and refuses from users.
    pub const RESERVED_ENV_KEYS: &[&str] = &[
        "_HANDLER",
        "_X_AMZN_TRACE_ID",
        "AWS_DEFAULT_REGION",
        "AWS_REGION",
        "AWS_EXECUTION_ENV",
        "AWS_ACCESS_KEY",
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "AWS_SESSION_TOKEN",
        "LAMBDA_TASK_ROOT",
        "LAMBDA_RUNTIME_DIR",
    ];
}

static FUNCTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"));

static ENV_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("static regex"));

static HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s.]+(\.[^\s.]+)+$").expect("static regex"));

/// Desired state of the function resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Unique per region and account
    pub name: String,

    /// Entry point reference, `module.function`
    pub handler: String,

    /// Runtime identifier (e.g. `python3.12`)
    pub runtime: String,

    /// Execution role ARN
    pub role_arn: String,

    pub memory_size_mb: u32,

    pub ephemeral_storage_mb: u32,

    pub timeout_secs: u32,

    /// Layer version ARNs, in attachment order
    pub layers: Vec<String>,

    pub environment: BTreeMap<String, String>,

    pub tags: BTreeMap<String, String>,

    /// Local path of the prebuilt deployment package
    pub artifact_path: PathBuf,
}

impl FunctionDescriptor {
    /// Check every attribute against the platform limits.
    pub fn validate(&self) -> Result<()> {
        use limits::*;

        if self.name.is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(AppError::validation(format!(
                "function name must be 1-{MAX_NAME_LEN} characters, got {}",
                self.name.len()
            )));
        }
        if !FUNCTION_NAME.is_match(&self.name) {
            return Err(AppError::validation(format!(
                "function name '{}' may only contain letters, digits, '-' and '_'",
                self.name
            )));
        }
        if !HANDLER.is_match(&self.handler) {
            return Err(AppError::validation(format!(
                "handler '{}' must have the form module.function",
                self.handler
            )));
        }
        if !SUPPORTED_RUNTIMES.contains(&self.runtime.as_str()) {
            return Err(AppError::validation(format!(
                "unsupported runtime '{}'",
                self.runtime
            )));
        }
        if !arn::is_role_arn(&self.role_arn) {
            return Err(AppError::validation(format!(
                "role '{}' is not an IAM role ARN",
                self.role_arn
            )));
        }
        check_range("memory_size_mb", self.memory_size_mb, MIN_MEMORY_MB, MAX_MEMORY_MB)?;
        check_range(
            "ephemeral_storage_mb",
            self.ephemeral_storage_mb,
            MIN_EPHEMERAL_STORAGE_MB,
            MAX_EPHEMERAL_STORAGE_MB,
        )?;
        check_range("timeout_secs", self.timeout_secs, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)?;

        if self.layers.len() > MAX_LAYERS {
            return Err(AppError::validation(format!(
                "at most {MAX_LAYERS} layers may be attached, got {}",
                self.layers.len()
            )));
        }
        for layer in &self.layers {
            if !arn::is_layer_version_arn(layer) {
                return Err(AppError::validation(format!(
                    "layer '{layer}' is not a layer version ARN"
                )));
            }
        }

        self.validate_environment()?;

        if self.artifact_path.as_os_str().is_empty() {
            return Err(AppError::validation("artifact path is empty"));
        }
        Ok(())
    }

    fn validate_environment(&self) -> Result<()> {
        let mut total = 0;
        for (key, value) in &self.environment {
            if !ENV_KEY.is_match(key) {
                return Err(AppError::validation(format!(
                    "environment key '{key}' is not a valid variable name"
                )));
            }
            if limits::RESERVED_ENV_KEYS.contains(&key.as_str()) || key.starts_with("AWS_LAMBDA_") {
                return Err(AppError::validation(format!(
                    "environment key '{key}' is reserved by the platform"
                )));
            }
            if value.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "environment variable {key} is empty"
                )));
            }
            total += key.len() + value.len();
        }
        if total > limits::MAX_ENVIRONMENT_BYTES {
            return Err(AppError::validation(format!(
                "environment is {total} bytes, limit is {}",
                limits::MAX_ENVIRONMENT_BYTES
            )));
        }

        // The handler cannot start without its full contract.
        RuntimeEnv::from_map(&self.environment)?;
        Ok(())
    }
}

fn check_range(field: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(AppError::validation(format!(
            "{field} must be within {min}..={max}, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, DeploymentUnit};

    fn descriptor() -> FunctionDescriptor {
        DeploymentUnit::from_config(&Config::default()).function
    }

    #[test]
    fn test_default_descriptor_valid() {
        assert!(descriptor().validate().is_ok());
    }

    #[test]
    fn test_timeout_above_maximum_rejected() {
        let mut f = descriptor();
        f.timeout_secs = 901;
        let err = f.validate().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_timeout_zero_rejected() {
        let mut f = descriptor();
        f.timeout_secs = 0;
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_memory_bounds() {
        let mut f = descriptor();
        f.memory_size_mb = 127;
        assert!(f.validate().is_err());
        f.memory_size_mb = 10_240;
        assert!(f.validate().is_ok());
        f.memory_size_mb = 10_241;
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_ephemeral_storage_bounds() {
        let mut f = descriptor();
        f.ephemeral_storage_mb = 256;
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_bad_name_rejected() {
        let mut f = descriptor();
        f.name = "upload function".into();
        assert!(f.validate().is_err());
        f.name = "x".repeat(65);
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_handler_form() {
        let mut f = descriptor();
        f.handler = "lambda_handler".into();
        assert!(f.validate().is_err());
        f.handler = "pkg.module.handler".into();
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_unknown_runtime_rejected() {
        let mut f = descriptor();
        f.runtime = "python2.7".into();
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_too_many_layers() {
        let mut f = descriptor();
        f.layers = (1..=6)
            .map(|v| format!("arn:aws:lambda:us-east-1:123456789012:layer:ffmpeg:{v}"))
            .collect();
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_reserved_env_key_rejected() {
        let mut f = descriptor();
        f.environment.insert("AWS_REGION".into(), "us-east-1".into());
        let err = f.validate().unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_empty_env_value_rejected() {
        let mut f = descriptor();
        f.environment.insert("BUCKET".into(), "".into());
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_missing_contract_variable_rejected() {
        let mut f = descriptor();
        f.environment.remove("ALLOWED_EXTENSIONS");
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_oversized_environment_rejected() {
        let mut f = descriptor();
        f.environment.insert("PADDING".into(), "x".repeat(5000));
        assert!(f.validate().is_err());
    }
}
