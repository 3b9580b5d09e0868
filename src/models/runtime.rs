//! The function's runtime environment contract.
//!
//! The deployed handler reads its settings from environment variables. This
//! type is the typed side of that mapping: the descriptor builds the mapping
//! from it, and the same parsing rules decide whether a mapping is usable.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Config;

pub const BUCKET: &str = "BUCKET";
pub const TABLE: &str = "TABLE";
pub const FFMPEG_PATH: &str = "FFMPEG_PATH";
pub const CACHE_DIR: &str = "CACHE_DIR";
pub const REGION: &str = "REGION";
pub const ENVIRONMENT: &str = "ENVIRONMENT";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const MAX_FILE_SIZE_MB: &str = "MAX_FILE_SIZE_MB";
pub const ALLOWED_EXTENSIONS: &str = "ALLOWED_EXTENSIONS";

/// Every variable the function expects to find.
pub const REQUIRED_VARIABLES: [&str; 9] = [
    BUCKET,
    TABLE,
    FFMPEG_PATH,
    CACHE_DIR,
    REGION,
    ENVIRONMENT,
    LOG_LEVEL,
    MAX_FILE_SIZE_MB,
    ALLOWED_EXTENSIONS,
];

/// Typed view of the function's environment mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEnv {
    pub bucket: String,
    pub table: String,
    pub ffmpeg_path: String,
    pub cache_dir: String,
    pub region: String,
    pub environment: String,
    pub log_level: String,
    pub max_file_size_mb: u64,
    /// Lowercase extensions without the leading dot
    pub allowed_extensions: Vec<String>,
}

impl RuntimeEnv {
    /// Build the runtime settings from deployment configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            bucket: config.bucket_name(),
            table: config.table_name(),
            ffmpeg_path: config.runtime.ffmpeg_path.clone(),
            cache_dir: config.runtime.cache_dir.clone(),
            region: config.variables.region.clone(),
            environment: config.variables.environment.clone(),
            log_level: config.runtime.log_level.clone(),
            max_file_size_mb: config.runtime.max_file_size_mb,
            allowed_extensions: normalize_extensions(&config.runtime.allowed_extensions),
        }
    }

    /// Parse the settings back out of an environment mapping.
    pub fn from_map(env: &BTreeMap<String, String>) -> Result<Self> {
        let get = |key: &str| -> Result<String> {
            match env.get(key).map(|v| v.trim()) {
                Some(value) if !value.is_empty() => Ok(value.to_string()),
                Some(_) => Err(AppError::validation(format!(
                    "environment variable {key} is empty"
                ))),
                None => Err(AppError::validation(format!(
                    "environment variable {key} is missing"
                ))),
            }
        };

        let max_file_size_mb = get(MAX_FILE_SIZE_MB)?
            .parse::<u64>()
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                AppError::validation(format!("{MAX_FILE_SIZE_MB} must be a positive integer"))
            })?;

        let raw_extensions = get(ALLOWED_EXTENSIONS)?;
        let allowed_extensions =
            normalize_extensions(&raw_extensions.split(',').collect::<Vec<_>>());
        if allowed_extensions.is_empty() {
            return Err(AppError::validation(format!(
                "{ALLOWED_EXTENSIONS} lists no extensions"
            )));
        }

        Ok(Self {
            bucket: get(BUCKET)?,
            table: get(TABLE)?,
            ffmpeg_path: get(FFMPEG_PATH)?,
            cache_dir: get(CACHE_DIR)?,
            region: get(REGION)?,
            environment: get(ENVIRONMENT)?,
            log_level: get(LOG_LEVEL)?,
            max_file_size_mb,
            allowed_extensions,
        })
    }

    /// Render the settings as the function's environment mapping.
    pub fn to_env_map(&self) -> BTreeMap<String, String> {
        [
            (BUCKET, self.bucket.clone()),
            (TABLE, self.table.clone()),
            (FFMPEG_PATH, self.ffmpeg_path.clone()),
            (CACHE_DIR, self.cache_dir.clone()),
            (REGION, self.region.clone()),
            (ENVIRONMENT, self.environment.clone()),
            (LOG_LEVEL, self.log_level.clone()),
            (MAX_FILE_SIZE_MB, self.max_file_size_mb.to_string()),
            (ALLOWED_EXTENSIONS, self.allowed_extensions.join(",")),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    /// Whether an uploaded file name carries an accepted extension.
    pub fn is_extension_allowed(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .is_some_and(|ext| self.allowed_extensions.iter().any(|a| *a == ext))
    }

    /// Reject uploads larger than the configured bound.
    pub fn check_file_size(&self, size_bytes: u64) -> Result<()> {
        let limit = self.max_file_size_mb.saturating_mul(1024 * 1024);
        if size_bytes > limit {
            return Err(AppError::validation(format!(
                "file of {size_bytes} bytes exceeds the {} MB limit",
                self.max_file_size_mb
            )));
        }
        Ok(())
    }
}

/// Lowercase, strip dots and blanks, drop duplicates while keeping order.
fn normalize_extensions<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in raw {
        let ext = ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_env() -> RuntimeEnv {
        RuntimeEnv::from_config(&Config::default())
    }

    #[test]
    fn test_default_mapping_has_every_variable() {
        let map = default_env().to_env_map();
        for key in REQUIRED_VARIABLES {
            let value = map.get(key).unwrap_or_else(|| panic!("{key} missing"));
            assert!(!value.is_empty(), "{key} empty");
        }
        assert_eq!(map[BUCKET], "upload-lambda-dev-media");
        assert_eq!(map[ALLOWED_EXTENSIONS], "mp4,avi,mov,mkv,wmv,flv,webm");
    }

    #[test]
    fn test_map_parses_back() {
        let env = default_env();
        let parsed = RuntimeEnv::from_map(&env.to_env_map()).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn test_missing_variable_rejected() {
        let mut map = default_env().to_env_map();
        map.remove(TABLE);
        let err = RuntimeEnv::from_map(&map).unwrap_err();
        assert!(err.to_string().contains("TABLE is missing"));
    }

    #[test]
    fn test_non_numeric_size_rejected() {
        let mut map = default_env().to_env_map();
        map.insert(MAX_FILE_SIZE_MB.into(), "lots".into());
        assert!(RuntimeEnv::from_map(&map).is_err());
        map.insert(MAX_FILE_SIZE_MB.into(), "0".into());
        assert!(RuntimeEnv::from_map(&map).is_err());
    }

    #[test]
    fn test_extension_check() {
        let env = default_env();
        assert!(env.is_extension_allowed("clip.mp4"));
        assert!(env.is_extension_allowed("CLIP.MOV"));
        assert!(env.is_extension_allowed("archive.v2.webm"));
        assert!(!env.is_extension_allowed("notes.txt"));
        assert!(!env.is_extension_allowed("mp4"));
    }

    #[test]
    fn test_extensions_are_normalized() {
        let exts = normalize_extensions(&[".MP4", " mov ", "", "mp4"]);
        assert_eq!(exts, vec!["mp4", "mov"]);
    }

    #[test]
    fn test_file_size_bound() {
        let mut env = default_env();
        env.max_file_size_mb = 1;
        assert!(env.check_file_size(1024 * 1024).is_ok());
        assert!(env.check_file_size(1024 * 1024 + 1).is_err());
    }
}
