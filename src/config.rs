// src/config.rs

//! Configuration resolution.
//!
//! Variables are resolved with increasing precedence: built-in defaults, the
//! TOML file, `UPLOAD_DEPLOY_<KEY>` environment variables, then explicit
//! `key=value` overrides from the command line.

use std::ffi::OsString;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, Variables};

/// Prefix of environment variables that override configuration variables.
pub const ENV_PREFIX: &str = "UPLOAD_DEPLOY_";

/// Parse a `key=value` override.
pub fn parse_override(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| AppError::config(format!("override '{raw}' is not key=value")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(AppError::config(format!("override '{raw}' has an empty key")));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Keep the environment entries whose name and value are valid Unicode.
pub fn unicode_vars(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> Vec<(String, String)> {
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Apply `UPLOAD_DEPLOY_<KEY>` overrides from an environment snapshot.
///
/// Only the known variable keys are consulted, so unrelated variables with the
/// same prefix are ignored.
pub fn apply_env_overrides<I>(config: &mut Config, env: I) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, value) in env {
        let Some(key) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key = key.to_ascii_lowercase();
        if Variables::KEYS.contains(&key.as_str()) {
            log::debug!("Variable {key} overridden from {name}");
            config.variables.set(&key, value)?;
        }
    }
    Ok(())
}

/// Apply explicit `key=value` overrides. Unknown keys are an error.
pub fn apply_overrides(config: &mut Config, overrides: &[(String, String)]) -> Result<()> {
    for (key, value) in overrides {
        config.variables.set(key, value.clone())?;
    }
    Ok(())
}

/// Load the file (or defaults) and apply every override layer.
pub fn resolve(
    path: &Path,
    env: impl IntoIterator<Item = (String, String)>,
    overrides: &[(String, String)],
) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        Config::load_or_default(path)
    };
    apply_env_overrides(&mut config, env)?;
    apply_overrides(&mut config, overrides)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("region=eu-west-1").unwrap(),
            ("region".to_string(), "eu-west-1".to_string())
        );
        assert!(parse_override("region").is_err());
        assert!(parse_override("=x").is_err());
    }

    #[test]
    fn test_precedence() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("deploy.toml");
        std::fs::write(
            &path,
            "[variables]\nregion = \"eu-west-1\"\nenvironment = \"staging\"\n",
        )
        .unwrap();

        let config = resolve(
            &path,
            env(&[
                ("UPLOAD_DEPLOY_ENVIRONMENT", "prod"),
                ("UPLOAD_DEPLOY_UNRELATED", "x"),
                ("PATH", "/bin"),
            ]),
            &[("project_name".to_string(), "media".to_string())],
        )
        .unwrap();

        assert_eq!(config.variables.region, "eu-west-1");
        assert_eq!(config.variables.environment, "prod");
        assert_eq!(config.variables.project_name, "media");
        assert_eq!(config.bucket_name(), "media-prod-media");
    }

    #[test]
    fn test_cli_override_beats_env() {
        let tmp = TempDir::new().unwrap();
        let config = resolve(
            &tmp.path().join("absent.toml"),
            env(&[("UPLOAD_DEPLOY_REGION", "eu-west-1")]),
            &[("region".to_string(), "ap-south-1".to_string())],
        )
        .unwrap();
        assert_eq!(config.variables.region, "ap-south-1");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_environment_is_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("UPLOAD_DEPLOY_REGION"), OsString::from("eu-west-1")),
            (OsString::from("BROKEN"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![0xc3]), OsString::from("x")),
        ];
        let env = unicode_vars(vars);
        assert_eq!(
            env,
            vec![("UPLOAD_DEPLOY_REGION".to_string(), "eu-west-1".to_string())]
        );

        let tmp = TempDir::new().unwrap();
        let config = resolve(&tmp.path().join("absent.toml"), env, &[]).unwrap();
        assert_eq!(config.variables.region, "eu-west-1");
    }

    #[test]
    fn test_unknown_override_key() {
        let tmp = TempDir::new().unwrap();
        let err = resolve(
            &tmp.path().join("absent.toml"),
            Vec::new(),
            &[("colour".to_string(), "blue".to_string())],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("deploy.toml");
        std::fs::write(&path, "[variables\n").unwrap();
        assert!(resolve(&path, Vec::new(), &[]).is_err());
    }
}
