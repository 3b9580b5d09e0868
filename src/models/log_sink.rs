//! Log group descriptor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Retention periods, in days, the log service accepts.
pub const ALLOWED_RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

const LOG_GROUP_PREFIX: &str = "/aws/lambda/";

/// Desired state of the function's log group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSinkDescriptor {
    /// Log group name, derived from the function name
    pub name: String,

    pub retention_days: u32,

    pub tags: BTreeMap<String, String>,
}

impl LogSinkDescriptor {
    /// Descriptor for the log group the platform writes `function_name`'s output to.
    pub fn for_function(function_name: &str, retention_days: u32) -> Self {
        Self {
            name: Self::group_name(function_name),
            retention_days,
            tags: BTreeMap::new(),
        }
    }

    /// Log group name used by the platform for a function.
    pub fn group_name(function_name: &str) -> String {
        format!("{LOG_GROUP_PREFIX}{function_name}")
    }

    /// Validate against the owning function's name.
    pub fn validate(&self, function_name: &str) -> Result<()> {
        if self.name != Self::group_name(function_name) {
            return Err(AppError::validation(format!(
                "log group '{}' does not match function '{function_name}'",
                self.name
            )));
        }
        if !ALLOWED_RETENTION_DAYS.contains(&self.retention_days) {
            return Err(AppError::validation(format!(
                "retention of {} days is not accepted (allowed: {:?})",
                self.retention_days, ALLOWED_RETENTION_DAYS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_derived_from_function() {
        let sink = LogSinkDescriptor::for_function("upload-function", 14);
        assert_eq!(sink.name, "/aws/lambda/upload-function");
        assert!(sink.validate("upload-function").is_ok());
    }

    #[test]
    fn test_rejects_unaccepted_retention() {
        let sink = LogSinkDescriptor::for_function("upload-function", 10);
        assert!(matches!(
            sink.validate("upload-function"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_foreign_name() {
        let sink = LogSinkDescriptor::for_function("other", 14);
        assert!(sink.validate("upload-function").is_err());
    }
}
