//! Observed resource state, as reported by a provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::ContentHash;

/// A log group as it exists on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSinkRecord {
    pub name: String,
    pub arn: String,
    /// `None` means the group never expires
    pub retention_days: Option<u32>,
}

/// A function as it exists on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub arn: String,
    pub handler: String,
    pub runtime: String,
    pub role_arn: String,
    pub memory_size_mb: u32,
    pub ephemeral_storage_mb: u32,
    pub timeout_secs: u32,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Hash of the code last deployed through this tool, if known
    #[serde(default)]
    pub content_hash: Option<ContentHash>,
}

/// Values published for downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outputs {
    pub function_name: String,
    pub function_arn: String,
    pub layer_arn: String,
}
