//! Reconciliation state.
//!
//! The state records what this tool last observed for each resource it owns,
//! plus the outputs it published. Refresh reconciles it with the platform
//! before every plan.
//!
//! ## Directory Structure
//!
//! ```text
//! .upload-deploy/
//! ├── state.json            # Last observed records and outputs
//! └── local-cloud/          # Only with the local backend
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{FunctionRecord, LogSinkRecord, Outputs, ResourceKind};

pub use local::LocalStateStore;

/// Persisted reconciliation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Incremented on every save
    pub serial: u64,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub log_sink: Option<LogSinkRecord>,

    #[serde(default)]
    pub function: Option<FunctionRecord>,

    #[serde(default)]
    pub outputs: Option<Outputs>,

    /// Resources retired by a replacement whose deletion has not succeeded yet
    #[serde(default)]
    pub pending_deletions: Vec<PendingDeletion>,
}

/// A replaced resource that still exists on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeletion {
    pub kind: ResourceKind,
    pub name: String,
}

impl DeploymentState {
    pub fn new() -> Self {
        Self {
            serial: 0,
            updated_at: Utc::now(),
            log_sink: None,
            function: None,
            outputs: None,
            pending_deletions: Vec::new(),
        }
    }

    /// Whether no resource is recorded, live or awaiting deletion.
    pub fn is_empty(&self) -> bool {
        self.log_sink.is_none() && self.function.is_none() && self.pending_deletions.is_empty()
    }

    /// Whether a resource of the given kind is recorded.
    pub fn contains(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::LogSink => self.log_sink.is_some(),
            ResourceKind::Function => self.function.is_some(),
        }
    }

    /// Recorded name of a resource, if any.
    pub fn name_of(&self, kind: ResourceKind) -> Option<&str> {
        match kind {
            ResourceKind::LogSink => self.log_sink.as_ref().map(|r| r.name.as_str()),
            ResourceKind::Function => self.function.as_ref().map(|r| r.name.as_str()),
        }
    }

    /// Forget a resource.
    pub fn remove(&mut self, kind: ResourceKind) {
        match kind {
            ResourceKind::LogSink => self.log_sink = None,
            ResourceKind::Function => {
                self.function = None;
                self.outputs = None;
            }
        }
    }

    /// Remember a replaced resource until it is deleted.
    pub fn retire(&mut self, kind: ResourceKind, name: impl Into<String>) {
        let pending = PendingDeletion {
            kind,
            name: name.into(),
        };
        if !self.pending_deletions.contains(&pending) {
            self.pending_deletions.push(pending);
        }
    }

    /// Names awaiting deletion for one resource kind.
    pub fn pending_names(&self, kind: ResourceKind) -> Vec<String> {
        self.pending_deletions
            .iter()
            .filter(|p| p.kind == kind)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Drop a pending deletion once the resource is gone.
    pub fn forget_deletion(&mut self, kind: ResourceKind, name: &str) {
        self.pending_deletions
            .retain(|p| !(p.kind == kind && p.name == name));
    }
}

impl Default for DeploymentState {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for state backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the state, `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<DeploymentState>>;

    /// Persist the state, bumping its serial.
    async fn save(&self, state: &mut DeploymentState) -> Result<()>;

    /// Remove all persisted state.
    async fn clear(&self) -> Result<()>;

    /// Where the state lives, for display.
    fn location(&self) -> String;
}
