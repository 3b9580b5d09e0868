//! Plan calculation.
//!
//! Compares the desired descriptors and the artifact's content hash with the
//! refreshed state, producing one action per resource in creation order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::ContentHash;
use crate::error::Result;
use crate::models::{
    DeploymentUnit, FunctionDescriptor, FunctionRecord, LogSinkDescriptor, LogSinkRecord,
    ResourceKind,
};
use crate::state::{DeploymentState, PendingDeletion};

/// One attribute that differs between platform and descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: String,
    pub after: String,
}

impl FieldChange {
    fn new(field: impl Into<String>, before: impl fmt::Display, after: impl fmt::Display) -> Self {
        Self {
            field: field.into(),
            before: before.to_string(),
            after: after.to_string(),
        }
    }
}

/// What the reconciler will do to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Create,
    /// In-place update of configuration and/or code
    Update {
        changes: Vec<FieldChange>,
        code_changed: bool,
    },
    /// Name changed: create the new resource, then delete `previous`
    Replace { previous: String },
    NoOp,
}

impl Action {
    pub fn is_noop(&self) -> bool {
        matches!(self, Action::NoOp)
    }
}

/// Planned action for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub kind: ResourceKind,
    pub name: String,
    pub action: Action,
}

/// The full plan, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub content_hash: ContentHash,
    pub changes: Vec<ResourceChange>,
    /// Replaced resources left over from an earlier apply
    #[serde(default)]
    pub deletions: Vec<PendingDeletion>,
}

impl Plan {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| !c.action.is_noop()) || !self.deletions.is_empty()
    }

    /// Get the total number of resources that change.
    pub fn change_count(&self) -> usize {
        self.changes.iter().filter(|c| !c.action.is_noop()).count() + self.deletions.len()
    }

    /// Planned action for a resource kind.
    pub fn get(&self, kind: ResourceKind) -> Option<&ResourceChange> {
        self.changes.iter().find(|c| c.kind == kind)
    }

    fn count(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.changes.iter().filter(|c| pred(&c.action)).count()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_changes() {
            return writeln!(f, "No changes. Infrastructure matches the configuration.");
        }

        for change in &self.changes {
            match &change.action {
                Action::NoOp => {}
                Action::Create => {
                    write!(f, "  + {} {}", change.kind, change.name)?;
                    if change.kind == ResourceKind::Function {
                        write!(f, " (code {})", self.content_hash.short())?;
                    }
                    writeln!(f)?;
                }
                Action::Update {
                    changes,
                    code_changed,
                } => {
                    writeln!(f, "  ~ {} {}", change.kind, change.name)?;
                    for field in changes {
                        writeln!(
                            f,
                            "      {}: {} -> {}",
                            field.field, field.before, field.after
                        )?;
                    }
                    if *code_changed {
                        writeln!(f, "      code -> {}", self.content_hash.short())?;
                    }
                }
                Action::Replace { previous } => {
                    writeln!(
                        f,
                        "-/+ {} {} (replaces {})",
                        change.kind, change.name, previous
                    )?;
                }
            }
        }

        for pending in &self.deletions {
            writeln!(f, "  - {} {} (left over from a replacement)", pending.kind, pending.name)?;
        }

        writeln!(
            f,
            "\nPlan: {} to add, {} to change, {} to replace, {} to destroy.",
            self.count(|a| matches!(a, Action::Create)),
            self.count(|a| matches!(a, Action::Update { .. })),
            self.count(|a| matches!(a, Action::Replace { .. })),
            self.deletions.len(),
        )
    }
}

/// Build the plan for a unit against refreshed state.
pub fn build_plan(
    unit: &DeploymentUnit,
    content_hash: &ContentHash,
    state: &DeploymentState,
) -> Result<Plan> {
    let changes = unit
        .creation_order()?
        .into_iter()
        .map(|kind| match kind {
            ResourceKind::LogSink => ResourceChange {
                kind,
                name: unit.log_sink.name.clone(),
                action: plan_log_sink(&unit.log_sink, state.log_sink.as_ref()),
            },
            ResourceKind::Function => ResourceChange {
                kind,
                name: unit.function.name.clone(),
                action: plan_function(&unit.function, content_hash, state.function.as_ref()),
            },
        })
        .collect();

    Ok(Plan {
        content_hash: content_hash.clone(),
        changes,
        deletions: state.pending_deletions.clone(),
    })
}

/// Decide the action for the log group.
pub fn plan_log_sink(desired: &LogSinkDescriptor, current: Option<&LogSinkRecord>) -> Action {
    let Some(current) = current else {
        return Action::Create;
    };
    if current.name != desired.name {
        return Action::Replace {
            previous: current.name.clone(),
        };
    }
    if current.retention_days != Some(desired.retention_days) {
        let before = current
            .retention_days
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never expire".to_string());
        return Action::Update {
            changes: vec![FieldChange::new(
                "retention_days",
                before,
                desired.retention_days,
            )],
            code_changed: false,
        };
    }
    Action::NoOp
}

/// Decide the action for the function.
pub fn plan_function(
    desired: &FunctionDescriptor,
    content_hash: &ContentHash,
    current: Option<&FunctionRecord>,
) -> Action {
    let Some(current) = current else {
        return Action::Create;
    };
    if current.name != desired.name {
        return Action::Replace {
            previous: current.name.clone(),
        };
    }

    let changes = function_changes(desired, current);
    let code_changed = current.content_hash.as_ref() != Some(content_hash);

    if changes.is_empty() && !code_changed {
        Action::NoOp
    } else {
        Action::Update {
            changes,
            code_changed,
        }
    }
}

fn function_changes(desired: &FunctionDescriptor, current: &FunctionRecord) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    let mut scalar = |field: &str, before: String, after: String| {
        if before != after {
            changes.push(FieldChange::new(field, before, after));
        }
    };
    scalar("handler", current.handler.clone(), desired.handler.clone());
    scalar("runtime", current.runtime.clone(), desired.runtime.clone());
    scalar("role_arn", current.role_arn.clone(), desired.role_arn.clone());
    scalar(
        "memory_size_mb",
        current.memory_size_mb.to_string(),
        desired.memory_size_mb.to_string(),
    );
    scalar(
        "ephemeral_storage_mb",
        current.ephemeral_storage_mb.to_string(),
        desired.ephemeral_storage_mb.to_string(),
    );
    scalar(
        "timeout_secs",
        current.timeout_secs.to_string(),
        desired.timeout_secs.to_string(),
    );
    scalar(
        "layers",
        format!("[{}]", current.layers.join(", ")),
        format!("[{}]", desired.layers.join(", ")),
    );

    changes.extend(map_changes("environment", &current.environment, &desired.environment));
    changes.extend(map_changes("tags", &current.tags, &desired.tags));
    changes
}

/// Per-key differences between two string maps.
fn map_changes(
    prefix: &str,
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
) -> Vec<FieldChange> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let old = before.get(key);
            let new = after.get(key);
            (old != new).then(|| {
                FieldChange::new(
                    format!("{prefix}.{key}"),
                    old.map(String::as_str).unwrap_or("(unset)"),
                    new.map(String::as_str).unwrap_or("(unset)"),
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;

    fn unit() -> DeploymentUnit {
        DeploymentUnit::from_config(&Config::default())
    }

    fn record_for(function: &FunctionDescriptor, hash: &ContentHash) -> FunctionRecord {
        FunctionRecord {
            name: function.name.clone(),
            arn: "arn:aws:lambda:us-east-1:000000000000:function:upload-function".into(),
            handler: function.handler.clone(),
            runtime: function.runtime.clone(),
            role_arn: function.role_arn.clone(),
            memory_size_mb: function.memory_size_mb,
            ephemeral_storage_mb: function.ephemeral_storage_mb,
            timeout_secs: function.timeout_secs,
            layers: function.layers.clone(),
            environment: function.environment.clone(),
            tags: function.tags.clone(),
            content_hash: Some(hash.clone()),
        }
    }

    fn sink_record(sink: &LogSinkDescriptor) -> LogSinkRecord {
        LogSinkRecord {
            name: sink.name.clone(),
            arn: format!("arn:aws:logs:us-east-1:000000000000:log-group:{}", sink.name),
            retention_days: Some(sink.retention_days),
        }
    }

    #[test]
    fn test_empty_state_creates_in_dependency_order() {
        let unit = unit();
        let hash = ContentHash::of(b"v1");
        let plan = build_plan(&unit, &hash, &DeploymentState::new()).unwrap();

        assert_eq!(plan.change_count(), 2);
        assert_eq!(plan.changes[0].kind, ResourceKind::LogSink);
        assert_eq!(plan.changes[1].kind, ResourceKind::Function);
        assert!(plan.changes.iter().all(|c| c.action == Action::Create));
    }

    #[test]
    fn test_matching_state_is_noop() {
        let unit = unit();
        let hash = ContentHash::of(b"v1");
        let mut state = DeploymentState::new();
        state.log_sink = Some(sink_record(&unit.log_sink));
        state.function = Some(record_for(&unit.function, &hash));

        let plan = build_plan(&unit, &hash, &state).unwrap();
        assert!(!plan.has_changes());
        assert!(plan.to_string().starts_with("No changes"));
    }

    #[test]
    fn test_new_artifact_bytes_force_code_update() {
        let unit = unit();
        let old = ContentHash::of(b"v1");
        let new = ContentHash::of(b"v2");
        let record = record_for(&unit.function, &old);

        let action = plan_function(&unit.function, &new, Some(&record));
        assert_eq!(
            action,
            Action::Update {
                changes: vec![],
                code_changed: true
            }
        );
    }

    #[test]
    fn test_unknown_remote_hash_forces_code_update() {
        let unit = unit();
        let hash = ContentHash::of(b"v1");
        let mut record = record_for(&unit.function, &hash);
        record.content_hash = None;
        assert!(matches!(
            plan_function(&unit.function, &hash, Some(&record)),
            Action::Update { code_changed: true, .. }
        ));
    }

    #[test]
    fn test_configuration_drift_listed_per_field() {
        let unit = unit();
        let hash = ContentHash::of(b"v1");
        let mut record = record_for(&unit.function, &hash);
        record.memory_size_mb = 1024;
        record.environment.insert("LOG_LEVEL".into(), "DEBUG".into());
        record.environment.insert("STALE".into(), "1".into());

        let Action::Update {
            changes,
            code_changed,
        } = plan_function(&unit.function, &hash, Some(&record))
        else {
            panic!("expected update");
        };
        assert!(!code_changed);
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["memory_size_mb", "environment.LOG_LEVEL", "environment.STALE"]
        );
        assert_eq!(changes[2].after, "(unset)");
    }

    #[test]
    fn test_renamed_function_is_replaced() {
        let unit = unit();
        let hash = ContentHash::of(b"v1");
        let mut record = record_for(&unit.function, &hash);
        record.name = "old-upload".into();
        assert_eq!(
            plan_function(&unit.function, &hash, Some(&record)),
            Action::Replace {
                previous: "old-upload".into()
            }
        );
    }

    #[test]
    fn test_retention_change_is_update() {
        let unit = unit();
        let mut record = sink_record(&unit.log_sink);
        record.retention_days = None;
        let action = plan_log_sink(&unit.log_sink, Some(&record));
        let Action::Update { changes, .. } = action else {
            panic!("expected update");
        };
        assert_eq!(changes[0].before, "never expire");
        assert_eq!(changes[0].after, "14");
    }

    #[test]
    fn test_display_summarizes() {
        let unit = unit();
        let hash = ContentHash::of(b"v1");
        let plan = build_plan(&unit, &hash, &DeploymentState::new()).unwrap();
        let text = plan.to_string();
        assert!(text.contains("+ log_group /aws/lambda/upload-function"));
        assert!(text.contains("+ function upload-function"));
        assert!(text.contains("Plan: 2 to add, 0 to change, 0 to replace, 0 to destroy."));
    }

    #[test]
    fn test_leftover_replacements_are_planned() {
        let unit = unit();
        let hash = ContentHash::of(b"v1");
        let mut state = DeploymentState::new();
        state.log_sink = Some(sink_record(&unit.log_sink));
        state.function = Some(record_for(&unit.function, &hash));
        state.retire(ResourceKind::Function, "old-upload");

        let plan = build_plan(&unit, &hash, &state).unwrap();
        assert!(plan.has_changes());
        assert_eq!(plan.change_count(), 1);
        let text = plan.to_string();
        assert!(text.contains("- function old-upload"));
        assert!(text.contains("0 to replace, 1 to destroy."));
    }
}
