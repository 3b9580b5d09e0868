// src/pipeline/apply.rs

//! Apply and confirm.
//!
//! Creation and updates run in dependency order. Resources retired by a
//! replacement are deleted afterwards, in teardown order. State is saved after
//! every resource so an interrupted apply leaves an accurate record.

use serde::Serialize;

use crate::artifact::{Artifact, ContentHash};
use crate::error::{AppError, Result};
use crate::models::{DeploymentUnit, FunctionRecord, LogSinkRecord, Outputs, ResourceKind};
use crate::pipeline::plan::{Action, Plan, build_plan, plan_function, plan_log_sink};
use crate::pipeline::refresh::refresh;
use crate::provider::CloudProvider;
use crate::state::{DeploymentState, StateStore};

/// Everything needed to execute a plan.
#[derive(Debug)]
pub struct PreparedApply {
    pub artifact: Artifact,
    pub state: DeploymentState,
    pub plan: Plan,
}

/// Counts and outputs of a finished apply.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub outputs: Outputs,
}

impl ApplyReport {
    pub fn changed(&self) -> bool {
        self.created + self.updated + self.replaced + self.deleted > 0
    }
}

/// Validate, hash, refresh and plan.
///
/// Validation and hashing happen before the first provider call, so an
/// invalid descriptor or a missing artifact never touches the platform.
pub async fn prepare(
    unit: &DeploymentUnit,
    provider: &dyn CloudProvider,
    store: &dyn StateStore,
) -> Result<PreparedApply> {
    unit.validate()?;
    let artifact = Artifact::load(&unit.function.artifact_path).await?;
    let state = refresh(provider, store).await?;
    let plan = build_plan(unit, artifact.hash(), &state)?;
    Ok(PreparedApply {
        artifact,
        state,
        plan,
    })
}

/// Run the full plan, apply, confirm cycle.
pub async fn run_apply(
    unit: &DeploymentUnit,
    provider: &dyn CloudProvider,
    store: &dyn StateStore,
) -> Result<ApplyReport> {
    let prepared = prepare(unit, provider, store).await?;
    execute(unit, prepared, provider, store).await
}

/// Execute a prepared plan, then confirm the result.
pub async fn execute(
    unit: &DeploymentUnit,
    prepared: PreparedApply,
    provider: &dyn CloudProvider,
    store: &dyn StateStore,
) -> Result<ApplyReport> {
    let PreparedApply {
        artifact,
        mut state,
        plan,
    } = prepared;
    let loaded = store.load().await?;

    let mut report = ApplyReport {
        created: 0,
        updated: 0,
        replaced: 0,
        deleted: 0,
        outputs: Outputs {
            function_name: unit.function.name.clone(),
            function_arn: String::new(),
            layer_arn: unit.layer_arn.clone(),
        },
    };

    log::info!(
        "Applying {} change(s) with the {} provider",
        plan.change_count(),
        provider.name()
    );

    let teardown = unit.teardown_order()?;
    report.deleted += drain_pending_deletions(&teardown, provider, store, &mut state)
        .await?
        .len();

    for kind in unit.creation_order()? {
        let Some(change) = plan.get(kind) else {
            continue;
        };
        match &change.action {
            Action::NoOp => continue,
            Action::Create => {
                apply_create(unit, kind, &artifact, provider, &mut state).await?;
                report.created += 1;
            }
            Action::Update {
                changes,
                code_changed,
            } => {
                apply_update(unit, kind, !changes.is_empty(), *code_changed, &artifact, provider, &mut state)
                    .await?;
                report.updated += 1;
            }
            Action::Replace { previous } => {
                apply_create(unit, kind, &artifact, provider, &mut state).await?;
                state.retire(kind, previous.clone());
                report.replaced += 1;
            }
        }
        store.save(&mut state).await?;
    }

    report.deleted += drain_pending_deletions(&teardown, provider, store, &mut state)
        .await?
        .len();

    let (log_sink, function) = confirm(unit, &plan.content_hash, provider).await?;
    report.outputs.function_arn = function.arn.clone();
    state.log_sink = Some(log_sink);
    state.function = Some(function);
    state.outputs = Some(report.outputs.clone());

    if loaded.as_ref().is_none_or(|prev| !same_resources(prev, &state)) {
        store.save(&mut state).await?;
    }

    log::info!(
        "Apply complete: {} created, {} updated, {} replaced, {} deleted",
        report.created,
        report.updated,
        report.replaced,
        report.deleted
    );
    Ok(report)
}

/// Describe both resources and check they match the descriptors.
///
/// A mismatch right after apply means something else modified the resources
/// concurrently.
pub async fn confirm(
    unit: &DeploymentUnit,
    content_hash: &ContentHash,
    provider: &dyn CloudProvider,
) -> Result<(LogSinkRecord, FunctionRecord)> {
    let log_sink = provider
        .describe_log_group(&unit.log_sink.name)
        .await?
        .ok_or_else(|| {
            AppError::conflict(format!(
                "log group {} disappeared during apply",
                unit.log_sink.name
            ))
        })?;
    if !plan_log_sink(&unit.log_sink, Some(&log_sink)).is_noop() {
        return Err(AppError::conflict(format!(
            "log group {} was modified during apply",
            unit.log_sink.name
        )));
    }

    let function = provider
        .describe_function(&unit.function.name)
        .await?
        .ok_or_else(|| {
            AppError::conflict(format!(
                "function {} disappeared during apply",
                unit.function.name
            ))
        })?;
    if let Action::Update {
        changes,
        code_changed,
    } = plan_function(&unit.function, content_hash, Some(&function))
    {
        let mut fields: Vec<String> = changes.into_iter().map(|c| c.field).collect();
        if code_changed {
            fields.push("code".to_string());
        }
        return Err(AppError::conflict(format!(
            "function {} was modified during apply ({})",
            unit.function.name,
            fields.join(", ")
        )));
    }

    log::debug!("Confirmed {} and {}", log_sink.name, function.name);
    Ok((log_sink, function))
}

async fn apply_create(
    unit: &DeploymentUnit,
    kind: ResourceKind,
    artifact: &Artifact,
    provider: &dyn CloudProvider,
    state: &mut DeploymentState,
) -> Result<()> {
    match kind {
        ResourceKind::LogSink => {
            log::info!("Creating log group {}", unit.log_sink.name);
            state.log_sink = Some(provider.create_log_group(&unit.log_sink).await?);
        }
        ResourceKind::Function => {
            log::info!(
                "Creating function {} from {} ({} bytes)",
                unit.function.name,
                artifact.path().display(),
                artifact.len()
            );
            state.function = Some(provider.create_function(&unit.function, artifact).await?);
        }
    }
    Ok(())
}

async fn apply_update(
    unit: &DeploymentUnit,
    kind: ResourceKind,
    config_changed: bool,
    code_changed: bool,
    artifact: &Artifact,
    provider: &dyn CloudProvider,
    state: &mut DeploymentState,
) -> Result<()> {
    match kind {
        ResourceKind::LogSink => {
            log::info!("Updating log group {}", unit.log_sink.name);
            state.log_sink = Some(provider.update_log_group(&unit.log_sink).await?);
        }
        ResourceKind::Function => {
            if config_changed {
                log::info!("Updating configuration of {}", unit.function.name);
                state.function = Some(provider.update_function_configuration(&unit.function).await?);
            }
            if code_changed {
                log::info!(
                    "Updating code of {} to {}",
                    unit.function.name,
                    artifact.hash().short()
                );
                state.function =
                    Some(provider.update_function_code(&unit.function, artifact).await?);
            }
        }
    }
    Ok(())
}

/// Delete one resource, tolerating its absence. Returns whether it existed.
pub(crate) async fn delete(
    provider: &dyn CloudProvider,
    kind: ResourceKind,
    name: &str,
) -> Result<bool> {
    let result = match kind {
        ResourceKind::LogSink => provider.delete_log_group(name).await,
        ResourceKind::Function => provider.delete_function(name).await,
    };
    match result {
        Ok(()) => {
            log::info!("Deleted {kind} {name}");
            Ok(true)
        }
        Err(e) if e.is_not_found() => {
            log::warn!("{kind} {name} was already gone");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Delete resources retired by replacements, in teardown order.
///
/// Each one stays recorded until its deletion succeeds, so a failure here is
/// retried by the next apply or destroy. Returns `kind name` of each resource
/// that was actually deleted.
pub(crate) async fn drain_pending_deletions(
    teardown: &[ResourceKind],
    provider: &dyn CloudProvider,
    store: &dyn StateStore,
    state: &mut DeploymentState,
) -> Result<Vec<String>> {
    let mut deleted = Vec::new();
    for &kind in teardown {
        for name in state.pending_names(kind) {
            if delete(provider, kind, &name).await? {
                deleted.push(format!("{kind} {name}"));
            }
            state.forget_deletion(kind, &name);
            store.save(state).await?;
        }
    }
    Ok(deleted)
}

fn same_resources(a: &DeploymentState, b: &DeploymentState) -> bool {
    a.log_sink == b.log_sink
        && a.function == b.function
        && a.outputs == b.outputs
        && a.pending_deletions == b.pending_deletions
}
