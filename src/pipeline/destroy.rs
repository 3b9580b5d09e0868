// src/pipeline/destroy.rs

use serde::Serialize;

use crate::error::Result;
use crate::models::DeploymentUnit;
use crate::pipeline::apply::{delete, drain_pending_deletions};
use crate::pipeline::refresh::refresh;
use crate::provider::CloudProvider;
use crate::state::StateStore;

/// What a teardown removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DestroyReport {
    /// `kind name` of each deleted resource, in deletion order
    pub deleted: Vec<String>,
}

/// Delete every recorded resource in teardown order, then clear the state.
///
/// Leftovers of an unfinished replacement go first. State is saved after each
/// deletion so an interrupted destroy can resume. Resources that vanished from
/// the platform are dropped by refresh and not reported.
pub async fn run_destroy(
    unit: &DeploymentUnit,
    provider: &dyn CloudProvider,
    store: &dyn StateStore,
) -> Result<DestroyReport> {
    let order = unit.teardown_order()?;
    let mut report = DestroyReport::default();
    let mut state = refresh(provider, store).await?;

    if state.is_empty() {
        log::info!("Nothing to destroy");
        store.clear().await?;
        return Ok(report);
    }

    report.deleted = drain_pending_deletions(&order, provider, store, &mut state).await?;

    for kind in order {
        let Some(name) = state.name_of(kind).map(str::to_string) else {
            continue;
        };
        if delete(provider, kind, &name).await? {
            report.deleted.push(format!("{kind} {name}"));
        }
        state.remove(kind);
        store.save(&mut state).await?;
    }

    store.clear().await?;
    log::info!("Destroyed {} resource(s)", report.deleted.len());
    Ok(report)
}
