// src/pipeline/refresh.rs

//! Refresh recorded state from the platform.

use crate::error::Result;
use crate::models::ResourceKind;
use crate::provider::CloudProvider;
use crate::state::{DeploymentState, StateStore};

/// Load the state and replace each recorded resource with what the provider
/// reports now. Resources that no longer exist are dropped.
///
/// The refreshed state is returned, not saved.
pub async fn refresh(
    provider: &dyn CloudProvider,
    store: &dyn StateStore,
) -> Result<DeploymentState> {
    let mut state = store.load().await?.unwrap_or_default();

    if let Some(name) = state.name_of(ResourceKind::LogSink).map(str::to_string) {
        match provider.describe_log_group(&name).await? {
            Some(record) => state.log_sink = Some(record),
            None => {
                log::warn!("Log group {name} no longer exists; dropping it from state");
                state.remove(ResourceKind::LogSink);
            }
        }
    }

    if let Some(name) = state.name_of(ResourceKind::Function).map(str::to_string) {
        match provider.describe_function(&name).await? {
            Some(record) => state.function = Some(record),
            None => {
                log::warn!("Function {name} no longer exists; dropping it from state");
                state.remove(ResourceKind::Function);
            }
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::models::{Config, DeploymentUnit};
    use crate::provider::LocalProvider;
    use crate::state::LocalStateStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_refresh_without_state() {
        let tmp = TempDir::new().unwrap();
        let provider = LocalProvider::new(tmp.path().join("cloud"), "us-east-1");
        let store = LocalStateStore::new(tmp.path().join("state"));
        let state = refresh(&provider, &store).await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_picks_up_drift_and_deletions() {
        let tmp = TempDir::new().unwrap();
        let provider = LocalProvider::new(tmp.path().join("cloud"), "us-east-1");
        let store = LocalStateStore::new(tmp.path().join("state"));
        let unit = DeploymentUnit::from_config(&Config::default());
        let artifact = Artifact::from_bytes("a.zip", b"v1".to_vec());

        let mut state = DeploymentState::new();
        state.log_sink = Some(provider.create_log_group(&unit.log_sink).await.unwrap());
        state.function = Some(
            provider
                .create_function(&unit.function, &artifact)
                .await
                .unwrap(),
        );
        store.save(&mut state).await.unwrap();

        // Changed out of band
        let mut drifted = unit.function.clone();
        drifted.timeout_secs = 60;
        provider
            .update_function_configuration(&drifted)
            .await
            .unwrap();
        provider.delete_log_group(&unit.log_sink.name).await.unwrap();

        let refreshed = refresh(&provider, &store).await.unwrap();
        assert!(refreshed.log_sink.is_none());
        assert_eq!(refreshed.function.unwrap().timeout_secs, 60);
    }
}
