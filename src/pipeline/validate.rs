// src/pipeline/validate.rs

use serde::Serialize;

use crate::artifact::{Artifact, ContentHash};
use crate::error::{AppError, Result};
use crate::models::{DeploymentUnit, ResourceKind};

/// Outcome of validating a unit without touching any provider.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub function_name: String,
    pub log_group: String,
    pub creation_order: Vec<ResourceKind>,
    /// Content hash if the artifact is present; apply fails without it
    pub artifact: Option<ContentHash>,
}

/// Validate the descriptors and check whether the artifact is in place.
///
/// A missing artifact is reported, not raised: it only has to exist at apply
/// time.
pub async fn run_validate(unit: &DeploymentUnit) -> Result<ValidationReport> {
    unit.validate()?;

    let artifact = match Artifact::load(&unit.function.artifact_path).await {
        Ok(artifact) => Some(artifact.hash().clone()),
        Err(AppError::ArtifactNotFound { path }) => {
            log::warn!("Artifact not found at {}", path.display());
            None
        }
        Err(e) => return Err(e),
    };

    Ok(ValidationReport {
        function_name: unit.function.name.clone(),
        log_group: unit.log_sink.name.clone(),
        creation_order: unit.creation_order()?,
        artifact,
    })
}
