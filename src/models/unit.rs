//! The deployment unit: both resources and the edge between them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Config, FunctionDescriptor, LogSinkDescriptor, RuntimeEnv};
use crate::utils::arn;

/// Tag key recording who manages a resource.
pub const MANAGED_BY_TAG: &str = "ManagedBy";
pub const MANAGED_BY: &str = "upload-deploy";

/// The resources a unit can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    LogSink,
    Function,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::LogSink => "log_group",
            ResourceKind::Function => "function",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `before` must exist before `after` is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub before: ResourceKind,
    pub after: ResourceKind,
}

impl DependencyEdge {
    pub fn new(before: ResourceKind, after: ResourceKind) -> Self {
        Self { before, after }
    }
}

/// Desired end state of the function, its log group and their ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentUnit {
    pub region: String,

    /// Layer reference published as an output
    pub layer_arn: String,

    pub function: FunctionDescriptor,

    pub log_sink: LogSinkDescriptor,

    /// Declaration order; ties in the creation order follow it
    pub resources: Vec<ResourceKind>,

    pub edges: Vec<DependencyEdge>,
}

impl DeploymentUnit {
    /// Build the unit from resolved configuration.
    pub fn from_config(config: &Config) -> Self {
        let vars = &config.variables;

        let mut tags = BTreeMap::new();
        tags.insert("Project".to_string(), vars.project_name.clone());
        tags.insert("Environment".to_string(), vars.environment.clone());
        tags.insert(MANAGED_BY_TAG.to_string(), MANAGED_BY.to_string());

        let function = FunctionDescriptor {
            name: config.function.name.clone(),
            handler: config.function.handler.clone(),
            runtime: config.function.runtime.clone(),
            role_arn: vars.role_arn.clone(),
            memory_size_mb: config.function.memory_size_mb,
            ephemeral_storage_mb: config.function.ephemeral_storage_mb,
            timeout_secs: config.function.timeout_secs,
            layers: vec![vars.layer_arn.clone()],
            environment: RuntimeEnv::from_config(config).to_env_map(),
            tags: tags.clone(),
            artifact_path: config.function.artifact_path.clone(),
        };

        let mut log_sink =
            LogSinkDescriptor::for_function(&function.name, config.log_sink.retention_days);
        log_sink.tags = tags;

        Self {
            region: vars.region.clone(),
            layer_arn: vars.layer_arn.clone(),
            function,
            log_sink,
            resources: vec![ResourceKind::LogSink, ResourceKind::Function],
            edges: vec![DependencyEdge::new(
                ResourceKind::LogSink,
                ResourceKind::Function,
            )],
        }
    }

    /// Validate every descriptor and the dependency graph.
    ///
    /// Makes no provider calls; a failure here means nothing was touched.
    pub fn validate(&self) -> Result<()> {
        if !arn::is_region(&self.region) {
            return Err(AppError::validation(format!(
                "'{}' is not a region code",
                self.region
            )));
        }
        self.function.validate()?;
        self.log_sink.validate(&self.function.name)?;
        if !self.function.layers.contains(&self.layer_arn) {
            return Err(AppError::validation(format!(
                "layer '{}' is not attached to the function",
                self.layer_arn
            )));
        }
        self.creation_order()?;
        Ok(())
    }

    /// Order in which resources must be created.
    ///
    /// Topological over `edges`; independent resources keep declaration order.
    pub fn creation_order(&self) -> Result<Vec<ResourceKind>> {
        let mut declared: Vec<ResourceKind> = Vec::new();
        for kind in &self.resources {
            if declared.contains(kind) {
                return Err(AppError::validation(format!("resource {kind} declared twice")));
            }
            declared.push(*kind);
        }

        let mut in_degree: BTreeMap<ResourceKind, usize> =
            declared.iter().map(|kind| (*kind, 0)).collect();
        for edge in &self.edges {
            for end in [edge.before, edge.after] {
                if !in_degree.contains_key(&end) {
                    return Err(AppError::validation(format!(
                        "dependency references undeclared resource {end}"
                    )));
                }
            }
            if let Some(count) = in_degree.get_mut(&edge.after) {
                *count += 1;
            }
        }

        let mut order = Vec::with_capacity(declared.len());
        let mut remaining = declared;
        while !remaining.is_empty() {
            let Some(pos) = remaining.iter().position(|kind| in_degree[kind] == 0) else {
                return Err(AppError::validation("dependency cycle between resources"));
            };
            let next = remaining.remove(pos);
            for edge in self.edges.iter().filter(|e| e.before == next) {
                if let Some(count) = in_degree.get_mut(&edge.after) {
                    *count = count.saturating_sub(1);
                }
            }
            order.push(next);
        }
        Ok(order)
    }

    /// Order in which resources must be deleted.
    pub fn teardown_order(&self) -> Result<Vec<ResourceKind>> {
        let mut order = self.creation_order()?;
        order.reverse();
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::function::limits;

    #[test]
    fn test_default_scenario() {
        let unit = DeploymentUnit::from_config(&Config::default());
        assert!(unit.validate().is_ok());
        assert_eq!(unit.region, "us-east-1");
        assert_eq!(unit.function.name, "upload-function");
        assert_eq!(unit.function.memory_size_mb, 2048);
        assert_eq!(unit.function.ephemeral_storage_mb, 2048);
        assert_eq!(unit.function.timeout_secs, 900);
        assert_eq!(unit.function.layers, vec![Config::default().variables.layer_arn]);
        assert_eq!(unit.log_sink.name, "/aws/lambda/upload-function");
    }

    #[test]
    fn test_variables_flow_into_descriptor() {
        let mut config = Config::default();
        config.variables.environment = "prod".into();
        config.variables.region = "eu-west-1".into();
        let unit = DeploymentUnit::from_config(&config);
        assert_eq!(unit.function.environment["ENVIRONMENT"], "prod");
        assert_eq!(unit.function.environment["REGION"], "eu-west-1");
        assert_eq!(unit.function.tags["Environment"], "prod");
        assert_eq!(unit.log_sink.tags[MANAGED_BY_TAG], MANAGED_BY);
    }

    #[test]
    fn test_log_sink_precedes_function_in_any_declaration_order() {
        let mut unit = DeploymentUnit::from_config(&Config::default());
        for resources in [
            vec![ResourceKind::LogSink, ResourceKind::Function],
            vec![ResourceKind::Function, ResourceKind::LogSink],
        ] {
            unit.resources = resources;
            let order = unit.creation_order().unwrap();
            assert_eq!(order, vec![ResourceKind::LogSink, ResourceKind::Function]);
            let teardown = unit.teardown_order().unwrap();
            assert_eq!(teardown, vec![ResourceKind::Function, ResourceKind::LogSink]);
        }
    }

    #[test]
    fn test_cycle_rejected() {
        let mut unit = DeploymentUnit::from_config(&Config::default());
        unit.edges
            .push(DependencyEdge::new(ResourceKind::Function, ResourceKind::LogSink));
        assert!(matches!(unit.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_undeclared_endpoint_rejected() {
        let mut unit = DeploymentUnit::from_config(&Config::default());
        unit.resources = vec![ResourceKind::Function];
        assert!(unit.creation_order().is_err());
    }

    #[test]
    fn test_without_edges_declaration_order_wins() {
        let mut unit = DeploymentUnit::from_config(&Config::default());
        unit.edges.clear();
        unit.resources = vec![ResourceKind::Function, ResourceKind::LogSink];
        assert_eq!(
            unit.creation_order().unwrap(),
            vec![ResourceKind::Function, ResourceKind::LogSink]
        );
    }

    #[test]
    fn test_timeout_over_limit_fails_unit_validation() {
        let mut config = Config::default();
        config.function.timeout_secs = limits::MAX_TIMEOUT_SECS + 1;
        let unit = DeploymentUnit::from_config(&config);
        assert!(matches!(unit.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_bad_region_rejected() {
        let mut config = Config::default();
        config.variables.region = "mars".into();
        assert!(DeploymentUnit::from_config(&config).validate().is_err());
    }
}
