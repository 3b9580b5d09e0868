// src/models/mod.rs

//! Domain models for the deployment unit.
//!
//! Configuration, the desired-state descriptors built from it, and the
//! observed records providers report back.

mod config;
pub mod function;
mod log_sink;
mod record;
pub mod runtime;
mod unit;

// Re-export all public types
pub use config::{
    Config, FunctionConfig, LogSinkConfig, RuntimeConfig, StateConfig, Variables,
};
pub use function::FunctionDescriptor;
pub use log_sink::{ALLOWED_RETENTION_DAYS, LogSinkDescriptor};
pub use record::{FunctionRecord, LogSinkRecord, Outputs};
pub use runtime::RuntimeEnv;
pub use unit::{DependencyEdge, DeploymentUnit, MANAGED_BY, MANAGED_BY_TAG, ResourceKind};
