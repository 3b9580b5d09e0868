//! Cloud provider abstraction.
//!
//! A provider performs the individual resource calls the reconciler decides
//! on. Errors come back already classified into the [`AppError`] taxonomy;
//! the reconciler never retries them.
//!
//! [`AppError`]: crate::error::AppError

#[cfg(feature = "aws")]
pub mod aws;
pub mod local;

use async_trait::async_trait;

use crate::artifact::Artifact;
use crate::error::Result;
use crate::models::{FunctionDescriptor, FunctionRecord, LogSinkDescriptor, LogSinkRecord};

#[cfg(feature = "aws")]
pub use aws::AwsProvider;
pub use local::LocalProvider;

/// Tag carrying the content hash of the deployed code.
pub const CONTENT_HASH_TAG: &str = "upload-deploy:content-sha256";

/// Trait for cloud backends.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Look up a log group by exact name.
    async fn describe_log_group(&self, name: &str) -> Result<Option<LogSinkRecord>>;

    /// Create a log group. Fails with `Conflict` if the name is taken.
    async fn create_log_group(&self, sink: &LogSinkDescriptor) -> Result<LogSinkRecord>;

    /// Change the retention of an existing log group.
    async fn update_log_group(&self, sink: &LogSinkDescriptor) -> Result<LogSinkRecord>;

    /// Delete a log group.
    async fn delete_log_group(&self, name: &str) -> Result<()>;

    /// Look up a function by name.
    async fn describe_function(&self, name: &str) -> Result<Option<FunctionRecord>>;

    /// Create a function from a descriptor and its code.
    async fn create_function(
        &self,
        function: &FunctionDescriptor,
        artifact: &Artifact,
    ) -> Result<FunctionRecord>;

    /// Replace the code of an existing function.
    async fn update_function_code(
        &self,
        function: &FunctionDescriptor,
        artifact: &Artifact,
    ) -> Result<FunctionRecord>;

    /// Replace the configuration of an existing function.
    async fn update_function_configuration(
        &self,
        function: &FunctionDescriptor,
    ) -> Result<FunctionRecord>;

    /// Delete a function.
    async fn delete_function(&self, name: &str) -> Result<()>;
}
