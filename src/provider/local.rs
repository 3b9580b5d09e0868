//! Local filesystem provider.
//!
//! Simulates the platform in a directory so the whole plan/apply/destroy cycle
//! can run without cloud credentials. Name collisions and missing resources
//! fail the same way the real platform does.
//!
//! ## Layout
//!
//! ```text
//! {root}/
//! ├── log-groups/
//! │   └── aws__lambda__upload-function.json
//! ├── functions/
//! │   └── upload-function.json
//! └── code/
//!     └── upload-function.zip
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::artifact::Artifact;
use crate::error::{AppError, Result};
use crate::models::{FunctionDescriptor, FunctionRecord, LogSinkDescriptor, LogSinkRecord};
use crate::provider::CloudProvider;
use crate::utils::arn;

const DEFAULT_ACCOUNT_ID: &str = "000000000000";

/// Provider backed by JSON documents on disk.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    root_dir: PathBuf,
    region: String,
    account_id: String,
}

impl LocalProvider {
    /// Create a provider rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, region: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            region: region.into(),
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
        }
    }

    /// Use a specific account id in generated ARNs.
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    fn log_group_key(name: &str) -> String {
        format!(
            "log-groups/{}.json",
            name.trim_start_matches('/').replace('/', "__")
        )
    }

    fn function_key(name: &str) -> String {
        format!("functions/{name}.json")
    }

    fn code_key(name: &str) -> String {
        format!("code/{name}.zip")
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    fn function_record(
        &self,
        function: &FunctionDescriptor,
        artifact_hash: Option<crate::artifact::ContentHash>,
    ) -> FunctionRecord {
        FunctionRecord {
            name: function.name.clone(),
            arn: arn::function_arn(&self.region, &self.account_id, &function.name),
            handler: function.handler.clone(),
            runtime: function.runtime.clone(),
            role_arn: function.role_arn.clone(),
            memory_size_mb: function.memory_size_mb,
            ephemeral_storage_mb: function.ephemeral_storage_mb,
            timeout_secs: function.timeout_secs,
            layers: function.layers.clone(),
            environment: function.environment.clone(),
            tags: function.tags.clone(),
            content_hash: artifact_hash,
        }
    }

    async fn existing_function(&self, name: &str) -> Result<FunctionRecord> {
        self.read_json(&Self::function_key(name))
            .await?
            .ok_or_else(|| AppError::not_found(format!("function {name}")))
    }
}

#[async_trait]
impl CloudProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn describe_log_group(&self, name: &str) -> Result<Option<LogSinkRecord>> {
        self.read_json(&Self::log_group_key(name)).await
    }

    async fn create_log_group(&self, sink: &LogSinkDescriptor) -> Result<LogSinkRecord> {
        let key = Self::log_group_key(&sink.name);
        if self.read_json::<LogSinkRecord>(&key).await?.is_some() {
            return Err(AppError::conflict(format!(
                "log group {} already exists",
                sink.name
            )));
        }
        let record = LogSinkRecord {
            name: sink.name.clone(),
            arn: arn::log_group_arn(&self.region, &self.account_id, &sink.name),
            retention_days: Some(sink.retention_days),
        };
        self.write_json(&key, &record).await?;
        log::debug!("local: created log group {}", sink.name);
        Ok(record)
    }

    async fn update_log_group(&self, sink: &LogSinkDescriptor) -> Result<LogSinkRecord> {
        let key = Self::log_group_key(&sink.name);
        let mut record: LogSinkRecord = self
            .read_json(&key)
            .await?
            .ok_or_else(|| AppError::not_found(format!("log group {}", sink.name)))?;
        record.retention_days = Some(sink.retention_days);
        self.write_json(&key, &record).await?;
        Ok(record)
    }

    async fn delete_log_group(&self, name: &str) -> Result<()> {
        if !self.remove(&Self::log_group_key(name)).await? {
            return Err(AppError::not_found(format!("log group {name}")));
        }
        log::debug!("local: deleted log group {name}");
        Ok(())
    }

    async fn describe_function(&self, name: &str) -> Result<Option<FunctionRecord>> {
        self.read_json(&Self::function_key(name)).await
    }

    async fn create_function(
        &self,
        function: &FunctionDescriptor,
        artifact: &Artifact,
    ) -> Result<FunctionRecord> {
        let key = Self::function_key(&function.name);
        if self.read_json::<FunctionRecord>(&key).await?.is_some() {
            return Err(AppError::conflict(format!(
                "function {} already exists",
                function.name
            )));
        }
        self.write_bytes(&Self::code_key(&function.name), artifact.bytes())
            .await?;
        let record = self.function_record(function, Some(artifact.hash().clone()));
        self.write_json(&key, &record).await?;
        log::debug!("local: created function {}", function.name);
        Ok(record)
    }

    async fn update_function_code(
        &self,
        function: &FunctionDescriptor,
        artifact: &Artifact,
    ) -> Result<FunctionRecord> {
        let mut record = self.existing_function(&function.name).await?;
        self.write_bytes(&Self::code_key(&function.name), artifact.bytes())
            .await?;
        record.content_hash = Some(artifact.hash().clone());
        self.write_json(&Self::function_key(&function.name), &record)
            .await?;
        Ok(record)
    }

    async fn update_function_configuration(
        &self,
        function: &FunctionDescriptor,
    ) -> Result<FunctionRecord> {
        let existing = self.existing_function(&function.name).await?;
        let record = self.function_record(function, existing.content_hash);
        self.write_json(&Self::function_key(&function.name), &record)
            .await?;
        Ok(record)
    }

    async fn delete_function(&self, name: &str) -> Result<()> {
        if !self.remove(&Self::function_key(name)).await? {
            return Err(AppError::not_found(format!("function {name}")));
        }
        self.remove(&Self::code_key(name)).await?;
        log::debug!("local: deleted function {name}");
        Ok(())
    }
}
