//! AWS provider.
//!
//! Talks to Lambda and CloudWatch Logs through the official SDK. Platform
//! error codes are classified into the crate's error taxonomy; nothing is
//! retried here except waiting for a function to settle between updates.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::Client as LogsClient;
use aws_sdk_lambda::Client as LambdaClient;
use aws_sdk_lambda::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{
    Environment, EphemeralStorage, FunctionCode, FunctionConfiguration, LastUpdateStatus, Runtime,
    State,
};

use crate::artifact::{Artifact, ContentHash};
use crate::error::{AppError, Result};
use crate::models::{FunctionDescriptor, FunctionRecord, LogSinkDescriptor, LogSinkRecord};
use crate::provider::{CONTENT_HASH_TAG, CloudProvider};

const SETTLE_INTERVAL: Duration = Duration::from_secs(2);
const SETTLE_ATTEMPTS: u32 = 60;

/// Provider backed by the Lambda and CloudWatch Logs APIs.
pub struct AwsProvider {
    lambda: LambdaClient,
    logs: LogsClient,
}

impl AwsProvider {
    /// Create a provider from existing clients.
    pub fn new(lambda: LambdaClient, logs: LogsClient) -> Self {
        Self { lambda, logs }
    }

    /// Create a provider using the default credential chain for `region`.
    pub async fn from_region(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        log::info!("Using AWS provider in {region}");
        Self::new(LambdaClient::new(&config), LogsClient::new(&config))
    }

    /// Poll until the function is neither pending nor mid-update.
    async fn wait_until_settled(&self, name: &str) -> Result<()> {
        for attempt in 1..=SETTLE_ATTEMPTS {
            let output = self
                .lambda
                .get_function_configuration()
                .function_name(name)
                .send()
                .await
                .map_err(|e| classify("get_function_configuration", e))?;

            if matches!(output.state(), Some(State::Failed)) {
                return Err(AppError::provider(
                    format!("function {name}"),
                    output.state_reason().unwrap_or("entered Failed state"),
                ));
            }
            let pending = matches!(output.state(), Some(State::Pending));
            let updating = matches!(
                output.last_update_status(),
                Some(LastUpdateStatus::InProgress)
            );
            if !pending && !updating {
                return Ok(());
            }

            log::debug!("Waiting for {name} to settle (attempt {attempt}/{SETTLE_ATTEMPTS})");
            tokio::time::sleep(SETTLE_INTERVAL).await;
        }
        Err(AppError::provider(
            format!("function {name}"),
            "did not settle in time",
        ))
    }

    async fn require_function(&self, name: &str) -> Result<FunctionRecord> {
        self.describe_function(name)
            .await?
            .ok_or_else(|| AppError::not_found(format!("function {name}")))
    }

    async fn require_log_group(&self, name: &str) -> Result<LogSinkRecord> {
        self.describe_log_group(name)
            .await?
            .ok_or_else(|| AppError::not_found(format!("log group {name}")))
    }

    async fn put_retention(&self, sink: &LogSinkDescriptor) -> Result<()> {
        self.logs
            .put_retention_policy()
            .log_group_name(&sink.name)
            .retention_in_days(to_i32("retention_days", sink.retention_days)?)
            .send()
            .await
            .map_err(|e| classify("put_retention_policy", e))?;
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for AwsProvider {
    fn name(&self) -> &str {
        "aws"
    }

    async fn describe_log_group(&self, name: &str) -> Result<Option<LogSinkRecord>> {
        let output = self
            .logs
            .describe_log_groups()
            .log_group_name_prefix(name)
            .send()
            .await
            .map_err(|e| classify("describe_log_groups", e))?;

        Ok(output
            .log_groups()
            .iter()
            .find(|group| group.log_group_name() == Some(name))
            .map(|group| LogSinkRecord {
                name: name.to_string(),
                arn: group
                    .arn()
                    .unwrap_or_default()
                    .trim_end_matches(":*")
                    .to_string(),
                retention_days: group
                    .retention_in_days()
                    .and_then(|days| u32::try_from(days).ok()),
            }))
    }

    async fn create_log_group(&self, sink: &LogSinkDescriptor) -> Result<LogSinkRecord> {
        self.logs
            .create_log_group()
            .log_group_name(&sink.name)
            .set_tags(Some(to_hash_map(&sink.tags)))
            .send()
            .await
            .map_err(|e| classify("create_log_group", e))?;
        self.put_retention(sink).await?;
        log::info!("Created log group {}", sink.name);
        self.require_log_group(&sink.name).await
    }

    async fn update_log_group(&self, sink: &LogSinkDescriptor) -> Result<LogSinkRecord> {
        self.put_retention(sink).await?;
        self.require_log_group(&sink.name).await
    }

    async fn delete_log_group(&self, name: &str) -> Result<()> {
        self.logs
            .delete_log_group()
            .log_group_name(name)
            .send()
            .await
            .map_err(|e| classify("delete_log_group", e))?;
        log::info!("Deleted log group {name}");
        Ok(())
    }

    async fn describe_function(&self, name: &str) -> Result<Option<FunctionRecord>> {
        match self.lambda.get_function().function_name(name).send().await {
            Ok(output) => Ok(output
                .configuration()
                .map(|config| function_record(config, output.tags()))),
            Err(err) => {
                let err = classify("get_function", err);
                if err.is_not_found() { Ok(None) } else { Err(err) }
            }
        }
    }

    async fn create_function(
        &self,
        function: &FunctionDescriptor,
        artifact: &Artifact,
    ) -> Result<FunctionRecord> {
        let mut tags = to_hash_map(&function.tags);
        tags.insert(CONTENT_HASH_TAG.to_string(), artifact.hash().to_string());

        self.lambda
            .create_function()
            .function_name(&function.name)
            .runtime(Runtime::from(function.runtime.as_str()))
            .role(&function.role_arn)
            .handler(&function.handler)
            .code(
                FunctionCode::builder()
                    .zip_file(Blob::new(artifact.bytes().to_vec()))
                    .build(),
            )
            .memory_size(to_i32("memory_size_mb", function.memory_size_mb)?)
            .timeout(to_i32("timeout_secs", function.timeout_secs)?)
            .ephemeral_storage(ephemeral_storage(function)?)
            .set_layers(Some(function.layers.clone()))
            .environment(environment(function))
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| classify("create_function", e))?;

        log::info!("Created function {}", function.name);
        self.wait_until_settled(&function.name).await?;
        self.require_function(&function.name).await
    }

    async fn update_function_code(
        &self,
        function: &FunctionDescriptor,
        artifact: &Artifact,
    ) -> Result<FunctionRecord> {
        self.wait_until_settled(&function.name).await?;
        let output = self
            .lambda
            .update_function_code()
            .function_name(&function.name)
            .zip_file(Blob::new(artifact.bytes().to_vec()))
            .send()
            .await
            .map_err(|e| classify("update_function_code", e))?;

        if let Some(arn) = output.function_arn() {
            self.lambda
                .tag_resource()
                .resource(arn)
                .tags(CONTENT_HASH_TAG, artifact.hash().to_string())
                .send()
                .await
                .map_err(|e| classify("tag_resource", e))?;
        }

        log::info!(
            "Updated code of {} to {}",
            function.name,
            artifact.hash().short()
        );
        self.wait_until_settled(&function.name).await?;
        self.require_function(&function.name).await
    }

    async fn update_function_configuration(
        &self,
        function: &FunctionDescriptor,
    ) -> Result<FunctionRecord> {
        self.wait_until_settled(&function.name).await?;
        let output = self
            .lambda
            .update_function_configuration()
            .function_name(&function.name)
            .runtime(Runtime::from(function.runtime.as_str()))
            .role(&function.role_arn)
            .handler(&function.handler)
            .memory_size(to_i32("memory_size_mb", function.memory_size_mb)?)
            .timeout(to_i32("timeout_secs", function.timeout_secs)?)
            .ephemeral_storage(ephemeral_storage(function)?)
            .set_layers(Some(function.layers.clone()))
            .environment(environment(function))
            .send()
            .await
            .map_err(|e| classify("update_function_configuration", e))?;

        if let Some(arn) = output.function_arn() {
            let current = self.require_function(&function.name).await?;
            let stale: Vec<String> = current
                .tags
                .keys()
                .filter(|key| !function.tags.contains_key(*key))
                .cloned()
                .collect();
            if !stale.is_empty() {
                self.lambda
                    .untag_resource()
                    .resource(arn)
                    .set_tag_keys(Some(stale))
                    .send()
                    .await
                    .map_err(|e| classify("untag_resource", e))?;
            }
            self.lambda
                .tag_resource()
                .resource(arn)
                .set_tags(Some(to_hash_map(&function.tags)))
                .send()
                .await
                .map_err(|e| classify("tag_resource", e))?;
        }

        log::info!("Updated configuration of {}", function.name);
        self.wait_until_settled(&function.name).await?;
        self.require_function(&function.name).await
    }

    async fn delete_function(&self, name: &str) -> Result<()> {
        self.lambda
            .delete_function()
            .function_name(name)
            .send()
            .await
            .map_err(|e| classify("delete_function", e))?;
        log::info!("Deleted function {name}");
        Ok(())
    }
}

/// Map an SDK failure onto the crate's error taxonomy.
fn classify<E, R>(context: &str, err: SdkError<E, R>) -> AppError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    AppError::from_platform_code(context, code.as_deref(), DisplayErrorContext(&err))
}

fn to_i32(field: &str, value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| AppError::validation(format!("{field} value {value} is out of range")))
}

fn to_hash_map(map: &BTreeMap<String, String>) -> HashMap<String, String> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn ephemeral_storage(function: &FunctionDescriptor) -> Result<EphemeralStorage> {
    EphemeralStorage::builder()
        .size(to_i32("ephemeral_storage_mb", function.ephemeral_storage_mb)?)
        .build()
        .map_err(|e| AppError::provider("ephemeral_storage", e))
}

fn environment(function: &FunctionDescriptor) -> Environment {
    Environment::builder()
        .set_variables(Some(to_hash_map(&function.environment)))
        .build()
}

fn function_record(
    config: &FunctionConfiguration,
    tags: Option<&HashMap<String, String>>,
) -> FunctionRecord {
    let mut tags: BTreeMap<String, String> = tags
        .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    let content_hash = tags
        .remove(CONTENT_HASH_TAG)
        .and_then(|value| ContentHash::parse(&value));
    tags.retain(|key, _| !key.starts_with("aws:"));

    let as_u32 = |value: Option<i32>| value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0);

    FunctionRecord {
        name: config.function_name().unwrap_or_default().to_string(),
        arn: config.function_arn().unwrap_or_default().to_string(),
        handler: config.handler().unwrap_or_default().to_string(),
        runtime: config
            .runtime()
            .map(|r| r.as_str().to_string())
            .unwrap_or_default(),
        role_arn: config.role().unwrap_or_default().to_string(),
        memory_size_mb: as_u32(config.memory_size()),
        ephemeral_storage_mb: as_u32(config.ephemeral_storage().map(|s| s.size())),
        timeout_secs: as_u32(config.timeout()),
        layers: config
            .layers()
            .iter()
            .filter_map(|layer| layer.arn().map(str::to_string))
            .collect(),
        environment: config
            .environment()
            .and_then(|env| env.variables())
            .map(|vars| vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default(),
        tags,
        content_hash,
    }
}
