//! Resource adapters: per resource-type refresh and remediation
//!
//! The escalation engine only sees the narrow [`ResourceAdapter`] contract.
//! Concrete adapters drive provider clients ([`DatabaseClient`],
//! [`StorageClient`]) so that any backend, including the in-memory
//! [`MemoryCloud`], can stand behind them.

use crate::config::InquisitorConfig;
use crate::error::{InquisitorError, Result};
use crate::invocation::Invocation;
use crate::types::{Action, ResourceKind, Tags};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub mod bucket;
pub mod database;
pub mod memory;

pub use bucket::{StorageBucket, StorageClient};
pub use database::{DatabaseClient, DatabaseInstance, InstanceDescription, InstanceStatus};
pub use memory::MemoryCloud;

/// Structured, opaque context for logs and notifications
pub type Metadata = HashMap<String, serde_json::Value>;

/// Contract every audited resource type implements
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn resource_id(&self) -> &str;

    fn account_id(&self) -> &str;

    /// Tags as of the last refresh
    fn tags(&self) -> &Tags;

    /// Pull live attributes, including tags, from the provider
    async fn refresh_state(&mut self, ctx: &Invocation) -> Result<()>;

    /// Execute a remediation action
    ///
    /// Must be idempotent: repeating an action that already took effect
    /// succeeds without a second provider-side change.
    async fn take_action(
        &mut self,
        ctx: &Invocation,
        action: Action,
        settings: &ActionSettings,
    ) -> Result<()>;

    fn metadata(&self) -> Metadata;
}

/// Knobs that shape remediation calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSettings {
    /// strftime format of the timestamp in final snapshot names
    pub timestamp_format: String,
    /// Prefix of final snapshot names
    pub snapshot_prefix: String,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            timestamp_format: "%Y-%m-%d-%H-%M-%S".to_string(),
            snapshot_prefix: "inquisitor-snapshot".to_string(),
        }
    }
}

impl ActionSettings {
    pub fn from_config(config: &InquisitorConfig) -> Self {
        Self {
            timestamp_format: config.actions.timestamp_format.clone(),
            snapshot_prefix: config.actions.snapshot_prefix.clone(),
        }
    }

    /// Final snapshot name for a resource, stamped with the current UTC time
    pub fn snapshot_id(&self, resource_id: &str) -> String {
        format!(
            "{}-{}-{}",
            self.snapshot_prefix,
            resource_id,
            chrono::Utc::now().format(&self.timestamp_format)
        )
    }
}

/// Where a resource lives at the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub account_id: String,
    pub region: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_arn: Option<String>,
}

impl ResourceDescriptor {
    pub fn new(
        account_id: impl Into<String>,
        region: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            resource_id: resource_id.into(),
            resource_arn: None,
        }
    }
}

/// Provider clients handed to adapter constructors
#[derive(Clone)]
pub struct ProviderClients {
    pub database: Arc<dyn DatabaseClient>,
    pub storage: Arc<dyn StorageClient>,
}

impl ProviderClients {
    /// Point every client at one in-memory cloud
    pub fn memory(cloud: Arc<MemoryCloud>) -> Self {
        Self {
            database: cloud.clone(),
            storage: cloud,
        }
    }
}

/// Closed set of resource types the tag audit covers
pub enum AuditableResource {
    Database(DatabaseInstance),
    Bucket(StorageBucket),
}

impl AuditableResource {
    /// Build the adapter for an external service identifier
    ///
    /// Accepts both event-source (`aws.rds`) and service-id (`AWS_RDS`)
    /// spellings.
    pub fn from_service(
        service: &str,
        descriptor: ResourceDescriptor,
        clients: &ProviderClients,
    ) -> Result<Self> {
        match service {
            "aws.rds" | "AWS_RDS" => Ok(AuditableResource::Database(DatabaseInstance::new(
                descriptor,
                clients.database.clone(),
            ))),
            "aws.s3" | "AWS_S3" => Ok(AuditableResource::Bucket(StorageBucket::new(
                descriptor,
                clients.storage.clone(),
            ))),
            other => Err(InquisitorError::UnsupportedService(other.to_string())),
        }
    }

    fn inner(&self) -> &dyn ResourceAdapter {
        match self {
            AuditableResource::Database(r) => r,
            AuditableResource::Bucket(r) => r,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ResourceAdapter {
        match self {
            AuditableResource::Database(r) => r,
            AuditableResource::Bucket(r) => r,
        }
    }
}

#[async_trait]
impl ResourceAdapter for AuditableResource {
    fn kind(&self) -> ResourceKind {
        self.inner().kind()
    }

    fn resource_id(&self) -> &str {
        self.inner().resource_id()
    }

    fn account_id(&self) -> &str {
        self.inner().account_id()
    }

    fn tags(&self) -> &Tags {
        self.inner().tags()
    }

    async fn refresh_state(&mut self, ctx: &Invocation) -> Result<()> {
        self.inner_mut().refresh_state(ctx).await
    }

    async fn take_action(
        &mut self,
        ctx: &Invocation,
        action: Action,
        settings: &ActionSettings,
    ) -> Result<()> {
        self.inner_mut().take_action(ctx, action, settings).await
    }

    fn metadata(&self) -> Metadata {
        self.inner().metadata()
    }
}
