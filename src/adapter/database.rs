//! Relational database instance adapter

use super::{ActionSettings, Metadata, ResourceAdapter, ResourceDescriptor};
use crate::error::Result;
use crate::invocation::Invocation;
use crate::types::{Action, ResourceKind, Tags};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle status reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceStatus {
    Available,
    Starting,
    Stopping,
    Stopped,
    Deleting,
    Deleted,
    Other,
}

impl InstanceStatus {
    /// Map a provider status string
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "available" => InstanceStatus::Available,
            "starting" => InstanceStatus::Starting,
            "stopping" => InstanceStatus::Stopping,
            "stopped" => InstanceStatus::Stopped,
            "deleting" => InstanceStatus::Deleting,
            "deleted" => InstanceStatus::Deleted,
            _ => InstanceStatus::Other,
        }
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, InstanceStatus::Deleting | InstanceStatus::Deleted)
    }
}

/// Snapshot of a database instance as the provider describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDescription {
    pub status: InstanceStatus,
    pub deletion_protection: bool,
}

/// Narrow provider API the database adapter needs
///
/// Calls on an instance that does not exist return `NotFound`.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    async fn describe_instance(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
    ) -> Result<InstanceDescription>;

    async fn list_tags(&self, ctx: &Invocation, target: &ResourceDescriptor) -> Result<Tags>;

    async fn stop_instance(&self, ctx: &Invocation, target: &ResourceDescriptor) -> Result<()>;

    async fn set_deletion_protection(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
        enabled: bool,
    ) -> Result<()>;

    /// Delete the instance, keeping automated backups and taking a final snapshot
    async fn delete_instance(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
        final_snapshot_id: &str,
    ) -> Result<()>;
}

/// Database instance under audit
pub struct DatabaseInstance {
    descriptor: ResourceDescriptor,
    client: Arc<dyn DatabaseClient>,
    tags: Tags,
    status: Option<InstanceStatus>,
}

impl DatabaseInstance {
    pub fn new(descriptor: ResourceDescriptor, client: Arc<dyn DatabaseClient>) -> Self {
        Self {
            descriptor,
            client,
            tags: Tags::new(),
            status: None,
        }
    }

    /// Status as of the last refresh or action
    pub fn status(&self) -> Option<InstanceStatus> {
        self.status
    }

    async fn prevent(&mut self, ctx: &Invocation) -> Result<()> {
        let current = self.client.describe_instance(ctx, &self.descriptor).await?;
        self.status = Some(current.status);

        if current.status != InstanceStatus::Available {
            tracing::debug!(
                resource = %self.descriptor.resource_id,
                status = ?current.status,
                "Instance not running, nothing to stop"
            );
            return Ok(());
        }

        self.client.stop_instance(ctx, &self.descriptor).await?;
        self.status = Some(InstanceStatus::Stopping);
        tracing::info!(resource = %self.descriptor.resource_id, "Instance stopped");
        Ok(())
    }

    async fn remove(&mut self, ctx: &Invocation, settings: &ActionSettings) -> Result<()> {
        let current = match self.client.describe_instance(ctx, &self.descriptor).await {
            Ok(current) => current,
            Err(e) if e.is_not_found() => {
                tracing::info!(resource = %self.descriptor.resource_id, "Instance already removed");
                self.status = Some(InstanceStatus::Deleted);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.status = Some(current.status);

        if current.status.is_gone() {
            tracing::info!(
                resource = %self.descriptor.resource_id,
                status = ?current.status,
                "Instance already removed"
            );
            return Ok(());
        }

        if current.deletion_protection {
            self.client
                .set_deletion_protection(ctx, &self.descriptor, false)
                .await?;
        }

        match current.status {
            InstanceStatus::Available | InstanceStatus::Stopped => {
                let snapshot_id = settings.snapshot_id(&self.descriptor.resource_id);
                self.client
                    .delete_instance(ctx, &self.descriptor, &snapshot_id)
                    .await?;
                self.status = Some(InstanceStatus::Deleting);
                tracing::info!(
                    resource = %self.descriptor.resource_id,
                    snapshot = %snapshot_id,
                    "Instance deleted with final snapshot"
                );
            }
            status => {
                tracing::debug!(
                    resource = %self.descriptor.resource_id,
                    status = ?status,
                    "Instance in transition, delete deferred"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceAdapter for DatabaseInstance {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
    }

    fn resource_id(&self) -> &str {
        &self.descriptor.resource_id
    }

    fn account_id(&self) -> &str {
        &self.descriptor.account_id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    async fn refresh_state(&mut self, ctx: &Invocation) -> Result<()> {
        let current = self.client.describe_instance(ctx, &self.descriptor).await?;
        self.status = Some(current.status);
        self.tags = self.client.list_tags(ctx, &self.descriptor).await?;
        tracing::debug!(
            resource = %self.descriptor.resource_id,
            status = ?current.status,
            tags = self.tags.len(),
            "Instance refreshed"
        );
        Ok(())
    }

    async fn take_action(
        &mut self,
        ctx: &Invocation,
        action: Action,
        settings: &ActionSettings,
    ) -> Result<()> {
        match action {
            Action::Prevent => self.prevent(ctx).await,
            Action::Remove => self.remove(ctx, settings).await,
            _ => Ok(()),
        }
    }

    fn metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("account".into(), self.descriptor.account_id.clone().into());
        meta.insert("region".into(), self.descriptor.region.clone().into());
        meta.insert("resourceName".into(), self.descriptor.resource_id.clone().into());
        if let Some(status) = self.status {
            meta.insert(
                "instanceStatus".into(),
                serde_json::to_value(status).unwrap_or_default(),
            );
        }
        meta
    }
}
