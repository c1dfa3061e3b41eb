//! Object-storage bucket adapter

use super::{ActionSettings, Metadata, ResourceAdapter, ResourceDescriptor};
use crate::error::Result;
use crate::invocation::Invocation;
use crate::types::{Action, ResourceKind, Tags};
use async_trait::async_trait;
use std::sync::Arc;

/// Statement id marking policies this crate applied
pub const PREVENT_POLICY_SID: &str = "InquisitorPrevent";

/// Narrow provider API the bucket adapter needs
///
/// Calls on a bucket that does not exist return `NotFound`, except
/// `bucket_exists`.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn bucket_exists(&self, ctx: &Invocation, target: &ResourceDescriptor) -> Result<bool>;

    async fn bucket_tags(&self, ctx: &Invocation, target: &ResourceDescriptor) -> Result<Tags>;

    async fn bucket_policy(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
    ) -> Result<Option<String>>;

    async fn put_bucket_policy(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
        policy: &str,
    ) -> Result<()>;

    async fn list_objects(&self, ctx: &Invocation, target: &ResourceDescriptor)
        -> Result<Vec<String>>;

    async fn delete_object(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
        key: &str,
    ) -> Result<()>;

    async fn delete_bucket(&self, ctx: &Invocation, target: &ResourceDescriptor) -> Result<()>;
}

/// Deny-all object access policy for a bucket
pub fn prevent_policy(bucket: &str) -> serde_json::Value {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": PREVENT_POLICY_SID,
                "Effect": "Deny",
                "Principal": "*",
                "Action": ["s3:GetObject", "s3:PutObject"],
                "Resource": [format!("arn:aws:s3:::{}/*", bucket)]
            }
        ]
    })
}

/// Bucket under audit
pub struct StorageBucket {
    descriptor: ResourceDescriptor,
    client: Arc<dyn StorageClient>,
    tags: Tags,
    exists: bool,
}

impl StorageBucket {
    pub fn new(descriptor: ResourceDescriptor, client: Arc<dyn StorageClient>) -> Self {
        Self {
            descriptor,
            client,
            tags: Tags::new(),
            exists: true,
        }
    }

    fn name(&self) -> &str {
        &self.descriptor.resource_id
    }

    async fn prevent(&mut self, ctx: &Invocation) -> Result<()> {
        let wanted = prevent_policy(self.name());

        if let Some(current) = self.client.bucket_policy(ctx, &self.descriptor).await? {
            let applied = serde_json::from_str::<serde_json::Value>(&current)
                .map(|v| v == wanted)
                .unwrap_or(false);
            if applied {
                tracing::debug!(bucket = %self.name(), "Prevent policy already in place");
                return Ok(());
            }
        }

        let policy = serde_json::to_string_pretty(&wanted)?;
        self.client
            .put_bucket_policy(ctx, &self.descriptor, &policy)
            .await?;
        tracing::info!(bucket = %self.name(), "Prevent policy applied");
        Ok(())
    }

    async fn remove(&mut self, ctx: &Invocation) -> Result<()> {
        if !self.client.bucket_exists(ctx, &self.descriptor).await? {
            tracing::info!(bucket = %self.name(), "Bucket already removed");
            self.exists = false;
            return Ok(());
        }

        let objects = self.client.list_objects(ctx, &self.descriptor).await?;
        for key in &objects {
            ctx.check("empty bucket")?;
            match self.client.delete_object(ctx, &self.descriptor, key).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        match self.client.delete_bucket(ctx, &self.descriptor).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.exists = false;
        tracing::info!(bucket = %self.name(), objects = objects.len(), "Bucket deleted");
        Ok(())
    }
}

#[async_trait]
impl ResourceAdapter for StorageBucket {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Bucket
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
        self.tags = self.client.bucket_tags(ctx, &self.descriptor).await?;
        self.exists = true;
        Ok(())
    }

    async fn take_action(
        &mut self,
        ctx: &Invocation,
        action: Action,
        _settings: &ActionSettings,
    ) -> Result<()> {
        match action {
            Action::Prevent => self.prevent(ctx).await,
            Action::Remove => self.remove(ctx).await,
            _ => Ok(()),
        }
    }

    fn metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("account".into(), self.descriptor.account_id.clone().into());
        meta.insert("region".into(), self.descriptor.region.clone().into());
        meta.insert("bucketName".into(), self.descriptor.resource_id.clone().into());
        meta.insert("exists".into(), self.exists.into());
        meta.insert(
            "tags".into(),
            serde_json::to_value(&self.tags).unwrap_or_default(),
        );
        meta
    }
}
