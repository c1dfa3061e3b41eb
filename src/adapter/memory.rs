//! In-memory cloud for development and testing
//!
//! Implements every provider client trait over plain maps and records each
//! mutating call so tests can assert exactly what reached the "provider".

use super::bucket::StorageClient;
use super::database::{DatabaseClient, InstanceDescription, InstanceStatus};
use super::ResourceDescriptor;
use crate::error::{InquisitorError, Result};
use crate::invocation::Invocation;
use crate::types::Tags;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A mutating call that reached the in-memory cloud
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    StopInstance(String),
    SetDeletionProtection(String, bool),
    DeleteInstance(String, String),
    PutBucketPolicy(String),
    DeleteObject(String, String),
    DeleteBucket(String),
}

#[derive(Debug, Clone)]
struct Instance {
    status: InstanceStatus,
    deletion_protection: bool,
    tags: Tags,
}

#[derive(Debug, Clone, Default)]
struct Bucket {
    tags: Tags,
    policy: Option<String>,
    objects: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct CloudState {
    instances: BTreeMap<String, Instance>,
    buckets: BTreeMap<String, Bucket>,
    snapshots: Vec<String>,
    calls: Vec<CloudCall>,
    failures: HashMap<String, String>,
}

/// In-memory provider backing both database and storage clients
#[derive(Debug, Default)]
pub struct MemoryCloud {
    state: RwLock<CloudState>,
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CloudState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CloudState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_instance(
        &self,
        id: &str,
        status: InstanceStatus,
        deletion_protection: bool,
        tags: Tags,
    ) {
        self.write().instances.insert(
            id.to_string(),
            Instance {
                status,
                deletion_protection,
                tags,
            },
        );
    }

    pub fn add_bucket(&self, name: &str, tags: Tags, objects: &[&str]) {
        self.write().buckets.insert(
            name.to_string(),
            Bucket {
                tags,
                policy: None,
                objects: objects.iter().map(|o| o.to_string()).collect(),
            },
        );
    }

    /// Replace the tags of an instance or bucket
    pub fn set_tags(&self, id: &str, tags: Tags) {
        let mut state = self.write();
        if let Some(instance) = state.instances.get_mut(id) {
            instance.tags = tags.clone();
        }
        if let Some(bucket) = state.buckets.get_mut(id) {
            bucket.tags = tags;
        }
    }

    /// Make every mutating call on `id` fail with a provider error
    pub fn fail_on(&self, id: &str, reason: &str) {
        self.write()
            .failures
            .insert(id.to_string(), reason.to_string());
    }

    pub fn clear_failures(&self) {
        self.write().failures.clear();
    }

    pub fn instance_status(&self, id: &str) -> Option<InstanceStatus> {
        self.read().instances.get(id).map(|i| i.status)
    }

    pub fn has_bucket(&self, name: &str) -> bool {
        self.read().buckets.contains_key(name)
    }

    pub fn bucket_policy_of(&self, name: &str) -> Option<String> {
        self.read().buckets.get(name).and_then(|b| b.policy.clone())
    }

    pub fn snapshots(&self) -> Vec<String> {
        self.read().snapshots.clone()
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.read().calls.clone()
    }

    fn mutate(&self, id: &str, call: CloudCall) -> Result<RwLockWriteGuard<'_, CloudState>> {
        let mut state = self.write();
        if let Some(reason) = state.failures.get(id) {
            return Err(InquisitorError::provider(id, reason.clone()));
        }
        state.calls.push(call);
        Ok(state)
    }
}

fn missing(kind: &str, id: &str) -> InquisitorError {
    InquisitorError::NotFound(format!("{} {}", kind, id))
}

#[async_trait]
impl DatabaseClient for MemoryCloud {
    async fn describe_instance(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
    ) -> Result<InstanceDescription> {
        ctx.check("describe_instance")?;
        self.read()
            .instances
            .get(&target.resource_id)
            .map(|i| InstanceDescription {
                status: i.status,
                deletion_protection: i.deletion_protection,
            })
            .ok_or_else(|| missing("instance", &target.resource_id))
    }

    async fn list_tags(&self, ctx: &Invocation, target: &ResourceDescriptor) -> Result<Tags> {
        ctx.check("list_tags")?;
        self.read()
            .instances
            .get(&target.resource_id)
            .map(|i| i.tags.clone())
            .ok_or_else(|| missing("instance", &target.resource_id))
    }

    async fn stop_instance(&self, ctx: &Invocation, target: &ResourceDescriptor) -> Result<()> {
        ctx.check("stop_instance")?;
        let id = &target.resource_id;
        let mut state = self.mutate(id, CloudCall::StopInstance(id.clone()))?;
        let instance = state
            .instances
            .get_mut(id)
            .ok_or_else(|| missing("instance", id))?;
        if instance.status != InstanceStatus::Available {
            return Err(InquisitorError::provider(
                id.as_str(),
                format!("cannot stop instance in state {:?}", instance.status),
            ));
        }
        instance.status = InstanceStatus::Stopped;
        Ok(())
    }

    async fn set_deletion_protection(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
        enabled: bool,
    ) -> Result<()> {
        ctx.check("set_deletion_protection")?;
        let id = &target.resource_id;
        let mut state = self.mutate(id, CloudCall::SetDeletionProtection(id.clone(), enabled))?;
        let instance = state
            .instances
            .get_mut(id)
            .ok_or_else(|| missing("instance", id))?;
        instance.deletion_protection = enabled;
        Ok(())
    }

    async fn delete_instance(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
        final_snapshot_id: &str,
    ) -> Result<()> {
        ctx.check("delete_instance")?;
        let id = &target.resource_id;
        let mut state = self.mutate(
            id,
            CloudCall::DeleteInstance(id.clone(), final_snapshot_id.to_string()),
        )?;
        let protected = state
            .instances
            .get(id)
            .map(|i| i.deletion_protection)
            .ok_or_else(|| missing("instance", id))?;
        if protected {
            return Err(InquisitorError::provider(
                id.as_str(),
                "deletion protection is enabled",
            ));
        }
        state.instances.remove(id);
        state.snapshots.push(final_snapshot_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl StorageClient for MemoryCloud {
    async fn bucket_exists(&self, ctx: &Invocation, target: &ResourceDescriptor) -> Result<bool> {
        ctx.check("bucket_exists")?;
        Ok(self.has_bucket(&target.resource_id))
    }

    async fn bucket_tags(&self, ctx: &Invocation, target: &ResourceDescriptor) -> Result<Tags> {
        ctx.check("bucket_tags")?;
        self.read()
            .buckets
            .get(&target.resource_id)
            .map(|b| b.tags.clone())
            .ok_or_else(|| missing("bucket", &target.resource_id))
    }

    async fn bucket_policy(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
    ) -> Result<Option<String>> {
        ctx.check("bucket_policy")?;
        self.read()
            .buckets
            .get(&target.resource_id)
            .map(|b| b.policy.clone())
            .ok_or_else(|| missing("bucket", &target.resource_id))
    }

    async fn put_bucket_policy(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
        policy: &str,
    ) -> Result<()> {
        ctx.check("put_bucket_policy")?;
        let name = &target.resource_id;
        let mut state = self.mutate(name, CloudCall::PutBucketPolicy(name.clone()))?;
        let bucket = state
            .buckets
            .get_mut(name)
            .ok_or_else(|| missing("bucket", name))?;
        bucket.policy = Some(policy.to_string());
        Ok(())
    }

    async fn list_objects(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
    ) -> Result<Vec<String>> {
        ctx.check("list_objects")?;
        self.read()
            .buckets
            .get(&target.resource_id)
            .map(|b| b.objects.iter().cloned().collect())
            .ok_or_else(|| missing("bucket", &target.resource_id))
    }

    async fn delete_object(
        &self,
        ctx: &Invocation,
        target: &ResourceDescriptor,
        key: &str,
    ) -> Result<()> {
        ctx.check("delete_object")?;
        let name = &target.resource_id;
        let mut state =
            self.mutate(name, CloudCall::DeleteObject(name.clone(), key.to_string()))?;
        let bucket = state
            .buckets
            .get_mut(name)
            .ok_or_else(|| missing("bucket", name))?;
        bucket.objects.remove(key);
        Ok(())
    }

    async fn delete_bucket(&self, ctx: &Invocation, target: &ResourceDescriptor) -> Result<()> {
        ctx.check("delete_bucket")?;
        let name = &target.resource_id;
        let mut state = self.mutate(name, CloudCall::DeleteBucket(name.clone()))?;
        let empty = state
            .buckets
            .get(name)
            .map(|b| b.objects.is_empty())
            .ok_or_else(|| missing("bucket", name))?;
        if !empty {
            return Err(InquisitorError::provider(name.as_str(), "bucket is not empty"));
        }
        state.buckets.remove(name);
        Ok(())
    }
}
