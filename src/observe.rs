//! Change observations and the graph updater
//!
//! An [`Observation`] is one typed provider change (a record upsert, a
//! distribution snapshot, a bucket deletion, ...). [`GraphUpdater`] writes
//! it into the relationship store; [`Observation::hijack_scan`] says which
//! names the hijack resolver should then walk, and in which direction.

use crate::error::Result;
use crate::invocation::Invocation;
use crate::model::{Bucket, Distribution, Entity, Environment, NaturalKey, Origin, OriginGroup, Record, Zone};
use crate::poll::{wait_until_settled, ChangeStatus, PollPolicy};
use crate::store::{sync_distribution, RelationshipStore};
use crate::types::{Direction, ResourceKind, ResourceRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// DNS change action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordAction {
    Create,
    Upsert,
    Delete,
}

/// A provider-side change to apply to the relationship graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Observation {
    ZoneCreated {
        zone: Zone,
    },
    #[serde(rename_all = "camelCase")]
    ZoneDeleted {
        account_id: String,
        zone_id: String,
    },
    #[serde(rename_all = "camelCase")]
    RecordChanged {
        action: RecordAction,
        record: Record,
        /// Propagation handle to wait on before the change counts
        #[serde(default, skip_serializing_if = "Option::is_none")]
        change_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DistributionObserved {
        distribution: Distribution,
        #[serde(default)]
        origins: Vec<Origin>,
        #[serde(default)]
        origin_groups: Vec<OriginGroup>,
    },
    DistributionDeleted {
        distribution: Distribution,
    },
    EnvironmentCreated {
        environment: Environment,
    },
    EnvironmentTerminated {
        environment: Environment,
    },
    BucketCreated {
        bucket: Bucket,
    },
    BucketDeleted {
        bucket: Bucket,
    },
}

/// Names the resolver should walk after an observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HijackScan {
    pub root: ResourceRef,
    pub names: Vec<String>,
    pub direction: Direction,
}

impl HijackScan {
    fn new(
        id: &str,
        kind: ResourceKind,
        account: &str,
        names: Vec<String>,
        direction: Direction,
    ) -> Option<Self> {
        let mut unique: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !name.is_empty() && !unique.contains(&name) {
                unique.push(name);
            }
        }
        let names = unique;
        if names.is_empty() {
            return None;
        }
        Some(Self {
            root: ResourceRef::new(id, kind).with_account(account),
            names,
            direction,
        })
    }
}

impl Observation {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Observation::ZoneCreated { .. } => "zoneCreated",
            Observation::ZoneDeleted { .. } => "zoneDeleted",
            Observation::RecordChanged { .. } => "recordChanged",
            Observation::DistributionObserved { .. } => "distributionObserved",
            Observation::DistributionDeleted { .. } => "distributionDeleted",
            Observation::EnvironmentCreated { .. } => "environmentCreated",
            Observation::EnvironmentTerminated { .. } => "environmentTerminated",
            Observation::BucketCreated { .. } => "bucketCreated",
            Observation::BucketDeleted { .. } => "bucketDeleted",
        }
    }

    /// Fill the storage domain of buckets that did not carry one
    pub fn with_storage_domain(mut self, suffix: &str) -> Self {
        if let Observation::BucketCreated { bucket } | Observation::BucketDeleted { bucket } =
            &mut self
        {
            if bucket.provider_domain.is_empty() {
                bucket.provider_domain = suffix.to_string();
            }
        }
        self
    }

    /// Key of the row this change deletes, if it deletes one
    pub fn removed_key(&self) -> Option<NaturalKey> {
        match self {
            Observation::RecordChanged {
                action: RecordAction::Delete,
                record,
                ..
            } => Some(NaturalKey::record(
                &record.account_id,
                &record.zone_id,
                &record.record_id,
            )),
            Observation::DistributionDeleted { distribution } => Some(NaturalKey::distribution(
                &distribution.account_id,
                &distribution.distribution_id,
            )),
            Observation::EnvironmentTerminated { environment } => Some(NaturalKey::environment(
                &environment.account_id,
                &environment.environment_id,
            )),
            Observation::BucketDeleted { bucket } => {
                Some(NaturalKey::bucket(&bucket.account_id, &bucket.bucket_id))
            }
            _ => None,
        }
    }

    /// Which hijack resolution this change triggers
    ///
    /// Removing something that exposed a name scans upstream on that name.
    /// New or updated pointers scan downstream on their targets. Creating a
    /// sink triggers nothing.
    pub fn hijack_scan(&self) -> Option<HijackScan> {
        self.hijack_scan_with(&[])
    }

    /// Like [`hijack_scan`](Self::hijack_scan), with the public names the
    /// graph held for the removed row added to upstream scans. Deletion
    /// events often carry only ids.
    pub fn hijack_scan_with(&self, stored_names: &[String]) -> Option<HijackScan> {
        let upstream = |mut names: Vec<String>| {
            names.extend(stored_names.iter().cloned());
            names
        };
        match self {
            Observation::ZoneCreated { .. }
            | Observation::ZoneDeleted { .. }
            | Observation::EnvironmentCreated { .. }
            | Observation::BucketCreated { .. } => None,
            Observation::RecordChanged { action, record, .. } => {
                let entity = Entity::Record(record.clone());
                match action {
                    RecordAction::Delete => HijackScan::new(
                        &record.record_id,
                        ResourceKind::Record,
                        &record.account_id,
                        upstream(entity.public_names()),
                        Direction::Upstream,
                    ),
                    RecordAction::Create | RecordAction::Upsert => HijackScan::new(
                        &record.record_id,
                        ResourceKind::Record,
                        &record.account_id,
                        entity.targets(),
                        Direction::Downstream,
                    ),
                }
            }
            Observation::DistributionObserved {
                distribution,
                origins,
                origin_groups,
            } => {
                let mut names: Vec<String> = origins.iter().map(|o| o.domain.clone()).collect();
                for group in origin_groups {
                    names.extend(group.members.iter().cloned());
                }
                HijackScan::new(
                    &distribution.distribution_id,
                    ResourceKind::Distribution,
                    &distribution.account_id,
                    names,
                    Direction::Downstream,
                )
            }
            Observation::DistributionDeleted { distribution } => HijackScan::new(
                &distribution.distribution_id,
                ResourceKind::Distribution,
                &distribution.account_id,
                upstream(vec![distribution.domain.clone()]),
                Direction::Upstream,
            ),
            Observation::EnvironmentTerminated { environment } => HijackScan::new(
                &environment.environment_id,
                ResourceKind::Environment,
                &environment.account_id,
                upstream(Entity::Environment(environment.clone()).public_names()),
                Direction::Upstream,
            ),
            Observation::BucketDeleted { bucket } => HijackScan::new(
                &bucket.bucket_id,
                ResourceKind::Bucket,
                &bucket.account_id,
                upstream(vec![bucket.public_name()]),
                Direction::Upstream,
            ),
        }
    }
}

/// Reports propagation status of DNS changes
#[async_trait]
pub trait ChangeTracker: Send + Sync {
    async fn change_status(&self, ctx: &Invocation, change_id: &str) -> Result<ChangeStatus>;
}

/// Change tracker backed by a map of scripted pending rounds
///
/// Unknown change ids are in sync immediately.
#[derive(Default)]
pub struct MemoryChangeTracker {
    pending: Mutex<HashMap<String, u32>>,
}

impl MemoryChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `rounds` pending probes for a change before it syncs
    pub fn pending_for(&self, change_id: &str, rounds: u32) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(change_id.to_string(), rounds);
    }
}

#[async_trait]
impl ChangeTracker for MemoryChangeTracker {
    async fn change_status(&self, ctx: &Invocation, change_id: &str) -> Result<ChangeStatus> {
        ctx.check("change_status")?;
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match pending.get_mut(change_id) {
            Some(rounds) if *rounds > 0 => {
                *rounds -= 1;
                Ok(ChangeStatus::Pending)
            }
            _ => Ok(ChangeStatus::InSync),
        }
    }
}

/// Applies observations to the relationship store
pub struct GraphUpdater {
    store: Arc<dyn RelationshipStore>,
    tracker: Arc<dyn ChangeTracker>,
    policy: PollPolicy,
}

impl GraphUpdater {
    pub fn new(store: Arc<dyn RelationshipStore>, tracker: Arc<dyn ChangeTracker>) -> Self {
        Self {
            store,
            tracker,
            policy: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<dyn RelationshipStore> {
        &self.store
    }

    pub async fn apply(&self, ctx: &Invocation, observation: &Observation) -> Result<()> {
        let store = self.store.as_ref();
        tracing::debug!(event = observation.label(), "Applying observation");

        match observation {
            Observation::ZoneCreated { zone } => {
                store.upsert(ctx, Entity::Zone(zone.clone())).await?;
            }
            Observation::ZoneDeleted {
                account_id,
                zone_id,
            } => {
                let records = store
                    .find(ctx, ResourceKind::Record, &|e: &Entity| match e {
                        Entity::Record(r) => r.account_id == *account_id && r.zone_id == *zone_id,
                        _ => false,
                    })
                    .await?;
                for record in records {
                    store.delete(ctx, &record.key()).await?;
                }
                store.delete(ctx, &NaturalKey::zone(account_id, zone_id)).await?;
            }
            Observation::RecordChanged {
                action,
                record,
                change_id,
            } => {
                if let Some(change_id) = change_id {
                    let tracker = self.tracker.clone();
                    let what = format!("DNS change {}", change_id);
                    wait_until_settled(ctx, self.policy, &what, || {
                        let tracker = tracker.clone();
                        let change_id = change_id.clone();
                        async move { tracker.change_status(ctx, &change_id).await }
                    })
                    .await?;
                }
                match action {
                    RecordAction::Create | RecordAction::Upsert => {
                        store.upsert(ctx, Entity::Record(record.clone())).await?;
                    }
                    RecordAction::Delete => {
                        let key =
                            NaturalKey::record(&record.account_id, &record.zone_id, &record.record_id);
                        store.delete(ctx, &key).await?;
                    }
                }
            }
            Observation::DistributionObserved {
                distribution,
                origins,
                origin_groups,
            } => {
                sync_distribution(
                    store,
                    ctx,
                    distribution.clone(),
                    origins.clone(),
                    origin_groups.clone(),
                )
                .await?;
            }
            Observation::DistributionDeleted { distribution } => {
                let key = NaturalKey::distribution(
                    &distribution.account_id,
                    &distribution.distribution_id,
                );
                store.delete(ctx, &key).await?;
            }
            Observation::EnvironmentCreated { environment } => {
                store
                    .upsert(ctx, Entity::Environment(environment.clone()))
                    .await?;
            }
            Observation::EnvironmentTerminated { environment } => {
                let key =
                    NaturalKey::environment(&environment.account_id, &environment.environment_id);
                store.delete(ctx, &key).await?;
            }
            Observation::BucketCreated { bucket } => {
                store.upsert(ctx, Entity::Bucket(bucket.clone())).await?;
            }
            Observation::BucketDeleted { bucket } => {
                store
                    .delete(ctx, &NaturalKey::bucket(&bucket.account_id, &bucket.bucket_id))
                    .await?;
            }
        }

        tracing::info!(event = observation.label(), "Observation applied");
        Ok(())
    }
}
