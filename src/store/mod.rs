//! Relationship store: persistent keyed graph of cloud entities
//!
//! Upsert-by-natural-key is the only write primitive besides idempotent
//! delete. Reads come back ordered by natural key so that traversals over
//! an unmodified store are deterministic.

use crate::error::Result;
use crate::invocation::Invocation;
use crate::model::{Distribution, Entity, NaturalKey, Origin, OriginGroup, StoredEntity};
use crate::types::ResourceKind;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub mod file;
pub mod memory;

pub use file::FileRelationshipStore;
pub use memory::MemoryRelationshipStore;

/// Predicate used by [`RelationshipStore::find`]
pub type EntityFilter<'a> = &'a (dyn Fn(&Entity) -> bool + Send + Sync);

/// Core trait for relationship store backends
///
/// Every call takes the invocation context so that a cancelled or expired
/// invocation stops touching the store.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Insert if absent, otherwise update the mutable fields in place
    ///
    /// Returns the stored row. Re-applying the same observed state keeps
    /// the surrogate id and creates no duplicate rows or edges.
    async fn upsert(&self, ctx: &Invocation, entity: Entity) -> Result<StoredEntity>;

    /// Delete by natural key; deleting an absent key is not an error
    async fn delete(&self, ctx: &Invocation, key: &NaturalKey) -> Result<()>;

    /// Point lookup by natural key
    async fn get(&self, ctx: &Invocation, key: &NaturalKey) -> Result<Option<StoredEntity>>;

    /// All entities of one kind matching a predicate
    async fn find(
        &self,
        ctx: &Invocation,
        kind: ResourceKind,
        filter: EntityFilter<'_>,
    ) -> Result<Vec<StoredEntity>>;

    /// Every pointer entity whose target Value equals `value_id`
    async fn find_referrers(&self, ctx: &Invocation, value_id: &str) -> Result<Vec<Referrer>>;

    /// Every entity whose public name equals `name`
    async fn find_owners(&self, ctx: &Invocation, name: &str) -> Result<Vec<StoredEntity>>;

    /// Origins and OriginGroups of a Distribution
    async fn children(
        &self,
        ctx: &Invocation,
        distribution: &NaturalKey,
    ) -> Result<Vec<StoredEntity>>;

    /// Row and edge counts
    async fn info(&self, ctx: &Invocation) -> Result<StoreInfo>;

    /// Backend name (e.g., "memory", "file")
    fn name(&self) -> &str;

    /// Health check: true if the backend answers
    async fn health(&self, ctx: &Invocation) -> Result<bool> {
        self.info(ctx).await.map(|_| true)
    }
}

/// A pointer entity referencing a Value, with the resource that exposes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Referrer {
    /// The Record, Origin or OriginGroup holding the edge
    pub entity: StoredEntity,

    /// Resource reported in chains: the Record itself, or the owning
    /// Distribution of an Origin/OriginGroup
    pub owner: StoredEntity,

    /// The referenced Value
    pub value_id: String,
}

/// Store status information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    /// Backend name
    pub backend: String,
    /// Total rows
    pub entities: usize,
    /// Rows per kind
    pub counts: BTreeMap<String, usize>,
    /// Total pointer → Value edges
    pub edges: usize,
}

/// Result of [`sync_distribution`]
#[derive(Debug, Clone)]
pub struct DistributionSync {
    pub distribution: StoredEntity,
    /// Children deleted because the snapshot no longer lists them
    pub removed: Vec<NaturalKey>,
}

/// Apply a full distribution snapshot
///
/// Upserts the distribution and every listed origin and group, then deletes
/// stored children the snapshot no longer contains.
pub async fn sync_distribution(
    store: &dyn RelationshipStore,
    ctx: &Invocation,
    distribution: Distribution,
    origins: Vec<Origin>,
    groups: Vec<OriginGroup>,
) -> Result<DistributionSync> {
    let stored = store.upsert(ctx, Entity::Distribution(distribution)).await?;
    let dist_key = stored.key();

    let mut keep = BTreeSet::new();
    for origin in origins {
        let row = store.upsert(ctx, Entity::Origin(origin)).await?;
        keep.insert(row.key());
    }
    for group in groups {
        let row = store.upsert(ctx, Entity::OriginGroup(group)).await?;
        keep.insert(row.key());
    }

    let mut removed = Vec::new();
    for child in store.children(ctx, &dist_key).await? {
        let key = child.key();
        if !keep.contains(&key) {
            store.delete(ctx, &key).await?;
            tracing::debug!(distribution = %dist_key, child = %key, "Removed stale child");
            removed.push(key);
        }
    }

    tracing::info!(
        distribution = %dist_key,
        children = keep.len(),
        removed = removed.len(),
        "Distribution synced"
    );

    Ok(DistributionSync {
        distribution: stored,
        removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(id: &str, domain: &str) -> Origin {
        Origin {
            origin_id: id.to_string(),
            account_id: "111".to_string(),
            distribution_id: "E1".to_string(),
            domain: domain.to_string(),
        }
    }

    fn distribution() -> Distribution {
        Distribution {
            distribution_id: "E1".to_string(),
            account_id: "111".to_string(),
            domain: "d1.cloudfront.net".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sync_distribution_removes_stale_children() {
        let store = MemoryRelationshipStore::new();
        let ctx = Invocation::new();

        sync_distribution(
            &store,
            &ctx,
            distribution(),
            vec![origin("o1", "a.example.com"), origin("o2", "b.example.com")],
            vec![],
        )
        .await
        .unwrap();

        let sync = sync_distribution(
            &store,
            &ctx,
            distribution(),
            vec![origin("o1", "a.example.com")],
            vec![],
        )
        .await
        .unwrap();

        assert_eq!(sync.removed, vec![NaturalKey::origin("111", "E1", "o2")]);
        let children = store
            .children(&ctx, &NaturalKey::distribution("111", "E1"))
            .await
            .unwrap();
        assert_eq!(children.len(), 1);

        // the value of the removed origin stays behind as an orphan leaf
        let orphan = store
            .get(&ctx, &NaturalKey::value("b.example.com"))
            .await
            .unwrap();
        assert!(orphan.is_some());
    }

    #[tokio::test]
    async fn test_health_defaults_to_info() {
        let store = MemoryRelationshipStore::new();
        assert!(store.health(&Invocation::new()).await.unwrap());
    }
}
