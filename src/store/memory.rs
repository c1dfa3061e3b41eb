//! In-memory relationship store
//!
//! `Graph` holds the rows plus two secondary indexes (Value → referrers,
//! public name → owners). It is shared with the file-backed store, which
//! persists the rows and rebuilds the indexes on load.

use super::{EntityFilter, Referrer, RelationshipStore, StoreInfo};
use crate::error::{InquisitorError, Result};
use crate::invocation::Invocation;
use crate::model::{Account, Entity, NaturalKey, StoredEntity, Value, Zone};
use crate::types::{normalize_name, ResourceKind};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// Rows and indexes of the relationship graph
#[derive(Debug, Clone, Default)]
pub(crate) struct Graph {
    next_id: u64,
    rows: BTreeMap<NaturalKey, StoredEntity>,
    /// Value id → keys of pointer entities targeting it
    referrers: BTreeMap<String, BTreeSet<NaturalKey>>,
    /// Public name → keys of entities exposing it
    owners: BTreeMap<String, BTreeSet<NaturalKey>>,
}

impl Graph {
    /// Rebuild a graph from persisted rows
    pub(crate) fn from_rows(rows: Vec<StoredEntity>) -> Self {
        let mut graph = Graph::default();
        for row in rows {
            graph.next_id = graph.next_id.max(row.surrogate_id);
            graph.index(&row.entity);
            graph.rows.insert(row.key(), row);
        }
        graph
    }

    /// Rows in natural-key order
    pub(crate) fn rows(&self) -> Vec<StoredEntity> {
        self.rows.values().cloned().collect()
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn index(&mut self, entity: &Entity) {
        let key = entity.natural_key();
        for target in entity.targets() {
            self.referrers.entry(target).or_default().insert(key.clone());
        }
        for name in entity.public_names() {
            self.owners.entry(name).or_default().insert(key.clone());
        }
    }

    fn unindex(&mut self, entity: &Entity) {
        let key = entity.natural_key();
        for target in entity.targets() {
            if let Some(set) = self.referrers.get_mut(&target) {
                set.remove(&key);
                if set.is_empty() {
                    self.referrers.remove(&target);
                }
            }
        }
        for name in entity.public_names() {
            if let Some(set) = self.owners.get_mut(&name) {
                set.remove(&key);
                if set.is_empty() {
                    self.owners.remove(&name);
                }
            }
        }
    }

    /// Insert a row that carries no dependencies (Account, Value, Zone stub)
    fn ensure(&mut self, entity: Entity) {
        let key = entity.natural_key();
        if !self.rows.contains_key(&key) {
            let surrogate_id = self.allocate();
            self.index(&entity);
            self.rows.insert(key, StoredEntity { surrogate_id, entity });
        }
    }

    pub(crate) fn upsert(&mut self, mut entity: Entity) -> Result<StoredEntity> {
        entity.normalize();
        let key = entity.natural_key();

        if key.id.is_empty() || key.account_id.as_deref() == Some("") {
            return Err(InquisitorError::Store(format!(
                "Entity has an empty natural key: {}",
                key
            )));
        }
        if entity.kind().is_referrer() && entity.targets().is_empty() {
            return Err(InquisitorError::Store(format!(
                "Pointer entity {} has no target values",
                key
            )));
        }

        // Parents: a child without its distribution is an ordering error
        // upstream, zones and accounts are created on demand.
        if let Some(dist_key) = entity.parent_distribution() {
            if !self.rows.contains_key(&dist_key) {
                return Err(InquisitorError::NotFound(format!(
                    "Owning distribution {} of {}",
                    dist_key, key
                )));
            }
        }
        if let Some(account_id) = entity.account_id() {
            if entity.kind() != ResourceKind::Account {
                self.ensure(Entity::Account(Account {
                    account_id: account_id.to_string(),
                }));
            }
        }
        if let Entity::Record(record) = &entity {
            self.ensure(Entity::Zone(Zone {
                zone_id: record.zone_id.clone(),
                account_id: record.account_id.clone(),
                name: String::new(),
                service_type: String::new(),
            }));
        }
        for target in entity.targets() {
            self.ensure(Entity::Value(Value { value_id: target }));
        }

        match self.rows.get(&key).cloned() {
            Some(mut existing) => {
                let before = existing.entity.clone();
                if existing.entity.absorb(&entity) {
                    self.unindex(&before);
                    self.index(&existing.entity);
                    self.rows.insert(key.clone(), existing.clone());
                    tracing::debug!(key = %key, id = existing.surrogate_id, "Entity updated");
                }
                Ok(existing)
            }
            None => {
                let stored = StoredEntity {
                    surrogate_id: self.allocate(),
                    entity,
                };
                self.index(&stored.entity);
                self.rows.insert(key.clone(), stored.clone());
                tracing::debug!(key = %key, id = stored.surrogate_id, "Entity created");
                Ok(stored)
            }
        }
    }

    fn dependents(&self, key: &NaturalKey) -> usize {
        match key.kind {
            ResourceKind::Value => self.referrers.get(&key.id).map_or(0, BTreeSet::len),
            ResourceKind::Account => self
                .rows
                .keys()
                .filter(|k| k.kind != ResourceKind::Account)
                .filter(|k| k.account_id.as_deref() == Some(key.id.as_str()))
                .count(),
            ResourceKind::Zone => self
                .rows
                .keys()
                .filter(|k| k.kind == ResourceKind::Record)
                .filter(|k| k.account_id == key.account_id)
                .filter(|k| k.parent_id.as_deref() == Some(key.id.as_str()))
                .count(),
            _ => 0,
        }
    }

    fn remove(&mut self, key: &NaturalKey) {
        if let Some(row) = self.rows.remove(key) {
            self.unindex(&row.entity);
            tracing::debug!(key = %key, id = row.surrogate_id, "Entity deleted");
        }
    }

    pub(crate) fn delete(&mut self, key: &NaturalKey) -> Result<()> {
        let key = match key.kind {
            ResourceKind::Value => NaturalKey::value(&key.id),
            ResourceKind::Record => NaturalKey {
                id: normalize_name(&key.id).to_string(),
                ..key.clone()
            },
            _ => key.clone(),
        };
        if !self.rows.contains_key(&key) {
            return Ok(());
        }

        let dependents = self.dependents(&key);
        if dependents > 0 {
            return Err(InquisitorError::InUse {
                key: key.to_string(),
                dependents,
            });
        }

        if key.kind == ResourceKind::Distribution {
            for child in self.child_keys(&key) {
                self.remove(&child);
            }
        }
        self.remove(&key);
        Ok(())
    }

    pub(crate) fn get(&self, key: &NaturalKey) -> Option<StoredEntity> {
        self.rows.get(key).cloned()
    }

    pub(crate) fn find(&self, kind: ResourceKind, filter: EntityFilter<'_>) -> Vec<StoredEntity> {
        self.rows
            .values()
            .filter(|row| row.kind() == kind && filter(&row.entity))
            .cloned()
            .collect()
    }

    pub(crate) fn find_referrers(&self, value_id: &str) -> Vec<Referrer> {
        let value_id = normalize_name(value_id);
        let Some(keys) = self.referrers.get(value_id) else {
            return Vec::new();
        };
        keys.iter()
            .filter_map(|k| self.rows.get(k))
            .map(|row| {
                let owner = row
                    .entity
                    .parent_distribution()
                    .and_then(|dist| self.rows.get(&dist))
                    .unwrap_or(row)
                    .clone();
                Referrer {
                    entity: row.clone(),
                    owner,
                    value_id: value_id.to_string(),
                }
            })
            .collect()
    }

    pub(crate) fn find_owners(&self, name: &str) -> Vec<StoredEntity> {
        self.owners
            .get(normalize_name(name))
            .map(|keys| keys.iter().filter_map(|k| self.rows.get(k)).cloned().collect())
            .unwrap_or_default()
    }

    fn child_keys(&self, distribution: &NaturalKey) -> Vec<NaturalKey> {
        self.rows
            .values()
            .filter(|row| row.entity.parent_distribution().as_ref() == Some(distribution))
            .map(StoredEntity::key)
            .collect()
    }

    pub(crate) fn children(&self, distribution: &NaturalKey) -> Vec<StoredEntity> {
        self.child_keys(distribution)
            .iter()
            .filter_map(|k| self.rows.get(k))
            .cloned()
            .collect()
    }

    pub(crate) fn info(&self, backend: &str) -> StoreInfo {
        let mut counts = BTreeMap::new();
        for key in self.rows.keys() {
            *counts.entry(key.kind.to_string()).or_insert(0) += 1;
        }
        StoreInfo {
            backend: backend.to_string(),
            entities: self.rows.len(),
            counts,
            edges: self.referrers.values().map(BTreeSet::len).sum(),
        }
    }
}

/// In-memory relationship store for development and testing
///
/// Lost on drop. Writes are serialized by a single lock, which makes
/// concurrent upserts of the same natural key last-writer-wins.
#[derive(Default)]
pub struct MemoryRelationshipStore {
    graph: RwLock<Graph>,
}

impl MemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipStore for MemoryRelationshipStore {
    async fn upsert(&self, ctx: &Invocation, entity: Entity) -> Result<StoredEntity> {
        ctx.check("upsert")?;
        self.graph.write().await.upsert(entity)
    }

    async fn delete(&self, ctx: &Invocation, key: &NaturalKey) -> Result<()> {
        ctx.check("delete")?;
        self.graph.write().await.delete(key)
    }

    async fn get(&self, ctx: &Invocation, key: &NaturalKey) -> Result<Option<StoredEntity>> {
        ctx.check("get")?;
        Ok(self.graph.read().await.get(key))
    }

    async fn find(
        &self,
        ctx: &Invocation,
        kind: ResourceKind,
        filter: EntityFilter<'_>,
    ) -> Result<Vec<StoredEntity>> {
        ctx.check("find")?;
        Ok(self.graph.read().await.find(kind, filter))
    }

    async fn find_referrers(&self, ctx: &Invocation, value_id: &str) -> Result<Vec<Referrer>> {
        ctx.check("find_referrers")?;
        Ok(self.graph.read().await.find_referrers(value_id))
    }

    async fn find_owners(&self, ctx: &Invocation, name: &str) -> Result<Vec<StoredEntity>> {
        ctx.check("find_owners")?;
        Ok(self.graph.read().await.find_owners(name))
    }

    async fn children(
        &self,
        ctx: &Invocation,
        distribution: &NaturalKey,
    ) -> Result<Vec<StoredEntity>> {
        ctx.check("children")?;
        Ok(self.graph.read().await.children(distribution))
    }

    async fn info(&self, ctx: &Invocation) -> Result<StoreInfo> {
        ctx.check("info")?;
        Ok(self.graph.read().await.info(self.name()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
