//! JSON file-backed relationship store
//!
//! Persists every row as pretty JSON after each write. Atomic writes via
//! temp file + rename keep the file readable if the process dies mid-save.
//! Indexes are rebuilt from the rows on open. A write is applied to a copy
//! of the graph and only becomes visible once it is on disk.

use super::memory::Graph;
use super::{EntityFilter, Referrer, RelationshipStore, StoreInfo};
use crate::error::{InquisitorError, Result};
use crate::invocation::Invocation;
use crate::model::{Entity, NaturalKey, StoredEntity};
use crate::types::ResourceKind;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Relationship store persisted to a single JSON file
pub struct FileRelationshipStore {
    path: PathBuf,
    graph: RwLock<Graph>,
}

impl FileRelationshipStore {
    /// Open the store at `path`, loading existing rows if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rows = load_rows(&path)?;
        tracing::debug!(path = %path.display(), rows = rows.len(), "Relationship store opened");
        Ok(Self {
            graph: RwLock::new(Graph::from_rows(rows)),
            path,
        })
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, graph: &Graph) -> Result<()> {
        save_rows(&self.path, &graph.rows())
    }
}

fn load_rows(path: &Path) -> Result<Vec<StoredEntity>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let json = std::fs::read_to_string(path).map_err(|e| {
        InquisitorError::Store(format!(
            "Failed to read store file {}: {}",
            path.display(),
            e
        ))
    })?;

    serde_json::from_str(&json).map_err(|e| {
        InquisitorError::Store(format!(
            "Failed to parse store file {}: {}",
            path.display(),
            e
        ))
    })
}

fn save_rows(path: &Path, rows: &[StoredEntity]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)?;
    let tmp_path = path.with_extension("tmp");

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                InquisitorError::Store(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    std::fs::write(&tmp_path, json).map_err(|e| {
        InquisitorError::Store(format!(
            "Failed to write store file {}: {}",
            tmp_path.display(),
            e
        ))
    })?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        InquisitorError::Store(format!(
            "Failed to rename store file {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        ))
    })?;

    tracing::debug!(path = %path.display(), rows = rows.len(), "Relationship store saved");
    Ok(())
}

#[async_trait]
impl RelationshipStore for FileRelationshipStore {
    async fn upsert(&self, ctx: &Invocation, entity: Entity) -> Result<StoredEntity> {
        ctx.check("upsert")?;
        let mut graph = self.graph.write().await;
        let mut next = graph.clone();
        let stored = next.upsert(entity)?;
        self.persist(&next)?;
        *graph = next;
        Ok(stored)
    }

    async fn delete(&self, ctx: &Invocation, key: &NaturalKey) -> Result<()> {
        ctx.check("delete")?;
        let mut graph = self.graph.write().await;
        let mut next = graph.clone();
        next.delete(key)?;
        self.persist(&next)?;
        *graph = next;
        Ok(())
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
        "file"
    }
}
