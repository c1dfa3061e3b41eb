//! Action ledger: record of every remediation decision
//!
//! Each action the tag-audit pipeline takes (or skips in dry-run) is
//! committed with the invocation identifiers and the error text, if any.
//! Durable ledgers live behind the [`ActionLedger`] trait; the in-memory
//! ledger keeps a bounded window of recent entries.

use crate::error::Result;
use crate::invocation::Invocation;
use crate::types::{Action, ActionMode, ResourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One committed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub workflow_id: String,
    pub step_id: String,
    pub account_id: String,
    pub resource_id: String,
    pub resource_type: ResourceKind,
    pub action: Action,
    pub mode: ActionMode,
    /// Error text when the action failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub action_time: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        ctx: &Invocation,
        account_id: impl Into<String>,
        resource_id: impl Into<String>,
        resource_type: ResourceKind,
        action: Action,
        mode: ActionMode,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: ctx.workflow_id.clone(),
            step_id: ctx.step_id.clone(),
            account_id: account_id.into(),
            resource_id: resource_id.into(),
            resource_type,
            action,
            mode,
            error: None,
            action_time: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Trait for action ledgers
#[async_trait]
pub trait ActionLedger: Send + Sync {
    /// Commit an entry
    async fn commit(&self, entry: LedgerEntry) -> Result<()>;

    /// Number of entries held
    async fn count(&self) -> Result<usize>;

    /// Most recent entries, newest first
    async fn list(&self, limit: usize) -> Result<Vec<LedgerEntry>>;
}

/// In-memory ledger for development and testing
///
/// Stores entries in a `Vec` with configurable max capacity; the oldest
/// entries are dropped first.
pub struct MemoryActionLedger {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
    max_entries: usize,
}

impl MemoryActionLedger {
    /// Create a ledger holding at most `max_entries` (0 = unbounded)
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            max_entries,
        }
    }
}

impl Default for MemoryActionLedger {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl ActionLedger for MemoryActionLedger {
    async fn commit(&self, entry: LedgerEntry) -> Result<()> {
        tracing::info!(
            resource = %entry.resource_id,
            account = %entry.account_id,
            action = %entry.action,
            mode = %entry.mode,
            error = entry.error.as_deref().unwrap_or(""),
            "Action committed to ledger"
        );

        let mut entries = self.entries.write().await;
        entries.push(entry);

        // Enforce max capacity
        if self.max_entries > 0 && entries.len() > self.max_entries {
            let drain_count = entries.len() - self.max_entries;
            entries.drain(..drain_count);
        }

        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let entries = self.entries.read().await;
        Ok(entries.len())
    }

    async fn list(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}
