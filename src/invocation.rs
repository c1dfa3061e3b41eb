//! Per-invocation context
//!
//! Every audit or hijack resolution runs under one `Invocation`. It carries
//! the workflow/step identifiers used in logs and ledger entries, plus the
//! caller's cancellation token and deadline. It is threaded as `&Invocation`
//! through every store, provider, notifier, and polling call.

use crate::error::{InquisitorError, Result};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Context of a single triggered invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Identifier shared by every step of one workflow run
    pub workflow_id: String,

    /// Identifier of this step within the workflow
    pub step_id: String,

    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Invocation {
    fn default() -> Self {
        Self::new()
    }
}

impl Invocation {
    /// Fresh context with generated ids, no deadline
    pub fn new() -> Self {
        Self {
            workflow_id: uuid::Uuid::new_v4().to_string(),
            step_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Context for a step of an existing workflow
    pub fn for_workflow(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            ..Self::new()
        }
    }

    /// Set the deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Derive a sub-step: same workflow, new step id, child token
    ///
    /// Cancelling the parent cancels the child, never the reverse.
    pub fn child(&self) -> Self {
        Self {
            workflow_id: self.workflow_id.clone(),
            step_id: uuid::Uuid::new_v4().to_string(),
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this invocation and every child derived from it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token to race against long waits
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail fast if the invocation was cancelled or its deadline passed
    pub fn check(&self, op: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(InquisitorError::Cancelled(op.to_string()));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(InquisitorError::Timeout(op.to_string()));
            }
        }
        Ok(())
    }

    /// Identifiers for structured logging and ledger entries
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        meta.insert("workflowId".to_string(), self.workflow_id.clone());
        meta.insert("stepId".to_string(), self.step_id.clone());
        meta
    }
}
