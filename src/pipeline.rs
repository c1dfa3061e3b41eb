//! Invocation drivers for the two audit paths
//!
//! - [`TagAuditPipeline`]: refresh a resource, climb its escalation ladder,
//!   remediate, record the decision, persist the counter (cleared once the
//!   owner fixes the tags).
//! - [`HijackPipeline`]: apply an observed change to the relationship graph,
//!   resolve the chain it exposes, notify when there is something to report.

use crate::adapter::ResourceAdapter;
use crate::config::InquisitorConfig;
use crate::error::Result;
use crate::escalation::EscalationEngine;
use crate::invocation::Invocation;
use crate::ledger::{ActionLedger, LedgerEntry};
use crate::notify::Notifier;
use crate::observe::{ChangeTracker, GraphUpdater, Observation};
use crate::poll::PollPolicy;
use crate::resolver::HijackResolver;
use crate::state::EscalationStore;
use crate::store::RelationshipStore;
use crate::types::{Action, Chain, Direction, EscalationRecord};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of one tag audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub resource_id: String,
    pub action: Action,
    /// Record as persisted after this run
    pub record: EscalationRecord,
    pub missing_tags: Vec<String>,
    /// The ladder stopped: the owner fixed the tags or the ladder overflowed
    pub finished: bool,
}

pub struct TagAuditPipeline {
    engine: EscalationEngine,
    state: Arc<dyn EscalationStore>,
    ledger: Arc<dyn ActionLedger>,
}

impl TagAuditPipeline {
    pub fn new(
        engine: EscalationEngine,
        state: Arc<dyn EscalationStore>,
        ledger: Arc<dyn ActionLedger>,
    ) -> Self {
        Self {
            engine,
            state,
            ledger,
        }
    }

    /// Build from configuration; fails on missing tags or action mode
    pub fn from_config(
        config: &InquisitorConfig,
        state: Arc<dyn EscalationStore>,
        ledger: Arc<dyn ActionLedger>,
    ) -> Result<Self> {
        Ok(Self::new(EscalationEngine::from_config(config)?, state, ledger))
    }

    pub fn engine(&self) -> &EscalationEngine {
        &self.engine
    }

    /// Audit one resource end to end
    ///
    /// The advanced counter is persisted only after the action succeeded, so
    /// a retried invocation repeats the same rung instead of skipping it.
    /// A compliant resource clears its record, so a later regression starts
    /// the ladder again at `NOTIFY`.
    pub async fn run(
        &self,
        ctx: &Invocation,
        adapter: &mut dyn ResourceAdapter,
    ) -> Result<AuditReport> {
        adapter.refresh_state(ctx).await?;

        let record = self.state.load(adapter.resource_id())?;
        let outcome = self.engine.audit(record, adapter.tags())?;

        let entry = LedgerEntry::new(
            ctx,
            adapter.account_id(),
            adapter.resource_id(),
            adapter.kind(),
            outcome.action,
            self.engine.mode(),
        );

        if let Err(e) = self.engine.take_action(ctx, outcome.action, adapter).await {
            tracing::error!(
                resource = %adapter.resource_id(),
                action = %outcome.action,
                error = %e,
                metadata = ?adapter.metadata(),
                "Action failed"
            );
            self.ledger.commit(entry.with_error(&e)).await?;
            return Err(e);
        }
        self.ledger.commit(entry).await?;

        let record = if outcome.action == Action::FixedByUser {
            self.state.clear(adapter.resource_id())?;
            EscalationRecord::new(adapter.resource_id())
        } else {
            self.state.save(&outcome.record)?;
            outcome.record
        };

        Ok(AuditReport {
            resource_id: adapter.resource_id().to_string(),
            action: outcome.action,
            finished: matches!(outcome.action, Action::FixedByUser | Action::Error),
            record,
            missing_tags: outcome.missing_tags,
        })
    }
}

/// Outcome of one hijack audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HijackOutcome {
    /// Chain resolved for the change; `None` when the change triggers no scan
    pub chain: Option<Chain>,
    /// Message id when a notification went out
    pub message_id: Option<String>,
}

/// Whether a resolved chain is worth a notification
///
/// Upstream: anyone still pointing at the removed name. Downstream: only
/// targets that no longer exist.
pub fn warrants_notification(chain: &Chain) -> bool {
    match chain.direction {
        Direction::Upstream => !chain.is_empty(),
        Direction::Downstream => chain.dangling().next().is_some(),
    }
}

pub struct HijackPipeline {
    updater: GraphUpdater,
    resolver: HijackResolver,
    notifier: Arc<dyn Notifier>,
    subject: String,
    recipients: Vec<String>,
    storage_domain: String,
}

impl HijackPipeline {
    pub fn from_config(
        config: &InquisitorConfig,
        store: Arc<dyn RelationshipStore>,
        tracker: Arc<dyn ChangeTracker>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let updater = GraphUpdater::new(store.clone(), tracker)
            .with_poll_policy(PollPolicy::from(&config.polling));
        let resolver = HijackResolver::new(store).with_max_depth(config.hijack.max_depth);
        Self {
            updater,
            resolver,
            notifier,
            subject: config.notification.subject.clone(),
            recipients: config.notification.recipients.clone(),
            storage_domain: config.hijack.storage_domain_suffix.clone(),
        }
    }

    pub fn resolver(&self) -> &HijackResolver {
        &self.resolver
    }

    /// Apply one observation and report the exposure it reveals
    ///
    /// Names of a row the change deletes are read before the delete, so an
    /// event that only carries ids still scans what the row exposed.
    pub async fn run(&self, ctx: &Invocation, observation: Observation) -> Result<HijackOutcome> {
        let observation = observation.with_storage_domain(&self.storage_domain);

        let stored_names = match observation.removed_key() {
            Some(key) => self
                .updater
                .store()
                .get(ctx, &key)
                .await?
                .map(|stored| stored.entity.public_names())
                .unwrap_or_default(),
            None => Vec::new(),
        };

        self.updater.apply(ctx, &observation).await?;

        let Some(scan) = observation.hijack_scan_with(&stored_names) else {
            return Ok(HijackOutcome {
                chain: None,
                message_id: None,
            });
        };

        let chain = self
            .resolver
            .resolve(ctx, &scan.root, &scan.names, scan.direction)
            .await?;

        let message_id = if warrants_notification(&chain) {
            let id = self
                .notifier
                .send_notification(ctx, &self.subject, &self.recipients, &chain)
                .await?;
            tracing::info!(
                root = %chain.root_resource_id,
                message_id = %id,
                notifier = self.notifier.name(),
                "Hijack notification sent"
            );
            Some(id)
        } else {
            None
        };

        Ok(HijackOutcome {
            chain: Some(chain),
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChainElement, ResourceKind};

    fn element(dangling: bool) -> ChainElement {
        ChainElement {
            resource_id: "x".to_string(),
            resource_type: ResourceKind::Bucket,
            account_id: None,
            referenced_value: "x.s3.amazonaws.com".to_string(),
            depth: 1,
            dangling,
        }
    }

    #[test]
    fn test_warrants_notification() {
        let mut up = Chain::new("E1", Direction::Upstream);
        assert!(!warrants_notification(&up));
        up.elements.push(element(false));
        assert!(warrants_notification(&up));

        let mut down = Chain::new("E1", Direction::Downstream);
        down.elements.push(element(false));
        assert!(!warrants_notification(&down));
        down.elements.push(element(true));
        assert!(warrants_notification(&down));
    }
}
