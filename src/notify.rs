//! Hijack notifications
//!
//! [`HijackReport`] turns a chain into ordered "resource → referenced" lines;
//! a [`Notifier`] delivers it. Delivery backends are pluggable; the crate
//! ships an in-memory notifier for tests and one that writes to the log.

use crate::error::{InquisitorError, Result};
use crate::invocation::Invocation;
use crate::types::{Chain, Direction};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Placeholder for a line with nothing referenced
pub const NOT_APPLICABLE: &str = "not applicable";

/// Trait for notification backends
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a chain, returning the backend message id
    async fn send_notification(
        &self,
        ctx: &Invocation,
        subject: &str,
        recipients: &[String],
        chain: &Chain,
    ) -> Result<String>;

    /// Backend name (e.g., "memory", "log")
    fn name(&self) -> &str;
}

/// One rendered line of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLine {
    pub account_id: String,
    pub resource: String,
    pub resource_type: String,
    pub referenced: String,
    pub dangling: bool,
}

/// Human-oriented view of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HijackReport {
    pub root_resource_id: String,
    pub direction: Direction,
    pub lines: Vec<ReportLine>,
    pub unresolved: Vec<String>,
    pub truncated: bool,
}

impl HijackReport {
    pub fn from_chain(chain: &Chain) -> Self {
        let lines = chain
            .elements
            .iter()
            .map(|e| ReportLine {
                account_id: e
                    .account_id
                    .clone()
                    .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
                resource: e.resource_id.clone(),
                resource_type: e.resource_type.to_string(),
                referenced: if e.referenced_value.is_empty() {
                    NOT_APPLICABLE.to_string()
                } else {
                    e.referenced_value.clone()
                },
                dangling: e.dangling,
            })
            .collect();

        Self {
            root_resource_id: chain.root_resource_id.clone(),
            direction: chain.direction,
            lines,
            unresolved: chain.unresolved.clone(),
            truncated: chain.truncated,
        }
    }

    /// Plain-text message body
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Potential hijack chain for {} ({})\n\n",
            self.root_resource_id, self.direction
        );

        if self.lines.is_empty() {
            out.push_str("  no exposure found\n");
        }
        for line in &self.lines {
            out.push_str(&format!(
                "  [{}] {} {} -> {}{}\n",
                line.account_id,
                line.resource_type,
                line.resource,
                line.referenced,
                if line.dangling { " (dangling)" } else { "" }
            ));
        }

        if !self.unresolved.is_empty() {
            out.push_str(&format!(
                "\nPartial chain, lookups failed for: {}\n",
                self.unresolved.join(", ")
            ));
        }
        if self.truncated {
            out.push_str("\nTraversal stopped at the depth limit\n");
        }
        out
    }
}

/// A notification captured by [`MemoryNotifier`]
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub message_id: String,
    pub subject: String,
    pub recipients: Vec<String>,
    pub report: HijackReport,
    pub body: String,
}

/// In-memory notifier for development and testing
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Arc<RwLock<Vec<SentNotification>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send_notification(
        &self,
        ctx: &Invocation,
        subject: &str,
        recipients: &[String],
        chain: &Chain,
    ) -> Result<String> {
        ctx.check("send_notification")?;
        if recipients.is_empty() {
            return Err(InquisitorError::Notification(
                "no recipients configured".to_string(),
            ));
        }

        let report = HijackReport::from_chain(chain);
        let message = SentNotification {
            message_id: uuid::Uuid::new_v4().to_string(),
            subject: subject.to_string(),
            recipients: recipients.to_vec(),
            body: report.render_text(),
            report,
        };
        let id = message.message_id.clone();
        self.sent.write().await.push(message);
        Ok(id)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Notifier that writes the report to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_notification(
        &self,
        ctx: &Invocation,
        subject: &str,
        recipients: &[String],
        chain: &Chain,
    ) -> Result<String> {
        ctx.check("send_notification")?;
        let message_id = uuid::Uuid::new_v4().to_string();
        let report = HijackReport::from_chain(chain);
        tracing::warn!(
            message_id = %message_id,
            workflow = %ctx.workflow_id,
            subject = %subject,
            recipients = ?recipients,
            root = %report.root_resource_id,
            elements = report.lines.len(),
            "{}",
            report.render_text()
        );
        Ok(message_id)
    }

    fn name(&self) -> &str {
        "log"
    }
}
