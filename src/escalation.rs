//! Escalation engine: tag compliance audit and remediation ladder
//!
//! A non-compliant resource climbs a fixed ladder keyed by its persisted
//! counter: three notifications, then prevent, then remove. Past the top the
//! engine answers [`Action::Error`] and resets the counter so the caller can
//! re-enter the ladder. A compliant resource gets [`Action::FixedByUser`]
//! and the engine leaves its counter untouched; the pipeline clears the
//! stored record so a later regression starts again at notify.

use crate::adapter::{ActionSettings, ResourceAdapter};
use crate::config::InquisitorConfig;
use crate::error::{InquisitorError, Result};
use crate::invocation::Invocation;
use crate::types::{Action, ActionMode, EscalationRecord, Tags};
use std::collections::HashSet;

/// Result of one audit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditOutcome {
    pub action: Action,
    /// Record to persist for the next invocation
    pub record: EscalationRecord,
    /// Required tags absent from the resource, in configured order
    pub missing_tags: Vec<String>,
}

/// Ladder position → action, without touching the counter
pub fn ladder_action(counter: u32) -> Action {
    match counter {
        0..=2 => Action::Notify,
        3 => Action::Prevent,
        4 => Action::Remove,
        _ => Action::Error,
    }
}

pub struct EscalationEngine {
    required_tags: Vec<String>,
    required_lower: Vec<String>,
    mode: ActionMode,
    settings: ActionSettings,
}

impl EscalationEngine {
    pub fn new(required_tags: Vec<String>, mode: ActionMode) -> Self {
        let required_lower = required_tags.iter().map(|t| t.to_lowercase()).collect();
        Self {
            required_tags,
            required_lower,
            mode,
            settings: ActionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ActionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build from configuration; missing tags or mode is a configuration error
    pub fn from_config(config: &InquisitorConfig) -> Result<Self> {
        let tags = config.required_tags()?.to_vec();
        let mode = config.action_mode()?;
        Ok(Self::new(tags, mode).with_settings(ActionSettings::from_config(config)))
    }

    pub fn mode(&self) -> ActionMode {
        self.mode
    }

    pub fn required_tags(&self) -> &[String] {
        &self.required_tags
    }

    /// Required tags not present in `tags`, compared case-insensitively
    pub fn missing_tags(&self, tags: &Tags) -> Vec<String> {
        let present: HashSet<String> = tags.keys().map(|k| k.to_lowercase()).collect();
        self.required_tags
            .iter()
            .zip(&self.required_lower)
            .filter(|(_, lower)| !present.contains(*lower))
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    pub fn is_compliant(&self, tags: &Tags) -> bool {
        self.missing_tags(tags).is_empty()
    }

    /// Decide the next action and advance the record
    pub fn audit(&self, record: EscalationRecord, tags: &Tags) -> Result<AuditOutcome> {
        if self.required_tags.is_empty() {
            return Err(InquisitorError::Config(
                "required tag list is empty".to_string(),
            ));
        }

        let missing_tags = self.missing_tags(tags);
        if missing_tags.is_empty() {
            tracing::info!(
                resource = %record.resource_id,
                counter = record.counter,
                "Resource compliant"
            );
            return Ok(AuditOutcome {
                action: Action::FixedByUser,
                record,
                missing_tags,
            });
        }

        let action = ladder_action(record.counter);
        let counter = match action {
            Action::Error => 0,
            _ => record.counter + 1,
        };

        tracing::info!(
            resource = %record.resource_id,
            counter = record.counter,
            next_counter = counter,
            action = %action,
            missing = ?missing_tags,
            "Resource non-compliant"
        );

        Ok(AuditOutcome {
            action,
            record: record.with_counter(counter),
            missing_tags,
        })
    }

    /// Execute an action against the adapter according to the action mode
    ///
    /// Dry-run logs and succeeds without any provider call. In normal mode
    /// only Prevent and Remove reach the adapter; a Remove whose target is
    /// already gone succeeds.
    pub async fn take_action(
        &self,
        ctx: &Invocation,
        action: Action,
        adapter: &mut dyn ResourceAdapter,
    ) -> Result<()> {
        ctx.check("take_action")?;

        if self.mode == ActionMode::DryRun {
            tracing::info!(
                resource = %adapter.resource_id(),
                account = %adapter.account_id(),
                action = %action,
                mode = %self.mode,
                "Dry run, no provider call"
            );
            return Ok(());
        }

        if !action.is_remediation() {
            tracing::debug!(resource = %adapter.resource_id(), action = %action, "No remediation needed");
            return Ok(());
        }

        tracing::info!(
            resource = %adapter.resource_id(),
            account = %adapter.account_id(),
            kind = %adapter.kind(),
            action = %action,
            mode = %self.mode,
            "Taking action"
        );

        match adapter.take_action(ctx, action, &self.settings).await {
            Err(e) if action == Action::Remove && e.is_not_found() => {
                tracing::info!(resource = %adapter.resource_id(), "Already removed");
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> EscalationEngine {
        EscalationEngine::new(vec!["Owner".to_string(), "Team".to_string()], ActionMode::Normal)
    }

    fn tags(keys: &[&str]) -> Tags {
        keys.iter()
            .map(|k| (k.to_string(), "x".to_string()))
            .collect()
    }

    #[test]
    fn test_ladder() {
        assert_eq!(ladder_action(0), Action::Notify);
        assert_eq!(ladder_action(2), Action::Notify);
        assert_eq!(ladder_action(3), Action::Prevent);
        assert_eq!(ladder_action(4), Action::Remove);
        assert_eq!(ladder_action(5), Action::Error);
        assert_eq!(ladder_action(u32::MAX), Action::Error);
    }

    #[test]
    fn test_audit_advances_counter() {
        let outcome = engine()
            .audit(EscalationRecord::new("db-1"), &tags(&["Owner"]))
            .unwrap();
        assert_eq!(outcome.action, Action::Notify);
        assert_eq!(outcome.record.counter, 1);
        assert_eq!(outcome.missing_tags, vec!["Team"]);
    }

    #[test]
    fn test_error_resets_counter() {
        let outcome = engine()
            .audit(EscalationRecord::new("db-1").with_counter(9), &Tags::new())
            .unwrap();
        assert_eq!(outcome.action, Action::Error);
        assert_eq!(outcome.record.counter, 0);
    }

    #[test]
    fn test_compliant_keeps_counter() {
        let outcome = engine()
            .audit(
                EscalationRecord::new("db-1").with_counter(4),
                &tags(&["owner", "TEAM", "extra"]),
            )
            .unwrap();
        assert_eq!(outcome.action, Action::FixedByUser);
        assert_eq!(outcome.record.counter, 4);
        assert!(outcome.missing_tags.is_empty());
    }

    #[test]
    fn test_empty_required_tags_is_config_error() {
        let engine = EscalationEngine::new(vec![], ActionMode::DryRun);
        let err = engine
            .audit(EscalationRecord::new("db-1"), &Tags::new())
            .unwrap_err();
        assert!(matches!(err, InquisitorError::Config(_)));
    }

    #[test]
    fn test_from_config_validates() {
        let mut config = InquisitorConfig::default();
        assert!(EscalationEngine::from_config(&config).is_err());

        config.auditing.required_tags = vec!["Owner".to_string()];
        assert!(EscalationEngine::from_config(&config).is_err());

        config.actions.mode = Some(ActionMode::DryRun);
        let engine = EscalationEngine::from_config(&config).unwrap();
        assert_eq!(engine.mode(), ActionMode::DryRun);
        assert_eq!(engine.required_tags(), ["Owner"]);
    }
}
