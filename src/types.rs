//! Core types shared by the escalation engine and the hijack resolver
//!
//! All types use camelCase JSON serialization for wire compatibility.

use crate::error::{InquisitorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Tag set attached to a cloud resource (tag name → value)
pub type Tags = HashMap<String, String>;

/// Remediation action chosen by the escalation ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Tell the owner the resource is non-compliant
    Notify,
    /// Restrict access to the resource
    Prevent,
    /// Snapshot and delete the resource
    Remove,
    /// Owner fixed the tags; escalation halts
    FixedByUser,
    /// Ladder overflow; counter was reset
    Error,
    /// Nothing to do
    None,
}

impl Action {
    /// Wire name; matches the serde spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Notify => "NOTIFY",
            Action::Prevent => "PREVENT",
            Action::Remove => "REMOVE",
            Action::FixedByUser => "FIXED_BY_USER",
            Action::Error => "ERROR",
            Action::None => "NONE",
        }
    }

    /// Whether the action requires a provider call
    pub fn is_remediation(&self) -> bool {
        matches!(self, Action::Prevent | Action::Remove)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether remediation actions reach the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    /// Log what would happen, report success, call nothing
    #[serde(rename = "dryrun")]
    DryRun,
    /// Execute remediation against the provider
    Normal,
}

impl FromStr for ActionMode {
    type Err = InquisitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dryrun" => Ok(ActionMode::DryRun),
            "normal" => Ok(ActionMode::Normal),
            other => Err(InquisitorError::Config(format!(
                "Non-supported action mode: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ActionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionMode::DryRun => write!(f, "dryrun"),
            ActionMode::Normal => write!(f, "normal"),
        }
    }
}

/// Traversal direction for hijack-chain resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Who points at me
    Upstream,
    /// What do I point at
    Downstream,
}

impl FromStr for Direction {
    type Err = InquisitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upstream" | "up" => Ok(Direction::Upstream),
            "downstream" | "down" => Ok(Direction::Downstream),
            other => Err(InquisitorError::Config(format!(
                "Unknown hijack direction: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upstream => write!(f, "upstream"),
            Direction::Downstream => write!(f, "downstream"),
        }
    }
}

/// Kind of resource tracked by the relationship store or audited by an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Account,
    Zone,
    Record,
    Value,
    Distribution,
    Origin,
    OriginGroup,
    Environment,
    Bucket,
    /// Relational database instance (tag-audit path only)
    Database,
    /// A name outside every tracked resource type
    External,
}

impl ResourceKind {
    /// Leaf kinds expose names but never point anywhere
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            ResourceKind::Value
                | ResourceKind::Environment
                | ResourceKind::Bucket
                | ResourceKind::Database
                | ResourceKind::External
        )
    }

    /// Kinds that hold outgoing reference edges to Values
    pub fn is_referrer(&self) -> bool {
        matches!(
            self,
            ResourceKind::Record | ResourceKind::Origin | ResourceKind::OriginGroup
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Account => "account",
            ResourceKind::Zone => "zone",
            ResourceKind::Record => "record",
            ResourceKind::Value => "value",
            ResourceKind::Distribution => "distribution",
            ResourceKind::Origin => "origin",
            ResourceKind::OriginGroup => "originGroup",
            ResourceKind::Environment => "environment",
            ResourceKind::Bucket => "bucket",
            ResourceKind::Database => "database",
            ResourceKind::External => "external",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = InquisitorError;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "account" => ResourceKind::Account,
            "zone" => ResourceKind::Zone,
            "record" => ResourceKind::Record,
            "value" => ResourceKind::Value,
            "distribution" => ResourceKind::Distribution,
            "origin" => ResourceKind::Origin,
            "origingroup" | "origin-group" => ResourceKind::OriginGroup,
            "environment" => ResourceKind::Environment,
            "bucket" => ResourceKind::Bucket,
            "database" => ResourceKind::Database,
            "external" => ResourceKind::External,
            other => {
                return Err(InquisitorError::Config(format!(
                    "Unknown resource kind: {}",
                    other
                )))
            }
        };
        Ok(kind)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lightweight handle to the resource an invocation is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub resource_id: String,
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

impl ResourceRef {
    pub fn new(resource_id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            resource_id: resource_id.into(),
            kind,
            account_id: None,
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

/// One resource found while tracing references from the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainElement {
    pub resource_id: String,
    pub resource_type: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// The name that linked this element into the chain
    pub referenced_value: String,
    /// Traversal round that found the element (1 = direct)
    pub depth: usize,
    /// Element is a target that no longer exists in the store
    #[serde(default)]
    pub dangling: bool,
}

/// Ordered exposure chain produced by the resolver
///
/// An empty chain means no exposure was found; it is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub root_resource_id: String,
    pub direction: Direction,
    pub elements: Vec<ChainElement>,

    /// Names, or owners whose targets, could not be looked up; non-empty
    /// means the chain is partial
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,

    /// Traversal stopped at the depth limit with names still pending
    #[serde(default)]
    pub truncated: bool,
}

impl Chain {
    pub fn new(root_resource_id: impl Into<String>, direction: Direction) -> Self {
        Self {
            root_resource_id: root_resource_id.into(),
            direction,
            elements: Vec::new(),
            unresolved: Vec::new(),
            truncated: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when at least one branch failed and was skipped
    pub fn is_partial(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Elements that are missing targets
    pub fn dangling(&self) -> impl Iterator<Item = &ChainElement> {
        self.elements.iter().filter(|e| e.dangling)
    }
}

/// Persisted escalation position for one resource
///
/// Passed by value into the engine and returned updated; the caller
/// decides where it lives between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRecord {
    pub resource_id: String,
    pub counter: u32,
}

impl EscalationRecord {
    /// Fresh record at the bottom of the ladder
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            counter: 0,
        }
    }

    pub fn with_counter(mut self, counter: u32) -> Self {
        self.counter = counter;
        self
    }
}

/// Strip a single trailing '.' from a DNS name
///
/// Provider events and live API responses disagree on trailing-dot
/// formatting; every stored and queried name goes through this.
pub fn normalize_name(name: &str) -> &str {
    let trimmed = name.trim();
    trimmed.strip_suffix('.').unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("www.example.com."), "www.example.com");
        assert_eq!(normalize_name("www.example.com"), "www.example.com");
        // only a single separator is stripped
        assert_eq!(normalize_name("odd.name.."), "odd.name.");
        assert_eq!(normalize_name(" padded.example.com. "), "padded.example.com");
    }

    #[test]
    fn test_action_wire_names() {
        assert_eq!(Action::Notify.to_string(), "NOTIFY");
        assert_eq!(Action::FixedByUser.as_str(), "FIXED_BY_USER");

        let json = serde_json::to_string(&Action::Prevent).unwrap();
        assert_eq!(json, "\"PREVENT\"");
        let parsed: Action = serde_json::from_str("\"FIXED_BY_USER\"").unwrap();
        assert_eq!(parsed, Action::FixedByUser);

        for action in [
            Action::Notify,
            Action::Prevent,
            Action::Remove,
            Action::FixedByUser,
            Action::Error,
            Action::None,
        ] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action));
        }
    }

    #[test]
    fn test_action_is_remediation() {
        assert!(Action::Prevent.is_remediation());
        assert!(Action::Remove.is_remediation());
        assert!(!Action::Notify.is_remediation());
        assert!(!Action::Error.is_remediation());
    }

    #[test]
    fn test_action_mode_parse() {
        assert_eq!("dryrun".parse::<ActionMode>().unwrap(), ActionMode::DryRun);
        assert_eq!("Normal".parse::<ActionMode>().unwrap(), ActionMode::Normal);
        let err = "yolo".parse::<ActionMode>().unwrap_err();
        assert!(matches!(err, InquisitorError::Config(_)));

        let json = serde_json::to_string(&ActionMode::DryRun).unwrap();
        assert_eq!(json, "\"dryrun\"");
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("upstream".parse::<Direction>().unwrap(), Direction::Upstream);
        assert_eq!("DOWN".parse::<Direction>().unwrap(), Direction::Downstream);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_resource_kind_classes() {
        assert!(ResourceKind::Bucket.is_leaf());
        assert!(ResourceKind::Environment.is_leaf());
        assert!(!ResourceKind::Distribution.is_leaf());
        assert!(ResourceKind::Record.is_referrer());
        assert!(!ResourceKind::Distribution.is_referrer());
        assert_eq!(
            "originGroup".parse::<ResourceKind>().unwrap(),
            ResourceKind::OriginGroup
        );
    }

    #[test]
    fn test_chain_serialization() {
        let mut chain = Chain::new("E123", Direction::Upstream);
        chain.elements.push(ChainElement {
            resource_id: "www.example.com".to_string(),
            resource_type: ResourceKind::Record,
            account_id: Some("111111111111".to_string()),
            referenced_value: "d123.cloudfront.net".to_string(),
            depth: 1,
            dangling: false,
        });

        let json = serde_json::to_string(&chain).unwrap();
        assert!(json.contains("\"rootResourceId\":\"E123\""));
        assert!(json.contains("\"referencedValue\":\"d123.cloudfront.net\""));
        assert!(json.contains("\"resourceType\":\"record\""));
        assert!(!json.contains("unresolved"));

        let parsed: Chain = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, chain);
        assert!(!parsed.is_partial());
    }

    #[test]
    fn test_escalation_record_defaults() {
        let record = EscalationRecord::new("db-1");
        assert_eq!(record.counter, 0);
        let json = serde_json::to_string(&record.clone().with_counter(3)).unwrap();
        assert!(json.contains("\"resourceId\":\"db-1\""));
        assert!(json.contains("\"counter\":3"));
    }
}
