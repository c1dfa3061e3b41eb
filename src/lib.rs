//! # a3s-inquisitor
//!
//! Cloud resource tag auditing, remediation escalation, and dangling-reference
//! (subdomain / resource hijack) detection for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-inquisitor` has two audit paths, each triggered for a single resource
//! per invocation:
//!
//! - **Tag audit**: the [`EscalationEngine`] checks a resource's tags against
//!   the required set and climbs a fixed ladder (`NOTIFY ×3 → PREVENT →
//!   REMOVE`) through a [`ResourceAdapter`].
//! - **Hijack audit**: observed provider changes are written into a
//!   [`RelationshipStore`]; the [`HijackResolver`] then walks reference edges
//!   from the changed resource to find names still pointing at something
//!   that is gone.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_inquisitor::model::Record;
//! use a3s_inquisitor::{
//!     Direction, HijackResolver, Invocation, MemoryRelationshipStore, RelationshipStore,
//!     ResourceKind, ResourceRef,
//! };
//!
//! # async fn example() -> a3s_inquisitor::Result<()> {
//! let store = Arc::new(MemoryRelationshipStore::new());
//! let ctx = Invocation::new();
//!
//! // www.example.com → CNAME d1.cloudfront.net
//! store
//!     .upsert(
//!         &ctx,
//!         Record::new("111111111111", "Z1", "www.example.com", "CNAME")
//!             .with_values(["d1.cloudfront.net"])
//!             .into(),
//!     )
//!     .await?;
//!
//! // The distribution behind d1.cloudfront.net was deleted: who still points at it?
//! let resolver = HijackResolver::new(store);
//! let chain = resolver
//!     .resolve(
//!         &ctx,
//!         &ResourceRef::new("E1", ResourceKind::Distribution),
//!         &["d1.cloudfront.net".to_string()],
//!         Direction::Upstream,
//!     )
//!     .await?;
//!
//! assert_eq!(chain.elements[0].resource_id, "www.example.com");
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! - **memory**: in-memory relationship store, escalation store, cloud,
//!   notifier, and ledger for tests and single-process use
//! - **file**: JSON files with atomic writes for the relationship graph and
//!   escalation records
//!
//! ## Architecture
//!
//! - **RelationshipStore** trait: upsert/delete by natural key, referrer lookups
//! - **HijackResolver**: bounded breadth-first chain resolution, read-only
//! - **EscalationEngine**: compliance check and ladder, action-mode gate
//! - **ResourceAdapter** trait: refresh and idempotent remediation per resource type
//! - **Observation** / **GraphUpdater**: typed provider changes applied to the graph
//! - **TagAuditPipeline** / **HijackPipeline**: one invocation end to end

pub mod adapter;
pub mod cli;
pub mod config;
pub mod error;
pub mod escalation;
pub mod invocation;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod observe;
pub mod pipeline;
pub mod poll;
pub mod resolver;
pub mod state;
pub mod store;
pub mod types;

// Re-export core types
pub use adapter::{
    ActionSettings, AuditableResource, MemoryCloud, ProviderClients, ResourceAdapter,
    ResourceDescriptor,
};
pub use config::InquisitorConfig;
pub use error::{InquisitorError, Result};
pub use escalation::{AuditOutcome, EscalationEngine};
pub use invocation::Invocation;
pub use ledger::{ActionLedger, LedgerEntry, MemoryActionLedger};
pub use model::{Entity, NaturalKey, StoredEntity};
pub use notify::{HijackReport, LogNotifier, MemoryNotifier, Notifier};
pub use observe::{ChangeTracker, GraphUpdater, MemoryChangeTracker, Observation, RecordAction};
pub use pipeline::{AuditReport, HijackOutcome, HijackPipeline, TagAuditPipeline};
pub use poll::{ChangeStatus, PollPolicy};
pub use resolver::HijackResolver;
pub use state::{EscalationStore, FileEscalationStore, MemoryEscalationStore};
pub use store::{
    FileRelationshipStore, MemoryRelationshipStore, Referrer, RelationshipStore, StoreInfo,
};
pub use types::{
    Action, ActionMode, Chain, ChainElement, Direction, EscalationRecord, ResourceKind,
    ResourceRef, Tags,
};
