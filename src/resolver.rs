//! Hijack-chain resolver
//!
//! Walks reference edges breadth-first from the names a changed resource
//! exposes (upstream) or points at (downstream), and reports every resource
//! found as an ordered [`Chain`].
//!
//! The resolver is read-only against the store and keeps all traversal
//! state local to one call, so concurrent resolutions never interfere.
//! A failed lookup drops only its own branch: the name is recorded in
//! [`Chain::unresolved`] and the walk continues. Cancellation and deadline
//! expiry abort the whole resolution.

use crate::error::{InquisitorError, Result};
use crate::invocation::Invocation;
use crate::model::{Entity, NaturalKey, StoredEntity};
use crate::store::RelationshipStore;
use crate::types::{normalize_name, Chain, ChainElement, Direction, ResourceKind, ResourceRef};
use std::collections::HashSet;
use std::sync::Arc;

/// Default bound on traversal rounds
pub const DEFAULT_MAX_DEPTH: usize = 8;

type Visited = HashSet<(ResourceKind, String)>;

/// Breadth-first resolver over a relationship store
#[derive(Clone)]
pub struct HijackResolver {
    store: Arc<dyn RelationshipStore>,
    max_depth: usize,
}

impl HijackResolver {
    pub fn new(store: Arc<dyn RelationshipStore>) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Bound traversal rounds; zero is treated as one
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Build the exposure chain for `names` as seen from `root`
    pub async fn resolve(
        &self,
        ctx: &Invocation,
        root: &ResourceRef,
        names: &[String],
        direction: Direction,
    ) -> Result<Chain> {
        let mut chain = Chain::new(root.resource_id.clone(), direction);
        let mut visited: Visited = HashSet::new();
        visited.insert((root.kind, root.resource_id.clone()));

        let mut seen_names: HashSet<String> = HashSet::new();
        let mut frontier = Vec::new();
        for name in names {
            let name = normalize_name(name).to_string();
            if !name.is_empty() && seen_names.insert(name.clone()) {
                frontier.push(name);
            }
        }

        let mut depth = 0;
        while !frontier.is_empty() {
            if depth >= self.max_depth {
                tracing::debug!(
                    root = %root.resource_id,
                    pending = frontier.len(),
                    max_depth = self.max_depth,
                    "Traversal depth limit reached"
                );
                chain.truncated = true;
                break;
            }
            depth += 1;

            let mut discovered = Vec::new();
            for name in &frontier {
                ctx.check("resolve")?;
                let step = match direction {
                    Direction::Upstream => {
                        self.expand_upstream(ctx, name, depth, &mut chain, &mut visited)
                            .await
                    }
                    Direction::Downstream => {
                        self.expand_downstream(ctx, name, depth, &mut chain, &mut visited)
                            .await
                    }
                };
                match step {
                    Ok(names) => discovered.extend(names),
                    Err(e) if e.is_aborted() => return Err(e),
                    Err(e) => {
                        tracing::warn!(
                            root = %root.resource_id,
                            name = %name,
                            direction = %direction,
                            error = %e,
                            "Lookup failed, skipping branch"
                        );
                        chain.unresolved.push(name.clone());
                    }
                }
            }

            frontier = discovered
                .into_iter()
                .map(|n| normalize_name(&n).to_string())
                .filter(|n| !n.is_empty() && seen_names.insert(n.clone()))
                .collect();
        }

        tracing::info!(
            root = %root.resource_id,
            direction = %direction,
            elements = chain.len(),
            unresolved = chain.unresolved.len(),
            truncated = chain.truncated,
            "Hijack chain resolved"
        );
        Ok(chain)
    }

    /// Resolve from a stored entity, deriving the names from its own data
    ///
    /// Upstream uses the entity's public names; downstream uses its targets
    /// (a distribution's targets are those of its origins and groups).
    pub async fn resolve_entity(
        &self,
        ctx: &Invocation,
        key: &NaturalKey,
        direction: Direction,
    ) -> Result<Chain> {
        let stored = self
            .store
            .get(ctx, key)
            .await?
            .ok_or_else(|| InquisitorError::NotFound(key.to_string()))?;

        let names = match direction {
            Direction::Upstream => stored.entity.public_names(),
            Direction::Downstream => self.outgoing(ctx, &stored).await?,
        };

        let mut root = ResourceRef::new(stored.resource_id(), stored.kind());
        if let Some(account) = stored.entity.account_id() {
            root = root.with_account(account);
        }
        self.resolve(ctx, &root, &names, direction).await
    }

    /// Who points at `name`: each referrer's owner joins the chain and its
    /// public names join the next round
    async fn expand_upstream(
        &self,
        ctx: &Invocation,
        name: &str,
        depth: usize,
        chain: &mut Chain,
        visited: &mut Visited,
    ) -> Result<Vec<String>> {
        let mut next = Vec::new();
        for referrer in self.store.find_referrers(ctx, name).await? {
            let owner = referrer.owner;
            if !visited.insert((owner.kind(), owner.resource_id().to_string())) {
                tracing::debug!(resource = %owner.resource_id(), "Already visited");
                continue;
            }
            chain.elements.push(element(&owner, name, depth, false));
            if !owner.kind().is_leaf() {
                next.extend(owner.entity.public_names());
            }
        }
        Ok(next)
    }

    /// What `name` resolves to: its owners join the chain and their targets
    /// join the next round; an ownerless provider endpoint is dangling
    async fn expand_downstream(
        &self,
        ctx: &Invocation,
        name: &str,
        depth: usize,
        chain: &mut Chain,
        visited: &mut Visited,
    ) -> Result<Vec<String>> {
        let owners = self.store.find_owners(ctx, name).await?;

        if owners.is_empty() {
            match classify_endpoint(name) {
                Some((kind, id)) => {
                    if visited.insert((kind, id.clone())) {
                        tracing::debug!(name = %name, kind = %kind, "Dangling target");
                        chain.elements.push(ChainElement {
                            resource_id: id,
                            resource_type: kind,
                            account_id: None,
                            referenced_value: name.to_string(),
                            depth,
                            dangling: true,
                        });
                    }
                }
                None => tracing::debug!(name = %name, "External target, skipped"),
            }
            return Ok(Vec::new());
        }

        let mut next = Vec::new();
        for owner in owners {
            if !visited.insert((owner.kind(), owner.resource_id().to_string())) {
                tracing::debug!(resource = %owner.resource_id(), "Already visited");
                continue;
            }
            chain.elements.push(element(&owner, name, depth, false));
            if owner.kind().is_leaf() {
                continue;
            }
            match self.outgoing(ctx, &owner).await {
                Ok(targets) => next.extend(targets),
                Err(e) if e.is_aborted() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        resource = %owner.resource_id(),
                        name = %name,
                        error = %e,
                        "Target lookup failed, skipping owner"
                    );
                    chain.unresolved.push(owner.resource_id().to_string());
                }
            }
        }
        Ok(next)
    }

    async fn outgoing(&self, ctx: &Invocation, stored: &StoredEntity) -> Result<Vec<String>> {
        match &stored.entity {
            Entity::Distribution(_) => {
                let mut names = Vec::new();
                for child in self.store.children(ctx, &stored.key()).await? {
                    names.extend(child.entity.targets());
                }
                Ok(names)
            }
            entity => Ok(entity.targets()),
        }
    }
}

fn element(stored: &StoredEntity, name: &str, depth: usize, dangling: bool) -> ChainElement {
    ChainElement {
        resource_id: stored.resource_id().to_string(),
        resource_type: stored.kind(),
        account_id: stored.entity.account_id().map(str::to_string),
        referenced_value: name.to_string(),
        depth,
        dangling,
    }
}

/// Recognize provider endpoints that a third party could claim
///
/// Returns the resource kind and the identifier embedded in the name.
pub fn classify_endpoint(name: &str) -> Option<(ResourceKind, String)> {
    let name = normalize_name(name).to_ascii_lowercase();

    for marker in [".s3.", ".s3-website"] {
        if let Some(pos) = name.find(marker) {
            if pos > 0 {
                return Some((ResourceKind::Bucket, name[..pos].to_string()));
            }
        }
    }
    if name.ends_with(".elasticbeanstalk.com") {
        return Some((ResourceKind::Environment, name));
    }
    if name.ends_with(".cloudfront.net") {
        return Some((ResourceKind::Distribution, name));
    }
    None
}
