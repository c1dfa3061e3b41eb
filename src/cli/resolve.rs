use std::path::Path;
use std::sync::Arc;

use crate::config::InquisitorConfig;
use crate::error::Result;
use crate::invocation::Invocation;
use crate::resolver::HijackResolver;
use crate::store::FileRelationshipStore;
use crate::types::{Chain, Direction, ResourceKind, ResourceRef};

/// Execute the `resolve` command: print the chain for the given names as JSON.
pub async fn execute(
    ctx: &Invocation,
    config: &InquisitorConfig,
    store_path: &Path,
    root: &str,
    kind: ResourceKind,
    names: &[String],
    direction: Direction,
) -> Result<Chain> {
    let store = Arc::new(FileRelationshipStore::open(store_path)?);
    let resolver = HijackResolver::new(store).with_max_depth(config.hijack.max_depth);

    let chain = resolver
        .resolve(ctx, &ResourceRef::new(root, kind), names, direction)
        .await?;

    println!("{}", serde_json::to_string_pretty(&chain)?);
    Ok(chain)
}
