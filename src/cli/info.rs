use std::path::Path;

use crate::error::Result;
use crate::invocation::Invocation;
use crate::store::{FileRelationshipStore, RelationshipStore, StoreInfo};

/// Execute the `info` command: display row and edge counts.
pub async fn execute(ctx: &Invocation, store_path: &Path) -> Result<StoreInfo> {
    let store = FileRelationshipStore::open(store_path)?;
    let info = store.info(ctx).await?;

    println!("{:<16} {}", "BACKEND", info.backend);
    println!("{:<16} {}", "PATH", store.path().display());
    for (kind, count) in &info.counts {
        println!("{:<16} {}", kind, count);
    }
    println!("{:<16} {}", "EDGES", info.edges);
    println!("\n{} entities total", info.entities);
    Ok(info)
}
