//! `prism presign` command implementation.

use prism_core::error::PrismResult;
use prism_manifest::{find_file, ManifestIndexer};
use prism_store::BlobStore;
use std::sync::Arc;

use super::CommandContext;

/// Execute the `prism presign` command
pub async fn execute(pack_id: &str, key: &str, ctx: &CommandContext) -> PrismResult<()> {
    let url = presign_file(ctx.store()?, pack_id, key, ctx).await?;
    println!("{}", url);
    Ok(())
}

/// Look the file up in the catalog and sign a download URL for it.
///
/// Only keys that are part of the manifest can be signed.
pub async fn presign_file(
    store: Arc<dyn BlobStore>,
    pack_id: &str,
    key: &str,
    ctx: &CommandContext,
) -> PrismResult<String> {
    let indexer = ManifestIndexer::new(Arc::clone(&store), &ctx.config.manifest);
    let manifest = indexer.build().await?;
    let file = find_file(&manifest, pack_id, key)?;
    store.presign(&file.key, ctx.presign_ttl()).await
}
