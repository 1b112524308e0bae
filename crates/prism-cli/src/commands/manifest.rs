//! `prism manifest` command implementation.
//!
//! Crawls the catalog prefixes and prints one page of packs.

use prism_core::clock::SystemClock;
use prism_core::error::PrismResult;
use prism_manifest::{ManifestCache, ManifestIndexer, ManifestPage, ManifestQuery};
use prism_store::BlobStore;
use std::sync::Arc;
use std::time::Duration;

use super::{to_json, CommandContext};

/// Execute the `prism manifest` command
pub async fn execute(query: ManifestQuery, json: bool, ctx: &CommandContext) -> PrismResult<()> {
    let store = ctx.store()?;
    let page = fetch_page(store, &query, ctx).await?;

    if json {
        println!("{}", to_json(&page)?);
    } else {
        print_page(&page, ctx);
    }
    Ok(())
}

/// Build the manifest from `store` and run `query` against it
pub async fn fetch_page(
    store: Arc<dyn BlobStore>,
    query: &ManifestQuery,
    ctx: &CommandContext,
) -> PrismResult<ManifestPage> {
    let settings = &ctx.config.manifest;
    let cache = ManifestCache::new(
        ManifestIndexer::new(store, settings),
        Duration::from_secs(settings.ttl_seconds),
        Arc::new(SystemClock),
    );
    let manifest = cache.get().await?;
    query.run(&manifest, settings)
}

fn print_page(page: &ManifestPage, ctx: &CommandContext) {
    ctx.output.step(
        "📦",
        &format!(
            "Manifest {}: {} pack(s), page {}/{}",
            page.version,
            page.total_packs,
            page.page,
            page.total_pages.max(1)
        ),
    );
    if page.packs.is_empty() {
        ctx.output.warn("No packs match");
        return;
    }
    for pack in &page.packs {
        ctx.output.info(&format!(
            "  {:<40} {:<30} {} file(s)",
            pack.id(),
            pack.title(),
            pack.count()
        ));
    }
}
