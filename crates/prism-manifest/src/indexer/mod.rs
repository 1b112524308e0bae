//! Bucket crawler that builds the catalog

use prism_config::ManifestSettings;
use prism_core::types::{Manifest, ObjectRecord, Pack};
use prism_store::BlobStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ManifestResult;

/// Crawls configured prefixes and groups catalog files into packs
#[derive(Clone)]
pub struct ManifestIndexer {
    store: Arc<dyn BlobStore>,
    prefixes: Vec<String>,
    /// Lowercased, each starting with `.`
    extensions: Vec<String>,
    version: String,
}

impl std::fmt::Debug for ManifestIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestIndexer")
            .field("prefixes", &self.prefixes)
            .field("extensions", &self.extensions)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl ManifestIndexer {
    pub fn new(store: Arc<dyn BlobStore>, settings: &ManifestSettings) -> Self {
        let extensions = settings
            .allowed_extensions
            .iter()
            .map(|ext| {
                let ext = ext.trim().to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();

        Self {
            store,
            prefixes: settings.crawl_prefixes(),
            extensions,
            version: settings.version.clone(),
        }
    }

    /// True when the key's name ends with an allowed extension.
    ///
    /// Compound extensions such as `.onpreset.zip` match as a whole suffix.
    pub fn is_catalog_file(&self, key: &str) -> bool {
        let name = key.rsplit('/').next().unwrap_or(key).to_lowercase();
        self.extensions
            .iter()
            .any(|ext| name.len() > ext.len() && name.ends_with(ext.as_str()))
    }

    /// Crawl every prefix and build a fresh manifest.
    ///
    /// Any store error aborts the whole build.
    pub async fn build(&self) -> ManifestResult<Manifest> {
        let mut packs: BTreeMap<(String, String), Pack> = BTreeMap::new();
        let mut scanned = 0usize;

        for prefix in &self.prefixes {
            let mut token: Option<String> = None;
            loop {
                let page = self.store.list(prefix, token.as_deref()).await?;
                scanned += page.records.len();

                for record in page.records {
                    self.add_record(&mut packs, record);
                }

                match page.next_token {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }
            debug!(prefix = %prefix, "Crawled prefix");
        }

        let manifest = Manifest::new(self.version.clone(), packs.into_values().collect());
        info!(
            packs = manifest.packs().len(),
            files = manifest.file_count(),
            scanned,
            "Built manifest"
        );
        Ok(manifest)
    }

    fn add_record(&self, packs: &mut BTreeMap<(String, String), Pack>, record: ObjectRecord) {
        if record.is_directory_marker() || !self.is_catalog_file(&record.key) {
            return;
        }

        let mut parts = record.key.split('/');
        let (category, target) = match (parts.next(), parts.next(), parts.next()) {
            (Some(category), Some(target), Some(_)) => (category.to_string(), target.to_string()),
            _ => return,
        };

        packs
            .entry((category.clone(), target.clone()))
            .or_insert_with(|| Pack::new(category, target))
            .push(record);
    }
}

#[cfg(test)]
mod tests;
