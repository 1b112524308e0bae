//! Filtering, pagination and file lookup over a manifest

use prism_config::ManifestSettings;
use prism_core::error::PrismError;
use prism_core::types::{Manifest, ObjectRecord, Pack};
use serde::{Deserialize, Serialize};

use crate::ManifestResult;

/// Page size used when the caller asks for zero or fewer items
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Packs matching `category` and `target` exactly, in manifest order.
///
/// `None` or an empty string means "any".
pub fn filter_packs<'a>(
    manifest: &'a Manifest,
    category: Option<&str>,
    target: Option<&str>,
) -> Vec<&'a Pack> {
    let category = category.filter(|c| !c.is_empty());
    let target = target.filter(|t| !t.is_empty());

    manifest
        .packs()
        .iter()
        .filter(|pack| category.map_or(true, |c| pack.category() == c))
        .filter(|pack| target.map_or(true, |t| pack.target() == t))
        .collect()
}

/// One page of a larger list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    /// 1-based, after clamping
    pub page: usize,
    pub total_pages: usize,
}

/// Slice `items` into 1-based pages.
///
/// `page` is clamped into `[1, total_pages]` and a non-positive
/// `page_size` falls back to [`DEFAULT_PAGE_SIZE`]. An empty list still has
/// one (empty) page.
pub fn paginate<T: Clone>(items: &[T], page: i64, page_size: i64) -> Page<T> {
    let page_size = if page_size <= 0 { DEFAULT_PAGE_SIZE } else { page_size } as usize;
    let total = items.len();
    let total_pages = total.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages as i64) as usize;

    let start = ((page - 1) * page_size).min(total);
    let end = (start + page_size).min(total);

    Page {
        items: items[start..end].to_vec(),
        total,
        page,
        total_pages,
    }
}

/// Look up one file of one pack
pub fn find_file<'a>(manifest: &'a Manifest, pack_id: &str, key: &str) -> ManifestResult<&'a ObjectRecord> {
    let pack = manifest
        .pack(pack_id)
        .ok_or_else(|| PrismError::PackNotFound { id: pack_id.to_string() })?;

    pack.file(key).ok_or_else(|| PrismError::FileNotFound {
        pack: pack_id.to_string(),
        key: key.to_string(),
    })
}

/// A catalog listing request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManifestQuery {
    pub category: Option<String>,
    pub target: Option<String>,
    /// 1-based; out-of-range values are clamped
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// A page of packs plus the paging context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestPage {
    pub version: String,
    pub packs: Vec<Pack>,
    pub total_packs: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl ManifestQuery {
    /// Filter and paginate `manifest`.
    ///
    /// Rejects a `page_size` above the configured maximum before touching
    /// the manifest. A missing or non-positive `page_size` uses the
    /// configured default.
    pub fn run(&self, manifest: &Manifest, settings: &ManifestSettings) -> ManifestResult<ManifestPage> {
        let requested = self.page_size.unwrap_or(settings.default_page_size as i64);
        if requested > settings.max_page_size as i64 {
            return Err(PrismError::invalid(
                "page_size",
                format!("must be at most {}", settings.max_page_size),
            ));
        }

        let effective = if requested <= 0 {
            settings.default_page_size as i64
        } else {
            requested
        };
        let matching = filter_packs(manifest, self.category.as_deref(), self.target.as_deref());
        let page = paginate(&matching, self.page.unwrap_or(1), effective);

        Ok(ManifestPage {
            version: manifest.version.clone(),
            packs: page.items.into_iter().cloned().collect(),
            total_packs: page.total,
            page: page.page,
            page_size: effective as usize,
            total_pages: page.total_pages,
        })
    }
}
