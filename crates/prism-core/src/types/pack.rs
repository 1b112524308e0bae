//! Packs and the manifest that orders them.

use serde::{Deserialize, Serialize};

use super::object::ObjectRecord;

/// A group of catalog files sharing the same `category/target` prefix.
///
/// `files` and `count` are kept private so the count can never drift from
/// the list it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPack")]
pub struct Pack {
    id: String,
    title: String,
    category: String,
    target: String,
    files: Vec<ObjectRecord>,
    count: usize,
}

#[derive(Deserialize)]
struct RawPack {
    category: String,
    target: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    files: Vec<ObjectRecord>,
}

impl From<RawPack> for Pack {
    fn from(raw: RawPack) -> Self {
        let mut pack = Pack::new(raw.category, raw.target);
        if let Some(title) = raw.title {
            pack.title = title;
        }
        for file in raw.files {
            pack.push(file);
        }
        pack
    }
}

impl Pack {
    /// Create an empty pack for `category/target`
    pub fn new(category: impl Into<String>, target: impl Into<String>) -> Self {
        let category = category.into();
        let target = target.into();
        Self {
            id: format!("{}/{}", category, target),
            title: Self::display_title(&category, &target),
            category,
            target,
            files: Vec::new(),
            count: 0,
        }
    }

    /// Human readable title, e.g. `ON1 BW LUTs — For Lightroom`
    pub fn display_title(category: &str, target: &str) -> String {
        format!("{} — {}", category.replace('_', " "), target.replace('_', " "))
    }

    /// Append a file, keeping encounter order
    pub fn push(&mut self, file: ObjectRecord) {
        self.files.push(file);
        self.count = self.files.len();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn files(&self) -> &[ObjectRecord] {
        &self.files
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Look up a file of this pack by its full key
    pub fn file(&self, key: &str) -> Option<&ObjectRecord> {
        self.files.iter().find(|file| file.key == key)
    }
}

/// Versioned catalog of packs, ordered by `(category, target)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Catalog format version
    pub version: String,
    /// Packs in deterministic order
    packs: Vec<Pack>,
}

impl Manifest {
    /// Build a manifest, sorting packs so pagination is stable
    pub fn new(version: impl Into<String>, mut packs: Vec<Pack>) -> Self {
        packs.sort_by(|a, b| {
            (a.category.as_str(), a.target.as_str()).cmp(&(b.category.as_str(), b.target.as_str()))
        });
        Self {
            version: version.into(),
            packs,
        }
    }

    pub fn packs(&self) -> &[Pack] {
        &self.packs
    }

    /// Look up a pack by id
    pub fn pack(&self, id: &str) -> Option<&Pack> {
        self.packs.iter().find(|pack| pack.id == id)
    }

    /// Total number of files across all packs
    pub fn file_count(&self) -> usize {
        self.packs.iter().map(Pack::count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_count_tracks_files() {
        let mut pack = Pack::new("ON1_BW_LUTs", "For_Lightroom");
        assert_eq!(pack.count(), 0);

        pack.push(ObjectRecord::new("ON1_BW_LUTs/For_Lightroom/a.cube", 100));
        pack.push(ObjectRecord::new("ON1_BW_LUTs/For_Lightroom/b.xmp", 50));

        assert_eq!(pack.count(), 2);
        assert_eq!(pack.files().len(), 2);
        assert_eq!(pack.id(), "ON1_BW_LUTs/For_Lightroom");
        assert_eq!(pack.title(), "ON1 BW LUTs — For Lightroom");
    }

    #[test]
    fn test_manifest_sorts_packs() {
        let manifest = Manifest::new(
            "2025.10.0",
            vec![Pack::new("B", "x"), Pack::new("A", "z"), Pack::new("A", "a")],
        );
        let ids: Vec<&str> = manifest.packs().iter().map(Pack::id).collect();
        assert_eq!(ids, vec!["A/a", "A/z", "B/x"]);
    }

    #[test]
    fn test_deserialize_recomputes_count() {
        let json = r#"{
            "id": "A/B",
            "category": "A",
            "target": "B",
            "title": "Custom",
            "files": [{"key": "A/B/c.cube", "size": 1}],
            "count": 42
        }"#;
        let pack: Pack = serde_json::from_str(json).unwrap();
        assert_eq!(pack.count(), 1);
        assert_eq!(pack.title(), "Custom");
        assert_eq!(pack.id(), "A/B");
    }

    #[test]
    fn test_serialized_shape() {
        let mut pack = Pack::new("A", "B");
        pack.push(ObjectRecord::new("A/B/c.cube", 7).with_etag(Some("\"e\"")));
        let value = serde_json::to_value(&pack).unwrap();

        assert_eq!(value["id"], "A/B");
        assert_eq!(value["count"], 1);
        assert_eq!(value["files"][0]["etag"], "e");
        assert_eq!(value["files"][0]["content_type"], "application/octet-stream");
    }
}
