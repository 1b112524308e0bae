use super::*;
use prism_store::MemoryStore;

fn indexer_over(store: Arc<MemoryStore>, settings: &ManifestSettings) -> ManifestIndexer {
    ManifestIndexer::new(store, settings)
}

#[tokio::test]
async fn test_groups_files_into_packs() {
    let store = Arc::new(MemoryStore::new());
    store.insert("Cat1/T1/a.xmp", vec![0u8; 10]);
    store.insert("Cat1/T1/b.cube", vec![0u8; 20]);
    store.insert("Cat2/T2/c.onpreset", vec![0u8; 30]);
    store.insert("Cat2/T2/readme.txt", vec![0u8; 5]);

    let manifest = indexer_over(store, &ManifestSettings::default())
        .build()
        .await
        .unwrap();

    assert_eq!(manifest.version, "2025.10.0");
    let ids: Vec<&str> = manifest.packs().iter().map(Pack::id).collect();
    assert_eq!(ids, vec!["Cat1/T1", "Cat2/T2"]);

    let first = &manifest.packs()[0];
    assert_eq!(first.count(), 2);
    assert_eq!(first.files()[0].key, "Cat1/T1/a.xmp");
    assert_eq!(first.files()[0].size, 10);
    assert_eq!(first.title(), "Cat1 — T1");
    assert_eq!(manifest.packs()[1].count(), 1);
}

#[tokio::test]
async fn test_skips_markers_and_shallow_keys() {
    let store = Arc::new(MemoryStore::new());
    store.insert("Cat/Target/", Vec::new());
    store.insert("Cat/top.cube", vec![1]);
    store.insert("loose.xmp", vec![1]);
    store.insert("Cat/Target/deep/nested.cube", vec![1]);

    let manifest = indexer_over(store, &ManifestSettings::default())
        .build()
        .await
        .unwrap();

    assert_eq!(manifest.packs().len(), 1);
    assert_eq!(manifest.packs()[0].files()[0].key, "Cat/Target/deep/nested.cube");
}

#[tokio::test]
async fn test_extension_matching_is_case_insensitive_and_compound() {
    let store = Arc::new(MemoryStore::new());
    store.insert("A/B/upper.CUBE", vec![1]);
    store.insert("A/B/bundle.onpreset.zip", vec![1]);
    store.insert("A/B/other.zip", vec![1]);

    let manifest = indexer_over(store, &ManifestSettings::default())
        .build()
        .await
        .unwrap();

    let keys: Vec<&str> = manifest.packs()[0]
        .files()
        .iter()
        .map(|f| f.key.as_str())
        .collect();
    assert_eq!(keys, vec!["A/B/bundle.onpreset.zip", "A/B/upper.CUBE"]);
}

#[tokio::test]
async fn test_drains_every_page() {
    let store = Arc::new(MemoryStore::new().with_page_size(3));
    for i in 0..10 {
        store.insert(format!("Cat/T/{:02}.xmp", i), vec![1]);
    }

    let manifest = indexer_over(store.clone(), &ManifestSettings::default())
        .build()
        .await
        .unwrap();

    assert_eq!(manifest.file_count(), 10);
    assert_eq!(store.stats().list_calls, 4);
}

#[tokio::test]
async fn test_only_configured_prefixes_are_crawled() {
    let store = Arc::new(MemoryStore::new());
    store.insert("Wanted/T/a.xmp", vec![1]);
    store.insert("Other/T/b.xmp", vec![1]);

    let settings = ManifestSettings {
        indexed_prefixes: vec!["/Wanted/".to_string()],
        ..ManifestSettings::default()
    };
    let manifest = indexer_over(store, &settings).build().await.unwrap();

    assert_eq!(manifest.packs().len(), 1);
    assert_eq!(manifest.packs()[0].category(), "Wanted");
}

#[tokio::test]
async fn test_store_error_aborts_build() {
    let store = Arc::new(MemoryStore::new());
    store.insert("A/B/c.cube", vec![1]);
    store.set_offline(true);

    let err = indexer_over(store, &ManifestSettings::default())
        .build()
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[test]
fn test_extensions_are_normalized() {
    let settings = ManifestSettings {
        allowed_extensions: vec!["LUT".to_string(), ".Cube".to_string()],
        ..ManifestSettings::default()
    };
    let indexer = ManifestIndexer::new(Arc::new(MemoryStore::new()), &settings);

    assert!(indexer.is_catalog_file("A/B/film.lut"));
    assert!(indexer.is_catalog_file("A/B/film.cube"));
    assert!(!indexer.is_catalog_file("A/B/film.xmp"));
    assert!(!indexer.is_catalog_file("A/B/.cube"));
}
