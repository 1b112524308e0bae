use prism_config::StoreSettings;
use prism_core::error::ErrorClass;
use prism_store::{BlobStore, Metadata, S3Store};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUCKET: &str = "prism-test";

fn store_for(server: &MockServer) -> S3Store {
    let settings = StoreSettings {
        bucket: Some(BUCKET.to_string()),
        endpoint: Some(server.uri()),
        region: "us-east-1".to_string(),
        access_key_id: Some("test-key".to_string()),
        secret_access_key: Some("test-secret".to_string()),
        force_path_style: true,
        max_attempts: 1,
        page_size: 2,
        ..StoreSettings::default()
    };
    let credentials = settings.validate().unwrap();
    S3Store::new(&credentials, &settings)
}

fn list_body(keys: &[(&str, u64)], next: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|(key, size)| {
            format!(
                "<Contents><Key>{}</Key><Size>{}</Size><ETag>&quot;etag-{}&quot;</ETag></Contents>",
                key, size, size
            )
        })
        .collect();
    let truncation = match next {
        Some(token) => format!(
            "<IsTruncated>true</IsTruncated><NextContinuationToken>{}</NextContinuationToken>",
            token
        ),
        None => "<IsTruncated>false</IsTruncated>".to_string(),
    };
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <Name>{}</Name><Prefix></Prefix><KeyCount>{}</KeyCount><MaxKeys>2</MaxKeys>\
         {}{}</ListBucketResult>",
        BUCKET,
        keys.len(),
        truncation,
        contents
    )
}

#[tokio::test]
async fn test_list_reports_continuation_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", BUCKET)))
        .and(query_param("list-type", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            list_body(&[("A/B/one.cube", 10), ("A/B/two.xmp", 20)], Some("page-2")),
            "application/xml",
        ))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let page = store.list("", None).await.unwrap();

    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0].key, "A/B/one.cube");
    assert_eq!(page.records[0].size, 10);
    assert_eq!(page.records[0].etag.as_deref(), Some("etag-10"));
    assert_eq!(page.next_token.as_deref(), Some("page-2"));
}

#[tokio::test]
async fn test_last_page_has_no_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", BUCKET)))
        .and(query_param("continuation-token", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            list_body(&[("A/B/three.cube", 30)], None),
            "application/xml",
        ))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let page = store.list("", Some("page-2")).await.unwrap();

    assert_eq!(page.records.len(), 1);
    assert!(page.next_token.is_none());
}

#[tokio::test]
async fn test_head_404_is_absent() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{}/inference/missing.png", BUCKET)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server);
    assert!(!store.exists("inference/missing.png").await.unwrap());
}

#[tokio::test]
async fn test_head_200_is_present() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/{}/inference/hit.png", BUCKET)))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", "0"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    assert!(store.exists("inference/hit.png").await.unwrap());
}

#[tokio::test]
async fn test_head_server_error_is_not_a_miss() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let err = store.exists("inference/any.png").await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Unavailable);
}

#[tokio::test]
async fn test_put_sends_metadata_and_cache_headers() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("/{}/inference/out.png", BUCKET)))
        .and(header("content-type", "image/png"))
        .and(header("cache-control", "public, max-age=31536000, immutable"))
        .and(header("x-amz-meta-model", "briaai/RMBG-1.4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut metadata = Metadata::new();
    metadata.insert("model".to_string(), "briaai/RMBG-1.4".to_string());
    store
        .put("inference/out.png", b"png-bytes", "image/png", &metadata)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_presign_embeds_expiry() {
    let server = MockServer::start().await;
    let store = store_for(&server);

    let url = store
        .presign("A/B/one.cube", Duration::from_secs(900))
        .await
        .unwrap();

    assert!(url.starts_with(&server.uri()));
    assert!(url.contains("/prism-test/A/B/one.cube"));
    assert!(url.contains("X-Amz-Expires=900"));
    assert!(url.contains("X-Amz-Signature="));
}
