use super::*;
use prism_core::error::ErrorClass;

const PNG: &[u8] = b"\x89PNG-data";
const PNG_B64: &str = "iVBORy1kYXRh";

#[test]
fn test_image_body_is_used_verbatim() {
    let decoded = decode_response(Some("image/webp"), PNG).unwrap();
    assert_eq!(decoded.bytes, PNG);
    assert_eq!(decoded.content_type, "image/webp");

    let decoded = decode_response(Some("application/octet-stream"), PNG).unwrap();
    assert_eq!(decoded.bytes, PNG);
}

#[test]
fn test_json_image_field_with_meta() {
    let body = format!(r#"{{"image": "{}", "meta": {{"seed": 7}}}}"#, PNG_B64);
    let decoded = decode_response(Some("application/json; charset=utf-8"), body.as_bytes()).unwrap();

    assert_eq!(decoded.bytes, PNG);
    assert_eq!(decoded.content_type, "image/png");
    assert_eq!(decoded.meta["seed"], 7);
}

#[test]
fn test_json_alternative_fields() {
    for body in [
        format!(r#"{{"images": ["{}"]}}"#, PNG_B64),
        format!(r#"{{"images": [{{"image": "{}"}}]}}"#, PNG_B64),
        format!(r#"{{"outputs": "{}"}}"#, PNG_B64),
        format!(r#"{{"data": ["{}"]}}"#, PNG_B64),
        format!(r#"{{"b64_json": "{}"}}"#, PNG_B64),
        format!(r#"["{}"]"#, PNG_B64),
        format!(r#""{}""#, PNG_B64),
    ] {
        let decoded = decode_response(Some("application/json"), body.as_bytes()).unwrap();
        assert_eq!(decoded.bytes, PNG, "body: {}", body);
    }
}

#[test]
fn test_unquoted_base64_labelled_as_json() {
    let decoded = decode_response(Some("application/json"), PNG_B64.as_bytes()).unwrap();
    assert_eq!(decoded.bytes, PNG);
}

#[test]
fn test_data_url_is_accepted() {
    let body = format!(r#"{{"image": "data:image/png;base64,{}"}}"#, PNG_B64);
    let decoded = decode_response(Some("application/json"), body.as_bytes()).unwrap();
    assert_eq!(decoded.bytes, PNG);
}

#[test]
fn test_error_field_is_upstream_failure() {
    let err = decode_response(Some("application/json"), br#"{"error": "CUDA out of memory"}"#)
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Upstream);
    assert!(err.to_string().contains("CUDA out of memory"));
}

#[test]
fn test_missing_image_field() {
    let err = decode_response(Some("application/json"), br#"{"status": "ok"}"#).unwrap_err();
    assert!(err.to_string().contains("no image field"));
}

#[test]
fn test_bad_base64() {
    let err = decode_response(Some("application/json"), br#"{"image": "***"}"#).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Upstream);
}

#[test]
fn test_unknown_content_type_is_raw_bytes() {
    let decoded = decode_response(Some("text/plain"), b"raw").unwrap();
    assert_eq!(decoded.bytes, b"raw");
    assert_eq!(decoded.content_type, "text/plain");

    let decoded = decode_response(None, b"raw").unwrap();
    assert_eq!(decoded.content_type, "application/octet-stream");
}
