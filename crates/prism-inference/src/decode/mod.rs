//! Response normalization for inference backends
//!
//! Backends answer in many shapes: raw image bytes, JSON objects with a
//! base64 field under one of several names, bare lists or bare strings.
//! [`decode_response`] turns all of them into bytes plus optional metadata.

use base64::{engine::general_purpose, Engine as _};
use prism_core::error::PrismError;
use serde_json::{Map, Value};

use crate::InferenceResult;

/// Content type assumed for images decoded from JSON
pub const DEFAULT_IMAGE_TYPE: &str = "image/png";

/// A normalized backend response
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// The backend's `meta` object, when it sent one
    pub meta: Map<String, Value>,
}

/// Object fields that may carry the base64 image, in lookup order
const IMAGE_FIELDS: &[&str] = &["image", "images", "outputs", "data", "b64", "b64_json"];

/// Decode a successful response body.
///
/// `content_type` is the raw header value, if any.
pub fn decode_response(content_type: Option<&str>, body: &[u8]) -> InferenceResult<Decoded> {
    let content_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase())
        .unwrap_or_default();

    if content_type.starts_with("image/") || content_type == "application/octet-stream" {
        return Ok(Decoded {
            bytes: body.to_vec(),
            content_type,
            meta: Map::new(),
        });
    }

    if content_type.contains("json") {
        return decode_json(body);
    }

    Ok(Decoded {
        bytes: body.to_vec(),
        content_type: if content_type.is_empty() {
            prism_core::DEFAULT_CONTENT_TYPE.to_string()
        } else {
            content_type
        },
        meta: Map::new(),
    })
}

fn decode_json(body: &[u8]) -> InferenceResult<Decoded> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        // Some handlers send a bare base64 string without JSON quoting
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let bare = text.trim().trim_matches('"').to_string();
            return image_from_base64(&bare, Map::new());
        }
    };

    match value {
        Value::Object(object) => {
            if let Some(error) = object.get("error") {
                return Err(upstream(format!("backend reported an error: {}", short(error))));
            }
            let meta = match object.get("meta") {
                Some(Value::Object(meta)) => meta.clone(),
                _ => Map::new(),
            };
            for field in IMAGE_FIELDS {
                if let Some(encoded) = object.get(*field).and_then(first_image) {
                    return image_from_base64(encoded, meta);
                }
            }
            let keys: Vec<&str> = object.keys().map(String::as_str).collect();
            Err(upstream(format!("JSON response has no image field (keys: {:?})", keys)))
        }
        Value::Array(_) | Value::String(_) => match first_image(&value) {
            Some(encoded) => image_from_base64(encoded, Map::new()),
            None => Err(upstream("JSON response list holds no image")),
        },
        other => Err(upstream(format!("unsupported JSON response: {}", short(&other)))),
    }
}

/// A string, the first string of a list, or the `image` of a list's first object
fn first_image(value: &Value) -> Option<&str> {
    match value {
        Value::String(encoded) if !encoded.is_empty() => Some(encoded),
        Value::Array(items) => match items.first()? {
            Value::String(encoded) if !encoded.is_empty() => Some(encoded),
            Value::Object(item) => item.get("image").and_then(Value::as_str),
            _ => None,
        },
        _ => None,
    }
}

fn image_from_base64(encoded: &str, meta: Map<String, Value>) -> InferenceResult<Decoded> {
    // Data URLs carry the payload after the comma
    let payload = match encoded.split_once(";base64,") {
        Some((_, data)) => data,
        None => encoded,
    };
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| upstream(format!("failed to decode base64 image: {}", e)))?;

    let content_type = meta
        .get("content_type")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_IMAGE_TYPE)
        .to_string();

    Ok(Decoded {
        bytes,
        content_type,
        meta,
    })
}

fn upstream(message: impl Into<String>) -> PrismError {
    PrismError::Upstream {
        status: None,
        message: message.into(),
    }
}

fn short(value: &Value) -> String {
    let mut text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.len() > 300 {
        let mut cut = 300;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

#[cfg(test)]
mod tests;
