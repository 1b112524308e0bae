//! prism.toml configuration parsing and validation

use serde::{Deserialize, Serialize};
use prism_core::error::PrismError;
use crate::ConfigResult;

/// Complete prism.toml configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrismToml {
    /// Object store connection
    #[serde(default)]
    pub store: StoreSettings,

    /// Catalog crawling and caching
    #[serde(default)]
    pub manifest: ManifestSettings,

    /// Inference result cache layout
    #[serde(default)]
    pub cache: CacheSettings,

    /// Inference backends
    #[serde(default)]
    pub inference: InferenceSettings,
}

/// `[store]` section
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Bucket holding both the catalog and cached artifacts
    pub bucket: Option<String>,

    /// Cloudflare account id, used to derive the R2 endpoint
    pub account_id: Option<String>,

    /// Explicit S3-compatible endpoint URL
    pub endpoint: Option<String>,

    /// Signing region (`auto` for R2)
    pub region: String,

    pub access_key_id: Option<String>,

    pub secret_access_key: Option<String>,

    /// Lifetime of presigned URLs
    pub presign_expires_seconds: u64,

    /// Upper bound for any single store call
    pub timeout_seconds: u64,

    /// Keys requested per list page
    pub page_size: i32,

    /// Use `endpoint/bucket/key` URLs (MinIO and local emulators)
    pub force_path_style: bool,

    /// Attempts the S3 client makes per call, including the first
    pub max_attempts: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            bucket: None,
            account_id: None,
            endpoint: None,
            region: "auto".to_string(),
            access_key_id: None,
            secret_access_key: None,
            presign_expires_seconds: 900,
            timeout_seconds: 30,
            page_size: 1000,
            force_path_style: false,
            max_attempts: 3,
        }
    }
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("bucket", &self.bucket)
            .field("account_id", &self.account_id)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("presign_expires_seconds", &self.presign_expires_seconds)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("force_path_style", &self.force_path_style)
            .finish_non_exhaustive()
    }
}

/// Everything needed to build a store client, after validation
#[derive(Clone, PartialEq)]
pub struct StoreCredentials {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl StoreSettings {
    /// Resolve the endpoint and check that nothing required is missing.
    ///
    /// A store without credentials or endpoint must refuse to operate rather
    /// than sign URLs against the wrong account.
    pub fn validate(&self) -> ConfigResult<StoreCredentials> {
        let bucket = require("store.bucket", &self.bucket)?;
        let access_key_id = require("store.access_key_id", &self.access_key_id)?;
        let secret_access_key = require("store.secret_access_key", &self.secret_access_key)?;

        let endpoint = match (non_empty(&self.endpoint), non_empty(&self.account_id)) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, Some(account)) => format!("https://{}.r2.cloudflarestorage.com", account),
            (None, None) => {
                return Err(PrismError::config(
                    "store.endpoint",
                    "set either store.endpoint or store.account_id",
                ))
            }
        };

        Ok(StoreCredentials {
            bucket,
            endpoint,
            region: self.region.clone(),
            access_key_id,
            secret_access_key,
        })
    }
}

/// `[manifest]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestSettings {
    /// Prefixes to crawl; empty means the whole bucket
    pub indexed_prefixes: Vec<String>,

    /// Seconds a built manifest stays fresh
    pub ttl_seconds: u64,

    /// File name suffixes that belong in the catalog
    pub allowed_extensions: Vec<String>,

    /// Version tag stamped on every manifest
    pub version: String,

    pub default_page_size: usize,

    pub max_page_size: usize,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            indexed_prefixes: Vec::new(),
            ttl_seconds: 300,
            allowed_extensions: [".xmp", ".cube", ".onpreset", ".onpreset.zip"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            version: "2025.10.0".to_string(),
            default_page_size: 50,
            max_page_size: 500,
        }
    }
}

impl ManifestSettings {
    /// Prefixes in crawl form: `a/b/`, or a single `""` for the whole store
    pub fn crawl_prefixes(&self) -> Vec<String> {
        let prefixes: Vec<String> = self
            .indexed_prefixes
            .iter()
            .map(|prefix| prefix.trim().trim_matches('/'))
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| format!("{}/", prefix))
            .collect();

        if prefixes.is_empty() {
            vec![String::new()]
        } else {
            prefixes
        }
    }
}

/// `[cache]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Top-level key namespace for cached artifacts
    pub namespace: String,

    /// Extension appended to artifact keys
    pub extension: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            namespace: "inference".to_string(),
            extension: "png".to_string(),
        }
    }
}

/// `[inference]` section
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Bearer token sent to every endpoint
    pub token: Option<String>,

    /// Upper bound for one backend call
    pub timeout_seconds: u64,

    pub endpoints: EndpointSettings,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            token: None,
            timeout_seconds: 90,
            endpoints: EndpointSettings::default(),
        }
    }
}

impl std::fmt::Debug for InferenceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceSettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_seconds", &self.timeout_seconds)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// `[inference.endpoints]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub restore: Option<String>,
    pub remove_bg: Option<String>,
    pub edit_by_text: Option<String>,
    pub qwen_edit: Option<String>,
}

impl InferenceSettings {
    /// URL and token for one operation's backend
    pub fn endpoint_for(&self, operation: &str) -> ConfigResult<(String, String)> {
        let url = match operation {
            "restore" => &self.endpoints.restore,
            "remove_bg" => &self.endpoints.remove_bg,
            "edit_by_text" => &self.endpoints.edit_by_text,
            "qwen_edit" => &self.endpoints.qwen_edit,
            other => {
                return Err(PrismError::config(
                    "inference.endpoints",
                    format!("unknown operation '{}'", other),
                ))
            }
        };
        let url = require(&format!("inference.endpoints.{}", operation), url)?;
        let token = require("inference.token", &self.token)?;
        Ok((url, token))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn require(field: &str, value: &Option<String>) -> ConfigResult<String> {
    non_empty(value)
        .map(str::to_string)
        .ok_or_else(|| PrismError::config(field, "is required but not set"))
}

/// Parse TOML string to PrismToml configuration
pub fn parse_prism_toml(content: &str, file: &str) -> ConfigResult<PrismToml> {
    // First try with toml_edit for located syntax errors
    if let Err(e) = content.parse::<toml_edit::DocumentMut>() {
        let (line, column) = e
            .span()
            .map(|span| line_column(content, span.start))
            .unwrap_or((0, 0));
        return Err(PrismError::TomlParse {
            file: file.to_string(),
            message: e.message().to_string(),
            line,
            column,
        });
    }

    // Then parse with serde for type safety
    let config: PrismToml = toml::from_str(content).map_err(|e| {
        let (line, column) = e
            .span()
            .map(|span| line_column(content, span.start))
            .unwrap_or((0, 0));
        PrismError::TomlParse {
            file: file.to_string(),
            message: e.message().to_string(),
            line,
            column,
        }
    })?;

    validate_config(&config)?;

    Ok(config)
}

/// Serialize PrismToml to TOML string
pub fn serialize_prism_toml(config: &PrismToml) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| PrismError::TomlParse {
        file: "<memory>".to_string(),
        message: e.to_string(),
        line: 0,
        column: 0,
    })
}

/// Validate values that parse but cannot work
pub fn validate_config(config: &PrismToml) -> ConfigResult<()> {
    if config.store.timeout_seconds == 0 {
        return Err(PrismError::config("store.timeout_seconds", "must be greater than 0"));
    }

    if config.store.presign_expires_seconds == 0 {
        return Err(PrismError::config(
            "store.presign_expires_seconds",
            "must be greater than 0",
        ));
    }

    if config.store.max_attempts == 0 {
        return Err(PrismError::config("store.max_attempts", "must be at least 1"));
    }

    if !(1..=1000).contains(&config.store.page_size) {
        return Err(PrismError::config("store.page_size", "must be between 1 and 1000"));
    }

    if config.inference.timeout_seconds == 0 {
        return Err(PrismError::config(
            "inference.timeout_seconds",
            "must be greater than 0",
        ));
    }

    let manifest = &config.manifest;
    if manifest.default_page_size == 0 || manifest.default_page_size > manifest.max_page_size {
        return Err(PrismError::config(
            "manifest.default_page_size",
            format!("must be between 1 and max_page_size ({})", manifest.max_page_size),
        ));
    }

    if manifest.allowed_extensions.is_empty() {
        return Err(PrismError::config(
            "manifest.allowed_extensions",
            "at least one extension is required",
        ));
    }

    if let Some(ext) = manifest.allowed_extensions.iter().find(|ext| !ext.starts_with('.')) {
        return Err(PrismError::config(
            "manifest.allowed_extensions",
            format!("'{}' must start with '.'", ext),
        ));
    }

    let namespace = config.cache.namespace.trim_matches('/');
    if namespace.is_empty() {
        return Err(PrismError::config("cache.namespace", "must not be empty"));
    }

    Ok(())
}

/// Load and parse prism.toml from file path
pub async fn load_from_file(path: &camino::Utf8Path) -> ConfigResult<PrismToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PrismError::io(format!("Failed to read {}", path), e))?;

    parse_prism_toml(&content, path.as_str())
}

/// 1-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(content.len());
    let before = &content[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map(|nl| offset - nl).unwrap_or(offset + 1);
    (line, column)
}
