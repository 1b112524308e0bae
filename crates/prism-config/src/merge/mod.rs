//! Configuration discovery, layering and environment overrides

use std::collections::HashMap;
use camino::{Utf8Path, Utf8PathBuf};
use prism_core::error::PrismError;
use tracing::debug;
use crate::{ConfigResult, toml::PrismToml};

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "prism.toml";

/// Environment variables understood as overrides
const ENV_KEYS: &[&str] = &[
    "CF_R2_ACCOUNT_ID",
    "CF_R2_BUCKET",
    "CF_R2_ACCESS_KEY_ID",
    "CF_R2_SECRET_ACCESS_KEY",
    "CF_R2_ENDPOINT",
    "INDEXED_PREFIXES",
    "MANIFEST_CACHE_TTL_SECONDS",
    "PRESIGN_EXPIRES_SECONDS",
    "HF_TOKEN",
    "HF_ENDPOINT_URL_RESTORE",
    "HF_ENDPOINT_URL_REMOVE_BG",
    "HF_ENDPOINT_URL_INSTRUCTPIX2PIX",
    "HF_ENDPOINT_URL_QWEN_EDIT",
    "INFERENCE_TIMEOUT_SEC",
];

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
}

/// Configuration layering: file, then environment, then command line
pub struct ConfigLayering;

/// Configuration source tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// File named explicitly with --config
    Explicit(Utf8PathBuf),
    /// prism.toml found in the working directory or a parent
    Project(Utf8PathBuf),
    /// ~/.prism/config.toml
    Global(Utf8PathBuf),
    /// No file; defaults plus environment only
    Defaults,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self { cwd }
    }

    /// Load the configuration file, falling back from project to global to defaults
    pub async fn load_file_config(
        &self,
        explicit: Option<&Utf8Path>,
    ) -> ConfigResult<(PrismToml, ConfigSource)> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(PrismError::config(
                    "config",
                    format!("{} does not exist", path),
                ));
            }
            let config = crate::toml::load_from_file(path).await?;
            return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
        }

        if let Some(path) = self.find_project_config() {
            debug!("Using project configuration {}", path);
            let config = crate::toml::load_from_file(&path).await?;
            return Ok((config, ConfigSource::Project(path)));
        }

        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                debug!("Using global configuration {}", path);
                let config = crate::toml::load_from_file(&path).await?;
                return Ok((config, ConfigSource::Global(path)));
            }
        }

        Ok((PrismToml::default(), ConfigSource::Defaults))
    }

    /// Load the file layer and apply environment and CLI overrides on top
    pub async fn load(
        &self,
        explicit: Option<&Utf8Path>,
        cli_overrides: &HashMap<String, String>,
    ) -> ConfigResult<(PrismToml, ConfigSource)> {
        let (config, source) = self.load_file_config(explicit).await?;
        let merged = ConfigLayering::merge_configs(
            config,
            &ConfigLayering::collect_env_overrides(),
            cli_overrides,
        )?;
        Ok((merged, source))
    }

    /// Find prism.toml in the working directory or any parent
    pub fn find_project_config(&self) -> Option<Utf8PathBuf> {
        let mut current = Some(self.cwd.as_path());

        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Some(candidate);
            }
            current = dir.parent();
        }

        None
    }

    /// Location of the per-user configuration file
    pub fn global_config_path() -> Option<Utf8PathBuf> {
        let home = dirs::home_dir()?;
        let home = Utf8PathBuf::try_from(home).ok()?;
        Some(home.join(".prism").join("config.toml"))
    }
}

impl ConfigLayering {
    /// Apply environment then CLI overrides to a file configuration
    pub fn merge_configs(
        file_config: PrismToml,
        env_overrides: &HashMap<String, String>,
        cli_overrides: &HashMap<String, String>,
    ) -> ConfigResult<PrismToml> {
        let mut merged = file_config;

        Self::apply_env_overrides(&mut merged, env_overrides)?;

        // CLI flag overrides (highest priority)
        Self::apply_cli_overrides(&mut merged, cli_overrides)?;

        crate::toml::validate_config(&merged)?;

        Ok(merged)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(
        config: &mut PrismToml,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (key, value) in overrides {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "CF_R2_ACCOUNT_ID" => config.store.account_id = Some(value.to_string()),
                "CF_R2_BUCKET" => config.store.bucket = Some(value.to_string()),
                "CF_R2_ACCESS_KEY_ID" => config.store.access_key_id = Some(value.to_string()),
                "CF_R2_SECRET_ACCESS_KEY" => {
                    config.store.secret_access_key = Some(value.to_string())
                }
                "CF_R2_ENDPOINT" => config.store.endpoint = Some(value.to_string()),
                "INDEXED_PREFIXES" => {
                    config.manifest.indexed_prefixes = value
                        .split(',')
                        .map(|prefix| prefix.trim().trim_matches('/'))
                        .filter(|prefix| !prefix.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "MANIFEST_CACHE_TTL_SECONDS" => {
                    config.manifest.ttl_seconds = parse_number(key, value)?;
                }
                "PRESIGN_EXPIRES_SECONDS" => {
                    config.store.presign_expires_seconds = parse_number(key, value)?;
                }
                "HF_TOKEN" => config.inference.token = Some(value.to_string()),
                "HF_ENDPOINT_URL_RESTORE" => {
                    config.inference.endpoints.restore = Some(value.to_string())
                }
                "HF_ENDPOINT_URL_REMOVE_BG" => {
                    config.inference.endpoints.remove_bg = Some(value.to_string())
                }
                "HF_ENDPOINT_URL_INSTRUCTPIX2PIX" => {
                    config.inference.endpoints.edit_by_text = Some(value.to_string())
                }
                "HF_ENDPOINT_URL_QWEN_EDIT" => {
                    config.inference.endpoints.qwen_edit = Some(value.to_string())
                }
                "INFERENCE_TIMEOUT_SEC" => {
                    config.inference.timeout_seconds = parse_number(key, value)?;
                }
                _ => {
                    // Unknown environment variable, ignore
                }
            }
        }

        Ok(())
    }

    /// Apply `section.field=value` overrides from the command line
    fn apply_cli_overrides(
        config: &mut PrismToml,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "store.bucket" => config.store.bucket = Some(value.clone()),
                "store.endpoint" => config.store.endpoint = Some(value.clone()),
                "store.region" => config.store.region = value.clone(),
                "store.presign_expires_seconds" => {
                    config.store.presign_expires_seconds = parse_number(key, value)?;
                }
                "store.timeout_seconds" => {
                    config.store.timeout_seconds = parse_number(key, value)?;
                }
                "manifest.ttl_seconds" => {
                    config.manifest.ttl_seconds = parse_number(key, value)?;
                }
                "manifest.version" => config.manifest.version = value.clone(),
                "cache.namespace" => config.cache.namespace = value.clone(),
                "inference.timeout_seconds" => {
                    config.inference.timeout_seconds = parse_number(key, value)?;
                }
                other => {
                    return Err(PrismError::config(
                        other,
                        "is not a setting that can be overridden with --set",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        ENV_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Parse `key=value` pairs given to --set
    pub fn parse_cli_overrides(pairs: &[String]) -> ConfigResult<HashMap<String, String>> {
        pairs
            .iter()
            .map(|pair| {
                pair.split_once('=')
                    .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                    .ok_or_else(|| PrismError::config(pair.as_str(), "expected key=value"))
            })
            .collect()
    }
}

fn parse_number(key: &str, value: &str) -> ConfigResult<u64> {
    value
        .parse()
        .map_err(|e| PrismError::config(key, format!("'{}' is not a number: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8_dir(temp_dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap()
    }

    #[tokio::test]
    async fn test_find_project_config_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_dir(&temp_dir);
        let nested = root.join("a").join("b");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(root.join(CONFIG_FILE_NAME), "[store]\nbucket = \"filters\"\n")
            .await
            .unwrap();

        let loader = ConfigLoader::new(nested);
        assert_eq!(loader.find_project_config(), Some(root.join(CONFIG_FILE_NAME)));

        let (config, source) = loader.load_file_config(None).await.unwrap();
        assert_eq!(config.store.bucket.as_deref(), Some("filters"));
        assert!(matches!(source, ConfigSource::Project(_)));
    }

    #[tokio::test]
    async fn test_explicit_config_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_dir(&temp_dir);
        let loader = ConfigLoader::new(root.clone());

        let missing = root.join("missing.toml");
        assert!(matches!(
            loader.load_file_config(Some(&missing)).await,
            Err(PrismError::ConfigValidation { .. })
        ));

        let present = root.join("custom.toml");
        tokio::fs::write(&present, "[manifest]\nttl_seconds = 10\n").await.unwrap();
        let (config, source) = loader.load_file_config(Some(&present)).await.unwrap();
        assert_eq!(config.manifest.ttl_seconds, 10);
        assert_eq!(source, ConfigSource::Explicit(present));
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("CF_R2_BUCKET".to_string(), "env-bucket".to_string()),
            ("CF_R2_ACCOUNT_ID".to_string(), "acc".to_string()),
            ("INDEXED_PREFIXES".to_string(), " /ON1_BW_LUTs/ , ,Presets".to_string()),
            ("MANIFEST_CACHE_TTL_SECONDS".to_string(), "60".to_string()),
            ("HF_ENDPOINT_URL_INSTRUCTPIX2PIX".to_string(), "https://pix".to_string()),
            ("HF_TOKEN".to_string(), "  ".to_string()),
        ]);

        let merged =
            ConfigLayering::merge_configs(PrismToml::default(), &env, &HashMap::new()).unwrap();

        assert_eq!(merged.store.bucket.as_deref(), Some("env-bucket"));
        assert_eq!(merged.store.account_id.as_deref(), Some("acc"));
        assert_eq!(merged.manifest.indexed_prefixes, vec!["ON1_BW_LUTs", "Presets"]);
        assert_eq!(merged.manifest.ttl_seconds, 60);
        assert_eq!(merged.inference.endpoints.edit_by_text.as_deref(), Some("https://pix"));
        // Blank values do not clobber file settings
        assert_eq!(merged.inference.token, None);
    }

    #[test]
    fn test_invalid_env_number() {
        let env = HashMap::from([("INFERENCE_TIMEOUT_SEC".to_string(), "soon".to_string())]);
        assert!(matches!(
            ConfigLayering::merge_configs(PrismToml::default(), &env, &HashMap::new()),
            Err(PrismError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_cli_overrides_win_over_env() {
        let env = HashMap::from([("CF_R2_BUCKET".to_string(), "env-bucket".to_string())]);
        let cli = ConfigLayering::parse_cli_overrides(&[
            "store.bucket=cli-bucket".to_string(),
            "manifest.ttl_seconds = 5".to_string(),
        ])
        .unwrap();

        let merged = ConfigLayering::merge_configs(PrismToml::default(), &env, &cli).unwrap();
        assert_eq!(merged.store.bucket.as_deref(), Some("cli-bucket"));
        assert_eq!(merged.manifest.ttl_seconds, 5);
    }

    #[test]
    fn test_unknown_cli_override_rejected() {
        let cli = HashMap::from([("store.secret".to_string(), "x".to_string())]);
        assert!(ConfigLayering::merge_configs(PrismToml::default(), &HashMap::new(), &cli).is_err());
        assert!(ConfigLayering::parse_cli_overrides(&["no-equals".to_string()]).is_err());
    }

    #[test]
    fn test_overrides_are_revalidated() {
        let cli = HashMap::from([("store.timeout_seconds".to_string(), "0".to_string())]);
        assert!(matches!(
            ConfigLayering::merge_configs(PrismToml::default(), &HashMap::new(), &cli),
            Err(PrismError::ConfigValidation { .. })
        ));
    }
}
