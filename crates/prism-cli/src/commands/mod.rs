//! Command implementations and dispatch logic.
//!
//! Each command is an async function over a shared [`CommandContext`]. The
//! parts that talk to the object store take it as an argument so they can
//! run against any [`BlobStore`].

use camino::{Utf8Path, Utf8PathBuf};
use prism_cache::{CacheKeyDeriver, ContentCache};
use prism_config::{ConfigLayering, ConfigLoader, ConfigSource, PrismToml};
use prism_core::clock::SystemClock;
use prism_core::error::{PrismError, PrismResult};
use prism_inference::{HfClient, InferenceService};
use prism_store::BlobStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod check;
pub mod infer;
pub mod key;
pub mod manifest;
pub mod presign;


use crate::{output::OutputHandler, Commands};

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: Utf8PathBuf,
    pub config: PrismToml,
    pub source: ConfigSource,
    pub output: OutputHandler,
}

impl CommandContext {
    /// Load configuration and create the command context
    pub async fn new(explicit: Option<&Utf8Path>, overrides: &[String]) -> PrismResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| PrismError::io("Failed to get current directory", e))?;
        let cwd = Utf8PathBuf::try_from(cwd)
            .map_err(|e| PrismError::io("Working directory is not valid UTF-8", e.into_io_error()))?;

        let overrides = ConfigLayering::parse_cli_overrides(overrides)?;
        let (config, source) = ConfigLoader::new(cwd.clone()).load(explicit, &overrides).await?;

        Ok(Self {
            cwd,
            config,
            source,
            output: OutputHandler::new(),
        })
    }

    /// Connect to the configured object store
    pub fn store(&self) -> PrismResult<Arc<dyn BlobStore>> {
        prism_store::connect(&self.config.store)
    }

    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.config.store.presign_expires_seconds)
    }

    pub fn key_deriver(&self) -> CacheKeyDeriver {
        CacheKeyDeriver::from_settings(&self.config.cache, Arc::new(SystemClock))
    }

    /// Inference service over `store` and the configured backends
    pub fn inference_service(&self, store: Arc<dyn BlobStore>) -> PrismResult<InferenceService> {
        let client = HfClient::new(&self.config.inference)?;
        let cache = ContentCache::new(store, self.key_deriver(), self.presign_ttl())
            .with_producer_timeout(client.call_budget());
        Ok(InferenceService::new(Arc::new(cache), Arc::new(client)))
    }

    /// Resolve a path given on the command line against the working directory
    pub fn resolve_path(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> PrismResult<()> {
    match command {
        Commands::Manifest {
            category,
            target,
            page,
            page_size,
            json,
        } => {
            info!("Listing manifest (category: {:?}, target: {:?})", category, target);
            let query = prism_manifest::ManifestQuery {
                category,
                target,
                page,
                page_size,
            };
            manifest::execute(query, json, ctx).await
        }
        Commands::Presign { pack_id, key } => {
            info!("Presigning {} from pack {}", key, pack_id);
            presign::execute(&pack_id, &key, ctx).await
        }
        Commands::Restore {
            image,
            task,
            upscale,
            tile,
            fidelity,
            no_background_enhance,
            no_face_upsample,
            delivery,
        } => {
            info!("Restoring {}", image);
            let options = infer::RestoreOptions {
                task,
                upscale,
                tile,
                fidelity,
                background_enhance: !no_background_enhance,
                face_upsample: !no_face_upsample,
            };
            infer::restore(&image, options, &delivery, ctx).await
        }
        Commands::RemoveBg { image, delivery } => {
            info!("Removing background from {}", image);
            infer::remove_background(&image, &delivery, ctx).await
        }
        Commands::Edit {
            image,
            prompt,
            steps,
            image_guidance,
            guidance,
            delivery,
        } => {
            info!("Editing {}", image);
            infer::edit(&image, prompt, steps, image_guidance, guidance, &delivery, ctx).await
        }
        Commands::QwenEdit {
            images,
            prompt,
            steps,
            guidance,
            delivery,
        } => {
            info!("Editing {} image(s) with Qwen", images.len());
            infer::qwen_edit(&images, prompt, steps, guidance, &delivery, ctx).await
        }
        Commands::Key {
            operation,
            files,
            params,
            variant,
        } => {
            info!("Deriving cache key for {}", operation);
            key::execute(&operation, &files, &params, variant.as_deref(), ctx).await
        }
        Commands::Check => {
            info!("Checking configuration");
            check::execute(ctx).await
        }
    }
}

/// Read an input file, naming it in the error
pub async fn read_input(path: &Utf8Path) -> PrismResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| PrismError::io(format!("Failed to read {}", path), e))
}

/// Render a serializable value as pretty JSON
pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> PrismResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| PrismError::io("Failed to encode JSON output", e.into()))
}
