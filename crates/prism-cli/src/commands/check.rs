//! `prism check` command implementation.
//!
//! Reports which parts of the deployment are configured. Only the store is
//! mandatory; each inference backend is optional.

use prism_config::{ConfigSource, PrismToml};
use prism_core::error::PrismResult;

use super::CommandContext;

const OPERATIONS: &[&str] = &["restore", "remove_bg", "edit_by_text", "qwen_edit"];

/// Outcome of one configuration check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckLine {
    pub name: String,
    pub required: bool,
    pub result: Result<String, String>,
}

/// Execute the `prism check` command
pub async fn execute(ctx: &CommandContext) -> PrismResult<()> {
    ctx.output.step("🔍", "Checking configuration...");
    ctx.output.info(&format!("Source: {}", describe_source(&ctx.source)));

    for line in report(&ctx.config) {
        match &line.result {
            Ok(detail) => ctx.output.success(&format!("{}: {}", line.name, detail)),
            Err(reason) if line.required => ctx.output.error(&format!("{}: {}", line.name, reason)),
            Err(reason) => ctx.output.warn(&format!("{}: {}", line.name, reason)),
        }
    }

    // The store is needed by every other command
    ctx.config.store.validate()?;
    ctx.output.success("Configuration is valid");
    Ok(())
}

/// Check every section of `config`
pub fn report(config: &PrismToml) -> Vec<CheckLine> {
    let mut lines = vec![CheckLine {
        name: "store".to_string(),
        required: true,
        result: config
            .store
            .validate()
            .map(|credentials| format!("bucket '{}' at {}", credentials.bucket, credentials.endpoint))
            .map_err(|e| e.to_string()),
    }];

    let prefixes = config.manifest.crawl_prefixes();
    lines.push(CheckLine {
        name: "manifest".to_string(),
        required: false,
        result: Ok(format!(
            "{} prefix(es), ttl {}s, version {}",
            prefixes.len(),
            config.manifest.ttl_seconds,
            config.manifest.version
        )),
    });

    for operation in OPERATIONS {
        lines.push(CheckLine {
            name: format!("inference.{}", operation),
            required: false,
            result: config
                .inference
                .endpoint_for(operation)
                .map(|(url, _)| url)
                .map_err(|e| e.to_string()),
        });
    }

    lines
}

fn describe_source(source: &ConfigSource) -> String {
    match source {
        ConfigSource::Explicit(path) => format!("{} (--config)", path),
        ConfigSource::Project(path) => path.to_string(),
        ConfigSource::Global(path) => format!("{} (global)", path),
        ConfigSource::Defaults => "defaults and environment".to_string(),
    }
}
