//! `prism key` command implementation.
//!
//! Derives the cache key a request would use. Nothing is read from or
//! written to the store.

use camino::Utf8PathBuf;
use prism_cache::{CacheKey, KeyRequest, Params};
use prism_core::error::{PrismError, PrismResult};
use serde_json::Value;

use super::{read_input, CommandContext};

/// Execute the `prism key` command
pub async fn execute(
    operation: &str,
    files: &[Utf8PathBuf],
    params: &[String],
    variant: Option<&str>,
    ctx: &CommandContext,
) -> PrismResult<()> {
    let request = build_request(operation, files, params, variant, ctx).await?;
    let key = derive(&request, ctx);

    ctx.output.info(&format!("canonical: {}", request.canonical()));
    ctx.output.info(&format!("digest:    {}", key.digest));
    println!("{}", key);
    Ok(())
}

/// Read the inputs and assemble the key request
pub async fn build_request(
    operation: &str,
    files: &[Utf8PathBuf],
    params: &[String],
    variant: Option<&str>,
    ctx: &CommandContext,
) -> PrismResult<KeyRequest> {
    if operation.trim().is_empty() || operation.contains('/') {
        return Err(PrismError::invalid("operation", "must be a non-empty name without '/'"));
    }

    let mut inputs = Vec::with_capacity(files.len());
    for file in files {
        inputs.push(read_input(&ctx.resolve_path(file)).await?);
    }

    let request = KeyRequest::with_inputs(operation, &inputs)
        .variant(variant)
        .with_params(parse_params(params)?);
    request.validate()?;
    Ok(request)
}

/// Derive the key for `request` with the configured layout
pub fn derive(request: &KeyRequest, ctx: &CommandContext) -> CacheKey {
    ctx.key_deriver().derive(request)
}

/// Parse `name=value` pairs; values that parse as JSON keep their type
pub fn parse_params(pairs: &[String]) -> PrismResult<Params> {
    let mut params = Params::new();
    for pair in pairs {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| PrismError::invalid("param", format!("'{}' is not name=value", pair)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(PrismError::invalid("param", format!("'{}' has an empty name", pair)));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(name.to_string(), value);
    }
    Ok(params)
}
