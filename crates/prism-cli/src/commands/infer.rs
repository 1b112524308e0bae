//! Inference commands: `restore`, `remove-bg`, `edit` and `qwen-edit`.
//!
//! All of them go through the cached inference service; a stored result is
//! printed as a URL, an inline one is written to disk.

use camino::{Utf8Path, Utf8PathBuf};
use prism_cache::Artifact;
use prism_core::error::{PrismError, PrismResult};
use prism_inference::{
    EditByTextRequest, InferenceOutcome, Operation, QwenEditRequest, RemoveBackgroundRequest,
    RestoreRequest, RestoreTask,
};

use super::{read_input, CommandContext};
use crate::DeliveryArgs;

/// Restore flags as given on the command line
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub task: String,
    pub upscale: u32,
    pub tile: i64,
    pub fidelity: f64,
    pub background_enhance: bool,
    pub face_upsample: bool,
}

/// Execute the `prism restore` command
pub async fn restore(
    image: &Utf8Path,
    options: RestoreOptions,
    delivery: &DeliveryArgs,
    ctx: &CommandContext,
) -> PrismResult<()> {
    let task: RestoreTask = options.task.parse()?;
    let request = RestoreRequest {
        task,
        upscale: options.upscale,
        tile: options.tile,
        codeformer_fidelity: options.fidelity,
        background_enhance: options.background_enhance,
        face_upsample: options.face_upsample,
        ..RestoreRequest::new(read_input(&ctx.resolve_path(image)).await?)
    };
    run(Operation::Restore(request), image, delivery, ctx).await
}

/// Execute the `prism remove-bg` command
pub async fn remove_background(
    image: &Utf8Path,
    delivery: &DeliveryArgs,
    ctx: &CommandContext,
) -> PrismResult<()> {
    let request = RemoveBackgroundRequest {
        image: read_input(&ctx.resolve_path(image)).await?,
    };
    run(Operation::RemoveBackground(request), image, delivery, ctx).await
}

/// Execute the `prism edit` command
pub async fn edit(
    image: &Utf8Path,
    prompt: String,
    steps: u32,
    image_guidance: f64,
    guidance: f64,
    delivery: &DeliveryArgs,
    ctx: &CommandContext,
) -> PrismResult<()> {
    let request = EditByTextRequest {
        num_inference_steps: steps,
        image_guidance_scale: image_guidance,
        guidance_scale: guidance,
        ..EditByTextRequest::new(read_input(&ctx.resolve_path(image)).await?, prompt)
    };
    run(Operation::EditByText(request), image, delivery, ctx).await
}

/// Execute the `prism qwen-edit` command
pub async fn qwen_edit(
    images: &[Utf8PathBuf],
    prompt: String,
    steps: u32,
    guidance: f64,
    delivery: &DeliveryArgs,
    ctx: &CommandContext,
) -> PrismResult<()> {
    let first = images
        .first()
        .ok_or_else(|| PrismError::invalid("images", "at least one image is required"))?;

    let mut inputs = Vec::with_capacity(images.len());
    for image in images {
        inputs.push(read_input(&ctx.resolve_path(image)).await?);
    }

    let request = QwenEditRequest {
        num_inference_steps: steps,
        guidance_scale: guidance,
        ..QwenEditRequest::new(inputs, prompt)
    };
    run(Operation::QwenEdit(request), first, delivery, ctx).await
}

async fn run(
    operation: Operation,
    source: &Utf8Path,
    delivery: &DeliveryArgs,
    ctx: &CommandContext,
) -> PrismResult<()> {
    // Reject bad input before connecting to anything
    operation.validate()?;

    let service = ctx.inference_service(ctx.store()?)?;
    let outcome = service.run(operation, delivery.variant.as_deref()).await?;
    deliver(&outcome, source, delivery, ctx).await
}

/// Print or save an outcome
pub async fn deliver(
    outcome: &InferenceOutcome,
    source: &Utf8Path,
    delivery: &DeliveryArgs,
    ctx: &CommandContext,
) -> PrismResult<()> {
    if delivery.json {
        println!("{}", super::to_json(&outcome.to_json())?);
        return Ok(());
    }

    match &outcome.artifact {
        Artifact::Stored { url } => {
            if outcome.hit {
                ctx.output.success(&format!("Cache hit for {}", outcome.key));
            } else {
                ctx.output.success(&format!("Stored {}", outcome.key));
            }
            println!("{}", url);
        }
        Artifact::Inline {
            bytes,
            content_type,
        } => {
            let path = match &delivery.output {
                Some(path) => ctx.resolve_path(path),
                None => ctx.cwd.join(inline_file_name(source, outcome.operation, content_type)),
            };
            tokio::fs::write(&path, bytes)
                .await
                .map_err(|e| PrismError::io(format!("Failed to write {}", path), e))?;
            ctx.output
                .warn("Result could not be stored; it will be recomputed next time");
            ctx.output.success(&format!("Wrote {}", path));
        }
    }
    Ok(())
}

/// `<stem>.<operation>.<ext>` next to the working directory
pub fn inline_file_name(source: &Utf8Path, operation: &str, content_type: &str) -> String {
    let stem = source.file_stem().unwrap_or("output");
    format!("{}.{}.{}", stem, operation, extension_for(content_type))
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}
