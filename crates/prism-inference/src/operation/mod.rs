//! Inference operations, their validation and wire payloads

use base64::{engine::general_purpose, Engine as _};
use prism_cache::{KeyRequest, Params};
use prism_core::error::PrismError;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::InferenceResult;

/// Images a multi-image edit accepts
pub const MAX_QWEN_IMAGES: usize = 3;

/// What the restore backend should do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreTask {
    Upscale,
    #[default]
    UpscaleFaceRestore,
}

impl RestoreTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreTask::Upscale => "upscale",
            RestoreTask::UpscaleFaceRestore => "upscale+face_restore",
        }
    }
}

impl fmt::Display for RestoreTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestoreTask {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upscale" => Ok(RestoreTask::Upscale),
            "upscale+face_restore" => Ok(RestoreTask::UpscaleFaceRestore),
            _ => Err(PrismError::invalid(
                "task",
                "must be 'upscale' or 'upscale+face_restore'",
            )),
        }
    }
}

/// Upscale and face restoration (Real-ESRGAN + CodeFormer)
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreRequest {
    pub image: Vec<u8>,
    pub task: RestoreTask,
    pub upscale: u32,
    pub tile: i64,
    pub codeformer_fidelity: f64,
    pub background_enhance: bool,
    pub face_upsample: bool,
}

impl RestoreRequest {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            task: RestoreTask::default(),
            upscale: 4,
            tile: 0,
            codeformer_fidelity: 0.5,
            background_enhance: true,
            face_upsample: true,
        }
    }
}

/// Background removal (BRIA RMBG)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveBackgroundRequest {
    pub image: Vec<u8>,
}

/// Instruction-driven edit (InstructPix2Pix)
#[derive(Debug, Clone, PartialEq)]
pub struct EditByTextRequest {
    pub image: Vec<u8>,
    pub prompt: String,
    pub num_inference_steps: u32,
    pub image_guidance_scale: f64,
    pub guidance_scale: f64,
}

impl EditByTextRequest {
    pub fn new(image: Vec<u8>, prompt: impl Into<String>) -> Self {
        Self {
            image,
            prompt: prompt.into(),
            num_inference_steps: 20,
            image_guidance_scale: 1.5,
            guidance_scale: 7.0,
        }
    }
}

/// Multi-image edit (Qwen-Image-Edit)
#[derive(Debug, Clone, PartialEq)]
pub struct QwenEditRequest {
    /// Primary image first, then up to two references
    pub images: Vec<Vec<u8>>,
    pub prompt: String,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
}

impl QwenEditRequest {
    pub fn new(images: Vec<Vec<u8>>, prompt: impl Into<String>) -> Self {
        Self {
            images,
            prompt: prompt.into(),
            num_inference_steps: 20,
            guidance_scale: 7.0,
        }
    }
}

/// A validated-on-demand inference request
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Restore(RestoreRequest),
    RemoveBackground(RemoveBackgroundRequest),
    EditByText(EditByTextRequest),
    QwenEdit(QwenEditRequest),
}

impl Operation {
    /// Operation name, used in cache keys and endpoint lookup
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Restore(_) => "restore",
            Operation::RemoveBackground(_) => "remove_bg",
            Operation::EditByText(_) => "edit_by_text",
            Operation::QwenEdit(_) => "qwen_edit",
        }
    }

    /// Model reported in artifact metadata
    pub fn model(&self) -> &'static str {
        match self {
            Operation::Restore(_) => "realesrgan+codeformer",
            Operation::RemoveBackground(_) => "briaai/RMBG-1.4",
            Operation::EditByText(_) => "timbrooks/instruct-pix2pix",
            Operation::QwenEdit(_) => "qwen-image-edit-2509",
        }
    }

    /// Input images in the order they are hashed and sent
    pub fn inputs(&self) -> Vec<&[u8]> {
        match self {
            Operation::Restore(req) => vec![req.image.as_slice()],
            Operation::RemoveBackground(req) => vec![req.image.as_slice()],
            Operation::EditByText(req) => vec![req.image.as_slice()],
            Operation::QwenEdit(req) => req.images.iter().map(Vec::as_slice).collect(),
        }
    }

    /// Reject malformed requests before any I/O
    pub fn validate(&self) -> InferenceResult<()> {
        match self {
            Operation::Restore(req) => {
                non_empty_image("image", &req.image)?;
                if !(2..=4).contains(&req.upscale) {
                    return Err(PrismError::invalid("upscale", "must be 2, 3, or 4"));
                }
                if req.tile < 0 {
                    return Err(PrismError::invalid("tile", "must be >= 0"));
                }
                finite("codeformer_fidelity", req.codeformer_fidelity)?;
                if !(0.0..=1.0).contains(&req.codeformer_fidelity) {
                    return Err(PrismError::invalid("codeformer_fidelity", "must be in [0, 1]"));
                }
            }
            Operation::RemoveBackground(req) => non_empty_image("image", &req.image)?,
            Operation::EditByText(req) => {
                non_empty_image("image", &req.image)?;
                non_empty_prompt(&req.prompt)?;
                finite("image_guidance_scale", req.image_guidance_scale)?;
                finite("guidance_scale", req.guidance_scale)?;
            }
            Operation::QwenEdit(req) => {
                if req.images.is_empty() || req.images.len() > MAX_QWEN_IMAGES {
                    return Err(PrismError::invalid(
                        "images",
                        format!("expected 1 to {} images", MAX_QWEN_IMAGES),
                    ));
                }
                for (i, image) in req.images.iter().enumerate() {
                    non_empty_image(&format!("image_{}", i + 1), image)?;
                }
                non_empty_prompt(&req.prompt)?;
                finite("guidance_scale", req.guidance_scale)?;
            }
        }
        Ok(())
    }

    /// Parameters that distinguish one result from another
    pub fn key_params(&self) -> Params {
        let value = match self {
            Operation::Restore(req) => restore_params(req),
            Operation::RemoveBackground(_) => json!({}),
            Operation::EditByText(req) => json!({
                "prompt": req.prompt,
                "steps": req.num_inference_steps,
                "img_guidance": req.image_guidance_scale,
                "guidance": req.guidance_scale,
            }),
            Operation::QwenEdit(req) => json!({
                "prompt": req.prompt,
                "steps": req.num_inference_steps,
                "scale": req.guidance_scale,
                "num_images": req.images.len(),
            }),
        };
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => Params::new(),
        }
    }

    /// Cache key request covering inputs and parameters
    pub fn key_request(&self, variant: Option<&str>) -> KeyRequest {
        let inputs = self.inputs();
        KeyRequest::with_inputs(self.name(), inputs.as_slice())
            .variant(variant)
            .with_params(self.key_params())
    }

    /// Primary request body
    pub fn payload(&self) -> Value {
        match self {
            Operation::Restore(req) => {
                let mut body = restore_params(req);
                body["inputs"] = Value::String(encode(&req.image));
                body
            }
            Operation::RemoveBackground(req) => json!({ "inputs": encode(&req.image) }),
            Operation::EditByText(req) => json!({
                "inputs": { "image": encode(&req.image), "prompt": req.prompt },
                "parameters": edit_params(req),
            }),
            Operation::QwenEdit(req) => json!({
                "inputs": { "images": encode_all(&req.images), "prompt": req.prompt },
                "parameters": qwen_params(req),
            }),
        }
    }

    /// Body retried once when the backend rejects the primary schema
    pub fn alternate_payload(&self) -> Value {
        match self {
            Operation::Restore(req) => {
                let mut body = restore_params(req);
                body["image"] = Value::String(encode(&req.image));
                body
            }
            Operation::RemoveBackground(req) => json!({ "image": encode(&req.image) }),
            Operation::EditByText(req) => {
                let mut body = edit_params(req);
                body["image"] = Value::String(encode(&req.image));
                body["prompt"] = Value::String(req.prompt.clone());
                body
            }
            Operation::QwenEdit(req) => {
                let mut body = qwen_params(req);
                body["images"] = json!(encode_all(&req.images));
                body["prompt"] = Value::String(req.prompt.clone());
                body
            }
        }
    }
}

fn non_empty_image(field: &str, image: &[u8]) -> InferenceResult<()> {
    if image.is_empty() {
        return Err(PrismError::invalid(field, "is an empty image"));
    }
    Ok(())
}

fn non_empty_prompt(prompt: &str) -> InferenceResult<()> {
    if prompt.trim().is_empty() {
        return Err(PrismError::invalid("prompt", "cannot be empty"));
    }
    Ok(())
}

// JSON has no NaN or infinity; serde_json writes both as null
fn finite(field: &str, value: f64) -> InferenceResult<()> {
    if !value.is_finite() {
        return Err(PrismError::invalid(field, "must be a finite number"));
    }
    Ok(())
}

fn encode(image: &[u8]) -> String {
    general_purpose::STANDARD.encode(image)
}

fn encode_all(images: &[Vec<u8>]) -> Vec<String> {
    images.iter().map(|image| encode(image)).collect()
}

fn restore_params(req: &RestoreRequest) -> Value {
    json!({
        "task": req.task.as_str(),
        "upscale": req.upscale,
        "tile": req.tile,
        "codeformer_fidelity": req.codeformer_fidelity,
        "background_enhance": req.background_enhance,
        "face_upsample": req.face_upsample,
    })
}

fn edit_params(req: &EditByTextRequest) -> Value {
    json!({
        "num_inference_steps": req.num_inference_steps,
        "image_guidance_scale": req.image_guidance_scale,
        "guidance_scale": req.guidance_scale,
    })
}

fn qwen_params(req: &QwenEditRequest) -> Value {
    json!({
        "num_inference_steps": req.num_inference_steps,
        "guidance_scale": req.guidance_scale,
    })
}
