use anyhow::{anyhow, bail, Context, Result};
use ndarray::ArrayViewD;
use ort::session::Session;
use std::path::Path;
use std::sync::Mutex;

use super::detection::Detection;
use crate::frame::Frame;
use crate::model::{build_session, FloatRange, ModelCapabilities};
use crate::pose::preprocess::resize_exact;

/// BlazeFace short-range input edge when the model declares a dynamic size.
pub const BLAZEFACE_INPUT_SIZE: usize = 128;

const SCORES_OUTPUT: &str = "classificators";
const BOXES_OUTPUT: &str = "regressors";

/// Face detector returning detections ordered by confidence, highest first.
pub trait FaceDetector: Send + Sync {
    fn capabilities(&self) -> &ModelCapabilities;

    /// An empty result means the model ran and saw nothing.
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// BlazeFace-style detector via ONNX Runtime.
///
/// Only the best-scoring anchor is decoded; its first four regressor values are
/// read as y_center, x_center, h, w in model input pixels.
pub struct BlazeFaceDetector {
    session: Mutex<Session>,
    capabilities: ModelCapabilities,
    outputs: Option<(String, String)>,
}

impl BlazeFaceDetector {
    pub fn new<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();
        let session = build_session(model_path, intra_threads)?;
        let capabilities = ModelCapabilities::from_session(&session, BLAZEFACE_INPUT_SIZE)?;

        let outputs = match (
            capabilities.find_output(SCORES_OUTPUT),
            capabilities.find_output(BOXES_OUTPUT),
        ) {
            (Some(scores), Some(boxes)) => Some((scores.to_string(), boxes.to_string())),
            _ => {
                log::warn!(
                    "Face model outputs {:?} lack '{}'/'{}'; model results will be skipped",
                    capabilities.output_names,
                    SCORES_OUTPUT,
                    BOXES_OUTPUT
                );
                None
            }
        };

        log::info!(
            "Loaded face model {} (input {} {}x{} {:?})",
            model_path.display(),
            capabilities.input_name,
            capabilities.input_width,
            capabilities.input_height,
            capabilities.element_type
        );

        Ok(Self {
            session: Mutex::new(session),
            capabilities,
            outputs,
        })
    }
}

impl FaceDetector for BlazeFaceDetector {
    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let (scores_name, boxes_name) = self
            .outputs
            .as_ref()
            .context("Face model score/box outputs were not identified")?;

        let caps = &self.capabilities;
        let input = resize_exact(frame.mat(), caps.input_width as i32, caps.input_height as i32)?;
        let tensor = caps.image_tensor(&input, FloatRange::Signed)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Face session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![caps.input_name.as_str() => tensor])
            .context("Face inference failed")?;

        let scores: ArrayViewD<f32> = outputs[scores_name.as_str()]
            .try_extract_array()
            .context("Failed to extract face scores")?;
        let boxes: ArrayViewD<f32> = outputs[boxes_name.as_str()]
            .try_extract_array()
            .context("Failed to extract face boxes")?;

        let scores: Vec<f32> = scores.iter().copied().collect();
        let box_width = boxes.shape().last().copied().unwrap_or(0);
        let boxes: Vec<f32> = boxes.iter().copied().collect();

        let best = decode_best(
            &scores,
            &boxes,
            box_width,
            caps.input_width as f32,
            caps.input_height as f32,
        )?;
        if best.is_none() {
            log::debug!("Face model returned no anchors");
        }
        Ok(best.into_iter().collect())
    }
}

/// Decode the highest-scoring anchor from flat score and regressor buffers.
///
/// `Ok(None)` only for an empty score tensor. Regressors that cannot hold the
/// winning anchor's box are an error.
fn decode_best(
    scores: &[f32],
    boxes: &[f32],
    box_width: usize,
    input_w: f32,
    input_h: f32,
) -> Result<Option<Detection>> {
    let Some((best, &confidence)) = scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
    else {
        return Ok(None);
    };

    if box_width < 4 {
        bail!("Face regressors have {} values per anchor, need 4", box_width);
    }
    let start = best * box_width;
    let row = boxes
        .get(start..start + 4)
        .ok_or_else(|| anyhow!("No regressor row for anchor {} ({} values)", best, boxes.len()))?;
    let (cy, cx, h, w) = (row[0], row[1], row[2], row[3]);
    Ok(Some(Detection::from_center_size(
        cx / input_w,
        cy / input_h,
        w / input_w,
        h / input_h,
        confidence,
    )))
}
