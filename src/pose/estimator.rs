use anyhow::{anyhow, bail, Context, Result};
use ort::session::Session;
use std::path::Path;
use std::sync::Mutex;

use super::keypoint::{Keypoint, KeypointIndex, Pose};
use super::preprocess::{letterbox, resize_exact, unletterbox_pose, LetterboxInfo};
use crate::frame::Frame;
use crate::model::{build_session, FloatRange, ModelCapabilities};

/// MoveNet single-pose input edge when the model declares a dynamic size.
pub const MOVENET_INPUT_SIZE: usize = 192;

/// Single-person body keypoint estimator.
pub trait PoseEstimator: Send + Sync {
    fn capabilities(&self) -> &ModelCapabilities;

    /// `Ok(None)` means the model ran but found no usable pose.
    fn estimate(&self, frame: &Frame) -> Result<Option<Pose>>;
}

/// MoveNet via ONNX Runtime
pub struct MoveNetPoseEstimator {
    session: Mutex<Session>,
    capabilities: ModelCapabilities,
    output_name: String,
}

impl MoveNetPoseEstimator {
    pub fn new<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();
        let session = build_session(model_path, intra_threads)?;
        let capabilities = ModelCapabilities::from_session(&session, MOVENET_INPUT_SIZE)?;
        let output_name = capabilities
            .output_names
            .first()
            .cloned()
            .context("Pose model has no outputs")?;

        log::info!(
            "Loaded pose model {} (input {} {}x{} {:?}, output {})",
            model_path.display(),
            capabilities.input_name,
            capabilities.input_width,
            capabilities.input_height,
            capabilities.element_type,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            capabilities,
            output_name,
        })
    }

    fn prepare(&self, frame: &Frame) -> Result<(opencv::core::Mat, LetterboxInfo)> {
        let caps = &self.capabilities;
        if caps.input_width == caps.input_height {
            letterbox(frame.mat(), caps.input_width as i32)
        } else {
            let resized = resize_exact(frame.mat(), caps.input_width as i32, caps.input_height as i32)?;
            let identity = LetterboxInfo {
                pad_x: 0.0,
                pad_y: 0.0,
                scale_x: 1.0,
                scale_y: 1.0,
            };
            Ok((resized, identity))
        }
    }
}

impl PoseEstimator for MoveNetPoseEstimator {
    fn capabilities(&self) -> &ModelCapabilities {
        &self.capabilities
    }

    fn estimate(&self, frame: &Frame) -> Result<Option<Pose>> {
        let (input, info) = self.prepare(frame)?;
        let tensor = self.capabilities.image_tensor(&input, FloatRange::Raw)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Pose session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![self.capabilities.input_name.as_str() => tensor])
            .context("Pose inference failed")?;

        // [1, 1, 17, 3] (y, x, confidence)
        let output: ndarray::ArrayViewD<f32> = outputs[self.output_name.as_str()]
            .try_extract_array()
            .context("Failed to extract pose output tensor")?;
        if output.shape() != [1, 1, KeypointIndex::COUNT, 3] {
            bail!("Unexpected pose output shape {:?}", output.shape());
        }

        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for (i, kp) in keypoints.iter_mut().enumerate() {
            let y = output[[0, 0, i, 0]];
            let x = output[[0, 0, i, 1]];
            let confidence = output[[0, 0, i, 2]];
            *kp = Keypoint::new(x, y, confidence);
        }

        Ok(Some(unletterbox_pose(&Pose::new(keypoints), &info)))
    }
}
