use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use crate::analysis::{aggregate, score_movement, score_posture, AggregateResult, EyeContactScorer};
use crate::config::Config;
use crate::error::AnalysisError;
use crate::face::{BlazeFaceDetector, FaceDetector};
use crate::frame::Frame;
use crate::pose::{MoveNetPoseEstimator, PoseEstimator};
use crate::video::{sample, ContainerNormalizer, OpenCvVideo, VideoSource};

/// Opens a (normalized) clip for sampling.
pub type VideoOpener = Box<dyn Fn(&Path) -> anyhow::Result<Box<dyn VideoSource>> + Send + Sync>;

fn open_with_opencv(path: &Path) -> anyhow::Result<Box<dyn VideoSource>> {
    Ok(Box::new(OpenCvVideo::open(path)?))
}

/// Nonverbal-behaviour analysis pipeline.
///
/// Holds only read-only collaborators; every `analyze` call is independent.
pub struct Analyzer {
    config: Config,
    pose: Option<Arc<dyn PoseEstimator>>,
    face: Option<Arc<dyn FaceDetector>>,
    normalizer: ContainerNormalizer,
    opener: VideoOpener,
}

impl Analyzer {
    pub fn new(
        config: Config,
        pose: Option<Arc<dyn PoseEstimator>>,
        face: Option<Arc<dyn FaceDetector>>,
    ) -> Self {
        match &pose {
            Some(pose) => {
                let caps = pose.capabilities();
                log::info!("Posture: pose model {}x{} {:?}", caps.input_width, caps.input_height, caps.element_type);
            }
            None => log::info!("Posture: no pose model"),
        }
        match &face {
            Some(face) => {
                let caps = face.capabilities();
                log::info!("Eye contact: face model {}x{} {:?}", caps.input_width, caps.input_height, caps.element_type);
            }
            None => log::info!("Eye contact: skin heuristic only"),
        }

        let normalizer = ContainerNormalizer::from_config(&config.normalizer);
        Self {
            config,
            pose,
            face,
            normalizer,
            opener: Box::new(open_with_opencv),
        }
    }

    /// Load the configured models. A model that fails to load is treated as absent.
    pub fn from_config(config: Config) -> Self {
        let threads = config.models.intra_threads;

        let pose = config.models.pose_model.as_ref().and_then(|path| {
            match MoveNetPoseEstimator::new(path, threads) {
                Ok(estimator) => Some(Arc::new(estimator) as Arc<dyn PoseEstimator>),
                Err(e) => {
                    log::warn!("Pose model unavailable, posture will be neutral: {:#}", e);
                    None
                }
            }
        });
        let face = config.models.face_model.as_ref().and_then(|path| {
            match BlazeFaceDetector::new(path, threads) {
                Ok(detector) => Some(Arc::new(detector) as Arc<dyn FaceDetector>),
                Err(e) => {
                    log::warn!("Face model unavailable, using skin heuristic: {:#}", e);
                    None
                }
            }
        });

        Self::new(config, pose, face)
    }

    pub fn with_normalizer(mut self, normalizer: ContainerNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_opener(mut self, opener: VideoOpener) -> Self {
        self.opener = opener;
        self
    }

    /// Analyze one recording. Input defects yield [`AggregateResult::fallback`].
    pub fn analyze<P: AsRef<Path>>(&self, path: P) -> AggregateResult {
        let path = path.as_ref();
        let started = Instant::now();
        match self.try_analyze(path) {
            Ok(result) => {
                log::info!(
                    "Analyzed {} in {:.2?}: confidence {}",
                    path.display(),
                    started.elapsed(),
                    result.confidence_score
                );
                result
            }
            Err(e) => {
                log::error!("{:#}; returning default assessment", anyhow::Error::from(e));
                AggregateResult::fallback()
            }
        }
    }

    /// Like [`analyze`](Self::analyze) but reports why the default would be used.
    pub fn try_analyze(&self, path: &Path) -> Result<AggregateResult, AnalysisError> {
        if !path.is_file() {
            return Err(AnalysisError::MissingFile(path.to_path_buf()));
        }

        // dropped at the end of this function, removing any repaired copy
        let normalized = self.normalizer.normalize(path);

        let mut video = (self.opener)(normalized.path()).map_err(|source| {
            AnalysisError::Unopenable {
                path: path.to_path_buf(),
                source: source.into(),
            }
        })?;
        let frames = sample(&mut *video, self.config.sampling.max_frames);
        drop(video);

        if frames.is_empty() {
            return Err(AnalysisError::NoFrames(path.to_path_buf()));
        }
        log::info!("Sampled {} frames from {}", frames.len(), path.display());

        Ok(self.score_frames(&frames))
    }

    /// Run the three scorers and the aggregator over already decoded frames.
    pub fn score_frames(&self, frames: &[Frame]) -> AggregateResult {
        let posture = score_posture(frames, self.pose.as_deref());
        let eye_contact = EyeContactScorer::new(self.face.as_deref()).score(frames);
        let movement = score_movement(frames);
        let confidence_score = aggregate(posture.score, eye_contact.score, movement.score);

        AggregateResult {
            posture,
            eye_contact,
            movement,
            confidence_score,
        }
    }

    /// Run [`analyze`](Self::analyze) on a worker thread, giving up after `timeout`.
    ///
    /// The worker is detached on timeout and its result discarded.
    pub fn analyze_with_timeout<P: AsRef<Path>>(
        self: &Arc<Self>,
        path: P,
        timeout: Duration,
    ) -> AggregateResult {
        let path: PathBuf = path.as_ref().to_path_buf();
        let analyzer = Arc::clone(self);
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("bodylang-analyze".to_string())
            .spawn(move || {
                let result = analyzer.analyze(&path);
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            log::error!("Failed to spawn analysis thread: {}", e);
            return AggregateResult::fallback();
        }

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::error!("Analysis timed out after {:?}; returning default assessment", timeout);
                AggregateResult::fallback()
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                log::error!("Analysis thread terminated without a result");
                AggregateResult::fallback()
            }
        }
    }
}
