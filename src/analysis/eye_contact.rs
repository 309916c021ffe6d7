use anyhow::Result;
use std::cell::OnceCell;

use super::skin::{find_skin_regions, SkinRegion, MIN_AREA_FRACTION};
use super::{to_score, EyeContactDetails, ScoreDetails, SignalScore};
use crate::face::{Detection, FaceDetector};
use crate::frame::Frame;

/// Minimum detector confidence for a face to count.
pub const FACE_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// Per-frame score at or above which a frame shows good eye contact.
pub const GOOD_FRAME_SCORE: f32 = 40.0;

pub const SHAPE_MAX_DISTANCE: f32 = 0.6;
pub const SHAPE_MIN_ASPECT: f32 = 0.4;
pub const SHAPE_MAX_ASPECT: f32 = 2.0;
pub const SHAPE_SCORE_FLOOR: f32 = 50.0;

pub const BLOB_MAX_DISTANCE: f32 = 0.75;
pub const BLOB_BASE_SCORE: f32 = 80.0;
pub const BLOB_DISTANCE_PENALTY: f32 = 50.0;
pub const BLOB_SCORE_FLOOR: f32 = 40.0;

const GOOD_WEIGHT: f32 = 0.7;
const MEAN_WEIGHT: f32 = 0.3;
const MIN_FINAL_SCORE: u8 = 10;
const NO_SCORED_FRAMES_SCORE: u8 = 20;

const LIMITED: &str = "Limited eye contact. Focus more on the camera to increase engagement.";

/// One way of locating the face in a frame, tried in order until one answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeContactStrategy {
    /// Face detector output. A confident miss scores 0.
    Model,
    /// Most face-like skin region.
    SkinShape,
    /// Largest skin region of any shape, heavily discounted.
    LargestBlob,
}

/// Frame plus lazily computed skin regions shared by the skin strategies.
struct FrameView<'f> {
    frame: &'f Frame,
    skin: OnceCell<Vec<SkinRegion>>,
}

impl<'f> FrameView<'f> {
    fn new(frame: &'f Frame) -> Self {
        Self { frame, skin: OnceCell::new() }
    }

    fn skin_regions(&self) -> Result<&[SkinRegion]> {
        if let Some(regions) = self.skin.get() {
            return Ok(regions);
        }
        let regions = find_skin_regions(self.frame.mat())?;
        Ok(self.skin.get_or_init(|| regions))
    }

    fn min_area(&self) -> f64 {
        self.frame.width() as f64 * self.frame.height() as f64 * MIN_AREA_FRACTION
    }
}

impl EyeContactStrategy {
    /// `Ok(None)` and `Err` both hand the frame to the next strategy.
    fn evaluate(&self, view: &FrameView<'_>, face: Option<&dyn FaceDetector>) -> Result<Option<f32>> {
        match self {
            EyeContactStrategy::Model => {
                let Some(face) = face else {
                    return Ok(None);
                };
                let detections = face.detect(view.frame)?;
                Ok(Some(model_score(view.frame, detections.first())))
            }
            EyeContactStrategy::SkinShape => {
                let min_area = view.min_area();
                let score = view
                    .skin_regions()?
                    .iter()
                    .filter(|region| region.area > min_area)
                    .filter(|region| {
                        let aspect = region.aspect_ratio();
                        (SHAPE_MIN_ASPECT..=SHAPE_MAX_ASPECT).contains(&aspect)
                    })
                    .find_map(|region| {
                        let (x, y) = region.bounds_center();
                        let d = view.frame.normalized_center_distance(x, y);
                        (d < SHAPE_MAX_DISTANCE).then(|| (100.0 - d * 100.0).clamp(SHAPE_SCORE_FLOOR, 100.0))
                    });
                Ok(score)
            }
            EyeContactStrategy::LargestBlob => {
                let min_area = view.min_area();
                let score = view
                    .skin_regions()?
                    .first()
                    .filter(|region| region.area > min_area)
                    .and_then(|region| region.centroid)
                    .and_then(|(x, y)| {
                        let d = view.frame.normalized_center_distance(x, y);
                        (d < BLOB_MAX_DISTANCE).then(|| {
                            (BLOB_BASE_SCORE - d * BLOB_DISTANCE_PENALTY)
                                .clamp(BLOB_SCORE_FLOOR, BLOB_BASE_SCORE)
                        })
                    });
                Ok(score)
            }
        }
    }
}

/// Centering score of the best detection; 0 when nothing confident was seen.
fn model_score(frame: &Frame, best: Option<&Detection>) -> f32 {
    match best {
        Some(det) if det.confidence >= FACE_CONFIDENCE_THRESHOLD => {
            let (x, y) = det.center_in(frame.width(), frame.height());
            let d = frame.normalized_center_distance(x, y);
            (100.0 - d * 100.0).clamp(0.0, 100.0)
        }
        _ => 0.0,
    }
}

pub fn evaluation(good_percent: f32) -> &'static str {
    if good_percent >= 80.0 {
        "Excellent eye contact. You consistently maintained focus on the camera."
    } else if good_percent >= 60.0 {
        "Good eye contact. You maintained focus on the camera most of the time."
    } else if good_percent >= 40.0 {
        "Fair eye contact. Try to look at the camera more consistently."
    } else {
        LIMITED
    }
}

/// Gaze-centering scorer built from an ordered strategy list.
pub struct EyeContactScorer<'a> {
    face: Option<&'a dyn FaceDetector>,
    strategies: Vec<EyeContactStrategy>,
}

impl<'a> EyeContactScorer<'a> {
    /// Model first when a detector is present, then the skin heuristics.
    pub fn new(face: Option<&'a dyn FaceDetector>) -> Self {
        let mut strategies = Vec::with_capacity(3);
        if face.is_some() {
            strategies.push(EyeContactStrategy::Model);
        }
        strategies.extend([EyeContactStrategy::SkinShape, EyeContactStrategy::LargestBlob]);
        Self { face, strategies }
    }

    pub fn with_strategies(face: Option<&'a dyn FaceDetector>, strategies: Vec<EyeContactStrategy>) -> Self {
        Self { face, strategies }
    }

    pub fn strategies(&self) -> &[EyeContactStrategy] {
        &self.strategies
    }

    /// First answer from the strategy chain, `None` if every strategy passed.
    pub fn frame_score(&self, frame: &Frame) -> Option<f32> {
        let view = FrameView::new(frame);
        for strategy in &self.strategies {
            match strategy.evaluate(&view, self.face) {
                Ok(Some(score)) => {
                    log::debug!("{:?} scored frame at {:.1}", strategy, score);
                    return Some(score);
                }
                Ok(None) => {}
                Err(e) => log::debug!("{:?} failed, falling through: {:#}", strategy, e),
            }
        }
        None
    }

    pub fn score(&self, frames: &[Frame]) -> SignalScore {
        if frames.is_empty() {
            return SignalScore::new(0, "Unable to analyze eye contact");
        }

        let scores: Vec<f32> = frames.iter().filter_map(|f| self.frame_score(f)).collect();
        if scores.is_empty() {
            log::warn!("No frame produced an eye contact estimate");
            return SignalScore::new(NO_SCORED_FRAMES_SCORE, LIMITED);
        }

        let total = scores.len();
        let good = scores.iter().filter(|&&s| s >= GOOD_FRAME_SCORE).count();
        let good_percent = good as f32 / total as f32 * 100.0;
        let mean = scores.iter().sum::<f32>() / total as f32;
        let score = to_score(GOOD_WEIGHT * good_percent + MEAN_WEIGHT * mean).max(MIN_FINAL_SCORE);

        log::info!(
            "Eye contact: {}/{} good frames, avg score {:.1}, final score {}",
            good,
            total,
            mean,
            score
        );

        SignalScore::new(score, evaluation(good_percent)).with_details(ScoreDetails::EyeContact(
            EyeContactDetails {
                good_frames: good,
                total_frames: total,
                average_score: mean,
            },
        ))
    }
}
