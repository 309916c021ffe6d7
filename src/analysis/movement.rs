use anyhow::{bail, Result};
use opencv::{
    core::{self, AlgorithmHint, Mat, Size, Vector},
    imgproc,
    prelude::*,
    video,
};

use super::{MovementDetails, ScoreDetails, SignalScore};
use crate::frame::Frame;

/// Flow magnitudes below this are treated as compression/camera noise.
pub const NOISE_MAGNITUDE: f32 = 0.1;
/// Pixels whose flow magnitude exceeds this count as moving.
pub const MOVING_MAGNITUDE: f32 = 0.75;
pub const MIN_FRAMES: usize = 3;

pub const NEUTRAL_SCORE: u8 = 70;
const ALL_PAIRS_FAILED_SCORE: u8 = 95;
const SCORE_FLOOR: f32 = 40.0;
const MAX_VARIANCE_PENALTY: f32 = 5.0;
const ERRATIC_VARIANCE: f32 = 0.5;

const BLUR_KERNEL: i32 = 5;

/// Farneback parameters: pyr_scale, levels, winsize, iterations, poly_n, poly_sigma, flags
const FARNEBACK: (f64, i32, i32, i32, i32, f64, i32) = (0.5, 3, 15, 3, 5, 1.1, 0);

const ERRATIC: &str = " Your movements appear somewhat erratic rather than steady.";

/// Motion between one pair of consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairMotion {
    pub mean_magnitude: f32,
    /// Percentage (0-100) of pixels above [`MOVING_MAGNITUDE`].
    pub moving_percent: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementLevel {
    Minimal,
    Appropriate,
    Moderate,
    Noticeable,
    Excessive,
}

impl MovementLevel {
    pub fn from_score(score: f32) -> Self {
        if score >= 85.0 {
            MovementLevel::Minimal
        } else if score >= 75.0 {
            MovementLevel::Appropriate
        } else if score >= 60.0 {
            MovementLevel::Moderate
        } else if score >= 40.0 {
            MovementLevel::Noticeable
        } else {
            MovementLevel::Excessive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementLevel::Minimal => "minimal",
            MovementLevel::Appropriate => "appropriate",
            MovementLevel::Moderate => "moderate",
            MovementLevel::Noticeable => "noticeable",
            MovementLevel::Excessive => "excessive",
        }
    }

    pub fn evaluation(&self) -> &'static str {
        match self {
            MovementLevel::Minimal => {
                "Composed presentation with appropriate stillness and minimal unnecessary movement."
            }
            MovementLevel::Appropriate => {
                "Good balance of natural movement without excessive fidgeting."
            }
            MovementLevel::Moderate => {
                "Some noticeable movement. Consider maintaining a more steady posture."
            }
            MovementLevel::Noticeable => {
                "Significant movement detected. Try to reduce unnecessary movements."
            }
            MovementLevel::Excessive => "Excessive movement detected. Focus on staying more composed.",
        }
    }

    fn is_calm(&self) -> bool {
        matches!(self, MovementLevel::Minimal | MovementLevel::Appropriate)
    }
}

/// Noise-gated statistics of one flow magnitude field.
pub fn magnitude_stats(magnitudes: &[f32]) -> PairMotion {
    if magnitudes.is_empty() {
        return PairMotion { mean_magnitude: 0.0, moving_percent: 0.0 };
    }
    let mut sum = 0.0f64;
    let mut moving = 0usize;
    for &m in magnitudes {
        if m < NOISE_MAGNITUDE {
            continue;
        }
        sum += m as f64;
        if m > MOVING_MAGNITUDE {
            moving += 1;
        }
    }
    let n = magnitudes.len() as f64;
    PairMotion {
        mean_magnitude: (sum / n) as f32,
        moving_percent: (moving as f64 / n * 100.0) as f32,
    }
}

fn to_gray(frame: &Frame) -> Result<Mat> {
    let mut gray = Mat::default();
    imgproc::cvt_color_def(frame.mat(), &mut gray, imgproc::COLOR_RGB2GRAY)?;
    let mut blurred = Mat::default();
    imgproc::gaussian_blur(
        &gray,
        &mut blurred,
        Size::new(BLUR_KERNEL, BLUR_KERNEL),
        0.0,
        0.0,
        core::BORDER_DEFAULT,
        AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    Ok(blurred)
}

/// Dense optical flow between two blurred grayscale images.
pub fn pair_motion(prev: &Mat, next: &Mat) -> Result<PairMotion> {
    if prev.size()? != next.size()? {
        bail!("Frame size changed between {:?} and {:?}", prev.size()?, next.size()?);
    }

    let (pyr_scale, levels, winsize, iterations, poly_n, poly_sigma, flags) = FARNEBACK;
    let mut flow = Mat::default();
    video::calc_optical_flow_farneback(
        prev, next, &mut flow, pyr_scale, levels, winsize, iterations, poly_n, poly_sigma, flags,
    )?;

    let mut planes: Vector<Mat> = Vector::new();
    core::split(&flow, &mut planes)?;
    let mut magnitude = Mat::default();
    let mut angle = Mat::default();
    core::cart_to_polar_def(&planes.get(0)?, &planes.get(1)?, &mut magnitude, &mut angle)?;

    let magnitude = if magnitude.is_continuous() {
        magnitude
    } else {
        magnitude.try_clone()?
    };
    Ok(magnitude_stats(magnitude.data_typed::<f32>()?))
}

/// Score from per-pair statistics. `pairs` must be non-empty.
pub fn score_from_pairs(pairs: &[PairMotion]) -> SignalScore {
    let n = pairs.len().max(1) as f32;
    let mean = pairs.iter().map(|p| p.mean_magnitude).sum::<f32>() / n;
    let variance = pairs
        .iter()
        .map(|p| (p.mean_magnitude - mean).powi(2))
        .sum::<f32>()
        / n;
    let area = pairs.iter().map(|p| p.moving_percent).sum::<f32>() / n;

    let base = if mean < 0.1 {
        100.0
    } else if mean < 0.2 {
        95.0
    } else {
        90.0 - mean * 3.0 - area * 0.3
    };
    let raw = (base - (variance * 2.0).min(MAX_VARIANCE_PENALTY)).clamp(SCORE_FLOOR, 100.0);

    let level = MovementLevel::from_score(raw);
    let mut evaluation = level.evaluation().to_string();
    if variance > ERRATIC_VARIANCE && !level.is_calm() {
        evaluation.push_str(ERRATIC);
    }

    log::info!(
        "Movement: mean magnitude {:.3}, variance {:.3}, moving area {:.2}%, score {:.1} ({})",
        mean,
        variance,
        area,
        raw,
        level.as_str()
    );

    SignalScore::new(raw as u8, evaluation).with_details(ScoreDetails::Movement(MovementDetails {
        movement_level: level.as_str().to_string(),
        avg_magnitude: mean,
        variance,
        avg_area_percent: area,
    }))
}

/// Score stillness versus fidgeting from consecutive-frame optical flow.
pub fn score_movement(frames: &[Frame]) -> SignalScore {
    if frames.len() < MIN_FRAMES {
        return SignalScore::new(NEUTRAL_SCORE, "Unable to analyze movement");
    }

    let mut pairs = Vec::with_capacity(frames.len() - 1);
    let mut prev: Option<Mat> = None;
    for (i, frame) in frames.iter().enumerate() {
        let current = match to_gray(frame) {
            Ok(gray) => gray,
            Err(e) => {
                log::warn!("Frame {}: grayscale conversion failed: {:#}", i, e);
                prev = None;
                continue;
            }
        };
        if let Some(prev) = &prev {
            match pair_motion(prev, &current) {
                Ok(motion) => pairs.push(motion),
                Err(e) => log::warn!("Frames {}-{}: optical flow failed: {:#}", i - 1, i, e),
            }
        }
        prev = Some(current);
    }

    if pairs.is_empty() {
        log::warn!("Optical flow failed for every frame pair");
        return SignalScore::new(
            ALL_PAIRS_FAILED_SCORE,
            "Composed presentation with minimal unnecessary movement.",
        );
    }
    score_from_pairs(&pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::test_util::{frame_with_rect, solid_frame};
    use opencv::core::Rect;

    fn pair(mean_magnitude: f32, moving_percent: f32) -> PairMotion {
        PairMotion { mean_magnitude, moving_percent }
    }

    fn level_of(result: &SignalScore) -> String {
        match &result.details {
            Some(ScoreDetails::Movement(d)) => d.movement_level.clone(),
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_magnitude_stats_noise_gate() {
        let stats = magnitude_stats(&[0.05, 0.05, 0.5, 1.0]);
        // (0.5 + 1.0) / 4
        assert!((stats.mean_magnitude - 0.375).abs() < 1e-6);
        assert!((stats.moving_percent - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_magnitude_stats_empty() {
        assert_eq!(magnitude_stats(&[]), pair(0.0, 0.0));
    }

    #[test]
    fn test_still_pairs_score_100() {
        let result = score_from_pairs(&[pair(0.0, 0.0), pair(0.05, 0.0)]);
        assert_eq!(result.score, 100);
        assert_eq!(level_of(&result), "minimal");
    }

    #[test]
    fn test_slight_motion_scores_95() {
        let result = score_from_pairs(&[pair(0.15, 0.0), pair(0.15, 0.0)]);
        assert_eq!(result.score, 95);
    }

    #[test]
    fn test_linear_formula_truncates() {
        // 90 - 3*2 - 0.3*10 = 81, no variance
        let result = score_from_pairs(&[pair(2.0, 10.0), pair(2.0, 10.0)]);
        assert_eq!(result.score, 81);
        assert_eq!(level_of(&result), "appropriate");

        // 90 - 3*0.5 - 0.3*10.5 = 85.35 -> 85
        let result = score_from_pairs(&[pair(0.5, 10.5)]);
        assert_eq!(result.score, 85);
    }

    #[test]
    fn test_variance_penalty_capped() {
        // mean 5, population variance 25 -> penalty capped at 5
        // base 90 - 15 - 0.3*50 = 60, minus 5 = 55
        let result = score_from_pairs(&[pair(0.0, 50.0), pair(10.0, 50.0)]);
        assert_eq!(result.score, 55);
        assert_eq!(level_of(&result), "noticeable");
        assert!(result.evaluation.ends_with(ERRATIC));
    }

    #[test]
    fn test_score_floor_and_excessive_never_reached() {
        let result = score_from_pairs(&[pair(20.0, 90.0), pair(20.0, 90.0)]);
        assert_eq!(result.score, 40);
        assert_eq!(level_of(&result), "noticeable");
        assert!(!result.evaluation.ends_with(ERRATIC));
    }

    #[test]
    fn test_calm_levels_never_erratic() {
        // variance 1.0 but the score stays in the appropriate band
        // base 90 - 3*1 - 0 = 87, minus 2 = 85 -> minimal
        let result = score_from_pairs(&[pair(0.0, 0.0), pair(2.0, 0.0)]);
        assert_eq!(level_of(&result), "minimal");
        assert!(!result.evaluation.contains("erratic"));
    }

    #[test]
    fn test_movement_levels() {
        assert_eq!(MovementLevel::from_score(85.0), MovementLevel::Minimal);
        assert_eq!(MovementLevel::from_score(84.9), MovementLevel::Appropriate);
        assert_eq!(MovementLevel::from_score(60.0), MovementLevel::Moderate);
        assert_eq!(MovementLevel::from_score(40.0), MovementLevel::Noticeable);
        assert_eq!(MovementLevel::from_score(39.0), MovementLevel::Excessive);
    }

    #[test]
    fn test_too_few_frames() {
        let frames: Vec<Frame> = (0..2).map(|_| solid_frame(64, 48, [10.0, 10.0, 10.0])).collect();
        let result = score_movement(&frames);
        assert_eq!(result.score, 70);
        assert_eq!(result.evaluation, "Unable to analyze movement");
    }

    #[test]
    fn test_identical_frames_are_minimal() {
        let frames: Vec<Frame> = (0..4)
            .map(|_| frame_with_rect(160, 120, Rect::new(40, 30, 50, 50), [200.0, 150.0, 120.0]))
            .collect();
        let result = score_movement(&frames);
        assert_eq!(result.score, 100);
        assert_eq!(level_of(&result), "minimal");
    }

    #[test]
    fn test_all_pairs_failing() {
        // alternating sizes make every pair fail
        let frames: Vec<Frame> = (0..4)
            .map(|i| {
                let w = if i % 2 == 0 { 64 } else { 80 };
                solid_frame(w, 48, [10.0, 10.0, 10.0])
            })
            .collect();
        let result = score_movement(&frames);
        assert_eq!(result.score, 95);
        assert_eq!(
            result.evaluation,
            "Composed presentation with minimal unnecessary movement."
        );
    }
}
