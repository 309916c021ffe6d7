use super::{PostureDetails, ScoreDetails, SignalScore};
use crate::frame::Frame;
use crate::pose::{KeypointIndex, Pose, PoseEstimator};

/// Score used when posture cannot be measured.
pub const NEUTRAL_SCORE: u8 = 70;
/// Vertical shoulder offset (normalized) above which shoulders count as uneven.
pub const SHOULDER_TOLERANCE: f32 = 0.05;
/// Points deducted per unit of shoulder offset.
pub const SHOULDER_PENALTY: f32 = 10.0;

/// Alignment score for one keypoint set, or `None` for a degenerate skeleton.
pub fn frame_score(pose: &Pose) -> Option<f32> {
    let nose = pose.get(KeypointIndex::Nose).position();
    let shoulder_alignment = (pose.get(KeypointIndex::LeftShoulder).y
        - pose.get(KeypointIndex::RightShoulder).y)
        .abs();
    let mid_shoulder = pose.midpoint(KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder);
    let mid_hip = pose.midpoint(KeypointIndex::LeftHip, KeypointIndex::RightHip);

    let upper = mid_shoulder - nose;
    let lower = mid_hip - mid_shoulder;
    let (upper_len, lower_len) = (upper.norm(), lower.norm());
    // also rejects NaN coordinates
    if !(upper_len > 0.0 && lower_len > 0.0) {
        return None;
    }

    let cosine = (upper.dot(&lower) / (upper_len * lower_len)).clamp(-1.0, 1.0);
    let mut score = 100.0 - cosine.acos().to_degrees();
    if shoulder_alignment > SHOULDER_TOLERANCE {
        score -= SHOULDER_PENALTY * shoulder_alignment;
    }
    Some(score.clamp(0.0, 100.0))
}

pub fn evaluation(score: u8) -> &'static str {
    match score {
        85.. => "Excellent posture. You maintained a straight back and well-aligned shoulders.",
        70..=84 => "Good posture overall. Minor inconsistencies in back straightness.",
        50..=69 => "Fair posture. Consider sitting/standing straighter with shoulders back.",
        _ => "Posture needs improvement. Try to keep your back straight and shoulders aligned.",
    }
}

/// Score spine and shoulder alignment over the sampled frames.
pub fn score_posture(frames: &[Frame], estimator: Option<&dyn PoseEstimator>) -> SignalScore {
    let estimator = match estimator {
        Some(estimator) if !frames.is_empty() => estimator,
        _ => {
            log::info!("Posture analysis skipped: no frames or no pose model");
            return SignalScore::new(NEUTRAL_SCORE, "Unable to analyze posture");
        }
    };

    let mut scores = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let pose = match estimator.estimate(frame) {
            Ok(Some(pose)) => pose,
            Ok(None) => {
                log::debug!("Frame {}: no pose", i);
                continue;
            }
            Err(e) => {
                log::warn!("Frame {}: pose estimation failed: {:#}", i, e);
                continue;
            }
        };
        match frame_score(&pose) {
            Some(score) => scores.push(score),
            None => log::debug!("Frame {}: degenerate skeleton, skipped", i),
        }
    }

    let details = ScoreDetails::Posture(PostureDetails {
        analyzed_frames: scores.len(),
        skipped_frames: frames.len() - scores.len(),
    });

    if scores.is_empty() {
        log::warn!("Posture analysis inconclusive: every frame skipped");
        return SignalScore::new(NEUTRAL_SCORE, "Posture analysis inconclusive").with_details(details);
    }

    let mean = scores.iter().sum::<f32>() / scores.len() as f32;
    let score = mean.round().clamp(0.0, 100.0) as u8;
    log::info!("Posture score {} over {} frames", score, scores.len());
    SignalScore::new(score, evaluation(score)).with_details(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::test_util::solid_frame;
    use crate::model::test_util::mock_capabilities;
    use crate::model::ModelCapabilities;
    use crate::pose::Keypoint;
    use anyhow::{bail, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pose(nose: (f32, f32), shoulders: [(f32, f32); 2], hips: [(f32, f32); 2]) -> Pose {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        let mut set = |index: KeypointIndex, (x, y): (f32, f32)| {
            keypoints[index as usize] = Keypoint::new(x, y, 0.9);
        };
        set(KeypointIndex::Nose, nose);
        set(KeypointIndex::LeftShoulder, shoulders[0]);
        set(KeypointIndex::RightShoulder, shoulders[1]);
        set(KeypointIndex::LeftHip, hips[0]);
        set(KeypointIndex::RightHip, hips[1]);
        Pose::new(keypoints)
    }

    fn upright() -> Pose {
        pose((0.5, 0.2), [(0.4, 0.4), (0.6, 0.4)], [(0.45, 0.8), (0.55, 0.8)])
    }

    /// Returns the scripted results in order; `None` entries fail.
    struct ScriptedEstimator {
        caps: ModelCapabilities,
        script: Vec<Option<Pose>>,
        calls: AtomicUsize,
    }

    impl ScriptedEstimator {
        fn new(script: Vec<Option<Pose>>) -> Self {
            Self { caps: mock_capabilities(192), script, calls: AtomicUsize::new(0) }
        }
    }

    impl PoseEstimator for ScriptedEstimator {
        fn capabilities(&self) -> &ModelCapabilities {
            &self.caps
        }

        fn estimate(&self, _frame: &Frame) -> Result<Option<Pose>> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.get(i).cloned().flatten() {
                Some(pose) => Ok(Some(pose)),
                None => bail!("inference failed"),
            }
        }
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n).map(|_| solid_frame(64, 48, [0.0, 0.0, 0.0])).collect()
    }

    #[test]
    fn test_upright_pose_scores_near_100() {
        let score = frame_score(&upright()).unwrap();
        assert!(score > 99.5, "score {}", score);
    }

    #[test]
    fn test_uneven_shoulders_penalized() {
        // 0.1 vertical offset, same midpoint
        let tilted = pose((0.5, 0.2), [(0.4, 0.35), (0.6, 0.45)], [(0.45, 0.8), (0.55, 0.8)]);
        let score = frame_score(&tilted).unwrap();
        assert!((score - 99.0).abs() < 0.1, "score {}", score);
    }

    #[test]
    fn test_small_shoulder_offset_not_penalized() {
        let level = pose((0.5, 0.2), [(0.4, 0.38), (0.6, 0.42)], [(0.45, 0.8), (0.55, 0.8)]);
        assert!(frame_score(&level).unwrap() > 99.5);
    }

    #[test]
    fn test_bent_spine() {
        // lower vector (0.4, 0.4) vs upper (0, 0.2): 45 degrees
        let bent = pose((0.5, 0.2), [(0.4, 0.4), (0.6, 0.4)], [(0.85, 0.8), (0.95, 0.8)]);
        let score = frame_score(&bent).unwrap();
        assert!((score - 55.0).abs() < 0.01, "score {}", score);
    }

    #[test]
    fn test_degenerate_skeleton_skipped() {
        let collapsed = pose((0.5, 0.4), [(0.4, 0.4), (0.6, 0.4)], [(0.45, 0.8), (0.55, 0.8)]);
        assert!(frame_score(&collapsed).is_none());
    }

    #[test]
    fn test_nan_keypoint_skipped() {
        let broken = pose((f32::NAN, 0.2), [(0.4, 0.4), (0.6, 0.4)], [(0.45, 0.8), (0.55, 0.8)]);
        assert!(frame_score(&broken).is_none());

        let estimator = ScriptedEstimator::new(vec![Some(broken), Some(upright())]);
        let result = score_posture(&frames(2), Some(&estimator));
        assert_eq!(result.score, 100);
        assert_eq!(
            result.details,
            Some(ScoreDetails::Posture(PostureDetails { analyzed_frames: 1, skipped_frames: 1 }))
        );
    }

    #[test]
    fn test_no_model_is_neutral() {
        let result = score_posture(&frames(3), None);
        assert_eq!(result.score, 70);
        assert_eq!(result.evaluation, "Unable to analyze posture");
    }

    #[test]
    fn test_no_frames_is_neutral() {
        let estimator = ScriptedEstimator::new(vec![]);
        let result = score_posture(&[], Some(&estimator));
        assert_eq!(result.score, 70);
        assert_eq!(estimator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_frames_skipped_not_zeroed() {
        let estimator = ScriptedEstimator::new(vec![Some(upright()), None, Some(upright())]);
        let result = score_posture(&frames(3), Some(&estimator));
        assert_eq!(result.score, 100);
        assert!(result.evaluation.starts_with("Excellent posture"));
        assert_eq!(
            result.details,
            Some(ScoreDetails::Posture(PostureDetails { analyzed_frames: 2, skipped_frames: 1 }))
        );
    }

    #[test]
    fn test_all_skipped_is_inconclusive() {
        let estimator = ScriptedEstimator::new(vec![None, None]);
        let result = score_posture(&frames(2), Some(&estimator));
        assert_eq!(result.score, 70);
        assert_eq!(result.evaluation, "Posture analysis inconclusive");
    }

    #[test]
    fn test_mean_is_rounded() {
        // lower vector (0.39, 0.4): about 44.27 degrees, frame score ~55.73
        let bent = pose((0.5, 0.2), [(0.4, 0.4), (0.6, 0.4)], [(0.84, 0.8), (0.94, 0.8)]);
        let score = frame_score(&bent).unwrap();
        assert!((score - 55.725).abs() < 0.01, "score {}", score);

        let estimator = ScriptedEstimator::new(vec![Some(bent.clone())]);
        assert_eq!(score_posture(&frames(1), Some(&estimator)).score, 56);

        // (~100 + 55.73) / 2 = ~77.86
        let estimator = ScriptedEstimator::new(vec![Some(upright()), Some(bent)]);
        let result = score_posture(&frames(2), Some(&estimator));
        assert_eq!(result.score, 78);
        assert!(result.evaluation.starts_with("Good posture"));
    }

    #[test]
    fn test_evaluation_tiers() {
        assert!(evaluation(85).starts_with("Excellent"));
        assert!(evaluation(70).starts_with("Good"));
        assert!(evaluation(50).starts_with("Fair"));
        assert!(evaluation(49).starts_with("Posture needs improvement"));
    }
}
