//! Per-signal scorers and the final confidence aggregation.
//!
//! Every scorer turns a slice of sampled frames into exactly one
//! [`SignalScore`], degrading to a neutral score instead of failing.

pub mod confidence;
pub mod eye_contact;
pub mod movement;
pub mod posture;
pub mod skin;

use serde::{Deserialize, Serialize};

pub use confidence::aggregate;
pub use eye_contact::{EyeContactScorer, EyeContactStrategy};
pub use movement::score_movement;
pub use posture::score_posture;

/// One behavioural signal, scored 0-100 with a human-readable verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalScore {
    pub score: u8,
    pub evaluation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ScoreDetails>,
}

impl SignalScore {
    pub fn new(score: u8, evaluation: impl Into<String>) -> Self {
        Self {
            score: score.min(100),
            evaluation: evaluation.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: ScoreDetails) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreDetails {
    Posture(PostureDetails),
    EyeContact(EyeContactDetails),
    Movement(MovementDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureDetails {
    pub analyzed_frames: usize,
    pub skipped_frames: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeContactDetails {
    pub good_frames: usize,
    pub total_frames: usize,
    pub average_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementDetails {
    pub movement_level: String,
    pub avg_magnitude: f32,
    pub variance: f32,
    pub avg_area_percent: f32,
}

/// Full assessment returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub posture: SignalScore,
    pub eye_contact: SignalScore,
    pub movement: SignalScore,
    pub confidence_score: u8,
}

impl AggregateResult {
    /// Result used when the video cannot be analyzed at all.
    pub fn fallback() -> Self {
        Self {
            posture: SignalScore::new(
                75,
                "Posture appears good. Maintain a straight back for optimal presentation.",
            ),
            eye_contact: SignalScore::new(
                75,
                "Eye contact appears appropriate. Continue to look directly at the camera.",
            ),
            movement: SignalScore::new(
                80,
                "Movement level appears normal. Maintain a balanced level of natural gestures.",
            ),
            confidence_score: 77,
        }
    }
}

/// Truncate toward zero and clamp into a score.
pub(crate) fn to_score(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_values() {
        let result = AggregateResult::fallback();
        assert_eq!(result.posture.score, 75);
        assert_eq!(result.eye_contact.score, 75);
        assert_eq!(result.movement.score, 80);
        assert_eq!(result.confidence_score, 77);
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(AggregateResult::fallback()).unwrap();
        let object = json.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, ["confidence_score", "eye_contact", "movement", "posture"]);
        // no details key when absent
        assert!(json["posture"].get("details").is_none());
        assert_eq!(json["movement"]["score"], 80);
    }

    #[test]
    fn test_details_serialized_inline() {
        let score = SignalScore::new(90, "ok").with_details(ScoreDetails::EyeContact(
            EyeContactDetails {
                good_frames: 3,
                total_frames: 4,
                average_score: 71.5,
            },
        ));
        let json = serde_json::to_value(&score).unwrap();
        assert_eq!(json["details"]["good_frames"], 3);
        assert_eq!(json["details"]["total_frames"], 4);
    }

    #[test]
    fn test_to_score() {
        assert_eq!(to_score(99.9), 99);
        assert_eq!(to_score(-3.0), 0);
        assert_eq!(to_score(150.0), 100);
        assert_eq!(to_score(f32::NAN), 0);
    }
}
