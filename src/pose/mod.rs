pub mod estimator;
pub mod keypoint;
pub mod preprocess;

pub use estimator::{MoveNetPoseEstimator, PoseEstimator};
pub use keypoint::{Keypoint, KeypointIndex, Pose};
pub use preprocess::{letterbox, unletterbox_pose, LetterboxInfo};
