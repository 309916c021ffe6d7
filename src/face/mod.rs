pub mod detection;
pub mod detector;

pub use detection::Detection;
pub use detector::{BlazeFaceDetector, FaceDetector};
