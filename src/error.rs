use std::path::PathBuf;

use thiserror::Error;

/// Input defects that make a clip unusable as a whole.
///
/// These never reach the caller of [`crate::Analyzer::analyze`]; they are
/// logged and converted into the fixed default result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("video file not found: {0}")]
    MissingFile(PathBuf),

    #[error("could not open video {path}: {source}")]
    Unopenable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("no decodable frames in {0}")]
    NoFrames(PathBuf),
}
