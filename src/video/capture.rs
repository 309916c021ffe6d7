use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::Path;

/// Container metadata as reported by the decoder. Any field may be garbage for broken files.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub frame_count: i64,
    pub fps: f64,
    pub width: i32,
    pub height: i32,
}

impl VideoMetadata {
    /// All four values are usable for index-based seeking.
    pub fn is_valid(&self) -> bool {
        self.frame_count > 0 && self.fps > 0.0 && self.width > 0 && self.height > 0
    }
}

/// Random-access frame source (BGR frames).
pub trait VideoSource {
    fn metadata(&self) -> VideoMetadata;

    /// Position the decoder so the next `read_frame` returns frame `index`.
    fn seek(&mut self, index: i64) -> Result<()>;

    /// Next decoded frame, `None` at end of stream or on decode failure.
    fn read_frame(&mut self) -> Result<Option<Mat>>;
}

/// Video file decoded through OpenCV's `VideoCapture`.
pub struct OpenCvVideo {
    capture: VideoCapture,
    metadata: VideoMetadata,
}

impl OpenCvVideo {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .to_str()
            .with_context(|| format!("Non UTF-8 video path: {}", path.display()))?;

        let capture = VideoCapture::from_file(filename, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open video {}", path.display()))?;

        if !capture.is_opened()? {
            anyhow::bail!("Video {} could not be opened", path.display());
        }

        let metadata = VideoMetadata {
            frame_count: capture.get(videoio::CAP_PROP_FRAME_COUNT)? as i64,
            fps: capture.get(videoio::CAP_PROP_FPS)?,
            width: capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32,
            height: capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32,
        };

        log::info!(
            "Video properties: {}x{}, {} fps, reported frame_count: {}",
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.frame_count
        );

        Ok(Self { capture, metadata })
    }

    pub fn backend_name(&self) -> String {
        self.capture.get_backend_name().unwrap_or_default()
    }
}

impl VideoSource for OpenCvVideo {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn seek(&mut self, index: i64) -> Result<()> {
        self.capture
            .set(videoio::CAP_PROP_POS_FRAMES, index as f64)
            .with_context(|| format!("Failed to seek to frame {}", index))?;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        let ok = self
            .capture
            .read(&mut frame)
            .context("Failed to read frame")?;

        if !ok || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}
