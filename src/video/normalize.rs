use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempPath;

use crate::config::NormalizerConfig;

/// Copies a container without re-encoding, rewriting its timestamps and index.
pub trait Remuxer: Send + Sync {
    fn remux(&self, input: &Path, output: &Path) -> Result<()>;
}

/// `ffmpeg -c copy` with regenerated PTS.
pub struct FfmpegRemuxer {
    ffmpeg_path: String,
}

impl FfmpegRemuxer {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl Remuxer for FfmpegRemuxer {
    fn remux(&self, input: &Path, output: &Path) -> Result<()> {
        let result = Command::new(&self.ffmpeg_path)
            .arg("-v")
            .arg("warning")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-c", "copy"])
            .args(["-fflags", "+genpts"])
            .args(["-avoid_negative_ts", "make_zero"])
            .args(["-max_interleave_delta", "0"])
            .arg(output)
            .output()
            .with_context(|| format!("Failed to run {}", self.ffmpeg_path))?;

        if !result.status.success() {
            bail!(
                "ffmpeg exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }
        Ok(())
    }
}

/// Video path to decode: the upload itself, or a repaired temporary copy.
///
/// The repaired copy is deleted when this value is dropped.
#[derive(Debug)]
pub enum NormalizedVideo {
    Original(PathBuf),
    Repaired(RepairedCopy),
}

impl NormalizedVideo {
    pub fn path(&self) -> &Path {
        match self {
            NormalizedVideo::Original(path) => path.as_path(),
            NormalizedVideo::Repaired(copy) => copy.path(),
        }
    }

    pub fn is_repaired(&self) -> bool {
        matches!(self, NormalizedVideo::Repaired(_))
    }
}

/// Temporary re-muxed container, removed on drop.
#[derive(Debug)]
pub struct RepairedCopy {
    path: Option<TempPath>,
}

impl RepairedCopy {
    fn new(path: TempPath) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> &Path {
        match &self.path {
            Some(path) => &**path,
            None => Path::new(""),
        }
    }
}

impl Drop for RepairedCopy {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let display = path.display().to_string();
            match path.close() {
                Ok(()) => log::info!("Removed temporary repaired video {}", display),
                Err(e) => log::warn!("Failed to remove temporary file {}: {}", display, e),
            }
        }
    }
}

/// Containers whose timestamps/index are commonly broken by browser recorders.
pub fn needs_repair(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("webm"))
        .unwrap_or(false)
}

pub struct ContainerNormalizer {
    remuxer: Box<dyn Remuxer>,
    min_output_bytes: u64,
    enabled: bool,
}

impl ContainerNormalizer {
    pub fn new(remuxer: Box<dyn Remuxer>, min_output_bytes: u64) -> Self {
        Self {
            remuxer,
            min_output_bytes,
            enabled: true,
        }
    }

    pub fn from_config(config: &NormalizerConfig) -> Self {
        Self {
            remuxer: Box::new(FfmpegRemuxer::new(config.ffmpeg_path.clone())),
            min_output_bytes: config.min_output_bytes,
            enabled: config.enabled,
        }
    }

    /// Best effort: any failure yields the original path.
    pub fn normalize(&self, path: &Path) -> NormalizedVideo {
        if !self.enabled || !needs_repair(path) {
            log::debug!("{} needs no container repair", path.display());
            return NormalizedVideo::Original(path.to_path_buf());
        }

        match self.repair(path) {
            Ok(copy) => {
                log::info!("Repaired WebM container: {}", copy.path().display());
                NormalizedVideo::Repaired(copy)
            }
            Err(e) => {
                log::warn!("Container repair failed, using original: {:#}", e);
                NormalizedVideo::Original(path.to_path_buf())
            }
        }
    }

    fn repair(&self, path: &Path) -> Result<RepairedCopy> {
        let temp = tempfile::Builder::new()
            .prefix("bodylang-repair-")
            .suffix(".webm")
            .tempfile()
            .context("Failed to create temporary file")?;
        // dropping `copy` on any early return below removes the file
        let copy = RepairedCopy::new(temp.into_temp_path());

        log::info!("Attempting to repair WebM container {}", path.display());
        self.remuxer.remux(path, copy.path())?;

        let size = fs::metadata(copy.path()).map(|m| m.len()).unwrap_or(0);
        if size <= self.min_output_bytes {
            bail!(
                "repaired output too small ({} bytes, need more than {})",
                size,
                self.min_output_bytes
            );
        }
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Writes `bytes` bytes to the output instead of running ffmpeg.
    struct FakeRemuxer {
        bytes: usize,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Remuxer for FakeRemuxer {
        fn remux(&self, _input: &Path, output: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("remux failed");
            }
            fs::write(output, vec![0u8; self.bytes])?;
            Ok(())
        }
    }

    fn normalizer(bytes: usize, fail: bool) -> (ContainerNormalizer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let remuxer = FakeRemuxer { bytes, fail, calls: calls.clone() };
        (ContainerNormalizer::new(Box::new(remuxer), 1000), calls)
    }

    #[test]
    fn test_needs_repair() {
        assert!(needs_repair(Path::new("upload.webm")));
        assert!(needs_repair(Path::new("/tmp/UPLOAD.WEBM")));
        assert!(!needs_repair(Path::new("upload.mp4")));
        assert!(!needs_repair(Path::new("webm")));
    }

    #[test]
    fn test_non_webm_passthrough() {
        let (normalizer, calls) = normalizer(5000, false);
        let path = Path::new("/data/uploads/clip.mp4");
        let video = normalizer.normalize(path);
        assert!(!video.is_repaired());
        assert_eq!(video.path(), path);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_repaired_copy_used_and_removed_on_drop() {
        let (normalizer, calls) = normalizer(5000, false);
        let video = normalizer.normalize(Path::new("clip.webm"));
        assert!(video.is_repaired());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let repaired = video.path().to_path_buf();
        assert!(repaired.exists());
        drop(video);
        assert!(!repaired.exists());
    }

    #[test]
    fn test_too_small_output_falls_back() {
        let (normalizer, _) = normalizer(1000, false);
        let path = Path::new("clip.webm");
        let video = normalizer.normalize(path);
        assert!(!video.is_repaired());
        assert_eq!(video.path(), path);
    }

    #[test]
    fn test_remux_failure_falls_back() {
        let (normalizer, _) = normalizer(5000, true);
        let video = normalizer.normalize(Path::new("clip.webm"));
        assert!(!video.is_repaired());
    }

    #[test]
    fn test_disabled_skips_repair() {
        let config = NormalizerConfig {
            enabled: false,
            ..NormalizerConfig::default()
        };
        let normalizer = ContainerNormalizer::from_config(&config);
        let video = normalizer.normalize(Path::new("clip.webm"));
        assert!(!video.is_repaired());
    }

    #[test]
    fn test_missing_ffmpeg_falls_back() {
        let remuxer = FfmpegRemuxer::new("/nonexistent/ffmpeg-binary");
        let normalizer = ContainerNormalizer::new(Box::new(remuxer), 1000);
        let video = normalizer.normalize(Path::new("clip.webm"));
        assert!(!video.is_repaired());
    }
}
