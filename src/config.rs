use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub models: ModelConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    /// Upper bound on frames handed to the scorers
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NormalizerConfig {
    /// Re-mux WebM uploads before decoding
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// ffmpeg executable (looked up on PATH when bare)
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Repaired output at or below this size is discarded
    #[serde(default = "default_min_output_bytes")]
    pub min_output_bytes: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// MoveNet single-pose ONNX model. Posture falls back to its neutral score when unset.
    #[serde(default)]
    pub pose_model: Option<PathBuf>,
    /// BlazeFace short-range ONNX model. Eye contact uses the skin heuristic when unset.
    #[serde(default)]
    pub face_model: Option<PathBuf>,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_max_frames() -> usize { 30 }
fn default_true() -> bool { true }
fn default_ffmpeg_path() -> String { "ffmpeg".to_string() }
fn default_min_output_bytes() -> u64 { 1000 }
fn default_intra_threads() -> usize { 4 }

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_frames: default_max_frames(),
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ffmpeg_path: default_ffmpeg_path(),
            min_output_bytes: default_min_output_bytes(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            pose_model: None,
            face_model: None,
            intra_threads: default_intra_threads(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Missing file means defaults; a malformed file is reported and also falls back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{:#}; using default configuration", e);
                Self::default()
            }
        }
    }
}
