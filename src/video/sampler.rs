use super::capture::{VideoMetadata, VideoSource};
use crate::frame::Frame;

/// FPS assumed when the container reports none, used only to bound sequential reads.
pub const ASSUMED_FPS: f64 = 25.0;
/// Seconds of assumed playback the sequential fallback may read through.
pub const SEQUENTIAL_READ_SECONDS: f64 = 15.0;
/// Read attempts per requested frame in sequential fallback.
pub const SEQUENTIAL_READS_PER_FRAME: usize = 5;

/// `count` frame indices evenly spaced over `0..=frame_count-1`.
///
/// Indices are truncated toward zero, so the first is always 0 and the last is
/// always `frame_count - 1`.
pub fn even_indices(frame_count: i64, count: usize) -> Vec<i64> {
    if frame_count <= 0 || count == 0 {
        return Vec::new();
    }
    let count = count.min(frame_count as usize);
    if count == 1 {
        return vec![0];
    }
    // widened so an absurd container frame count cannot overflow
    let last = (frame_count - 1) as i128;
    let intervals = (count - 1) as i128;
    (0..count as i128).map(|i| (i * last / intervals) as i64).collect()
}

/// Read-attempt budget and keep-every-k step for the sequential fallback.
pub fn sequential_plan(metadata: &VideoMetadata, max_frames: usize) -> (usize, usize) {
    let assumed_fps = if metadata.fps > 0.0 { metadata.fps } else { ASSUMED_FPS };
    let by_time = (assumed_fps * SEQUENTIAL_READ_SECONDS) as usize;
    let max_reads = (max_frames * SEQUENTIAL_READS_PER_FRAME).min(by_time);
    let step = if max_frames > 0 { (max_reads / max_frames).max(1) } else { 1 };
    (max_reads, step)
}

/// Sample up to `max_frames` RGB frames from `source`.
///
/// Never fails: an empty result means the clip is unusable.
pub fn sample<S: VideoSource + ?Sized>(source: &mut S, max_frames: usize) -> Vec<Frame> {
    if max_frames == 0 {
        return Vec::new();
    }

    let metadata = source.metadata();
    let frames = if metadata.is_valid() {
        sample_evenly(source, &metadata, max_frames)
    } else {
        log::warn!(
            "Invalid video metadata: frame_count={}, fps={}, dimensions={}x{}. Using sequential extraction.",
            metadata.frame_count,
            metadata.fps,
            metadata.width,
            metadata.height
        );
        sample_sequentially(source, &metadata, max_frames)
    };

    if frames.is_empty() {
        log::error!("Frame extraction retrieved no usable frames");
    }
    frames
}

fn sample_evenly<S: VideoSource + ?Sized>(
    source: &mut S,
    metadata: &VideoMetadata,
    max_frames: usize,
) -> Vec<Frame> {
    let indices = even_indices(metadata.frame_count, max_frames);
    let mut frames = Vec::with_capacity(indices.len());

    for index in indices {
        if let Err(e) = source.seek(index) {
            log::warn!("Seek to frame {} failed: {:#}", index, e);
            continue;
        }
        match source.read_frame() {
            Ok(Some(bgr)) => match Frame::from_bgr(&bgr) {
                Ok(frame) => frames.push(frame),
                Err(e) => log::warn!("Frame {} conversion failed: {:#}", index, e),
            },
            Ok(None) => log::warn!("Failed to read frame at index {}", index),
            Err(e) => log::warn!("Failed to read frame at index {}: {:#}", index, e),
        }
    }

    log::info!("Extracted {} frames at evenly spaced indices", frames.len());
    frames
}

fn sample_sequentially<S: VideoSource + ?Sized>(
    source: &mut S,
    metadata: &VideoMetadata,
    max_frames: usize,
) -> Vec<Frame> {
    let (max_reads, step) = sequential_plan(metadata, max_frames);
    let mut frames = Vec::new();
    let mut reads = 0usize;

    while frames.len() < max_frames && reads < max_reads {
        let bgr = match source.read_frame() {
            Ok(Some(bgr)) => bgr,
            Ok(None) => {
                log::warn!("Sequential read stopped at frame {}", reads);
                break;
            }
            Err(e) => {
                log::warn!("Sequential read failed at frame {}: {:#}", reads, e);
                break;
            }
        };

        if reads % step == 0 {
            match Frame::from_bgr(&bgr) {
                Ok(frame) => frames.push(frame),
                Err(e) => log::warn!("Frame {} conversion failed: {:#}", reads, e),
            }
        }
        reads += 1;
    }

    log::info!(
        "Sequentially extracted {} frames after {} read attempts",
        frames.len(),
        reads
    );
    frames
}
