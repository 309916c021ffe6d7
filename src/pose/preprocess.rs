use anyhow::Result;
use opencv::{
    core::{self, Mat, Scalar, Size},
    imgproc,
    prelude::*,
};

use super::keypoint::{Keypoint, KeypointIndex, Pose};

/// Where the original frame sits inside the padded square input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    /// Padding on the left / top in normalized input coordinates
    pub pad_x: f32,
    pub pad_y: f32,
    /// Fraction of the input width / height covered by the frame
    pub scale_x: f32,
    pub scale_y: f32,
}

impl LetterboxInfo {
    /// Letterbox geometry for fitting `width`x`height` into a `size`x`size` square.
    pub fn for_frame(width: i32, height: i32, size: i32) -> (Self, i32, i32) {
        let longest = width.max(height).max(1) as f32;
        let new_w = ((width as f32 * size as f32 / longest).round() as i32).clamp(1, size);
        let new_h = ((height as f32 * size as f32 / longest).round() as i32).clamp(1, size);
        let left = (size - new_w) / 2;
        let top = (size - new_h) / 2;

        let info = Self {
            pad_x: left as f32 / size as f32,
            pad_y: top as f32 / size as f32,
            scale_x: new_w as f32 / size as f32,
            scale_y: new_h as f32 / size as f32,
        };
        (info, new_w, new_h)
    }
}

/// Resize keeping aspect ratio and pad with black to a `size`x`size` square.
pub fn letterbox(rgb: &Mat, size: i32) -> Result<(Mat, LetterboxInfo)> {
    let (info, new_w, new_h) = LetterboxInfo::for_frame(rgb.cols(), rgb.rows(), size);

    let mut resized = Mat::default();
    imgproc::resize(
        rgb,
        &mut resized,
        Size::new(new_w, new_h),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let left = (size - new_w) / 2;
    let top = (size - new_h) / 2;
    let mut padded = Mat::default();
    core::copy_make_border(
        &resized,
        &mut padded,
        top,
        size - new_h - top,
        left,
        size - new_w - left,
        core::BORDER_CONSTANT,
        Scalar::all(0.0),
    )?;

    Ok((padded, info))
}

/// Plain resize to the model's input size (no aspect preservation).
pub fn resize_exact(rgb: &Mat, width: i32, height: i32) -> Result<Mat> {
    let mut resized = Mat::default();
    imgproc::resize(
        rgb,
        &mut resized,
        Size::new(width, height),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;
    Ok(resized)
}

/// Map keypoints from padded-input coordinates back to original frame coordinates
pub fn unletterbox_pose(pose: &Pose, info: &LetterboxInfo) -> Pose {
    let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
    for (out, kp) in keypoints.iter_mut().zip(pose.keypoints.iter()) {
        *out = Keypoint {
            x: (kp.x - info.pad_x) / info.scale_x,
            y: (kp.y - info.pad_y) / info.scale_y,
            confidence: kp.confidence,
        };
    }
    Pose::new(keypoints)
}
