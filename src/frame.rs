use anyhow::{bail, Result};
use opencv::{core::Mat, imgproc, prelude::*};

/// Decoded video frame, always 8-bit 3-channel RGB.
#[derive(Debug)]
pub struct Frame {
    mat: Mat,
}

impl Frame {
    /// Convert a BGR frame as delivered by `VideoCapture`.
    pub fn from_bgr(bgr: &Mat) -> Result<Self> {
        if bgr.empty() {
            bail!("Empty frame");
        }
        let mut rgb = Mat::default();
        imgproc::cvt_color_def(bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;
        Ok(Self { mat: rgb })
    }

    /// Wrap a Mat that is already RGB.
    pub fn from_rgb(rgb: Mat) -> Result<Self> {
        if rgb.empty() || rgb.channels() != 3 {
            bail!("Expected a non-empty 3-channel image");
        }
        Ok(Self { mat: rgb })
    }

    pub fn mat(&self) -> &Mat {
        &self.mat
    }

    pub fn width(&self) -> u32 {
        self.mat.cols() as u32
    }

    pub fn height(&self) -> u32 {
        self.mat.rows() as u32
    }

    /// Integer pixel centre; odd dimensions round down.
    pub fn center(&self) -> (f32, f32) {
        ((self.width() / 2) as f32, (self.height() / 2) as f32)
    }

    pub fn diagonal(&self) -> f32 {
        let w = self.width() as f32;
        let h = self.height() as f32;
        (w * w + h * h).sqrt()
    }

    /// Distance of a pixel position from the frame centre, divided by the frame diagonal.
    pub fn normalized_center_distance(&self, x: f32, y: f32) -> f32 {
        let diagonal = self.diagonal();
        if diagonal <= 0.0 {
            return 0.0;
        }
        let (cx, cy) = self.center();
        ((x - cx).powi(2) + (y - cy).powi(2)).sqrt() / diagonal
    }
}
