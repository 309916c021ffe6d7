//! Colour-based face localisation used when no face model result is available.

use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Size, Vector},
    imgproc,
    prelude::*,
};

/// Skin region ignored below this fraction of the frame area.
pub const MIN_AREA_FRACTION: f64 = 0.01;

// [lower, upper] per colour space, 8-bit OpenCV ranges (H is 0-180)
const HSV_SKIN: [([f64; 3], [f64; 3]); 2] = [
    ([0.0, 20.0, 70.0], [20.0, 255.0, 255.0]),
    ([0.0, 10.0, 60.0], [25.0, 255.0, 255.0]),
];
const YCRCB_SKIN: ([f64; 3], [f64; 3]) = ([0.0, 135.0, 85.0], [255.0, 180.0, 135.0]);

const KERNEL_SIZE: i32 = 5;
const DILATE_ITERATIONS: i32 = 2;

/// Connected skin-coloured area.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinRegion {
    pub area: f64,
    pub bounds: Rect,
    /// Centroid from image moments, `None` for zero-mass contours.
    pub centroid: Option<(f32, f32)>,
}

impl SkinRegion {
    pub fn aspect_ratio(&self) -> f32 {
        if self.bounds.height > 0 {
            self.bounds.width as f32 / self.bounds.height as f32
        } else {
            0.0
        }
    }

    /// Integer centre of the bounding box.
    pub fn bounds_center(&self) -> (f32, f32) {
        (
            (self.bounds.x + self.bounds.width / 2) as f32,
            (self.bounds.y + self.bounds.height / 2) as f32,
        )
    }
}

fn scalar(v: [f64; 3]) -> Scalar {
    Scalar::new(v[0], v[1], v[2], 0.0)
}

/// Binary mask (255 = skin) of an RGB image, eroded once and dilated twice.
pub fn skin_mask(rgb: &Mat) -> Result<Mat> {
    let mut hsv = Mat::default();
    imgproc::cvt_color_def(rgb, &mut hsv, imgproc::COLOR_RGB2HSV)?;
    let mut ycrcb = Mat::default();
    imgproc::cvt_color_def(rgb, &mut ycrcb, imgproc::COLOR_RGB2YCrCb)?;

    let mut combined = Mat::default();
    core::in_range(&ycrcb, &scalar(YCRCB_SKIN.0), &scalar(YCRCB_SKIN.1), &mut combined)?;
    for (lower, upper) in HSV_SKIN {
        let mut mask = Mat::default();
        core::in_range(&hsv, &scalar(lower), &scalar(upper), &mut mask)?;
        let mut merged = Mat::default();
        core::bitwise_or_def(&combined, &mask, &mut merged)?;
        combined = merged;
    }

    let kernel = imgproc::get_structuring_element_def(
        imgproc::MORPH_ELLIPSE,
        Size::new(KERNEL_SIZE, KERNEL_SIZE),
    )?;
    let anchor = Point::new(-1, -1);
    let border_value = imgproc::morphology_default_border_value()?;

    let mut eroded = Mat::default();
    imgproc::erode(&combined, &mut eroded, &kernel, anchor, 1, core::BORDER_CONSTANT, border_value)?;
    let mut dilated = Mat::default();
    imgproc::dilate(
        &eroded,
        &mut dilated,
        &kernel,
        anchor,
        DILATE_ITERATIONS,
        core::BORDER_CONSTANT,
        border_value,
    )?;
    Ok(dilated)
}

/// External skin contours of an RGB image, largest first.
pub fn find_skin_regions(rgb: &Mat) -> Result<Vec<SkinRegion>> {
    let mask = skin_mask(rgb)?;

    let mut contours: Vector<Vector<Point>> = Vector::new();
    imgproc::find_contours_def(
        &mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
    )?;

    let mut regions = Vec::with_capacity(contours.len());
    for contour in contours.iter() {
        let area = imgproc::contour_area_def(&contour)?;
        let bounds = imgproc::bounding_rect(&contour)?;
        let m = imgproc::moments_def(&contour)?;
        let centroid = if m.m00 != 0.0 {
            Some(((m.m10 / m.m00).trunc() as f32, (m.m01 / m.m00).trunc() as f32))
        } else {
            None
        };
        regions.push(SkinRegion { area, bounds, centroid });
    }

    regions.sort_by(|a, b| b.area.total_cmp(&a.area));
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::test_util::{frame_with_rect, solid_frame};

    const SKIN: [f64; 3] = [220.0, 170.0, 140.0];

    #[test]
    fn test_black_frame_has_no_skin() {
        let frame = solid_frame(320, 240, [0.0, 0.0, 0.0]);
        let mask = skin_mask(frame.mat()).unwrap();
        assert_eq!(core::count_non_zero(&mask).unwrap(), 0);
        assert!(find_skin_regions(frame.mat()).unwrap().is_empty());
    }

    #[test]
    fn test_skin_rectangle_found() {
        let frame = frame_with_rect(640, 480, Rect::new(240, 160, 160, 160), SKIN);
        let regions = find_skin_regions(frame.mat()).unwrap();
        assert_eq!(regions.len(), 1);

        let region = &regions[0];
        assert!(region.area > 160.0 * 160.0 * 0.9);
        assert!((region.aspect_ratio() - 1.0).abs() < 0.1);
        let (cx, cy) = region.centroid.unwrap();
        assert!((cx - 320.0).abs() <= 2.0);
        assert!((cy - 240.0).abs() <= 2.0);
    }

    #[test]
    fn test_regions_sorted_by_area() {
        let base = frame_with_rect(640, 480, Rect::new(20, 20, 60, 60), SKIN);
        let mut mat = base.mat().try_clone().unwrap();
        imgproc::rectangle(
            &mut mat,
            Rect::new(300, 200, 200, 150),
            scalar(SKIN),
            -1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        let frame = crate::frame::Frame::from_rgb(mat).unwrap();

        let regions = find_skin_regions(frame.mat()).unwrap();
        assert_eq!(regions.len(), 2);
        assert!(regions[0].area > regions[1].area);
        assert!(regions[0].bounds.x >= 290);
    }

    #[test]
    fn test_bounds_center_is_integer() {
        let region = SkinRegion {
            area: 10.0,
            bounds: Rect::new(10, 10, 5, 5),
            centroid: None,
        };
        assert_eq!(region.bounds_center(), (12.0, 12.0));
        assert_eq!(region.aspect_ratio(), 1.0);
    }
}
