/// Face box in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub confidence: f32,
}

impl Detection {
    /// Build from a centre/size box, clipping every edge to [0, 1].
    pub fn from_center_size(cx: f32, cy: f32, w: f32, h: f32, confidence: f32) -> Self {
        let clip = |v: f32| v.clamp(0.0, 1.0);
        Self {
            xmin: clip(cx - w / 2.0),
            ymin: clip(cy - h / 2.0),
            xmax: clip(cx + w / 2.0),
            ymax: clip(cy + h / 2.0),
            confidence,
        }
    }

    /// Box centre, normalized
    pub fn center(&self) -> (f32, f32) {
        ((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }

    /// Box centre in pixels of a `width`x`height` frame
    pub fn center_in(&self, width: u32, height: u32) -> (f32, f32) {
        let (cx, cy) = self.center();
        (cx * width as f32, cy * height as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_center_size_clips() {
        let det = Detection::from_center_size(0.9, 0.5, 0.4, 0.2, 0.8);
        assert!((det.xmin - 0.7).abs() < 1e-6);
        assert_eq!(det.xmax, 1.0);
        assert!((det.ymin - 0.4).abs() < 1e-6);
        assert!((det.ymax - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_center_in_pixels() {
        let det = Detection::from_center_size(0.5, 0.5, 0.2, 0.2, 0.9);
        let (x, y) = det.center_in(640, 480);
        assert!((x - 320.0).abs() < 1e-3);
        assert!((y - 240.0).abs() < 1e-3);
    }
}
