use crate::Result;
use image::{GrayImage, RgbImage};

/// Axis-aligned box in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Scales by `(sx, sy)` and clamps into a `width` x `height` image.
    pub fn scaled_and_clamped(&self, sx: f32, sy: f32, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: (self.x1 * sx).clamp(0.0, w),
            y1: (self.y1 * sy).clamp(0.0, h),
            x2: (self.x2 * sx).clamp(0.0, w),
            y2: (self.y2 * sy).clamp(0.0, h),
        }
    }
}

/// One detected object.
#[derive(Debug, Clone)]
pub struct Instance {
    pub class_id: usize,
    /// Confidence in `[0, 1]`.
    pub score: f32,
    pub bbox: BoundingBox,
    /// Binary mask at the source image's resolution; 255 marks the instance.
    pub mask: Option<GrayImage>,
}

impl Instance {
    pub fn new(class_id: usize, score: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            score,
            bbox,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: GrayImage) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Instance-segmentation runtime shared by every request handler.
///
/// Implementations must only report instances within the configured class
/// set that pass the configured confidence threshold, and must not mutate
/// the input image.
pub trait SegmentationModel: Send + Sync {
    fn infer(&self, image: &RgbImage) -> Result<Vec<Instance>>;

    fn class_name(&self, class_id: usize) -> String {
        class_id.to_string()
    }
}
