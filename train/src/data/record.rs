use crate::common::*;

/// The record with image path and boxes, but without image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Bounding boxes in pixel units of the source image.
    pub boxes: Vec<LabeledBox>,
}

/// The record with image pixels and boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: RgbImage,
    pub boxes: Vec<LabeledBox>,
}

impl Sample {
    /// A black square image without boxes. Substituted for images that fail
    /// to load.
    pub fn blank(size: u32) -> Self {
        Self {
            image: RgbImage::new(size, size),
            boxes: vec![],
        }
    }

    pub fn size(&self) -> HW<f64> {
        HW::from_dims(self.image.width(), self.image.height())
    }
}
