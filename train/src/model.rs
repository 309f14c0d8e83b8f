//! The contracts of the trained detector.

use crate::{common::*, pipeline::MiniBatch};

/// A detection: box, class and confidence in pixel units of the input image.
pub type Detection = LabeledBox;

/// A trainable detector together with its optimizer.
pub trait DetectorTrainer {
    type Inference: Detector;

    /// Run one optimization step and return the loss.
    fn train_step(&mut self, batch: &MiniBatch) -> Result<f64>;

    /// Compute the loss without updating parameters.
    fn test_step(&mut self, batch: &MiniBatch) -> Result<f64>;

    fn set_learning_rate(&mut self, lr: f64);

    fn learning_rate(&self) -> f64;

    /// Copy the current parameters into a read-only detector.
    fn snapshot_for_inference(&self) -> Result<Self::Inference>;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;
}

/// A read-only detector.
pub trait Detector
where
    Self: Send + Sync,
{
    /// Detect objects above the confidence threshold.
    fn detect(&self, image: &RgbImage, confidence_threshold: f64) -> Vec<Detection>;
}
