//! Class-labeled bounding boxes.

use bbox::{Affine, Projective, Rect, Transform, TLBR};
use num_traits::Float;
use std::ops::Mul;

/// A rectangle with its class, detection confidence and ignore flag.
///
/// Ground truth carries confidence 1. Ignored boxes are still handed to the
/// loss for masking but never count as positives when scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Label<R, C>
where
    R: Rect,
{
    pub rect: R,
    pub class: C,
    pub confidence: f64,
    pub ignore: bool,
}

impl<R, C> Label<R, C>
where
    R: Rect,
{
    pub fn ground_truth(rect: R, class: C) -> Self {
        Self {
            rect,
            class,
            confidence: 1.0,
            ignore: false,
        }
    }

    pub fn with_rect<S>(&self, rect: S) -> Label<S, C>
    where
        S: Rect,
        C: Clone,
    {
        Label {
            rect,
            class: self.class.clone(),
            confidence: self.confidence,
            ignore: self.ignore,
        }
    }
}

impl<C> Label<TLBR<f64>, C>
where
    C: Clone,
{
    /// Map through an affine transform, keeping the axis-aligned bound of the
    /// four corners.
    pub fn affine(&self, affine: &Affine) -> Self {
        self.with_rect(self.rect.map_corners(|point| affine.map_point(point)))
    }

    /// Map through a homography. Corners sent to infinity leave the box
    /// unchanged.
    pub fn projective(&self, projective: &Projective) -> Self {
        let corners: Option<Vec<_>> = self
            .rect
            .corners()
            .into_iter()
            .map(|point| projective.map_point(point))
            .collect();

        match corners.and_then(TLBR::bounding) {
            Some(rect) => self.with_rect(rect),
            None => self.clone(),
        }
    }
}

impl<'a, T, C> Mul<&'a Label<TLBR<T>, C>> for &'a Transform<T>
where
    T: Float,
    C: Clone,
{
    type Output = Label<TLBR<T>, C>;

    fn mul(self, rhs: &'a Label<TLBR<T>, C>) -> Self::Output {
        rhs.with_rect(self * &rhs.rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbox::RectNum;

    #[test]
    fn transform_keeps_class_and_flags() {
        let mut label = Label::ground_truth(TLBR::from_tlbr([0.0, 0.0, 2.0, 4.0]), "dog");
        label.ignore = true;

        let scaled = &Transform::from_sizes_exact(
            bbox::HW::from_hw([2.0, 4.0]),
            bbox::HW::from_hw([4.0, 8.0]),
        ) * &label;
        assert_eq!(scaled.rect.tlbr(), [0.0, 0.0, 4.0, 8.0]);
        assert_eq!(scaled.class, "dog");
        assert!(scaled.ignore);
        assert_eq!(scaled.confidence, 1.0);
    }

    #[test]
    fn affine_bounds_rotated_corners() {
        let label = Label::ground_truth(TLBR::from_tlbr([0.0, 0.0, 2.0, 2.0]), 0usize);
        let rot = Affine::rotation([1.0, 1.0], std::f64::consts::FRAC_PI_4, [1.0, 1.0]);
        let rotated = label.affine(&rot);
        let half_diag = 2.0f64.sqrt();
        assert!((rotated.rect.w() - 2.0 * half_diag).abs() < 1e-9);
        assert!((rotated.rect.cx() - 1.0).abs() < 1e-9);
    }
}
