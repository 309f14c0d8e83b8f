use crate::{common::*, Rect, TLBR};

/// Image or region size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HW<T> {
    h: T,
    w: T,
}

impl<T> HW<T>
where
    T: Num + PartialOrd + Copy,
{
    pub fn try_from_hw(hw: [T; 2]) -> Result<Self> {
        let [h, w] = hw;
        let zero = T::zero();
        ensure!(
            h >= zero && w >= zero,
            "height and width parameters must be non-negative"
        );
        Ok(Self { h, w })
    }

    pub fn from_hw(hw: [T; 2]) -> Self {
        Self::try_from_hw(hw).unwrap()
    }

    pub fn h(&self) -> T {
        self.h
    }

    pub fn w(&self) -> T {
        self.w
    }

    pub fn area(&self) -> T {
        self.h * self.w
    }

    /// The rectangle spanning `[0, w] x [0, h]`.
    pub fn to_rect(&self) -> TLBR<T> {
        TLBR::try_from_tlbr([T::zero(), T::zero(), self.h, self.w]).unwrap()
    }
}

impl HW<f64> {
    /// Build from pixel dimensions as reported by image buffers.
    pub fn from_dims(width: u32, height: u32) -> Self {
        Self {
            h: height as f64,
            w: width as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;
    use approx::assert_abs_diff_eq;

    #[test]
    fn size_area_and_rect() {
        let size = HW::from_dims(4, 3);
        assert_abs_diff_eq!(size.area(), 12.0);
        assert_eq!(size.to_rect().tlbr(), [0.0, 0.0, 3.0, 4.0]);
    }
}
