use super::{Rect, HW, TLBR};
use crate::{common::*, RectNum};

/// Per-axis scale followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transform<T> {
    pub sy: T,
    pub sx: T,
    pub ty: T,
    pub tx: T,
}

impl<T> Transform<T>
where
    T: Copy + Num + PartialOrd,
{
    pub fn identity() -> Self {
        Self {
            sy: T::one(),
            sx: T::one(),
            ty: T::zero(),
            tx: T::zero(),
        }
    }

    /// The transform that maps `src` onto `tgt`.
    pub fn from_rects<R>(src: &R, tgt: &R) -> Self
    where
        R: Rect<Type = T>,
    {
        let sy = tgt.h() / src.h();
        let sx = tgt.w() / src.w();
        let ty = tgt.t() - src.t() * sy;
        let tx = tgt.l() - src.l() * sx;

        Self { sy, sx, ty, tx }
    }

    pub fn from_sizes_exact(src_size: HW<T>, tgt_size: HW<T>) -> Self {
        Self::from_rects(&src_size.to_rect(), &tgt_size.to_rect())
    }

    /// Where an image of `src_size` lands inside `tgt_size` after an
    /// aspect-preserving resize with centered padding.
    pub fn letterbox_placement(src_size: HW<T>, tgt_size: HW<T>) -> TLBR<T> {
        let (new_h, new_w) = if tgt_size.h() * src_size.w() <= tgt_size.w() * src_size.h() {
            let new_h = tgt_size.h();
            let new_w = src_size.w() * tgt_size.h() / src_size.h();
            (new_h, new_w)
        } else {
            let new_h = src_size.h() * tgt_size.w() / src_size.w();
            let new_w = tgt_size.w();
            (new_h, new_w)
        };

        let two = T::one() + T::one();
        let off_y = (tgt_size.h() - new_h) / two;
        let off_x = (tgt_size.w() - new_w) / two;

        TLBR::from_tlhw([off_y, off_x, new_h, new_w])
    }

    pub fn from_sizes_letterbox(src_size: HW<T>, tgt_size: HW<T>) -> Self {
        let tgt = Self::letterbox_placement(src_size, tgt_size);
        Self::from_rects(&src_size.to_rect(), &tgt)
    }

    pub fn map_point(&self, point: [T; 2]) -> [T; 2] {
        let [x, y] = point;
        [x * self.sx + self.tx, y * self.sy + self.ty]
    }
}

impl<T> Transform<T>
where
    T: Copy + Num + PartialOrd + Neg<Output = T>,
{
    /// Left-right mirror of an image with the given width.
    pub fn flip_horizontal(width: T) -> Self {
        Self {
            sy: T::one(),
            sx: -T::one(),
            ty: T::zero(),
            tx: width,
        }
    }

    pub fn inverse(&self) -> Self {
        let sy = T::one() / self.sy;
        let sx = T::one() / self.sx;
        let ty = -self.ty / self.sy;
        let tx = -self.tx / self.sx;

        Self { sy, sx, ty, tx }
    }
}

impl<T> Mul<&TLBR<T>> for &Transform<T>
where
    T: Float,
{
    type Output = TLBR<T>;

    fn mul(self, rhs: &TLBR<T>) -> Self::Output {
        rhs.transform(self)
    }
}

/// Composition: `(lhs * rhs)` applies `rhs` first.
impl<T> Mul<&Transform<T>> for &Transform<T>
where
    T: Copy + Num,
{
    type Output = Transform<T>;

    fn mul(self, rhs: &Transform<T>) -> Self::Output {
        Transform {
            sx: self.sx * rhs.sx,
            sy: self.sy * rhs.sy,
            tx: rhs.tx * self.sx + self.tx,
            ty: rhs.ty * self.sy + self.ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_inverse() {
        let orig = Transform {
            sx: 2.0,
            sy: 2.0,
            tx: 1.0,
            ty: 1.0,
        };
        assert_eq!(orig.inverse().inverse(), orig);
        assert_eq!(&orig * &orig.inverse(), Transform::identity());
    }

    #[test]
    fn resize_exact() {
        let transform =
            Transform::from_sizes_exact(HW::from_hw([80.0, 80.0]), HW::from_hw([20.0, 40.0]));
        let expect = Transform {
            sx: 0.5,
            sy: 0.25,
            tx: 0.0,
            ty: 0.0,
        };
        assert_eq!(transform, expect);
    }

    #[test]
    fn resize_letterbox() {
        let transform =
            Transform::from_sizes_letterbox(HW::from_hw([80.0, 80.0]), HW::from_hw([20.0, 40.0]));
        let expect = Transform {
            sx: 0.25,
            sy: 0.25,
            tx: 10.0,
            ty: 0.0,
        };
        assert_eq!(transform, expect);
    }

    #[test]
    fn letterbox_keeps_inside() {
        let src = HW::from_hw([300.0, 640.0]);
        let tgt = HW::from_hw([512.0, 512.0]);
        let transform = Transform::from_sizes_letterbox(src, tgt);
        let rect = src.to_rect().transform(&transform);
        assert!(tgt.to_rect().contains(&rect));
        assert_eq!(rect.w(), 512.0);
    }
}
