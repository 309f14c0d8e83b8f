use super::TLBR;
use crate::common::*;

/// The generic axis-aligned rectangle.
///
/// Coordinates are continuous: `t <= b` and `l <= r`, an image of size `w x h`
/// spans `[0, w] x [0, h]`.
pub trait Rect {
    type Type;

    fn t(&self) -> Self::Type;
    fn l(&self) -> Self::Type;
    fn b(&self) -> Self::Type;
    fn r(&self) -> Self::Type;
    fn h(&self) -> Self::Type;
    fn w(&self) -> Self::Type;

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_tlhw(tlhw: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd + Copy,
{
    fn from_tlbr(tlbr: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_tlbr(tlbr).unwrap()
    }

    fn from_tlhw(tlhw: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_tlhw(tlhw).unwrap()
    }

    fn tlbr(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.b(), self.r()]
    }

    fn tlhw(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.h(), self.w()]
    }

    fn cy(&self) -> Self::Type {
        let two = Self::Type::one() + Self::Type::one();
        self.t() + self.h() / two
    }

    fn cx(&self) -> Self::Type {
        let two = Self::Type::one() + Self::Type::one();
        self.l() + self.w() / two
    }

    fn to_tlbr(&self) -> TLBR<Self::Type> {
        TLBR {
            t: self.t(),
            l: self.l(),
            b: self.b(),
            r: self.r(),
        }
    }

    fn area(&self) -> Self::Type {
        self.h() * self.w()
    }

    /// Whether `other` lies entirely inside this rectangle.
    fn contains<R>(&self, other: &R) -> bool
    where
        R: Rect<Type = Self::Type>,
    {
        other.t() >= self.t()
            && other.l() >= self.l()
            && other.b() <= self.b()
            && other.r() <= self.r()
    }
}

pub trait RectFloat: RectNum
where
    Self::Type: Float,
{
    fn intersect_with<R>(&self, other: &R) -> Option<TLBR<Self::Type>>
    where
        R: Rect<Type = Self::Type>,
    {
        let t = self.t().max(other.t());
        let l = self.l().max(other.l());
        let b = self.b().min(other.b());
        let r = self.r().min(other.r());
        (b > t && r > l).then(|| TLBR { t, l, b, r })
    }

    fn intersection_area_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        self.intersect_with(other)
            .map(|rect| rect.area())
            .unwrap_or_else(Self::Type::zero)
    }

    fn iou_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let inter_area = self.intersection_area_with(other);
        let union_area = self.area() + other.area() - inter_area;
        if union_area <= Self::Type::zero() {
            return Self::Type::zero();
        }
        inter_area / union_area
    }

    /// The fraction of this rectangle's area that lies inside `bounds`.
    ///
    /// A degenerate rectangle with zero area has coverage zero.
    fn coverage_in<R>(&self, bounds: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let area = self.area();
        if area <= Self::Type::zero() {
            return Self::Type::zero();
        }
        self.intersection_area_with(bounds) / area
    }

    /// Clamp the rectangle into `bounds`.
    fn clip_to<R>(&self, bounds: &R) -> TLBR<Self::Type>
    where
        R: Rect<Type = Self::Type>,
    {
        let clamp = |val: Self::Type, lo: Self::Type, hi: Self::Type| val.max(lo).min(hi);
        TLBR {
            t: clamp(self.t(), bounds.t(), bounds.b()),
            l: clamp(self.l(), bounds.l(), bounds.r()),
            b: clamp(self.b(), bounds.t(), bounds.b()),
            r: clamp(self.r(), bounds.l(), bounds.r()),
        }
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd + Copy,
{
}

impl<T> RectFloat for T
where
    T: Rect,
    T::Type: Float,
{
}
