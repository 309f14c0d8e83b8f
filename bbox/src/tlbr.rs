use super::{Rect, Transform};
use crate::common::*;

/// Bounding box in TLBR format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TLBR<T> {
    pub(crate) t: T,
    pub(crate) l: T,
    pub(crate) b: T,
    pub(crate) r: T,
}

impl<T> TLBR<T> {
    pub fn try_cast<V>(self) -> Option<TLBR<V>>
    where
        T: ToPrimitive,
        V: NumCast,
    {
        Some(TLBR {
            t: V::from(self.t)?,
            l: V::from(self.l)?,
            b: V::from(self.b)?,
            r: V::from(self.r)?,
        })
    }
}

impl<T> TLBR<T>
where
    T: Float,
{
    /// The smallest box enclosing a set of `[x, y]` points.
    pub fn bounding<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [T; 2]>,
    {
        points.into_iter().fold(None, |bound, [x, y]| {
            let bound = match bound {
                Some(TLBR { t, l, b, r }) => TLBR {
                    t: t.min(y),
                    l: l.min(x),
                    b: b.max(y),
                    r: r.max(x),
                },
                None => TLBR {
                    t: y,
                    l: x,
                    b: y,
                    r: x,
                },
            };
            Some(bound)
        })
    }

    /// Corners as `[x, y]` points in the order top-left, top-right,
    /// bottom-left, bottom-right.
    pub fn corners(&self) -> [[T; 2]; 4] {
        let Self { t, l, b, r } = *self;
        [[l, t], [r, t], [l, b], [r, b]]
    }

    /// Map the four corners and take their axis-aligned bound.
    pub fn map_corners<F>(&self, mut map: F) -> Self
    where
        F: FnMut([T; 2]) -> [T; 2],
    {
        Self::bounding(self.corners().into_iter().map(|point| map(point))).unwrap()
    }

    /// Apply a scale-translate transform. Negative scales (mirroring) keep
    /// the `t <= b`, `l <= r` ordering.
    pub fn transform(&self, transform: &Transform<T>) -> Self {
        let y1 = self.t * transform.sy + transform.ty;
        let y2 = self.b * transform.sy + transform.ty;
        let x1 = self.l * transform.sx + transform.tx;
        let x2 = self.r * transform.sx + transform.tx;

        TLBR {
            t: y1.min(y2),
            l: x1.min(x2),
            b: y1.max(y2),
            r: x1.max(x2),
        }
    }
}

impl<T> Rect for TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> Self::Type {
        self.t
    }

    fn l(&self) -> Self::Type {
        self.l
    }

    fn b(&self) -> Self::Type {
        self.b
    }

    fn r(&self) -> Self::Type {
        self.r
    }

    fn h(&self) -> Self::Type {
        self.b - self.t
    }

    fn w(&self) -> Self::Type {
        self.r - self.l
    }

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self> {
        let [t, l, b, r] = tlbr;
        ensure!(b >= t && r >= l, "b >= t and r >= l must hold");

        Ok(Self { t, l, b, r })
    }

    fn try_from_tlhw(tlhw: [Self::Type; 4]) -> Result<Self> {
        let [t, l, h, w] = tlhw;
        let zero = T::zero();
        ensure!(h >= zero && w >= zero, "h and w must be non-negative");
        Self::try_from_tlbr([t, l, t + h, l + w])
    }
}
