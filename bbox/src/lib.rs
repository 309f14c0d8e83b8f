//! Safe bounding box types and the planar mappings that move them around.

mod common;

pub use rect::*;
pub mod rect;

pub use tlbr::*;
pub mod tlbr;

pub use hw::*;
pub mod hw;

pub use transform::*;
mod transform;

pub use affine::*;
mod affine;

pub use projective::*;
mod projective;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat, RectNum};
}
