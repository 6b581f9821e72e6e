//! Safe bounding box types and functions.
//!
//! Coordinates follow the image convention: `x` grows rightwards and `y` grows downwards.

mod common;

pub use rect::*;
pub mod rect;

pub use xywh::*;
pub mod xywh;

pub use xyxy::*;
pub mod xyxy;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat, RectNum};
}
