//! Layers shared by the backbones and detection heads.

use crate::{common::*, config::UpsampleMethod};

pub use concat_2d::*;
pub use conv_bn_2d::*;
pub use detect_2d::*;
pub use inverted_residual::*;
pub use residual::*;
pub use separable_conv_2d::*;
pub use up_sample_2d::*;

mod concat_2d;
mod conv_bn_2d;
mod detect_2d;
mod inverted_residual;
mod residual;
mod separable_conv_2d;
mod up_sample_2d;
