//! YOLOv3 detection heads, decoders and the multi-scale training loss on libtorch.

mod common;

pub mod box_tensor;
pub mod config;
pub mod error;
pub mod label;
pub mod loss;
pub mod model;
pub mod profiling;

pub use config::Config;
pub use error::BuildError;
pub use model::{YoloOutput, YoloV3, YoloV3Init};
