//! Loss function building blocks.

mod bce_with_logit_loss;
mod focal_loss;
mod yolo_loss;

pub use bce_with_logit_loss::*;
pub use focal_loss::*;
pub use yolo_loss::*;
