//! The detector network.

mod backbone;
mod head;
mod module;
mod yolo_v3;

pub use backbone::*;
pub use head::*;
pub use module::*;
pub use yolo_v3::*;
