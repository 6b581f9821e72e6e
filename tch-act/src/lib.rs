#[cfg(feature = "tch")]
pub use impls::*;
#[cfg(feature = "tch")]
mod impls;

#[cfg(feature = "tch")]
pub use r#trait::*;
#[cfg(feature = "tch")]
mod r#trait;

/// Activation functions applied after convolution blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Activation {
    /// Identity.
    Linear,
    /// Darknet leaky ReLU with slope 0.1.
    Leaky,
    /// ReLU clipped to `[0, 6]`, as used by MobileNetV2.
    Relu6,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Leaky
    }
}
