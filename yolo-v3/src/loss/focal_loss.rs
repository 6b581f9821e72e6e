use crate::common::*;

/// Focal weight initializer.
#[derive(Debug, Clone)]
pub struct FocalWeightInit {
    /// The alpha coefficient.
    pub alpha: f64,
    /// The gamma coefficient.
    pub gamma: f64,
}

impl FocalWeightInit {
    /// Build a focal weight calculator.
    pub fn build(self) -> Result<FocalWeight> {
        let Self { alpha, gamma } = self;
        ensure!(alpha >= 0.0, "focal alpha must be non-negative");
        ensure!(gamma >= 0.0, "focal gamma must be non-negative");
        Ok(FocalWeight { alpha, gamma })
    }
}

impl Default for FocalWeightInit {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            gamma: 2.0,
        }
    }
}

/// Computes `alpha * |target - prob|^gamma`, the factor that emphasizes poorly fit objectness.
#[derive(Debug, Clone)]
pub struct FocalWeight {
    alpha: f64,
    gamma: f64,
}

impl FocalWeight {
    pub fn forward(&self, target: &Tensor, prob: &Tensor) -> Tensor {
        let Self { alpha, gamma } = *self;
        (target - prob).abs().pow_tensor_scalar(gamma) * alpha
    }
}
