use crate::Activation;
use tch::{nn, Tensor};

pub const LEAKY_SLOPE: f64 = 0.1;

impl nn::Module for Activation {
    fn forward(&self, xs: &Tensor) -> Tensor {
        use Activation::*;

        match *self {
            Linear => xs.shallow_clone(),
            Leaky => leaky(xs),
            Relu6 => relu6(xs),
        }
    }
}

pub fn leaky(xs: &Tensor) -> Tensor {
    xs.clamp_min(0.0) + xs.clamp_max(0.0) * LEAKY_SLOPE
}

pub fn relu6(xs: &Tensor) -> Tensor {
    xs.clamp(0.0, 6.0)
}
