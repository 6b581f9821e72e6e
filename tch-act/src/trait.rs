use crate::{impls, Activation};
use tch::{nn::Module, Tensor};

pub trait TensorActivationExt {
    fn activation(&self, act: Activation) -> Tensor;

    /// Darknet leaky ReLU.
    fn leaky(&self) -> Tensor;

    fn relu6(&self) -> Tensor;
}

impl TensorActivationExt for Tensor {
    fn activation(&self, act: Activation) -> Tensor {
        act.forward(self)
    }

    fn leaky(&self) -> Tensor {
        impls::leaky(self)
    }

    fn relu6(&self) -> Tensor {
        impls::relu6(self)
    }
}
