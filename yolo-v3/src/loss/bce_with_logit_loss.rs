use crate::common::*;

/// Element-wise sigmoid cross entropy on logits, in the numerically stable form of libtorch.
#[derive(Debug, Clone, Copy)]
pub struct BceWithLogitsLoss;

impl BceWithLogitsLoss {
    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Tensor {
        debug_assert_eq!(
            input.size(),
            target.size(),
            "input and target tensors must have equal shape"
        );
        debug_assert!(
            bool::from(target.ge(0.0).logical_and(&target.le(1.0)).all()),
            "target values must be in range of [0.0, 1.0]"
        );

        input.binary_cross_entropy_with_logits(
            target,
            None::<Tensor>,
            None::<Tensor>,
            Reduction::None,
        )
    }
}
