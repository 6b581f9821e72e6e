use super::*;

#[derive(Debug, Clone)]
pub struct ConvBn2DInit {
    pub in_c: usize,
    pub out_c: usize,
    pub k: usize,
    /// Halve the spatial size with a stride-2 convolution.
    pub downsample: bool,
    pub g: usize,
    pub activation: Activation,
    pub batch_norm: bool,
}

impl ConvBn2DInit {
    pub fn new(in_c: usize, out_c: usize, k: usize) -> Self {
        Self {
            in_c,
            out_c,
            k,
            downsample: false,
            g: 1,
            activation: Activation::Leaky,
            batch_norm: true,
        }
    }

    /// A linear convolution with bias and without batch normalization.
    pub fn linear(in_c: usize, out_c: usize, k: usize) -> Self {
        Self {
            activation: Activation::Linear,
            batch_norm: false,
            ..Self::new(in_c, out_c, k)
        }
    }

    pub fn build<'p, P>(self, path: P) -> ConvBn2D
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();

        let Self {
            in_c,
            out_c,
            k,
            downsample,
            g,
            activation,
            batch_norm,
        } = self;

        // the downsampling conv pads the top and left sides only, and the padding is applied
        // in the forward pass
        let (stride, padding) = if downsample { (2, 0) } else { (1, k / 2) };

        let conv = nn::conv2d(
            path / "conv",
            in_c as i64,
            out_c as i64,
            k as i64,
            nn::ConvConfig {
                stride,
                padding: padding as i64,
                groups: g as i64,
                bias: !batch_norm,
                ..Default::default()
            },
        );
        let bn = batch_norm.then(|| nn::batch_norm2d(path / "bn", out_c as i64, Default::default()));

        ConvBn2D {
            conv,
            bn,
            activation,
            downsample,
        }
    }
}

/// Convolution followed by optional batch normalization and an activation.
#[derive(Debug)]
pub struct ConvBn2D {
    conv: nn::Conv2D,
    bn: Option<nn::BatchNorm>,
    activation: Activation,
    downsample: bool,
}

impl ConvBn2D {
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let Self {
            ref conv,
            ref bn,
            activation,
            downsample,
        } = *self;

        let xs = if downsample {
            xs.zero_pad2d(1, 0, 1, 0).apply(conv)
        } else {
            xs.apply(conv)
        };

        let xs = match bn {
            Some(bn) => xs.apply_t(bn, train),
            None => xs,
        };

        xs.activation(activation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conv_bn_output_sizes() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();
        let input = Tensor::randn(&[2, 3, 16, 16], tch::kind::FLOAT_CPU);

        let same = ConvBn2DInit::new(3, 8, 3).build(&root / "same");
        ensure!(same.forward_t(&input, true).size() == vec![2, 8, 16, 16]);

        let down = ConvBn2DInit {
            downsample: true,
            ..ConvBn2DInit::new(3, 8, 3)
        }
        .build(&root / "down");
        ensure!(down.forward_t(&input, false).size() == vec![2, 8, 8, 8]);

        let linear = ConvBn2DInit::linear(3, 4, 1).build(&root / "linear");
        ensure!(linear.forward_t(&input, false).size() == vec![2, 4, 16, 16]);
        Ok(())
    }
}
