use super::*;

/// MobileNetV2 inverted residual block.
#[derive(Debug, Clone)]
pub struct InvertedResidualInit {
    pub in_c: usize,
    pub out_c: usize,
    /// The channel expansion ratio of the hidden layer.
    pub expansion: usize,
    pub downsample: bool,
}

impl InvertedResidualInit {
    pub fn new(in_c: usize, out_c: usize) -> Self {
        Self {
            in_c,
            out_c,
            expansion: 6,
            downsample: false,
        }
    }

    pub fn build<'p, P>(self, path: P) -> InvertedResidual
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            in_c,
            out_c,
            expansion,
            downsample,
        } = self;
        let hidden_c = in_c * expansion;

        let expand = (expansion != 1).then(|| {
            ConvBn2DInit {
                activation: Activation::Relu6,
                ..ConvBn2DInit::new(in_c, hidden_c, 1)
            }
            .build(path / "expand")
        });
        let depthwise = ConvBn2DInit {
            downsample,
            g: hidden_c,
            activation: Activation::Relu6,
            ..ConvBn2DInit::new(hidden_c, hidden_c, 3)
        }
        .build(path / "depthwise");
        let project = ConvBn2DInit {
            activation: Activation::Linear,
            ..ConvBn2DInit::new(hidden_c, out_c, 1)
        }
        .build(path / "project");

        InvertedResidual {
            expand,
            depthwise,
            project,
            shortcut: in_c == out_c && !downsample,
        }
    }
}

#[derive(Debug)]
pub struct InvertedResidual {
    expand: Option<ConvBn2D>,
    depthwise: ConvBn2D,
    project: ConvBn2D,
    shortcut: bool,
}

impl InvertedResidual {
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let ys = match &self.expand {
            Some(expand) => expand.forward_t(xs, train),
            None => xs.shallow_clone(),
        };
        let ys = self.depthwise.forward_t(&ys, train);
        let ys = self.project.forward_t(&ys, train);

        if self.shortcut {
            xs + ys
        } else {
            ys
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_residual_sizes() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();
        let input = Tensor::randn(&[1, 16, 8, 8], tch::kind::FLOAT_CPU);

        let same = InvertedResidualInit::new(16, 16).build(&root / "same");
        ensure!(same.shortcut);
        ensure!(same.forward_t(&input, true).size() == vec![1, 16, 8, 8]);

        let down = InvertedResidualInit {
            downsample: true,
            ..InvertedResidualInit::new(16, 24)
        }
        .build(&root / "down");
        ensure!(!down.shortcut);
        ensure!(down.forward_t(&input, true).size() == vec![1, 24, 4, 4]);
        Ok(())
    }
}
