use super::*;

/// A depthwise 3x3 convolution followed by a pointwise 1x1 convolution.
#[derive(Debug, Clone)]
pub struct SeparableConv2DInit {
    pub in_c: usize,
    pub out_c: usize,
    pub activation: Activation,
}

impl SeparableConv2DInit {
    pub fn new(in_c: usize, out_c: usize) -> Self {
        Self {
            in_c,
            out_c,
            activation: Activation::Relu6,
        }
    }

    pub fn build<'p, P>(self, path: P) -> SeparableConv2D
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            in_c,
            out_c,
            activation,
        } = self;

        SeparableConv2D {
            depthwise: ConvBn2DInit {
                g: in_c,
                activation,
                ..ConvBn2DInit::new(in_c, in_c, 3)
            }
            .build(path / "depthwise"),
            pointwise: ConvBn2DInit {
                activation,
                ..ConvBn2DInit::new(in_c, out_c, 1)
            }
            .build(path / "pointwise"),
        }
    }
}

#[derive(Debug)]
pub struct SeparableConv2D {
    depthwise: ConvBn2D,
    pointwise: ConvBn2D,
}

impl SeparableConv2D {
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let xs = self.depthwise.forward_t(xs, train);
        self.pointwise.forward_t(&xs, train)
    }
}
