use super::*;

/// Darknet residual block: a 1x1 bottleneck and a 3x3 expansion added to the input.
#[derive(Debug, Clone)]
pub struct ResidualInit {
    pub in_c: usize,
    pub mid_c: usize,
}

impl ResidualInit {
    pub fn build<'p, P>(self, path: P) -> Residual
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self { in_c, mid_c } = self;

        Residual {
            conv1: ConvBn2DInit::new(in_c, mid_c, 1).build(path / "conv1"),
            conv2: ConvBn2DInit::new(mid_c, in_c, 3).build(path / "conv2"),
        }
    }
}

#[derive(Debug)]
pub struct Residual {
    conv1: ConvBn2D,
    conv2: ConvBn2D,
}

impl Residual {
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let ys = self.conv1.forward_t(xs, train);
        let ys = self.conv2.forward_t(&ys, train);
        xs + ys
    }
}
