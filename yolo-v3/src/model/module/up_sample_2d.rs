use super::*;

#[derive(Debug, Clone)]
pub struct UpSample2DInit {
    pub method: UpsampleMethod,
    /// The channel size, used by the transposed convolution.
    pub channels: usize,
}

impl UpSample2DInit {
    pub fn build<'p, P>(self, path: P) -> UpSample2D
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self { method, channels } = self;

        match method {
            UpsampleMethod::Resize => UpSample2D::Resize,
            UpsampleMethod::Deconv => {
                let deconv = nn::conv_transpose2d(
                    path / "deconv",
                    channels as i64,
                    channels as i64,
                    2,
                    nn::ConvTransposeConfig {
                        stride: 2,
                        ..Default::default()
                    },
                );
                UpSample2D::Deconv(deconv)
            }
        }
    }
}

/// Doubles the spatial size of a feature map.
#[derive(Debug)]
pub enum UpSample2D {
    Resize,
    Deconv(nn::ConvTranspose2D),
}

impl UpSample2D {
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let (_b, _c, in_h, in_w) = input.size4()?;
        let output = match self {
            Self::Resize => input.upsample_nearest2d(&[in_h * 2, in_w * 2], None, None),
            Self::Deconv(deconv) => input.apply(deconv),
        };
        Ok(output)
    }
}
