//! Feature extractors producing feature maps at strides 8, 16 and 32.

use super::module::*;
use crate::{common::*, config::BackboneKind};

pub use darknet53::*;
pub use mobilenet_v2::*;

mod darknet53;
mod mobilenet_v2;

/// Feature maps of the small, medium and large object scales, in NCHW layout.
#[derive(Debug, TensorLike)]
pub struct FeatureMaps {
    /// Stride 8 features.
    pub small: Tensor,
    /// Stride 16 features.
    pub medium: Tensor,
    /// Stride 32 features.
    pub large: Tensor,
}

#[derive(Debug, Clone)]
pub struct BackboneInit {
    pub kind: BackboneKind,
}

impl BackboneInit {
    pub fn build<'p, P>(self, path: P) -> Result<Backbone>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self { kind } = self;

        let backbone = match kind {
            BackboneKind::Darknet53 => Backbone::Darknet53(Darknet53Init::default().build(path)?),
            BackboneKind::MobileNetV2 => {
                Backbone::MobileNetV2(MobileNetV2Init::default().build(path)?)
            }
        };

        info!(
            "built {} backbone with feature channels {:?}",
            kind,
            backbone.feature_channels()
        );
        Ok(backbone)
    }
}

#[derive(Debug)]
pub enum Backbone {
    Darknet53(Darknet53),
    MobileNetV2(MobileNetV2),
}

impl Backbone {
    pub fn forward_t(&self, image: &Tensor, train: bool) -> Result<FeatureMaps> {
        let (_b, channels, height, width) = image.size4()?;
        ensure!(
            channels == 3,
            "expect a 3-channel image, but get {} channels",
            channels
        );
        ensure!(
            height % 32 == 0 && width % 32 == 0,
            "the image size {}x{} is not a multiple of 32",
            height,
            width
        );

        let features = match self {
            Self::Darknet53(backbone) => backbone.forward_t(image, train),
            Self::MobileNetV2(backbone) => backbone.forward_t(image, train),
        };
        Ok(features)
    }

    /// Channel sizes of the small, medium and large feature maps.
    pub fn feature_channels(&self) -> [usize; 3] {
        match self {
            Self::Darknet53(_) => DARKNET53_CHANNELS,
            Self::MobileNetV2(_) => MOBILENET_V2_CHANNELS,
        }
    }
}
