//! Detection heads turning backbone features into raw per-scale predictions.

use super::{backbone::FeatureMaps, module::*};
use crate::{
    common::*,
    config::{BackboneKind, UpsampleMethod},
};

/// Bottleneck widths of the small, medium and large scale blocks.
const MID_CHANNELS: [usize; 3] = [128, 256, 512];

/// The operator of the wide layers in the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadStyle {
    /// Dense 3x3 convolutions with leaky activation.
    Darknet,
    /// Depthwise separable convolutions.
    Mobile,
}

impl From<BackboneKind> for HeadStyle {
    fn from(kind: BackboneKind) -> Self {
        match kind {
            BackboneKind::Darknet53 => Self::Darknet,
            BackboneKind::MobileNetV2 => Self::Mobile,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeadInit {
    pub style: HeadStyle,
    /// Channels of the small, medium and large feature maps.
    pub feature_channels: [usize; 3],
    /// Output channels per scale, `slots * (5 + num_classes)`.
    pub out_c: usize,
    pub upsample_method: UpsampleMethod,
}

impl HeadInit {
    pub fn build<'p, P>(self, path: P) -> Result<Head>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            style,
            feature_channels,
            out_c,
            upsample_method,
        } = self;

        ensure!(out_c > 0, "the head must have at least one output channel");
        ensure!(
            feature_channels.iter().all(|&channels| channels > 0),
            "feature channels must be positive, but get {:?}",
            feature_channels
        );

        let [small_c, medium_c, large_c] = feature_channels;
        let [small_mid, medium_mid, large_mid] = MID_CHANNELS;

        let large = HeadScale::new(
            &(path / "large"),
            style,
            large_c,
            large_mid,
            out_c,
            Some(upsample_method),
        );
        let medium = HeadScale::new(
            &(path / "medium"),
            style,
            medium_c + large_mid / 2,
            medium_mid,
            out_c,
            Some(upsample_method),
        );
        let small = HeadScale::new(
            &(path / "small"),
            style,
            small_c + medium_mid / 2,
            small_mid,
            out_c,
            None,
        );

        Ok(Head {
            small,
            medium,
            large,
        })
    }
}

#[derive(Debug)]
pub struct Head {
    small: HeadScale,
    medium: HeadScale,
    large: HeadScale,
}

impl Head {
    /// Produce raw predictions of the small, medium and large scales.
    ///
    /// Each output is in channel-last shape `[batch, height, width, out_c]`.
    pub fn forward_t(&self, features: &FeatureMaps, train: bool) -> Result<[Tensor; 3]> {
        let FeatureMaps {
            small,
            medium,
            large,
        } = features;

        let (large_out, route) = self.large.forward_t(large, train)?;
        let route = route.context("the large scale block has no route")?;
        let xs = Concat2D.forward(&[route, medium.shallow_clone()])?;
        let (medium_out, route) = self.medium.forward_t(&xs, train)?;
        let route = route.context("the medium scale block has no route")?;
        let xs = Concat2D.forward(&[route, small.shallow_clone()])?;
        let (small_out, _) = self.small.forward_t(&xs, train)?;

        let to_nhwc = |xs: Tensor| xs.permute(&[0, 2, 3, 1]);
        Ok([to_nhwc(small_out), to_nhwc(medium_out), to_nhwc(large_out)])
    }
}

#[derive(Debug)]
enum HeadLayer {
    Conv(ConvBn2D),
    Separable(SeparableConv2D),
}

impl HeadLayer {
    fn pointwise(path: &nn::Path, in_c: usize, out_c: usize) -> Self {
        Self::Conv(ConvBn2DInit::new(in_c, out_c, 1).build(path))
    }

    fn wide(path: &nn::Path, style: HeadStyle, in_c: usize, out_c: usize) -> Self {
        match style {
            HeadStyle::Darknet => Self::Conv(ConvBn2DInit::new(in_c, out_c, 3).build(path)),
            HeadStyle::Mobile => Self::Separable(SeparableConv2DInit::new(in_c, out_c).build(path)),
        }
    }

    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        match self {
            Self::Conv(conv) => conv.forward_t(xs, train),
            Self::Separable(conv) => conv.forward_t(xs, train),
        }
    }
}

/// The head block of one scale.
#[derive(Debug)]
struct HeadScale {
    stack: Vec<HeadLayer>,
    branch: HeadLayer,
    output: ConvBn2D,
    /// Reduces and upsamples the stack output for the next finer scale.
    route: Option<(ConvBn2D, UpSample2D)>,
}

impl HeadScale {
    fn new(
        path: &nn::Path,
        style: HeadStyle,
        in_c: usize,
        mid_c: usize,
        out_c: usize,
        upsample: Option<UpsampleMethod>,
    ) -> Self {
        let wide_c = mid_c * 2;

        let stack = vec![
            HeadLayer::pointwise(&(path / "conv0"), in_c, mid_c),
            HeadLayer::wide(&(path / "conv1"), style, mid_c, wide_c),
            HeadLayer::pointwise(&(path / "conv2"), wide_c, mid_c),
            HeadLayer::wide(&(path / "conv3"), style, mid_c, wide_c),
            HeadLayer::pointwise(&(path / "conv4"), wide_c, mid_c),
        ];
        let branch = HeadLayer::wide(&(path / "branch"), style, mid_c, wide_c);
        let output = ConvBn2DInit::linear(wide_c, out_c, 1).build(path / "output");

        let route = upsample.map(|method| {
            let reduce = ConvBn2DInit::new(mid_c, mid_c / 2, 1).build(path / "reduce");
            let up_sample = UpSample2DInit {
                method,
                channels: mid_c / 2,
            }
            .build(path / "upsample");
            (reduce, up_sample)
        });

        Self {
            stack,
            branch,
            output,
            route,
        }
    }

    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<(Tensor, Option<Tensor>)> {
        let xs = self
            .stack
            .iter()
            .fold(xs.shallow_clone(), |xs, layer| layer.forward_t(&xs, train));

        let output = self
            .output
            .forward_t(&self.branch.forward_t(&xs, train), train);

        let route = self
            .route
            .as_ref()
            .map(|(reduce, up_sample)| up_sample.forward(&reduce.forward_t(&xs, train)))
            .transpose()?;

        Ok((output, route))
    }
}
