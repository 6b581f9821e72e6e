use super::*;
use crate::{box_tensor::BoxFormat, config::AnchorSize};

/// The box parameterization of a detection head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectKind {
    /// Center/size boxes relative to anchors given in grid units.
    Anchor { anchors: Vec<AnchorSize> },
    /// Anchor-free corner boxes with a fixed number of slots per grid cell.
    Corner { slots: usize },
}

impl DetectKind {
    pub fn num_slots(&self) -> usize {
        match self {
            Self::Anchor { anchors } => anchors.len(),
            Self::Corner { slots } => *slots,
        }
    }

    pub fn box_format(&self) -> BoxFormat {
        match self {
            Self::Anchor { .. } => BoxFormat::Xywh,
            Self::Corner { .. } => BoxFormat::Xyxy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Detect2DInit {
    pub num_classes: usize,
    pub stride: usize,
    pub kind: DetectKind,
}

impl Detect2DInit {
    pub fn build<'p, P>(self, path: P) -> Result<Detect2D>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let device = path.device();

        let Self {
            num_classes,
            stride,
            kind,
        } = self;

        ensure!(num_classes > 0, "num_classes must be positive");
        ensure!(stride > 0, "stride must be positive");
        ensure!(kind.num_slots() > 0, "the detector must have at least one slot");

        match &kind {
            DetectKind::Anchor { anchors } => {
                ensure!(
                    anchors.iter().all(|anchor| anchor.w > 0.0 && anchor.h > 0.0),
                    "anchor sizes must be positive"
                );
                let sizes: Vec<_> = anchors
                    .iter()
                    .map(|anchor| {
                        (
                            anchor.w.raw() * stride as f64,
                            anchor.h.raw() * stride as f64,
                        )
                    })
                    .collect();
                info!("stride {} detector uses anchors (w, h) {:?}", stride, sizes);
            }
            DetectKind::Corner { slots } => {
                info!("stride {} detector predicts {} corner boxes per cell", stride, slots);
            }
        }

        Ok(Detect2D {
            num_classes,
            stride,
            kind,
            device,
        })
    }
}

/// Decodes the raw output of one scale into boxes, objectness and class probabilities.
#[derive(Debug)]
pub struct Detect2D {
    num_classes: usize,
    stride: usize,
    kind: DetectKind,
    device: Device,
}

impl Detect2D {
    /// Decode a raw `[batch, height, width, slots * (5 + num_classes)]` tensor.
    pub fn forward(&self, raw: &Tensor) -> Result<Detect2DOutput> {
        let Self {
            num_classes,
            stride,
            ref kind,
            device,
        } = *self;

        ensure!(
            raw.device() == device,
            "expect input on device {:?}, but get {:?}",
            device,
            raw.device()
        );

        let decoded = match kind {
            DetectKind::Anchor { anchors } => decode(raw, anchors, num_classes, stride)?,
            DetectKind::Corner { .. } => {
                let decoded = decode_corner(raw, num_classes, stride)?;
                let num_slots = decoded.size()[3];
                ensure!(
                    num_slots == kind.num_slots() as i64,
                    "expect {} slots per cell, but get {}",
                    kind.num_slots(),
                    num_slots
                );
                decoded
            }
        };
        let raw = raw.reshape(&decoded.size());

        Ok(Detect2DOutput {
            raw,
            decoded,
            box_format: kind.box_format(),
            stride: stride as i64,
            num_classes: num_classes as i64,
        })
    }
}

/// Decode anchor-based raw predictions into `[batch, height, width, anchors, 5 + num_classes]`.
///
/// The entries of each slot are the box center and size in input pixels, followed by the
/// objectness and class probabilities.
pub fn decode(
    raw: &Tensor,
    anchors: &[AnchorSize],
    num_classes: usize,
    stride: usize,
) -> Result<Tensor> {
    let num_anchors = anchors.len() as i64;
    let raw = split_slots(raw, num_classes)?;
    let (_b, grid_h, grid_w, num_slots, _e) = raw.size5()?;
    ensure!(
        num_slots == num_anchors,
        "expect {} anchors per cell, but the raw output has {} slots",
        num_anchors,
        num_slots
    );

    let kind = raw.kind();
    let device = raw.device();
    let grid = grid_xy(grid_h, grid_w, kind, device);
    let anchors = {
        let values: Vec<f32> = anchors
            .iter()
            .flat_map(|anchor| [anchor.w.raw() as f32, anchor.h.raw() as f32])
            .collect();
        Tensor::of_slice(&values)
            .view([1, 1, 1, num_anchors, 2])
            .to_kind(kind)
            .to_device(device)
    };
    let stride = stride as f64;

    let xy = (raw.narrow(-1, 0, 2).sigmoid() + grid) * stride;
    let wh = raw.narrow(-1, 2, 2).exp() * anchors * stride;
    let obj = raw.narrow(-1, 4, 1).sigmoid();
    let class = raw.narrow(-1, 5, num_classes as i64).sigmoid();

    Ok(Tensor::cat(&[xy, wh, obj, class], -1))
}

/// Decode anchor-free raw predictions into `[batch, height, width, slots, 5 + num_classes]`.
///
/// The entries of each slot are the top-left and bottom-right corners in input pixels, followed
/// by the objectness and class probabilities.
pub fn decode_corner(raw: &Tensor, num_classes: usize, stride: usize) -> Result<Tensor> {
    let raw = split_slots(raw, num_classes)?;
    let (_b, grid_h, grid_w, _s, _e) = raw.size5()?;

    let grid = grid_xy(grid_h, grid_w, raw.kind(), raw.device());
    let center = grid + 0.5;
    let stride = stride as f64;

    let min = (&center - raw.narrow(-1, 0, 2).exp()) * stride;
    let max = (&center + raw.narrow(-1, 2, 2).exp()) * stride;
    let obj = raw.narrow(-1, 4, 1).sigmoid();
    let class = raw.narrow(-1, 5, num_classes as i64).sigmoid();

    Ok(Tensor::cat(&[min, max, obj, class], -1))
}

/// Reshape `[batch, height, width, channels]` into `[batch, height, width, slots, entries]`.
fn split_slots(raw: &Tensor, num_classes: usize) -> Result<Tensor> {
    let (batch_size, grid_h, grid_w, channels) = raw.size4()?;
    let num_entries = num_classes as i64 + 5;
    ensure!(
        channels % num_entries == 0,
        "the channel size {} is not a multiple of 5 + num_classes = {}",
        channels,
        num_entries
    );
    let num_slots = channels / num_entries;
    Ok(raw.reshape(&[batch_size, grid_h, grid_w, num_slots, num_entries]))
}

/// Cell offsets `(x, y)` in shape `[1, height, width, 1, 2]`.
fn grid_xy(grid_h: i64, grid_w: i64, kind: Kind, device: Device) -> Tensor {
    tch::no_grad(|| {
        let ys = Tensor::arange(grid_h, (kind, device))
            .view([1, grid_h, 1, 1, 1])
            .expand(&[1, grid_h, grid_w, 1, 1], false);
        let xs = Tensor::arange(grid_w, (kind, device))
            .view([1, 1, grid_w, 1, 1])
            .expand(&[1, grid_h, grid_w, 1, 1], false);
        Tensor::cat(&[xs, ys], -1)
    })
}

/// The raw and decoded predictions of one scale.
#[derive(Debug, TensorLike, Getters, CopyGetters)]
pub struct Detect2DOutput {
    /// Raw logits in shape `[batch, height, width, slots, 5 + num_classes]`.
    #[get = "pub"]
    pub(crate) raw: Tensor,
    /// Decoded predictions in the same shape as `raw`.
    #[get = "pub"]
    pub(crate) decoded: Tensor,
    #[tensor_like(copy)]
    #[get_copy = "pub"]
    pub(crate) box_format: BoxFormat,
    #[get_copy = "pub"]
    pub(crate) stride: i64,
    #[get_copy = "pub"]
    pub(crate) num_classes: i64,
}

impl Detect2DOutput {
    pub fn batch_size(&self) -> i64 {
        self.raw.size()[0]
    }

    /// The `[height, width]` of the output grid.
    pub fn grid_size(&self) -> [i64; 2] {
        let size = self.raw.size();
        [size[1], size[2]]
    }

    pub fn num_slots(&self) -> i64 {
        self.raw.size()[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_offsets() -> Result<()> {
        let grid = grid_xy(2, 3, Kind::Float, Device::Cpu);
        ensure!(grid.size() == vec![1, 2, 3, 1, 2]);
        let values = Vec::<f32>::from(&grid.view([-1]));
        #[rustfmt::skip]
        let expect = [
            0.0, 0.0, 1.0, 0.0, 2.0, 0.0,
            0.0, 1.0, 1.0, 1.0, 2.0, 1.0,
        ];
        ensure!(values == expect);
        Ok(())
    }

    #[test]
    fn indivisible_channels_are_rejected() {
        let raw = Tensor::zeros(&[1, 4, 4, 13], tch::kind::FLOAT_CPU);
        assert!(decode_corner(&raw, 1, 8).is_err());
        assert!(decode(&raw, &[AnchorSize::new(1.0, 1.0)], 1, 8).is_err());
    }

    #[test]
    fn anchor_count_must_match_slots() {
        let raw = Tensor::zeros(&[1, 4, 4, 12], tch::kind::FLOAT_CPU);
        let anchors = vec![AnchorSize::new(1.0, 1.0); 3];
        assert!(decode(&raw, &anchors, 1, 8).is_err());
    }
}
