//! Box geometry on tensors whose last dimension packs four box parameters.
//!
//! All operations broadcast over the leading dimensions, so a `[..., 1, 4]` prediction can be
//! compared against `[..., n, 4]` candidates in one call.

use crate::common::*;

pub use box_format::*;
pub use xywh::*;
pub use xyxy::*;

/// Added to IoU and GIoU denominators. Zero-area unions and closures score 0 instead of NaN.
pub const EPSILON: f64 = 1e-16;

/// Compute the IoU of two packed box tensors sharing the same format.
pub fn iou(lhs: &Tensor, rhs: &Tensor, format: BoxFormat) -> Result<Tensor> {
    let iou = match format {
        BoxFormat::Xywh => XywhTensor::from_packed(lhs)?.iou_with(&XywhTensor::from_packed(rhs)?),
        BoxFormat::Xyxy => XyxyTensor::from_packed(lhs)?.iou_with(&XyxyTensor::from_packed(rhs)?),
    };
    Ok(iou)
}

/// Compute the GIoU of two packed box tensors sharing the same format.
pub fn giou(lhs: &Tensor, rhs: &Tensor, format: BoxFormat) -> Result<Tensor> {
    let lhs = format.to_xyxy(lhs)?;
    let rhs = format.to_xyxy(rhs)?;
    Ok(lhs.giou_with(&rhs))
}

mod box_format {
    use super::*;

    /// The meaning of the four packed box parameters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum BoxFormat {
        /// Center x, center y, width, height.
        Xywh,
        /// Min x, min y, max x, max y.
        Xyxy,
    }

    impl BoxFormat {
        pub fn to_xyxy(&self, packed: &Tensor) -> Result<XyxyTensor> {
            Ok(match self {
                Self::Xywh => (&XywhTensor::from_packed(packed)?).into(),
                Self::Xyxy => XyxyTensor::from_packed(packed)?,
            })
        }

        /// Compute box widths and heights in shape `[..., 2]`.
        pub fn wh(&self, packed: &Tensor) -> Result<Tensor> {
            Ok(match self {
                Self::Xywh => XywhTensor::from_packed(packed)?.wh,
                Self::Xyxy => XyxyTensor::from_packed(packed)?.size(),
            })
        }
    }
}

fn check_packed(packed: &Tensor) -> Result<()> {
    let size = packed.size();
    ensure!(
        size.last() == Some(&4),
        "expect a tensor with 4 entries in the last dimension, but get shape {:?}",
        size
    );
    Ok(())
}

mod xywh {
    use super::*;

    /// Boxes in center/size form.
    #[derive(Debug, TensorLike, Getters)]
    pub struct XywhTensor {
        /// The box centers in shape `[..., 2]`.
        #[get = "pub"]
        pub(crate) xy: Tensor,
        /// The box sizes in shape `[..., 2]`.
        #[get = "pub"]
        pub(crate) wh: Tensor,
    }

    impl XywhTensor {
        pub fn from_packed(packed: &Tensor) -> Result<Self> {
            check_packed(packed)?;
            Ok(Self {
                xy: packed.narrow(-1, 0, 2),
                wh: packed.narrow(-1, 2, 2),
            })
        }

        pub fn to_packed(&self) -> Tensor {
            Tensor::cat(&[&self.xy, &self.wh], -1)
        }

        pub fn area(&self) -> Tensor {
            self.wh.select(-1, 0) * self.wh.select(-1, 1)
        }

        pub fn iou_with(&self, other: &Self) -> Tensor {
            let inter_area = XyxyTensor::from(self).intersect_area_with(&other.into());
            let union_area = self.area() + other.area() - &inter_area;
            inter_area / (union_area + EPSILON)
        }

        pub fn giou_with(&self, other: &Self) -> Tensor {
            XyxyTensor::from(self).giou_with(&other.into())
        }
    }

    impl From<&XyxyTensor> for XywhTensor {
        fn from(from: &XyxyTensor) -> Self {
            let XyxyTensor { min, max } = from;
            let wh = max - min;
            let xy = min + &wh * 0.5;
            Self { xy, wh }
        }
    }
}

mod xyxy {
    use super::*;

    /// Boxes in corner form.
    #[derive(Debug, TensorLike, Getters)]
    pub struct XyxyTensor {
        /// The top-left corners in shape `[..., 2]`.
        #[get = "pub"]
        pub(crate) min: Tensor,
        /// The bottom-right corners in shape `[..., 2]`.
        #[get = "pub"]
        pub(crate) max: Tensor,
    }

    impl XyxyTensor {
        pub fn from_packed(packed: &Tensor) -> Result<Self> {
            check_packed(packed)?;
            Ok(Self {
                min: packed.narrow(-1, 0, 2),
                max: packed.narrow(-1, 2, 2),
            })
        }

        pub fn to_packed(&self) -> Tensor {
            Tensor::cat(&[&self.min, &self.max], -1)
        }

        /// Reorder corners so that `min <= max` holds per axis.
        pub fn normalized(&self) -> Self {
            let Self { min, max } = self;
            Self {
                min: min.minimum(max),
                max: min.maximum(max),
            }
        }

        /// Compute the box widths and heights in shape `[..., 2]`.
        pub fn size(&self) -> Tensor {
            &self.max - &self.min
        }

        pub fn area(&self) -> Tensor {
            let size = self.size();
            size.select(-1, 0) * size.select(-1, 1)
        }

        /// Compute the intersection area with the other box tensor.
        pub fn intersect_area_with(&self, other: &Self) -> Tensor {
            let inter_min = self.min.maximum(&other.min);
            let inter_max = self.max.minimum(&other.max);
            let inter_size = (inter_max - inter_min).clamp_min(0.0);
            inter_size.select(-1, 0) * inter_size.select(-1, 1)
        }

        /// Compute the smallest box enclosing both boxes.
        pub fn closure_with(&self, other: &Self) -> Self {
            Self {
                min: self.min.minimum(&other.min),
                max: self.max.maximum(&other.max),
            }
        }

        pub fn iou_with(&self, other: &Self) -> Tensor {
            let inter_area = self.intersect_area_with(other);
            let union_area = self.area() + other.area() - &inter_area;
            inter_area / (union_area + EPSILON)
        }

        /// Compute the generalized IoU, ranging in `[-1, 1]`.
        pub fn giou_with(&self, other: &Self) -> Tensor {
            let lhs = self.normalized();
            let rhs = other.normalized();

            let inter_area = lhs.intersect_area_with(&rhs);
            let union_area = lhs.area() + rhs.area() - &inter_area;
            let iou = &inter_area / (&union_area + EPSILON);

            let closure_size = lhs.closure_with(&rhs).size().clamp_min(0.0);
            let closure_area = closure_size.select(-1, 0) * closure_size.select(-1, 1);

            iou - (&closure_area - &union_area) / (closure_area + EPSILON)
        }
    }

    impl From<&XywhTensor> for XyxyTensor {
        fn from(from: &XywhTensor) -> Self {
            let XywhTensor { xy, wh } = from;
            let half = wh * 0.5;
            Self {
                min: xy - &half,
                max: xy + &half,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbox::Rect;
    use rand::prelude::*;

    fn random_xywh(rng: &mut impl Rng, num: usize) -> Vec<[f32; 4]> {
        (0..num)
            .map(|_| {
                [
                    rng.gen_range(0.0..64.0),
                    rng.gen_range(0.0..64.0),
                    rng.gen_range(0.5..32.0),
                    rng.gen_range(0.5..32.0),
                ]
            })
            .collect()
    }

    fn to_tensor(boxes: &[[f32; 4]]) -> Tensor {
        let flat: Vec<f32> = boxes.iter().flatten().cloned().collect();
        Tensor::of_slice(&flat).view([-1, 4])
    }

    #[test]
    fn self_iou_is_one() -> Result<()> {
        let mut rng = rand::thread_rng();
        let boxes = to_tensor(&random_xywh(&mut rng, 32));

        let iou = iou(&boxes, &boxes, BoxFormat::Xywh)?;
        let giou = giou(&boxes, &boxes, BoxFormat::Xywh)?;
        ensure!(iou.size() == vec![32]);
        ensure!(f64::from((iou - 1.0).abs().max()) < 1e-5);
        ensure!(f64::from((giou - 1.0).abs().max()) < 1e-5);
        Ok(())
    }

    #[test]
    fn giou_is_symmetric_and_bounded() -> Result<()> {
        let mut rng = rand::thread_rng();
        let lhs = to_tensor(&random_xywh(&mut rng, 256));
        let rhs = to_tensor(&random_xywh(&mut rng, 256));

        let forward = giou(&lhs, &rhs, BoxFormat::Xywh)?;
        let backward = giou(&rhs, &lhs, BoxFormat::Xywh)?;
        ensure!(bool::from(forward.eq_tensor(&backward).all()));
        ensure!(bool::from(forward.ge(-1.0).logical_and(&forward.le(1.0)).all()));

        let iou = iou(&lhs, &rhs, BoxFormat::Xywh)?;
        ensure!(bool::from(iou.ge(0.0).logical_and(&iou.le(1.0)).all()));
        ensure!(bool::from((&forward - &iou).le(1e-5).all()));
        Ok(())
    }

    #[test]
    fn tensor_metrics_agree_with_scalar_boxes() -> Result<()> {
        let mut rng = rand::thread_rng();
        let lhs_boxes = random_xywh(&mut rng, 64);
        let rhs_boxes = random_xywh(&mut rng, 64);

        let lhs = to_tensor(&lhs_boxes);
        let rhs = to_tensor(&rhs_boxes);
        let ious = Vec::<f32>::from(&iou(&lhs, &rhs, BoxFormat::Xywh)?);
        let gious = Vec::<f32>::from(&giou(&lhs, &rhs, BoxFormat::Xywh)?);

        izip!(&lhs_boxes, &rhs_boxes, ious, gious).try_for_each(
            |(lhs, rhs, iou, giou)| -> Result<()> {
                let lhs = Xywh::try_from_xywh(lhs.map(|val| val as f64))?;
                let rhs = Xywh::try_from_xywh(rhs.map(|val| val as f64))?;
                ensure!(abs_diff_eq!(
                    lhs.iou_with(&rhs, EPSILON),
                    iou as f64,
                    epsilon = 1e-4
                ));
                ensure!(abs_diff_eq!(
                    lhs.giou_with(&rhs, EPSILON),
                    giou as f64,
                    epsilon = 1e-4
                ));
                Ok(())
            },
        )?;
        Ok(())
    }

    #[test]
    fn corner_and_center_forms_agree() -> Result<()> {
        let mut rng = rand::thread_rng();
        let lhs = to_tensor(&random_xywh(&mut rng, 16));
        let rhs = to_tensor(&random_xywh(&mut rng, 16));
        let lhs_xyxy = BoxFormat::Xywh.to_xyxy(&lhs)?.to_packed();
        let rhs_xyxy = BoxFormat::Xywh.to_xyxy(&rhs)?.to_packed();

        let diff = giou(&lhs, &rhs, BoxFormat::Xywh)? - giou(&lhs_xyxy, &rhs_xyxy, BoxFormat::Xyxy)?;
        ensure!(f64::from(diff.abs().max()) < 1e-5);

        let round_trip = XywhTensor::from(&XyxyTensor::from_packed(&lhs_xyxy)?).to_packed();
        ensure!(f64::from((round_trip - &lhs).abs().max()) < 1e-4);
        Ok(())
    }

    #[test]
    fn iou_broadcasts_over_candidates() -> Result<()> {
        // one prediction against three candidates
        let pred = Tensor::of_slice(&[10f32, 10.0, 4.0, 4.0]).view([1, 1, 4]);
        let candidates = Tensor::of_slice(&[
            10f32, 10.0, 4.0, 4.0, // identical
            12.0, 10.0, 4.0, 4.0, // half overlap
            50.0, 50.0, 4.0, 4.0, // disjoint
        ])
        .view([1, 3, 4]);

        let ious = iou(&pred, &candidates, BoxFormat::Xywh)?;
        ensure!(ious.size() == vec![1, 3]);
        let ious = Vec::<f32>::from(&ious.view([-1]));
        ensure!(abs_diff_eq!(ious[0], 1.0, epsilon = 1e-6));
        ensure!(abs_diff_eq!(ious[1], 8.0 / 24.0, epsilon = 1e-6));
        ensure!(ious[2] == 0.0);
        Ok(())
    }

    #[test]
    fn degenerate_boxes_do_not_produce_nan() -> Result<()> {
        let points = Tensor::of_slice(&[3f32, 3.0, 0.0, 0.0]).view([1, 4]);
        let iou = iou(&points, &points, BoxFormat::Xywh)?;
        let giou = giou(&points, &points, BoxFormat::Xywh)?;
        ensure!(f64::from(&iou) == 0.0);
        ensure!(f64::from(&giou) == 0.0);
        Ok(())
    }

    #[test]
    fn malformed_boxes_are_rejected() {
        let boxes = Tensor::zeros(&[2, 3], (Kind::Float, Device::Cpu));
        assert!(iou(&boxes, &boxes, BoxFormat::Xywh).is_err());
        assert!(giou(&boxes, &boxes, BoxFormat::Xyxy).is_err());
    }
}
