//! Training targets consumed by the loss.

use crate::common::*;

/// Ground truth boxes of a batch, padded with zero boxes to a fixed capacity per image.
///
/// The boxes are in absolute input pixels and in center/size form, with shape
/// `[batch, capacity, 4]`. Zero padding never raises the IoU of a prediction against the
/// ground truth set, so the padding is transparent to the loss.
#[derive(Debug, TensorLike, Getters)]
pub struct GroundTruthBoxes {
    #[get = "pub"]
    pub(crate) boxes: Tensor,
}

impl GroundTruthBoxes {
    /// Pad per-image box lists into a single tensor.
    pub fn from_boxes<B>(boxes: &[B], capacity: usize) -> Result<Self>
    where
        B: AsRef<[Xywh<f32>]>,
    {
        let batch_size = boxes.len();

        let values: Vec<f32> = boxes
            .iter()
            .enumerate()
            .map(|(index, image_boxes)| -> Result<_> {
                let image_boxes = image_boxes.as_ref();
                ensure!(
                    image_boxes.len() <= capacity,
                    "image {} has {} boxes, exceeding the capacity {}",
                    index,
                    image_boxes.len(),
                    capacity
                );

                let num_padding = capacity - image_boxes.len();
                let values = image_boxes
                    .iter()
                    .flat_map(|bbox| bbox.xywh())
                    .chain(iter::repeat(0.0).take(num_padding * 4));
                Ok(values)
            })
            .flatten_ok()
            .collect::<Result<_>>()?;

        let boxes = Tensor::of_slice(&values).view([batch_size as i64, capacity as i64, 4]);
        Ok(Self { boxes })
    }

    /// Wrap an already padded `[batch, capacity, 4]` tensor.
    pub fn from_tensor(boxes: Tensor) -> Result<Self> {
        let (_batch_size, _capacity, num_params) = boxes.size3()?;
        ensure!(
            num_params == 4,
            "expect 4 box parameters, but get {}",
            num_params
        );
        Ok(Self { boxes })
    }

    pub fn batch_size(&self) -> i64 {
        self.boxes.size()[0]
    }

    pub fn capacity(&self) -> i64 {
        self.boxes.size()[1]
    }
}

/// The training target of one output scale.
#[derive(Debug, TensorLike, Getters)]
pub struct ScaleLabel {
    /// The target in shape `[batch, height, width, slots, entries]`, where entries are the box,
    /// the responsibility mask, the class probabilities and, for corner-form predictions, a
    /// trailing mix weight.
    #[get = "pub"]
    pub(crate) label: Tensor,
    #[get = "pub"]
    pub(crate) gt_boxes: GroundTruthBoxes,
}

impl ScaleLabel {
    pub fn new(label: Tensor, gt_boxes: GroundTruthBoxes) -> Result<Self> {
        let (batch_size, _h, _w, _slots, num_entries) = label.size5()?;
        ensure!(
            num_entries > 5,
            "the label must have at least 6 entries per slot, but get {}",
            num_entries
        );
        ensure!(
            batch_size == gt_boxes.batch_size(),
            "batch size mismatch between label ({}) and ground truth boxes ({})",
            batch_size,
            gt_boxes.batch_size()
        );
        Ok(Self { label, gt_boxes })
    }

    /// The responsibility mask in shape `[batch, height, width, slots, 1]`.
    pub fn respond(&self) -> Tensor {
        self.label.narrow(-1, 4, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_ground_truth_boxes() -> Result<()> {
        let boxes: Vec<Vec<Xywh<f32>>> = vec![
            vec![Xywh::from_xywh([10.0, 20.0, 4.0, 8.0])],
            vec![],
            vec![
                Xywh::from_xywh([1.0, 2.0, 3.0, 4.0]),
                Xywh::from_xywh([5.0, 6.0, 7.0, 8.0]),
            ],
        ];
        let gt = GroundTruthBoxes::from_boxes(&boxes, 2)?;
        ensure!(gt.boxes().size() == vec![3, 2, 4]);
        ensure!(gt.capacity() == 2);

        let values = Vec::<f32>::from(&gt.boxes().view([-1]));
        #[rustfmt::skip]
        let expect = [
            10.0, 20.0, 4.0, 8.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0,
        ];
        ensure!(values == expect);
        Ok(())
    }

    #[test]
    fn overflowing_capacity_is_rejected() {
        let boxes: Vec<Vec<Xywh<f32>>> = vec![vec![
            Xywh::from_xywh([1.0, 2.0, 3.0, 4.0]),
            Xywh::from_xywh([5.0, 6.0, 7.0, 8.0]),
        ]];
        assert!(GroundTruthBoxes::from_boxes(&boxes, 1).is_err());
    }

    #[test]
    fn scale_label_checks_batch_size() -> Result<()> {
        let gt = GroundTruthBoxes::from_tensor(Tensor::zeros(&[2, 4, 4], tch::kind::FLOAT_CPU))?;
        let label = Tensor::zeros(&[3, 13, 13, 3, 6], tch::kind::FLOAT_CPU);
        ensure!(ScaleLabel::new(label, gt).is_err());
        Ok(())
    }
}
