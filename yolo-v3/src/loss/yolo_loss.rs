//! Defines the multi-scale YOLOv3 loss.

use super::{
    bce_with_logit_loss::BceWithLogitsLoss,
    focal_loss::{FocalWeight, FocalWeightInit},
};
use crate::{
    box_tensor::{self, BoxFormat, XywhTensor, XyxyTensor},
    common::*,
    config::Config,
    label::ScaleLabel,
    model::{Detect2DOutput, YoloOutput},
    profiling::Timing,
};

pub use yolo_loss::*;
pub use yolo_loss_output::*;

static WARN_EMPTY_GT: Once = Once::new();

mod yolo_loss {
    use super::*;

    #[derive(Debug, Clone)]
    pub struct YoloLossInit {
        /// Unassigned predictions overlapping any ground truth above this IoU are not
        /// penalized as background.
        pub iou_loss_thresh: f64,
        pub focal: FocalWeightInit,
    }

    impl YoloLossInit {
        pub fn from_config(config: &Config) -> Self {
            Self {
                iou_loss_thresh: config.iou_loss_thresh.raw(),
                focal: FocalWeightInit {
                    alpha: config.focal.alpha.raw(),
                    gamma: config.focal.gamma.raw(),
                },
            }
        }

        pub fn build(self) -> Result<YoloLoss> {
            let Self {
                iou_loss_thresh,
                focal,
            } = self;

            ensure!(
                (0.0..=1.0).contains(&iou_loss_thresh),
                "iou_loss_thresh must be in range [0, 1]"
            );

            Ok(YoloLoss {
                iou_loss_thresh,
                focal: focal.build()?,
                bce: BceWithLogitsLoss,
            })
        }
    }

    impl Default for YoloLossInit {
        fn default() -> Self {
            Self {
                iou_loss_thresh: 0.5,
                focal: FocalWeightInit::default(),
            }
        }
    }

    #[derive(Debug)]
    pub struct YoloLoss {
        iou_loss_thresh: f64,
        focal: FocalWeight,
        bce: BceWithLogitsLoss,
    }

    impl YoloLoss {
        /// Sum the per-scale losses of the small, medium and large scales.
        pub fn compute_loss(
            &self,
            output: &YoloOutput,
            labels: &[ScaleLabel; 3],
        ) -> Result<YoloLossOutput> {
            let scales = output.scales();
            ensure!(
                scales
                    .iter()
                    .map(|scale| scale.box_format())
                    .all_equal(),
                "the output scales mix anchor-based and corner predictions"
            );

            let losses: Vec<_> = izip!(scales, labels)
                .map(|(prediction, target)| self.loss_layer(prediction, target))
                .try_collect()?;
            YoloLossOutput::sum(losses)
        }

        /// Sum the per-scale losses of anchor-free corner predictions.
        pub fn compute_loss_mobile(
            &self,
            output: &YoloOutput,
            labels: &[ScaleLabel; 3],
        ) -> Result<YoloLossOutput> {
            ensure!(
                output
                    .scales()
                    .iter()
                    .all(|scale| scale.box_format() == BoxFormat::Xyxy),
                "compute_loss_mobile expects corner predictions"
            );
            self.compute_loss(output, labels)
        }

        /// Compute the localization, objectness and classification losses of one scale.
        ///
        /// Each loss term is summed over the grid, slots and entries of an image, and
        /// averaged over the batch.
        pub fn loss_layer(
            &self,
            prediction: &Detect2DOutput,
            target: &ScaleLabel,
        ) -> Result<YoloLossOutput> {
            let mut timing = Timing::new("loss_layer");

            let format = prediction.box_format();
            let raw = prediction.raw();
            let decoded = prediction.decoded();
            let label = target.label();
            let gt_boxes = target.gt_boxes().boxes();

            // check shapes
            let (batch_size, grid_h, grid_w, num_slots, num_entries) = raw.size5()?;
            let num_classes = num_entries - 5;
            let num_label_entries = match format {
                BoxFormat::Xywh => num_entries,
                BoxFormat::Xyxy => num_entries + 1,
            };
            ensure!(
                label.size() == [batch_size, grid_h, grid_w, num_slots, num_label_entries],
                "expect label shape {:?}, but get {:?}",
                [batch_size, grid_h, grid_w, num_slots, num_label_entries],
                label.size()
            );
            let (gt_batch_size, num_gt, _) = gt_boxes.size3()?;
            ensure!(
                gt_batch_size == batch_size,
                "expect ground truth boxes for {} images, but get {}",
                batch_size,
                gt_batch_size
            );

            let raw_obj = raw.narrow(-1, 4, 1);
            let raw_class = raw.narrow(-1, 5, num_classes);
            let pred_box = decoded.narrow(-1, 0, 4);
            let pred_obj = decoded.narrow(-1, 4, 1);
            let label_box = label.narrow(-1, 0, 4);
            let respond = target.respond();
            let label_class = label.narrow(-1, 5, num_classes);

            // localization loss, weighted towards small boxes
            let iou_loss = {
                let giou = box_tensor::giou(&pred_box, &label_box, format)?.unsqueeze(-1);
                let input_area = (prediction.stride() * grid_h * prediction.stride() * grid_w) as f64;
                let label_wh = format.wh(&label_box)?;
                let label_area = label_wh.narrow(-1, 0, 1) * label_wh.narrow(-1, 1, 1);
                let scale = 2.0 - label_area / input_area;
                &respond * scale * (1.0 - giou)
            };
            timing.add_event("iou_loss");

            // background mask of predictions far from every ground truth
            let max_iou = tch::no_grad(|| -> Result<_> {
                if num_gt == 0 {
                    WARN_EMPTY_GT.call_once(|| {
                        warn!("the ground truth box list is empty, all unassigned predictions are background");
                    });
                    return Ok(respond.zeros_like());
                }

                let gt_boxes = match format {
                    BoxFormat::Xywh => gt_boxes.shallow_clone(),
                    BoxFormat::Xyxy => {
                        XyxyTensor::from(&XywhTensor::from_packed(gt_boxes)?).to_packed()
                    }
                };
                let gt_boxes = gt_boxes
                    .reshape(&[batch_size, 1, 1, 1, num_gt, 4])
                    .to_kind(raw.kind());
                let iou = box_tensor::iou(&pred_box.unsqueeze(-2), &gt_boxes, format)?;
                let (max_iou, _) = iou.max_dim(-1, true);
                Ok(max_iou)
            })?;
            let background =
                (1.0 - &respond) * max_iou.lt(self.iou_loss_thresh).to_kind(raw.kind());
            timing.add_event("background");

            // objectness loss
            let objectness_loss = self.focal.forward(&respond, &pred_obj)
                * (&respond + &background)
                * self.bce.forward(&raw_obj, &respond);
            timing.add_event("objectness_loss");

            // classification loss
            let classification_loss = &respond * self.bce.forward(&raw_class, &label_class);
            timing.add_event("classification_loss");

            let (iou_loss, objectness_loss, classification_loss) = match format {
                BoxFormat::Xywh => (iou_loss, objectness_loss, classification_loss),
                BoxFormat::Xyxy => {
                    let mix_weight = label.narrow(-1, num_entries, 1);
                    (
                        iou_loss * &mix_weight,
                        objectness_loss * &mix_weight,
                        classification_loss * &mix_weight,
                    )
                }
            };

            let kind = raw.kind();
            let reduce = |loss: Tensor| loss.sum_dim_intlist(&[1, 2, 3, 4], false, kind).mean(kind);
            let output = YoloLossOutput {
                iou_loss: reduce(iou_loss),
                objectness_loss: reduce(objectness_loss),
                classification_loss: reduce(classification_loss),
            };
            timing.add_event("reduction");

            debug_assert!(!bool::from(output.iou_loss.isnan()), "NaN detected");
            debug_assert!(!bool::from(output.objectness_loss.isnan()), "NaN detected");
            debug_assert!(
                !bool::from(output.classification_loss.isnan()),
                "NaN detected"
            );

            timing.report();
            Ok(output)
        }
    }
}

mod yolo_loss_output {
    use super::*;

    /// The loss components, each a scalar tensor.
    #[derive(Debug, TensorLike)]
    pub struct YoloLossOutput {
        /// The GIoU localization loss.
        pub iou_loss: Tensor,
        pub objectness_loss: Tensor,
        pub classification_loss: Tensor,
    }

    impl YoloLossOutput {
        /// Sum up components of the losses of several scales.
        pub fn sum<L>(iter: impl IntoIterator<Item = L>) -> Result<Self>
        where
            L: Borrow<YoloLossOutput>,
        {
            let (iou_loss_vec, objectness_loss_vec, classification_loss_vec) = iter
                .into_iter()
                .map(|loss| {
                    let YoloLossOutput {
                        iou_loss,
                        objectness_loss,
                        classification_loss,
                    } = loss.borrow().shallow_clone();
                    (iou_loss, objectness_loss, classification_loss)
                })
                .unzip_n_vec();
            ensure!(!iou_loss_vec.is_empty(), "cannot sum up zero losses");

            let sum = |losses: Vec<Tensor>| {
                let stacked = Tensor::stack(&losses, 0);
                stacked.sum(stacked.kind())
            };
            Ok(Self {
                iou_loss: sum(iou_loss_vec),
                objectness_loss: sum(objectness_loss_vec),
                classification_loss: sum(classification_loss_vec),
            })
        }
    }
}
