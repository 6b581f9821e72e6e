use super::{
    backbone::{Backbone, BackboneInit},
    head::{Head, HeadInit},
    module::*,
};
use crate::{
    common::*,
    config::{BackboneKind, Config},
    error::BuildError,
    label::ScaleLabel,
    loss::{YoloLoss, YoloLossInit, YoloLossOutput},
};

#[derive(Debug, Clone)]
pub struct YoloV3Init {
    pub config: Config,
}

impl YoloV3Init {
    pub fn build<'p, P>(self, path: P) -> Result<YoloV3, BuildError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self { config } = self;
        config.validate().map_err(BuildError::config)?;

        let Config {
            num_classes,
            strides,
            ref anchors,
            upsample_method,
            backbone: backbone_kind,
            gt_per_grid,
            ..
        } = config;

        let backbone = BackboneInit {
            kind: backbone_kind,
        }
        .build(path / "backbone")
        .map_err(|err| BuildError::backbone(backbone_kind, err))?;

        let head = HeadInit {
            style: backbone_kind.into(),
            feature_channels: backbone.feature_channels(),
            out_c: config.slots_per_scale() * config.num_entries(),
            upsample_method,
        }
        .build(path / "head")
        .map_err(BuildError::head)?;

        let detects: Vec<_> = izip!(0.., strides, anchors)
            .map(|(index, stride, anchors)| {
                let kind = match backbone_kind {
                    BackboneKind::Darknet53 => DetectKind::Anchor {
                        anchors: anchors.clone(),
                    },
                    BackboneKind::MobileNetV2 => DetectKind::Corner { slots: gt_per_grid },
                };
                Detect2DInit {
                    num_classes,
                    stride,
                    kind,
                }
                .build(path / format!("detect{}", index))
            })
            .try_collect()
            .map_err(BuildError::head)?;
        let [detect_small, detect_medium, detect_large]: [Detect2D; 3] = detects
            .try_into()
            .map_err(|_| BuildError::head(format_err!("expect exactly 3 detectors")))?;

        let loss = YoloLossInit::from_config(&config)
            .build()
            .map_err(BuildError::config)?;

        info!(
            "built YOLOv3 with {} backbone, {} classes and {} slots per cell",
            backbone_kind,
            num_classes,
            config.slots_per_scale()
        );

        Ok(YoloV3 {
            config,
            backbone,
            head,
            detects: [detect_small, detect_medium, detect_large],
            loss,
        })
    }
}

/// The YOLOv3 detector over a Darknet-53 or MobileNetV2 backbone.
#[derive(Debug, Getters)]
pub struct YoloV3 {
    #[get = "pub"]
    config: Config,
    backbone: Backbone,
    head: Head,
    /// Decoders of the small, medium and large scales.
    detects: [Detect2D; 3],
    loss: YoloLoss,
}

impl YoloV3 {
    /// Run the network on a `[batch, 3, height, width]` image batch.
    pub fn forward_t(&self, image: &Tensor, train: bool) -> Result<YoloOutput> {
        let features = self.backbone.forward_t(image, train)?;
        let [small, medium, large] = self.head.forward_t(&features, train)?;
        let [detect_small, detect_medium, detect_large] = &self.detects;

        Ok(YoloOutput {
            small: detect_small.forward(&small)?,
            medium: detect_medium.forward(&medium)?,
            large: detect_large.forward(&large)?,
        })
    }

    /// Compute the loss against labels of the small, medium and large scales.
    pub fn compute_loss(
        &self,
        output: &YoloOutput,
        labels: &[ScaleLabel; 3],
    ) -> Result<YoloLossOutput> {
        self.loss.compute_loss(output, labels)
    }
}

/// Predictions of the three output scales.
#[derive(Debug, TensorLike)]
pub struct YoloOutput {
    /// Stride 8 predictions.
    pub small: Detect2DOutput,
    /// Stride 16 predictions.
    pub medium: Detect2DOutput,
    /// Stride 32 predictions.
    pub large: Detect2DOutput,
}

impl YoloOutput {
    pub fn scales(&self) -> [&Detect2DOutput; 3] {
        [&self.small, &self.medium, &self.large]
    }
}
