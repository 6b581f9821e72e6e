//! Model configuration format.

use crate::common::*;

pub use anchor::*;
pub use focal::*;

/// The detector configuration, fixed at model-construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// The number of object classes.
    pub num_classes: usize,
    /// The side length of the square input image in pixels.
    pub input_size: usize,
    /// Strides of the small, medium and large scale outputs.
    pub strides: [usize; 3],
    /// The number of anchors per scale for the anchor-based head.
    pub anchor_per_scale: usize,
    /// Anchor sizes in grid units, one set per scale.
    pub anchors: [Vec<AnchorSize>; 3],
    /// Predictions overlapping any ground truth above this IoU are not penalized as background.
    pub iou_loss_thresh: R64,
    pub upsample_method: UpsampleMethod,
    pub backbone: BackboneKind,
    /// The number of prediction slots per cell for the anchor-free head.
    pub gt_per_grid: usize,
    #[serde(default)]
    pub focal: FocalConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Self = json5::from_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let Self {
            num_classes,
            input_size,
            strides,
            anchor_per_scale,
            ref anchors,
            iou_loss_thresh,
            gt_per_grid,
            ref focal,
            ..
        } = *self;

        ensure!(num_classes > 0, "num_classes must be positive");
        ensure!(input_size > 0, "input_size must be positive");
        ensure!(
            strides.iter().all(|&stride| stride > 0),
            "strides must be positive"
        );
        ensure!(
            strides[0] < strides[1] && strides[1] < strides[2],
            "strides must be strictly increasing, but get {:?}",
            strides
        );
        strides.iter().try_for_each(|&stride| -> Result<()> {
            ensure!(
                input_size % stride == 0,
                "input_size {} is not divisible by stride {}",
                input_size,
                stride
            );
            Ok(())
        })?;
        ensure!(anchor_per_scale > 0, "anchor_per_scale must be positive");
        anchors
            .iter()
            .enumerate()
            .try_for_each(|(scale, anchors)| -> Result<()> {
                ensure!(
                    anchors.len() == anchor_per_scale,
                    "expect {} anchors for scale {}, but get {}",
                    anchor_per_scale,
                    scale,
                    anchors.len()
                );
                ensure!(
                    anchors.iter().all(|anchor| anchor.w > 0.0 && anchor.h > 0.0),
                    "anchor sizes must be positive"
                );
                Ok(())
            })?;
        ensure!(
            (0.0..=1.0).contains(&iou_loss_thresh.raw()),
            "iou_loss_thresh must be in range [0, 1]"
        );
        ensure!(gt_per_grid > 0, "gt_per_grid must be positive");
        focal.validate()?;
        Ok(())
    }

    /// The number of entries per prediction slot, `5 + num_classes`.
    pub fn num_entries(&self) -> usize {
        self.num_classes + 5
    }

    /// The number of prediction slots per grid cell.
    pub fn slots_per_scale(&self) -> usize {
        match self.backbone {
            BackboneKind::Darknet53 => self.anchor_per_scale,
            BackboneKind::MobileNetV2 => self.gt_per_grid,
        }
    }

    /// Grid sizes of the small, medium and large scale outputs.
    pub fn grid_sizes(&self) -> [usize; 3] {
        let [s, m, l] = self.strides;
        [self.input_size / s, self.input_size / m, self.input_size / l]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_classes: 80,
            input_size: 416,
            strides: [8, 16, 32],
            anchor_per_scale: 3,
            anchors: baseline_anchors(),
            iou_loss_thresh: r64(0.5),
            upsample_method: UpsampleMethod::Resize,
            backbone: BackboneKind::Darknet53,
            gt_per_grid: 3,
            focal: FocalConfig::default(),
        }
    }
}

/// The feature extractor variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum BackboneKind {
    #[serde(rename = "darknet53")]
    Darknet53,
    /// Uses the anchor-free corner decoder.
    #[serde(rename = "mobilenet_v2")]
    MobileNetV2,
}

/// The upsampling operator used between head scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsampleMethod {
    /// Nearest-neighbour resize by a factor of 2.
    Resize,
    /// Learned transposed convolution with kernel 2 and stride 2.
    Deconv,
}

mod anchor {
    use super::*;

    /// Anchor size in grid units.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AnchorSize {
        pub w: R64,
        pub h: R64,
    }

    impl AnchorSize {
        pub fn new(w: f64, h: f64) -> Self {
            Self { w: r64(w), h: r64(h) }
        }
    }

    /// Anchors of the COCO-trained YOLOv3 in grid units.
    pub fn baseline_anchors() -> [Vec<AnchorSize>; 3] {
        [
            vec![
                AnchorSize::new(1.25, 1.625),
                AnchorSize::new(2.0, 3.75),
                AnchorSize::new(4.125, 2.875),
            ],
            vec![
                AnchorSize::new(1.875, 3.8125),
                AnchorSize::new(3.875, 2.8125),
                AnchorSize::new(3.6875, 7.4375),
            ],
            vec![
                AnchorSize::new(3.625, 2.8125),
                AnchorSize::new(4.875, 6.1875),
                AnchorSize::new(11.65625, 10.1875),
            ],
        ]
    }
}

mod focal {
    use super::*;

    /// Coefficients of the objectness focal weight `alpha * |target - prob|^gamma`.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FocalConfig {
        pub alpha: R64,
        pub gamma: R64,
    }

    impl FocalConfig {
        pub fn validate(&self) -> Result<()> {
            ensure!(self.alpha >= 0.0, "focal alpha must be non-negative");
            ensure!(self.gamma >= 0.0, "focal gamma must be non-negative");
            Ok(())
        }
    }

    impl Default for FocalConfig {
        fn default() -> Self {
            Self {
                alpha: r64(1.0),
                gamma: r64(2.0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() -> Result<()> {
        let config = Config::default();
        config.validate()?;
        ensure!(config.grid_sizes() == [52, 26, 13]);
        ensure!(config.num_entries() == 85);
        ensure!(config.slots_per_scale() == 3);
        Ok(())
    }

    #[test]
    fn config_serde_test() -> Result<()> {
        let config = Config {
            backbone: BackboneKind::MobileNetV2,
            upsample_method: UpsampleMethod::Deconv,
            gt_per_grid: 2,
            ..Default::default()
        };
        let text = serde_json::to_string_pretty(&config)?;
        ensure!(text.contains("\"mobilenet_v2\""));
        ensure!(text.contains("\"deconv\""));
        let recovered: Config = serde_json::from_str(&text)?;
        ensure!(recovered == config);
        ensure!(recovered.slots_per_scale() == 2);
        Ok(())
    }

    #[test]
    fn open_json5_config() -> Result<()> {
        let text = r#"{
            // a single-class detector
            num_classes: 1,
            input_size: 320,
            strides: [8, 16, 32],
            anchor_per_scale: 1,
            anchors: [[{ w: 1.0, h: 2.0 }], [{ w: 2.0, h: 1.0 }], [{ w: 3.0, h: 3.0 }]],
            iou_loss_thresh: 0.45,
            upsample_method: "resize",
            backbone: "darknet53",
            gt_per_grid: 3,
        }"#;
        let path = std::env::temp_dir().join(format!("yolo-v3-config-{}.json5", std::process::id()));
        std::fs::write(&path, text)?;
        let config = Config::open(&path);
        std::fs::remove_file(&path)?;
        let config = config?;

        ensure!(config.num_classes == 1);
        ensure!(config.focal == FocalConfig::default());
        ensure!(config.grid_sizes() == [40, 20, 10]);
        Ok(())
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let bad_stride = Config {
            input_size: 420,
            ..Default::default()
        };
        assert!(bad_stride.validate().is_err());

        let mut bad_anchors = Config::default();
        bad_anchors.anchors[1].pop();
        assert!(bad_anchors.validate().is_err());

        let bad_thresh = Config {
            iou_loss_thresh: r64(1.5),
            ..Default::default()
        };
        assert!(bad_thresh.validate().is_err());

        let bad_order = Config {
            strides: [16, 8, 32],
            ..Default::default()
        };
        assert!(bad_order.validate().is_err());
    }
}
