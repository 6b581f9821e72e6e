use anyhow::{ensure, Result};
use std::path::{Path, PathBuf};
use tch::{kind::FLOAT_CPU, nn, Device, Tensor};
use yolo_v3::{
    box_tensor::BoxFormat,
    config::{BackboneKind, UpsampleMethod},
    label::{GroundTruthBoxes, ScaleLabel},
    BuildError, Config, YoloV3Init,
};

lazy_static::lazy_static! {
    static ref CONFIG_DIR: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cfg");
}

#[test]
fn darknet53_forward_shapes() -> Result<()> {
    let _ = pretty_env_logger::try_init();

    let config = Config {
        num_classes: 2,
        input_size: 64,
        ..Default::default()
    };
    let vs = nn::VarStore::new(Device::Cpu);
    let model = YoloV3Init { config }.build(&vs.root())?;

    let image = Tensor::rand(&[1, 3, 64, 64], FLOAT_CPU);
    let output = model.forward_t(&image, false)?;

    let expect_sizes: [i64; 3] = [8, 4, 2];
    ensure!(output
        .scales()
        .iter()
        .zip(expect_sizes)
        .all(|(scale, grid)| scale.decoded().size() == vec![1, grid, grid, 3, 7]
            && scale.box_format() == BoxFormat::Xywh));
    Ok(())
}

#[test]
fn mobilenet_v2_forward_and_loss() -> Result<()> {
    let config = Config::open(CONFIG_DIR.join("yolov3-mobile.json5"))?;
    ensure!(config.backbone == BackboneKind::MobileNetV2);
    ensure!(config.upsample_method == UpsampleMethod::Deconv);

    let vs = nn::VarStore::new(Device::Cpu);
    let model = YoloV3Init {
        config: config.clone(),
    }
    .build(&vs.root())?;

    let image = Tensor::rand(&[2, 3, 64, 64], FLOAT_CPU);
    let output = model.forward_t(&image, true)?;

    let num_entries = config.num_entries() as i64;
    let labels = config
        .grid_sizes()
        .map(|grid| -> Result<ScaleLabel> {
            let grid = grid as i64;
            // unassigned cells with unit mix weight
            let label = Tensor::cat(
                &[
                    Tensor::zeros(&[2, grid, grid, 2, num_entries], FLOAT_CPU),
                    Tensor::ones(&[2, grid, grid, 2, 1], FLOAT_CPU),
                ],
                -1,
            );
            let gt_boxes = GroundTruthBoxes::from_tensor(Tensor::zeros(&[2, 4, 4], FLOAT_CPU))?;
            ScaleLabel::new(label, gt_boxes)
        });
    let [small, medium, large] = labels;
    let labels = [small?, medium?, large?];

    ensure!(output
        .scales()
        .iter()
        .all(|scale| scale.box_format() == BoxFormat::Xyxy && scale.num_slots() == 2));

    let loss = model.compute_loss(&output, &labels)?;
    ensure!(f64::from(&loss.iou_loss) == 0.0);
    ensure!(f64::from(&loss.classification_loss) == 0.0);
    let objectness_loss = f64::from(&loss.objectness_loss);
    ensure!(objectness_loss.is_finite() && objectness_loss > 0.0);
    Ok(())
}

#[test]
fn invalid_config_fails_to_build() {
    let config = Config {
        input_size: 100,
        ..Default::default()
    };
    let vs = nn::VarStore::new(Device::Cpu);
    let result = YoloV3Init { config }.build(&vs.root());
    assert!(matches!(result, Err(BuildError::Config { .. })));
}
