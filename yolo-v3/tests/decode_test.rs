use anyhow::{ensure, Result};
use approx::abs_diff_eq;
use tch::{kind::FLOAT_CPU, nn, Device, Tensor};
use yolo_v3::{
    box_tensor::BoxFormat,
    config::AnchorSize,
    model::{decode, decode_corner, Detect2DInit, DetectKind},
};

const NUM_CLASSES: usize = 2;
const STRIDE: usize = 8;

fn anchors() -> Vec<AnchorSize> {
    vec![AnchorSize::new(1.0, 2.0), AnchorSize::new(3.5, 1.5)]
}

#[test]
fn anchor_decoder_fixed_point() -> Result<()> {
    let _ = pretty_env_logger::try_init();

    let (grid_h, grid_w) = (3, 4);
    let anchors = anchors();
    let raw = Tensor::zeros(&[2, grid_h, grid_w, 2 * (5 + NUM_CLASSES as i64)], FLOAT_CPU);
    let decoded = decode(&raw, &anchors, NUM_CLASSES, STRIDE)?;
    ensure!(decoded.size() == vec![2, grid_h, grid_w, 2, 5 + NUM_CLASSES as i64]);

    let stride = STRIDE as f32;
    for row in 0..grid_h {
        for col in 0..grid_w {
            for (slot, anchor) in anchors.iter().enumerate() {
                let entries = Vec::<f32>::from(&decoded.get(1).get(row).get(col).get(slot as i64));
                let expect = [
                    (col as f32 + 0.5) * stride,
                    (row as f32 + 0.5) * stride,
                    anchor.w.raw() as f32 * stride,
                    anchor.h.raw() as f32 * stride,
                    0.5,
                    0.5,
                    0.5,
                ];
                ensure!(
                    entries
                        .iter()
                        .zip(expect)
                        .all(|(&actual, expect)| abs_diff_eq!(actual, expect, epsilon = 1e-5)),
                    "expect {:?}, but get {:?}",
                    expect,
                    entries
                );
            }
        }
    }
    Ok(())
}

#[test]
fn corner_decoder_fixed_point() -> Result<()> {
    let (grid_h, grid_w) = (2, 3);
    let raw = Tensor::zeros(&[1, grid_h, grid_w, 3 * (5 + NUM_CLASSES as i64)], FLOAT_CPU);
    let decoded = decode_corner(&raw, NUM_CLASSES, STRIDE)?;
    ensure!(decoded.size() == vec![1, grid_h, grid_w, 3, 5 + NUM_CLASSES as i64]);

    let stride = STRIDE as f32;
    for row in 0..grid_h {
        for col in 0..grid_w {
            let entries = Vec::<f32>::from(&decoded.get(0).get(row).get(col).get(2));
            let expect = [
                (col as f32 - 0.5) * stride,
                (row as f32 - 0.5) * stride,
                (col as f32 + 1.5) * stride,
                (row as f32 + 1.5) * stride,
                0.5,
                0.5,
                0.5,
            ];
            ensure!(
                entries
                    .iter()
                    .zip(expect)
                    .all(|(&actual, expect)| abs_diff_eq!(actual, expect, epsilon = 1e-5)),
                "expect {:?}, but get {:?}",
                expect,
                entries
            );
        }
    }
    Ok(())
}

#[test]
fn probabilities_are_bounded() -> Result<()> {
    let raw = Tensor::randn(&[2, 5, 5, 2 * (5 + NUM_CLASSES as i64)], FLOAT_CPU) * 50.0;
    let origin = raw.copy();

    let check = |decoded: &Tensor| -> Result<()> {
        let probs = decoded.narrow(-1, 4, 1 + NUM_CLASSES as i64);
        ensure!(bool::from(probs.ge(0.0).all()));
        ensure!(bool::from(probs.le(1.0).all()));
        Ok(())
    };
    check(&decode(&raw, &anchors(), NUM_CLASSES, STRIDE)?)?;
    check(&decode_corner(&raw, NUM_CLASSES, STRIDE)?)?;

    // decoding leaves the raw output intact
    ensure!(raw.equal(&origin));
    Ok(())
}

#[test]
fn detect_2d_reports_box_format() -> Result<()> {
    let vs = nn::VarStore::new(Device::Cpu);
    let root = vs.root();

    let anchor_detect = Detect2DInit {
        num_classes: NUM_CLASSES,
        stride: STRIDE,
        kind: DetectKind::Anchor { anchors: anchors() },
    }
    .build(&root / "anchor")?;
    let corner_detect = Detect2DInit {
        num_classes: NUM_CLASSES,
        stride: STRIDE,
        kind: DetectKind::Corner { slots: 2 },
    }
    .build(&root / "corner")?;

    let raw = Tensor::randn(&[1, 4, 4, 2 * (5 + NUM_CLASSES as i64)], FLOAT_CPU).permute(&[0, 2, 1, 3]);

    let output = anchor_detect.forward(&raw)?;
    ensure!(output.box_format() == BoxFormat::Xywh);
    ensure!(output.raw().size() == output.decoded().size());
    ensure!(output.grid_size() == [4, 4]);
    ensure!(output.num_slots() == 2);

    let output = corner_detect.forward(&raw)?;
    ensure!(output.box_format() == BoxFormat::Xyxy);
    ensure!(output.stride() == STRIDE as i64);

    // three slots are requested by the raw output, but the detector has two
    let raw = Tensor::zeros(&[1, 4, 4, 3 * (5 + NUM_CLASSES as i64)], FLOAT_CPU);
    ensure!(corner_detect.forward(&raw).is_err());
    Ok(())
}
