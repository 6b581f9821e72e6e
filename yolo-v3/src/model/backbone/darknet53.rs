use super::*;

pub const DARKNET53_CHANNELS: [usize; 3] = [256, 512, 1024];

/// Darknet-53 with residual stages of 1, 2, 8, 8 and 4 blocks.
#[derive(Debug, Clone)]
pub struct Darknet53Init {
    pub in_c: usize,
    pub num_blocks: [usize; 5],
}

impl Default for Darknet53Init {
    fn default() -> Self {
        Self {
            in_c: 3,
            num_blocks: [1, 2, 8, 8, 4],
        }
    }
}

impl Darknet53Init {
    pub fn build<'p, P>(self, path: P) -> Result<Darknet53>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self { in_c, num_blocks } = self;
        ensure!(in_c > 0, "in_c must be positive");

        let stem = ConvBn2DInit::new(in_c, 32, 3).build(path / "stem");

        // each stage doubles the channels and halves the resolution
        let stages = [0, 1, 2, 3, 4].map(|index| {
            let path = path / format!("stage{}", index);
            let in_c = 32 << index;
            let out_c = in_c * 2;

            let downsample = ConvBn2DInit {
                downsample: true,
                ..ConvBn2DInit::new(in_c, out_c, 3)
            }
            .build(&path / "downsample");
            let blocks: Vec<_> = (0..num_blocks[index])
                .map(|block_index| {
                    ResidualInit {
                        in_c: out_c,
                        mid_c: in_c,
                    }
                    .build(&path / format!("residual{}", block_index))
                })
                .collect();

            DarknetStage { downsample, blocks }
        });

        Ok(Darknet53 { stem, stages })
    }
}

#[derive(Debug)]
struct DarknetStage {
    downsample: ConvBn2D,
    blocks: Vec<Residual>,
}

impl DarknetStage {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let xs = self.downsample.forward_t(xs, train);
        self.blocks
            .iter()
            .fold(xs, |xs, block| block.forward_t(&xs, train))
    }
}

#[derive(Debug)]
pub struct Darknet53 {
    stem: ConvBn2D,
    stages: [DarknetStage; 5],
}

impl Darknet53 {
    pub fn forward_t(&self, image: &Tensor, train: bool) -> FeatureMaps {
        let xs = self.stem.forward_t(image, train);

        let [stage1, stage2, stage3, stage4, stage5] = &self.stages;
        let xs = stage1.forward_t(&xs, train);
        let xs = stage2.forward_t(&xs, train);
        let small = stage3.forward_t(&xs, train);
        let medium = stage4.forward_t(&small, train);
        let large = stage5.forward_t(&medium, train);

        FeatureMaps {
            small,
            medium,
            large,
        }
    }
}
