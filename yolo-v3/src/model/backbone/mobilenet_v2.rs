use super::*;

pub const MOBILENET_V2_CHANNELS: [usize; 3] = [32, 96, 1280];

/// Inverted residual settings `(out_c, expansion, repeats, first block downsamples)`.
const MOBILENET_V2_SETTINGS: [(usize, usize, usize, bool); 7] = [
    (16, 1, 1, false),
    (24, 6, 2, true),
    (32, 6, 3, true),
    (64, 6, 4, true),
    (96, 6, 3, false),
    (160, 6, 3, true),
    (320, 6, 1, false),
];

#[derive(Debug, Clone)]
pub struct MobileNetV2Init {
    pub in_c: usize,
}

impl Default for MobileNetV2Init {
    fn default() -> Self {
        Self { in_c: 3 }
    }
}

impl MobileNetV2Init {
    pub fn build<'p, P>(self, path: P) -> Result<MobileNetV2>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self { in_c } = self;
        ensure!(in_c > 0, "in_c must be positive");

        let stem = ConvBn2DInit {
            downsample: true,
            activation: Activation::Relu6,
            ..ConvBn2DInit::new(in_c, 32, 3)
        }
        .build(path / "stem");

        let (blocks, _out_c) = MOBILENET_V2_SETTINGS.iter().fold(
            (vec![], 32),
            |(mut blocks, in_c), &(out_c, expansion, repeats, downsample)| {
                (0..repeats).for_each(|repeat| {
                    let block_in_c = if repeat == 0 { in_c } else { out_c };
                    let block = InvertedResidualInit {
                        in_c: block_in_c,
                        out_c,
                        expansion,
                        downsample: downsample && repeat == 0,
                    }
                    .build(path / format!("block{}", blocks.len()));
                    blocks.push(block);
                });
                (blocks, out_c)
            },
        );

        let last = ConvBn2DInit {
            activation: Activation::Relu6,
            ..ConvBn2DInit::new(320, MOBILENET_V2_CHANNELS[2], 1)
        }
        .build(path / "last");

        Ok(MobileNetV2 { stem, blocks, last })
    }
}

#[derive(Debug)]
pub struct MobileNetV2 {
    stem: ConvBn2D,
    blocks: Vec<InvertedResidual>,
    last: ConvBn2D,
}

impl MobileNetV2 {
    /// Indexes of the blocks whose outputs are the stride 8 and 16 features.
    const SMALL_INDEX: usize = 5;
    const MEDIUM_INDEX: usize = 12;

    pub fn forward_t(&self, image: &Tensor, train: bool) -> FeatureMaps {
        let xs = self.stem.forward_t(image, train);

        let run = |xs: Tensor, blocks: &[InvertedResidual]| {
            blocks
                .iter()
                .fold(xs, |xs, block| block.forward_t(&xs, train))
        };

        let small = run(xs, &self.blocks[..=Self::SMALL_INDEX]);
        let medium = run(
            small.shallow_clone(),
            &self.blocks[(Self::SMALL_INDEX + 1)..=Self::MEDIUM_INDEX],
        );
        let xs = run(
            medium.shallow_clone(),
            &self.blocks[(Self::MEDIUM_INDEX + 1)..],
        );
        let large = self.last.forward_t(&xs, train);

        FeatureMaps {
            small,
            medium,
            large,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobilenet_v2_feature_sizes() -> Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let backbone = MobileNetV2Init::default().build(&vs.root())?;
        ensure!(backbone.blocks.len() == 17);

        let image = Tensor::randn(&[1, 3, 64, 64], tch::kind::FLOAT_CPU);
        let FeatureMaps {
            small,
            medium,
            large,
        } = backbone.forward_t(&image, false);

        ensure!(small.size() == vec![1, 32, 8, 8]);
        ensure!(medium.size() == vec![1, 96, 4, 4]);
        ensure!(large.size() == vec![1, 1280, 2, 2]);
        Ok(())
    }
}
