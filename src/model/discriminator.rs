//! Discriminator network for DCGAN
//!
//! The Discriminator classifies images as real or fake.
//! Architecture uses strided 2D convolutions to downsample and extract features.

use tch::{nn, nn::ModuleT, Device, Kind, Tensor};

use super::network::Network;
use crate::error::{GanError, Result};

/// Smallest spatial side the final 4×4 reduction accepts
pub const MIN_IMAGE_SIZE: i64 = 64;

const LEAKY_SLOPE: f64 = 0.2;

/// Discriminator network configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorConfig {
    /// Number of input image channels
    pub channels: i64,
    /// Channels after the first downsampling stage
    pub base_filters: i64,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            channels: 3,
            base_filters: 256,
        }
    }
}

impl DiscriminatorConfig {
    fn validate(&self) -> Result<()> {
        if self.channels <= 0 {
            return Err(GanError::shape(
                "discriminator channels",
                "a positive channel count",
                vec![self.channels],
            ));
        }
        if self.base_filters <= 0 {
            return Err(GanError::Config(format!(
                "discriminator base_filters must be positive, got {}",
                self.base_filters
            )));
        }
        Ok(())
    }
}

fn conv2d(p: nn::Path, c_in: i64, c_out: i64, stride: i64, padding: i64) -> nn::Conv2D {
    let cfg = nn::ConvConfig {
        stride,
        padding,
        ..Default::default()
    };
    nn::conv2d(p, c_in, c_out, 4, cfg)
}

fn leaky_relu(x: &Tensor) -> Tensor {
    x.maximum(&(x * LEAKY_SLOPE))
}

/// Discriminator network
///
/// Architecture:
/// 1. Four stride-2 Conv2d stages doubling channels (C→b→2b→4b→8b) with
///    LeakyReLU(0.2), BatchNorm on all but the first
/// 2. Stride-1 4×4 Conv2d to a single channel, then Sigmoid
#[derive(Debug)]
pub struct Discriminator {
    config: DiscriminatorConfig,
    vs: nn::VarStore,
    net: nn::SequentialT,
}

impl Discriminator {
    /// Create a new Discriminator with its own variable store on `device`
    pub fn new(config: DiscriminatorConfig, device: Device) -> Result<Self> {
        config.validate()?;

        let vs = nn::VarStore::new(device);
        let net = Self::build(&vs.root(), &config);

        Ok(Self { config, vs, net })
    }

    fn build(root: &nn::Path, config: &DiscriminatorConfig) -> nn::SequentialT {
        let base = config.base_filters;

        nn::seq_t()
            // (C x H x W) -> (b x H/2 x W/2)
            .add(conv2d(root / "conv1", config.channels, base, 2, 1))
            .add_fn(leaky_relu)
            // -> (2b x H/4 x W/4)
            .add(conv2d(root / "conv2", base, base * 2, 2, 1))
            .add(nn::batch_norm2d(root / "bn2", base * 2, Default::default()))
            .add_fn(leaky_relu)
            // -> (4b x H/8 x W/8)
            .add(conv2d(root / "conv3", base * 2, base * 4, 2, 1))
            .add(nn::batch_norm2d(root / "bn3", base * 4, Default::default()))
            .add_fn(leaky_relu)
            // -> (8b x H/16 x W/16)
            .add(conv2d(root / "conv4", base * 4, base * 8, 2, 1))
            .add(nn::batch_norm2d(root / "bn4", base * 8, Default::default()))
            .add_fn(leaky_relu)
            // -> (1 x H/16-3 x W/16-3)
            .add(conv2d(root / "output", base * 8, 1, 1, 0))
            .add_fn(Tensor::sigmoid)
    }

    /// Classify images
    ///
    /// # Arguments
    ///
    /// * `images` - Tensor of shape (batch, channels, H, W), H and W divisible
    ///   by 16 and at least 64
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch) with the probability of each image being real.
    /// Inputs larger than 64×64 produce a score map per image, which is averaged.
    pub fn classify(&self, images: &Tensor, train: bool) -> Result<Tensor> {
        self.check_input(images)?;

        let scores = self.net.forward_t(images, train);
        let batch = scores.size()[0];
        let scores = scores.view([batch, -1]);
        if scores.size()[1] == 1 {
            Ok(scores.view([batch]))
        } else {
            Ok(scores.mean_dim(Some([1i64].as_slice()), false, Kind::Float))
        }
    }

    fn check_input(&self, images: &Tensor) -> Result<()> {
        let size = images.size();
        let channels = self.config.channels;
        let valid_side = |s: i64| s >= MIN_IMAGE_SIZE && s % 16 == 0;
        match size.as_slice() {
            [_, c, h, w] if *c == channels && valid_side(*h) && valid_side(*w) => Ok(()),
            _ => Err(GanError::shape(
                "discriminator input",
                format!("(batch, {channels}, H, W) with H, W >= {MIN_IMAGE_SIZE} and divisible by 16"),
                size,
            )),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }
}

impl Network for Discriminator {
    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}
