//! Generator network for DCGAN
//!
//! The Generator transforms latent noise vectors into images.
//! Architecture uses transposed 2D convolutions to upsample a 1×1 latent
//! volume to a 64×64 image.

use tch::{nn, nn::ModuleT, Device, Kind, Tensor};

use super::network::Network;
use crate::error::{GanError, Result};

/// Spatial side of every synthesized image
pub const IMAGE_SIZE: i64 = 64;

/// Generator network configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Size of the latent noise vector
    pub latent_dim: i64,
    /// Number of output image channels
    pub channels: i64,
    /// Channels of the 4×4 volume produced by the projection stage
    pub base_filters: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            latent_dim: 100,
            channels: 3,
            base_filters: 1024,
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if self.channels <= 0 {
            return Err(GanError::shape(
                "generator channels",
                "a positive channel count",
                vec![self.channels],
            ));
        }
        if self.latent_dim <= 0 {
            return Err(GanError::shape(
                "generator latent_dim",
                "a positive latent length",
                vec![self.latent_dim],
            ));
        }
        if self.base_filters < 8 || self.base_filters % 8 != 0 {
            return Err(GanError::Config(format!(
                "generator base_filters must be a positive multiple of 8, got {}",
                self.base_filters
            )));
        }
        Ok(())
    }
}

fn tr2d(p: nn::Path, c_in: i64, c_out: i64, stride: i64, padding: i64) -> nn::ConvTranspose2D {
    let cfg = nn::ConvTransposeConfig {
        stride,
        padding,
        ..Default::default()
    };
    nn::conv_transpose2d(p, c_in, c_out, 4, cfg)
}

/// Generator network
///
/// Architecture:
/// 1. Stride-1 projection of the latent volume to `base_filters`×4×4
/// 2. Three stride-2 ConvTranspose2d stages halving channels, each with
///    BatchNorm and ReLU
/// 3. Final stride-2 ConvTranspose2d to `channels`×64×64 with Tanh
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    vs: nn::VarStore,
    net: nn::SequentialT,
}

impl Generator {
    /// Create a new Generator with its own variable store on `device`
    pub fn new(config: GeneratorConfig, device: Device) -> Result<Self> {
        config.validate()?;

        let vs = nn::VarStore::new(device);
        let net = Self::build(&vs.root(), &config);

        Ok(Self { config, vs, net })
    }

    fn build(root: &nn::Path, config: &GeneratorConfig) -> nn::SequentialT {
        let base = config.base_filters;

        // (latent x 1 x 1) -> (base x 4 x 4)
        nn::seq_t()
            .add(tr2d(root / "tr1", config.latent_dim, base, 1, 0))
            .add(nn::batch_norm2d(root / "bn1", base, Default::default()))
            .add_fn(Tensor::relu)
            // -> (base/2 x 8 x 8)
            .add(tr2d(root / "tr2", base, base / 2, 2, 1))
            .add(nn::batch_norm2d(root / "bn2", base / 2, Default::default()))
            .add_fn(Tensor::relu)
            // -> (base/4 x 16 x 16)
            .add(tr2d(root / "tr3", base / 2, base / 4, 2, 1))
            .add(nn::batch_norm2d(root / "bn3", base / 4, Default::default()))
            .add_fn(Tensor::relu)
            // -> (base/8 x 32 x 32)
            .add(tr2d(root / "tr4", base / 4, base / 8, 2, 1))
            .add(nn::batch_norm2d(root / "bn4", base / 8, Default::default()))
            .add_fn(Tensor::relu)
            // -> (channels x 64 x 64)
            .add(tr2d(root / "tr5", base / 8, config.channels, 2, 1))
            .add_fn(Tensor::tanh)
    }

    /// Synthesize images from latent vectors
    ///
    /// # Arguments
    ///
    /// * `latent` - Tensor of shape (batch, latent_dim) or (batch, latent_dim, 1, 1)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch, channels, 64, 64) with values in [-1, 1]
    pub fn synthesize(&self, latent: &Tensor, train: bool) -> Result<Tensor> {
        let z = self.latent_volume(latent)?;
        Ok(self.net.forward_t(&z, train))
    }

    /// Synthesize in inference mode
    pub fn generate(&self, latent: &Tensor) -> Result<Tensor> {
        self.synthesize(latent, false)
    }

    fn latent_volume(&self, latent: &Tensor) -> Result<Tensor> {
        let size = latent.size();
        let dim = self.config.latent_dim;
        match size.as_slice() {
            [batch, l] if *l == dim => Ok(latent.view([*batch, dim, 1, 1])),
            [_, l, 1, 1] if *l == dim => Ok(latent.shallow_clone()),
            _ => Err(GanError::shape(
                "generator input",
                format!("(batch, {dim}) or (batch, {dim}, 1, 1)"),
                size,
            )),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    /// Latent noise of shape (batch, latent_dim, 1, 1) on this network's device
    pub fn noise(&self, batch_size: i64, distribution: LatentDistribution) -> Tensor {
        let shape = [batch_size, self.config.latent_dim, 1, 1];
        let options = (Kind::Float, self.device());
        match distribution {
            LatentDistribution::Normal => Tensor::randn(shape, options),
            LatentDistribution::Uniform => Tensor::rand(shape, options),
        }
    }
}

impl Network for Generator {
    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

/// Distribution latent vectors are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatentDistribution {
    /// Standard normal
    #[default]
    Normal,
    /// Uniform on [0, 1)
    Uniform,
}
