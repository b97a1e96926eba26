//! DCGAN wrapper combining Generator and Discriminator
//!
//! Owns both networks and handles persisting their parameter sets.

use std::path::Path;

use tch::{Device, Tensor};

use super::discriminator::{Discriminator, DiscriminatorConfig};
use super::generator::{Generator, GeneratorConfig, LatentDistribution};
use super::network::Network;
use crate::error::Result;
use crate::utils::config::ModelConfig;

/// File name of the generator weights inside a checkpoint
pub const GENERATOR_FILE: &str = "generator.ot";
/// File name of the discriminator weights inside a checkpoint
pub const DISCRIMINATOR_FILE: &str = "discriminator.ot";

/// Complete DCGAN model
#[derive(Debug)]
pub struct DCGAN {
    /// Generator network
    pub generator: Generator,
    /// Discriminator network
    pub discriminator: Discriminator,
}

impl DCGAN {
    /// Create a new DCGAN model
    ///
    /// # Arguments
    ///
    /// * `gen_config` - Generator configuration
    /// * `disc_config` - Discriminator configuration
    /// * `device` - Device to create model on
    pub fn new(
        gen_config: GeneratorConfig,
        disc_config: DiscriminatorConfig,
        device: Device,
    ) -> Result<Self> {
        Ok(Self {
            generator: Generator::new(gen_config, device)?,
            discriminator: Discriminator::new(disc_config, device)?,
        })
    }

    /// Create DCGAN from the model section of the configuration
    pub fn from_config(config: &ModelConfig, device: Device) -> Result<Self> {
        let gen_config = GeneratorConfig {
            latent_dim: config.latent_dim,
            channels: config.channels,
            base_filters: config.generator_filters,
        };
        let disc_config = DiscriminatorConfig {
            channels: config.channels,
            base_filters: config.discriminator_filters,
        };
        Self::new(gen_config, disc_config, device)
    }

    /// Generate `num_samples` images from fresh normal noise
    pub fn generate(&self, num_samples: i64) -> Result<Tensor> {
        let noise = self.generator.noise(num_samples, LatentDistribution::Normal);
        self.generator.generate(&noise)
    }

    /// Probability of each image being real (inference mode)
    pub fn discriminate(&self, images: &Tensor) -> Result<Tensor> {
        self.discriminator.classify(images, false)
    }

    /// Save both parameter sets into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.generator.var_store().save(dir.join(GENERATOR_FILE))?;
        self.discriminator
            .var_store()
            .save(dir.join(DISCRIMINATOR_FILE))?;
        Ok(())
    }

    /// Load both parameter sets from `dir`
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        self.generator
            .var_store_mut()
            .load(dir.join(GENERATOR_FILE))?;
        self.discriminator
            .var_store_mut()
            .load(dir.join(DISCRIMINATOR_FILE))?;
        Ok(())
    }

    /// Get latent dimension
    pub fn latent_dim(&self) -> i64 {
        self.generator.config().latent_dim
    }

    /// Get number of image channels
    pub fn channels(&self) -> i64 {
        self.generator.config().channels
    }

    pub fn device(&self) -> Device {
        self.generator.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Kind;

    fn tiny() -> ModelConfig {
        ModelConfig {
            latent_dim: 100,
            channels: 3,
            generator_filters: 16,
            discriminator_filters: 4,
        }
    }

    #[test]
    fn test_dcgan_creation() {
        let dcgan = DCGAN::from_config(&tiny(), Device::Cpu).unwrap();

        assert_eq!(dcgan.latent_dim(), 100);
        assert_eq!(dcgan.channels(), 3);
    }

    #[test]
    fn test_dcgan_generate_and_discriminate() {
        let dcgan = DCGAN::from_config(&tiny(), Device::Cpu).unwrap();

        let samples = dcgan.generate(4).unwrap();
        assert_eq!(samples.size(), vec![4, 3, 64, 64]);

        let probs = dcgan.discriminate(&samples).unwrap();
        assert_eq!(probs.size(), vec![4]);
    }

    #[test]
    fn test_dcgan_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let original = DCGAN::from_config(&tiny(), Device::Cpu).unwrap();
        original.save(dir.path()).unwrap();

        let mut restored = DCGAN::from_config(&tiny(), Device::Cpu).unwrap();
        restored.load(dir.path()).unwrap();

        let z = Tensor::randn([2, 100, 1, 1], (Kind::Float, Device::Cpu));
        let a = original.generator.generate(&z).unwrap();
        let b = restored.generator.generate(&z).unwrap();
        assert!(a.equal(&b));

        let pa = original.discriminate(&a).unwrap();
        let pb = restored.discriminate(&a).unwrap();
        assert!(pa.equal(&pb));
    }
}
