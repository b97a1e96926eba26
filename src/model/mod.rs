//! Model module containing GAN architecture components
//!
//! This module provides:
//! - Generator network mapping latent noise to 64×64 images
//! - Discriminator network scoring images as real or fake
//! - DCGAN wrapper combining both networks

mod dcgan;
mod discriminator;
mod generator;
mod network;

pub use dcgan::{DCGAN, DISCRIMINATOR_FILE, GENERATOR_FILE};
pub use discriminator::{Discriminator, DiscriminatorConfig, MIN_IMAGE_SIZE};
pub use generator::{Generator, GeneratorConfig, LatentDistribution, IMAGE_SIZE};
pub use network::{snapshots_equal, Network};
