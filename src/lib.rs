//! # DCGAN for Image Synthesis
//!
//! This crate provides a modular implementation of Deep Convolutional Generative
//! Adversarial Networks (DCGAN) that learn to synthesize 64×64 images.
//!
//! ## Modules
//!
//! - `data`: Batch sources feeding real images to the trainer
//! - `model`: DCGAN architecture (Generator and Discriminator)
//! - `training`: Per-batch updates, the epoch loop and its side effects
//! - `latent_walk`: Contact sheets of blended latent vectors
//! - `utils`: Configuration, checkpoints, logging and image helpers

pub mod data;
pub mod error;
pub mod latent_walk;
pub mod model;
pub mod training;
pub mod utils;

pub use data::{BatchSource, ImageDataLoader};
pub use error::{GanError, Result};
pub use latent_walk::{walk_alphas, LatentWalk};
pub use model::{DCGAN, Discriminator, Generator};
pub use training::{Trainer, TrainerState, TrainingConfig, TrainingMetrics};
pub use utils::{load_checkpoint, save_checkpoint, CheckpointStore, Config, FileLogger};
