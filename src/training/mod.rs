//! Training module for DCGAN
//!
//! This module provides:
//! - Per-batch discriminator and generator updates
//! - The epoch loop and its logging/checkpoint side effects
//! - Loss functions (Binary Cross Entropy)
//! - Training configuration and metrics

mod effects;
mod losses;
mod metrics;
mod optimizer;
mod state;
mod trainer;

pub use effects::{
    format_progress, CheckpointSink, EffectRunner, RecordingCheckpoints, RecordingLogger,
    TrainingEffect, TrainingLogger,
};
pub use losses::{discriminator_loss, generator_loss};
pub use metrics::TrainingMetrics;
pub use optimizer::NetworkOptimizer;
pub use state::{Phase, TrainerState};
pub use trainer::{
    discriminator_step, generator_step, DiscriminatorUpdate, StepLosses, StepOutcome, Trainer,
    TrainingConfig,
};
