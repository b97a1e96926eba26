//! Side effects requested by the training loop
//!
//! A training step only describes what should be logged or persisted; the
//! [`EffectRunner`] carries it out against a logger and a checkpoint sink.

use std::collections::BTreeMap;

use tch::Tensor;
use tracing::info;

use crate::error::Result;
use crate::model::DCGAN;

/// One side effect emitted by a training step
#[derive(Debug)]
pub enum TrainingEffect {
    /// Human-readable progress line
    Progress {
        epoch: usize,
        batch: usize,
        total_batches: usize,
        d_loss: f64,
        g_loss: f64,
    },
    /// Scalar losses keyed by generator iteration
    LogLosses {
        step: u64,
        losses: BTreeMap<String, f64>,
    },
    /// Image grids keyed by generator iteration
    LogImages {
        step: u64,
        images: BTreeMap<String, Tensor>,
    },
    /// Persist both networks
    SaveCheckpoint { epoch: usize, step: u64 },
}

/// Sink for scalar and image logs
pub trait TrainingLogger {
    fn log_losses(&mut self, losses: &BTreeMap<String, f64>, step: u64) -> Result<()>;

    fn log_images(&mut self, images: &BTreeMap<String, Tensor>, step: u64) -> Result<()>;
}

/// Sink for model snapshots
pub trait CheckpointSink {
    fn save_model(&mut self, model: &DCGAN, epoch: usize, step: u64) -> Result<()>;
}

/// Progress line printed at every checkpoint interval
pub fn format_progress(
    epoch: usize,
    batch: usize,
    total_batches: usize,
    d_loss: f64,
    g_loss: f64,
) -> String {
    format!(
        "Epoch: [{:2}] [{:4}/{:4}] D_loss: {:.8}, G_loss: {:.8}",
        epoch, batch, total_batches, d_loss, g_loss
    )
}

/// Executes effects in order, synchronously
pub struct EffectRunner<'a, L, C> {
    logger: &'a mut L,
    sink: &'a mut C,
}

impl<'a, L: TrainingLogger, C: CheckpointSink> EffectRunner<'a, L, C> {
    pub fn new(logger: &'a mut L, sink: &'a mut C) -> Self {
        Self { logger, sink }
    }

    pub fn run(&mut self, effects: Vec<TrainingEffect>, model: &DCGAN) -> Result<()> {
        for effect in effects {
            self.apply(effect, model)?;
        }
        Ok(())
    }

    fn apply(&mut self, effect: TrainingEffect, model: &DCGAN) -> Result<()> {
        match effect {
            TrainingEffect::Progress {
                epoch,
                batch,
                total_batches,
                d_loss,
                g_loss,
            } => {
                info!("{}", format_progress(epoch, batch, total_batches, d_loss, g_loss));
                Ok(())
            }
            TrainingEffect::LogLosses { step, losses } => self.logger.log_losses(&losses, step),
            TrainingEffect::LogImages { step, images } => self.logger.log_images(&images, step),
            TrainingEffect::SaveCheckpoint { epoch, step } => {
                self.sink.save_model(model, epoch, step)
            }
        }
    }
}

/// Logger that keeps everything in memory
#[derive(Debug, Default)]
pub struct RecordingLogger {
    /// (step, losses) per call
    pub losses: Vec<(u64, BTreeMap<String, f64>)>,
    /// (step, image names, image shapes) per call
    pub images: Vec<(u64, Vec<String>, Vec<Vec<i64>>)>,
}

impl TrainingLogger for RecordingLogger {
    fn log_losses(&mut self, losses: &BTreeMap<String, f64>, step: u64) -> Result<()> {
        self.losses.push((step, losses.clone()));
        Ok(())
    }

    fn log_images(&mut self, images: &BTreeMap<String, Tensor>, step: u64) -> Result<()> {
        let names = images.keys().cloned().collect();
        let shapes = images.values().map(Tensor::size).collect();
        self.images.push((step, names, shapes));
        Ok(())
    }
}

/// Checkpoint sink that records (epoch, step) without touching the disk
#[derive(Debug, Default)]
pub struct RecordingCheckpoints {
    pub saved: Vec<(usize, u64)>,
}

impl CheckpointSink for RecordingCheckpoints {
    fn save_model(&mut self, _model: &DCGAN, epoch: usize, step: u64) -> Result<()> {
        self.saved.push((epoch, step));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::ModelConfig;
    use tch::Device;

    #[test]
    fn test_format_progress() {
        let line = format_progress(1, 10, 32, 1.25, 0.5);
        assert_eq!(line, "Epoch: [ 1] [  10/  32] D_loss: 1.25000000, G_loss: 0.50000000");
    }

    #[test]
    fn test_runner_dispatches_in_order() {
        let model = DCGAN::from_config(
            &ModelConfig {
                latent_dim: 100,
                channels: 1,
                generator_filters: 8,
                discriminator_filters: 2,
            },
            Device::Cpu,
        )
        .unwrap();
        let mut logger = RecordingLogger::default();
        let mut sink = RecordingCheckpoints::default();

        let losses = BTreeMap::from([("d_loss".to_string(), 1.0), ("g_loss".to_string(), 2.0)]);
        let images = BTreeMap::from([(
            "real_images".to_string(),
            Tensor::zeros([3, 10, 10], (tch::Kind::Float, Device::Cpu)),
        )]);
        let effects = vec![
            TrainingEffect::Progress {
                epoch: 1,
                batch: 5,
                total_batches: 5,
                d_loss: 1.0,
                g_loss: 2.0,
            },
            TrainingEffect::LogLosses { step: 5, losses },
            TrainingEffect::LogImages { step: 5, images },
            TrainingEffect::SaveCheckpoint { epoch: 0, step: 5 },
        ];

        EffectRunner::new(&mut logger, &mut sink)
            .run(effects, &model)
            .unwrap();

        assert_eq!(logger.losses.len(), 1);
        assert_eq!(logger.losses[0].1["g_loss"], 2.0);
        assert_eq!(logger.images[0].1, vec!["real_images".to_string()]);
        assert_eq!(sink.saved, vec![(0, 5)]);
    }
}
