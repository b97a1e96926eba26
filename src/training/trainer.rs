//! Training loop implementation for DCGAN
//!
//! One batch runs a discriminator update followed by a generator update. The
//! step function returns the updated counters plus the side effects due at
//! that batch; the loop hands those effects to an [`EffectRunner`].

use std::collections::BTreeMap;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tch::{Device, Kind, Tensor};
use tracing::{debug, info, warn};

use super::effects::{CheckpointSink, EffectRunner, TrainingEffect, TrainingLogger};
use super::losses::{all_finite, discriminator_loss, generator_loss};
use super::metrics::{EpochAccumulator, TrainingMetrics};
use super::optimizer::NetworkOptimizer;
use super::state::{Phase, TrainerState};
use crate::data::BatchSource;
use crate::error::{GanError, Result};
use crate::model::{DCGAN, Discriminator, Generator, LatentDistribution, Network};
use crate::utils::config::Config;
use crate::utils::image::reshape_images;

/// Training configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Full batches are this size; a trailing partial batch is skipped
    pub batch_size: usize,
    /// Adam learning rate for both networks
    pub learning_rate: f64,
    /// Adam (beta1, beta2)
    pub betas: (f64, f64),
    /// Log and checkpoint every N batches within an epoch
    pub checkpoint_interval: usize,
    /// Number of discriminator updates per generator update. Every update of
    /// one step sees the same real batch, each with freshly sampled fakes.
    pub disc_steps: usize,
    /// Distribution latent vectors are drawn from
    pub latent: LatentDistribution,
    /// Fail the step when a loss is NaN or infinite
    pub abort_on_non_finite: bool,
    /// Draw a per-epoch progress bar
    pub progress_bar: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 25,
            batch_size: 64,
            learning_rate: 2e-4,
            betas: (0.5, 0.999),
            checkpoint_interval: 100,
            disc_steps: 1,
            latent: LatentDistribution::Normal,
            abort_on_non_finite: true,
            progress_bar: true,
        }
    }
}

impl From<&Config> for TrainingConfig {
    fn from(config: &Config) -> Self {
        Self {
            epochs: config.solver.epochs,
            batch_size: config.solver.batch_size,
            learning_rate: config.solver.base_lr,
            betas: config.solver.betas,
            checkpoint_interval: config.solver.checkpoint_interval,
            disc_steps: config.solver.disc_steps,
            latent: config.solver.latent,
            abort_on_non_finite: config.solver.abort_on_non_finite,
            progress_bar: config.output.progress_bar,
        }
    }
}

/// Losses and scores of one batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    /// Discriminator loss of the last discriminator update
    pub d_loss: f64,
    /// Generator loss
    pub g_loss: f64,
    /// Mean D(x) on the real batch
    pub real_score: f64,
    /// Mean D(G(z)) on the fake batch of the discriminator update
    pub fake_score: f64,
}

/// Result of [`Trainer::step`]
#[derive(Debug)]
pub struct StepOutcome {
    pub state: TrainerState,
    pub losses: StepLosses,
    /// Effects to run before the next step, in order
    pub effects: Vec<TrainingEffect>,
}

/// Result of one discriminator update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscriminatorUpdate {
    pub loss: f64,
    pub real_score: f64,
    pub fake_score: f64,
}

/// Update the discriminator on one real batch.
///
/// Fakes are synthesized without recording a graph, so no gradient can reach
/// the generator; only `disc_opt` is stepped. Non-finite scores skip the
/// update and report a NaN loss.
pub fn discriminator_step(
    generator: &Generator,
    discriminator: &Discriminator,
    disc_opt: &mut NetworkOptimizer<Discriminator>,
    real: &Tensor,
    latent: LatentDistribution,
) -> Result<DiscriminatorUpdate> {
    let batch_size = real.size()[0];

    let real_probs = discriminator.classify(real, true)?;

    let fake = tch::no_grad(|| {
        let noise = generator.noise(batch_size, latent);
        generator.synthesize(&noise, true)
    })?;
    let fake_probs = discriminator.classify(&fake, true)?;

    let real_score = real_probs.mean(Kind::Float).double_value(&[]);
    let fake_score = fake_probs.mean(Kind::Float).double_value(&[]);
    if !(all_finite(&real_probs) && all_finite(&fake_probs)) {
        return Ok(DiscriminatorUpdate {
            loss: f64::NAN,
            real_score,
            fake_score,
        });
    }

    let d_loss = discriminator_loss(&real_probs, &fake_probs)?;
    disc_opt.backward_step(&d_loss);

    Ok(DiscriminatorUpdate {
        loss: d_loss.double_value(&[]),
        real_score,
        fake_score,
    })
}

/// Update the generator to fool the discriminator.
///
/// The discriminator's gradients are cleared and its variables frozen for
/// the duration, so gradients flow through it into the generator without
/// accumulating on its own parameters; only `gen_opt` is stepped. Non-finite
/// scores skip the update and report a NaN loss.
pub fn generator_step(
    generator: &Generator,
    discriminator: &mut Discriminator,
    gen_opt: &mut NetworkOptimizer<Generator>,
    batch_size: i64,
    latent: LatentDistribution,
) -> Result<f64> {
    discriminator.zero_grad();
    discriminator.frozen(|discriminator| -> Result<f64> {
        let noise = generator.noise(batch_size, latent);
        let fake = generator.synthesize(&noise, true)?;
        let fake_probs = discriminator.classify(&fake, true)?;
        if !all_finite(&fake_probs) {
            return Ok(f64::NAN);
        }

        let g_loss = generator_loss(&fake_probs)?;
        gen_opt.backward_step(&g_loss);

        Ok(g_loss.double_value(&[]))
    })
}

/// DCGAN Trainer
///
/// Owns both networks and one optimizer per network.
pub struct Trainer {
    config: TrainingConfig,
    model: DCGAN,
    gen_opt: NetworkOptimizer<Generator>,
    disc_opt: NetworkOptimizer<Discriminator>,
    metrics: TrainingMetrics,
}

impl Trainer {
    /// Create a new trainer around `model`
    pub fn new(model: DCGAN, config: TrainingConfig) -> Result<Self> {
        if config.batch_size == 0 || config.checkpoint_interval == 0 || config.disc_steps == 0 {
            return Err(GanError::Config(
                "batch_size, checkpoint_interval and disc_steps must be > 0".to_string(),
            ));
        }

        let gen_opt = NetworkOptimizer::adam(&model.generator, config.learning_rate, config.betas)?;
        let disc_opt =
            NetworkOptimizer::adam(&model.discriminator, config.learning_rate, config.betas)?;
        info!(
            "Generator parameters: {}, discriminator parameters: {}",
            model.generator.parameter_count(),
            model.discriminator.parameter_count()
        );

        Ok(Self {
            config,
            model,
            gen_opt,
            disc_opt,
            metrics: TrainingMetrics::new(),
        })
    }

    /// Run one full batch: discriminator update(s), generator update, and the
    /// checkpoint-interval effects if due
    ///
    /// # Arguments
    ///
    /// * `state` - Counters before this batch
    /// * `real` - Real images, shape (batch, channels, H, W) in [-1, 1]
    /// * `batch_index` - Zero-based batch index within the epoch
    /// * `batches_per_epoch` - Full batches in the epoch
    pub fn step(
        &mut self,
        state: TrainerState,
        real: &Tensor,
        batch_index: usize,
        batches_per_epoch: usize,
    ) -> Result<StepOutcome> {
        let batch_size = real.size()[0];
        let latent = self.config.latent;

        let mut state = state.transition(Phase::DiscriminatorStep);
        let mut update = discriminator_step(
            &self.model.generator,
            &self.model.discriminator,
            &mut self.disc_opt,
            real,
            latent,
        )?;
        for _ in 1..self.config.disc_steps {
            state = state.transition(Phase::DiscriminatorStep);
            update = discriminator_step(
                &self.model.generator,
                &self.model.discriminator,
                &mut self.disc_opt,
                real,
                latent,
            )?;
        }

        state = state.transition(Phase::GeneratorStep);
        let g_loss = generator_step(
            &self.model.generator,
            &mut self.model.discriminator,
            &mut self.gen_opt,
            batch_size,
            latent,
        )?;
        state = state.generator_updated();

        let losses = StepLosses {
            d_loss: update.loss,
            g_loss,
            real_score: update.real_score,
            fake_score: update.fake_score,
        };

        if !(losses.d_loss.is_finite() && losses.g_loss.is_finite()) {
            if self.config.abort_on_non_finite {
                return Err(GanError::NumericInstability {
                    step: state.generator_iteration,
                    d_loss: losses.d_loss,
                    g_loss: losses.g_loss,
                });
            }
            warn!(
                "Non-finite loss at generator iteration {}, update skipped",
                state.generator_iteration
            );
        }

        if (batch_index + 1) % self.config.checkpoint_interval != 0 {
            return Ok(StepOutcome {
                state: state.transition(Phase::Idle),
                losses,
                effects: Vec::new(),
            });
        }

        let state = state.transition(Phase::Checkpointing);
        let effects = self.checkpoint_effects(&state, real, &losses, batch_index, batches_per_epoch)?;

        Ok(StepOutcome {
            state,
            losses,
            effects,
        })
    }

    fn checkpoint_effects(
        &self,
        state: &TrainerState,
        real: &Tensor,
        losses: &StepLosses,
        batch_index: usize,
        batches_per_epoch: usize,
    ) -> Result<Vec<TrainingEffect>> {
        let step = state.generator_iteration;
        let generator = &self.model.generator;

        let generated = tch::no_grad(|| {
            let noise = generator.noise(real.size()[0], self.config.latent);
            generator.synthesize(&noise, true)
        })?;

        let scalars = BTreeMap::from([
            ("d_loss".to_string(), losses.d_loss),
            ("g_loss".to_string(), losses.g_loss),
        ]);
        let images = BTreeMap::from([
            ("real_images".to_string(), reshape_images(real)?),
            ("generated_images".to_string(), reshape_images(&generated)?),
        ]);

        Ok(vec![
            TrainingEffect::Progress {
                epoch: state.epoch + 1,
                batch: batch_index + 1,
                total_batches: batches_per_epoch,
                d_loss: losses.d_loss,
                g_loss: losses.g_loss,
            },
            TrainingEffect::LogLosses {
                step,
                losses: scalars,
            },
            TrainingEffect::LogImages { step, images },
            TrainingEffect::SaveCheckpoint {
                epoch: state.epoch,
                step,
            },
        ])
    }

    /// Train over `source` from `state` until the configured epoch count
    ///
    /// Only `num_samples / batch_size` full batches are consumed per epoch.
    /// A final checkpoint is saved unconditionally once all epochs are done.
    ///
    /// # Returns
    ///
    /// The final state, in phase [`Phase::Done`]
    pub fn train<S, L, C>(
        &mut self,
        source: &mut S,
        logger: &mut L,
        sink: &mut C,
        state: TrainerState,
    ) -> Result<TrainerState>
    where
        S: BatchSource,
        L: TrainingLogger,
        C: CheckpointSink,
    {
        let batch_size = self.config.batch_size;
        let batches_per_epoch = source.num_samples() / batch_size;
        if batches_per_epoch == 0 {
            return Err(GanError::Config(format!(
                "dataset of {} samples holds no full batch of {}",
                source.num_samples(),
                batch_size
            )));
        }

        info!(
            "Starting training for {} epochs, {} batches per epoch",
            self.config.epochs, batches_per_epoch
        );

        let device = self.model.device();
        let mut runner = EffectRunner::new(logger, sink);
        let start_time = Instant::now();
        let mut state = state;

        for epoch in state.epoch..self.config.epochs {
            state = state.at_epoch(epoch);
            let epoch_start = Instant::now();
            let pb = self.progress_bar(batches_per_epoch);
            let mut epoch_acc = EpochAccumulator::default();

            source.reset();
            for batch_index in 0..batches_per_epoch {
                let Some(batch) = source.next_batch() else {
                    break;
                };
                if batch.size()[0] != batch_size as i64 {
                    debug!("Skipping partial batch of {}", batch.size()[0]);
                    break;
                }
                let real = batch.to_device(device);

                let outcome = self.step(state, &real, batch_index, batches_per_epoch)?;
                let losses = outcome.losses;
                epoch_acc.add(losses.d_loss, losses.g_loss, losses.real_score, losses.fake_score);

                state = if outcome.state.phase == Phase::Checkpointing {
                    runner.run(outcome.effects, &self.model)?;
                    outcome.state.transition(Phase::Idle)
                } else {
                    outcome.state
                };

                pb.set_message(format!("D: {:.4}, G: {:.4}", losses.d_loss, losses.g_loss));
                pb.inc(1);
            }
            pb.finish_and_clear();

            epoch_acc.record_into(&mut self.metrics);
            info!("Epoch time: {:.2}", epoch_start.elapsed().as_secs_f64());

            if self.metrics.check_mode_collapse(10) {
                warn!("Possible mode collapse detected! Consider adjusting learning rates.");
            }
        }

        runner.run(
            vec![TrainingEffect::SaveCheckpoint {
                epoch: state.epoch,
                step: state.generator_iteration,
            }],
            &self.model,
        )?;
        info!("Total time: {:.2}", start_time.elapsed().as_secs_f64());

        Ok(state.transition(Phase::Done))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.progress_bar {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }

    /// Get training metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Get configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn model(&self) -> &DCGAN {
        &self.model
    }

    pub fn into_model(self) -> DCGAN {
        self.model
    }

    pub fn device(&self) -> Device {
        self.model.device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ImageDataLoader;
    use crate::model::snapshots_equal;
    use crate::training::effects::{RecordingCheckpoints, RecordingLogger};
    use crate::utils::config::ModelConfig;

    fn tiny_model(channels: i64) -> DCGAN {
        DCGAN::from_config(
            &ModelConfig {
                latent_dim: 100,
                channels,
                generator_filters: 16,
                discriminator_filters: 4,
            },
            Device::Cpu,
        )
        .unwrap()
    }

    fn real_batch(batch: i64, channels: i64) -> Tensor {
        Tensor::rand([batch, channels, 64, 64], (Kind::Float, Device::Cpu)) * 2.0 - 1.0
    }

    fn quiet_config(batch_size: usize, checkpoint_interval: usize) -> TrainingConfig {
        TrainingConfig {
            epochs: 1,
            batch_size,
            checkpoint_interval,
            progress_bar: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.disc_steps, 1);
        assert_eq!(config.betas, (0.5, 0.999));
    }

    #[test]
    fn test_discriminator_step_leaves_generator_untouched() {
        let model = tiny_model(3);
        let mut disc_opt = NetworkOptimizer::adam(&model.discriminator, 2e-4, (0.5, 0.999)).unwrap();
        let real = real_batch(4, 3);

        let gen_before = model.generator.snapshot();
        let disc_before = model.discriminator.snapshot();

        discriminator_step(
            &model.generator,
            &model.discriminator,
            &mut disc_opt,
            &real,
            LatentDistribution::Normal,
        )
        .unwrap();

        assert!(snapshots_equal(&gen_before, &model.generator.snapshot()));
        assert!(!snapshots_equal(&disc_before, &model.discriminator.snapshot()));
    }

    #[test]
    fn test_generator_step_leaves_discriminator_untouched() {
        let mut model = tiny_model(3);
        let mut gen_opt = NetworkOptimizer::adam(&model.generator, 2e-4, (0.5, 0.999)).unwrap();

        let gen_before = model.generator.snapshot();
        let disc_before = model.discriminator.snapshot();

        generator_step(
            &model.generator,
            &mut model.discriminator,
            &mut gen_opt,
            4,
            LatentDistribution::Normal,
        )
        .unwrap();

        assert!(snapshots_equal(&disc_before, &model.discriminator.snapshot()));
        assert!(!snapshots_equal(&gen_before, &model.generator.snapshot()));

        // Unfrozen again for the next discriminator update
        assert!(model
            .discriminator
            .var_store()
            .trainable_variables()
            .iter()
            .all(|t| t.requires_grad()));
    }

    #[test]
    fn test_step_is_deterministic_under_seed() {
        fn run_once() -> (StepLosses, Vec<Tensor>, Vec<Tensor>) {
            tch::manual_seed(42);
            let real = real_batch(4, 1);
            let mut trainer = Trainer::new(tiny_model(1), quiet_config(4, 100)).unwrap();

            let outcome = trainer.step(TrainerState::new(), &real, 0, 1).unwrap();
            let model = trainer.model();
            (
                outcome.losses,
                model.generator.snapshot(),
                model.discriminator.snapshot(),
            )
        }

        tch::set_num_threads(1);
        let (losses_a, gen_a, disc_a) = run_once();
        let (losses_b, gen_b, disc_b) = run_once();

        assert_eq!(losses_a, losses_b);
        assert!(snapshots_equal(&gen_a, &gen_b));
        assert!(snapshots_equal(&disc_a, &disc_b));
    }

    #[test]
    fn test_step_emits_effects_only_at_interval() {
        let mut trainer = Trainer::new(tiny_model(1), quiet_config(2, 2)).unwrap();
        let real = real_batch(2, 1);

        let first = trainer.step(TrainerState::new(), &real, 0, 4).unwrap();
        assert!(first.effects.is_empty());
        assert_eq!(first.state.phase, Phase::Idle);
        assert_eq!(first.state.generator_iteration, 1);

        let second = trainer.step(first.state, &real, 1, 4).unwrap();
        assert_eq!(second.state.phase, Phase::Checkpointing);
        assert_eq!(second.state.generator_iteration, 2);

        let kinds: Vec<&str> = second
            .effects
            .iter()
            .map(|e| match e {
                TrainingEffect::Progress { .. } => "progress",
                TrainingEffect::LogLosses { .. } => "losses",
                TrainingEffect::LogImages { .. } => "images",
                TrainingEffect::SaveCheckpoint { .. } => "checkpoint",
            })
            .collect();
        assert_eq!(kinds, vec!["progress", "losses", "images", "checkpoint"]);

        match &second.effects[3] {
            TrainingEffect::SaveCheckpoint { epoch, step } => {
                assert_eq!((*epoch, *step), (0, 2));
            }
            other => panic!("unexpected effect {:?}", other),
        }
    }

    #[test]
    fn test_multiple_discriminator_steps_per_generator_step() {
        let mut config = quiet_config(2, 100);
        config.disc_steps = 3;
        let mut trainer = Trainer::new(tiny_model(1), config).unwrap();

        let outcome = trainer.step(TrainerState::new(), &real_batch(2, 1), 0, 1).unwrap();
        assert_eq!(outcome.state.generator_iteration, 1);
        assert!(outcome.losses.d_loss.is_finite());
    }

    #[test]
    fn test_checkpoint_cadence() {
        for (num_batches, interval) in [(7usize, 3usize), (6, 2), (5, 10)] {
            let batch_size = 2;
            let images = real_batch((num_batches * batch_size) as i64, 1);
            let mut loader = ImageDataLoader::new(images, batch_size, false, None).unwrap();
            let mut logger = RecordingLogger::default();
            let mut sink = RecordingCheckpoints::default();

            let mut trainer = Trainer::new(tiny_model(1), quiet_config(batch_size, interval)).unwrap();
            let state = trainer
                .train(&mut loader, &mut logger, &mut sink, TrainerState::new())
                .unwrap();

            let intra = num_batches / interval;
            assert_eq!(sink.saved.len(), intra + 1);
            assert_eq!(logger.losses.len(), intra);
            assert_eq!(sink.saved.last(), Some(&(0, num_batches as u64)));
            assert_eq!(state.phase, Phase::Done);
        }
    }

    #[test]
    fn test_partial_batch_is_skipped() {
        let images = real_batch(7, 1);
        let mut loader = ImageDataLoader::new(images, 3, false, None).unwrap();
        let mut logger = RecordingLogger::default();
        let mut sink = RecordingCheckpoints::default();

        let mut config = quiet_config(3, 100);
        config.epochs = 2;
        let mut trainer = Trainer::new(tiny_model(1), config).unwrap();
        let state = trainer
            .train(&mut loader, &mut logger, &mut sink, TrainerState::new())
            .unwrap();

        assert_eq!(state.generator_iteration, 4);
        assert_eq!(state.epoch, 1);
        assert_eq!(sink.saved, vec![(1, 4)]);
        assert_eq!(trainer.metrics().num_epochs(), 2);
    }

    #[test]
    fn test_dataset_smaller_than_batch_is_rejected() {
        let mut loader = ImageDataLoader::new(real_batch(2, 1), 4, false, None).unwrap();
        let mut trainer = Trainer::new(tiny_model(1), quiet_config(4, 1)).unwrap();

        let result = trainer.train(
            &mut loader,
            &mut RecordingLogger::default(),
            &mut RecordingCheckpoints::default(),
            TrainerState::new(),
        );
        assert!(matches!(result, Err(GanError::Config(_))));
    }

    fn poison_discriminator(model: &DCGAN) {
        tch::no_grad(|| {
            for mut var in model.discriminator.var_store().trainable_variables() {
                let _ = var.fill_(f64::NAN);
            }
        });
    }

    #[test]
    fn test_discriminator_gradients_cleared_by_generator_step() {
        let mut model = tiny_model(1);
        let mut disc_opt =
            NetworkOptimizer::adam(&model.discriminator, 2e-4, (0.5, 0.999)).unwrap();
        let mut gen_opt = NetworkOptimizer::adam(&model.generator, 2e-4, (0.5, 0.999)).unwrap();

        discriminator_step(
            &model.generator,
            &model.discriminator,
            &mut disc_opt,
            &real_batch(4, 1),
            LatentDistribution::Normal,
        )
        .unwrap();
        generator_step(
            &model.generator,
            &mut model.discriminator,
            &mut gen_opt,
            4,
            LatentDistribution::Normal,
        )
        .unwrap();

        for var in model.discriminator.var_store().trainable_variables() {
            let grad = var.grad();
            assert!(!grad.defined() || grad.abs().sum(Kind::Float).double_value(&[]) == 0.0);
        }
    }

    #[test]
    fn test_non_finite_scores_abort_with_numeric_instability() {
        let model = tiny_model(1);
        poison_discriminator(&model);
        let mut trainer = Trainer::new(model, quiet_config(2, 100)).unwrap();

        let err = trainer.step(TrainerState::new(), &real_batch(2, 1), 0, 1).unwrap_err();
        match err {
            GanError::NumericInstability { step, d_loss, g_loss } => {
                assert_eq!(step, 1);
                assert!(d_loss.is_nan());
                assert!(g_loss.is_nan());
            }
            other => panic!("expected NumericInstability, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_scores_skip_updates_when_not_aborting() {
        let model = tiny_model(1);
        poison_discriminator(&model);
        let mut config = quiet_config(2, 100);
        config.abort_on_non_finite = false;
        let mut trainer = Trainer::new(model, config).unwrap();
        let gen_before = trainer.model().generator.snapshot();

        let outcome = trainer.step(TrainerState::new(), &real_batch(2, 1), 0, 1).unwrap();

        assert!(outcome.losses.d_loss.is_nan());
        assert_eq!(outcome.state.generator_iteration, 1);
        assert!(snapshots_equal(&gen_before, &trainer.model().generator.snapshot()));
    }

    #[test]
    fn test_shape_mismatch_aborts_step() {
        let mut trainer = Trainer::new(tiny_model(3), quiet_config(2, 100)).unwrap();
        let wrong_channels = real_batch(2, 1);

        let err = trainer.step(TrainerState::new(), &wrong_channels, 0, 1).unwrap_err();
        assert!(matches!(err, GanError::ShapeMismatch { .. }));
    }
}
