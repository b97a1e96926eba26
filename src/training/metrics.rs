//! Training metrics for monitoring GAN progress
//!
//! Per-epoch averages of both losses and of the discriminator's scores.

use std::path::Path;

use crate::error::Result;

/// Metrics collected during training
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingMetrics {
    /// Mean discriminator loss per epoch
    pub disc_losses: Vec<f64>,
    /// Mean generator loss per epoch
    pub gen_losses: Vec<f64>,
    /// Mean D(x) on real batches per epoch
    pub real_scores: Vec<f64>,
    /// Mean D(G(z)) on fake batches per epoch
    pub fake_scores: Vec<f64>,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record epoch metrics
    pub fn record_epoch(&mut self, disc_loss: f64, gen_loss: f64, real_score: f64, fake_score: f64) {
        self.disc_losses.push(disc_loss);
        self.gen_losses.push(gen_loss);
        self.real_scores.push(real_score);
        self.fake_scores.push(fake_score);
    }

    /// Get number of recorded epochs
    pub fn num_epochs(&self) -> usize {
        self.gen_losses.len()
    }

    /// Get latest generator loss
    pub fn latest_gen_loss(&self) -> Option<f64> {
        self.gen_losses.last().copied()
    }

    /// Get latest discriminator loss
    pub fn latest_disc_loss(&self) -> Option<f64> {
        self.disc_losses.last().copied()
    }

    /// Check if training appears to have collapsed
    ///
    /// Collapse indicators over the last `window` epochs:
    /// - Discriminator loss very low (can easily distinguish)
    /// - Generator loss very high (can't fool discriminator)
    pub fn check_mode_collapse(&self, window: usize) -> bool {
        if window == 0 || self.num_epochs() < window {
            return false;
        }

        let disc_ma = moving_average(&self.disc_losses, window);
        let gen_ma = moving_average(&self.gen_losses, window);

        disc_ma < 0.1 && gen_ma > 5.0
    }

    /// Save metrics to CSV file
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record(["epoch", "d_loss", "g_loss", "real_score", "fake_score"])?;

        for i in 0..self.num_epochs() {
            writer.write_record([
                (i + 1).to_string(),
                self.disc_losses[i].to_string(),
                self.gen_losses[i].to_string(),
                self.real_scores[i].to_string(),
                self.fake_scores[i].to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load metrics from CSV file
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut metrics = Self::new();

        for result in reader.deserialize() {
            let (_epoch, d, g, real, fake): (usize, f64, f64, f64, f64) = result?;
            metrics.record_epoch(d, g, real, fake);
        }

        Ok(metrics)
    }
}

/// Running sums for one epoch
#[derive(Debug, Default)]
pub(crate) struct EpochAccumulator {
    batches: usize,
    disc_loss: f64,
    gen_loss: f64,
    real_score: f64,
    fake_score: f64,
}

impl EpochAccumulator {
    pub(crate) fn add(&mut self, disc_loss: f64, gen_loss: f64, real_score: f64, fake_score: f64) {
        self.batches += 1;
        self.disc_loss += disc_loss;
        self.gen_loss += gen_loss;
        self.real_score += real_score;
        self.fake_score += fake_score;
    }

    pub(crate) fn record_into(&self, metrics: &mut TrainingMetrics) {
        if self.batches == 0 {
            return;
        }
        let n = self.batches as f64;
        metrics.record_epoch(
            self.disc_loss / n,
            self.gen_loss / n,
            self.real_score / n,
            self.fake_score / n,
        );
    }
}

/// Calculate moving average of last `window` values
fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let n = window.min(values.len());
    let sum: f64 = values.iter().rev().take(n).sum();
    sum / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_metrics() {
        let mut metrics = TrainingMetrics::new();

        metrics.record_epoch(0.8, 1.5, 0.6, 0.3);
        metrics.record_epoch(0.75, 1.3, 0.65, 0.35);

        assert_eq!(metrics.num_epochs(), 2);
        assert_eq!(metrics.latest_gen_loss(), Some(1.3));
        assert_eq!(metrics.latest_disc_loss(), Some(0.75));
    }

    #[test]
    fn test_mode_collapse_detection() {
        let mut metrics = TrainingMetrics::new();
        for _ in 0..3 {
            metrics.record_epoch(0.01, 9.0, 0.99, 0.01);
        }

        assert!(metrics.check_mode_collapse(3));
        assert!(!metrics.check_mode_collapse(4));
    }

    #[test]
    fn test_epoch_accumulator_averages() {
        let mut acc = EpochAccumulator::default();
        acc.add(1.0, 2.0, 0.5, 0.5);
        acc.add(3.0, 4.0, 0.7, 0.1);

        let mut metrics = TrainingMetrics::new();
        acc.record_into(&mut metrics);

        assert_eq!(metrics.disc_losses, vec![2.0]);
        assert_eq!(metrics.gen_losses, vec![3.0]);
    }

    #[test]
    fn test_metrics_csv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        let mut metrics = TrainingMetrics::new();
        metrics.record_epoch(0.5, 2.5, 0.75, 0.25);
        metrics.save_csv(&path).unwrap();

        let loaded = TrainingMetrics::load_csv(&path).unwrap();
        assert_eq!(metrics, loaded);
    }
}
