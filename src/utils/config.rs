//! Configuration management
//!
//! Provides unified configuration for the whole DCGAN pipeline. Read once at
//! start-up and treated as immutable afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GanError, Result};
use crate::latent_walk::DEFAULT_WALK_DIR;
use crate::model::LatentDistribution;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Device: "cpu", "cuda" or "mps"
    pub device: String,
    /// Seed for torch and the data shuffler
    #[serde(default)]
    pub seed: Option<u64>,
    /// Network configuration
    pub model: ModelConfig,
    /// Optimizer and schedule configuration
    pub solver: SolverConfig,
    /// Dataset configuration
    pub data: DataConfig,
    /// Output locations
    pub output: OutputConfig,
}

/// Network-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Latent vector length
    pub latent_dim: i64,
    /// Image channels (3 for RGB, 1 for grayscale)
    pub channels: i64,
    /// Generator projection width
    pub generator_filters: i64,
    /// Discriminator first-stage width
    pub discriminator_filters: i64,
}

/// Optimizer and training schedule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Adam learning rate for both networks
    pub base_lr: f64,
    /// Adam (beta1, beta2)
    pub betas: (f64, f64),
    /// Batch size
    pub batch_size: usize,
    /// Number of epochs
    pub epochs: usize,
    /// Log and checkpoint every N batches
    pub checkpoint_interval: usize,
    /// Discriminator updates per generator update
    #[serde(default = "default_disc_steps")]
    pub disc_steps: usize,
    /// Distribution latent vectors are sampled from
    #[serde(default)]
    pub latent: LatentDistribution,
    /// Abort the run when a loss turns NaN or infinite
    #[serde(default = "default_true")]
    pub abort_on_non_finite: bool,
}

/// Dataset configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory of training images
    pub dataset_dir: String,
    /// Shuffle samples every epoch
    pub shuffle: bool,
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Checkpoint directory
    pub checkpoint_dir: String,
    /// Directory for loss CSV and logged image grids
    pub log_dir: String,
    /// Directory for latent walk contact sheets
    pub interpolation_dir: String,
    /// Show a per-epoch progress bar
    #[serde(default = "default_true")]
    pub progress_bar: bool,
}

fn default_disc_steps() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            latent_dim: 100,
            channels: 3,
            generator_filters: 1024,
            discriminator_filters: 256,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            base_lr: 2e-4,
            betas: (0.5, 0.999),
            batch_size: 64,
            epochs: 25,
            checkpoint_interval: 100,
            disc_steps: 1,
            latent: LatentDistribution::Normal,
            abort_on_non_finite: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: "cpu".to_string(),
            seed: None,
            model: ModelConfig::default(),
            solver: SolverConfig::default(),
            data: DataConfig {
                dataset_dir: "data/images".to_string(),
                shuffle: true,
            },
            output: OutputConfig {
                checkpoint_dir: "checkpoints".to_string(),
                log_dir: "logs".to_string(),
                interpolation_dir: DEFAULT_WALK_DIR.to_string(),
                progress_bar: true,
            },
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML or JSON file, chosen by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if is_toml(path) {
            Self::from_toml(path)?
        } else {
            Self::from_json(path)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML or JSON file, chosen by extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if is_toml(path) {
            self.save_toml(path)
        } else {
            self.save_json(path)
        }
    }

    /// Load configuration from TOML file
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get device from configuration
    pub fn device(&self) -> tch::Device {
        match self.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            "mps" => tch::Device::Mps,
            _ => tch::Device::Cpu,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(GanError::Config(msg.to_string()));

        if self.model.channels <= 0 {
            return invalid("channel count must be > 0");
        }
        if self.model.latent_dim <= 0 {
            return invalid("latent dimension must be > 0");
        }
        if self.solver.batch_size == 0 {
            return invalid("batch size must be > 0");
        }
        if self.solver.epochs == 0 {
            return invalid("number of epochs must be > 0");
        }
        if self.solver.checkpoint_interval == 0 {
            return invalid("checkpoint interval must be > 0");
        }
        if self.solver.disc_steps == 0 {
            return invalid("discriminator steps must be > 0");
        }
        if self.solver.base_lr.is_nan() || self.solver.base_lr <= 0.0 {
            return invalid("learning rate must be > 0");
        }
        let (b1, b2) = self.solver.betas;
        if !(0.0..1.0).contains(&b1) || !(0.0..1.0).contains(&b2) {
            return invalid("Adam betas must lie in [0, 1)");
        }
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

/// Load the configuration at `path`, writing the default there first if it
/// doesn't exist
pub fn ensure_config_exists(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if path.exists() {
        Config::load(path)
    } else {
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }
}
