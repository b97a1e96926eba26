//! DCGAN for Image Synthesis
//!
//! Main entry point providing CLI interface for:
//! - Writing a default configuration
//! - Training the DCGAN on a folder of images
//! - Latent space walks and sample grids from a trained checkpoint

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rust_dcgan_images::{
    data::ImageDataLoader,
    latent_walk::LatentWalk,
    model::{DCGAN, IMAGE_SIZE},
    training::{Trainer, TrainerState, TrainingConfig},
    utils::{
        find_latest_checkpoint, load_checkpoint, load_checkpoint_meta, reshape_images, save_image,
        CheckpointStore, Config, FileLogger,
    },
};

/// DCGAN image synthesis
#[derive(Parser)]
#[command(name = "dcgan")]
#[command(version = "0.1.0")]
#[command(about = "Train a DCGAN on images and explore its latent space")]
struct Cli {
    /// Path to configuration file (.json or .toml)
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the DCGAN model
    Train {
        /// Directory of training images (overrides the config)
        #[arg(short, long)]
        data: Option<String>,

        /// Number of epochs (overrides the config)
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Resume from checkpoint directory
        #[arg(long)]
        resume: Option<String>,
    },

    /// Render latent space walks from a trained checkpoint
    Walk {
        /// Checkpoint directory (latest under the configured root if omitted)
        #[arg(long)]
        checkpoint: Option<String>,

        /// Number of walks to render
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },

    /// Save a grid of generated samples
    Generate {
        /// Checkpoint directory (latest under the configured root if omitted)
        #[arg(long)]
        checkpoint: Option<String>,

        /// Number of samples to generate
        #[arg(short, long, default_value = "64")]
        num_samples: i64,

        /// Output PNG path
        #[arg(short, long, default_value = "samples.png")]
        output: String,
    },

    /// Initialize default configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "config.json")]
        output: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Train {
            data,
            epochs,
            resume,
        } => {
            train_model(&cli.config, data, epochs, resume)?;
        }
        Commands::Walk { checkpoint, count } => {
            latent_walk(&cli.config, checkpoint, count)?;
        }
        Commands::Generate {
            checkpoint,
            num_samples,
            output,
        } => {
            generate_samples(&cli.config, checkpoint, num_samples, &output)?;
        }
        Commands::Init { output } => {
            init_config(&output)?;
        }
    }

    Ok(())
}

fn load_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        Config::load(config_path).with_context(|| format!("reading {config_path}"))
    } else {
        info!("Config file not found, using defaults");
        Ok(Config::default())
    }
}

fn seed_everything(config: &Config) {
    if let Some(seed) = config.seed {
        tch::manual_seed(seed as i64);
        info!("Seeded torch with {}", seed);
    }
}

/// Train the DCGAN model
fn train_model(
    config_path: &str,
    data_dir: Option<String>,
    epochs: Option<usize>,
    resume: Option<String>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = data_dir {
        config.data.dataset_dir = dir;
    }
    if let Some(epochs) = epochs {
        config.solver.epochs = epochs;
    }
    config.validate()?;
    seed_everything(&config);

    let device = config.device();
    info!("Using device: {:?}", device);

    info!("Loading images from {}", config.data.dataset_dir);
    let mut loader = ImageDataLoader::from_image_dir(
        &config.data.dataset_dir,
        IMAGE_SIZE,
        config.model.channels,
        config.solver.batch_size,
        config.data.shuffle,
        config.seed,
    )?;

    let mut model = DCGAN::from_config(&config.model, device)?;

    // Resume from checkpoint if specified
    let state = if let Some(checkpoint_path) = resume {
        let meta = load_checkpoint(&mut model, Path::new(&checkpoint_path))?;
        info!(
            "Resumed from epoch {} at generator iteration {}",
            meta.epoch, meta.step
        );
        TrainerState::resume(meta.epoch + 1, meta.step)
    } else {
        TrainerState::new()
    };

    let mut logger = FileLogger::new(&config.output.log_dir)?;
    let mut checkpoints =
        CheckpointStore::new(&config.output.checkpoint_dir, config.model.clone());

    let mut trainer = Trainer::new(model, TrainingConfig::from(&config))?;
    let state = trainer.train(&mut loader, &mut logger, &mut checkpoints, state)?;

    let metrics_path = Path::new(&config.output.log_dir).join("metrics.csv");
    trainer.metrics().save_csv(&metrics_path)?;

    info!(
        "Training complete after {} generator iterations. Final G_loss: {:.4}, D_loss: {:.4}",
        state.generator_iteration,
        trainer.metrics().latest_gen_loss().unwrap_or(0.0),
        trainer.metrics().latest_disc_loss().unwrap_or(0.0)
    );

    Ok(())
}

/// Rebuild the model stored in `checkpoint`, or in the latest checkpoint
fn restore_model(config: &Config, checkpoint: Option<String>) -> Result<DCGAN> {
    let dir = match checkpoint {
        Some(dir) => PathBuf::from(dir),
        None => find_latest_checkpoint(Path::new(&config.output.checkpoint_dir)).with_context(
            || format!("no checkpoint found in {}", config.output.checkpoint_dir),
        )?,
    };

    let meta = load_checkpoint_meta(&dir)?;
    let mut model = DCGAN::from_config(&meta.model, config.device())?;
    load_checkpoint(&mut model, &dir)?;
    Ok(model)
}

/// Render `count` latent walks
fn latent_walk(config_path: &str, checkpoint: Option<String>, count: usize) -> Result<()> {
    let config = load_config(config_path)?;
    seed_everything(&config);
    let model = restore_model(&config, checkpoint)?;

    let walk = LatentWalk::new(&model.generator, &config.output.interpolation_dir);
    for index in 0..count {
        walk.walk(index)?;
    }

    Ok(())
}

/// Generate samples and save them as one grid image
fn generate_samples(
    config_path: &str,
    checkpoint: Option<String>,
    num_samples: i64,
    output_path: &str,
) -> Result<()> {
    let config = load_config(config_path)?;
    seed_everything(&config);
    let model = restore_model(&config, checkpoint)?;

    info!("Generating {} samples", num_samples);
    let samples = tch::no_grad(|| model.generate(num_samples))?;
    save_image(&reshape_images(&samples)?, output_path)?;
    info!("Saved samples to {}", output_path);

    Ok(())
}

/// Initialize default configuration file
fn init_config(output_path: &str) -> Result<()> {
    Config::default().save(output_path)?;
    info!("Created default configuration at {}", output_path);
    Ok(())
}
