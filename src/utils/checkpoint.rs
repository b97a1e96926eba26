//! Checkpoint save/load utilities
//!
//! A checkpoint is a directory holding both networks' weights and a
//! `meta.json` with the training counters. Snapshots are written once and
//! never modified.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GanError, Result};
use crate::model::DCGAN;
use crate::training::CheckpointSink;
use crate::utils::config::ModelConfig;

const CHECKPOINT_PREFIX: &str = "checkpoint_";
const META_FILE: &str = "meta.json";

/// Checkpoint metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Zero-based epoch the snapshot was taken in
    pub epoch: usize,
    /// Generator iterations completed
    pub step: u64,
    /// Timestamp of checkpoint (RFC 3339)
    pub timestamp: String,
    /// Network configuration needed to rebuild the model
    pub model: ModelConfig,
}

/// Directory name of the snapshot keyed by (epoch, step)
pub fn checkpoint_name(epoch: usize, step: u64) -> String {
    format!("{CHECKPOINT_PREFIX}e{epoch:04}_s{step:08}")
}

/// Save a complete checkpoint (weights + metadata) under `root`
///
/// The snapshot is assembled in a hidden staging directory and renamed into
/// place once `meta.json` is written, so a checkpoint directory is either
/// complete or absent. A leftover incomplete directory under the same name is
/// replaced.
///
/// # Returns
///
/// Path to the new checkpoint directory. Fails if a complete checkpoint
/// already exists there.
pub fn save_checkpoint(
    model: &DCGAN,
    model_config: &ModelConfig,
    epoch: usize,
    step: u64,
    root: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(root)?;

    let name = checkpoint_name(epoch, step);
    let checkpoint_dir = root.join(&name);
    if is_complete(&checkpoint_dir) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("checkpoint {} already exists", checkpoint_dir.display()),
        )
        .into());
    }

    let staging = root.join(format!(".{name}.partial"));
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir(&staging)?;

    model.save(&staging)?;

    let meta = CheckpointMeta {
        epoch,
        step,
        timestamp: chrono::Utc::now().to_rfc3339(),
        model: model_config.clone(),
    };
    std::fs::write(staging.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;

    if checkpoint_dir.exists() {
        tracing::warn!("Replacing incomplete checkpoint {}", checkpoint_dir.display());
        std::fs::remove_dir_all(&checkpoint_dir)?;
    }
    std::fs::rename(&staging, &checkpoint_dir)?;

    tracing::info!("Saved checkpoint to {}", checkpoint_dir.display());
    Ok(checkpoint_dir)
}

/// True when `dir` holds a finished checkpoint
pub fn is_complete(dir: &Path) -> bool {
    dir.join(META_FILE).is_file()
}

/// Load checkpoint metadata
pub fn load_checkpoint_meta(checkpoint_dir: &Path) -> Result<CheckpointMeta> {
    let content = std::fs::read_to_string(checkpoint_dir.join(META_FILE))?;
    Ok(serde_json::from_str(&content)?)
}

/// Load a checkpoint into `model`
///
/// Fails with a configuration error when the checkpoint was written for a
/// different network shape.
pub fn load_checkpoint(model: &mut DCGAN, checkpoint_dir: &Path) -> Result<CheckpointMeta> {
    let meta = load_checkpoint_meta(checkpoint_dir)?;
    if meta.model.latent_dim != model.latent_dim() || meta.model.channels != model.channels() {
        return Err(GanError::Config(format!(
            "checkpoint {} was saved for latent_dim={} channels={}, model has latent_dim={} channels={}",
            checkpoint_dir.display(),
            meta.model.latent_dim,
            meta.model.channels,
            model.latent_dim(),
            model.channels()
        )));
    }

    model.load(checkpoint_dir)?;

    tracing::info!(
        "Loaded checkpoint from {} (epoch {}, step {})",
        checkpoint_dir.display(),
        meta.epoch,
        meta.step
    );
    Ok(meta)
}

fn checkpoint_dirs(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return vec![];
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with(CHECKPOINT_PREFIX))
                .unwrap_or(false)
        })
        .map(|e| e.path())
        .filter(|p| is_complete(p))
        .collect();
    dirs.sort();
    dirs
}

/// Find the latest complete checkpoint in a directory
pub fn find_latest_checkpoint(root: &Path) -> Option<PathBuf> {
    checkpoint_dirs(root).pop()
}

/// List all readable checkpoints in a directory, oldest first
pub fn list_checkpoints(root: &Path) -> Vec<(PathBuf, CheckpointMeta)> {
    checkpoint_dirs(root)
        .into_iter()
        .filter_map(|path| load_checkpoint_meta(&path).ok().map(|meta| (path, meta)))
        .collect()
}

/// Checkpoint sink writing snapshots to disk
#[derive(Debug)]
pub struct CheckpointStore {
    root: PathBuf,
    model_config: ModelConfig,
    saved: Vec<(usize, u64, PathBuf)>,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>, model_config: ModelConfig) -> Self {
        Self {
            root: root.into(),
            model_config,
            saved: Vec::new(),
        }
    }

    /// Checkpoints written by this store, oldest first
    pub fn saved(&self) -> impl Iterator<Item = &Path> {
        self.saved.iter().map(|(_, _, p)| p.as_path())
    }
}

impl CheckpointSink for CheckpointStore {
    fn save_model(&mut self, model: &DCGAN, epoch: usize, step: u64) -> Result<()> {
        // The final save can land on the key of the last interval save; the
        // parameters are unchanged since then.
        if self.saved.iter().any(|(e, s, _)| (*e, *s) == (epoch, step)) {
            tracing::debug!("Checkpoint for epoch {} step {} already written", epoch, step);
            return Ok(());
        }
        // A run resumed from its own final snapshot ends on the same key
        let existing = self.root.join(checkpoint_name(epoch, step));
        if is_complete(&existing) {
            tracing::warn!("Keeping existing checkpoint {}", existing.display());
            return Ok(());
        }

        let path = save_checkpoint(model, &self.model_config, epoch, step, &self.root)?;
        self.saved.push((epoch, step, path));
        Ok(())
    }
}
