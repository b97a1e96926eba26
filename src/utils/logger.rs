//! File-backed training logger
//!
//! Scalars go to `losses.csv`, image grids to `images/<name>_<step>.png`.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tch::Tensor;
use tracing::debug;

use super::image::save_image;
use crate::error::Result;
use crate::training::TrainingLogger;

/// Logger writing losses as CSV rows and images as PNG files
pub struct FileLogger {
    dir: PathBuf,
    losses: csv::Writer<File>,
}

impl FileLogger {
    /// Open (or create) a log directory, appending to an existing `losses.csv`
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(dir.join("images"))?;

        let csv_path = dir.join("losses.csv");
        let is_new = !csv_path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&csv_path)?;
        let mut losses = csv::Writer::from_writer(file);
        if is_new {
            losses.write_record(["step", "name", "value"])?;
            losses.flush()?;
        }

        Ok(Self { dir, losses })
    }

    /// Path an image logged under `name` at `step` is written to
    pub fn image_path(&self, name: &str, step: u64) -> PathBuf {
        self.dir.join("images").join(format!("{name}_{step:08}.png"))
    }
}

impl TrainingLogger for FileLogger {
    fn log_losses(&mut self, losses: &BTreeMap<String, f64>, step: u64) -> Result<()> {
        for (name, value) in losses {
            self.losses
                .write_record([step.to_string(), name.clone(), value.to_string()])?;
        }
        self.losses.flush()?;
        Ok(())
    }

    fn log_images(&mut self, images: &BTreeMap<String, Tensor>, step: u64) -> Result<()> {
        for (name, image) in images {
            let path = self.image_path(name, step);
            save_image(image, &path)?;
            debug!("Logged {} to {}", name, path.display());
        }
        Ok(())
    }
}
