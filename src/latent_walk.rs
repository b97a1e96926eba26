//! Latent space walk
//!
//! Renders a row of frames synthesized from blends of two random latent
//! vectors and saves them as one contact sheet.

use std::path::{Path, PathBuf};

use tch::Tensor;
use tracing::info;

use crate::error::Result;
use crate::model::{Generator, LatentDistribution};
use crate::utils::image::{denormalize, image_grid, save_image, GRID_PADDING};

/// Frames per walk
pub const WALK_STEPS: usize = 10;
/// Default directory contact sheets are written to
pub const DEFAULT_WALK_DIR: &str = "interpolated_images";

/// Blend weights applied to the first latent vector, one per frame
///
/// The weight starts at `1 / (steps + 1)` and doubles after every frame, so
/// later frames extrapolate past the first vector instead of sweeping evenly
/// towards it.
pub fn walk_alphas(steps: usize) -> Vec<f64> {
    let mut alpha = 1.0 / (steps as f64 + 1.0);
    let mut alphas = Vec::with_capacity(steps);
    for _ in 0..steps {
        alphas.push(alpha);
        alpha += alpha;
    }
    alphas
}

/// File name of the contact sheet for `index`
pub fn interpolation_file_name(index: usize) -> String {
    format!("interpolated_{index:03}.png")
}

/// `z1 * alpha + z2 * (1 - alpha)`
pub fn blend(z1: &Tensor, z2: &Tensor, alpha: f64) -> Tensor {
    z1 * alpha + z2 * (1.0 - alpha)
}

/// Walks the latent space of a trained generator
pub struct LatentWalk<'a> {
    generator: &'a Generator,
    output_dir: PathBuf,
    steps: usize,
}

impl<'a> LatentWalk<'a> {
    /// Create a walker writing into `output_dir` with [`WALK_STEPS`] frames
    pub fn new(generator: &'a Generator, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            generator,
            output_dir: output_dir.into(),
            steps: WALK_STEPS,
        }
    }

    /// Override the number of frames
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps.max(1);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Walk between two freshly sampled latent vectors
    ///
    /// # Returns
    ///
    /// Path of the saved contact sheet
    pub fn walk(&self, sample_index: usize) -> Result<PathBuf> {
        let z1 = self.generator.noise(1, LatentDistribution::Normal);
        let z2 = self.generator.noise(1, LatentDistribution::Normal);
        self.walk_between(&z1, &z2, sample_index)
    }

    /// Walk between `z1` and `z2`, each of shape (1, latent_dim[, 1, 1])
    pub fn walk_between(&self, z1: &Tensor, z2: &Tensor, sample_index: usize) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let alphas = walk_alphas(self.steps);
        if let Some(first) = alphas.first() {
            info!("Walk alpha starts at {}", first);
        }

        let frames = tch::no_grad(|| -> Result<Vec<Tensor>> {
            alphas
                .iter()
                .map(|&alpha| {
                    let image = self.generator.generate(&blend(z1, z2, alpha))?;
                    Ok(denormalize(&image))
                })
                .collect()
        })?;

        let grid = image_grid(&Tensor::cat(&frames, 0), self.steps as i64, GRID_PADDING)?;
        let path = self.output_dir.join(interpolation_file_name(sample_index));
        save_image(&grid, &path)?;

        info!("Saved interpolated images to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GeneratorConfig;
    use tch::{Device, Kind};

    fn tiny_generator() -> Generator {
        let config = GeneratorConfig {
            latent_dim: 100,
            channels: 3,
            base_filters: 8,
        };
        Generator::new(config, Device::Cpu).unwrap()
    }

    #[test]
    fn test_walk_alphas_double_each_frame() {
        let alphas = walk_alphas(10);

        assert_eq!(alphas.len(), 10);
        assert_eq!(alphas[0], 1.0 / 11.0);
        assert_eq!(alphas[1], 2.0 / 11.0);
        assert_eq!(alphas[2], 4.0 / 11.0);
        assert_eq!(alphas[3], 8.0 / 11.0);
        assert_eq!(alphas[4], 16.0 / 11.0);
        assert_eq!(alphas[5], 32.0 / 11.0);
        assert_eq!(alphas[9], 512.0 / 11.0);
        // Not an even sweep: later weights leave [0, 1]
        assert!(alphas[4] > 1.0);
    }

    #[test]
    fn test_interpolation_file_name_is_zero_padded() {
        assert_eq!(interpolation_file_name(7), "interpolated_007.png");
        assert_eq!(interpolation_file_name(123), "interpolated_123.png");
    }

    #[test]
    fn test_blend_weights_endpoints() {
        let z1 = Tensor::ones([1, 4], (Kind::Float, Device::Cpu));
        let z2 = Tensor::zeros([1, 4], (Kind::Float, Device::Cpu));

        let mixed = blend(&z1, &z2, 0.25);
        assert!((mixed.mean(Kind::Float).double_value(&[]) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_walk_writes_contact_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("walks");
        let generator = tiny_generator();

        let path = LatentWalk::new(&generator, &out).walk(3).unwrap();

        assert_eq!(path, out.join("interpolated_003.png"));
        let sheet = tch::vision::image::load(&path).unwrap();
        // Ten 64x64 frames in one row with 2px padding
        assert_eq!(sheet.size(), vec![3, 64 + 4, 10 * 66 + 2]);
    }

    #[test]
    fn test_walk_output_dir_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let generator = tiny_generator();
        let walk = LatentWalk::new(&generator, dir.path()).with_steps(2);

        walk.walk(0).unwrap();
        walk.walk(1).unwrap();

        assert!(dir.path().join("interpolated_000.png").exists());
        assert!(dir.path().join("interpolated_001.png").exists());
    }
}
