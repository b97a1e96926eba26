//! DataLoader for batching and iterating over training images
//!
//! Provides batching for GAN training with support for:
//! - Random shuffling (optionally seeded)
//! - Loading and normalizing a folder of images
//!
//! The trailing batch of an epoch may be short; the trainer decides whether
//! to use it.

use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tch::{Kind, Tensor};

use crate::error::{GanError, Result};

/// Source of real image batches consumed by the trainer
pub trait BatchSource {
    /// Total number of samples in the dataset
    fn num_samples(&self) -> usize;

    /// Start a new epoch
    fn reset(&mut self);

    /// Next batch of shape (batch, channels, H, W), `None` when the epoch is done
    fn next_batch(&mut self) -> Option<Tensor>;
}

/// DataLoader over an in-memory image tensor
#[derive(Debug)]
pub struct ImageDataLoader {
    /// Full dataset of shape (num_images, channels, H, W), values in [-1, 1]
    images: Tensor,
    /// Batch size
    batch_size: usize,
    /// Whether to shuffle data each epoch
    shuffle: bool,
    /// Current indices for iteration
    indices: Vec<i64>,
    /// Current position in iteration
    current_idx: usize,
    rng: StdRng,
}

impl ImageDataLoader {
    /// Create a new DataLoader
    ///
    /// # Arguments
    ///
    /// * `images` - 4D tensor of shape (num_images, channels, H, W)
    /// * `batch_size` - Number of images per batch
    /// * `shuffle` - Whether to shuffle data each epoch
    /// * `seed` - Seed for the shuffler; entropy-seeded when `None`
    pub fn new(images: Tensor, batch_size: usize, shuffle: bool, seed: Option<u64>) -> Result<Self> {
        let size = images.size();
        if size.len() != 4 {
            return Err(GanError::shape("image dataset", "(N, C, H, W)", size));
        }
        if batch_size == 0 {
            return Err(GanError::Config("batch size must be > 0".to_string()));
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut loader = Self {
            indices: (0..size[0]).collect(),
            images,
            batch_size,
            shuffle,
            current_idx: 0,
            rng,
        };

        if shuffle {
            loader.shuffle_indices();
        }

        Ok(loader)
    }

    /// Load every image in `dir`, resized to `image_size`×`image_size`
    ///
    /// Pixels are normalized to [-1, 1]; `channels` = 1 converts to grayscale.
    pub fn from_image_dir(
        dir: impl AsRef<Path>,
        image_size: i64,
        channels: i64,
        batch_size: usize,
        shuffle: bool,
        seed: Option<u64>,
    ) -> Result<Self> {
        let raw = tch::vision::image::load_dir(dir.as_ref(), image_size, image_size)?;
        let images = raw.to_kind(Kind::Float) / 127.5 - 1.0;

        let images = match channels {
            3 => images,
            1 => images.mean_dim(Some([1i64].as_slice()), true, Kind::Float),
            other => {
                return Err(GanError::Config(format!(
                    "image folders load as 1 or 3 channels, {other} requested"
                )))
            }
        };

        tracing::info!(
            "Loaded {} images of size {}x{} from {}",
            images.size()[0],
            image_size,
            image_size,
            dir.as_ref().display()
        );
        Self::new(images, batch_size, shuffle, seed)
    }

    /// Shuffle indices for a new epoch
    fn shuffle_indices(&mut self) {
        self.indices.shuffle(&mut self.rng);
    }
}

impl BatchSource for ImageDataLoader {
    fn num_samples(&self) -> usize {
        self.indices.len()
    }

    fn reset(&mut self) {
        self.current_idx = 0;
        if self.shuffle {
            self.shuffle_indices();
        }
    }

    fn next_batch(&mut self) -> Option<Tensor> {
        let num_samples = self.indices.len();
        let start = self.current_idx;

        if start >= num_samples {
            return None;
        }

        let end = (start + self.batch_size).min(num_samples);

        let index = Tensor::from_slice(&self.indices[start..end]).to_device(self.images.device());
        self.current_idx = end;
        Some(self.images.index_select(0, &index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn dataset(n: i64) -> Tensor {
        Tensor::arange(n, (Kind::Float, Device::Cpu)).view([n, 1, 1, 1])
    }

    fn epoch(loader: &mut ImageDataLoader) -> Vec<Tensor> {
        loader.reset();
        std::iter::from_fn(|| loader.next_batch()).collect()
    }

    #[test]
    fn test_dataloader_basic() {
        let mut loader = ImageDataLoader::new(dataset(10), 3, false, None).unwrap();

        assert_eq!(loader.num_samples(), 10);

        let sizes: Vec<i64> = epoch(&mut loader).iter().map(|b| b.size()[0]).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
    }

    #[test]
    fn test_dataloader_reset_starts_new_epoch() {
        let mut loader = ImageDataLoader::new(dataset(4), 2, false, None).unwrap();

        assert_eq!(epoch(&mut loader).len(), 2);
        assert!(loader.next_batch().is_none());
        assert_eq!(epoch(&mut loader).len(), 2);
    }

    #[test]
    fn test_dataloader_keeps_order_without_shuffle() {
        let mut loader = ImageDataLoader::new(dataset(4), 2, false, None).unwrap();

        let first = loader.next_batch().unwrap();
        assert_eq!(Vec::<f32>::try_from(&first.view([-1])).unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible_and_complete() {
        let collect = || {
            let mut loader = ImageDataLoader::new(dataset(16), 4, true, Some(11)).unwrap();
            let batches = epoch(&mut loader);
            Vec::<f32>::try_from(&Tensor::cat(&batches, 0).view([-1])).unwrap()
        };

        let a = collect();
        assert_eq!(a, collect());

        let mut sorted = a.clone();
        sorted.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_eq!(sorted, (0..16).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_dataloader_rejects_wrong_rank() {
        let flat = Tensor::zeros([10, 64], (Kind::Float, Device::Cpu));
        assert!(ImageDataLoader::new(flat, 2, false, None).is_err());
    }

    #[test]
    fn test_dataloader_rejects_zero_batch_size() {
        assert!(ImageDataLoader::new(dataset(4), 0, false, None).is_err());
    }
}
