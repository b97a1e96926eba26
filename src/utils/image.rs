//! Image grid and PNG helpers

use std::path::Path;

use tch::{Kind, Tensor};

use crate::error::{GanError, Result};

/// Images per row of a logged batch grid
pub const LOG_GRID_ROW: i64 = 8;
/// Most images shown from one logged batch
pub const LOG_GRID_MAX: i64 = 64;
/// Pixels between grid cells
pub const GRID_PADDING: i64 = 2;

/// Map generator output from [-1, 1] to [0, 1]
pub fn denormalize(images: &Tensor) -> Tensor {
    images * 0.5 + 0.5
}

/// Arrange a batch of images into one image, `nrow` per row.
///
/// `frames` has shape (N, C, H, W). Single-channel frames are expanded to
/// three channels; cells are separated by `padding` pixels of zeros. A batch
/// of one image is returned unpadded.
pub fn image_grid(frames: &Tensor, nrow: i64, padding: i64) -> Result<Tensor> {
    let size = frames.size();
    let [n, c, h, w] = size.as_slice() else {
        return Err(GanError::shape("image grid", "(N, C, H, W)", size.clone()));
    };
    let (n, c, h, w) = (*n, *c, *h, *w);
    if n == 0 || nrow <= 0 || !(c == 1 || c == 3) {
        return Err(GanError::shape("image grid", "N > 0 images with 1 or 3 channels", size));
    }

    let frames = frames.detach();
    let frames = if c == 1 { frames.repeat([1, 3, 1, 1]) } else { frames };
    if n == 1 {
        return Ok(frames.squeeze_dim(0));
    }

    let xmaps = nrow.min(n);
    let ymaps = (n + xmaps - 1) / xmaps;
    let cell_h = h + padding;
    let cell_w = w + padding;
    let grid = Tensor::zeros(
        [3, ymaps * cell_h + padding, xmaps * cell_w + padding],
        (frames.kind(), frames.device()),
    );

    for k in 0..n {
        let (y, x) = (k / xmaps, k % xmaps);
        let mut cell = grid
            .narrow(1, y * cell_h + padding, h)
            .narrow(2, x * cell_w + padding, w);
        cell.copy_(&frames.get(k));
    }

    Ok(grid)
}

/// Grid of up to the first 64 images of a [-1, 1] batch, denormalized to [0, 1]
pub fn reshape_images(batch: &Tensor) -> Result<Tensor> {
    let n = batch.size().first().copied().unwrap_or(0).min(LOG_GRID_MAX);
    let shown = batch.narrow(0, 0, n);
    image_grid(&denormalize(&shown), LOG_GRID_ROW, GRID_PADDING)
}

/// Write a (C, H, W) image with values in [0, 1] as PNG
pub fn save_image(image: &Tensor, path: impl AsRef<Path>) -> Result<()> {
    let bytes = (image.detach() * 255.0 + 0.5)
        .clamp(0.0, 255.0)
        .to_kind(Kind::Uint8)
        .to_device(tch::Device::Cpu);
    tch::vision::image::save(&bytes, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    #[test]
    fn test_denormalize_range() {
        let x = Tensor::from_slice(&[-1.0f32, 0.0, 1.0]);
        let y = denormalize(&x);
        assert_eq!(Vec::<f32>::try_from(&y).unwrap(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_image_grid_layout() {
        let frames = Tensor::ones([10, 3, 4, 4], (Kind::Float, Device::Cpu));
        let grid = image_grid(&frames, 10, 2).unwrap();

        // 10 frames in one row: width = 10 * (4 + 2) + 2, height = 4 + 2 * 2
        assert_eq!(grid.size(), vec![3, 8, 62]);
        // Padding stays zero, cells are copied
        assert_eq!(grid.double_value(&[0, 0, 0]), 0.0);
        assert_eq!(grid.double_value(&[0, 2, 2]), 1.0);
    }

    #[test]
    fn test_image_grid_wraps_rows_and_expands_gray() {
        let frames = Tensor::ones([5, 1, 4, 4], (Kind::Float, Device::Cpu));
        let grid = image_grid(&frames, 2, 2).unwrap();

        assert_eq!(grid.size(), vec![3, 3 * 6 + 2, 2 * 6 + 2]);
    }

    #[test]
    fn test_reshape_images_caps_at_64() {
        let batch = Tensor::zeros([70, 3, 8, 8], (Kind::Float, Device::Cpu));
        let grid = reshape_images(&batch).unwrap();

        assert_eq!(grid.size(), vec![3, 8 * 10 + 2, 8 * 10 + 2]);
        assert!((grid.max().double_value(&[]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_save_image_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.png");
        let image = Tensor::rand([3, 16, 16], (Kind::Float, Device::Cpu));

        save_image(&image, &path).unwrap();
        assert!(path.exists());
    }
}
