//! Loss functions for GAN training
//!
//! Binary cross entropy over the discriminator's sigmoid probabilities.
//! libtorch clamps the log terms, so saturated probabilities of exactly 0 or 1
//! still give finite losses. NaN probabilities are rejected by libtorch and
//! surface as errors.

use tch::{Kind, Reduction, Tensor};

use crate::error::Result;

/// Batch-sized vector of ones, the "real" target
pub fn real_labels(like: &Tensor) -> Tensor {
    Tensor::ones([like.size()[0]], (Kind::Float, like.device()))
}

/// Batch-sized vector of zeros, the "fake" target
pub fn fake_labels(like: &Tensor) -> Tensor {
    Tensor::zeros([like.size()[0]], (Kind::Float, like.device()))
}

/// True when every element is neither NaN nor infinite
pub fn all_finite(t: &Tensor) -> bool {
    t.isfinite().all().to_kind(Kind::Int64).int64_value(&[]) != 0
}

/// Mean binary cross entropy between probabilities and targets
pub fn bce(probs: &Tensor, targets: &Tensor) -> Result<Tensor> {
    Ok(probs.f_binary_cross_entropy::<Tensor>(targets, None, Reduction::Mean)?)
}

/// Generator loss: -log(D(G(z)))
///
/// The generator wants the discriminator to output 1 (real) for fake samples.
///
/// # Arguments
///
/// * `fake_probs` - Discriminator probabilities on generated samples, shape (batch)
pub fn generator_loss(fake_probs: &Tensor) -> Result<Tensor> {
    bce(fake_probs, &real_labels(fake_probs))
}

/// Discriminator loss: -log(D(x)) - log(1-D(G(z)))
///
/// Sum of the real-vs-ones and fake-vs-zeros cross entropies.
///
/// # Arguments
///
/// * `real_probs` - Discriminator probabilities on real samples, shape (batch)
/// * `fake_probs` - Discriminator probabilities on generated samples, shape (batch)
pub fn discriminator_loss(real_probs: &Tensor, fake_probs: &Tensor) -> Result<Tensor> {
    let real_loss = bce(real_probs, &real_labels(real_probs))?;
    let fake_loss = bce(fake_probs, &fake_labels(fake_probs))?;

    Ok(real_loss + fake_loss)
}
