//! Optimizers bound to a single network

use std::marker::PhantomData;

use tch::{nn, nn::OptimizerConfig, Tensor};

use crate::error::Result;
use crate::model::Network;

/// Adam optimizer over exactly one network's parameter set.
///
/// The type parameter records which network the optimizer was built from, so
/// a training step that asks for `NetworkOptimizer<Discriminator>` can never be
/// handed the generator's optimizer.
pub struct NetworkOptimizer<N> {
    inner: nn::Optimizer,
    _owner: PhantomData<fn() -> N>,
}

impl<N: Network> NetworkOptimizer<N> {
    /// Adam with the given learning rate and (beta1, beta2), no weight decay
    pub fn adam(network: &N, lr: f64, betas: (f64, f64)) -> Result<Self> {
        let inner = nn::Adam {
            beta1: betas.0,
            beta2: betas.1,
            ..Default::default()
        }
        .build(network.var_store(), lr)?;

        Ok(Self {
            inner,
            _owner: PhantomData,
        })
    }

    /// Clear gradients, backpropagate `loss` and update the owned parameters
    pub fn backward_step(&mut self, loss: &Tensor) {
        self.inner.zero_grad();
        loss.backward();
        self.inner.step();
    }
}
