//! Shared handle over a network's parameter set

use std::ops::Deref;

use tch::{nn, Tensor};

/// A network that exclusively owns one variable store.
///
/// Optimizers and checkpoints reach parameters only through this trait, so
/// each parameter set has exactly one owner.
pub trait Network {
    fn var_store(&self) -> &nn::VarStore;

    fn var_store_mut(&mut self) -> &mut nn::VarStore;

    /// Deep copies of the trainable parameters, in registration order
    fn snapshot(&self) -> Vec<Tensor> {
        self.var_store()
            .trainable_variables()
            .iter()
            .map(Tensor::copy)
            .collect()
    }

    /// Total number of trainable scalars
    fn parameter_count(&self) -> i64 {
        self.var_store()
            .trainable_variables()
            .iter()
            .map(Tensor::numel)
            .map(|n| n as i64)
            .sum()
    }

    /// Clear the accumulated gradients of every trainable variable
    fn zero_grad(&mut self) {
        for mut var in self.var_store().trainable_variables() {
            var.zero_grad();
        }
    }

    /// Run `f` with every variable of this network excluded from autograd.
    ///
    /// The variables are unfrozen again even if `f` panics.
    fn frozen<R>(&mut self, f: impl FnOnce(&Self) -> R) -> R
    where
        Self: Sized,
    {
        let guard = FrozenGuard::new(self);
        f(&*guard)
    }
}

/// Keeps a network frozen until dropped
struct FrozenGuard<'a, N: Network> {
    network: &'a mut N,
}

impl<'a, N: Network> FrozenGuard<'a, N> {
    fn new(network: &'a mut N) -> Self {
        network.var_store_mut().freeze();
        Self { network }
    }
}

impl<N: Network> Deref for FrozenGuard<'_, N> {
    type Target = N;

    fn deref(&self) -> &N {
        self.network
    }
}

impl<N: Network> Drop for FrozenGuard<'_, N> {
    fn drop(&mut self) {
        self.network.var_store_mut().unfreeze();
    }
}

/// True when two snapshots hold bit-identical tensors
pub fn snapshots_equal(a: &[Tensor], b: &[Tensor]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equal(y))
}
