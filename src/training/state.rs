//! Training counters and the phase state machine

/// Phase of the adversarial training loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    DiscriminatorStep,
    GeneratorStep,
    Checkpointing,
    Done,
}

impl Phase {
    /// Whether the loop may move from `self` to `next`
    pub fn can_transition(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, DiscriminatorStep)
                | (Idle, Done)
                | (DiscriminatorStep, DiscriminatorStep)
                | (DiscriminatorStep, GeneratorStep)
                | (GeneratorStep, Idle)
                | (GeneratorStep, Checkpointing)
                | (Checkpointing, Idle)
        )
    }
}

/// Counters threaded through every training step by value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrainerState {
    /// Zero-based epoch index
    pub epoch: usize,
    /// Completed generator updates across the whole run
    pub generator_iteration: u64,
    pub phase: Phase,
}

impl TrainerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for continuing a run at `epoch` with `generator_iteration` updates done
    pub fn resume(epoch: usize, generator_iteration: u64) -> Self {
        Self {
            epoch,
            generator_iteration,
            phase: Phase::Idle,
        }
    }

    /// Move to `next`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds on a transition the loop never makes.
    pub fn transition(self, next: Phase) -> Self {
        debug_assert!(
            self.phase.can_transition(next),
            "invalid phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        Self { phase: next, ..self }
    }

    pub(crate) fn at_epoch(self, epoch: usize) -> Self {
        Self { epoch, ..self }
    }

    pub(crate) fn generator_updated(self) -> Self {
        Self {
            generator_iteration: self.generator_iteration + 1,
            ..self
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }
}
