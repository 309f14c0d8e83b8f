use crate::common::*;
use std::f64::consts::PI;

/// The factor applied to the learning rate on a loss plateau.
pub const SHRINK_FACTOR: f64 = 0.1;

/// The smallest learning rate of the warm-up ramp.
const WARMUP_START: f64 = 1e-99;

/// How the learning rate decays after the warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DecayPolicy {
    /// Follow a cosine curve until the given epoch.
    Cosine { epochs: usize },
    /// Shrink when the loss stops improving for `patience` epochs.
    Plateau { patience: usize },
}

/// The phase of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Warmup,
    Steady,
    Cosine,
    Finished,
}

/// Counts the steps since the best loss of a loss stream.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlateauCounter {
    pub best_loss: Option<f64>,
    pub steps_without_improvement: usize,
}

impl PlateauCounter {
    pub fn observe(&mut self, loss: f64) {
        let improved = loss.is_finite() && self.best_loss.map_or(true, |best| loss < best);
        if improved {
            self.best_loss = Some(loss);
            self.steps_without_improvement = 0;
        } else {
            self.steps_without_improvement += 1;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The persisted progress of the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    /// The number of completed training steps.
    pub steps: usize,
    pub phase: Phase,
    /// The learning rate of the steady phase.
    pub learning_rate: f64,
    pub train_plateau: PlateauCounter,
    pub test_plateau: PlateauCounter,
}

/// Unchecked schedule parameters.
#[derive(Debug, Clone)]
pub struct LrSchedulerInit {
    pub base_lr: f64,
    pub min_lr: f64,
    pub warmup_steps: usize,
    pub steps_per_epoch: usize,
    pub decay: DecayPolicy,
    /// The number of test steps per test epoch, or `None` if no periodic
    /// test runs.
    pub test_epoch_steps: Option<usize>,
}

impl LrSchedulerInit {
    /// Build the scheduler, resuming from a persisted state if given.
    pub fn build(self, state: Option<ScheduleState>) -> Result<LrScheduler> {
        let Self {
            base_lr,
            min_lr,
            warmup_steps,
            steps_per_epoch,
            decay,
            test_epoch_steps,
        } = self;

        ensure!(steps_per_epoch > 0, "steps_per_epoch must be positive");
        ensure!(
            min_lr > 0.0 && min_lr < base_lr,
            "learning rates must satisfy 0 < min_lr < base_lr"
        );

        let decay = match decay {
            DecayPolicy::Cosine { epochs } => {
                let total_steps = epochs * steps_per_epoch;
                ensure!(
                    total_steps > warmup_steps,
                    "the cosine schedule must end after the warm-up"
                );
                Decay::Cosine {
                    num_steps: total_steps - warmup_steps,
                }
            }
            DecayPolicy::Plateau { patience } => Decay::Plateau {
                train_patience: patience * steps_per_epoch,
                test_patience: test_epoch_steps
                    .map(|steps| patience * steps)
                    .unwrap_or(0),
            },
        };

        let state = state.unwrap_or(ScheduleState {
            steps: 0,
            phase: Phase::Warmup,
            learning_rate: base_lr,
            train_plateau: PlateauCounter::default(),
            test_plateau: PlateauCounter::default(),
        });

        match (state.phase, decay) {
            (Phase::Steady, Decay::Cosine { .. }) | (Phase::Cosine, Decay::Plateau { .. }) => {
                bail!(
                    "the persisted {:?} phase does not match the configured decay policy",
                    state.phase
                );
            }
            _ => {}
        }

        let mut scheduler = LrScheduler {
            base_lr,
            min_lr,
            warmup_steps,
            decay,
            state,
        };

        // resuming inside the ramp continues it, a finished ramp is never replayed
        match scheduler.state.phase {
            Phase::Warmup if scheduler.state.steps >= warmup_steps => scheduler.decide(),
            Phase::Warmup => {}
            _ if scheduler.state.steps < warmup_steps => {
                info!(
                    "resume in {:?} phase at step {}, skip the remaining warm-up",
                    scheduler.state.phase, scheduler.state.steps
                );
            }
            _ => {}
        }

        Ok(scheduler)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Decay {
    Cosine {
        num_steps: usize,
    },
    Plateau {
        train_patience: usize,
        test_patience: usize,
    },
}

/// The learning rate state machine: warm-up, then either cosine annealing or
/// plateau-driven decay.
#[derive(Debug, Clone)]
pub struct LrScheduler {
    base_lr: f64,
    min_lr: f64,
    warmup_steps: usize,
    decay: Decay,
    state: ScheduleState,
}

impl LrScheduler {
    /// The learning rate of the next training step.
    pub fn learning_rate(&self) -> f64 {
        let steps = self.state.steps;

        match self.state.phase {
            Phase::Warmup => linspace_at(WARMUP_START, self.base_lr, self.warmup_steps, steps),
            Phase::Steady => self.state.learning_rate,
            Phase::Cosine | Phase::Finished => match self.decay {
                Decay::Cosine { num_steps } => {
                    let index = steps.saturating_sub(self.warmup_steps).min(num_steps - 1);
                    self.cosine_at(num_steps, index)
                }
                Decay::Plateau { .. } => self.state.learning_rate,
            },
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn steps(&self) -> usize {
        self.state.steps
    }

    pub fn is_finished(&self) -> bool {
        self.state.phase == Phase::Finished
    }

    /// A copy of the state to persist.
    pub fn state(&self) -> ScheduleState {
        self.state.clone()
    }

    /// Account a completed training step with its loss.
    pub fn record_train_step(&mut self, loss: f64) {
        self.state.steps += 1;

        match self.state.phase {
            Phase::Warmup => {
                if self.state.steps >= self.warmup_steps {
                    self.decide();
                }
            }
            Phase::Cosine => {
                if let Decay::Cosine { num_steps } = self.decay {
                    if self.state.steps.saturating_sub(self.warmup_steps) >= num_steps {
                        info!("cosine schedule completed at step {}", self.state.steps);
                        self.state.phase = Phase::Finished;
                    }
                }
            }
            Phase::Steady => {
                if let Decay::Plateau { train_patience, .. } = self.decay {
                    self.state.train_plateau.observe(loss);
                    if train_patience > 0
                        && self.state.train_plateau.steps_without_improvement >= train_patience
                    {
                        self.shrink("training");
                    }
                }
            }
            Phase::Finished => {}
        }
    }

    /// Account a test step with its loss. Only the steady phase reacts to
    /// test losses.
    pub fn record_test_step(&mut self, loss: f64) {
        if self.state.phase != Phase::Steady {
            return;
        }
        if let Decay::Plateau { test_patience, .. } = self.decay {
            if test_patience == 0 {
                return;
            }
            self.state.test_plateau.observe(loss);
            if self.state.test_plateau.steps_without_improvement >= test_patience {
                self.shrink("test");
            }
        }
    }

    fn decide(&mut self) {
        self.state.phase = match self.decay {
            Decay::Cosine { .. } => {
                info!("warm-up done at step {}, enter cosine schedule", self.state.steps);
                Phase::Cosine
            }
            Decay::Plateau { .. } => {
                info!("warm-up done at step {}, enter plateau decay", self.state.steps);
                self.state.learning_rate = self.base_lr;
                Phase::Steady
            }
        };
    }

    fn shrink(&mut self, stream: &str) {
        self.state.learning_rate *= SHRINK_FACTOR;
        self.state.train_plateau.reset();
        self.state.test_plateau.reset();
        info!(
            "{} loss plateau at step {}, shrink learning rate to {:e}",
            stream, self.state.steps, self.state.learning_rate
        );

        if self.state.learning_rate < self.min_lr {
            info!("learning rate is below {:e}, stop training", self.min_lr);
            self.state.phase = Phase::Finished;
        }
    }

    fn cosine_at(&self, num_steps: usize, index: usize) -> f64 {
        let ratio = linspace_at(0.0, 1.0, num_steps, index);
        self.min_lr + 0.5 * (self.base_lr - self.min_lr) * (1.0 + (PI * ratio).cos())
    }
}

/// The `index`-th of `len` evenly spaced values from `start` to `end`.
fn linspace_at(start: f64, end: f64, len: usize, index: usize) -> f64 {
    if len <= 1 {
        return end;
    }
    let index = index.min(len - 1);
    start + (end - start) * index as f64 / (len - 1) as f64
}
