//! The training driver.

mod evaluation;
mod lr_scheduler;

pub use evaluation::*;
pub use lr_scheduler::*;

use crate::{
    common::*,
    config::Config,
    data::{DatasetIndex, ImageLoader},
    model::DetectorTrainer,
    pipeline::{assemble, LoaderPool, SampleQueue, TestSource, TrainingSource},
    utils::{
        load_json, save_json, try_load_checkpoint, write_atomic, ArtifactPaths, BestMetrics,
        RateCounter, TrainerState,
    },
};

/// Training queue capacity in mini-batches.
const TRAIN_QUEUE_BATCHES: usize = 100;

/// Test queue capacity in per-device mini-batches.
const TEST_QUEUE_BATCHES: usize = 10;

/// The number of test data loaders.
const NUM_TEST_WORKERS: usize = 2;

/// The kind and loss of a completed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepKind {
    Train { loss: f64 },
    Test { loss: f64 },
}

/// The result of a completed training run.
#[derive(Debug)]
pub struct TrainingOutcome<M> {
    pub model: M,
    /// The number of completed training steps.
    pub steps: usize,
    pub best: BestMetrics,
}

/// The training loop together with its loaders, scheduler and evaluation.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct TrainingSession<M>
where
    M: DetectorTrainer,
{
    #[derivative(Debug = "ignore")]
    model: M,
    scheduler: LrScheduler,
    evaluation: Option<EvaluationController>,
    paths: ArtifactPaths,
    train_pool: LoaderPool,
    test_pool: Option<LoaderPool>,
    batch_size: usize,
    steps_per_epoch: usize,
    test_period: usize,
    test_cycle: usize,
    save_state_steps: Option<usize>,
    last_epoch_step: Option<usize>,
    rate_counter: RateCounter,
}

impl<M> TrainingSession<M>
where
    M: DetectorTrainer,
{
    /// Load the datasets, restore the checkpoint and start the loaders.
    pub fn new(config: &Config, mut model: M, loader: Arc<dyn ImageLoader>) -> Result<Self> {
        let Config {
            dataset: ref dataset_config,
            ref training,
            ref logging,
            ..
        } = *config;
        let image_size = dataset_config.image_size;
        let batch_size = training.batch_size();
        let num_workers = training.num_workers();
        let seed = training.seed.unwrap_or_else(rand::random);
        let paths = ArtifactPaths::new(&logging.dir, &logging.name);

        // load datasets
        let train_dataset = {
            let path = dataset_config.train_index_path();
            let dataset = DatasetIndex::load_imglab(&path)?;
            ensure!(!dataset.is_empty(), "'{}' has no images", path.display());
            dataset.log_summary("training");
            Arc::new(dataset)
        };
        let test_dataset = {
            let path = dataset_config.test_index_path();
            if path.is_file() {
                let dataset = DatasetIndex::load_imglab(&path)?;
                dataset.log_summary("test");
                Some(Arc::new(dataset)).filter(|dataset| !dataset.is_empty())
            } else {
                ensure!(
                    training.test_period == 0,
                    "test steps require the test set '{}'",
                    path.display()
                );
                warn!("'{}' not found, evaluation is disabled", path.display());
                None
            }
        };

        let steps_per_epoch = train_dataset.len() / batch_size;
        ensure!(
            steps_per_epoch > 0,
            "the training set has {} images, fewer than a mini-batch of {}",
            train_dataset.len(),
            batch_size
        );
        info!(
            "{} steps per epoch with mini-batch size {}",
            steps_per_epoch, batch_size
        );

        // restore
        let state = try_load_checkpoint(&mut model, &paths, &training.load_checkpoint)?;
        let (schedule_state, test_cycle) = match state {
            Some(TrainerState {
                schedule,
                test_cycle,
            }) => (Some(schedule), test_cycle),
            None => (None, 0),
        };

        let test_epoch_steps = match (&test_dataset, training.test_period) {
            (Some(dataset), period) if period > 0 => Some((dataset.len() / batch_size).max(1)),
            _ => None,
        };
        let scheduler = LrSchedulerInit {
            base_lr: training.learning_rate.raw(),
            min_lr: training.min_learning_rate.raw(),
            warmup_steps: training.warmup_epochs * steps_per_epoch,
            steps_per_epoch,
            decay: training.decay_policy(),
            test_epoch_steps,
        }
        .build(schedule_state)?;
        model.set_learning_rate(scheduler.learning_rate());

        let best: BestMetrics = load_json(&paths.best_metrics())?.unwrap_or_default();

        // evaluation
        let evaluation = test_dataset
            .as_ref()
            .map(|test_dataset| {
                EvaluationControllerInit {
                    test_dataset: test_dataset.clone(),
                    loader: loader.clone(),
                    image_size,
                    num_workers,
                    batch_size: 2 * training.batch_size_per_device.get(),
                    steps_per_epoch,
                    paths: paths.clone(),
                    best,
                    seed,
                }
                .build()
            })
            .transpose()?;

        // start loaders
        let train_pool = {
            let policy = config.augmentation.policy_init(image_size).build()?;
            let source = Arc::new(TrainingSource {
                dataset: train_dataset,
                loader: loader.clone(),
                policy: Arc::new(policy),
            });
            let queue = Arc::new(SampleQueue::new(TRAIN_QUEUE_BATCHES * batch_size)?);
            LoaderPool::spawn("training", num_workers, source, queue, seed)?
        };

        let test_pool = match (&test_dataset, training.test_period) {
            (Some(dataset), period) if period > 0 => {
                let source = Arc::new(TestSource {
                    dataset: dataset.clone(),
                    loader,
                    image_size,
                });
                let queue = Arc::new(SampleQueue::new(
                    TEST_QUEUE_BATCHES * training.batch_size_per_device.get(),
                )?);
                let pool = LoaderPool::spawn(
                    "test",
                    NUM_TEST_WORKERS,
                    source,
                    queue,
                    seed.wrapping_mul(31).wrapping_add(7),
                )?;
                Some(pool)
            }
            _ => None,
        };

        Ok(Self {
            model,
            scheduler,
            evaluation,
            paths,
            train_pool,
            test_pool,
            batch_size,
            steps_per_epoch,
            test_period: training.test_period,
            test_cycle,
            save_state_steps: training.save_state_steps.map(NonZeroUsize::get),
            last_epoch_step: None,
            rate_counter: RateCounter::with_second_interval(),
        })
    }

    pub fn has_test_loader(&self) -> bool {
        self.test_pool.is_some()
    }

    pub fn scheduler(&self) -> &LrScheduler {
        &self.scheduler
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run a single train or test step.
    pub fn step(&mut self) -> Result<StepKind> {
        let is_test_step = match &self.test_pool {
            Some(_) => {
                self.test_cycle += 1;
                self.test_cycle % self.test_period == 0
            }
            None => false,
        };

        match (&self.test_pool, is_test_step) {
            (Some(pool), true) => {
                let batch = assemble(pool.queue(), self.batch_size)
                    .ok_or_else(|| format_err!("the test queue is closed"))?;
                let loss = self.model.test_step(&batch)?;
                self.scheduler.record_test_step(loss);
                Ok(StepKind::Test { loss })
            }
            _ => {
                self.model.set_learning_rate(self.scheduler.learning_rate());
                let batch = assemble(self.train_pool.queue(), self.batch_size)
                    .ok_or_else(|| format_err!("the training queue is closed"))?;
                let loss = self.model.train_step(&batch)?;
                self.scheduler.record_train_step(loss);
                Ok(StepKind::Train { loss })
            }
        }
    }

    /// Train until the learning rate schedule finishes, then save the final
    /// model.
    pub fn run(mut self) -> Result<TrainingOutcome<M>> {
        info!(
            "start training at step {} in {:?} phase",
            self.scheduler.steps(),
            self.scheduler.phase()
        );

        loop {
            let steps = self.scheduler.steps();

            // test steps leave the step count unchanged
            let is_epoch_end = steps > 0
                && steps % self.steps_per_epoch == 0
                && self.last_epoch_step != Some(steps);

            if is_epoch_end {
                self.last_epoch_step = Some(steps);

                if let Some(evaluation) = &mut self.evaluation {
                    if evaluation.is_due(steps) {
                        if let Err(err) = evaluation.evaluate(&self.model, steps) {
                            error!("evaluation at step {} failed: {:#}", steps, err);
                        }
                    }
                }
                self.sync();
            }

            if self.scheduler.is_finished() {
                break;
            }

            let lr = self.scheduler.learning_rate();
            match self.step()? {
                StepKind::Train { loss } => {
                    let steps = self.scheduler.steps();
                    self.rate_counter.add(1.0);

                    if let Some(batch_rate) = self.rate_counter.rate() {
                        info!(
                            "epoch: {}\tstep: {}\tlr: {:.3e}\tloss: {:.4}\t{:.2} batches/s\t{:.2} samples/s",
                            steps / self.steps_per_epoch,
                            steps,
                            lr,
                            loss,
                            batch_rate,
                            batch_rate * self.batch_size as f64
                        );
                    }

                    if let Some(period) = self.save_state_steps {
                        if steps % period == 0 {
                            self.sync();
                        }
                    }
                }
                StepKind::Test { loss } => {
                    debug!("test loss {:.4} at step {}", loss, self.scheduler.steps());
                }
            }
        }

        self.sync();
        self.train_pool.shutdown();
        if let Some(pool) = self.test_pool {
            pool.shutdown();
        }

        let final_path = self.paths.final_model();
        self.model
            .save(&final_path)
            .with_context(|| format!("failed to save '{}'", final_path.display()))?;
        info!(
            "training finished at step {}, model saved to '{}'",
            self.scheduler.steps(),
            final_path.display()
        );

        let best = match &self.evaluation {
            Some(evaluation) => evaluation.best(),
            None => BestMetrics::default(),
        };

        Ok(TrainingOutcome {
            model: self.model,
            steps: self.scheduler.steps(),
            best,
        })
    }

    /// Persist the model and the trainer state. Failures are logged.
    fn sync(&self) {
        let state = TrainerState {
            schedule: self.scheduler.state(),
            test_cycle: self.test_cycle,
        };
        let model_path = self.paths.sync_model();
        let state_path = self.paths.sync_state();

        let result = write_atomic(&model_path, |tmp_path| self.model.save(tmp_path))
            .and_then(|()| save_json(&state_path, &state));

        match result {
            Ok(()) => debug!("synchronized at step {}", state.schedule.steps),
            Err(err) => error!("failed to synchronize trainer state: {:#}", err),
        }
    }
}
