use crate::{
    common::*,
    data::{DatasetIndex, ImageLoader},
    metrics::{compute_metrics, Metrics},
    model::DetectorTrainer,
    pipeline::{LoaderPool, SampleQueue, SequentialSource},
    utils::{save_json, ArtifactPaths, BestMetrics},
};

/// The capacity of the evaluation queue.
pub const EVALUATION_QUEUE_CAPACITY: usize = 1000;

/// The confidence threshold of evaluated detections.
pub const EVALUATION_CONFIDENCE_THRESHOLD: f64 = 0.25;

/// Evaluates the model on the test set at epoch boundaries and keeps the best
/// checkpoints.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct EvaluationController {
    test_dataset: Arc<DatasetIndex>,
    #[derivative(Debug = "ignore")]
    loader: Arc<dyn ImageLoader>,
    image_size: u32,
    num_workers: usize,
    batch_size: usize,
    steps_per_epoch: usize,
    paths: ArtifactPaths,
    best: BestMetrics,
    last_evaluated_step: Option<usize>,
    seed: u64,
}

/// Unchecked evaluation parameters.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct EvaluationControllerInit {
    pub test_dataset: Arc<DatasetIndex>,
    #[derivative(Debug = "ignore")]
    pub loader: Arc<dyn ImageLoader>,
    pub image_size: u32,
    pub num_workers: usize,
    pub batch_size: usize,
    pub steps_per_epoch: usize,
    pub paths: ArtifactPaths,
    pub best: BestMetrics,
    pub seed: u64,
}

impl EvaluationControllerInit {
    pub fn build(self) -> Result<EvaluationController> {
        let Self {
            test_dataset,
            loader,
            image_size,
            num_workers,
            batch_size,
            steps_per_epoch,
            paths,
            best,
            seed,
        } = self;

        ensure!(!test_dataset.is_empty(), "the test set is empty");
        ensure!(num_workers > 0, "evaluation requires at least one worker");
        ensure!(batch_size > 0, "evaluation batch size must be positive");
        ensure!(steps_per_epoch > 0, "steps_per_epoch must be positive");

        Ok(EvaluationController {
            test_dataset,
            loader,
            image_size,
            num_workers,
            batch_size,
            steps_per_epoch,
            paths,
            best,
            last_evaluated_step: None,
            seed,
        })
    }
}

impl EvaluationController {
    pub fn best(&self) -> BestMetrics {
        self.best
    }

    /// Whether `steps` is an epoch boundary not evaluated yet.
    pub fn is_due(&self, steps: usize) -> bool {
        steps > 0
            && steps % self.steps_per_epoch == 0
            && self.last_evaluated_step != Some(steps)
    }

    /// Evaluate the model over the whole test set. A checkpoint is saved if
    /// either the mAP or the weighted F1 beats its best. Persistence failures
    /// are logged and do not fail the evaluation.
    pub fn evaluate<M>(&mut self, model: &M, steps: usize) -> Result<Metrics>
    where
        M: DetectorTrainer,
    {
        self.last_evaluated_step = Some(steps);
        let span = info_span!("evaluation", step = steps);
        let _enter = span.enter();

        let epoch = steps / self.steps_per_epoch;
        info!("evaluate {} test images", self.test_dataset.len());
        let since = Instant::now();

        let inference = model.snapshot_for_inference()?;
        let metrics = {
            let queue = Arc::new(SampleQueue::new(EVALUATION_QUEUE_CAPACITY)?);
            let source = Arc::new(SequentialSource::new(
                self.test_dataset.clone(),
                self.loader.clone(),
                self.image_size,
            ));
            let pool = LoaderPool::spawn(
                "evaluation",
                self.num_workers,
                source,
                queue.clone(),
                self.seed.wrapping_add(epoch as u64),
            )?;

            let metrics = compute_metrics(
                &inference,
                &queue,
                self.test_dataset.len(),
                self.batch_size,
                EVALUATION_CONFIDENCE_THRESHOLD,
            );
            pool.shutdown();
            metrics?
        };

        info!(
            "epoch {} evaluated in {:.1}s\n{}\n{}",
            epoch,
            since.elapsed().as_secs_f64(),
            Metrics::HEADER,
            metrics
        );

        let map = metrics.map;
        let weighted_f1 = metrics.weighted.f1;

        if self.best.is_improved_by(map, weighted_f1) {
            let path = self.paths.checkpoint(steps, map, weighted_f1);
            match model.save(&path) {
                Ok(()) => info!("save checkpoint '{}'", path.display()),
                Err(err) => error!("failed to save checkpoint '{}': {:#}", path.display(), err),
            }
        }
        self.best.observe(map, weighted_f1);

        let best_path = self.paths.best_metrics();
        if let Err(err) = save_json(&best_path, &self.best) {
            error!("failed to save '{}': {:#}", best_path.display(), err);
        }
        info!(
            "best mAP {:.4}, best weighted F1 {:.4}",
            self.best.map, self.best.weighted_f1
        );

        Ok(metrics)
    }
}
