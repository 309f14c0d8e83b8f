use crate::{
    augment::{geometry, AugmentationPolicy},
    common::*,
    data::{DatasetIndex, FileRecord, ImageLoader, Sample},
};

/// Produces the samples a loader worker pushes into its queue.
pub trait SampleSource
where
    Self: Send + Sync,
{
    /// Produce the next sample, or `None` if the source is exhausted.
    fn next_sample(&self, rng: &mut StdRng) -> Option<Sample>;
}

/// Load the image of a record. Failures are logged with the file path, the
/// caller substitutes a blank sample.
fn load_or_warn<L>(loader: &L, record: &FileRecord) -> Option<RgbImage>
where
    L: ImageLoader + ?Sized,
{
    match loader.load(&record.path) {
        Ok(image) => Some(image),
        Err(err) => {
            warn!("{:#}, substitute a blank sample", Error::from(err));
            None
        }
    }
}

/// Randomly drawn and augmented training samples.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TrainingSource {
    pub dataset: Arc<DatasetIndex>,
    #[derivative(Debug = "ignore")]
    pub loader: Arc<dyn ImageLoader>,
    pub policy: Arc<AugmentationPolicy>,
}

impl TrainingSource {
    fn draw(&self, rng: &mut StdRng) -> Sample {
        let image_size = self.policy.image_size();
        let record = &self.dataset.records()[rng.gen_range(0..self.dataset.len())];

        match load_or_warn(&*self.loader, record) {
            Some(image) => self.policy.augment(&image, &record.boxes, rng),
            None => Sample::blank(image_size),
        }
    }
}

impl SampleSource for TrainingSource {
    fn next_sample(&self, rng: &mut StdRng) -> Option<Sample> {
        if self.dataset.is_empty() {
            return None;
        }
        Some(self.policy.generate(rng, |rng| self.draw(rng)))
    }
}

/// Randomly drawn, letterboxed test samples without augmentation.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TestSource {
    pub dataset: Arc<DatasetIndex>,
    #[derivative(Debug = "ignore")]
    pub loader: Arc<dyn ImageLoader>,
    pub image_size: u32,
}

impl SampleSource for TestSource {
    fn next_sample(&self, rng: &mut StdRng) -> Option<Sample> {
        if self.dataset.is_empty() {
            return None;
        }
        let record = &self.dataset.records()[rng.gen_range(0..self.dataset.len())];
        let sample = match load_or_warn(&*self.loader, record) {
            Some(image) => geometry::letterbox_sample(&image, &record.boxes, self.image_size),
            None => Sample::blank(self.image_size),
        };
        Some(sample)
    }
}

/// Visits every record exactly once, in index order across all workers
/// sharing the source.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SequentialSource {
    pub dataset: Arc<DatasetIndex>,
    #[derivative(Debug = "ignore")]
    pub loader: Arc<dyn ImageLoader>,
    pub image_size: u32,
    cursor: AtomicUsize,
}

impl SequentialSource {
    pub fn new(dataset: Arc<DatasetIndex>, loader: Arc<dyn ImageLoader>, image_size: u32) -> Self {
        Self {
            dataset,
            loader,
            image_size,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl SampleSource for SequentialSource {
    fn next_sample(&self, _rng: &mut StdRng) -> Option<Sample> {
        let index = self.cursor.fetch_add(1, atomic::Ordering::SeqCst);
        let record = self.dataset.get(index)?;

        let sample = match load_or_warn(&*self.loader, record) {
            Some(image) => geometry::letterbox_sample(&image, &record.boxes, self.image_size),
            None => Sample::blank(self.image_size),
        };
        Some(sample)
    }
}
