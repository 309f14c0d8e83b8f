use anyhow::{ensure, Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use std::{fs, path::PathBuf, sync::Arc};
use structopt::StructOpt;
use tracing::info;
use train::{
    config::Config,
    data::{DatasetIndex, FileImageLoader},
    logging,
    pipeline::{SampleSource, TrainingSource},
    utils,
};

#[derive(Debug, Clone, StructOpt)]
/// Preview augmented YOLO training samples
struct Args {
    #[structopt(long, default_value = "train.json5")]
    /// configuration file
    pub config_file: PathBuf,
    #[structopt(long, default_value = "preview")]
    /// directory receiving the images
    pub output_dir: PathBuf,
    #[structopt(long, default_value = "16")]
    /// number of samples to write
    pub count: usize,
    #[structopt(long)]
    /// random seed
    pub seed: Option<u64>,
}

pub fn main() -> Result<()> {
    logging::init_tracing()?;

    // parse arguments
    let Args {
        config_file,
        output_dir,
        count,
        seed,
    } = Args::from_args();
    let config = Config::open(&config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))?;

    // load dataset
    let dataset = DatasetIndex::load_imglab(config.dataset.train_index_path())?;
    ensure!(!dataset.is_empty(), "the training set is empty");
    dataset.log_summary("training");

    let policy = config
        .augmentation
        .policy_init(config.dataset.image_size)
        .build()?;
    let source = TrainingSource {
        dataset: Arc::new(dataset),
        loader: Arc::new(FileImageLoader),
        policy: Arc::new(policy),
    };

    // write samples
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create directory '{}'", output_dir.display()))?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for index in 0..count {
        let mut sample = match source.next_sample(&mut rng) {
            Some(sample) => sample,
            None => break,
        };
        utils::draw_boxes(&mut sample.image, &sample.boxes);

        let path = output_dir.join(format!("sample_{:04}.png", index));
        sample
            .image
            .save(&path)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        info!(
            "write '{}' with {} boxes ({} ignored)",
            path.display(),
            sample.boxes.len(),
            sample.boxes.iter().filter(|bbox| bbox.ignore).count()
        );
    }

    Ok(())
}
