//! The training program for yolo-dl project.

pub mod augment;
pub mod common;
pub mod config;
pub mod data;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod train;
pub mod utils;

use crate::{
    common::*,
    config::Config,
    data::{FileImageLoader, ImageLoader},
    model::DetectorTrainer,
    train::{TrainingOutcome, TrainingSession},
    utils::ArtifactPaths,
};

/// The entry of training program.
pub fn start<M>(config: &Config, model: M) -> Result<TrainingOutcome<M>>
where
    M: DetectorTrainer,
{
    start_with_loader(config, model, Arc::new(FileImageLoader))
}

/// Train with a custom image loader.
pub fn start_with_loader<M>(
    config: &Config,
    model: M,
    loader: Arc<dyn ImageLoader>,
) -> Result<TrainingOutcome<M>>
where
    M: DetectorTrainer,
{
    let start_time = Local::now();
    let paths = ArtifactPaths::new(&config.logging.dir, &config.logging.name);

    // create dirs and save config
    {
        fs::create_dir_all(paths.dir()).with_context(|| {
            format!("failed to create directory '{}'", paths.dir().display())
        })?;
        let path = paths.config_copy(&start_time);
        let text = serde_json::to_string_pretty(config)?;
        fs::write(&path, text)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
    }

    let session = TrainingSession::new(config, model, loader)?;
    session.run()
}
