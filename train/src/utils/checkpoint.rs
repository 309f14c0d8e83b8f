use crate::{
    common::*, config::LoadCheckpoint, model::DetectorTrainer, train::ScheduleState,
};
use serde::de::DeserializeOwned;

/// The time format embedded in file names.
pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";

/// The file locations of an experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    dir: PathBuf,
    name: String,
}

impl ArtifactPaths {
    pub fn new<P>(dir: P, name: &str) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            dir: dir.as_ref().to_owned(),
            name: name.to_owned(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The trainer state written on synchronization.
    pub fn sync_state(&self) -> PathBuf {
        self.dir.join(format!("{}_sync.json", self.name))
    }

    /// The model parameters written on synchronization.
    pub fn sync_model(&self) -> PathBuf {
        self.dir.join(format!("{}_sync.model", self.name))
    }

    pub fn best_metrics(&self) -> PathBuf {
        self.dir.join(format!("{}_best_metrics.json", self.name))
    }

    pub fn final_model(&self) -> PathBuf {
        self.dir.join(format!("{}.model", self.name))
    }

    /// A checkpoint tagged with the step and its evaluation results.
    pub fn checkpoint(&self, step: usize, map: f64, weighted_f1: f64) -> PathBuf {
        self.dir.join(format!(
            "{}_{:06}_{:.4}_{:.4}.model",
            self.name, step, map, weighted_f1
        ))
    }

    /// The copy of the configuration used by a run started at `time`.
    pub fn config_copy(&self, time: &DateTime<Local>) -> PathBuf {
        self.dir.join(format!(
            "{}_config_{}.json5",
            self.name,
            time.format(FILE_STRFTIME)
        ))
    }
}

/// Write through a temporary file in the same directory, then move it into
/// place.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let tmp_path = {
        let mut file_name = path
            .file_name()
            .ok_or_else(|| format_err!("'{}' is not a file path", path.display()))?
            .to_owned();
        file_name.push(".tmp");
        path.with_file_name(file_name)
    };

    write(&tmp_path).with_context(|| format!("failed to write '{}'", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to move '{}' to '{}'",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

pub fn save_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize,
{
    let text = serde_json::to_string_pretty(value)?;
    write_atomic(path, |tmp_path| {
        fs::write(tmp_path, &text)?;
        Ok(())
    })
}

/// Load a JSON file, or `None` if it does not exist.
pub fn load_json<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse '{}'", path.display()))?;
    Ok(Some(value))
}

/// The best evaluation results so far. Serialized as `[map, weighted_f1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct BestMetrics {
    pub map: f64,
    pub weighted_f1: f64,
}

impl BestMetrics {
    /// Whether either score beats its best.
    pub fn is_improved_by(&self, map: f64, weighted_f1: f64) -> bool {
        map > self.map || weighted_f1 > self.weighted_f1
    }

    /// Track each best independently. Returns true if either improved.
    pub fn observe(&mut self, map: f64, weighted_f1: f64) -> bool {
        let improved = self.is_improved_by(map, weighted_f1);
        self.map = self.map.max(map);
        self.weighted_f1 = self.weighted_f1.max(weighted_f1);
        improved
    }
}

impl From<(f64, f64)> for BestMetrics {
    fn from((map, weighted_f1): (f64, f64)) -> Self {
        Self { map, weighted_f1 }
    }
}

impl From<BestMetrics> for (f64, f64) {
    fn from(from: BestMetrics) -> Self {
        (from.map, from.weighted_f1)
    }
}

/// The persisted training progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    pub schedule: ScheduleState,
    /// The number of steps taken by the train/test alternation.
    pub test_cycle: usize,
}

/// Restore the model according to the loading method. Returns the trainer
/// state to resume from, if any.
pub fn try_load_checkpoint<M>(
    model: &mut M,
    paths: &ArtifactPaths,
    load_checkpoint: &LoadCheckpoint,
) -> Result<Option<TrainerState>>
where
    M: DetectorTrainer,
{
    match load_checkpoint {
        LoadCheckpoint::Disabled => {
            info!("checkpoint loading is disabled");
            Ok(None)
        }
        LoadCheckpoint::FromRecent => {
            let state_path = paths.sync_state();
            let model_path = paths.sync_model();

            if !model_path.is_file() {
                info!("no synchronization file found, start from scratch");
                return Ok(None);
            }
            let state: TrainerState = match load_json(&state_path)? {
                Some(state) => state,
                None => {
                    warn!(
                        "'{}' has no matching '{}', start from scratch",
                        model_path.display(),
                        state_path.display()
                    );
                    return Ok(None);
                }
            };

            info!(
                "resume from '{}' at step {}",
                model_path.display(),
                state.schedule.steps
            );
            model
                .load(&model_path)
                .with_context(|| format!("failed to load '{}'", model_path.display()))?;
            Ok(Some(state))
        }
        LoadCheckpoint::FromFile { file } => {
            ensure!(file.is_file(), "'{}' is not a file", file.display());
            info!("fine-tune from '{}'", file.display());
            model
                .load(file)
                .with_context(|| format!("failed to load '{}'", file.display()))?;
            Ok(None)
        }
    }
}
