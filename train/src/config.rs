//! Training program configuration format.

use crate::{
    augment::{AugmentationPolicyInit, SolarizeMode},
    common::*,
    train::DecayPolicy,
    utils::Ratio,
};

pub use augmentation::*;
pub use dataset::*;
pub use training::*;

/// The main training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub augmentation: AugmentationConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject option combinations that cannot be trained with.
    pub fn validate(&self) -> Result<()> {
        let Self {
            dataset: DatasetConfig { image_size, .. },
            ref augmentation,
            ref training,
            ..
        } = *self;

        ensure!(image_size > 0, "image_size must be positive");
        augmentation.policy_init(image_size).build()?;

        let TrainingConfig {
            batch_size_per_device,
            num_devices,
            learning_rate,
            min_learning_rate,
            warmup_epochs,
            patience,
            cosine_epochs,
            test_period,
            ..
        } = *training;

        let cosine_epochs = cosine_epochs.filter(|&epochs| epochs > 0);
        ensure!(
            !(patience.is_some() && cosine_epochs.is_some()),
            "patience and cosine_epochs are mutually exclusive"
        );
        if let Some(cosine_epochs) = cosine_epochs {
            ensure!(
                cosine_epochs > warmup_epochs,
                "cosine_epochs ({}) must exceed warmup_epochs ({})",
                cosine_epochs,
                warmup_epochs
            );
        }
        ensure!(
            test_period != 1,
            "test_period must be 0 (disabled) or at least 2, otherwise no training step is taken"
        );
        ensure!(learning_rate > 0.0, "learning_rate must be positive");
        ensure!(
            min_learning_rate > 0.0 && min_learning_rate < learning_rate,
            "min_learning_rate must be positive and below learning_rate"
        );
        ensure!(
            batch_size_per_device.get().checked_mul(num_devices.get()).is_some(),
            "batch size overflows"
        );

        Ok(())
    }
}

mod dataset {
    use super::*;

    /// Dataset options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DatasetConfig {
        /// The directory with the index files. Image paths are resolved
        /// relative to it.
        pub dataset_dir: PathBuf,
        #[serde(default = "default_train_file")]
        pub train_file: PathBuf,
        /// Optional held-out index. Required when `test_period` is set.
        #[serde(default = "default_test_file")]
        pub test_file: PathBuf,
        /// The square side the network consumes.
        #[serde(default = "default_image_size")]
        pub image_size: u32,
    }

    impl DatasetConfig {
        pub fn train_index_path(&self) -> PathBuf {
            self.dataset_dir.join(&self.train_file)
        }

        pub fn test_index_path(&self) -> PathBuf {
            self.dataset_dir.join(&self.test_file)
        }
    }

    fn default_train_file() -> PathBuf {
        "training.xml".into()
    }

    fn default_test_file() -> PathBuf {
        "testing.xml".into()
    }

    fn default_image_size() -> u32 {
        512
    }
}

mod augmentation {
    use super::*;

    /// Data augmentation options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(default)]
    pub struct AugmentationConfig {
        /// The probability to mirror the image horizontally.
        pub mirror_prob: Ratio,
        /// The probability to compose four samples into one.
        pub mosaic_prob: Ratio,
        /// The probability to take a random crop around an object.
        pub crop_prob: Ratio,
        pub blur_prob: Ratio,
        pub perspective_prob: Ratio,
        /// The probability to apply a color offset instead of gamma/color
        /// disturbance.
        pub color_offset_prob: Ratio,
        pub solarize_prob: Ratio,
        pub solarize_mode: SolarizeMode,
        /// The maximum rotation in degrees.
        pub angle: R64,
        /// The crop center jitter relative to the object size.
        pub shift: R64,
        /// The gamma magnitude.
        pub gamma: R64,
        /// The color magnitude.
        pub color: Ratio,
        /// Boxes less covered by the image than this are ignored.
        pub min_coverage: Ratio,
        /// The minimum (long side, short side) of an object in pixels.
        pub min_object_size: (u32, u32),
        /// The maximum long side of an object relative to a crop.
        pub max_object_size: Ratio,
    }

    impl AugmentationConfig {
        pub fn policy_init(&self, image_size: u32) -> AugmentationPolicyInit {
            let Self {
                mirror_prob,
                mosaic_prob,
                crop_prob,
                blur_prob,
                perspective_prob,
                color_offset_prob,
                solarize_prob,
                solarize_mode,
                angle,
                shift,
                gamma,
                color,
                min_coverage,
                min_object_size,
                max_object_size,
            } = *self;

            AugmentationPolicyInit {
                image_size,
                mirror_prob: mirror_prob.into(),
                mosaic_prob: mosaic_prob.into(),
                crop_prob: crop_prob.into(),
                blur_prob: blur_prob.into(),
                perspective_prob: perspective_prob.into(),
                color_offset_prob: color_offset_prob.into(),
                solarize_prob: solarize_prob.into(),
                solarize_mode,
                angle: angle.raw(),
                shift: shift.raw(),
                gamma_magnitude: gamma.raw(),
                color_magnitude: color.into(),
                min_coverage: min_coverage.into(),
                min_object_size,
                max_object_size: max_object_size.into(),
            }
        }
    }

    impl Default for AugmentationConfig {
        fn default() -> Self {
            let ratio = |value: f64| Ratio::f_from_f64(value).unwrap();

            Self {
                mirror_prob: ratio(0.5),
                mosaic_prob: ratio(0.5),
                crop_prob: ratio(0.5),
                blur_prob: ratio(0.2),
                perspective_prob: ratio(0.2),
                color_offset_prob: ratio(0.5),
                solarize_prob: ratio(0.1),
                solarize_mode: SolarizeMode::Wrapping,
                angle: r64(5.0),
                shift: r64(0.2),
                gamma: r64(0.5),
                color: ratio(0.2),
                min_coverage: ratio(0.75),
                min_object_size: (64, 32),
                max_object_size: ratio(0.9),
            }
        }
    }
}

mod training {
    use super::*;

    /// The training options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(default)]
    pub struct TrainingConfig {
        /// The mini-batch size on each device.
        pub batch_size_per_device: NonZeroUsize,
        /// The number of devices the model trains on.
        pub num_devices: NonZeroUsize,
        /// The learning rate reached at the end of the warm-up.
        pub learning_rate: R64,
        /// Training stops once the learning rate drops below it.
        pub min_learning_rate: R64,
        pub warmup_epochs: usize,
        /// Epochs without loss improvement before the learning rate shrinks.
        pub patience: Option<usize>,
        /// If set, decay the learning rate along a cosine curve until this
        /// epoch instead of on plateaus.
        pub cosine_epochs: Option<usize>,
        /// Run a test step every this many steps. Zero disables test steps.
        pub test_period: usize,
        /// The number of training data loaders. Defaults to the number of
        /// logical CPUs.
        pub num_workers: Option<NonZeroUsize>,
        /// If set, also persist the trainer state per this steps. The state is
        /// always persisted at the end of each epoch.
        pub save_state_steps: Option<NonZeroUsize>,
        /// Checkpoint file loading method.
        pub load_checkpoint: LoadCheckpoint,
        /// Seed of the data loaders. Drawn from entropy if absent.
        pub seed: Option<u64>,
    }

    impl TrainingConfig {
        pub fn batch_size(&self) -> usize {
            self.batch_size_per_device.get() * self.num_devices.get()
        }

        pub fn num_workers(&self) -> usize {
            self.num_workers
                .map(NonZeroUsize::get)
                .unwrap_or_else(num_cpus::get)
        }

        pub fn decay_policy(&self) -> DecayPolicy {
            match self.cosine_epochs {
                Some(epochs) if epochs > 0 => DecayPolicy::Cosine { epochs },
                _ => DecayPolicy::Plateau {
                    patience: self.patience.unwrap_or(3),
                },
            }
        }
    }

    impl Default for TrainingConfig {
        fn default() -> Self {
            Self {
                batch_size_per_device: NonZeroUsize::new(8).unwrap(),
                num_devices: NonZeroUsize::new(1).unwrap(),
                learning_rate: r64(1e-3),
                min_learning_rate: r64(1e-6),
                warmup_epochs: 3,
                patience: None,
                cosine_epochs: None,
                test_period: 0,
                num_workers: None,
                save_state_steps: None,
                load_checkpoint: LoadCheckpoint::FromRecent,
                seed: None,
            }
        }
    }

    /// Checkpoint file loading method.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum LoadCheckpoint {
        /// Start from scratch.
        Disabled,
        /// Resume from the synchronization state of the experiment if present.
        FromRecent,
        /// Load model parameters from a file to fine-tune, with a fresh
        /// schedule.
        FromFile { file: PathBuf },
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// The directory receiving checkpoints and trainer state.
    pub dir: PathBuf,
    /// The experiment name every artifact file name starts with.
    pub name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            name: "yolo".into(),
        }
    }
}
