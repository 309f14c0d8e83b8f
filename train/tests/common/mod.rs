#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use train::{
    common::{LabeledBox, RectNum, Result, Rgb, RgbImage, TLBR},
    config::Config,
    model::{Detection, Detector, DetectorTrainer},
    pipeline::MiniBatch,
};

pub const IMAGE_SIZE: u32 = 32;
pub const CLASS: &str = "thing";

/// The box painted on every fixture image, as `[t, l, b, r]`.
pub const OBJECT: [f64; 4] = [8.0, 8.0, 24.0, 24.0];

/// A model with constant losses that records how it is driven.
#[derive(Debug, Default)]
pub struct MockTrainer {
    pub lr: f64,
    pub train_steps: usize,
    pub test_steps: usize,
    pub learning_rates: Vec<f64>,
    pub batch_sizes: Vec<usize>,
    pub loaded: Vec<PathBuf>,
    pub snapshots: Arc<AtomicUsize>,
}

impl DetectorTrainer for MockTrainer {
    type Inference = OracleDetector;

    fn train_step(&mut self, batch: &MiniBatch) -> Result<f64> {
        self.train_steps += 1;
        self.learning_rates.push(self.lr);
        self.batch_sizes.push(batch.len());
        Ok(1.0)
    }

    fn test_step(&mut self, batch: &MiniBatch) -> Result<f64> {
        self.test_steps += 1;
        self.batch_sizes.push(batch.len());
        Ok(1.0)
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }

    fn snapshot_for_inference(&self) -> Result<Self::Inference> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(OracleDetector)
    }

    fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, format!("{}", self.train_steps))?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        fs::read(path)?;
        self.loaded.push(path.to_owned());
        Ok(())
    }
}

/// Detects exactly the fixture object.
#[derive(Debug, Clone, Copy)]
pub struct OracleDetector;

impl Detector for OracleDetector {
    fn detect(&self, _image: &RgbImage, _confidence_threshold: f64) -> Vec<Detection> {
        let mut detection = LabeledBox::ground_truth(TLBR::from_tlbr(OBJECT), CLASS.into());
        detection.confidence = 0.9;
        vec![detection]
    }
}

/// Write `num_images` PNG images with one object each, indexed by
/// `index_name` in imglab format.
pub fn write_dataset(dir: &Path, index_name: &str, num_images: usize) -> Result<()> {
    let [t, l, b, r] = OBJECT;
    let mut entries = String::new();

    for index in 0..num_images {
        let file = format!("{}_{}.png", index_name.trim_end_matches(".xml"), index);
        let image = RgbImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
            let inside = (l as u32..r as u32).contains(&x) && (t as u32..b as u32).contains(&y);
            if inside {
                Rgb([255, 255, 255])
            } else {
                Rgb([index as u8 * 10, 0, 0])
            }
        });
        image.save(dir.join(&file))?;

        entries.push_str(&format!(
            "  <image file='{}'>\n    <box top='{}' left='{}' width='{}' height='{}'>\n      <label>{}</label>\n    </box>\n  </image>\n",
            file,
            t,
            l,
            r - l,
            b - t,
            CLASS
        ));
    }

    let xml = format!(
        "<?xml version='1.0' encoding='ISO-8859-1'?>\n<dataset>\n<images>\n{}</images>\n</dataset>\n",
        entries
    );
    fs::write(dir.join(index_name), xml)?;
    Ok(())
}

/// A configuration without random geometry, training on 8 images in
/// mini-batches of 2.
pub fn config(
    dataset_dir: &Path,
    output_dir: &Path,
    test_period: usize,
    load_checkpoint: &str,
) -> Result<Config> {
    let text = format!(
        r#"{{
            dataset: {{ dataset_dir: {:?}, image_size: {} }},
            augmentation: {{
                mosaic_prob: 0.0,
                crop_prob: 0.0,
                perspective_prob: 0.0,
                blur_prob: 0.0,
                solarize_prob: 0.0,
                angle: 0.0,
                min_object_size: [8, 4],
            }},
            training: {{
                batch_size_per_device: 2,
                warmup_epochs: 1,
                patience: 1,
                learning_rate: 0.001,
                min_learning_rate: 0.00002,
                test_period: {},
                num_workers: 2,
                seed: 7,
                load_checkpoint: {},
            }},
            logging: {{ dir: {:?}, name: "run" }},
        }}"#,
        dataset_dir.display().to_string(),
        IMAGE_SIZE,
        test_period,
        load_checkpoint,
        output_dir.display().to_string(),
    );

    let path = output_dir.join("train.json5");
    fs::create_dir_all(output_dir)?;
    fs::write(&path, text)?;
    Config::open(&path)
}
