use super::{imglab, FileRecord};
use crate::common::*;
use std::io;
use thiserror::Error;

/// The failure of loading a single image.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to open image file '{}'", path.display())]
    Missing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to decode image file '{}'", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Loads the pixels of a dataset image.
pub trait ImageLoader
where
    Self: Send + Sync,
{
    fn load(&self, path: &Path) -> Result<RgbImage, LoadError>;
}

/// Reads images from the file system, guessing the format from the content.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileImageLoader;

impl ImageLoader for FileImageLoader {
    fn load(&self, path: &Path) -> Result<RgbImage, LoadError> {
        let missing = |source| LoadError::Missing {
            path: path.to_owned(),
            source,
        };

        let image = image::io::Reader::open(path)
            .map_err(missing)?
            .with_guessed_format()
            .map_err(missing)?
            .decode()
            .map_err(|source| LoadError::Decode {
                path: path.to_owned(),
                source,
            })?;
        Ok(image.into_rgb8())
    }
}

/// The immutable list of annotated images shared by all loaders.
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    records: Vec<FileRecord>,
}

impl DatasetIndex {
    pub fn new(records: Vec<FileRecord>) -> Self {
        Self { records }
    }

    /// Load an imglab XML index. Image paths are relative to the directory of
    /// the index file.
    pub fn load_imglab<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset index '{}'", path.display()))?;
        let dataset = imglab::Dataset::parse(&text)
            .with_context(|| format!("failed to parse dataset index '{}'", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        Ok(Self::new(dataset.into_records(base_dir)))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FileRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn num_objects(&self) -> usize {
        self.records.iter().map(|record| record.boxes.len()).sum()
    }

    /// Object count per class label, sorted by label.
    pub fn class_histogram(&self) -> BTreeMap<String, usize> {
        self.records
            .iter()
            .flat_map(|record| &record.boxes)
            .fold(BTreeMap::new(), |mut counts, bbox| {
                *counts.entry(bbox.class.clone()).or_insert(0) += 1;
                counts
            })
    }

    /// Print image, label and per-class object counts.
    pub fn log_summary(&self, name: &str) {
        let histogram = self.class_histogram();
        let num_objects = self.num_objects();

        info!("# {} images: {}", name, self.len());
        info!("# labels: {}", histogram.len());
        histogram.iter().for_each(|(label, count)| {
            info!(
                " - {}: {} ({:.2}%)",
                label,
                count,
                100.0 * *count as f64 / num_objects as f64
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, classes: &[&str]) -> FileRecord {
        FileRecord {
            path: path.into(),
            boxes: classes
                .iter()
                .map(|class| {
                    LabeledBox::ground_truth(
                        TLBR::from_tlbr([0.0, 0.0, 1.0, 1.0]),
                        class.to_string(),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn histogram_counts_per_class() {
        let index = DatasetIndex::new(vec![
            record("a.png", &["dog", "cat"]),
            record("b.png", &["dog"]),
            record("c.png", &[]),
        ]);

        assert_eq!(index.len(), 3);
        assert_eq!(index.num_objects(), 3);

        let histogram = index.class_histogram();
        assert_eq!(histogram.keys().collect_vec(), ["cat", "dog"]);
        assert_eq!(histogram["dog"], 2);
    }

    #[test]
    fn missing_and_corrupt_images_are_errors() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = FileImageLoader.load(&dir.path().join("nope.png"));
        assert!(matches!(missing, Err(LoadError::Missing { .. })));

        let corrupt_path = dir.path().join("corrupt.png");
        fs::write(&corrupt_path, b"definitely not an image")?;
        let corrupt = FileImageLoader.load(&corrupt_path);
        assert!(matches!(corrupt, Err(LoadError::Decode { .. })));

        let ok_path = dir.path().join("ok.png");
        RgbImage::new(3, 2).save(&ok_path)?;
        let image = FileImageLoader.load(&ok_path)?;
        assert_eq!(image.dimensions(), (3, 2));
        Ok(())
    }
}
