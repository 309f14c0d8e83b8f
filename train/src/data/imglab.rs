//! The imglab XML index format.

use super::FileRecord;
use crate::common::*;

#[derive(Debug, Clone, Deserialize)]
pub(super) struct Dataset {
    #[serde(default)]
    pub images: Images,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct Images {
    #[serde(rename = "image", default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct Image {
    pub file: String,
    #[serde(rename = "box", default)]
    pub boxes: Vec<BoxElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct BoxElement {
    pub top: i64,
    pub left: i64,
    pub width: i64,
    pub height: i64,
    #[serde(default)]
    pub ignore: Option<u8>,
    #[serde(default)]
    pub label: Option<String>,
}

impl Dataset {
    pub fn parse(text: &str) -> Result<Self> {
        let dataset = serde_xml_rs::from_str(text)?;
        Ok(dataset)
    }

    /// Convert into records with image paths joined onto `base_dir`.
    ///
    /// Boxes with negative extents are dropped with a warning.
    pub fn into_records(self, base_dir: &Path) -> Vec<FileRecord> {
        self.images
            .images
            .into_iter()
            .map(|image| {
                let Image { file, boxes } = image;
                let path = base_dir.join(&file);

                let boxes: Vec<_> = boxes
                    .into_iter()
                    .filter_map(|bbox| {
                        let BoxElement {
                            top,
                            left,
                            width,
                            height,
                            ignore,
                            label,
                        } = bbox;

                        let rect = match TLBR::try_from_tlhw([
                            top as f64,
                            left as f64,
                            height as f64,
                            width as f64,
                        ]) {
                            Ok(rect) => rect,
                            Err(_) => {
                                warn!(
                                    "invalid box {:?} in image '{}'",
                                    [top, left, height, width],
                                    file
                                );
                                return None;
                            }
                        };

                        let mut labeled = LabeledBox::ground_truth(rect, label.unwrap_or_default());
                        labeled.ignore = ignore.unwrap_or(0) != 0;
                        Some(labeled)
                    })
                    .collect();

                FileRecord { path, boxes }
            })
            .collect()
    }
}
