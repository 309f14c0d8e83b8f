//! Detection accuracy metrics.

use crate::{
    common::*,
    model::{Detection, Detector},
    pipeline::{assemble, SampleQueue},
};

/// The IoU above which a detection matches a ground truth box.
pub const MATCH_IOU_THRESHOLD: f64 = 0.5;

/// The number of recall points of the interpolated precision curve.
const NUM_RECALL_POINTS: usize = 101;

/// Precision, recall and F1 score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PrecRecF1 {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl PrecRecF1 {
    pub fn from_counts(tp: usize, fp: usize, num_truths: usize) -> Self {
        let ratio = |num: usize, denom: usize| {
            if denom == 0 {
                0.0
            } else {
                num as f64 / denom as f64
            }
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, num_truths);
        Self::from_pr(precision, recall)
    }

    fn from_pr(precision: f64, recall: f64) -> Self {
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
        }
    }
}

/// Aggregated detection metrics of an evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Mean average precision over classes with ground truth.
    pub map: f64,
    /// Per-class scores averaged with equal weights.
    pub macro_avg: PrecRecF1,
    /// Scores of the pooled counts of all classes.
    pub micro: PrecRecF1,
    /// Per-class scores averaged with weights proportional to the number of
    /// ground truth boxes.
    pub weighted: PrecRecF1,
}

impl Metrics {
    /// Column names matching the `Display` output.
    pub const HEADER: &'static str =
        "   mAP    mPr    mRc    mF1    µPr    µRc    µF1    wPr    wRc    wF1";
}

impl Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            map,
            macro_avg,
            micro,
            weighted,
        } = self;
        write!(f, "{:.4}", map)?;
        [macro_avg, micro, weighted].iter().try_for_each(|scores| {
            write!(
                f,
                " {:.4} {:.4} {:.4}",
                scores.precision, scores.recall, scores.f1
            )
        })
    }
}

#[derive(Debug, Clone, Default)]
struct ClassStat {
    num_truths: usize,
    /// (confidence, is true positive) of each scored detection.
    scored: Vec<(f64, bool)>,
}

impl ClassStat {
    fn tp(&self) -> usize {
        self.scored.iter().filter(|(_, is_tp)| *is_tp).count()
    }

    fn fp(&self) -> usize {
        self.scored.len() - self.tp()
    }

    /// Area under the precision envelope sampled at evenly spaced recalls.
    fn average_precision(&self) -> f64 {
        if self.num_truths == 0 {
            return 0.0;
        }

        let mut scored = self.scored.clone();
        scored.sort_by(|(lhs, _), (rhs, _)| rhs.total_cmp(lhs));

        let mut tp = 0;
        let curve: Vec<(f64, f64)> = scored
            .iter()
            .enumerate()
            .map(|(index, &(_, is_tp))| {
                if is_tp {
                    tp += 1;
                }
                let precision = tp as f64 / (index + 1) as f64;
                let recall = tp as f64 / self.num_truths as f64;
                (recall, precision)
            })
            .collect();

        let sum: f64 = (0..NUM_RECALL_POINTS)
            .map(|point| {
                let recall = point as f64 / (NUM_RECALL_POINTS - 1) as f64;
                curve
                    .iter()
                    .filter(|(rec, _)| *rec >= recall - 1e-12)
                    .map(|(_, prec)| *prec)
                    .fold(0.0, f64::max)
            })
            .sum();
        sum / NUM_RECALL_POINTS as f64
    }
}

/// Accumulates matched detections over an evaluation set.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    classes: BTreeMap<String, ClassStat>,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the detections of one image against its ground truth.
    ///
    /// Detections are visited by decreasing confidence and matched to the
    /// same-class box of highest IoU. A match below the IoU threshold or with
    /// an already matched box is a false positive. Detections matching an
    /// ignored box are not scored.
    pub fn add(&mut self, detections: &[Detection], truths: &[LabeledBox]) {
        truths.iter().filter(|truth| !truth.ignore).for_each(|truth| {
            self.classes
                .entry(truth.class.clone())
                .or_default()
                .num_truths += 1;
        });

        let mut matched = vec![false; truths.len()];
        let ordered = detections
            .iter()
            .sorted_by(|lhs, rhs| rhs.confidence.total_cmp(&lhs.confidence));

        for det in ordered {
            let best = truths
                .iter()
                .enumerate()
                .filter(|(_, truth)| truth.class == det.class)
                .map(|(index, truth)| (index, truth.rect.iou_with(&det.rect)))
                .max_by(|(_, lhs), (_, rhs)| lhs.total_cmp(rhs));

            let is_tp = match best {
                Some((index, iou)) if iou >= MATCH_IOU_THRESHOLD => {
                    if truths[index].ignore {
                        continue;
                    }
                    !mem::replace(&mut matched[index], true)
                }
                _ => false,
            };

            self.classes
                .entry(det.class.clone())
                .or_default()
                .scored
                .push((det.confidence, is_tp));
        }
    }

    pub fn finish(&self) -> Metrics {
        let with_truths = self
            .classes
            .values()
            .filter(|stat| stat.num_truths > 0)
            .collect_vec();

        if with_truths.is_empty() {
            return Metrics::default();
        }

        let per_class = with_truths
            .iter()
            .map(|stat| {
                let scores = PrecRecF1::from_counts(stat.tp(), stat.fp(), stat.num_truths);
                (stat.num_truths, stat.average_precision(), scores)
            })
            .collect_vec();

        let num_classes = per_class.len() as f64;
        let total_truths: usize = per_class.iter().map(|(support, _, _)| support).sum();

        let map = per_class.iter().map(|(_, ap, _)| ap).sum::<f64>() / num_classes;

        let average = |weight: &dyn Fn(usize) -> f64, denom: f64| {
            let (precision, recall, f1) = per_class.iter().fold(
                (0.0, 0.0, 0.0),
                |(precision, recall, f1), (support, _, scores)| {
                    let weight = weight(*support);
                    (
                        precision + weight * scores.precision,
                        recall + weight * scores.recall,
                        f1 + weight * scores.f1,
                    )
                },
            );
            PrecRecF1 {
                precision: precision / denom,
                recall: recall / denom,
                f1: f1 / denom,
            }
        };
        let macro_avg = average(&|_| 1.0, num_classes);
        let weighted = average(&|support| support as f64, total_truths as f64);

        let micro = {
            let (tp, fp) = self
                .classes
                .values()
                .fold((0, 0), |(tp, fp), stat| (tp + stat.tp(), fp + stat.fp()));
            PrecRecF1::from_counts(tp, fp, total_truths)
        };

        Metrics {
            map,
            macro_avg,
            micro,
            weighted,
        }
    }
}

/// Run the detector over `num_samples` samples drawn from the queue in
/// batches of `batch_size`.
pub fn compute_metrics<D>(
    detector: &D,
    queue: &SampleQueue,
    num_samples: usize,
    batch_size: usize,
    confidence_threshold: f64,
) -> Result<Metrics>
where
    D: Detector + ?Sized,
{
    ensure!(batch_size > 0, "evaluation batch size must be positive");
    let mut acc = MetricsAccumulator::new();
    let mut remaining = num_samples;

    while remaining > 0 {
        let count = remaining.min(batch_size);
        let batch = assemble(queue, count).ok_or_else(|| {
            format_err!(
                "evaluation queue closed after {} of {} samples",
                num_samples - remaining,
                num_samples
            )
        })?;

        izip!(&batch.images, &batch.boxes).for_each(|(image, truths)| {
            let detections = detector.detect(image, confidence_threshold);
            acc.add(&detections, truths);
        });
        remaining -= count;
    }

    Ok(acc.finish())
}
