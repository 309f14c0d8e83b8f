use super::BoundedQueue;
use crate::{common::*, data::Sample};

/// Images and their boxes, index-aligned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MiniBatch {
    pub images: Vec<RgbImage>,
    pub boxes: Vec<Vec<LabeledBox>>,
}

impl MiniBatch {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl FromIterator<Sample> for MiniBatch {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Sample>,
    {
        let (images, boxes) = iter
            .into_iter()
            .map(|Sample { image, boxes }| (image, boxes))
            .unzip();
        Self { images, boxes }
    }
}

/// Dequeue exactly `batch_size` samples, blocking until they are available.
///
/// Returns `None` if the queue is disabled and drained before the batch is
/// complete. Partial batches are never returned.
pub fn assemble(queue: &BoundedQueue<Sample>, batch_size: usize) -> Option<MiniBatch> {
    let samples: Vec<_> = (0..batch_size)
        .map(|_| queue.dequeue())
        .collect::<Option<_>>()?;
    Some(samples.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_full_batches_only() -> Result<()> {
        let queue = BoundedQueue::new(8)?;
        (1..=5).try_for_each(|size| queue.enqueue(Sample::blank(size)))?;

        let batch = assemble(&queue, 3).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.boxes.len(), 3);
        assert_eq!(
            batch.images.iter().map(|image| image.width()).collect_vec(),
            [1, 2, 3]
        );

        queue.disable();
        assert!(assemble(&queue, 3).is_none());
        Ok(())
    }
}
