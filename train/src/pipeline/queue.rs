use crate::{common::*, data::Sample};
use flume::{Receiver, Selector, Sender, TrySendError};
use thiserror::Error;

/// The error returned by operations on a disabled queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the queue is disabled")]
pub struct QueueDisabled;

/// The queue of augmented samples.
pub type SampleQueue = BoundedQueue<Sample>;

/// A fixed-capacity FIFO channel shared by producer and consumer threads.
///
/// Disabling the queue wakes up every blocked caller. Afterwards `enqueue`
/// fails and `dequeue` drains the buffered items before it reports the end.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    capacity: usize,
    enabled: AtomicBool,
    tx: Sender<T>,
    rx: Receiver<T>,
    /// Dropped on disable, which wakes up all selectors waiting on `stop_rx`.
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        ensure!(capacity > 0, "queue capacity must be positive");

        let (tx, rx) = flume::bounded(capacity);
        let (stop_tx, stop_rx) = flume::bounded(0);

        Ok(Self {
            capacity,
            enabled: AtomicBool::new(true),
            tx,
            rx,
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(atomic::Ordering::SeqCst)
    }

    /// Push an item, blocking while the queue is full.
    pub fn enqueue(&self, item: T) -> Result<(), QueueDisabled> {
        if !self.is_enabled() {
            return Err(QueueDisabled);
        }

        let item = match self.tx.try_send(item) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(item)) => item,
            Err(TrySendError::Disconnected(_)) => return Err(QueueDisabled),
        };

        Selector::new()
            .send(&self.tx, item, |result| result.map_err(|_| QueueDisabled))
            .recv(&self.stop_rx, |_| Err(QueueDisabled))
            .wait()
    }

    /// Pop the oldest item, blocking while the queue is empty. Returns `None`
    /// once the queue is disabled and drained.
    pub fn dequeue(&self) -> Option<T> {
        loop {
            if let Ok(item) = self.rx.try_recv() {
                return Some(item);
            }
            if !self.is_enabled() {
                return None;
            }

            let item = Selector::new()
                .recv(&self.rx, |result| result.ok())
                .recv(&self.stop_rx, |_| None)
                .wait();

            if item.is_some() {
                return item;
            }
        }
    }

    /// Stop the queue. Blocked and future callers return promptly.
    pub fn disable(&self) {
        self.enabled.store(false, atomic::Ordering::SeqCst);
        let mut stop_tx = self
            .stop_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stop_tx.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_observed_exactly_once() -> Result<()> {
        let queue = Arc::new(BoundedQueue::new(4)?);
        let num_producers = 4;
        let per_producer = 50;

        let producers = (0..num_producers)
            .map(|producer| {
                let queue = queue.clone();
                thread::spawn(move || {
                    (0..per_producer).for_each(|index| {
                        queue.enqueue(producer * 1000 + index).unwrap();
                    });
                })
            })
            .collect_vec();

        let mut received = (0..num_producers * per_producer)
            .map(|_| queue.dequeue().unwrap())
            .collect_vec();
        producers
            .into_iter()
            .for_each(|handle| handle.join().unwrap());

        received.sort_unstable();
        let mut expect = (0..num_producers)
            .flat_map(|producer| (0..per_producer).map(move |index| producer * 1000 + index))
            .collect_vec();
        expect.sort_unstable();
        assert_eq!(received, expect);
        Ok(())
    }

    #[test]
    fn fifo_within_a_producer() -> Result<()> {
        let queue = BoundedQueue::new(8)?;
        (0..8).try_for_each(|value| queue.enqueue(value))?;
        let values = (0..8).map(|_| queue.dequeue().unwrap()).collect_vec();
        assert_eq!(values, (0..8).collect_vec());
        Ok(())
    }

    #[test]
    fn disabled_queue_drains_then_ends() -> Result<()> {
        let queue = BoundedQueue::new(4)?;
        queue.enqueue(1)?;
        queue.enqueue(2)?;
        queue.disable();

        assert_eq!(queue.enqueue(3), Err(QueueDisabled));
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));

        let since = Instant::now();
        assert_eq!(queue.dequeue(), None);
        assert!(since.elapsed() < Duration::from_secs(1));
        Ok(())
    }

    #[test]
    fn disable_wakes_blocked_callers() -> Result<()> {
        let empty = Arc::new(BoundedQueue::<usize>::new(1)?);
        let full = Arc::new(BoundedQueue::new(1)?);
        full.enqueue(0usize)?;

        let consumer = {
            let empty = empty.clone();
            thread::spawn(move || empty.dequeue())
        };
        let producer = {
            let full = full.clone();
            thread::spawn(move || full.enqueue(1))
        };

        thread::sleep(Duration::from_millis(50));
        empty.disable();
        full.disable();

        assert_eq!(consumer.join().unwrap(), None);
        assert_eq!(producer.join().unwrap(), Err(QueueDisabled));
        Ok(())
    }
}
