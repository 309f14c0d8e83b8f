use super::{SampleQueue, SampleSource};
use crate::common::*;

/// A set of worker threads filling a queue from a sample source.
///
/// Workers run until the queue is disabled or the source is exhausted.
#[derive(Debug)]
pub struct LoaderPool {
    name: String,
    queue: Arc<SampleQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl LoaderPool {
    /// Start `num_workers` threads. Each worker owns a random generator
    /// seeded from `seed` and its index.
    pub fn spawn<S>(
        name: &str,
        num_workers: usize,
        source: Arc<S>,
        queue: Arc<SampleQueue>,
        seed: u64,
    ) -> Result<Self>
    where
        S: SampleSource + 'static,
    {
        ensure!(num_workers > 0, "{} loader requires at least one worker", name);

        let mut pool = Self {
            name: name.to_owned(),
            queue,
            workers: Vec::with_capacity(num_workers),
        };

        for index in 0..num_workers {
            let source = source.clone();
            let queue = pool.queue.clone();
            let worker_seed = seed.wrapping_add(index as u64 + 1);
            let pool_name = pool.name.clone();

            // on failure, dropping the pool stops the workers started so far
            let handle = thread::Builder::new()
                .name(format!("{}-loader-{}", name, index))
                .spawn(move || {
                    let span = info_span!("loader", pool = %pool_name, index);
                    let _enter = span.enter();
                    run_worker(&*source, &queue, worker_seed);
                })
                .with_context(|| format!("failed to spawn {} loader thread {}", name, index))?;
            pool.workers.push(handle);
        }

        debug!("started {} {} loaders", pool.workers.len(), name);
        Ok(pool)
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn queue(&self) -> &Arc<SampleQueue> {
        &self.queue
    }

    /// Disable the queue and wait for all workers to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.queue.disable();
        self.workers.drain(..).for_each(|handle| {
            if handle.join().is_err() {
                error!("a {} loader thread panicked", self.name);
            }
        });
    }
}

impl Drop for LoaderPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop();
        }
    }
}

fn run_worker<S>(source: &S, queue: &SampleQueue, seed: u64)
where
    S: SampleSource + ?Sized,
{
    let mut rng = StdRng::seed_from_u64(seed);

    while queue.is_enabled() {
        let sample = match source.next_sample(&mut rng) {
            Some(sample) => sample,
            None => break,
        };
        if queue.enqueue(sample).is_err() {
            break;
        }
    }

    trace!("loader exits");
}
