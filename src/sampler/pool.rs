use crate::error::SamplerError;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

/// Fixed-size pool of likelihood workers
///
/// A pool is created by a sampler driver for a single run and dropped when the driver returns,
/// whether the run succeeded or not. Its threads are joined on drop.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, SamplerError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("sed-fit-worker-{i}"))
            .build()?;
        debug!(threads, "likelihood worker pool started");
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Number of points a sampler should propose at once, one worker is left for the sampler
    pub fn queue_size(&self) -> usize {
        self.threads().saturating_sub(1).max(1)
    }

    /// Evaluate `f` at every point, results keep the order of `points`
    pub fn map<F>(&self, points: &[Vec<f64>], f: F) -> Vec<f64>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        self.pool
            .install(|| points.par_iter().map(|point| f(point.as_slice())).collect())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        debug!(threads = self.threads(), "likelihood worker pool released");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_preserves_order() {
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.threads(), 3);
        assert_eq!(pool.queue_size(), 2);
        let points: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64, 1.0]).collect();
        let values = pool.map(&points, |p| p[0] * 2.0 + p[1]);
        let desired: Vec<f64> = (0..100).map(|i| 2.0 * i as f64 + 1.0).collect();
        assert_eq!(values, desired);
    }

    #[test]
    fn map_runs_on_worker_threads() {
        let pool = WorkerPool::new(2).unwrap();
        let points = vec![vec![0.0]; 8];
        let on_worker = pool.map(&points, |_| {
            let name = std::thread::current().name().unwrap_or_default().to_owned();
            f64::from(u8::from(name.starts_with("sed-fit-worker-")))
        });
        assert!(on_worker.iter().all(|&x| x == 1.0));
    }
}
