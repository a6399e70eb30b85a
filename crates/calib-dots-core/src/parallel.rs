//! Optional worker pool for band-parallel loops.

use rayon::prelude::*;
use std::ops::Range;

#[derive(thiserror::Error, Debug)]
pub enum WorkerPoolError {
    #[error("worker pool needs at least one thread")]
    NoThreads,
    #[error(transparent)]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// A fixed-size pool of worker threads.
///
/// Pools are passed explicitly to the detectors; nothing in this workspace
/// touches the global rayon pool.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, WorkerPoolError> {
        if threads == 0 {
            return Err(WorkerPoolError::NoThreads);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("calib-dots-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    #[inline]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Split `0..len` into contiguous bands, run `f` on each band in the pool
    /// and concatenate the outputs in band order.
    pub fn execute_bands<T, F>(&self, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(Range<usize>) -> Vec<T> + Sync,
    {
        let bands = split_bands(len, self.threads() * 4);
        self.pool.install(|| {
            bands
                .into_par_iter()
                .map(&f)
                .collect::<Vec<Vec<T>>>()
                .into_iter()
                .flatten()
                .collect()
        })
    }
}

/// Run `f` over `0..len` in bands, on `pool` when given, otherwise on the calling thread.
///
/// The output never depends on the number of threads.
pub fn execute_bands<T, F>(pool: Option<&WorkerPool>, len: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(Range<usize>) -> Vec<T> + Sync,
{
    match pool {
        Some(pool) if pool.threads() > 1 && len > 1 => pool.execute_bands(len, f),
        _ => f(0..len),
    }
}

fn split_bands(len: usize, bands: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let size = len.div_ceil(bands.max(1));
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}
