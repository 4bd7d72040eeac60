//! Bounded CPU worker pool.
//!
//! Both CPU-heavy phases (metadata extraction and transcoding) run through a
//! [`Scheduler`]: a dedicated rayon pool sized once from
//! [`config::effective_threads`](crate::config::effective_threads).
//!
//! Tasks are spawned FIFO, so they start in submission order, and at most
//! `workers` of them run at once. Results come back in submission order no
//! matter which task finishes first; each task reports `(index, result)` over
//! a channel and the caller slots them back into place.
//!
//! Tasks that call into third-party decoders wrap that call in
//! [`run_isolated`], so a panic costs one item rather than the batch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Run `task`, turning a panic into `Err` carrying the panic message.
pub fn run_isolated<R>(task: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(task)).map_err(|payload| panic_message(&*payload))
}

pub struct Scheduler {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl Scheduler {
    pub fn new(workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("import-worker-{i}"))
            .build()?;
        log::debug!("Worker pool ready with {workers} threads");
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `f` over every item on the pool and collect the results in
    /// submission order. Blocks until all tasks have finished.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let total = items.len();
        let (tx, rx) = mpsc::channel();
        let f = &f;

        self.pool.scope_fifo(|scope| {
            for (index, item) in items.into_iter().enumerate() {
                let tx = tx.clone();
                scope.spawn_fifo(move |_| {
                    // The receiver outlives the scope, so this cannot fail.
                    let _ = tx.send((index, f(item)));
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        for (index, result) in rx {
            slots[index] = Some(result);
        }
        slots.into_iter().flatten().collect()
    }
}
