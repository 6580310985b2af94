//! Work Scheduler
//!
//! A fixed-size worker pool created once and reused every tick. Work is split
//! into one contiguous range per worker (static partitioning); callers block
//! until the whole batch has drained. The scheduler knows nothing about agents.

use crate::error::{SwarmError, SwarmResult};
use parking_lot::{Condvar, Mutex};
use rayon::{Scope, ThreadPool, ThreadPoolBuilder};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, error};

/// Outstanding `add_task` work, with a condvar signalled when it reaches zero.
#[derive(Default)]
struct PendingTasks {
    count: Mutex<usize>,
    drained: Condvar,
}

/// Decrements the pending count when a task ends, including by unwinding.
struct TaskGuard(Arc<PendingTasks>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.drained.notify_all();
        }
    }
}

pub struct WorkScheduler {
    pool: ThreadPool,
    threads: usize,
    pending: Arc<PendingTasks>,
}

impl WorkScheduler {
    pub fn new(threads: usize) -> SwarmResult<Self> {
        if threads == 0 {
            return Err(SwarmError::config("worker pool needs at least one thread"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("swarm-worker-{i}"))
            .panic_handler(|_| error!("[Scheduler] worker task panicked"))
            .build()?;
        debug!("[Scheduler] started {} workers", threads);

        Ok(WorkScheduler {
            pool,
            threads,
            pending: Arc::new(PendingTasks::default()),
        })
    }

    pub fn thread_count(&self) -> usize {
        self.threads
    }

    /// Length of each contiguous partition when `len` items are split across
    /// the workers. Never zero.
    pub fn chunk_len(&self, len: usize) -> usize {
        len.div_ceil(self.threads).max(1)
    }

    /// One contiguous range per worker; the last may be shorter, and trailing
    /// workers get nothing when `len < threads`.
    pub fn partition(&self, len: usize) -> Vec<Range<usize>> {
        let chunk = self.chunk_len(len);
        (0..len)
            .step_by(chunk)
            .map(|start| start..(start + chunk).min(len))
            .collect()
    }

    /// Enqueue an independent task. No ordering is guaranteed between tasks.
    pub fn add_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.pending.count.lock() += 1;
        let guard = TaskGuard(Arc::clone(&self.pending));
        self.pool.spawn(move || {
            let _guard = guard;
            task();
        });
    }

    /// Block until every task passed to [`add_task`](Self::add_task) finished.
    pub fn wait_for_completion(&self) {
        let mut count = self.pending.count.lock();
        while *count > 0 {
            self.pending.drained.wait(&mut count);
        }
    }

    /// Run a batch whose tasks may borrow from the caller. Returns once every
    /// task spawned on the scope has finished.
    pub fn scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&Scope<'scope>) -> R + Send,
        R: Send,
    {
        self.pool.scope(op)
    }

    /// Split `0..len` across the workers and run `task(worker, range)` for each
    /// partition, blocking until all are done.
    pub fn dispatch<F>(&self, len: usize, task: F)
    where
        F: Fn(usize, Range<usize>) + Sync,
    {
        let ranges = self.partition(len);
        let task = &task;
        self.pool.scope(|s| {
            for (worker, range) in ranges.into_iter().enumerate() {
                s.spawn(move |_| task(worker, range));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn zero_threads_is_a_config_error() {
        assert!(matches!(
            WorkScheduler::new(0),
            Err(SwarmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partition_covers_range_contiguously() {
        let scheduler = WorkScheduler::new(4).unwrap();
        assert_eq!(scheduler.partition(10), vec![0..3, 3..6, 6..9, 9..10]);
        assert_eq!(scheduler.partition(2), vec![0..1, 1..2]);
        assert!(scheduler.partition(0).is_empty());
    }

    #[test]
    fn wait_blocks_until_all_tasks_ran() {
        let scheduler = WorkScheduler::new(3).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..64 {
            let done = Arc::clone(&done);
            scheduler.add_task(move || {
                std::thread::sleep(std::time::Duration::from_micros(200));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        scheduler.wait_for_completion();
        assert_eq!(done.load(Ordering::SeqCst), 64);

        // Reusable for the next batch.
        let done2 = Arc::clone(&done);
        scheduler.add_task(move || {
            done2.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.wait_for_completion();
        assert_eq!(done.load(Ordering::SeqCst), 65);
    }

    #[test]
    fn panicking_task_does_not_hang_wait() {
        let scheduler = WorkScheduler::new(2).unwrap();
        scheduler.add_task(|| panic!("boom"));
        let done = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&done);
        scheduler.add_task(move || {
            d.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.wait_for_completion();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_visits_every_index_once() {
        let scheduler = WorkScheduler::new(4).unwrap();
        let hits: Vec<AtomicUsize> = (0..1_003).map(|_| AtomicUsize::new(0)).collect();
        let workers = AtomicUsize::new(0);
        scheduler.dispatch(hits.len(), |worker, range| {
            assert!(worker < 4);
            workers.fetch_add(1, Ordering::SeqCst);
            for i in range {
                hits[i].fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(workers.load(Ordering::SeqCst), 4);
        assert!(hits.iter().all(|h| h.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn scope_tasks_may_borrow_mutable_chunks() {
        let scheduler = WorkScheduler::new(3).unwrap();
        let mut data = vec![0u32; 100];
        let chunk = scheduler.chunk_len(data.len());
        scheduler.scope(|s| {
            for (c, part) in data.chunks_mut(chunk).enumerate() {
                s.spawn(move |_| part.iter_mut().for_each(|v| *v = c as u32 + 1));
            }
        });
        assert_eq!(data[0], 1);
        assert_eq!(data[99], 3);
    }
}
