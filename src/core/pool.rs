//! Bounded worker pools for batch operations.

use std::sync::{Mutex, MutexGuard};

/// Run `op` on a rayon pool of `workers` threads.
///
/// Parallel iterators inside `op` are confined to that pool. If the pool
/// cannot be built, `op` runs on the global pool instead.
pub(crate) fn install<R, F>(workers: usize, op: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("catalog-worker-{}", i))
        .build()
    {
        Ok(pool) => pool.install(op),
        Err(e) => {
            tracing::warn!("could not start {} workers ({}), using the global pool", workers, e);
            op()
        }
    }
}

/// Lock a collector shared by workers.
///
/// A worker that panicked while holding the lock leaves the data intact, so
/// the other workers keep adding to it instead of dropping their results.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_on_requested_thread_count() {
        let threads = install(3, rayon::current_num_threads);
        assert_eq!(threads, 3);
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(install(0, rayon::current_num_threads), 1);
    }

    #[test]
    fn poisoned_collector_still_accepts_results() {
        let collected = Mutex::new(vec![1]);
        let _ = std::panic::catch_unwind(|| {
            let _guard = collected.lock().unwrap();
            panic!("worker died");
        });
        assert!(collected.is_poisoned());

        lock(&collected).push(2);
        assert_eq!(*lock(&collected), vec![1, 2]);
    }
}
