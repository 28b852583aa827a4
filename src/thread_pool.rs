//! Shared thread pool for parallel assessment and sampling.
//!
//! Batch assessment runs sampling propagation inside each per-benchmark task,
//! so parallel work nests; the pool uses larger stacks than rayon's default.

#[cfg(feature = "parallel")]
use rayon::ThreadPool;

#[cfg(feature = "parallel")]
use std::sync::OnceLock;

#[cfg(feature = "parallel")]
static THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// Get or initialize the shared thread pool.
///
/// - Stack size: 8 MB (vs rayon's default 2 MB)
/// - Thread count: number of logical CPUs
///
/// Returns `None` if the pool could not be built; work then runs on rayon's
/// global pool.
#[cfg(feature = "parallel")]
pub fn get_thread_pool() -> Option<&'static ThreadPool> {
    THREAD_POOL
        .get_or_init(|| {
            rayon::ThreadPoolBuilder::new()
                .stack_size(8 * 1024 * 1024)
                .thread_name(|i| format!("similarity-{i}"))
                .build()
                .map_err(|e| tracing::warn!(error = %e, "falling back to the global rayon pool"))
                .ok()
        })
        .as_ref()
}

/// Execute a parallel operation on the shared pool.
#[cfg(feature = "parallel")]
pub fn install<OP, R>(op: OP) -> R
where
    OP: FnOnce() -> R + Send,
    R: Send,
{
    match get_thread_pool() {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

#[cfg(not(feature = "parallel"))]
pub fn install<OP, R>(op: OP) -> R
where
    OP: FnOnce() -> R,
{
    op()
}
