//! The process-wide thread pool for tile compression and decompression.
//!
//! The pool follows a one-time state transition **Uninitialized → Initialized(thread count)**:
//! - [`init_thread_pool`] with a thread count initialises the pool, or succeeds without effect if the pool already has that thread count,
//! - a request for a *different* thread count fails with [`ThreadPoolInitError::ConfigConflict`], and
//! - the first read or write on an uninitialised pool initialises it with the [default thread count](crate::config::Config::default_thread_count).
//!
//! Concurrent first-time initialisers are serialised, so they either agree on one configuration or observe the conflict.
//! The pool lives for the lifetime of the process.
//!
//! Within a call, tile tasks are scattered over the pool with at most the [tile concurrent target](crate::config::Config::tile_concurrent_target) running at once, and the call returns only after every task has completed.

use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon_iter_concurrent_limit::iter_concurrent_limit;
use thiserror::Error;

use crate::config::global_config;

/// A thread pool initialisation error.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ThreadPoolInitError {
    /// The pool is already initialised with a different thread count.
    #[error(
        "the thread pool must be initialised with the same number of threads per process: {requested} != {configured}"
    )]
    ConfigConflict {
        /// The requested thread count.
        requested: usize,
        /// The thread count the pool was initialised with.
        configured: usize,
    },
    /// The thread count is zero.
    #[error("the thread pool requires at least one thread")]
    ZeroThreads,
    /// The worker threads could not be spawned.
    #[error("failed to build the thread pool: {0}")]
    Build(String),
}

#[derive(Debug)]
enum ThreadPoolState {
    Uninitialized,
    Initialized {
        thread_count: usize,
        pool: Arc<rayon::ThreadPool>,
    },
}

/// A thread pool service with a guarded one-time initialisation.
///
/// The process-wide instance is accessed through [`init_thread_pool`] and [`thread_pool`].
#[derive(Debug)]
pub struct ThreadPoolService {
    state: Mutex<ThreadPoolState>,
}

impl Default for ThreadPoolService {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPoolService {
    /// Create a new uninitialised thread pool service.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: parking_lot::const_mutex(ThreadPoolState::Uninitialized),
        }
    }

    /// Initialise the pool with `thread_count` threads.
    ///
    /// Succeeds without effect if the pool is already initialised with `thread_count` threads.
    ///
    /// # Errors
    /// Returns a [`ThreadPoolInitError`] if
    ///  - the pool is already initialised with a different thread count,
    ///  - `thread_count` is zero, or
    ///  - the worker threads cannot be spawned.
    pub fn init(&self, thread_count: usize) -> Result<Arc<rayon::ThreadPool>, ThreadPoolInitError> {
        let mut state = self.state.lock();
        match &*state {
            ThreadPoolState::Initialized {
                thread_count: configured,
                pool,
            } => {
                if *configured == thread_count {
                    Ok(pool.clone())
                } else {
                    Err(ThreadPoolInitError::ConfigConflict {
                        requested: thread_count,
                        configured: *configured,
                    })
                }
            }
            ThreadPoolState::Uninitialized => {
                if thread_count == 0 {
                    return Err(ThreadPoolInitError::ZeroThreads);
                }
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(thread_count)
                    .thread_name(|index| format!("tilestore-{index}"))
                    .build()
                    .map_err(|err| ThreadPoolInitError::Build(err.to_string()))?;
                let pool = Arc::new(pool);
                log::debug!("initialised the tile thread pool with {thread_count} threads");
                *state = ThreadPoolState::Initialized {
                    thread_count,
                    pool: pool.clone(),
                };
                Ok(pool)
            }
        }
    }

    /// Returns the pool, initialising it with `default_thread_count` threads if it is uninitialised.
    ///
    /// # Errors
    /// Returns a [`ThreadPoolInitError`] if the pool is uninitialised and cannot be built.
    pub fn get_or_init(
        &self,
        default_thread_count: usize,
    ) -> Result<Arc<rayon::ThreadPool>, ThreadPoolInitError> {
        if let ThreadPoolState::Initialized { pool, .. } = &*self.state.lock() {
            return Ok(pool.clone());
        }
        match self.init(default_thread_count) {
            // another thread initialised the pool between the two locks
            Err(ThreadPoolInitError::ConfigConflict { .. }) => self.get_or_init(default_thread_count),
            result => result,
        }
    }

    /// Returns the thread count if the pool is initialised.
    #[must_use]
    pub fn thread_count(&self) -> Option<usize> {
        match &*self.state.lock() {
            ThreadPoolState::Uninitialized => None,
            ThreadPoolState::Initialized { thread_count, .. } => Some(*thread_count),
        }
    }
}

static THREAD_POOL: ThreadPoolService = ThreadPoolService::new();

/// Initialise the process-wide thread pool with `thread_count` threads.
///
/// # Errors
/// See [`ThreadPoolService::init`].
pub fn init_thread_pool(thread_count: usize) -> Result<(), ThreadPoolInitError> {
    THREAD_POOL.init(thread_count).map(|_| ())
}

/// Returns the thread count of the process-wide thread pool, if it is initialised.
#[must_use]
pub fn thread_pool_thread_count() -> Option<usize> {
    THREAD_POOL.thread_count()
}

/// Returns the process-wide thread pool, initialising it with the [default thread count](crate::config::Config::default_thread_count) if needed.
///
/// # Errors
/// Returns a [`ThreadPoolInitError`] if the pool cannot be built.
pub fn thread_pool() -> Result<Arc<rayon::ThreadPool>, ThreadPoolInitError> {
    let default_thread_count = global_config().default_thread_count();
    THREAD_POOL.get_or_init(default_thread_count)
}

/// Run `task(0..task_count)` on `pool` with at most `concurrent_limit` tasks at once, and wait for all of them.
///
/// The results are returned in task index order regardless of completion order.
/// The first error encountered is returned.
pub(crate) fn run_tile_tasks<T, E, F>(
    pool: &rayon::ThreadPool,
    concurrent_limit: usize,
    task_count: usize,
    task: F,
) -> Result<Vec<T>, E>
where
    T: Send,
    E: Send,
    F: Fn(usize) -> Result<T, E> + Send + Sync,
{
    if task_count == 0 {
        return Ok(Vec::new());
    }
    let concurrent_limit = concurrent_limit.clamp(1, task_count);
    pool.install(|| {
        let mut results = iter_concurrent_limit!(concurrent_limit, (0..task_count), map, |index| {
            task(index).map(|output| (index, output))
        })
        .collect::<Result<Vec<_>, E>>()?;
        results.sort_unstable_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, output)| output).collect())
    })
}
