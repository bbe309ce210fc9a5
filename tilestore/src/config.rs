//! `tilestore` global configuration options.
//!
//! See [`Config`] for the list of options.

use std::sync::LazyLock;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// How a sparse write batch asserted to be in global order is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresortedCheck {
    /// Verify the batch is strictly increasing in the global order and reject it otherwise.
    #[default]
    Verify,
    /// Trust the assertion without checking.
    ///
    /// A batch that is not actually sorted produces a fragment whose tiles are not in global order.
    Trust,
}

/// Global configuration options for the `tilestore` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Configuration Options
///
/// ### Default Thread Count
/// > default: [`std::thread::available_parallelism`]
///
/// The thread count of the process-wide [thread pool](crate::concurrency) when it is first used without having been [initialised](crate::concurrency::init_thread_pool) explicitly.
///
/// ### Tile Concurrent Target
/// > default: [`None`] (the thread pool's thread count)
///
/// The maximum number of tile tasks (fill and compress on write, decompress on read) a single call runs concurrently.
///
/// ### Presorted Check
/// > default: [`PresortedCheck::Verify`]
///
/// Whether sparse batches written in [`GlobalOrder`](crate::array::QueryLayout::GlobalOrder) are verified to be in global order.
#[derive(Debug, Clone)]
pub struct Config {
    default_thread_count: usize,
    tile_concurrent_target: Option<usize>,
    presorted_check: PresortedCheck,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_thread_count: std::thread::available_parallelism().map_or(1, usize::from),
            tile_concurrent_target: None,
            presorted_check: PresortedCheck::default(),
        }
    }
}

impl Config {
    /// Get the [default thread count](#default-thread-count) configuration.
    #[must_use]
    pub fn default_thread_count(&self) -> usize {
        self.default_thread_count
    }

    /// Set the [default thread count](#default-thread-count) configuration.
    ///
    /// A value of zero is treated as one.
    pub fn set_default_thread_count(&mut self, default_thread_count: usize) -> &mut Self {
        self.default_thread_count = default_thread_count.max(1);
        self
    }

    /// Get the [tile concurrent target](#tile-concurrent-target) configuration.
    #[must_use]
    pub fn tile_concurrent_target(&self) -> Option<usize> {
        self.tile_concurrent_target
    }

    /// Set the [tile concurrent target](#tile-concurrent-target) configuration.
    pub fn set_tile_concurrent_target(&mut self, tile_concurrent_target: Option<usize>) -> &mut Self {
        self.tile_concurrent_target = tile_concurrent_target;
        self
    }

    /// Get the [presorted check](#presorted-check) configuration.
    #[must_use]
    pub fn presorted_check(&self) -> PresortedCheck {
        self.presorted_check
    }

    /// Set the [presorted check](#presorted-check) configuration.
    pub fn set_presorted_check(&mut self, presorted_check: PresortedCheck) -> &mut Self {
        self.presorted_check = presorted_check;
        self
    }
}

static CONFIG: LazyLock<RwLock<Config>> = LazyLock::new(|| RwLock::new(Config::default()));

/// Returns a reference to the global `tilestore` configuration.
///
/// # Deadlocks
/// Holding the returned guard while calling [`global_config_mut`] on the same thread deadlocks.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read()
}

/// Returns a mutable reference to the global `tilestore` configuration.
///
/// # Deadlocks
/// Holding the returned guard while calling [`global_config`] on the same thread deadlocks.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG.write()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_setters() {
        let mut config = Config::default();
        assert!(config.default_thread_count() >= 1);
        assert_eq!(config.presorted_check(), PresortedCheck::Verify);
        config
            .set_default_thread_count(0)
            .set_tile_concurrent_target(Some(3))
            .set_presorted_check(PresortedCheck::Trust);
        assert_eq!(config.default_thread_count(), 1);
        assert_eq!(config.tile_concurrent_target(), Some(3));
        assert_eq!(config.presorted_check(), PresortedCheck::Trust);
    }
}
