use crate::{
    concurrency::thread_pool_thread_count,
    config::{PresortedCheck, global_config},
};

/// Options for a single write or read.
///
/// The default values are taken from the [global configuration](crate::config::Config):
/// - `concurrent_target`: the tile concurrent target, else the thread count of the thread pool
/// - `presorted_check`: the presorted check
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    concurrent_target: usize,
    presorted_check: PresortedCheck,
}

impl Default for QueryOptions {
    fn default() -> Self {
        let config = global_config();
        Self {
            concurrent_target: config
                .tile_concurrent_target()
                .or_else(thread_pool_thread_count)
                .unwrap_or_else(|| config.default_thread_count()),
            presorted_check: config.presorted_check(),
        }
    }
}

impl QueryOptions {
    /// Set the maximum number of concurrent tile tasks.
    #[must_use]
    pub fn with_concurrent_target(mut self, concurrent_target: usize) -> Self {
        self.concurrent_target = concurrent_target;
        self
    }

    /// Set the maximum number of concurrent tile tasks.
    pub fn set_concurrent_target(&mut self, concurrent_target: usize) -> &mut Self {
        self.concurrent_target = concurrent_target;
        self
    }

    /// The maximum number of concurrent tile tasks.
    #[must_use]
    pub fn concurrent_target(&self) -> usize {
        self.concurrent_target
    }

    /// Set how sparse writes in global order are checked.
    #[must_use]
    pub fn with_presorted_check(mut self, presorted_check: PresortedCheck) -> Self {
        self.presorted_check = presorted_check;
        self
    }

    /// Set how sparse writes in global order are checked.
    pub fn set_presorted_check(&mut self, presorted_check: PresortedCheck) -> &mut Self {
        self.presorted_check = presorted_check;
        self
    }

    /// How sparse writes in global order are checked.
    #[must_use]
    pub fn presorted_check(&self) -> PresortedCheck {
        self.presorted_check
    }
}
