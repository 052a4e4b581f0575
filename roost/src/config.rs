use std::time::Duration;

/// Configuration for an [`crate::pool::AffinityPool`].
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Upper bound on concurrently live worker threads. Must be positive;
    /// the pool refuses to be built around a zero-capacity bound.
    pub max_workers: usize,

    /// How long an eviction call waits for a drained worker's thread to
    /// finish before abandoning it. The wait covers the deferred drops
    /// already queued ahead of the quit request.
    pub drain_timeout: Duration,

    /// Prefix for worker thread names; the worker's creation index is
    /// appended.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
            drain_timeout: Duration::from_secs(5),
            thread_name_prefix: "roost-worker".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_usable() {
        let config = PoolConfig::default();
        assert!(config.max_workers > 0);
        assert!(config.drain_timeout > Duration::ZERO);
        assert!(!config.thread_name_prefix.is_empty());
    }
}
