//! Session configuration.

use crate::cache::MergePolicy;

/// Configuration for a cache session.
#[derive(Debug, Clone)]
pub struct Config {
    /// How merges resolve a live entry colliding with a tombstone.
    pub merge_policy: MergePolicy,

    /// Whether to emit a per-unit-of-work summary event at commit/abort.
    pub log_summaries: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::TombstoneWins,
            log_summaries: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the live-versus-tombstone merge policy.
    #[must_use]
    pub const fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Sets whether terminal summaries are logged.
    #[must_use]
    pub const fn log_summaries(mut self, value: bool) -> Self {
        self.log_summaries = value;
        self
    }
}
