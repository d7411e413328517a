//! Cart engine configuration.

use std::time::Duration;

use sundry_core::MAX_QUANTITY;

/// Default quiet period before a pending snapshot is flushed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

/// Tunables for the cart engine.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Quiet period after the last mutation before the pending snapshot is
    /// written durably. A burst of edits inside one window produces a
    /// single write.
    pub debounce: Duration,
    /// Upper clamp for any quantity, in memory and persisted. Must not
    /// exceed what the remote backend accepts.
    pub max_quantity: u32,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            max_quantity: MAX_QUANTITY,
        }
    }
}
