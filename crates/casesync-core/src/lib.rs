//! Foundational low-level utilities shared across casesync crates.
//!
//! Provides atomic file-write helpers, time utilities, error-text truncation,
//! and the retry executor every upstream client runs its requests through.

pub mod atomic_io;
pub mod retry;
pub mod text_utils;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use retry::{
    retry_backoff_delay, RateLimitSignal, RetryPolicy, RetryingRequestExecutor,
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RETRIES, DEFAULT_MAX_WAIT_MS,
};
pub use text_utils::{take_chars, truncate_for_error};
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms};
