// Utility functions module
pub mod retry;
pub mod timezone;

// Re-export for easy access
pub use retry::{Backoff, RetryOperation, RetryPolicy};
pub use timezone::TimezoneCalculator;
