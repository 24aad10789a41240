/*!
 * RAII Resource Guards
 *
 * Scoped acquisition with guaranteed, exactly-once release for OS
 * resources (stream handles, channel endpoints, thread handles).
 *
 * ## Guard Types
 *
 * - **ReleaseOnce**: Owns one resource; explicit release is idempotent and
 *   drop releases whatever is still held
 *
 * ## Example
 *
 * ```rust
 * use trace_helper::core::guard::{Guard, ReleaseOnce};
 *
 * let mut handle = ReleaseOnce::new("stdout", vec![1u8, 2, 3]);
 * assert!(handle.is_active());
 * handle.release().unwrap();
 * // A second release reports AlreadyReleased instead of closing twice
 * assert!(handle.release().is_err());
 * ```
 */

mod handle;
mod traits;

pub use handle::ReleaseOnce;
pub use traits::{Guard, GuardDrop};

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
        }
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
