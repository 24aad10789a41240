/*!
 * Release-Once Handle Guard
 *
 * Owns a single resource and guarantees it is released exactly once,
 * either explicitly or on drop.
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use tracing::trace;

/// Owned resource slot with exactly-once release
///
/// Release drops the held value (closing the OS handle it wraps). An empty
/// guard behaves like an already-released one, which lets teardown code run
/// every release step unconditionally.
pub struct ReleaseOnce<T: Send> {
    slot: Option<T>,
    metadata: GuardMetadata,
}

impl<T: Send> ReleaseOnce<T> {
    /// Guard a live resource
    pub fn new(resource_type: &'static str, value: T) -> Self {
        Self {
            slot: Some(value),
            metadata: GuardMetadata::new(resource_type),
        }
    }

    /// A guard that holds nothing yet
    pub fn empty(resource_type: &'static str) -> Self {
        Self {
            slot: None,
            metadata: GuardMetadata::new(resource_type),
        }
    }

    /// Borrow the resource if still held
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    /// Take ownership of the resource out of the guard
    ///
    /// The guard is left released; the caller becomes responsible for it.
    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }
}

impl<T: Send> Guard for ReleaseOnce<T> {
    fn resource_type(&self) -> &'static str {
        self.metadata.resource_type
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.slot.is_some()
    }

    fn release(&mut self) -> GuardResult<()> {
        let value = self.slot.take().ok_or(GuardError::AlreadyReleased)?;
        drop(value);
        trace!(
            resource = self.metadata.resource_type,
            lifetime_us = self.metadata.lifetime_micros(),
            "released"
        );
        Ok(())
    }
}

impl<T: Send> GuardDrop for ReleaseOnce<T> {
    fn on_drop(&mut self) {
        if self.is_active() {
            let _ = self.release();
        }
    }
}

impl<T: Send> Drop for ReleaseOnce<T> {
    fn drop(&mut self) {
        self.on_drop();
    }
}

impl<T: Send> std::fmt::Debug for ReleaseOnce<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseOnce")
            .field("resource_type", &self.metadata.resource_type)
            .field("active", &self.is_active())
            .finish()
    }
}
