/*!
 * Core Module
 * Fundamental types, limits, configuration and error handling
 */

pub mod config;
pub mod errors;
pub mod guard;
pub mod limits;
pub mod sync;

// Re-export for convenience
pub use config::Settings;
pub use errors::*;
pub use guard::{Guard, GuardDrop, GuardError, GuardResult, ReleaseOnce};
pub use sync::{Wake, WaitSet};
