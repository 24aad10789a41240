/*!
 * Process Module
 * Child process supervision with captured output
 */

pub mod child;
pub mod command_line;

// Re-export for convenience
pub use child::{ChildProcess, ChildProcessBuilder};
