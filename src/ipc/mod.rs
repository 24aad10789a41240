/*!
 * IPC Module
 * Output capture: a single-writer byte channel, the shared output buffer,
 * and the drain thread connecting them
 */

pub mod buffer;
pub mod channel;
pub mod drain;
mod platform;

// Re-export for convenience
pub use buffer::OutputBuffer;
pub use channel::{ChannelReader, ChannelState, ChannelWriter, PipeChannel};
pub use drain::{DrainStats, OutputDrain, Utf8Decoder};
