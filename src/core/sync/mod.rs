/*!
 * Synchronization Primitives
 *
 * Blocking wait/notify built on parking_lot's Condvar.
 *
 * # Use Cases
 *
 * - **Child supervision**: one blocking wait observing both process exit and
 *   newly captured output
 */

mod wait_set;

pub use wait_set::{Wake, WaitSet};
