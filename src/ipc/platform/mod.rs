/*!
 * Channel Platform Layer
 *
 * - Unix: a domain stream socket bound to a path in the temp directory
 * - Windows: a byte-mode named pipe with a single instance
 */

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::{connect, endpoint_for, Endpoint, Listener, Reader, Writer};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use self::windows::{connect, endpoint_for, Endpoint, Listener, Reader, Writer};
