/*!
 * Windows Channel Endpoint
 * Single-instance, byte-mode, blocking named pipe
 */

use crate::core::limits::{PIPE_BUFFER_SIZE, PIPE_MAX_INSTANCES};
use std::fs::File;
use std::io::{self, Write};
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle, RawHandle};
use std::process::Stdio;
use windows_sys::Win32::Foundation::{
    GetLastError, ERROR_NO_DATA, ERROR_PIPE_CONNECTED, GENERIC_WRITE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, OPEN_EXISTING, PIPE_ACCESS_DUPLEX,
};
use windows_sys::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, PIPE_READMODE_BYTE, PIPE_TYPE_BYTE,
    PIPE_WAIT,
};

/// NUL-terminated UTF-16 pipe name
pub(crate) type Endpoint = Vec<u16>;
pub(crate) type Reader = File;

/// Pipe name for a channel instance
pub(crate) fn endpoint_for(name: &str, pid: u32, sequence: u64) -> Endpoint {
    format!(r"\\.\pipe\{}-{}-{}", name, pid, sequence)
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect()
}

/// Server end of the named pipe
pub(crate) struct Listener {
    handle: OwnedHandle,
}

impl Listener {
    pub(crate) fn bind(name: &Endpoint) -> io::Result<Self> {
        // SAFETY: name is NUL-terminated and outlives the call
        let handle = unsafe {
            CreateNamedPipeW(
                name.as_ptr(),
                PIPE_ACCESS_DUPLEX,
                PIPE_TYPE_BYTE | PIPE_READMODE_BYTE | PIPE_WAIT,
                PIPE_MAX_INSTANCES,
                PIPE_BUFFER_SIZE as u32,
                PIPE_BUFFER_SIZE as u32,
                0,
                std::ptr::null(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: handle is a freshly created, owned pipe handle
        let handle = unsafe { OwnedHandle::from_raw_handle(handle as RawHandle) };
        Ok(Self { handle })
    }

    /// Block until a writer attaches
    pub(crate) fn accept(&self) -> io::Result<Reader> {
        // SAFETY: the handle stays open for the lifetime of self
        let connected = unsafe {
            ConnectNamedPipe(self.handle.as_raw_handle() as _, std::ptr::null_mut())
        };
        if connected == 0 {
            // SAFETY: reads thread-local error state only
            let err = unsafe { GetLastError() };
            // NO_DATA: a writer came and went before we got here; reads see EOF
            if err != ERROR_PIPE_CONNECTED && err != ERROR_NO_DATA {
                return Err(io::Error::from_raw_os_error(err as i32));
            }
        }
        Ok(File::from(self.handle.try_clone()?))
    }

    /// The single pipe instance already refuses a second writer
    pub(crate) fn stop_accepting(&self) {}

    pub(crate) fn disconnect(&self) {
        // SAFETY: the handle stays open for the lifetime of self
        unsafe {
            DisconnectNamedPipe(self.handle.as_raw_handle() as _);
        }
    }
}

/// Client end of the named pipe, opened write-only
pub(crate) struct Writer(File);

pub(crate) fn connect(name: &Endpoint) -> io::Result<Writer> {
    // SAFETY: name is NUL-terminated and outlives the call
    let handle = unsafe {
        CreateFileW(
            name.as_ptr(),
            GENERIC_WRITE,
            0,
            std::ptr::null(),
            OPEN_EXISTING,
            FILE_ATTRIBUTE_NORMAL,
            std::ptr::null_mut(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: handle is a freshly opened, owned file handle
    Ok(Writer(unsafe { File::from_raw_handle(handle as RawHandle) }))
}

impl Writer {
    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        Ok(Self(self.0.try_clone()?))
    }

    pub(crate) fn into_stdio(self) -> Stdio {
        Stdio::from(OwnedHandle::from(self.0))
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}
