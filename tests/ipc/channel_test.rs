/*!
 * Pipe Channel Tests
 * Single-writer capacity, state transitions and teardown
 */

use pretty_assertions::assert_eq;
use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;
use trace_helper::ipc::{ChannelState, PipeChannel};
use trace_helper::ChannelError;

#[test]
fn test_single_writer_capacity() {
    let channel = Arc::new(PipeChannel::create("capacity-test").unwrap());

    let acceptor = {
        let channel = channel.clone();
        thread::spawn(move || {
            let mut reader = channel.accept().unwrap();
            let mut text = String::new();
            reader.read_to_string(&mut text).unwrap();
            text
        })
    };

    let mut writer = channel.connect().unwrap();
    writer.write_all(b"first").unwrap();

    // Wait until the accept has happened so the endpoint is no longer listening
    while channel.state() != ChannelState::Connected {
        thread::yield_now();
    }
    assert!(matches!(
        channel.connect(),
        Err(ChannelError::Connection { .. })
    ));

    drop(writer);
    assert_eq!(acceptor.join().unwrap(), "first");
}

#[test]
fn test_second_writer_refused_before_accept() {
    let channel = PipeChannel::create("backlog-test").unwrap();
    assert_eq!(channel.state(), ChannelState::Created);

    let writer = channel.connect().unwrap();
    assert!(channel.has_writer());
    assert!(matches!(
        channel.connect(),
        Err(ChannelError::Connection { .. })
    ));

    // Dropping the writer does not reopen the slot
    drop(writer);
    assert!(matches!(
        channel.connect(),
        Err(ChannelError::Connection { .. })
    ));
}

#[test]
fn test_state_after_disconnect() {
    let channel = Arc::new(PipeChannel::create("state-test").unwrap());
    assert_eq!(channel.state(), ChannelState::Created);

    let acceptor = {
        let channel = channel.clone();
        thread::spawn(move || {
            let reader = channel.accept().unwrap();
            drop(reader);
            channel.disconnect();
        })
    };

    let writer = channel.connect().unwrap();
    acceptor.join().unwrap();
    drop(writer);

    assert_eq!(channel.state(), ChannelState::Closed);
    assert!(matches!(channel.connect(), Err(ChannelError::Closed(_))));
}

#[test]
fn test_close_is_idempotent() {
    let channel = PipeChannel::create("close-test").unwrap();
    channel.close();
    channel.close();
    assert!(channel.is_closed());
    assert_eq!(channel.state(), ChannelState::Closed);
    assert!(channel.accept().is_err());
}

#[test]
fn test_release_pending_without_writer() {
    let channel = Arc::new(PipeChannel::create("release-test").unwrap());

    let acceptor = {
        let channel = channel.clone();
        thread::spawn(move || {
            let mut reader = channel.accept().unwrap();
            let mut bytes = Vec::new();
            let _ = reader.read_to_end(&mut bytes);
            bytes.len()
        })
    };

    channel.release_pending();
    assert_eq!(acceptor.join().unwrap(), 0);
}
