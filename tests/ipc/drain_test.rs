/*!
 * Output Drain Tests
 * End-to-end capture through a channel, including chunk-boundary decoding
 */

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use trace_helper::ipc::{OutputBuffer, OutputDrain, PipeChannel, Utf8Decoder};

fn drain_through_channel(pieces: &[Vec<u8>]) -> (String, usize) {
    let channel = Arc::new(PipeChannel::create("drain-test").unwrap());
    let buffer = Arc::new(OutputBuffer::new());
    let wakes = Arc::new(AtomicUsize::new(0));

    let mut drain = {
        let wakes = wakes.clone();
        OutputDrain::spawn(channel.clone(), buffer.clone(), move || {
            wakes.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap()
    };

    let mut writer = channel.connect().unwrap();
    for piece in pieces {
        writer.write_all(piece).unwrap();
    }
    drop(writer);

    let stats = drain.join().unwrap();
    let total: usize = pieces.iter().map(Vec::len).sum();
    assert_eq!(stats.bytes, total as u64);
    (buffer.take(), wakes.load(Ordering::SeqCst))
}

#[test]
fn test_drain_collects_everything() {
    let (text, wakes) = drain_through_channel(&[b"hello ".to_vec(), b"world\n".to_vec()]);
    assert_eq!(text, "hello world\n");
    assert!(wakes >= 1);
}

#[test]
fn test_drain_split_multibyte() {
    let bytes = "naïve ☃ text".as_bytes();
    let split = bytes.iter().position(|&b| b == 0xE2).unwrap() + 1;
    let (text, _) = drain_through_channel(&[bytes[..split].to_vec(), bytes[split..].to_vec()]);
    assert_eq!(text, "naïve ☃ text");
}

#[test]
fn test_drain_truncated_tail_is_replaced() {
    let (text, _) = drain_through_channel(&[b"ok".to_vec(), vec![0xE2, 0x98]]);
    assert_eq!(text, "ok\u{FFFD}");
}

#[test]
fn test_drain_without_writer_released() {
    let channel = Arc::new(PipeChannel::create("drain-idle").unwrap());
    let buffer = Arc::new(OutputBuffer::new());
    let mut drain = OutputDrain::spawn(channel.clone(), buffer.clone(), || {}).unwrap();

    channel.release_pending();
    let stats = drain.join().unwrap();
    assert_eq!(stats.bytes, 0);
    assert!(drain.is_finished());
    assert!(buffer.is_empty());
    assert!(drain.join().is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_decoder_preserves_valid_utf8(text in "\\PC{0,200}", cuts in prop::collection::vec(0usize..256, 0..8)) {
        let bytes = text.as_bytes();
        let mut points: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
        points.push(0);
        points.push(bytes.len());
        points.sort_unstable();

        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for window in points.windows(2) {
            out.push_str(&decoder.decode(&bytes[window[0]..window[1]]));
        }
        out.push_str(&decoder.finish());
        prop_assert_eq!(out, text);
    }

    #[test]
    fn prop_channel_round_trip(text in "\\PC{0,3000}") {
        let bytes = text.as_bytes();
        let pieces: Vec<Vec<u8>> = bytes.chunks(700).map(<[u8]>::to_vec).collect();
        let (captured, _) = drain_through_channel(&pieces);
        prop_assert_eq!(captured, text);
    }
}
