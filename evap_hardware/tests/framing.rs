use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use evap_hardware::{HwError, ReplyTiming, read_reply};
use rstest::rstest;

/// Reader that hands out queued chunks, then reports a read timeout like an
/// idle serial port.
struct ChunkReader {
    chunks: VecDeque<Vec<u8>>,
}

impl ChunkReader {
    fn new(chunks: &[&[u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.chunks.pop_front() {
            Some(c) => {
                let n = c.len().min(buf.len());
                buf[..n].copy_from_slice(&c[..n]);
                Ok(n)
            }
            None => Err(std::io::Error::new(ErrorKind::TimedOut, "idle")),
        }
    }
}

/// Reader that never stops producing bytes.
struct Babbler;

impl Read for Babbler {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::thread::sleep(Duration::from_millis(1));
        buf[0] = b'7';
        Ok(1)
    }
}

struct Broken;

impl Read for Broken {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
    }
}

fn fast() -> ReplyTiming {
    ReplyTiming {
        quiet: Duration::from_millis(10),
        timeout: Duration::from_millis(200),
        poll: Duration::from_millis(1),
    }
}

#[rstest]
#[case(&[b"12.5\r\n" as &[u8]], "12.5\r\n")]
#[case(&[b"1" as &[u8], b"2.", b"5\r\n"], "12.5\r\n")]
#[case(&[b"3.7" as &[u8]], "3.7")]
#[case(&[], "")]
fn assembles_reply(#[case] chunks: &[&[u8]], #[case] expected: &str) {
    let mut r = ChunkReader::new(chunks);
    assert_eq!(read_reply(&mut r, &fast()).unwrap(), expected);
}

#[test]
fn stops_at_terminator_without_waiting_for_quiet() {
    let mut r = ChunkReader::new(&[b"42\n"]);
    let timing = ReplyTiming {
        quiet: Duration::from_millis(500),
        ..fast()
    };
    let t0 = Instant::now();
    assert_eq!(read_reply(&mut r, &timing).unwrap(), "42\n");
    assert!(t0.elapsed() < Duration::from_millis(400));
}

#[test]
fn streaming_past_deadline_is_a_timeout() {
    let timing = ReplyTiming {
        timeout: Duration::from_millis(30),
        ..fast()
    };
    let err = read_reply(&mut Babbler, &timing).unwrap_err();
    assert!(matches!(err, HwError::Timeout));
}

#[test]
fn hard_io_errors_surface() {
    let err = read_reply(&mut Broken, &fast()).unwrap_err();
    assert!(matches!(err, HwError::Io(_)));
}
