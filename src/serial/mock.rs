//! Scripted port opener for testing the link state machine without
//! hardware.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use super::PortOpener;

/// One scripted read result.
#[derive(Debug, Clone)]
pub enum Chunk {
    /// Bytes delivered by the link (may contain partial or multiple lines).
    Data(Vec<u8>),
    /// A read timeout (idle link).
    Timeout,
    /// Clean end of stream.
    Eof,
    /// An I/O error tearing down the link.
    Error,
}

enum Script {
    Stream(Vec<Chunk>),
    Failure,
}

/// [`PortOpener`] double: each `open` consumes the next script in order.
/// With no scripts left, opens fail (the source keeps backing off).
#[derive(Default)]
pub struct ScriptedOpener {
    scripts: Mutex<VecDeque<Script>>,
    opened: AtomicUsize,
}

impl ScriptedOpener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful open delivering `chunks` in order.
    pub fn push_stream(&self, chunks: Vec<Chunk>) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::Stream(chunks));
    }

    /// Queue a failed open attempt.
    pub fn push_failure(&self) {
        self.scripts.lock().unwrap().push_back(Script::Failure);
    }

    /// Number of successful opens so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl PortOpener for ScriptedOpener {
    fn open(&self, _port: &str, _baud: u32) -> io::Result<Box<dyn Read + Send>> {
        match self.scripts.lock().unwrap().pop_front() {
            Some(Script::Stream(chunks)) => {
                self.opened.fetch_add(1, Ordering::Relaxed);
                Ok(Box::new(ScriptedStream {
                    chunks: chunks.into(),
                }))
            }
            Some(Script::Failure) | None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "scripted open failure",
            )),
        }
    }
}

struct ScriptedStream {
    chunks: VecDeque<Chunk>,
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.chunks.pop_front() {
            Some(Chunk::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.chunks.push_front(Chunk::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
            Some(Chunk::Timeout) => {
                // A real port blocks for the read timeout; a tiny sleep keeps
                // the reader loop from spinning hot in tests.
                thread::sleep(Duration::from_millis(5));
                Err(io::Error::new(io::ErrorKind::TimedOut, "scripted timeout"))
            }
            Some(Chunk::Eof) => Ok(0),
            Some(Chunk::Error) | None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted link error",
            )),
        }
    }
}
