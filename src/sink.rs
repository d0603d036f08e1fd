//! Debug sink trait for abstraction and testability
//!
//! The notifier writes its trace text to a raw character output. This trait
//! allows that output to be a character primitive, a blocking I/O port,
//! a buffer drained by the debug CDC port, or a mock for testing.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::pipe::Pipe;

/// Raw character output used for diagnostic tracing.
///
/// Writes cannot fail from the caller's point of view. Implementations drop
/// output they cannot deliver.
pub trait DebugSink {
    /// Write a string to the sink verbatim
    fn write_raw_str(&mut self, s: &str);
}

impl<S: DebugSink + ?Sized> DebugSink for &mut S {
    fn write_raw_str(&mut self, s: &str) {
        (**self).write_raw_str(s)
    }
}

/// Sink that discards everything written to it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DebugSink for NullSink {
    fn write_raw_str(&mut self, _s: &str) {}
}

/// Sink that pushes each byte through a character output primitive.
///
/// Wraps a `putchar`-style function, e.g. a raw UART TX register write.
pub struct RawCharSink<F: FnMut(u8)> {
    putchar: F,
}

impl<F: FnMut(u8)> RawCharSink<F> {
    pub fn new(putchar: F) -> Self {
        Self { putchar }
    }
}

impl<F: FnMut(u8)> DebugSink for RawCharSink<F> {
    fn write_raw_str(&mut self, s: &str) {
        for &byte in s.as_bytes() {
            (self.putchar)(byte);
        }
    }
}

/// Sink backed by a blocking `embedded_io::Write` port.
///
/// Write errors are ignored (the port might not be connected).
pub struct IoSink<W: embedded_io::Write> {
    inner: W,
}

impl<W: embedded_io::Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Consume the sink, returning the wrapped port
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: embedded_io::Write> DebugSink for IoSink<W> {
    fn write_raw_str(&mut self, s: &str) {
        let _ = self.inner.write_all(s.as_bytes());
    }
}

/// Sink that queues text into a pipe drained by a writer task.
///
/// Never blocks: a line that does not fit in the free space is dropped
/// whole, e.g. while the debug port is not being read.
pub struct PipeSink<'a, M: RawMutex, const N: usize> {
    pipe: &'a Pipe<M, N>,
}

impl<'a, M: RawMutex, const N: usize> PipeSink<'a, M, N> {
    pub fn new(pipe: &'a Pipe<M, N>) -> Self {
        Self { pipe }
    }
}

impl<M: RawMutex, const N: usize> DebugSink for PipeSink<'_, M, N> {
    fn write_raw_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        if bytes.len() > self.pipe.free_capacity() {
            log::trace!("debug pipe full, dropping {} bytes", bytes.len());
            return;
        }

        let mut written = 0;
        while written < bytes.len() {
            match self.pipe.try_write(&bytes[written..]) {
                Ok(n) => written += n,
                Err(_) => break,
            }
        }
    }
}
