//! The byte transport an endpoint is bound to.
//!
//! Both callbacks are non-blocking: would-block is `ErrorKind::WouldBlock`
//! (or `Interrupted` for an EINTR race), and `recv` returning `Ok(0)` for a
//! non-empty buffer means the transport reached end-of-file.

use std::io::{self, Read, Write};

/// A non-blocking pull/push pair over opaque byte buffers.
pub trait Transport: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` on a non-empty buffer is EOF.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Write up to `buf.len()` bytes, returning how many were accepted.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// A transport over any `Read + Write` stream (e.g. a non-blocking
/// `TcpStream`).
pub struct StreamTransport<S> {
    stream: S,
}

impl<S: Read + Write + Send> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write + Send> Transport for StreamTransport<S> {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }
}

/// A transport built from two closures, for callers that already own a
/// callback pair rather than a stream type.
pub struct CallbackTransport<R, W> {
    recv: R,
    send: W,
}

impl<R, W> CallbackTransport<R, W>
where
    R: FnMut(&mut [u8]) -> io::Result<usize> + Send,
    W: FnMut(&[u8]) -> io::Result<usize> + Send,
{
    pub fn new(recv: R, send: W) -> Self {
        Self { recv, send }
    }
}

impl<R, W> Transport for CallbackTransport<R, W>
where
    R: FnMut(&mut [u8]) -> io::Result<usize> + Send,
    W: FnMut(&[u8]) -> io::Result<usize> + Send,
{
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (self.recv)(buf)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self.send)(buf)
    }
}
