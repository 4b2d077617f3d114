use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Largest HDLC frame we read, FCS included
pub const MAX_FRAME_LEN: usize = 1024;

/// Transport for raw HDLC frames of one D-channel
pub trait FrameIo: Send {
    /// Reads one frame. `None` blocks, `Some(Duration::ZERO)` polls.
    /// Returns `Ok(None)` when nothing arrived in time.
    fn read_frame(&mut self, timeout: Option<Duration>) -> io::Result<Option<Vec<u8>>>;

    /// Writes one frame, FCS included. Returns the number of octets written.
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<usize>;
}

/// One frame per datagram, as delivered by HDLC drivers exposing a socket
pub struct UnixDatagramIo {
    sock: UnixDatagram,
}

impl UnixDatagramIo {
    /// Binds `local` and connects to `peer`. A stale socket file at `local` is replaced.
    pub fn bind(local: impl AsRef<Path>, peer: impl AsRef<Path>) -> io::Result<Self> {
        let local = local.as_ref();
        if local.exists() {
            std::fs::remove_file(local)?;
        }
        let sock = UnixDatagram::bind(local)?;
        sock.connect(peer)?;
        Ok(Self { sock })
    }

    /// Wraps an already connected socket, e.g. one end of `UnixDatagram::pair()`
    pub fn from_socket(sock: UnixDatagram) -> Self {
        Self { sock }
    }

    pub fn pair() -> io::Result<(Self, Self)> {
        let (a, b) = UnixDatagram::pair()?;
        Ok((Self::from_socket(a), Self::from_socket(b)))
    }
}

impl FrameIo for UnixDatagramIo {
    fn read_frame(&mut self, timeout: Option<Duration>) -> io::Result<Option<Vec<u8>>> {
        match timeout {
            Some(t) if t.is_zero() => self.sock.set_nonblocking(true)?,
            t => {
                self.sock.set_nonblocking(false)?;
                self.sock.set_read_timeout(t)?;
            }
        }
        let mut buf = vec![0u8; MAX_FRAME_LEN];
        match self.sock.recv(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.sock.send(frame)
    }
}

/// In-memory D-channel, one end of a `linked_pair`
pub struct LinkedFrameIo {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    /// Sender feeding our own receive side, handed out by `inbound`
    inbound_tx: Sender<Vec<u8>>,
}

/// Two frame transports wired back to back
pub fn linked_pair() -> (LinkedFrameIo, LinkedFrameIo) {
    let (a_tx, b_rx) = crossbeam_channel::unbounded();
    let (b_tx, a_rx) = crossbeam_channel::unbounded();
    let a = LinkedFrameIo { tx: a_tx.clone(), rx: a_rx, inbound_tx: b_tx.clone() };
    let b = LinkedFrameIo { tx: b_tx, rx: b_rx, inbound_tx: a_tx };
    (a, b)
}

impl LinkedFrameIo {
    /// Handles on the frames travelling towards this end. Frames taken from the
    /// receiver never reach the owner, frames pushed into the sender arrive as if
    /// the peer had sent them.
    pub fn inbound(&self) -> (Sender<Vec<u8>>, Receiver<Vec<u8>>) {
        (self.inbound_tx.clone(), self.rx.clone())
    }
}

impl FrameIo for LinkedFrameIo {
    fn read_frame(&mut self, timeout: Option<Duration>) -> io::Result<Option<Vec<u8>>> {
        let disconnected = || io::Error::new(io::ErrorKind::BrokenPipe, "peer is gone");
        match timeout {
            Some(t) if t.is_zero() => match self.rx.try_recv() {
                Ok(f) => Ok(Some(f)),
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => Err(disconnected()),
            },
            Some(t) => match self.rx.recv_timeout(t) {
                Ok(f) => Ok(Some(f)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => Err(disconnected()),
            },
            None => self.rx.recv().map(Some).map_err(|_| disconnected()),
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.tx
            .send(frame.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer is gone"))?;
        Ok(frame.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_pair_carries_frames_both_ways() {
        let (mut a, mut b) = linked_pair();
        assert_eq!(a.write_frame(&[1, 2, 3]).unwrap(), 3);
        b.write_frame(&[9]).unwrap();
        assert_eq!(b.read_frame(Some(Duration::ZERO)).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(b.read_frame(Some(Duration::ZERO)).unwrap(), None);
        assert_eq!(a.read_frame(Some(Duration::from_millis(10))).unwrap(), Some(vec![9]));
    }

    #[test]
    fn inbound_handles_intercept_and_inject() {
        let (mut a, mut b) = linked_pair();
        let (inject, tap) = b.inbound();
        a.write_frame(&[1]).unwrap();
        assert_eq!(tap.try_recv().unwrap(), vec![1]);
        inject.send(vec![2]).unwrap();
        assert_eq!(b.read_frame(Some(Duration::ZERO)).unwrap(), Some(vec![2]));
    }

    #[test]
    fn unix_datagram_pair() {
        let (mut a, mut b) = UnixDatagramIo::pair().unwrap();
        a.write_frame(&[0x02, 0x01, 0x7f]).unwrap();
        assert_eq!(b.read_frame(Some(Duration::from_millis(100))).unwrap(), Some(vec![0x02, 0x01, 0x7f]));
        assert_eq!(b.read_frame(Some(Duration::ZERO)).unwrap(), None);
    }
}
