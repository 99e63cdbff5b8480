//! Wake-up signal for a reader blocked on the monitor connection.

use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;

/// Two linked endpoints used only to force a blocked reader out of its wait.
///
/// Writing to the signal end makes the wake end readable. The byte is never
/// consumed, so once signalled every later wait on the same pair returns
/// immediately.
#[derive(Debug)]
pub struct CancelPair {
    signal: UnixStream,
    wake: UnixStream,
}

impl CancelPair {
    /// Create a connected pair.
    pub fn new() -> io::Result<Self> {
        let (signal, wake) = UnixStream::pair()?;
        Ok(Self { signal, wake })
    }

    /// Write one byte to the signal end.
    pub fn signal(&self) -> io::Result<()> {
        loop {
            match (&self.signal).write(b"T") {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Descriptor that becomes readable once [`signal`](Self::signal) was called.
    pub fn wake_fd(&self) -> BorrowedFd<'_> {
        self.wake.as_fd()
    }

    /// Consume and count the pending wake bytes.
    #[cfg(test)]
    pub(crate) fn drain(&self) -> usize {
        use std::io::Read;

        self.wake.set_nonblocking(true).unwrap();
        let mut buf = [0u8; 16];
        let mut total = 0;
        loop {
            match (&self.wake).read(&mut buf) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("drain failed: {}", e),
            }
        }
        self.wake.set_nonblocking(false).unwrap();
        total
    }
}
