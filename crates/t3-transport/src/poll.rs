use std::io::ErrorKind;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// What a polled handle reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// Data can be read without blocking.
    pub readable: bool,
    /// The peer closed its end. Buffered data may still be readable.
    pub hangup: bool,
    /// The handle is in an error state.
    pub error: bool,
}

impl Readiness {
    /// True when a read would not block (data, end-of-file or an error).
    pub fn is_ready(&self) -> bool {
        self.readable || self.hangup || self.error
    }
}

/// Wait until at least one handle is readable, hung up, or `timeout` expires.
///
/// `None` slots are skipped, which lets callers keep a fixed slot per stream
/// after some of the streams have been closed. The returned vector has one
/// entry per slot. An interrupted wait reports nothing ready.
pub fn poll_readable(fds: &[Option<BorrowedFd<'_>>], timeout: Duration) -> Result<Vec<Readiness>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|fd| libc::pollfd {
            fd: fd.map_or(-1, |fd| fd.as_raw_fd()),
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    // Round up so a sub-millisecond wait does not turn into a busy loop.
    let timeout_ms =
        libc::c_int::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(libc::c_int::MAX);

    // SAFETY: `pollfds` is a valid, exclusively borrowed array of
    // `pollfds.len()` entries whose descriptors outlive this call.
    let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };

    if rc == -1 {
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            return Ok(vec![Readiness::default(); fds.len()]);
        }
        return Err(TransportError::Poll(err));
    }

    Ok(pollfds
        .iter()
        .map(|p| Readiness {
            readable: p.revents & libc::POLLIN != 0,
            hangup: p.revents & libc::POLLHUP != 0,
            error: p.revents & (libc::POLLERR | libc::POLLNVAL) != 0,
        })
        .collect())
}
