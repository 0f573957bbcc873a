use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::process::Stdio;

use tracing::trace;

use crate::error::{Result, TransportError};

/// Create an anonymous pipe with both ends marked close-on-exec.
///
/// Close-on-exec keeps the ends out of any spawned command unless they are
/// explicitly installed as its stdio, so end-of-file on the read end is seen
/// as soon as the intended writers are gone.
pub fn pipe() -> Result<(PipeReader, PipeWriter)> {
    let [read_fd, write_fd] = create_cloexec_pipe()?;

    // SAFETY: both descriptors were just returned by the kernel and are not
    // owned by anything else in this process.
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(read_fd), OwnedFd::from_raw_fd(write_fd)) };

    trace!(read_fd, write_fd, "created pipe");

    Ok((
        PipeReader {
            inner: File::from(read),
        },
        PipeWriter {
            inner: File::from(write),
        },
    ))
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn create_cloexec_pipe() -> Result<[RawFd; 2]> {
    let mut fds = [0 as libc::c_int; 2];
    // SAFETY: `fds` is a valid writable array of two descriptors.
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    if rc == -1 {
        return Err(TransportError::Pipe(std::io::Error::last_os_error()));
    }
    Ok(fds)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn create_cloexec_pipe() -> Result<[RawFd; 2]> {
    let mut fds = [0 as libc::c_int; 2];
    // SAFETY: `fds` is a valid writable array of two descriptors.
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc == -1 {
        return Err(TransportError::Pipe(std::io::Error::last_os_error()));
    }
    for fd in fds {
        // SAFETY: `fd` is an open descriptor returned by pipe() above.
        let rc = unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) };
        if rc == -1 {
            let err = std::io::Error::last_os_error();
            // SAFETY: both descriptors are still owned here and closed once.
            unsafe {
                libc::close(fds[0]);
                libc::close(fds[1]);
            }
            return Err(TransportError::Pipe(err));
        }
    }
    Ok(fds)
}

/// The read end of a pipe.
#[derive(Debug)]
pub struct PipeReader {
    inner: File,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl AsFd for PipeReader {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

impl AsRawFd for PipeReader {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

/// The write end of a pipe.
#[derive(Debug)]
pub struct PipeWriter {
    inner: File,
}

impl PipeWriter {
    /// Duplicate this end (creates a new close-on-exec file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            inner: self.inner.try_clone()?,
        })
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl AsFd for PipeWriter {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

impl AsRawFd for PipeWriter {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

/// Hand the write end to a spawned command as one of its stdio streams.
///
/// The descriptor is installed in the child with close-on-exec cleared; the
/// parent's copy is closed once the `Command` holding the `Stdio` is dropped.
impl From<PipeWriter> for Stdio {
    fn from(writer: PipeWriter) -> Self {
        Stdio::from(OwnedFd::from(writer.inner))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::process::Command;

    use super::*;

    #[test]
    fn bytes_written_are_read_back() {
        let (mut reader, mut writer) = pipe().unwrap();
        writer.write_all(b"hello\n").unwrap();
        drop(writer);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello\n");
    }

    #[test]
    fn both_ends_are_close_on_exec() {
        let (reader, writer) = pipe().unwrap();
        for fd in [reader.as_raw_fd(), writer.as_raw_fd()] {
            // SAFETY: `fd` is open for the duration of this test.
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert!(flags >= 0);
            assert_ne!(flags & libc::FD_CLOEXEC, 0);
        }
    }

    #[test]
    fn eof_once_all_writers_dropped() {
        let (mut reader, writer) = pipe().unwrap();
        let second = writer.try_clone().unwrap();
        drop(writer);
        drop(second);

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn writer_redirects_command_stdout() {
        let (mut reader, writer) = pipe().unwrap();

        let mut command = Command::new("sh");
        command.arg("-c").arg("echo redirected").stdout(writer);
        let mut child = command.spawn().unwrap();
        drop(command);

        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert!(child.wait().unwrap().success());
        assert_eq!(out, "redirected\n");
    }
}
