//! Owned file-descriptor plumbing for pipeline construction.
//!
//! Pipeline setup has many partial-failure states; every descriptor opened
//! while wiring a pipeline is held in an [`OwnedFd`] so all error paths close
//! it. Pipe ends are created close-on-exec: the spawner's `dup2` onto the
//! child's stdio clears the flag exactly where inheritance is wanted.

use std::os::fd::{BorrowedFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd;

/// Both ends of a freshly created pipe.
pub struct PipeEnds {
    pub read: OwnedFd,
    pub write: OwnedFd,
}

/// Create a pipe with both ends close-on-exec.
pub fn make_pipe() -> nix::Result<PipeEnds> {
    let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
    Ok(PipeEnds { read, write })
}

/// Write an entire buffer to a raw descriptor, retrying on `EINTR` and short
/// writes. Builtins use this to emit through their context fds.
pub fn write_all(fd: RawFd, mut buf: &[u8]) -> nix::Result<()> {
    while !buf.is_empty() {
        // Safety: the caller guarantees fd stays open for the duration.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        match unistd::write(borrowed, buf) {
            Ok(0) => break,
            Ok(n) => buf = &buf[n..],
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Convenience for string payloads.
pub fn write_str(fd: RawFd, s: &str) -> nix::Result<()> {
    write_all(fd, s.as_bytes())
}
