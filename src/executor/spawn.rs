//! External process spawner.
//!
//! One job: start a single external program with the requested stdio
//! descriptors and a set of fds to close in the child before exec. Exec
//! errno is only observable in the forked child, so the child itself exits
//! 127 for a missing command and 126 for any other exec failure; the parent
//! reads those through `wait_status`.

use std::ffi::CString;
use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, execvp, fork, ForkResult, Pid};

/// Command found but not executable, or the spawn itself failed.
pub const STATUS_NOT_EXECUTABLE: i32 = 126;
/// Command not found (exec reported `ENOENT`).
pub const STATUS_NOT_FOUND: i32 = 127;

/// Everything needed to start one external program.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub argv: Vec<String>,
    /// Stdio for the child; -1 inherits the parent's descriptor.
    pub stdin_fd: RawFd,
    pub stdout_fd: RawFd,
    pub stderr_fd: RawFd,
    /// Closed in the child before exec. Non-adjacent pipeline children must
    /// not keep a pipe's write end alive or downstream readers never see EOF.
    pub close_fds: Vec<RawFd>,
}

impl SpawnSpec {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            stdin_fd: -1,
            stdout_fd: -1,
            stderr_fd: -1,
            close_fds: Vec::new(),
        }
    }
}

/// Fork and exec the program described by `spec`, with PATH lookup.
///
/// Returns the child pid, or the fork-level errno. Exec-level failures
/// surface through the child's exit status instead (127 / 126).
pub fn spawn_external(spec: &SpawnSpec) -> Result<Pid, Errno> {
    if spec.argv.is_empty() {
        return Err(Errno::EINVAL);
    }
    let mut cstrs = Vec::with_capacity(spec.argv.len());
    for arg in &spec.argv {
        cstrs.push(CString::new(arg.as_str()).map_err(|_| Errno::EINVAL)?);
    }

    // Safety: the child only calls async-signal-safe operations before exec.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            for &fd in &spec.close_fds {
                let _ = close(fd);
            }
            for (src, dst) in [
                (spec.stdin_fd, 0),
                (spec.stdout_fd, 1),
                (spec.stderr_fd, 2),
            ] {
                if src >= 0 && dup2(src, dst).is_err() {
                    unsafe { libc::_exit(STATUS_NOT_EXECUTABLE) }
                }
            }
            // The shell traps SIGINT and ignores SIGPIPE; children take the
            // default dispositions so ^C and broken pipes behave normally.
            unsafe {
                let _ = signal(Signal::SIGINT, SigHandler::SigDfl);
                let _ = signal(Signal::SIGQUIT, SigHandler::SigDfl);
                let _ = signal(Signal::SIGPIPE, SigHandler::SigDfl);
            }
            let err: Errno = match execvp(&cstrs[0], &cstrs) {
                Ok(never) => match never {},
                Err(e) => e,
            };
            let code = if err == Errno::ENOENT {
                STATUS_NOT_FOUND
            } else {
                STATUS_NOT_EXECUTABLE
            };
            unsafe { libc::_exit(code) }
        }
    }
}

/// Block until `pid` exits, retrying on `EINTR`, and map the wait status:
/// normal exit to its code, signal death to 128 + signo, anything else to 1.
pub fn wait_status(pid: Pid) -> i32 {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, sig, _)) => return 128 + sig as i32,
            Err(Errno::EINTR) => continue,
            _ => return 1,
        }
    }
}
