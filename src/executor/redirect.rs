//! Redirection application.
//!
//! Redirections take two forms. For a spawned child, targets are opened in
//! the parent and handed to the spawner, which dup2s them onto the child's
//! stdio. For an in-process builtin, the shell's own 0/1/2 are rebound with
//! dup-saves and restored afterwards, so nothing persists past the command.
//!
//! Only fds 0, 1, and 2 may be redirected.

use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd::dup2;
use thiserror::Error;

use crate::ast::types::{RedirKind, Redirection};

/// Lowest fd number used for dup-saves, clear of the stdio range.
const SAVE_FD_FLOOR: RawFd = 10;

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("cannot open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("redirection for fd {0} is not supported")]
    UnsupportedFd(i32),
    #[error("{0}")]
    Os(#[from] nix::errno::Errno),
}

impl RedirectError {
    /// Exit status for this failure: 2 for unsupported constructs, 1
    /// otherwise.
    pub fn status(&self) -> i32 {
        match self {
            Self::UnsupportedFd(_) => 2,
            _ => 1,
        }
    }
}

/// Open a redirection target with the mode its operator implies. The
/// descriptor is close-on-exec; the spawner's dup2 clears the flag where
/// inheritance is wanted.
pub fn open_target(redir: &Redirection) -> Result<OwnedFd, RedirectError> {
    if !(0..=2).contains(&redir.fd) {
        return Err(RedirectError::UnsupportedFd(redir.fd));
    }
    let mut opts = OpenOptions::new();
    match redir.kind {
        RedirKind::In => {
            opts.read(true);
        }
        RedirKind::OutTrunc => {
            opts.write(true).create(true).truncate(true);
        }
        RedirKind::OutAppend => {
            opts.write(true).create(true).append(true);
        }
    }
    let file = opts.open(&redir.target).map_err(|source| RedirectError::Open {
        path: redir.target.clone(),
        source,
    })?;
    Ok(OwnedFd::from(file))
}

/// Stdio fds to hand a spawned child, with the backing descriptors kept
/// alive until after the spawn.
pub struct ChildFds {
    pub stdin_fd: RawFd,
    pub stdout_fd: RawFd,
    pub stderr_fd: RawFd,
    owners: Vec<OwnedFd>,
}

impl ChildFds {
    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }
}

/// Resolve a stage's stdio plan: pipe defaults first, explicit redirections
/// on top.
pub fn plan_child_fds(
    redirs: &[Redirection],
    stdin_fd: RawFd,
    stdout_fd: RawFd,
) -> Result<ChildFds, RedirectError> {
    let mut plan = ChildFds {
        stdin_fd,
        stdout_fd,
        stderr_fd: -1,
        owners: Vec::new(),
    };
    for redir in redirs {
        let owned = open_target(redir)?;
        let raw = owned.as_raw_fd();
        plan.owners.push(owned);
        match redir.fd {
            0 => plan.stdin_fd = raw,
            1 => plan.stdout_fd = raw,
            _ => plan.stderr_fd = raw,
        }
    }
    Ok(plan)
}

/// Dup-saves of the shell's own stdio, put back in reverse order by
/// [`SavedFds::restore`].
pub struct SavedFds {
    saves: Vec<(RawFd, OwnedFd)>,
}

impl SavedFds {
    pub fn new() -> Self {
        Self { saves: Vec::new() }
    }

    /// Save `fd`, then rebind it to `src`.
    pub fn save_and_set(&mut self, fd: RawFd, src: RawFd) -> Result<(), RedirectError> {
        let save = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(SAVE_FD_FLOOR))?;
        // Safety: F_DUPFD_CLOEXEC returned a fresh descriptor we now own.
        self.saves.push((fd, unsafe { OwnedFd::from_raw_fd(save) }));
        dup2(src, fd)?;
        Ok(())
    }

    /// Open each target and rebind its fd in order. On failure the fds
    /// already rebound stay saved; the caller restores them.
    pub fn apply(&mut self, redirs: &[Redirection]) -> Result<(), RedirectError> {
        for redir in redirs {
            let target = open_target(redir)?;
            self.save_and_set(redir.fd, target.as_raw_fd())?;
        }
        Ok(())
    }

    /// Put every saved fd back, newest first.
    pub fn restore(mut self) {
        while let Some((fd, save)) = self.saves.pop() {
            let _ = dup2(save.as_raw_fd(), fd);
        }
    }
}

impl Default for SavedFds {
    fn default() -> Self {
        Self::new()
    }
}
