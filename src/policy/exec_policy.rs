//! External-execution policy seam.
//!
//! Command denial, PATH rewriting, or container-style confinement become an
//! injection here instead of an executor rewrite. The default policy allows
//! every command and delegates spawning to the process spawner.

use nix::errno::Errno;
use nix::unistd::Pid;

use crate::executor::spawn::{spawn_external, SpawnSpec};

/// Decides whether an external command may run, and performs the spawn.
pub trait ExecPolicy {
    /// Returns `Err(reason)` when `argv` must not be executed.
    fn allow_external(&self, argv: &[String]) -> Result<(), String>;

    /// Spawn an external process. A policy may rewrite argv or environment
    /// before delegating.
    fn spawn_external(&self, spec: &SpawnSpec) -> Result<Pid, Errno>;
}

/// Allows everything; spawning goes straight to the spawner.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExecPolicy;

impl ExecPolicy for DefaultExecPolicy {
    fn allow_external(&self, _argv: &[String]) -> Result<(), String> {
        Ok(())
    }

    fn spawn_external(&self, spec: &SpawnSpec) -> Result<Pid, Errno> {
        spawn_external(spec)
    }
}
