//! AST execution: pipelines, redirections, sequencing, background jobs.

pub mod executor;
pub mod fd;
pub mod redirect;
pub mod spawn;

pub use executor::{Executor, ShellState};
pub use spawn::{spawn_external, SpawnSpec};
