//! Executor
//!
//! Walks the AST: wires pipes, applies redirections, spawns externals, runs
//! in-process builtins, and enforces the identity guard at every execution
//! boundary. Statuses flow back as plain integers; the last stage of a
//! pipeline decides its status (pipefail is not implemented).
//!
//! Pipeline shapes:
//! - single stage: builtin in-process, external spawned directly
//! - all-external: every stage spawned, pipes threaded left to right
//! - builtin-first: the builtin feeds the first pipe, later stages must be
//!   external

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

use nix::libc;
use nix::unistd::{fork, ForkResult};

use crate::ast::types::{AndOr, AndOrOp, CommandList, Pipeline, SimpleCommand, Terminator};
use crate::builtins::{BuiltinContext, BuiltinRegistry};
use crate::executor::fd::make_pipe;
use crate::executor::redirect::{plan_child_fds, SavedFds};
use crate::executor::spawn::{wait_status, SpawnSpec, STATUS_NOT_EXECUTABLE};
use crate::parser::Program;
use crate::policy::security::SECURITY_EXIT;
use crate::policy::{ExecPolicy, SecurityPolicy};

/// Exit status for unsupported constructs (builtin mid-pipeline, bad fd).
const STATUS_UNSUPPORTED: i32 = 2;

/// Shell-wide mutable state. `root` is fixed at startup; `cwd`/`oldpwd` are
/// shell-maintained and only change through the `cd` builtin. Spawned
/// children inherit the process working directory, which tracks `cwd`.
#[derive(Debug, Clone)]
pub struct ShellState {
    pub root: PathBuf,
    pub cwd: PathBuf,
    pub oldpwd: Option<PathBuf>,
    pub last_status: i32,
}

impl ShellState {
    pub fn new(root: PathBuf) -> Self {
        Self {
            cwd: root.clone(),
            root,
            oldpwd: None,
            last_status: 0,
        }
    }
}

/// Walks AST nodes. Holds no state of its own; every entry point takes the
/// shell state it mutates.
pub struct Executor<'a> {
    builtins: &'a BuiltinRegistry,
    policy: &'a dyn ExecPolicy,
    security: &'a SecurityPolicy,
}

impl<'a> Executor<'a> {
    pub fn new(
        builtins: &'a BuiltinRegistry,
        policy: &'a dyn ExecPolicy,
        security: &'a SecurityPolicy,
    ) -> Self {
        Self { builtins, policy, security }
    }

    /// Run a parsed program and return its status.
    pub fn run_program(&self, state: &mut ShellState, program: &Program) -> i32 {
        match program {
            Program::Pipeline(pipeline) => self.run_pipeline(state, pipeline),
            Program::List(list) => self.run_list(state, list),
        }
    }

    /// Sequential evaluation; returns the status of the last item.
    pub fn run_list(&self, state: &mut ShellState, list: &CommandList) -> i32 {
        let mut status = 0;
        for (andor, term) in &list.items {
            status = if *term == Terminator::Ampersand {
                self.run_background(state, andor)
            } else {
                self.run_andor(state, andor)
            };
            state.last_status = status;
        }
        status
    }

    /// Left-to-right short-circuit over an and-or chain.
    pub fn run_andor(&self, state: &mut ShellState, andor: &AndOr) -> i32 {
        let mut last = self.run_pipeline(state, &andor.first);
        for (op, rhs) in &andor.rest {
            let skip = match op {
                AndOrOp::AndIf => last != 0,
                AndOrOp::OrIf => last == 0,
            };
            if !skip {
                last = self.run_pipeline(state, rhs);
            }
        }
        last
    }

    /// Run one pipeline and return the mapped status of its last stage.
    pub fn run_pipeline(&self, state: &mut ShellState, pipeline: &Pipeline) -> i32 {
        if !self.identity_ok() {
            return SECURITY_EXIT;
        }
        if pipeline.stages.len() == 1 {
            return self.run_single(state, &pipeline.stages[0]);
        }
        let first_is_builtin = pipeline.stages[0]
            .argv
            .first()
            .map_or(false, |name| self.builtins.contains(name));
        if first_is_builtin {
            self.run_builtin_first(state, pipeline)
        } else {
            self.run_all_external(pipeline)
        }
    }

    /// Detach an and-or chain: fork, run it in the child, never wait.
    pub fn run_background(&self, state: &mut ShellState, andor: &AndOr) -> i32 {
        if !self.identity_ok() {
            return SECURITY_EXIT;
        }
        // Safety: the child re-enters ordinary executor code and always
        // leaves through _exit.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { .. }) => 0,
            Ok(ForkResult::Child) => {
                let status = self.run_andor(state, andor);
                unsafe { libc::_exit(status & 0xff) }
            }
            Err(_) => {
                eprintln!("clanker: fork failed");
                1
            }
        }
    }

    // ===========================================================================
    // SINGLE STAGE
    // ===========================================================================

    fn run_single(&self, state: &mut ShellState, cmd: &SimpleCommand) -> i32 {
        // Bare redirections: apply, restore, succeed. Opens (and truncates
        // or creates) every target without running anything.
        if cmd.argv.is_empty() {
            let mut saved = SavedFds::new();
            let result = saved.apply(&cmd.redirs);
            saved.restore();
            return match result {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("error: {}", e);
                    e.status()
                }
            };
        }

        if self.builtins.contains(&cmd.argv[0]) {
            return self.run_builtin_stage(state, cmd, None);
        }

        if let Err(reason) = self.policy.allow_external(&cmd.argv) {
            eprintln!("error: {}", reason);
            return STATUS_NOT_EXECUTABLE;
        }

        let plan = match plan_child_fds(&cmd.redirs, -1, -1) {
            Ok(plan) => plan,
            Err(e) => {
                eprintln!("error: {}", e);
                return e.status();
            }
        };
        let spec = SpawnSpec {
            argv: cmd.argv.clone(),
            stdin_fd: plan.stdin_fd,
            stdout_fd: plan.stdout_fd,
            stderr_fd: plan.stderr_fd,
            close_fds: Vec::new(),
        };
        if !self.identity_ok() {
            return SECURITY_EXIT;
        }
        match self.policy.spawn_external(&spec) {
            Ok(pid) => {
                drop(plan); // parent copies of redirect targets
                wait_status(pid)
            }
            Err(_) => STATUS_NOT_EXECUTABLE,
        }
    }

    /// Run a builtin with redirections applied in-process. `pipe_stdout`
    /// rebinds fd 1 to a pipe first; explicit redirections go on top and may
    /// legitimately point fd 1 elsewhere.
    fn run_builtin_stage(
        &self,
        state: &mut ShellState,
        cmd: &SimpleCommand,
        pipe_stdout: Option<RawFd>,
    ) -> i32 {
        let mut saved = SavedFds::new();
        if let Some(fd) = pipe_stdout {
            if let Err(e) = saved.save_and_set(1, fd) {
                saved.restore();
                eprintln!("error: {}", e);
                return e.status();
            }
        }
        if let Err(e) = saved.apply(&cmd.redirs) {
            saved.restore();
            eprintln!("error: {}", e);
            return e.status();
        }

        let entry = match self.builtins.get(&cmd.argv[0]) {
            Some(entry) => entry,
            None => {
                saved.restore();
                return crate::executor::spawn::STATUS_NOT_FOUND;
            }
        };
        let ShellState { ref root, ref mut cwd, ref mut oldpwd, .. } = *state;
        let mut ctx = BuiltinContext {
            root,
            cwd,
            oldpwd,
            in_fd: 0,
            out_fd: 1,
            err_fd: 2,
            registry: self.builtins,
        };
        let status = (entry.func)(&mut ctx, &cmd.argv[1..]);
        saved.restore();
        status
    }

    // ===========================================================================
    // MULTI-STAGE PIPELINES
    // ===========================================================================

    /// Reject shapes that can never run, before any side effect: empty
    /// stages, builtins past the given start index, policy denials.
    fn prevalidate_stages(&self, stages: &[SimpleCommand], externals_from: usize) -> Option<i32> {
        for stage in &stages[externals_from..] {
            match stage.argv.first() {
                None => {
                    eprintln!("error: empty command in pipeline");
                    return Some(STATUS_UNSUPPORTED);
                }
                Some(name) if self.builtins.contains(name) => {
                    eprintln!(
                        "error: builtin '{}' is only supported as the first pipeline stage",
                        name
                    );
                    return Some(STATUS_UNSUPPORTED);
                }
                Some(_) => {
                    if let Err(reason) = self.policy.allow_external(&stage.argv) {
                        eprintln!("error: {}", reason);
                        return Some(STATUS_NOT_EXECUTABLE);
                    }
                }
            }
        }
        None
    }

    fn run_all_external(&self, pipeline: &Pipeline) -> i32 {
        let stages = &pipeline.stages;
        if let Some(status) = self.prevalidate_stages(stages, 0) {
            return status;
        }

        let mut pids = Vec::with_capacity(stages.len());
        let mut prev_read: Option<OwnedFd> = None;
        let mut early: Option<i32> = None;

        for (i, stage) in stages.iter().enumerate() {
            let last = i == stages.len() - 1;
            let next = if last {
                None
            } else {
                match make_pipe() {
                    Ok(ends) => Some(ends),
                    Err(e) => {
                        eprintln!("error: {}", e);
                        early = Some(1);
                        break;
                    }
                }
            };

            let stdin_fd = prev_read.as_ref().map_or(-1, |fd| fd.as_raw_fd());
            let stdout_fd = next.as_ref().map_or(-1, |p| p.write.as_raw_fd());
            let plan = match plan_child_fds(&stage.redirs, stdin_fd, stdout_fd) {
                Ok(plan) => plan,
                Err(e) => {
                    eprintln!("error: {}", e);
                    early = Some(e.status());
                    break;
                }
            };

            let spec = SpawnSpec {
                argv: stage.argv.clone(),
                stdin_fd: plan.stdin_fd,
                stdout_fd: plan.stdout_fd,
                stderr_fd: plan.stderr_fd,
                close_fds: Vec::new(),
            };
            // Fresh identity check per spawn: drift mid-pipeline aborts the
            // remaining stages without creating their children.
            if !self.identity_ok() {
                early = Some(SECURITY_EXIT);
                break;
            }
            match self.policy.spawn_external(&spec) {
                Ok(pid) => pids.push(pid),
                Err(_) => {
                    early = Some(STATUS_NOT_EXECUTABLE);
                    break;
                }
            }

            // The parent is done with the previous read end and this stage's
            // write end; dropping them here is what lets EOF propagate.
            prev_read = next.map(|p| p.read);
        }

        drop(prev_read);

        let mut status = 0;
        for pid in pids {
            status = wait_status(pid);
        }
        early.unwrap_or(status)
    }

    fn run_builtin_first(&self, state: &mut ShellState, pipeline: &Pipeline) -> i32 {
        let stages = &pipeline.stages;
        if let Some(status) = self.prevalidate_stages(stages, 1) {
            return status;
        }

        let first_pipe = match make_pipe() {
            Ok(ends) => ends,
            Err(e) => {
                eprintln!("error: {}", e);
                return 1;
            }
        };
        let write_end = first_pipe.write;
        let mut prev_read: Option<OwnedFd> = Some(first_pipe.read);
        let mut pids = Vec::with_capacity(stages.len() - 1);
        let mut early: Option<i32> = None;

        for (i, stage) in stages.iter().enumerate().skip(1) {
            let last = i == stages.len() - 1;
            let next = if last {
                None
            } else {
                match make_pipe() {
                    Ok(ends) => Some(ends),
                    Err(e) => {
                        eprintln!("error: {}", e);
                        early = Some(1);
                        break;
                    }
                }
            };

            let stdin_fd = prev_read.as_ref().map_or(-1, |fd| fd.as_raw_fd());
            let stdout_fd = next.as_ref().map_or(-1, |p| p.write.as_raw_fd());
            let plan = match plan_child_fds(&stage.redirs, stdin_fd, stdout_fd) {
                Ok(plan) => plan,
                Err(e) => {
                    eprintln!("error: {}", e);
                    early = Some(e.status());
                    break;
                }
            };

            let spec = SpawnSpec {
                argv: stage.argv.clone(),
                stdin_fd: plan.stdin_fd,
                stdout_fd: plan.stdout_fd,
                stderr_fd: plan.stderr_fd,
                // No external child may hold the builtin's pipe open, or the
                // stage after the builtin never sees EOF.
                close_fds: vec![write_end.as_raw_fd()],
            };
            // Fresh identity check per spawn, as in the all-external path.
            if !self.identity_ok() {
                early = Some(SECURITY_EXIT);
                break;
            }
            match self.policy.spawn_external(&spec) {
                Ok(pid) => pids.push(pid),
                Err(_) => {
                    early = Some(STATUS_NOT_EXECUTABLE);
                    break;
                }
            }

            prev_read = next.map(|p| p.read);
        }

        drop(prev_read);

        if early.is_none() {
            self.run_builtin_stage(state, &stages[0], Some(write_end.as_raw_fd()));
        }
        // Deliver EOF downstream, then collect the externals.
        drop(write_end);

        let mut status = 0;
        for pid in pids {
            status = wait_status(pid);
        }
        early.unwrap_or(status)
    }

    fn identity_ok(&self) -> bool {
        if self.security.identity_unchanged() {
            true
        } else {
            eprintln!("clanker: security: privilege change detected; refusing to execute");
            false
        }
    }
}
