//! Signal handling and background-process hygiene.
//!
//! The SIGINT handler only sets an atomic flag; the REPL polls and consumes
//! it each iteration. Foreground children reset SIGINT to the default
//! disposition before exec (see the spawner), so `^C` cancels them without
//! any shell involvement.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

static GOT_SIGINT: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_: i32) {
    GOT_SIGINT.store(true, Ordering::Relaxed);
}

/// Install the SIGINT flag handler. Call once before the REPL loop.
pub fn install_sigint_handler() {
    // Safety: the handler only performs an atomic store.
    unsafe {
        let _ = signal(Signal::SIGINT, SigHandler::Handler(on_sigint));
    }
}

/// Ignore SIGPIPE in the shell process. A builtin feeding a pipeline whose
/// reader already exited must see `EPIPE` from write, not die. Children get
/// the default disposition back before exec.
pub fn ignore_sigpipe() {
    // Safety: setting a disposition to SIG_IGN.
    unsafe {
        let _ = signal(Signal::SIGPIPE, SigHandler::SigIgn);
    }
}

/// Consume the SIGINT flag, returning whether it was set.
pub fn take_sigint() -> bool {
    GOT_SIGINT.swap(false, Ordering::Relaxed)
}

/// Collect any exited background children without blocking. Called once per
/// prompt iteration.
pub fn reap_background() {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(_) => continue,
        }
    }
}
