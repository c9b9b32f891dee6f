//! In-process builtin commands.
//!
//! A builtin receives a [`BuiltinContext`] and its arguments (without the
//! command name) and returns an exit status. Builtins write only through the
//! context fds, never directly to process stdio, so they participate
//! correctly in pipelines.

pub mod cd_cmd;
pub mod exit_cmd;
pub mod help_cmd;
pub mod llm_cmd;
pub mod pwd_cmd;

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

use crate::executor::fd::write_str;

/// Everything a builtin may touch: the sandbox root, the shell-maintained
/// directories, the stdio fds for this invocation, and the registry itself
/// (for `help` enumeration).
pub struct BuiltinContext<'a> {
    pub root: &'a Path,
    pub cwd: &'a mut PathBuf,
    pub oldpwd: &'a mut Option<PathBuf>,
    pub in_fd: RawFd,
    pub out_fd: RawFd,
    pub err_fd: RawFd,
    pub registry: &'a BuiltinRegistry,
}

impl BuiltinContext<'_> {
    /// Write to this invocation's stdout; an unwritable fd maps to status 1.
    pub fn out(&self, text: &str) -> i32 {
        match write_str(self.out_fd, text) {
            Ok(()) => 0,
            Err(_) => 1,
        }
    }

    /// Write to this invocation's stderr, best effort.
    pub fn err(&self, text: &str) {
        let _ = write_str(self.err_fd, text);
    }
}

pub type BuiltinFn = fn(&mut BuiltinContext, &[String]) -> i32;

pub struct BuiltinEntry {
    pub func: BuiltinFn,
    pub help: &'static str,
}

/// Name to builtin mapping.
pub struct BuiltinRegistry {
    map: HashMap<String, BuiltinEntry>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    /// Registry with the core and stub LLM builtins installed.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("cd", cd_cmd::handle_cd, "cd [dir] - change directory (restricted to root)");
        registry.register("pwd", pwd_cmd::handle_pwd, "pwd [-r|--relative] - print current directory");
        registry.register("exit", exit_cmd::handle_exit, "exit [n] - exit the shell");
        registry.register("help", help_cmd::handle_help, "help - list built-ins");
        registry.register("models", llm_cmd::handle_models, "models - list configured model backends");
        registry.register("use", llm_cmd::handle_use, "use <backend> [model=<id>] - select default backend (stub)");
        registry.register("prompt", llm_cmd::handle_prompt, "prompt <text...> - send text to default model (stub)");
        registry.register("ask", llm_cmd::handle_ask, "ask <backend> <text...> - send text to backend (stub)");
        registry
    }

    pub fn register(&mut self, name: &str, func: BuiltinFn, help: &'static str) {
        self.map.insert(name.to_string(), BuiltinEntry { func, help });
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinEntry> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// `(name, help)` pairs sorted by name.
    pub fn help_items(&self) -> Vec<(&str, &'static str)> {
        let mut items: Vec<_> = self
            .map
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.help))
            .collect();
        items.sort_by_key(|(name, _)| *name);
        items
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
