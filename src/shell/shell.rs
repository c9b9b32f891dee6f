//! Shell driver
//!
//! Owns the shell state, the builtin registry, and the policies, and drives
//! the parser and executor from either an interactive REPL or a batch
//! string/script.
//!
//! The REPL accumulates lines while the parser reports Incomplete, showing
//! the continuation prompt; a parse error clears the buffer and sets status
//! 2 without ending the session. In batch mode the same conditions are fatal
//! with exit 2.

use std::path::{Path, PathBuf};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::builtins::BuiltinRegistry;
use crate::executor::{Executor, ShellState};
use crate::parser::{parse, ParseResult, Program};
use crate::policy::{DefaultExecPolicy, SecurityPolicy};
use crate::shell::signals;

const PROMPT: &str = "clanker > ";
const CONTINUATION_PROMPT: &str = "... ";

pub struct Shell {
    state: ShellState,
    builtins: BuiltinRegistry,
    policy: DefaultExecPolicy,
    security: SecurityPolicy,
}

impl Shell {
    /// Build a shell sandboxed to the current working directory.
    pub fn new() -> std::io::Result<Self> {
        Self::with_root(std::env::current_dir()?)
    }

    /// Build a shell sandboxed to `root`. The canonical form of `root`
    /// becomes both the sandbox boundary and the initial cwd.
    pub fn with_root(root: PathBuf) -> std::io::Result<Self> {
        let root = root.canonicalize()?;
        signals::ignore_sigpipe();
        Ok(Self {
            state: ShellState::new(root),
            builtins: BuiltinRegistry::with_defaults(),
            policy: DefaultExecPolicy,
            security: SecurityPolicy::capture_startup_identity(),
        })
    }

    pub fn security(&self) -> &SecurityPolicy {
        &self.security
    }

    pub fn last_status(&self) -> i32 {
        self.state.last_status
    }

    fn dispatch(&mut self, program: &Program) -> i32 {
        let Self { ref mut state, ref builtins, ref policy, ref security } = *self;
        let executor = Executor::new(builtins, policy, security);
        let status = executor.run_program(state, program);
        state.last_status = status;
        status
    }

    /// Interactive REPL. Returns the status to exit with.
    pub fn run_interactive(&mut self) -> i32 {
        signals::install_sigint_handler();

        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                eprintln!("clanker: {}", e);
                return 1;
            }
        };
        let mut buffer = String::new();

        loop {
            signals::reap_background();
            if signals::take_sigint() {
                println!();
                buffer.clear();
            }

            let prompt = if buffer.is_empty() { PROMPT } else { CONTINUATION_PROMPT };
            let line = match editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    println!();
                    buffer.clear();
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    return self.state.last_status;
                }
                Err(e) => {
                    eprintln!("clanker: {}", e);
                    return self.state.last_status;
                }
            };

            if buffer.is_empty() {
                buffer = line;
            } else {
                buffer.push('\n');
                buffer.push_str(&line);
            }

            match parse(&buffer) {
                ParseResult::Incomplete => continue,
                ParseResult::Error(message) => {
                    eprintln!("syntax error: {}", message);
                    buffer.clear();
                    self.state.last_status = 2;
                }
                ParseResult::Complete(program) => {
                    let _ = editor.add_history_entry(buffer.as_str());
                    buffer.clear();
                    if let Program::List(list) = &program {
                        if list.is_empty() {
                            continue;
                        }
                    }
                    self.dispatch(&program);
                }
            }
        }
    }

    /// Batch execution of a command string. Incomplete input at EOF is an
    /// error here, unlike in the REPL.
    pub fn run_string(&mut self, source: &str) -> i32 {
        match parse(source) {
            ParseResult::Incomplete => {
                eprintln!("parse: unexpected end of input");
                2
            }
            ParseResult::Error(message) => {
                eprintln!("syntax error: {}", message);
                2
            }
            ParseResult::Complete(program) => self.dispatch(&program),
        }
    }

    /// Batch execution of a script file.
    pub fn run_file(&mut self, path: &Path) -> i32 {
        match std::fs::read_to_string(path) {
            Ok(source) => self.run_string(&source),
            Err(_) => {
                eprintln!("clanker: cannot open script: {}", path.display());
                2
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct Fixture {
        shell: Shell,
        saved_dir: PathBuf,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let shell = Shell::with_root(dir.path().to_path_buf()).unwrap();
            Self {
                shell,
                saved_dir: std::env::current_dir().unwrap(),
                _dir: dir,
            }
        }

        fn root(&self) -> PathBuf {
            self.shell.state.root.clone()
        }

        fn path(&self, name: &str) -> String {
            self.root().join(name).to_string_lossy().into_owned()
        }

        fn read(&self, name: &str) -> String {
            std::fs::read_to_string(self.root().join(name)).unwrap()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.saved_dir);
        }
    }

    #[test]
    fn test_run_string_simple() {
        let mut f = Fixture::new();
        let out = f.path("out.txt");
        assert_eq!(f.shell.run_string(&format!("echo hi > {}", out)), 0);
        assert_eq!(f.read("out.txt"), "hi\n");
        assert_eq!(f.shell.last_status(), 0);
    }

    #[test]
    fn test_run_string_incomplete_is_exit_2() {
        let mut f = Fixture::new();
        assert_eq!(f.shell.run_string("echo a |"), 2);
        assert_eq!(f.shell.run_string("echo 'open"), 2);
        assert_eq!(f.shell.run_string("echo a &&"), 2);
    }

    #[test]
    fn test_run_string_parse_error_is_exit_2() {
        let mut f = Fixture::new();
        assert_eq!(f.shell.run_string("| cat"), 2);
    }

    #[test]
    fn test_run_string_empty_input_is_success() {
        let mut f = Fixture::new();
        assert_eq!(f.shell.run_string(""), 0);
        assert_eq!(f.shell.run_string("   \t  "), 0);
        assert_eq!(f.shell.run_string("# comment only"), 0);
    }

    #[test]
    fn test_run_string_multiline_script() {
        let mut f = Fixture::new();
        let a = f.path("a");
        let b = f.path("b");
        let script = format!("echo one > {}\necho two > {}\nfalse || echo three >> {}\n", a, b, b);
        assert_eq!(f.shell.run_string(&script), 0);
        assert_eq!(f.read("a"), "one\n");
        assert_eq!(f.read("b"), "two\nthree\n");
    }

    #[test]
    fn test_run_string_status_of_last_command() {
        let mut f = Fixture::new();
        assert_eq!(f.shell.run_string("true; false"), 1);
        assert_eq!(f.shell.run_string("false; true"), 0);
        assert_eq!(f.shell.run_string("nosuchcmd-xyz"), 127);
    }

    #[test]
    #[serial]
    fn test_run_string_cd_updates_children() {
        let mut f = Fixture::new();
        std::fs::create_dir(f.root().join("sub")).unwrap();
        let out = f.path("pwd.txt");
        // cd then pwd through the builtin; children inherit the new cwd.
        assert_eq!(f.shell.run_string(&format!("cd sub; pwd > {}", out)), 0);
        assert_eq!(f.read("pwd.txt"), format!("{}\n", f.root().join("sub").display()));
    }

    #[test]
    #[serial]
    fn test_run_string_cd_blocked() {
        let mut f = Fixture::new();
        assert_eq!(f.shell.run_string("cd /etc"), 1);
        assert_eq!(f.shell.state.cwd, f.root());
    }

    #[test]
    fn test_run_file() {
        let mut f = Fixture::new();
        let script = f.root().join("script.ck");
        let out = f.path("from-script");
        std::fs::write(&script, format!("echo scripted > {}\n", out)).unwrap();
        assert_eq!(f.shell.run_file(&script), 0);
        assert_eq!(f.read("from-script"), "scripted\n");
    }

    #[test]
    fn test_run_file_missing() {
        let mut f = Fixture::new();
        assert_eq!(f.shell.run_file(Path::new("/no/such/script.ck")), 2);
    }

    #[test]
    #[serial]
    fn test_builtin_output_through_pipeline() {
        let mut f = Fixture::new();
        let out = f.path("models.txt");
        assert_eq!(f.shell.run_string(&format!("models | cat > {}", out)), 0);
        assert_eq!(f.read("models.txt"), "openai:gpt-stub\nanthropic:claude-stub\n");
    }

    #[test]
    #[serial]
    fn test_builtin_into_dead_reader_does_not_kill_shell() {
        let mut f = Fixture::new();
        // The reader fails to exec; the builtin's write must surface as
        // EPIPE, not SIGPIPE, and the pipeline reports the reader's status.
        assert_eq!(f.shell.run_string("help | nosuchcmd-pipe"), 127);
        // The shell is still alive and working.
        assert_eq!(f.shell.run_string("true"), 0);
    }

    #[test]
    #[serial]
    fn test_llm_stub_end_to_end() {
        let mut f = Fixture::new();
        let out = f.path("ask.txt");
        assert_eq!(
            f.shell.run_string(&format!("ask openai hello there > {}", out)),
            0
        );
        assert_eq!(f.read("ask.txt"), "[stub openai] hello there\n");
    }
}
