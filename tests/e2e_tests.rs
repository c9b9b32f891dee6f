//! End-to-end tests: feed command strings through the full
//! lex / parse / execute path and observe real process output.
//!
//! Stdout is captured by temporarily rebinding fd 1 to a pipe, so these
//! tests serialize with everything else that touches process-global state.

use std::os::fd::AsRawFd;
use std::path::PathBuf;

use serial_test::serial;

use clanker::executor::fd::make_pipe;
use clanker::executor::redirect::SavedFds;
use clanker::Shell;

struct Fixture {
    shell: Shell,
    root: PathBuf,
    saved_dir: PathBuf,
    _dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        Self {
            shell: Shell::with_root(root.clone()).unwrap(),
            root,
            saved_dir: std::env::current_dir().unwrap(),
            _dir: dir,
        }
    }

    /// Run a command string with fd 1 captured; returns (status, stdout).
    fn run(&mut self, input: &str) -> (i32, String) {
        let ends = make_pipe().unwrap();
        let mut saved = SavedFds::new();
        saved.save_and_set(1, ends.write.as_raw_fd()).unwrap();
        let status = self.shell.run_string(input);
        saved.restore();
        drop(ends.write);

        let mut bytes = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match nix::unistd::read(ends.read.as_raw_fd(), &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => bytes.extend_from_slice(&buf[..n]),
            }
        }
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.saved_dir);
    }
}

#[test]
#[serial]
fn test_echo() {
    let mut f = Fixture::new();
    assert_eq!(f.run("echo hi"), (0, "hi\n".to_string()));
}

#[test]
#[serial]
fn test_pipeline() {
    let mut f = Fixture::new();
    assert_eq!(f.run("echo a|cat"), (0, "a\n".to_string()));
}

#[test]
#[serial]
fn test_sequence() {
    let mut f = Fixture::new();
    assert_eq!(f.run("echo a; echo b"), (0, "a\nb\n".to_string()));
}

#[test]
#[serial]
fn test_andif_short_circuit() {
    let mut f = Fixture::new();
    let (status, out) = f.run("false && echo x");
    assert_ne!(status, 0);
    assert_eq!(out, "");
}

#[test]
#[serial]
fn test_andor_chain() {
    let mut f = Fixture::new();
    assert_eq!(f.run("false && echo x || echo y"), (0, "y\n".to_string()));
}

#[test]
#[serial]
fn test_pipeline_then_andif() {
    let mut f = Fixture::new();
    assert_eq!(f.run("echo a | cat && echo b"), (0, "a\nb\n".to_string()));
}

#[test]
#[serial]
fn test_background_and_foreground() {
    let mut f = Fixture::new();
    let (status, out) = f.run("echo a & echo b");
    assert_eq!(status, 0);
    // Order is unspecified; both lines must appear.
    assert!(out.contains("a\n"), "missing background output: {:?}", out);
    assert!(out.contains("b\n"), "missing foreground output: {:?}", out);
}

#[test]
#[serial]
fn test_cd_outside_root_blocked() {
    let mut f = Fixture::new();
    let (status, _) = f.run("cd /etc");
    assert_eq!(status, 1);
}

#[test]
#[serial]
fn test_command_not_found() {
    let mut f = Fixture::new();
    let (status, _) = f.run("nosuchcmd-e2e");
    assert_eq!(status, 127);
}

#[test]
#[serial]
fn test_bare_redirection_truncates() {
    let mut f = Fixture::new();
    let out = f.root.join("out.txt");
    std::fs::write(&out, "stale").unwrap();
    let (status, _) = f.run(&format!("> {}", out.display()));
    assert_eq!(status, 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "");
}

#[test]
#[serial]
fn test_pwd_cd_round_trip() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.root.join("sub")).unwrap();

    let (status, first) = f.run("pwd");
    assert_eq!(status, 0);
    let (status, second) = f.run("cd .; pwd");
    assert_eq!(status, 0);
    assert_eq!(first, second);

    let (status, out) = f.run("cd sub; cd -; pwd");
    assert_eq!(status, 0);
    assert!(out.ends_with(&first), "cd - did not restore: {:?}", out);
}

#[test]
#[serial]
fn test_pwd_relative() {
    let mut f = Fixture::new();
    std::fs::create_dir(f.root.join("sub")).unwrap();
    assert_eq!(f.run("pwd -r"), (0, "/\n".to_string()));
    assert_eq!(f.run("cd sub; pwd --relative"), (0, "/sub\n".to_string()));
}

#[test]
#[serial]
fn test_quoting_end_to_end() {
    let mut f = Fixture::new();
    assert_eq!(f.run("echo 'a b'  c"), (0, "a b c\n".to_string()));
    assert_eq!(f.run(r#"echo "x\"y""#), (0, "x\"y\n".to_string()));
    assert_eq!(f.run("echo '''one two'''"), (0, "one two\n".to_string()));
}

#[test]
#[serial]
fn test_multiline_continuation_in_batch() {
    let mut f = Fixture::new();
    assert_eq!(f.run("echo a &&\necho b"), (0, "a\nb\n".to_string()));
    assert_eq!(f.run("echo a |\ncat"), (0, "a\n".to_string()));
}

#[test]
#[serial]
fn test_help_via_pipeline() {
    let mut f = Fixture::new();
    let (status, out) = f.run("help | cat");
    assert_eq!(status, 0);
    assert!(out.contains("cd [dir]"));
    assert!(out.contains("prompt <text...>"));
}

#[test]
#[serial]
fn test_llm_stubs() {
    let mut f = Fixture::new();
    assert_eq!(
        f.run("models"),
        (0, "openai:gpt-stub\nanthropic:claude-stub\n".to_string())
    );
    assert_eq!(f.run("prompt say hi"), (0, "[stub llm] say hi\n".to_string()));
    assert_eq!(
        f.run("ask anthropic hello"),
        (0, "[stub anthropic] hello\n".to_string())
    );
    assert_eq!(
        f.run("use openai model=gpt-4"),
        (0, "default backend set to: openai (stub, model gpt-4)\n".to_string())
    );
}

#[test]
#[serial]
fn test_stderr_is_not_captured_as_stdout() {
    let mut f = Fixture::new();
    // The syntax error goes to stderr; captured stdout stays empty.
    let (status, out) = f.run("| cat");
    assert_eq!(status, 2);
    assert_eq!(out, "");
}

#[test]
#[serial]
fn test_exit_status_of_signal_death() {
    let mut f = Fixture::new();
    let (status, _) = f.run("sh -c 'kill -9 $$'");
    assert_eq!(status, 128 + 9);
}
