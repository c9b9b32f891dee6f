//! cd - Change directory builtin
//!
//! Supports:
//! - cd [dir] - change to directory (no argument means the sandbox root)
//! - cd - - change to the previous directory and print it
//! - cd ~ and cd ~/x - root-relative shorthands
//!
//! Every target is resolved to its weakly-canonical form and must lie within
//! the sandbox root; the process working directory and the shell's
//! `cwd`/`oldpwd` move together, and not at all on failure.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use super::BuiltinContext;

/// Handle the cd builtin command.
pub fn handle_cd(ctx: &mut BuiltinContext, args: &[String]) -> i32 {
    if args.len() > 1 {
        ctx.err("cd: too many arguments\n");
        return 1;
    }

    let mut print_path = false;
    let dest: PathBuf = match args.first().map(|s| s.as_str()) {
        None | Some("~") => ctx.root.to_path_buf(),
        Some("-") => match ctx.oldpwd {
            Some(prev) => {
                print_path = true;
                prev.clone()
            }
            None => {
                ctx.err("cd: OLDPWD not set\n");
                return 1;
            }
        },
        Some(target) if target.starts_with("~/") => ctx.root.join(&target[2..]),
        Some(target) if target.starts_with('~') => {
            ctx.err("cd: ~user is not supported\n");
            return 1;
        }
        Some(target) => {
            let path = Path::new(target);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                ctx.cwd.join(path)
            }
        }
    };

    let canon = weakly_canonical(&dest);
    if !canon.starts_with(ctx.root) {
        ctx.err("cd: blocked (outside root)\n");
        return 1;
    }

    if let Err(e) = std::env::set_current_dir(&canon) {
        ctx.err(&format!("cd: {}: {}\n", canon.display(), e));
        return 1;
    }

    *ctx.oldpwd = Some(ctx.cwd.clone());
    *ctx.cwd = canon.clone();

    if print_path {
        return ctx.out(&format!("{}\n", canon.display()));
    }
    0
}

/// Resolve `.` and `..` lexically. The input must be absolute.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
            Component::Prefix(_) => {}
        }
    }
    out
}

/// Canonicalize the longest existing prefix of `path` and append the rest,
/// so containment checks also hold for paths that do not exist yet.
pub fn weakly_canonical(path: &Path) -> PathBuf {
    let norm = lexical_normalize(path);
    let mut cur = norm.as_path();
    let mut tail: Vec<OsString> = Vec::new();
    loop {
        match cur.canonicalize() {
            Ok(mut out) => {
                for name in tail.iter().rev() {
                    out.push(name);
                }
                return out;
            }
            Err(_) => match (cur.parent(), cur.file_name()) {
                (Some(parent), Some(name)) => {
                    tail.push(name.to_os_string());
                    cur = parent;
                }
                _ => return norm,
            },
        }
    }
}
