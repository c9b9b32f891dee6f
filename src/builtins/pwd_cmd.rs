//! pwd - Print working directory builtin

use super::BuiltinContext;

/// Handle the pwd builtin command. `-r`/`--relative` prints the path
/// relative to the sandbox root, rendered as `/` for the root itself.
pub fn handle_pwd(ctx: &mut BuiltinContext, args: &[String]) -> i32 {
    let mut relative = false;
    for arg in args {
        match arg.as_str() {
            "-r" | "--relative" => relative = true,
            other => {
                ctx.err(&format!("pwd: unexpected argument '{}'\n", other));
                return 2;
            }
        }
    }

    if relative {
        let line = match ctx.cwd.strip_prefix(ctx.root) {
            Ok(rel) if rel.as_os_str().is_empty() => "/".to_string(),
            Ok(rel) => format!("/{}", rel.display()),
            Err(_) => ctx.cwd.display().to_string(),
        };
        ctx.out(&format!("{}\n", line))
    } else {
        ctx.out(&format!("{}\n", ctx.cwd.display()))
    }
}
