//! exit - Exit shell builtin

use super::BuiltinContext;

/// Handle the exit builtin command. Terminates the process with the given
/// code; a missing or unparseable argument falls back to 0.
pub fn handle_exit(_ctx: &mut BuiltinContext, args: &[String]) -> i32 {
    std::process::exit(parse_exit_code(args));
}

fn parse_exit_code(args: &[String]) -> i32 {
    args.first()
        .and_then(|arg| arg.parse::<i32>().ok())
        .unwrap_or(0)
}
