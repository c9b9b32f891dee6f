//! help - List built-ins

use super::BuiltinContext;

/// Print `name  help` lines for every registered builtin, sorted by name.
pub fn handle_help(ctx: &mut BuiltinContext, _args: &[String]) -> i32 {
    let mut out = String::new();
    for (name, help) in ctx.registry.help_items() {
        out.push_str(name);
        out.push_str("  ");
        out.push_str(help);
        out.push('\n');
    }
    ctx.out(&out)
}
