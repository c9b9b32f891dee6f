//! Stub LLM builtins: models, use, prompt, ask.
//!
//! These hold the command surface for model backends without any network
//! client behind them yet. Nothing is persisted.

use super::BuiltinContext;

pub fn handle_models(ctx: &mut BuiltinContext, _args: &[String]) -> i32 {
    ctx.out("openai:gpt-stub\nanthropic:claude-stub\n")
}

pub fn handle_use(ctx: &mut BuiltinContext, args: &[String]) -> i32 {
    let backend = match args.first() {
        Some(backend) => backend,
        None => {
            ctx.err("use: expected <backend>\n");
            return 2;
        }
    };
    let model = args.get(1).and_then(|arg| arg.strip_prefix("model="));
    if args.len() > 1 && model.is_none() {
        ctx.err("use: expected model=<id>\n");
        return 2;
    }
    match model {
        Some(id) => ctx.out(&format!(
            "default backend set to: {} (stub, model {})\n",
            backend, id
        )),
        None => ctx.out(&format!("default backend set to: {} (stub)\n", backend)),
    }
}

pub fn handle_prompt(ctx: &mut BuiltinContext, args: &[String]) -> i32 {
    if args.is_empty() {
        ctx.err("prompt: expected text\n");
        return 2;
    }
    ctx.out(&format!("[stub llm] {}\n", args.join(" ")))
}

pub fn handle_ask(ctx: &mut BuiltinContext, args: &[String]) -> i32 {
    if args.len() < 2 {
        ctx.err("ask: expected <backend> <text...>\n");
        return 2;
    }
    ctx.out(&format!("[stub {}] {}\n", args[0], args[1..].join(" ")))
}

#[cfg(test)]
mod tests {
    use crate::builtins::test_support::run_captured;
    use crate::builtins::BuiltinRegistry;
    use std::path::PathBuf;

    fn run(name: &str, args: &[&str]) -> (i32, String, String) {
        let registry = BuiltinRegistry::with_defaults();
        let root = PathBuf::from("/");
        let mut cwd = PathBuf::from("/");
        let mut oldpwd = None;
        run_captured(&registry, &root, &mut cwd, &mut oldpwd, name, args)
    }

    #[test]
    fn test_models() {
        let (status, out, _) = run("models", &[]);
        assert_eq!(status, 0);
        assert_eq!(out, "openai:gpt-stub\nanthropic:claude-stub\n");
    }

    #[test]
    fn test_use() {
        let (status, out, _) = run("use", &["openai"]);
        assert_eq!(status, 0);
        assert_eq!(out, "default backend set to: openai (stub)\n");

        let (status, out, _) = run("use", &["openai", "model=gpt-4"]);
        assert_eq!(status, 0);
        assert_eq!(out, "default backend set to: openai (stub, model gpt-4)\n");

        let (status, _, err) = run("use", &[]);
        assert_eq!(status, 2);
        assert!(err.contains("expected <backend>"));

        let (status, _, err) = run("use", &["openai", "gpt-4"]);
        assert_eq!(status, 2);
        assert!(err.contains("expected model=<id>"));
    }

    #[test]
    fn test_prompt() {
        let (status, out, _) = run("prompt", &["hello", "there"]);
        assert_eq!(status, 0);
        assert_eq!(out, "[stub llm] hello there\n");

        let (status, _, err) = run("prompt", &[]);
        assert_eq!(status, 2);
        assert!(err.contains("expected text"));
    }

    #[test]
    fn test_ask() {
        let (status, out, _) = run("ask", &["anthropic", "what", "is", "up"]);
        assert_eq!(status, 0);
        assert_eq!(out, "[stub anthropic] what is up\n");

        let (status, _, err) = run("ask", &["anthropic"]);
        assert_eq!(status, 2);
        assert!(err.contains("expected <backend> <text...>"));
    }
}
