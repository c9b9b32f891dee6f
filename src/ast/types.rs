//! Abstract Syntax Tree Types
//!
//! This module defines the AST produced by the parser and consumed by the
//! executor: command lists of and-or chains of pipelines of simple commands,
//! plus redirections. Nodes are transient per parse.
//!
//! Every node can render itself back to source text; re-parsing the rendered
//! form yields a structurally equal AST.

use std::fmt;

// =============================================================================
// SOURCE LOCATIONS
// =============================================================================

/// Position information for diagnostics. `line` and `column` are 1-based,
/// `index` is a byte offset into the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLoc {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for SourceLoc {
    fn default() -> Self {
        Self { index: 0, line: 1, column: 1 }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

/// Redirection operator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirKind {
    In,        // <
    OutTrunc,  // >
    OutAppend, // >>
}

impl RedirKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "<",
            Self::OutTrunc => ">",
            Self::OutAppend => ">>",
        }
    }

    /// The fd the operator binds when no io-number is given.
    pub fn default_fd(&self) -> i32 {
        match self {
            Self::In => 0,
            Self::OutTrunc | Self::OutAppend => 1,
        }
    }
}

/// A single redirection request: rebind `fd` to `target` with the open mode
/// implied by `kind`. The fd is always resolved by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub fd: i32,
    pub kind: RedirKind,
    pub target: String,
}

impl Redirection {
    pub fn render(&self) -> String {
        if self.fd == self.kind.default_fd() {
            format!("{} {}", self.kind.as_str(), render_word(&self.target))
        } else {
            format!("{}{} {}", self.fd, self.kind.as_str(), render_word(&self.target))
        }
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// One pipeline stage: argv plus redirections. `argv` may be empty when the
/// stage consists only of redirections (legal for a whole single-stage
/// pipeline such as `> out.txt`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimpleCommand {
    pub argv: Vec<String>,
    pub redirs: Vec<Redirection>,
}

impl SimpleCommand {
    /// True when the stage has neither argv nor redirections.
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty() && self.redirs.is_empty()
    }

    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self.argv.iter().map(|w| render_word(w)).collect();
        parts.extend(self.redirs.iter().map(|r| r.render()));
        parts.join(" ")
    }
}

/// A pipeline: one or more stages connected by pipes. Always nonempty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<SimpleCommand>,
}

impl Pipeline {
    pub fn render(&self) -> String {
        self.stages
            .iter()
            .map(|s| s.render())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Operator joining pipelines in an and-or chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndOrOp {
    AndIf, // &&
    OrIf,  // ||
}

impl AndOrOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AndIf => "&&",
            Self::OrIf => "||",
        }
    }
}

/// A left-associative chain of pipelines joined by `&&`/`||`, evaluated in
/// order with short-circuiting. No precedence between the two operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndOr {
    pub first: Pipeline,
    pub rest: Vec<(AndOrOp, Pipeline)>,
}

impl AndOr {
    pub fn render(&self) -> String {
        let mut out = self.first.render();
        for (op, rhs) in &self.rest {
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            out.push_str(&rhs.render());
        }
        out
    }
}

impl fmt::Display for AndOr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// =============================================================================
// COMMAND LISTS
// =============================================================================

/// What terminated an and-or chain in a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Terminator {
    #[default]
    None,
    Semicolon,
    Newline,
    Ampersand,
}

/// A sequence of and-or chains separated or terminated by `;`, newline, or
/// `&`. `trailing` records a terminator seen with nothing pending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandList {
    pub items: Vec<(AndOr, Terminator)>,
    pub trailing: Option<Terminator>,
}

impl CommandList {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (andor, term) in &self.items {
            out.push_str(&andor.render());
            match term {
                Terminator::None => {}
                Terminator::Semicolon => out.push_str("; "),
                Terminator::Newline => out.push('\n'),
                Terminator::Ampersand => out.push_str(" & "),
            }
        }
        out.trim_end().to_string()
    }
}

impl fmt::Display for CommandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// =============================================================================
// WORD RENDERING
// =============================================================================

/// Characters a word may carry unquoted when rendered back to source.
fn is_plain_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '+' | ',' | '@' | '%' | '~' | '^')
}

/// Render a post-quote-processed word so it re-lexes to the same bytes.
/// Words with metacharacters are single-quoted; embedded single quotes use
/// the `'\''` splice.
pub fn render_word(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_plain_word_char) {
        return word.to_string();
    }
    let mut out = String::with_capacity(word.len() + 2);
    out.push('\'');
    for c in word.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}
