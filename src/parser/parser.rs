//! Recursive Descent Parser
//!
//! Consumes tokens from the lexer and produces an AST.
//!
//! Grammar:
//!   list     ::= andor (term andor)* term?
//!   andor    ::= pipeline (('&&' | '||') pipeline)*
//!   pipeline ::= simple ('|' simple)*
//!   simple   ::= (IO_NUMBER? redir_op WORD | WORD)+
//!   redir_op ::= '<' | '>' | '>>'
//!   term     ::= ';' | NEWLINE | '&'
//!
//! Newlines are permitted after `|`, `&&`, and `||` so multi-line input
//! accumulated by the REPL parses the same as a single line. A control
//! operator pending at end of input makes the parse Incomplete rather than
//! an error; that is what drives the continuation prompt.

use std::fmt;

use crate::ast::types::{
    AndOr, AndOrOp, CommandList, Pipeline, RedirKind, Redirection, SimpleCommand, SourceLoc,
    Terminator,
};
use crate::parser::lexer::{lex, LexResult, Token, TokenKind};

/// A completed parse: either the legacy bare pipeline (exactly one and-or
/// chain holding a single pipeline with no terminator) or a full list.
#[derive(Debug, Clone, PartialEq)]
pub enum Program {
    Pipeline(Pipeline),
    List(CommandList),
}

impl Program {
    pub fn render(&self) -> String {
        match self {
            Self::Pipeline(p) => p.render(),
            Self::List(l) => l.render(),
        }
    }
}

/// Outcome of parsing a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    Complete(Program),
    Incomplete,
    Error(String),
}

/// Error raised when the token stream is structurally invalid.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub loc: SourceLoc,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.loc)
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    fn new(message: impl Into<String>, loc: SourceLoc) -> Self {
        Self { message: message.into(), loc }
    }
}

/// Parse interruptions: either the input is still open-ended or it is wrong.
enum Interrupt {
    Incomplete,
    Error(ParseError),
}

impl From<ParseError> for Interrupt {
    fn from(e: ParseError) -> Self {
        Self::Error(e)
    }
}

/// Main parser struct
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Build a parser over a token stream. The lexer always terminates a
    /// `Complete` stream with `End`; one is appended if missing.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::End) {
            let loc = tokens.last().map(|t| t.loc).unwrap_or_default();
            tokens.push(Token::new(TokenKind::End, "", loc));
        }
        Self { tokens, pos: 0 }
    }

    // ===========================================================================
    // HELPER METHODS
    // ===========================================================================

    fn current(&self) -> &Token {
        // The End token is never consumed, so `pos` stays in range.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.kind() != TokenKind::End {
            self.pos += 1;
        }
        token
    }

    fn skip_newlines(&mut self) {
        while self.kind() == TokenKind::Newline {
            self.advance();
        }
    }

    fn unexpected(&self, wanted: &str) -> ParseError {
        let token = self.current();
        let got = match token.kind {
            TokenKind::Word => format!("`{}`", token.text),
            TokenKind::End => "end of input".to_string(),
            other => format!("`{}`", other.as_str()),
        };
        ParseError::new(format!("expected {}, got {}", wanted, got), token.loc)
    }

    // ===========================================================================
    // GRAMMAR
    // ===========================================================================

    /// Parse the whole token stream into a program.
    pub fn parse_program(mut self) -> ParseResult {
        let list = match self.parse_list() {
            Ok(list) => list,
            Err(Interrupt::Incomplete) => return ParseResult::Incomplete,
            Err(Interrupt::Error(e)) => return ParseResult::Error(e.to_string()),
        };

        // Backwards-compatibility shortcut: a lone pipeline stays a pipeline.
        if list.trailing.is_none() && list.items.len() == 1 {
            let (andor, term) = &list.items[0];
            if *term == Terminator::None && andor.rest.is_empty() {
                return ParseResult::Complete(Program::Pipeline(andor.first.clone()));
            }
        }
        ParseResult::Complete(Program::List(list))
    }

    fn parse_list(&mut self) -> Result<CommandList, Interrupt> {
        let mut list = CommandList::default();

        loop {
            match self.kind() {
                TokenKind::End => break,
                TokenKind::Semicolon => {
                    self.advance();
                    list.trailing = Some(Terminator::Semicolon);
                }
                TokenKind::Newline => {
                    self.advance();
                    list.trailing = Some(Terminator::Newline);
                }
                TokenKind::Ampersand => {
                    self.advance();
                    list.trailing = Some(Terminator::Ampersand);
                }
                _ => {
                    let andor = self.parse_andor()?;
                    let term = match self.kind() {
                        TokenKind::Semicolon => {
                            self.advance();
                            Terminator::Semicolon
                        }
                        TokenKind::Newline => {
                            self.advance();
                            Terminator::Newline
                        }
                        TokenKind::Ampersand => {
                            self.advance();
                            Terminator::Ampersand
                        }
                        _ => Terminator::None,
                    };
                    list.items.push((andor, term));
                    // Anything recorded as trailing was really a separator.
                    list.trailing = None;
                }
            }
        }

        Ok(list)
    }

    fn parse_andor(&mut self) -> Result<AndOr, Interrupt> {
        let first = self.parse_pipeline()?;
        let mut rest = Vec::new();

        loop {
            let op = match self.kind() {
                TokenKind::AndIf => AndOrOp::AndIf,
                TokenKind::OrIf => AndOrOp::OrIf,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            if self.kind() == TokenKind::End {
                // Pending operator: the caller keeps reading.
                return Err(Interrupt::Incomplete);
            }
            let rhs = self.parse_pipeline()?;
            rest.push((op, rhs));
        }

        Ok(AndOr { first, rest })
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, Interrupt> {
        let mut stages = vec![self.parse_simple()?];

        while self.kind() == TokenKind::Pipe {
            self.advance();
            self.skip_newlines();
            if self.kind() == TokenKind::End {
                return Err(Interrupt::Incomplete);
            }
            stages.push(self.parse_simple()?);
        }

        Ok(Pipeline { stages })
    }

    fn parse_simple(&mut self) -> Result<SimpleCommand, Interrupt> {
        let mut cmd = SimpleCommand::default();

        loop {
            match self.kind() {
                TokenKind::Word => {
                    cmd.argv.push(self.advance().text);
                }
                TokenKind::IoNumber => {
                    let io = self.advance();
                    let fd: i32 = io
                        .text
                        .parse()
                        .map_err(|_| ParseError::new("file descriptor out of range", io.loc))?;
                    let kind = match self.kind() {
                        TokenKind::RedirectIn => RedirKind::In,
                        TokenKind::RedirectOut => RedirKind::OutTrunc,
                        TokenKind::RedirectAppend => RedirKind::OutAppend,
                        _ => {
                            return Err(self
                                .unexpected("redirection operator after file descriptor")
                                .into())
                        }
                    };
                    self.advance();
                    cmd.redirs.push(self.finish_redirection(fd, kind)?);
                }
                TokenKind::RedirectIn => {
                    self.advance();
                    cmd.redirs.push(self.finish_redirection(0, RedirKind::In)?);
                }
                TokenKind::RedirectOut => {
                    self.advance();
                    cmd.redirs.push(self.finish_redirection(1, RedirKind::OutTrunc)?);
                }
                TokenKind::RedirectAppend => {
                    self.advance();
                    cmd.redirs.push(self.finish_redirection(1, RedirKind::OutAppend)?);
                }
                _ => break,
            }
        }

        if cmd.is_empty() {
            return Err(self.unexpected("command").into());
        }
        Ok(cmd)
    }

    fn finish_redirection(&mut self, fd: i32, kind: RedirKind) -> Result<Redirection, Interrupt> {
        if self.kind() != TokenKind::Word {
            return Err(self.unexpected("redirection target").into());
        }
        let target = self.advance().text;
        Ok(Redirection { fd, kind, target })
    }
}

/// Lex and parse an input buffer.
pub fn parse(input: &str) -> ParseResult {
    match lex(input) {
        LexResult::Complete(tokens) => Parser::new(tokens).parse_program(),
        LexResult::Incomplete(_) => ParseResult::Incomplete,
        LexResult::Error { message, loc } => ParseResult::Error(format!("{} at {}", message, loc)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(input: &str) -> Program {
        match parse(input) {
            ParseResult::Complete(p) => p,
            other => panic!("expected Complete for {:?}, got {:?}", input, other),
        }
    }

    fn pipeline(input: &str) -> Pipeline {
        match complete(input) {
            Program::Pipeline(p) => p,
            other => panic!("expected bare pipeline for {:?}, got {:?}", input, other),
        }
    }

    fn list(input: &str) -> CommandList {
        match complete(input) {
            Program::List(l) => l,
            other => panic!("expected list for {:?}, got {:?}", input, other),
        }
    }

    fn error(input: &str) -> String {
        match parse(input) {
            ParseResult::Error(msg) => msg,
            other => panic!("expected Error for {:?}, got {:?}", input, other),
        }
    }

    #[test]
    fn test_simple_command() {
        let p = pipeline("echo hello world");
        assert_eq!(p.stages.len(), 1);
        assert_eq!(p.stages[0].argv, vec!["echo", "hello", "world"]);
        assert!(p.stages[0].redirs.is_empty());
    }

    #[test]
    fn test_pipeline() {
        let p = pipeline("cat file | grep pattern | wc -l");
        assert_eq!(p.stages.len(), 3);
        assert_eq!(p.stages[1].argv, vec!["grep", "pattern"]);
    }

    #[test]
    fn test_bare_pipeline_shortcut() {
        assert!(matches!(complete("echo hi"), Program::Pipeline(_)));
        assert!(matches!(complete("echo a | cat"), Program::Pipeline(_)));
        // Anything more becomes a list.
        assert!(matches!(complete("echo a;"), Program::List(_)));
        assert!(matches!(complete("echo a && echo b"), Program::List(_)));
        assert!(matches!(complete("echo a & "), Program::List(_)));
    }

    #[test]
    fn test_redirections() {
        let p = pipeline("sort < in.txt > out.txt");
        let cmd = &p.stages[0];
        assert_eq!(cmd.argv, vec!["sort"]);
        assert_eq!(cmd.redirs.len(), 2);
        assert_eq!(cmd.redirs[0], Redirection { fd: 0, kind: RedirKind::In, target: "in.txt".into() });
        assert_eq!(cmd.redirs[1], Redirection { fd: 1, kind: RedirKind::OutTrunc, target: "out.txt".into() });
    }

    #[test]
    fn test_io_number_overrides_fd() {
        let p = pipeline("cmd 2> err.log");
        assert_eq!(
            p.stages[0].redirs[0],
            Redirection { fd: 2, kind: RedirKind::OutTrunc, target: "err.log".into() }
        );

        let p = pipeline("cmd 0< in 1>> out");
        assert_eq!(p.stages[0].redirs[0].fd, 0);
        assert_eq!(p.stages[0].redirs[1].fd, 1);
        assert_eq!(p.stages[0].redirs[1].kind, RedirKind::OutAppend);
    }

    #[test]
    fn test_redirection_only_command() {
        let p = pipeline("> out.txt");
        assert!(p.stages[0].argv.is_empty());
        assert_eq!(p.stages[0].redirs.len(), 1);
    }

    #[test]
    fn test_andor_chain() {
        let l = list("false && echo x || echo y");
        assert_eq!(l.items.len(), 1);
        let (andor, term) = &l.items[0];
        assert_eq!(*term, Terminator::None);
        assert_eq!(andor.first.stages[0].argv, vec!["false"]);
        assert_eq!(andor.rest.len(), 2);
        assert_eq!(andor.rest[0].0, AndOrOp::AndIf);
        assert_eq!(andor.rest[1].0, AndOrOp::OrIf);
    }

    #[test]
    fn test_list_terminators() {
        let l = list("echo a; echo b\necho c & echo d");
        assert_eq!(l.items.len(), 4);
        assert_eq!(l.items[0].1, Terminator::Semicolon);
        assert_eq!(l.items[1].1, Terminator::Newline);
        assert_eq!(l.items[2].1, Terminator::Ampersand);
        assert_eq!(l.items[3].1, Terminator::None);
        assert_eq!(l.trailing, None);
    }

    #[test]
    fn test_trailing_terminator() {
        let l = list("echo a;");
        assert_eq!(l.items.len(), 1);
        assert_eq!(l.items[0].1, Terminator::Semicolon);
        assert_eq!(l.trailing, None);

        let l = list("echo a\n\n");
        assert_eq!(l.items[0].1, Terminator::Newline);
        assert_eq!(l.trailing, Some(Terminator::Newline));
    }

    #[test]
    fn test_leading_separators_do_not_stick() {
        // A separator before the first command is not a trailing terminator.
        assert!(matches!(complete("\necho a"), Program::Pipeline(_)));
        let l = list("\n\necho a; echo b");
        assert_eq!(l.items.len(), 2);
        assert_eq!(l.trailing, None);
    }

    #[test]
    fn test_empty_input() {
        let l = list("");
        assert!(l.is_empty());
        let l = list("\n\n");
        assert!(l.is_empty());
        assert_eq!(l.trailing, Some(Terminator::Newline));
    }

    #[test]
    fn test_incomplete_on_pending_operators() {
        assert_eq!(parse("echo a |"), ParseResult::Incomplete);
        assert_eq!(parse("echo a &&"), ParseResult::Incomplete);
        assert_eq!(parse("echo a ||"), ParseResult::Incomplete);
        assert_eq!(parse("echo a |\n"), ParseResult::Incomplete);
        assert_eq!(parse("echo 'open"), ParseResult::Incomplete);
        assert_eq!(parse("echo a\\"), ParseResult::Incomplete);
    }

    #[test]
    fn test_continuation_lines_parse_as_one_pipeline() {
        let p = pipeline("echo a |\ncat");
        assert_eq!(p.stages.len(), 2);

        let l = list("true &&\nfalse");
        assert_eq!(l.items[0].0.rest.len(), 1);
    }

    #[test]
    fn test_empty_stage_errors() {
        assert!(error("| cat").contains("expected command"));
        assert!(error("echo a | ; echo b").contains("expected command"));
        assert!(error("echo a | | cat").contains("expected command"));
        assert!(error("&& echo x").contains("expected command"));
        assert!(error("echo a && && echo b").contains("expected command"));
    }

    #[test]
    fn test_redirection_errors() {
        assert!(error("echo >").contains("redirection target"));
        assert!(error("echo > | cat").contains("redirection target"));
        assert!(error("echo > ;").contains("redirection target"));
    }

    #[test]
    fn test_quoted_operator_is_a_word() {
        let p = pipeline("echo '|' a");
        assert_eq!(p.stages.len(), 1);
        assert_eq!(p.stages[0].argv, vec!["echo", "|", "a"]);
    }

    #[test]
    fn test_render_round_trip() {
        // Re-parsing the canonical rendering must reproduce the AST.
        let inputs = [
            "echo hi",
            "echo 'a b' | cat",
            "cat < in.txt > out.txt",
            "cmd 2>> err.log",
            "false && echo x || echo y",
            "echo a; echo b & echo c",
            "> out.txt",
        ];
        for input in inputs {
            let first = complete(input);
            let rendered = first.render();
            let second = complete(&rendered);
            assert_eq!(first, second, "round trip failed for {:?} -> {:?}", input, rendered);
        }
    }

    #[test]
    fn test_comment_only_input() {
        let l = list("# nothing here");
        assert!(l.is_empty());
    }
}
