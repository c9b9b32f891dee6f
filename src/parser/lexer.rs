//! Lexer for the clanker command language
//!
//! The lexer turns a line-oriented byte string into a token stream. It
//! handles:
//! - Operators and separators
//! - Words with multi-mode quoting (single, double, triple, backtick)
//! - Brace groups and `$(...)` runs, which suppress token boundaries
//! - Comments
//! - Escape sequences and line continuations
//!
//! Completeness matters as much as correctness here: any quoting construct
//! still open at end of input yields [`LexResult::Incomplete`], never an
//! error, which is what lets the REPL keep reading continuation lines.

use std::collections::HashMap;

use crate::ast::types::SourceLoc;

/// Token types for the shell lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // End of input
    End,

    // Separators
    Newline,
    Semicolon,
    Ampersand, // &

    // Operators
    Pipe,  // |
    AndIf, // &&
    OrIf,  // ||

    // Redirections
    RedirectIn,     // <
    RedirectOut,    // >
    RedirectAppend, // >>

    // Digits immediately followed by a redirection operator
    IoNumber,

    // Everything else
    Word,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::End => "EOF",
            Self::Newline => "NEWLINE",
            Self::Semicolon => ";",
            Self::Ampersand => "&",
            Self::Pipe => "|",
            Self::AndIf => "&&",
            Self::OrIf => "||",
            Self::RedirectIn => "<",
            Self::RedirectOut => ">",
            Self::RedirectAppend => ">>",
            Self::IoNumber => "IO_NUMBER",
            Self::Word => "WORD",
        }
    }
}

/// A token produced by the lexer. Operator tokens carry no text; `Word`
/// carries the post-quote-processed text and `IoNumber` the digit string.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub loc: SourceLoc,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, loc: SourceLoc) -> Self {
        Self { kind, text: text.into(), loc }
    }

    fn op(kind: TokenKind, loc: SourceLoc) -> Self {
        Self { kind, text: String::new(), loc }
    }
}

/// Outcome of lexing a buffer. `Complete` token streams always end with an
/// `End` token.
#[derive(Debug, Clone, PartialEq)]
pub enum LexResult {
    Complete(Vec<Token>),
    Incomplete(SourceLoc),
    Error { message: String, loc: SourceLoc },
}

/// Interrupts raised while reading a word; mapped onto [`LexResult`] by the
/// main loop.
enum LexInterrupt {
    Incomplete(SourceLoc),
    Error { message: String, loc: SourceLoc },
}

lazy_static::lazy_static! {
    /// Single-character operators with no lookahead ambiguity
    static ref SINGLE_CHAR_OPS: HashMap<char, TokenKind> = {
        let mut m = HashMap::new();
        m.insert(';', TokenKind::Semicolon);
        m.insert('<', TokenKind::RedirectIn);
        m
    };
}

/// Check if a character separates tokens without being one
fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r')
}

/// Check if a character ends a word in unquoted context
fn is_word_boundary(c: char) -> bool {
    is_blank(c) || matches!(c, '\n' | '#' | '|' | '&' | ';' | '<' | '>')
}

/// Lexer state: a cursor over the input plus position bookkeeping.
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    index: usize, // byte offset
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            index: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(mut self) -> LexResult {
        let mut tokens = Vec::new();

        loop {
            self.skip_blanks();

            let c0 = match self.current() {
                Some(c) => c,
                None => break,
            };
            let loc = self.loc();

            // Comment: runs to (but not including) the next newline.
            if c0 == '#' {
                while let Some(c) = self.current() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }

            if c0 == '\n' {
                self.advance();
                tokens.push(Token::op(TokenKind::Newline, loc));
                continue;
            }

            if c0 == '|' {
                self.advance();
                if self.current() == Some('|') {
                    self.advance();
                    tokens.push(Token::op(TokenKind::OrIf, loc));
                } else {
                    tokens.push(Token::op(TokenKind::Pipe, loc));
                }
                continue;
            }

            if c0 == '&' {
                self.advance();
                if self.current() == Some('&') {
                    self.advance();
                    tokens.push(Token::op(TokenKind::AndIf, loc));
                } else {
                    tokens.push(Token::op(TokenKind::Ampersand, loc));
                }
                continue;
            }

            if c0 == '>' {
                self.advance();
                if self.current() == Some('>') {
                    self.advance();
                    tokens.push(Token::op(TokenKind::RedirectAppend, loc));
                } else {
                    tokens.push(Token::op(TokenKind::RedirectOut, loc));
                }
                continue;
            }

            if let Some(&kind) = SINGLE_CHAR_OPS.get(&c0) {
                self.advance();
                tokens.push(Token::op(kind, loc));
                continue;
            }

            // A maximal digit run immediately followed by a redirection
            // operator is an io-number; any other digit run is word text.
            if c0.is_ascii_digit() {
                if let Some(digits) = self.scan_io_number() {
                    tokens.push(Token::new(TokenKind::IoNumber, digits, loc));
                    continue;
                }
            }

            match self.lex_word() {
                Ok(Some(token)) => tokens.push(token),
                Ok(None) => {} // empty words are not emitted
                Err(LexInterrupt::Incomplete(loc)) => return LexResult::Incomplete(loc),
                Err(LexInterrupt::Error { message, loc }) => {
                    return LexResult::Error { message, loc }
                }
            }
        }

        tokens.push(Token::op(TokenKind::End, self.loc()));
        LexResult::Complete(tokens)
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc { index: self.index, line: self.line, column: self.column }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current()?;
        self.pos += 1;
        self.index += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_blanks(&mut self) {
        while let Some(c) = self.current() {
            if !is_blank(c) {
                break;
            }
            self.advance();
        }
    }

    /// Lookahead for digits directly followed by `<` or `>`; consumes and
    /// returns the digit string on a hit, leaves the cursor alone otherwise.
    fn scan_io_number(&mut self) -> Option<String> {
        let mut end = self.pos;
        while end < self.input.len() && self.input[end].is_ascii_digit() {
            end += 1;
        }
        match self.input.get(end) {
            Some('<') | Some('>') => {
                let digits: String = self.input[self.pos..end].iter().collect();
                for _ in self.pos..end {
                    self.advance();
                }
                Some(digits)
            }
            _ => None,
        }
    }

    /// Accumulate one word through all quoting transitions. Returns `None`
    /// for words that end up empty (e.g. `''`).
    fn lex_word(&mut self) -> Result<Option<Token>, LexInterrupt> {
        let start = self.loc();
        let mut w = String::new();

        let mut in_single = false;
        let mut in_double = false;
        let mut in_backtick = false;
        let mut triple: Option<char> = None;
        let mut brace_depth: usize = 0;
        let mut paren_depth: usize = 0;
        // Where the currently open construct began, for Incomplete reports.
        let mut open_loc = start;

        while let Some(c) = self.current() {
            // Triple quote: everything literal until the matching delimiter.
            if let Some(q) = triple {
                if c == q && self.peek(1) == Some(q) && self.peek(2) == Some(q) {
                    self.advance();
                    self.advance();
                    self.advance();
                    triple = None;
                } else {
                    w.push(c);
                    self.advance();
                }
                continue;
            }

            if in_single {
                if c == '\'' {
                    in_single = false;
                } else {
                    w.push(c);
                }
                self.advance();
                continue;
            }

            if in_double {
                if c == '"' {
                    in_double = false;
                    self.advance();
                    continue;
                }
                if c == '\\' {
                    let esc_loc = self.loc();
                    self.advance();
                    let n = match self.current() {
                        Some(n) => n,
                        None => return Err(LexInterrupt::Incomplete(esc_loc)),
                    };
                    match n {
                        '\n' => {} // continuation, elided
                        '"' => w.push('"'),
                        '\\' => w.push('\\'),
                        'n' => w.push('\n'),
                        _ => {
                            return Err(LexInterrupt::Error {
                                message: "unsupported escape in double quotes".into(),
                                loc: esc_loc,
                            })
                        }
                    }
                    self.advance();
                    continue;
                }
                w.push(c);
                self.advance();
                continue;
            }

            if in_backtick {
                if c == '`' {
                    in_backtick = false;
                    self.advance();
                    continue;
                }
                if c == '\\' {
                    let esc_loc = self.loc();
                    self.advance();
                    match self.current() {
                        Some(n) => {
                            w.push(n);
                            self.advance();
                        }
                        None => return Err(LexInterrupt::Incomplete(esc_loc)),
                    }
                    continue;
                }
                w.push(c);
                self.advance();
                continue;
            }

            // Inside `$(...)`: boundaries suppressed, parentheses nest.
            if paren_depth > 0 {
                match c {
                    '(' => paren_depth += 1,
                    ')' => paren_depth -= 1,
                    _ => {}
                }
                w.push(c);
                self.advance();
                continue;
            }

            // Inside a brace group: boundaries suppressed, braces nest.
            if brace_depth > 0 {
                match c {
                    '{' => brace_depth += 1,
                    '}' => brace_depth -= 1,
                    _ => {}
                }
                w.push(c);
                self.advance();
                continue;
            }

            // Bare context.
            if is_word_boundary(c) {
                break;
            }

            if c == '\'' {
                open_loc = self.loc();
                if self.peek(1) == Some('\'') && self.peek(2) == Some('\'') {
                    self.advance();
                    self.advance();
                    self.advance();
                    triple = Some('\'');
                } else {
                    self.advance();
                    in_single = true;
                }
                continue;
            }

            if c == '"' {
                open_loc = self.loc();
                if self.peek(1) == Some('"') && self.peek(2) == Some('"') {
                    self.advance();
                    self.advance();
                    self.advance();
                    triple = Some('"');
                } else {
                    self.advance();
                    in_double = true;
                }
                continue;
            }

            if c == '`' {
                open_loc = self.loc();
                self.advance();
                in_backtick = true;
                continue;
            }

            if c == '{' {
                open_loc = self.loc();
                brace_depth = 1;
                w.push(c);
                self.advance();
                continue;
            }

            if c == '$' && self.peek(1) == Some('(') {
                open_loc = self.loc();
                paren_depth = 1;
                w.push('$');
                w.push('(');
                self.advance();
                self.advance();
                continue;
            }

            if c == '\\' {
                let esc_loc = self.loc();
                self.advance();
                match self.current() {
                    Some('\n') => {
                        self.advance(); // continuation, elided
                    }
                    Some(n) => {
                        w.push(n);
                        self.advance();
                    }
                    None => return Err(LexInterrupt::Incomplete(esc_loc)),
                }
                continue;
            }

            w.push(c);
            self.advance();
        }

        if in_single || in_double || in_backtick || triple.is_some() || brace_depth > 0 || paren_depth > 0 {
            return Err(LexInterrupt::Incomplete(open_loc));
        }

        if w.is_empty() {
            return Ok(None);
        }

        Ok(Some(Token::new(TokenKind::Word, w, start)))
    }
}

/// Lex an input buffer into tokens.
pub fn lex(input: &str) -> LexResult {
    Lexer::new(input).tokenize()
}
