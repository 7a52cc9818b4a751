//! Tokenizer for the script language.
//!
//! Produces an indentation-aware token stream: `Indent`/`Dedent` mark block
//! structure and `Newline` ends a logical line. Newlines inside brackets and
//! after a trailing backslash do not end the line. Tabs count as four columns
//! when measuring indentation.

use std::fmt;

use crate::error::AdmissionKind;

/// Reserved words the grammar understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `def`
    Def,
    /// `if`
    If,
    /// `elif`
    Elif,
    /// `else`
    Else,
    /// `while`
    While,
    /// `for`
    For,
    /// `in`
    In,
    /// `not`
    Not,
    /// `and`
    And,
    /// `or`
    Or,
    /// `is`
    Is,
    /// `return`
    Return,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `pass`
    Pass,
    /// `True`
    True,
    /// `False`
    False,
    /// `None`
    None,
}

impl Keyword {
    const ALL: [Keyword; 18] = [
        Keyword::Def,
        Keyword::If,
        Keyword::Elif,
        Keyword::Else,
        Keyword::While,
        Keyword::For,
        Keyword::In,
        Keyword::Not,
        Keyword::And,
        Keyword::Or,
        Keyword::Is,
        Keyword::Return,
        Keyword::Break,
        Keyword::Continue,
        Keyword::Pass,
        Keyword::True,
        Keyword::False,
        Keyword::None,
    ];

    /// Source spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Keyword::Def => "def",
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::In => "in",
            Keyword::Not => "not",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Is => "is",
            Keyword::Return => "return",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Pass => "pass",
            Keyword::True => "True",
            Keyword::False => "False",
            Keyword::None => "None",
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == word)
    }
}

/// Operators and delimiters, longest first so that greedy matching works.
const PUNCTUATION: [&str; 37] = [
    "**=", "//=", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "|=", "&=", "^=", "**", "//",
    "->", "+", "-", "*", "/", "%", "|", "&", "^", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",",
    ":", ".",
];

/// Token payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier.
    Name(String),
    /// Reserved word.
    Keyword(Keyword),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal, escapes resolved.
    Str(String),
    /// Operator or delimiter.
    Punct(&'static str),
    /// `;`
    Semicolon,
    /// End of a logical line.
    Newline,
    /// Block opens.
    Indent,
    /// Block closes.
    Dedent,
    /// End of input.
    EndOfFile,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Name(name) => write!(f, "name '{name}'"),
            TokenKind::Keyword(k) => write!(f, "'{}'", k.as_str()),
            TokenKind::Int(v) => write!(f, "number {v}"),
            TokenKind::Float(v) => write!(f, "number {v}"),
            TokenKind::Str(_) => f.write_str("string"),
            TokenKind::Punct(p) => write!(f, "'{p}'"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::Newline => f.write_str("end of line"),
            TokenKind::Indent => f.write_str("indent"),
            TokenKind::Dedent => f.write_str("dedent"),
            TokenKind::EndOfFile => f.write_str("end of input"),
        }
    }
}

/// A token and where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Payload.
    pub kind: TokenKind,
    /// 1-based physical line.
    pub line: usize,
    /// 0-based column, in characters.
    pub column: usize,
}

impl Token {
    /// Whether this is the punctuation `p`.
    #[must_use]
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(q) if q == p)
    }

    /// Whether this is the keyword `k`.
    #[must_use]
    pub fn is_keyword(&self, k: Keyword) -> bool {
        self.kind == TokenKind::Keyword(k)
    }

    /// The identifier text, if this is a name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Name(name) => Some(name),
            _ => None,
        }
    }
}

/// Where and why tokenizing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// Category.
    pub kind: AdmissionKind,
    /// 1-based line.
    pub line: usize,
    /// 0-based column.
    pub column: usize,
    /// Human-readable reason.
    pub reason: String,
}

/// Tokens produced before the first error, and the error if any.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    /// Tokens in source order.
    pub tokens: Vec<Token>,
    /// The first error, which ends the token stream.
    pub error: Option<LexError>,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<Token>,
}

/// Tokenize `source`.
#[must_use]
pub fn tokenize(source: &str) -> Lexed {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 0,
        depth: 0,
        indents: vec![0],
        at_line_start: true,
        tokens: Vec::new(),
    };
    let error = lexer.run().err();
    Lexed {
        tokens: lexer.tokens,
        error,
    }
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: usize, column: usize) {
        self.tokens.push(Token { kind, line, column });
    }

    fn error(&self, kind: AdmissionKind, line: usize, column: usize, reason: impl Into<String>) -> LexError {
        LexError {
            kind,
            line,
            column,
            reason: reason.into(),
        }
    }

    fn ends_line(&self) -> bool {
        self.tokens
            .last()
            .is_some_and(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent))
    }

    fn run(&mut self) -> Result<(), LexError> {
        loop {
            if self.at_line_start && self.depth == 0 {
                self.indentation()?;
            }
            let Some(c) = self.peek() else { break };
            let (line, column) = (self.line, self.column);
            match c {
                '\n' => {
                    self.bump();
                    if self.depth == 0 {
                        if self.ends_line() {
                            self.push(TokenKind::Newline, line, column);
                        }
                        self.at_line_start = true;
                    }
                }
                ' ' | '\t' | '\r' | '\u{c}' => {
                    self.bump();
                }
                '#' => self.skip_comment(),
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                ';' => {
                    self.bump();
                    self.push(TokenKind::Semicolon, line, column);
                }
                '\'' | '"' => self.string(c)?,
                c if c.is_ascii_digit() => self.number()?,
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.word(),
                _ => self.punct()?,
            }
        }

        let (line, column) = (self.line, self.column);
        if self.ends_line() {
            self.push(TokenKind::Newline, line, column);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, line, column);
        }
        self.push(TokenKind::EndOfFile, line, column);
        Ok(())
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
    }

    /// Measure leading whitespace and emit block tokens. Blank and
    /// comment-only lines are skipped entirely.
    fn indentation(&mut self) -> Result<(), LexError> {
        loop {
            let mut width = 0;
            while let Some(c) = self.peek() {
                match c {
                    ' ' => width += 1,
                    '\t' => width += 4,
                    '\r' | '\u{c}' => {}
                    _ => break,
                }
                self.bump();
            }
            match self.peek() {
                None => return Ok(()),
                Some('\n') => {
                    self.bump();
                }
                Some('#') => {
                    self.skip_comment();
                    if self.bump().is_none() {
                        return Ok(());
                    }
                }
                Some(_) => {
                    self.at_line_start = false;
                    return self.apply_indent(width);
                }
            }
        }
    }

    fn apply_indent(&mut self, width: usize) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, line, column);
            return Ok(());
        }
        while self.indents.last().is_some_and(|&top| top > width) {
            self.indents.pop();
            self.push(TokenKind::Dedent, line, column);
        }
        if self.indents.last().copied().unwrap_or(0) != width {
            return Err(self.error(
                AdmissionKind::Syntax,
                line,
                column,
                "unindent does not match any outer indentation level",
            ));
        }
        Ok(())
    }

    fn word(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut word = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            word.push(c);
            self.bump();
        }
        let kind = match Keyword::from_word(&word) {
            Some(k) => TokenKind::Keyword(k),
            None => TokenKind::Name(word),
        };
        self.push(kind, line, column);
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit() || *c == '_') {
            if c != '_' {
                text.push(c);
            }
            self.bump();
        }
    }

    fn number(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        let mut is_float = false;
        self.digits(&mut text);
        if self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.bump();
            self.digits(&mut text);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = self.peek_at(1);
            let digit_at = if matches!(sign, Some('+' | '-')) { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|d| d.is_ascii_digit()) {
                is_float = true;
                text.push('e');
                self.bump();
                if let Some(s @ ('+' | '-')) = self.peek() {
                    text.push(s);
                    self.bump();
                }
                self.digits(&mut text);
            }
        }
        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(self.error(AdmissionKind::Syntax, line, column, "invalid decimal literal"));
        }
        let kind = if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error(AdmissionKind::Syntax, line, column, "invalid float literal"))?
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error(AdmissionKind::Syntax, line, column, "integer literal too large"))?
        };
        self.push(kind, line, column);
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
            let triple: String = [quote; 3].iter().collect();
            return Err(self.error(
                AdmissionKind::Forbidden,
                line,
                column,
                format!("{triple} is not allowed"),
            ));
        }
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error(
                        AdmissionKind::Syntax,
                        line,
                        column,
                        "unterminated string literal",
                    ));
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('0') => text.push('\0'),
                    Some('\n') => {}
                    Some(c @ ('\\' | '\'' | '"')) => text.push(c),
                    Some(c) => {
                        text.push('\\');
                        text.push(c);
                    }
                    None => {
                        return Err(self.error(
                            AdmissionKind::Syntax,
                            line,
                            column,
                            "unterminated string literal",
                        ));
                    }
                },
                Some(c) => text.push(c),
            }
        }
        self.push(TokenKind::Str(text), line, column);
        Ok(())
    }

    fn punct(&mut self) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let found = PUNCTUATION.into_iter().find(|p| {
            p.chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c))
        });
        let Some(p) = found else {
            let c = self.peek().unwrap_or(' ');
            return Err(self.error(
                AdmissionKind::Syntax,
                line,
                column,
                format!("invalid character '{c}'"),
            ));
        };
        for _ in 0..p.chars().count() {
            self.bump();
        }
        match p {
            "(" | "[" | "{" => self.depth += 1,
            ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        self.push(TokenKind::Punct(p), line, column);
        Ok(())
    }
}
