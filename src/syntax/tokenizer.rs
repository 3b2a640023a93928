//! Tokenizer for Forge source text
//!
//! Converts a script such as `let dog = 'Fuffy';` into a sequence of
//! ranged tokens that the parser turns into a [`Program`](super::ast::Program).

use super::SyntaxError;
use crate::diagnostics::{Position, Range};
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Let,
    Var,
    Const,
    Function,
    Async,
    Await,
    Return,
    If,
    Elif,
    Else,
    For,
    Of,
    While,
    Do,
    Try,
    Catch,
    Finally,
    Throw,
    Break,
    Continue,
    True,
    False,
    Null,
    Disable,
    Able,
}

impl Keyword {
    pub const ALL: [(&'static str, Keyword); 25] = [
        ("let", Keyword::Let),
        ("var", Keyword::Var),
        ("const", Keyword::Const),
        ("function", Keyword::Function),
        ("async", Keyword::Async),
        ("await", Keyword::Await),
        ("return", Keyword::Return),
        ("if", Keyword::If),
        ("elif", Keyword::Elif),
        ("else", Keyword::Else),
        ("for", Keyword::For),
        ("of", Keyword::Of),
        ("while", Keyword::While),
        ("do", Keyword::Do),
        ("try", Keyword::Try),
        ("catch", Keyword::Catch),
        ("finally", Keyword::Finally),
        ("throw", Keyword::Throw),
        ("break", Keyword::Break),
        ("continue", Keyword::Continue),
        ("true", Keyword::True),
        ("false", Keyword::False),
        ("null", Keyword::Null),
        ("disable", Keyword::Disable),
        ("able", Keyword::Able),
    ];

    pub fn lookup(word: &str) -> Option<Keyword> {
        Self::ALL
            .iter()
            .find(|(text, _)| *text == word)
            .map(|(_, kw)| *kw)
    }

    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, kw)| *kw == self)
            .map(|(text, _)| *text)
            .unwrap_or("")
    }
}

/// Raw piece of a backtick template
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateChunk {
    Text(String),
    /// Source of an interpolated expression and where it starts
    Expr { source: String, start: Position },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A numeric literal (e.g., 123, 45.67, 1.5e10)
    Number(f64),
    /// A quoted string literal ('text' or "text")
    Str(String),
    /// A backtick template string
    Template(Vec<TemplateChunk>),
    Identifier(String),
    Keyword(Keyword),
    /// Operators: + - * / % = == === != !== < <= > >= ! && || ?? += -= *= /= ++ -- => |
    Operator(String),
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range,
}

/// Tokenizer for Forge scripts
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    offset: usize,
    line: u32,
    column: u32,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::starting_at(source, Position::default())
    }

    /// Tokenizer whose positions continue from `start` (used for template
    /// interpolations, which are tokenized separately)
    pub fn starting_at(source: &'a str, start: Position) -> Self {
        Self {
            chars: source.chars().peekable(),
            offset: start.offset,
            line: start.line,
            column: start.column,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn position(&self) -> Position {
        Position::new(self.offset, self.line, self.column)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    let start = self.position();
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(SyntaxError::new(
                                    "Unterminated block comment",
                                    Range::new(start, self.position()),
                                ))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, SyntaxError> {
        self.skip_trivia()?;
        let start = self.position();

        let c = match self.peek() {
            None => return Ok(None),
            Some(c) => c,
        };

        let kind = match c {
            '"' | '\'' => self.read_string(c)?,
            '`' => self.read_template()?,
            '0'..='9' => self.read_number()?,
            c if c.is_alphabetic() || c == '_' || c == '$' => self.read_word(),
            '(' => self.single(TokenKind::OpenParen),
            ')' => self.single(TokenKind::CloseParen),
            '[' => self.single(TokenKind::OpenBracket),
            ']' => self.single(TokenKind::CloseBracket),
            '{' => self.single(TokenKind::OpenBrace),
            '}' => self.single(TokenKind::CloseBrace),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            ';' => self.single(TokenKind::Semicolon),
            '.' => {
                if self.peek_second().is_some_and(|d| d.is_ascii_digit()) {
                    self.read_number()?
                } else {
                    self.single(TokenKind::Dot)
                }
            }
            _ => self.read_operator(start)?,
        };

        Ok(Some(Token {
            kind,
            range: Range::new(start, self.position()),
        }))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn read_operator(&mut self, start: Position) -> Result<TokenKind, SyntaxError> {
        const OPERATORS: [&str; 25] = [
            "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "+=", "-=", "*=", "/=", "++",
            "--", "=>", "+", "-", "*", "/", "%", "=", "<", ">", "|",
        ];
        let first = self.peek().unwrap_or('\0');
        let mut ahead = self.chars.clone();
        let lookahead: String = (0..3).filter_map(|_| ahead.next()).collect();

        if first == '!' && !lookahead.starts_with("!=") {
            self.advance();
            return Ok(TokenKind::Operator("!".to_string()));
        }
        for op in OPERATORS {
            if lookahead.starts_with(op) {
                for _ in 0..op.chars().count() {
                    self.advance();
                }
                return Ok(TokenKind::Operator(op.to_string()));
            }
        }
        self.advance();
        Err(SyntaxError::new(
            format!("Unexpected character '{}'", first),
            Range::new(start, self.position()),
        ))
    }

    fn read_word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match Keyword::lookup(&word) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier(word),
        }
    }

    fn read_number(&mut self) -> Result<TokenKind, SyntaxError> {
        let start = self.position();
        let mut text = String::new();
        let mut seen_exponent = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' || c == '_' {
                if c != '_' {
                    text.push(c);
                }
                self.advance();
            } else if (c == 'e' || c == 'E') && !seen_exponent {
                seen_exponent = true;
                text.push(c);
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    text.push(sign);
                    self.advance();
                }
            } else {
                break;
            }
        }
        text.parse::<f64>().map(TokenKind::Number).map_err(|_| {
            SyntaxError::new(
                format!("Invalid number '{}'", text),
                Range::new(start, self.position()),
            )
        })
    }

    fn read_escape(&mut self, out: &mut String) {
        match self.advance() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }

    fn read_string(&mut self, quote: char) -> Result<TokenKind, SyntaxError> {
        let start = self.position();
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => self.read_escape(&mut value),
                Some('\n') | None => {
                    return Err(SyntaxError::new(
                        "Unterminated string literal",
                        Range::new(start, self.position()),
                    ))
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn read_template(&mut self) -> Result<TokenKind, SyntaxError> {
        let start = self.position();
        self.advance();
        let mut chunks = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError::new(
                        "Unterminated template string",
                        Range::new(start, self.position()),
                    ))
                }
                Some('`') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    self.read_escape(&mut text);
                }
                Some('$') if self.peek_second() == Some('{') => {
                    self.advance();
                    self.advance();
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(std::mem::take(&mut text)));
                    }
                    let expr_start = self.position();
                    let mut depth = 0usize;
                    let mut source = String::new();
                    loop {
                        match self.advance() {
                            Some('}') if depth == 0 => break,
                            Some(c) => {
                                if c == '{' {
                                    depth += 1;
                                } else if c == '}' {
                                    depth -= 1;
                                }
                                source.push(c);
                            }
                            None => {
                                return Err(SyntaxError::new(
                                    "Unterminated template interpolation",
                                    Range::new(expr_start, self.position()),
                                ))
                            }
                        }
                    }
                    chunks.push(TemplateChunk::Expr {
                        source,
                        start: expr_start,
                    });
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
        if !text.is_empty() {
            chunks.push(TemplateChunk::Text(text));
        }
        Ok(TokenKind::Template(chunks))
    }
}

/// Convenience function to tokenize a script
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Tokenizer::new(source).tokenize()
}
