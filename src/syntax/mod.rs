//! Reference frontend for Forge scripts
//!
//! The analysis pipeline only depends on the [`Frontend`] trait, so an
//! embedding can swap in its own lexer and parser. [`ForgeFrontend`] is the
//! implementation shipped with the crate.

pub mod ast;
pub mod parser;
pub mod tokenizer;

use crate::diagnostics::Range;
use ast::Program;
use thiserror::Error;
use tokenizer::Token;

/// Lex or parse failure with the offending range
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "{message} at line {}, column {}",
    .range.start.line + 1,
    .range.start.column + 1
)]
pub struct SyntaxError {
    pub message: String,
    pub range: Range,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, range: Range) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}

/// Lexer and parser pair driven by the pipeline
pub trait Frontend: Send + Sync {
    fn tokenize(&self, source: &str) -> Result<Vec<Token>, SyntaxError>;

    fn parse(&self, tokens: &[Token], source: &str) -> Result<Program, SyntaxError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForgeFrontend;

impl Frontend for ForgeFrontend {
    fn tokenize(&self, source: &str) -> Result<Vec<Token>, SyntaxError> {
        tokenizer::tokenize(source)
    }

    fn parse(&self, tokens: &[Token], _source: &str) -> Result<Program, SyntaxError> {
        parser::parse(tokens.to_vec())
    }
}

/// Tokenize and parse in one step
pub fn parse_source(source: &str) -> Result<Program, SyntaxError> {
    let frontend = ForgeFrontend;
    let tokens = frontend.tokenize(source)?;
    frontend.parse(&tokens, source)
}
