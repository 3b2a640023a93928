//! Editor intelligence: completion, hover and document symbols
//!
//! Everything here reads analysis results; nothing re-parses. Positions
//! arrive as 0-based line/character pairs and are mapped onto byte offsets
//! through a [`Rope`].

pub mod catalog;
mod completion;
mod hover;

use ropey::Rope;
use serde::Serialize;

use crate::diagnostics::{Position, Range};
use crate::semantic::{SymbolIndex, SymbolKind};
use crate::syntax::ast::Store;

pub use catalog::{BuiltinEntry, Catalog, EntryKind, Lookup, CONSOLE};
pub use completion::complete;
pub use hover::hover;

/// Source text addressable by line/character
#[derive(Debug, Clone)]
pub struct SourceText {
    rope: Rope,
}

impl SourceText {
    pub fn new(source: &str) -> Self {
        Self {
            rope: Rope::from_str(source),
        }
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Line `line` without its line break
    pub fn line(&self, line: u32) -> Option<String> {
        let index = line as usize;
        if index >= self.rope.len_lines() {
            return None;
        }
        let text = self.rope.line(index).to_string();
        Some(text.trim_end_matches(['\n', '\r']).to_string())
    }

    /// Byte offset of a line/character pair; `character` is clamped to the
    /// end of the line
    pub fn offset_at(&self, line: u32, character: u32) -> Option<usize> {
        let text = self.line(line)?;
        let character = (character as usize).min(text.chars().count());
        let char_index = self.rope.line_to_char(line as usize) + character;
        Some(self.rope.char_to_byte(char_index))
    }

    pub fn position_at(&self, offset: usize) -> Option<Position> {
        if offset > self.rope.len_bytes() {
            return None;
        }
        let char_index = self.rope.byte_to_char(offset);
        let line = self.rope.char_to_line(char_index);
        let column = char_index - self.rope.line_to_char(line);
        Some(Position::new(offset, line as u32, column as u32))
    }

    /// Text of `line` before `character`
    pub(crate) fn prefix(&self, line: u32, character: u32) -> Option<String> {
        let text = self.line(line)?;
        Some(text.chars().take(character as usize).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Keyword,
    Variable,
    Function,
    Module,
    Property,
    Snippet,
    Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_text: Option<String>,
}

impl CompletionItem {
    pub fn new(label: impl Into<String>, kind: CompletionKind) -> Self {
        Self {
            label: label.into(),
            kind,
            detail: None,
            documentation: None,
            insert_text: None,
            sort_text: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    pub fn with_insert_text(mut self, text: impl Into<String>) -> Self {
        self.insert_text = Some(text.into());
        self
    }

    pub fn with_sort_text(mut self, text: impl Into<String>) -> Self {
        self.sort_text = Some(text.into());
        self
    }
}

/// Outline entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub store: Store,
    pub detail: String,
    pub range: Range,
}

/// Every declaration of the document, in declaration order
pub fn document_symbols(symbols: &SymbolIndex) -> Vec<DocumentSymbol> {
    symbols
        .global
        .values()
        .map(|info| DocumentSymbol {
            name: info.name.clone(),
            kind: info.kind,
            store: info.store,
            detail: format!("{} {}: {}", info.store.keyword(), info.name, info.ty),
            range: info.declared_at,
        })
        .collect()
}
