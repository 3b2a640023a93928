//! Hover text for symbols, builtins and keywords

use super::catalog::{Catalog, EntryKind};
use super::SourceText;
use crate::semantic::{ModuleContext, SemanticState, SymbolIndex, SymbolInfo, SymbolKind};
use crate::syntax::ast::Store;
use crate::syntax::tokenizer::Keyword;

pub(super) fn keyword_doc(word: &str) -> Option<&'static str> {
    let doc = match Keyword::lookup(word)? {
        Keyword::Let => "Declare a mutable variable in the `l` store.",
        Keyword::Var => "Declare a mutable variable in the `v` store.",
        Keyword::Const => "Declare a constant in the `c` store. It cannot be reassigned.",
        Keyword::Function => "Declare a function. Its name lives in the `c` store.",
        Keyword::Async => "Mark a function as async. It still runs to completion when called.",
        Keyword::Await => "Wait for a value. Evaluates its operand in place.",
        Keyword::Return => "Leave the current function, optionally with a value.",
        Keyword::If | Keyword::Elif | Keyword::Else => "Conditional branch.",
        Keyword::For => "`for (init; test; update)` or `for (let item of items)`.",
        Keyword::Of => "Separates the binding from the iterable in a for-each loop.",
        Keyword::While => "Repeat while the condition is truthy.",
        Keyword::Do => "`do { } while (test);` runs the body at least once.",
        Keyword::Try | Keyword::Catch | Keyword::Finally => {
            "`try { } catch (e) { } finally { }` handles thrown values and runtime errors."
        }
        Keyword::Throw => "Throw a value; uncaught values stop the program.",
        Keyword::Break => "Leave the innermost loop.",
        Keyword::Continue => "Skip to the next iteration of the innermost loop.",
        Keyword::True | Keyword::False => "Boolean literal.",
        Keyword::Null => "The null value.",
        Keyword::Disable => "`disable 'AllInOne';` turns off every optional module.",
        Keyword::Able => "`able 'Math', 'Sys';` enables the named modules.",
    };
    Some(doc)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Dotted chain under the cursor, cut after the hovered segment
fn chain_at(line: &str, character: usize) -> Option<Vec<String>> {
    let chars: Vec<char> = line.chars().collect();
    if character > chars.len() {
        return None;
    }
    let mut end = character;
    while end < chars.len() && is_word_char(chars[end]) {
        end += 1;
    }
    let mut start = character;
    while start > 0 && (is_word_char(chars[start - 1]) || chars[start - 1] == '.') {
        start -= 1;
    }
    let text: String = chars[start..end].iter().collect();
    let segments: Vec<String> = text
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

fn symbol_markdown(info: &SymbolInfo) -> String {
    let mutability = if info.mutable { "mutable" } else { "immutable" };
    let what = match info.kind {
        SymbolKind::Function => "function",
        SymbolKind::Parameter => "parameter",
        SymbolKind::Variable => "variable",
    };
    format!(
        "```forge\n{} {}: {}\n```\n\n{} in store `{}`, {}, declared on line {}",
        info.store.keyword(),
        info.name,
        info.ty,
        what,
        info.store,
        mutability,
        info.declared_at.start.line + 1
    )
}

fn find_symbol<'a>(symbols: &'a SymbolIndex, segments: &[String]) -> Option<&'a SymbolInfo> {
    match segments {
        [prefix, name] => match Store::from_prefix(prefix) {
            Some(store) => symbols.get(store, name).or_else(|| {
                symbols
                    .global
                    .get(name.as_str())
                    .filter(|info| info.store == store)
            }),
            None => None,
        },
        [name] => match symbols.stores_declaring(name).as_slice() {
            [store] => symbols.get(*store, name),
            _ => symbols.global.get(name.as_str()),
        },
        _ => None,
    }
}

fn builtin_markdown(segments: &[String], modules: &ModuleContext) -> Option<String> {
    let entry = Catalog::global().get(&segments.join("."))?;
    let signature = match &entry.kind {
        EntryKind::Namespace(children) => {
            let names: Vec<&str> = children.iter().map(|c| c.name).collect();
            format!("namespace {} {{ {} }}", entry.path, names.join(", "))
        }
        _ => entry.detail(),
    };
    let mut text = format!("```forge\n{}\n```\n\n{}", signature, entry.doc);
    if let Some(module) = entry.module() {
        if !modules.is_enabled(module) {
            text.push_str(&format!(
                "\n\n*Module `{}` is not enabled. Add `able '{}';`*",
                module, module
            ));
        }
    }
    Some(text)
}

/// Markdown for the item at a 0-based line/character
pub fn hover(
    source: &str,
    semantic: Option<&SemanticState>,
    line: u32,
    character: u32,
) -> Option<String> {
    let text = SourceText::new(source).line(line)?;
    let segments = chain_at(&text, character as usize)?;
    let fallback = SemanticState::default();
    let semantic = semantic.unwrap_or(&fallback);

    if Catalog::global().is_root(&segments[0]) {
        return builtin_markdown(&segments, &semantic.modules);
    }
    if let Some(info) = find_symbol(&semantic.symbols, &segments) {
        return Some(symbol_markdown(info));
    }
    match segments.as_slice() {
        [word] => keyword_doc(word).map(|doc| format!("**{}** (keyword)\n\n{}", word, doc)),
        _ => None,
    }
}
