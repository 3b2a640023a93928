//! Editor Intelligence Tests
//!
//! Completion, hover and outline the way an editor drives them: through
//! the document cache, including while the buffer does not parse.

use forge_lang::intel::{
    complete, document_symbols, hover, Catalog, CompletionKind, EntryKind, SourceText,
};
use forge_lang::semantic::SymbolKind;
use forge_lang::{Analyzer, DocumentCache, ForgeConfig};

const URI: &str = "file:///pets.forge";

fn labels(items: &[forge_lang::intel::CompletionItem]) -> Vec<&str> {
    items.iter().map(|i| i.label.as_str()).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// COMPLETION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_completion_while_typing_uses_last_good_state() {
    let config = ForgeConfig::default();
    let analyzer = Analyzer::new(config.clone());
    let mut cache = DocumentCache::for_analyzer(&analyzer);

    cache.process(&analyzer, URI, 1, "let dog = 'Fuffy';\nvar cat = 'Tom';\n");
    let typing = "let dog = 'Fuffy';\nvar cat = 'Tom';\nl.";
    let doc = cache.process(&analyzer, URI, 2, typing);
    assert!(doc.from_last_good);

    let items = complete(typing, doc.semantic.as_deref(), 2, 2, &config);
    assert_eq!(labels(&items), vec!["dog"]);
    assert_eq!(items[0].kind, CompletionKind::Variable);
}

#[test]
fn test_completion_of_console_chain() {
    let config = ForgeConfig::default();
    let items = complete("console.text.", None, 0, 13, &config);
    let names = labels(&items);
    assert!(names.contains(&"var"));
    assert!(names.contains(&"print"));
    assert!(names.contains(&"error"));
}

#[test]
fn test_completion_filters_by_partial_word() {
    let config = ForgeConfig::default();
    let items = complete("Math.sq", None, 0, 7, &config);
    assert_eq!(labels(&items), vec!["sqrt"]);
}

#[test]
fn test_symbols_sort_before_keywords() {
    let config = ForgeConfig::default();
    let source = "let width = 3;\n";
    let state = Analyzer::new(config.clone()).analyze(source).semantic;
    let typed = format!("{}wh", source);
    let items = complete(&typed, state.as_deref(), 1, 2, &config);
    let width = items.iter().position(|i| i.label == "width");
    let while_kw = items.iter().position(|i| i.label == "while");
    assert!(width.is_some() && while_kw.is_some(), "{:?}", labels(&items));
    assert!(width < while_kw);
}

// ═══════════════════════════════════════════════════════════════════════════
// HOVER
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_hover_on_cached_document() {
    let analyzer = Analyzer::default();
    let mut cache = DocumentCache::for_analyzer(&analyzer);
    let source = "const greeting = 'hi';\nconsole.text.var(c.greeting);";
    let doc = cache.process(&analyzer, URI, 1, source);

    let text = hover(source, doc.semantic.as_deref(), 1, 22).unwrap();
    assert!(text.contains("const greeting"), "{}", text);
    assert!(text.contains("store `c`"));
    assert!(text.contains("immutable"));
}

#[test]
fn test_hover_on_builtin_namespace() {
    let text = hover("let n = Sys.pid();", None, 0, 9).unwrap();
    assert!(text.contains("namespace Sys"), "{}", text);
}

#[test]
fn test_hover_on_whitespace_is_empty() {
    assert_eq!(hover("let a = 1;\n\n", None, 1, 0), None);
    assert_eq!(hover("let a = 1;", None, 5, 0), None);
}

// ═══════════════════════════════════════════════════════════════════════════
// OUTLINE AND POSITIONS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_document_symbols_in_declaration_order() {
    let source = "let dog = 'Fuffy';\nfunction bark(times) { return times; }\nconst LIMIT = 3;";
    let result = Analyzer::default().analyze(source);
    let outline = document_symbols(&result.semantic.unwrap().symbols);

    let names: Vec<&str> = outline.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["dog", "bark", "times", "LIMIT"]);
    assert_eq!(outline[1].kind, SymbolKind::Function);
    assert_eq!(outline[2].kind, SymbolKind::Parameter);
    assert_eq!(outline[0].detail, "let dog: string");
    assert_eq!(outline[3].range.start.line, 2);
}

#[test]
fn test_source_text_positions_count_characters() {
    let text = SourceText::new("let café = 1;\nlet b = 2;");
    assert_eq!(text.line_count(), 2);
    assert_eq!(text.line(1).as_deref(), Some("let b = 2;"));
    // "é" is two bytes, so the next line starts at byte 15.
    assert_eq!(text.offset_at(1, 0), Some(15));
    let position = text.position_at(15).unwrap();
    assert_eq!((position.line, position.column), (1, 0));
    assert_eq!(text.offset_at(0, 99), Some(14));
}

#[test]
fn test_catalog_marks_module_roots() {
    let catalog = Catalog::global();
    assert!(catalog.is_root("Math"));
    assert!(catalog.is_root("console"));
    assert!(!catalog.is_root("dog"));

    let cores = catalog.get("Sys.cpu.cores").unwrap();
    assert!(matches!(cores.kind, EntryKind::Function { .. }));
    assert_eq!(cores.module().map(|m| m.to_string()).as_deref(), Some("Sys"));
}
