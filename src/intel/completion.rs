//! Context-aware completion
//!
//! The text before the cursor picks one of four contexts: a module
//! directive string, a store prefix (`l.`), a builtin or object chain
//! (`Sys.cpu.`), or the default list.

use regex::Regex;
use std::sync::OnceLock;

use super::catalog::{BuiltinEntry, Catalog, EntryKind, Lookup};
use super::hover::keyword_doc;
use super::{CompletionItem, CompletionKind, SourceText};
use crate::config::ForgeConfig;
use crate::semantic::{Module, ModuleContext, SemanticState, SymbolIndex, SymbolInfo, SymbolKind, ALL_IN_ONE};
use crate::syntax::ast::Store;
use crate::syntax::tokenizer::Keyword;
use crate::types::ForgeType;

#[derive(Debug, PartialEq)]
enum Context {
    Directive { disable: bool, partial: String },
    Store { store: Store, partial: String },
    Chain { path: Vec<String>, partial: String },
    Default { partial: String },
}

fn regex(cell: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(source).ok()).as_ref()
}

fn directive_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex(
        &RE,
        r#"(?:^|[;{}])\s*(able|disable)\s+(?:(?:'[^']*'|"[^"]*")\s*,\s*)*['"](\w*)$"#,
    )
}

fn chain_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&RE, r"(?:^|[^\w.$])([A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\.([\w$]*)$")
}

fn word_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&RE, r"[\w$]*$")
}

fn context(prefix: &str) -> Context {
    if let Some(caps) = directive_pattern().and_then(|re| re.captures(prefix)) {
        return Context::Directive {
            disable: &caps[1] == "disable",
            partial: caps[2].to_string(),
        };
    }
    if let Some(caps) = chain_pattern().and_then(|re| re.captures(prefix)) {
        let path: Vec<String> = caps[1].split('.').map(str::to_string).collect();
        let partial = caps[2].to_string();
        if path.len() == 1 {
            if let Some(store) = Store::from_prefix(&path[0]) {
                return Context::Store { store, partial };
            }
        }
        return Context::Chain { path, partial };
    }
    let partial = word_pattern()
        .and_then(|re| re.find(prefix))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Context::Default { partial }
}

fn matches_partial(label: &str, partial: &str) -> bool {
    partial.is_empty() || label.to_lowercase().starts_with(&partial.to_lowercase())
}

fn symbol_item(info: &SymbolInfo) -> CompletionItem {
    let kind = match info.kind {
        SymbolKind::Function => CompletionKind::Function,
        SymbolKind::Variable | SymbolKind::Parameter => CompletionKind::Variable,
    };
    CompletionItem::new(&info.name, kind).with_detail(format!(
        "{} {}: {}",
        info.store.keyword(),
        info.name,
        info.ty
    ))
}

/// Detail for a catalog entry, flagged when its module is gated off
fn entry_detail(entry: &BuiltinEntry, modules: &ModuleContext) -> String {
    match entry.module() {
        Some(module) if !modules.is_enabled(module) => format!("{} (not enabled)", entry.detail()),
        _ => entry.detail(),
    }
}

fn entry_item(entry: &BuiltinEntry, modules: &ModuleContext, top_level: bool) -> CompletionItem {
    let kind = match &entry.kind {
        EntryKind::Namespace(_) if top_level => CompletionKind::Module,
        EntryKind::Namespace(_) => CompletionKind::Property,
        EntryKind::Function { .. } => CompletionKind::Function,
        EntryKind::Value(_) => CompletionKind::Value,
    };
    CompletionItem::new(entry.name, kind)
        .with_detail(entry_detail(entry, modules))
        .with_documentation(entry.doc)
}

fn directive_items(disable: bool) -> Vec<CompletionItem> {
    let catalog = Catalog::global();
    let bundle = CompletionItem::new(ALL_IN_ONE, CompletionKind::Module)
        .with_detail("Every module at once")
        .with_sort_text("0");
    if disable {
        return vec![bundle];
    }
    let mut items = vec![bundle];
    items.extend(Module::ALL.iter().map(|module| {
        let item = CompletionItem::new(module.as_str(), CompletionKind::Module)
            .with_sort_text(format!("1_{}", module));
        match catalog.root(module.as_str()) {
            Some(root) => item.with_documentation(root.doc),
            None => item,
        }
    }));
    items
}

fn store_items(symbols: &SymbolIndex, store: Store) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = symbols.store(store).values().map(symbol_item).collect();
    for info in symbols.global.values().filter(|info| info.store == store) {
        if !items.iter().any(|item| item.label == info.name) {
            items.push(symbol_item(info));
        }
    }
    items
}

/// Properties of a closed or open object type, for `obj.` chains
fn object_items(ty: &ForgeType) -> Vec<CompletionItem> {
    match ty {
        ForgeType::Object { props, .. } => props
            .iter()
            .map(|(name, prop)| {
                CompletionItem::new(name, CompletionKind::Property).with_detail(prop.to_string())
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn walk_props(mut ty: ForgeType, segments: &[String]) -> Option<ForgeType> {
    for segment in segments {
        ty = match ty {
            ForgeType::Object { mut props, .. } => props.remove(segment)?,
            _ => return None,
        };
    }
    Some(ty)
}

fn chain_items(
    path: &[String],
    symbols: &SymbolIndex,
    modules: &ModuleContext,
) -> Vec<CompletionItem> {
    let catalog = Catalog::global();
    let root = path[0].as_str();
    if catalog.is_root(root) {
        let segments: Vec<&str> = path[1..].iter().map(String::as_str).collect();
        return match catalog.lookup(root, &segments) {
            Some(Lookup::Found(entry)) => entry
                .children()
                .iter()
                .map(|child| entry_item(child, modules, false))
                .collect(),
            _ => Vec::new(),
        };
    }

    // l.obj. / obj.
    let (symbol, rest) = match Store::from_prefix(root) {
        Some(store) if path.len() >= 2 => (symbols.get(store, &path[1]), &path[2..]),
        _ => {
            let declaring = symbols.stores_declaring(root);
            let symbol = match declaring.as_slice() {
                [store] => symbols.get(*store, root),
                _ => symbols.global.get(root),
            };
            (symbol, &path[1..])
        }
    };
    symbol
        .and_then(|info| walk_props(info.ty.clone(), rest))
        .map(|ty| object_items(&ty))
        .unwrap_or_default()
}

fn able_snippet(config: &ForgeConfig) -> String {
    let names: Vec<String> = config
        .default_modules
        .iter()
        .map(|name| format!("'{}'", name))
        .collect();
    format!("able {};", names.join(", "))
}

fn snippets(config: &ForgeConfig) -> Vec<CompletionItem> {
    [
        ("able", "Enable the default modules", able_snippet(config)),
        (
            "disable",
            "Turn off the module bundle",
            format!("disable '{}';", ALL_IN_ONE),
        ),
        (
            "function",
            "Function declaration",
            "function name(params) {\n    \n}".to_string(),
        ),
        (
            "for-of",
            "Loop over the items of an array",
            "for (let item of items) {\n    \n}".to_string(),
        ),
        (
            "try",
            "try/catch block",
            "try {\n    \n} catch (e) {\n    \n}".to_string(),
        ),
    ]
    .into_iter()
    .map(|(label, detail, body)| {
        CompletionItem::new(label, CompletionKind::Snippet)
            .with_detail(detail)
            .with_insert_text(body)
            .with_sort_text(format!("3_{}", label))
    })
    .collect()
}

fn default_items(
    symbols: &SymbolIndex,
    modules: &ModuleContext,
    config: &ForgeConfig,
) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = symbols
        .global
        .values()
        .map(|info| {
            let item = symbol_item(info);
            let sort = format!("0_{}", item.label);
            item.with_sort_text(sort)
        })
        .collect();
    items.extend(Catalog::global().roots().iter().map(|root| {
        entry_item(root, modules, true).with_sort_text(format!("1_{}", root.name))
    }));
    items.extend(Keyword::ALL.iter().map(|(word, _)| {
        let item = CompletionItem::new(*word, CompletionKind::Keyword)
            .with_sort_text(format!("2_{}", word));
        match keyword_doc(word) {
            Some(doc) => item.with_documentation(doc),
            None => item,
        }
    }));
    items.extend(snippets(config));
    items
}

/// Completion items at a 0-based line/character
pub fn complete(
    source: &str,
    semantic: Option<&SemanticState>,
    line: u32,
    character: u32,
    config: &ForgeConfig,
) -> Vec<CompletionItem> {
    let Some(prefix) = SourceText::new(source).prefix(line, character) else {
        return Vec::new();
    };
    let fallback = SemanticState::default();
    let semantic = semantic.unwrap_or(&fallback);
    let (symbols, modules) = (&semantic.symbols, &semantic.modules);

    let (items, partial) = match context(&prefix) {
        Context::Directive { disable, partial } => (directive_items(disable), partial),
        Context::Store { store, partial } => (store_items(symbols, store), partial),
        Context::Chain { path, partial } => (chain_items(&path, symbols, modules), partial),
        Context::Default { partial } => (default_items(symbols, modules, config), partial),
    };
    items
        .into_iter()
        .filter(|item| matches_partial(&item.label, &partial))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Analyzer;

    /// Analyze `valid`, then complete at the end of `valid` + `typed`
    fn complete_after(valid: &str, typed: &str) -> Vec<CompletionItem> {
        let config = ForgeConfig::default();
        let result = Analyzer::new(config.clone()).analyze(valid);
        let source = format!("{}{}", valid, typed);
        let line = source.lines().count().saturating_sub(1) as u32;
        let character = source.lines().last().map_or(0, |l| l.chars().count()) as u32;
        complete(&source, result.semantic.as_deref(), line, character, &config)
    }

    fn labels(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|i| i.label.as_str()).collect()
    }

    #[test]
    fn test_context_detection() {
        assert_eq!(
            context("able 'Math', 'Ti"),
            Context::Directive {
                disable: false,
                partial: "Ti".to_string()
            }
        );
        assert_eq!(
            context("x = v."),
            Context::Store {
                store: Store::V,
                partial: String::new()
            }
        );
        assert_eq!(
            context("Sys.cpu.co"),
            Context::Chain {
                path: vec!["Sys".to_string(), "cpu".to_string()],
                partial: "co".to_string()
            }
        );
        assert_eq!(
            context("let a = 1.5"),
            Context::Default {
                partial: "5".to_string()
            }
        );
    }

    #[test]
    fn test_store_prefix_lists_that_store() {
        let items = complete_after("let dog = 'Fuffy';\nvar cat = 1;\n", "l.");
        assert_eq!(labels(&items), vec!["dog"]);
        assert_eq!(items[0].detail.as_deref(), Some("let dog: string"));
    }

    #[test]
    fn test_builtin_chain_children() {
        let items = complete_after("", "Sys.cpu.");
        assert_eq!(labels(&items), vec!["cores", "usage", "model"]);
        assert!(items.iter().all(|i| i.kind == CompletionKind::Function));
    }

    #[test]
    fn test_gated_modules_are_flagged() {
        let gated = "disable 'AllInOne';\nable 'Math';\n";
        let items = complete_after(gated, "Sy");
        let sys = items.iter().find(|i| i.label == "Sys").unwrap();
        assert!(sys.detail.as_deref().unwrap().ends_with("(not enabled)"));

        let items = complete_after(gated, "Ma");
        let math = items.iter().find(|i| i.label == "Math").unwrap();
        assert!(!math.detail.as_deref().unwrap().contains("not enabled"));
    }

    #[test]
    fn test_directive_string_offers_modules() {
        let items = complete_after("", "able 'Cr");
        assert_eq!(labels(&items), vec!["Crypto"]);
        let items = complete_after("", "disable '");
        assert_eq!(labels(&items), vec!["AllInOne"]);
    }

    #[test]
    fn test_able_snippet_uses_default_modules() {
        let items = complete_after("", "ab");
        let snippet = items
            .iter()
            .find(|i| i.kind == CompletionKind::Snippet && i.label == "able")
            .unwrap();
        assert_eq!(snippet.insert_text.as_deref(), Some("able 'Math', 'Time', 'Sys';"));
        assert!(items.iter().any(|i| i.kind == CompletionKind::Keyword && i.label == "able"));
    }

    #[test]
    fn test_object_properties() {
        let items = complete_after("let pet = { name: 'Fuffy', age: 3 };\n", "l.pet.");
        assert_eq!(labels(&items), vec!["age", "name"]);
    }

    #[test]
    fn test_without_semantic_state() {
        let items = complete("con", None, 0, 3, &ForgeConfig::default());
        assert!(labels(&items).contains(&"console"));
        assert!(labels(&items).contains(&"const"));
        assert!(labels(&items).contains(&"continue"));
    }
}
