//! Resolver Tests
//!
//! Symbol resolution across the `l`, `v` and `c` stores and module gating,
//! driven through the full analysis pipeline.

use forge_lang::semantic::{Module, SymbolKind};
use forge_lang::syntax::ast::Store;
use forge_lang::{Analyzer, Diagnostic, ForgeConfig, Severity};

fn analyzer() -> Analyzer {
    Analyzer::new(ForgeConfig {
        lint_enabled: false,
        ..Default::default()
    })
}

fn codes(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.code.as_str()).collect()
}

fn count(diagnostics: &[Diagnostic], code: &str) -> usize {
    diagnostics.iter().filter(|d| d.code == code).count()
}

// ═══════════════════════════════════════════════════════════════════════════
// STORES AND AMBIGUITY
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_same_name_in_two_stores_is_ambiguous_when_bare() {
    let result = analyzer().analyze("let dog = 'a';\nvar dog = 'b';\nconsole.text.var(dog);");
    assert_eq!(count(&result.diagnostics, "AMBIGUOUS_VARIABLE"), 1);
    let diag = result
        .diagnostics
        .iter()
        .find(|d| d.code == "AMBIGUOUS_VARIABLE")
        .unwrap();
    assert_eq!(diag.range.start.line, 2);
    assert!(diag.hint.as_deref().unwrap_or("").contains("l.dog"));
}

#[test]
fn test_qualified_reference_is_not_ambiguous() {
    let result = analyzer().analyze("let dog = 'a';\nvar dog = 'b';\nconsole.text.var(l.dog, v.dog);");
    assert!(result.ok, "{:?}", result.diagnostics);
    assert_eq!(count(&result.diagnostics, "AMBIGUOUS_VARIABLE"), 0);
}

#[test]
fn test_duplicate_is_reported_at_second_declaration() {
    let result = analyzer().analyze("let dog = 'a';\nlet cat = 'b';\nlet dog = 'c';");
    assert_eq!(codes(&result.diagnostics), vec!["DUPLICATE_DECLARATION"]);
    let diag = &result.diagnostics[0];
    assert_eq!(diag.range.start.line, 2);
    assert_eq!(diag.range.start.column, 4);
}

#[test]
fn test_first_declaration_wins_in_global_table() {
    let result = analyzer().analyze("let dog = 'a';\nconst dog = 3;");
    let semantic = result.semantic.unwrap();
    let first = semantic.symbols.global.get("dog").unwrap();
    assert_eq!(first.store, Store::L);
    assert!(semantic.symbols.get(Store::C, "dog").is_some());
    assert_eq!(
        semantic.symbols.stores_declaring("dog"),
        vec![Store::L, Store::C]
    );
}

#[test]
fn test_undefined_names() {
    let result = analyzer().analyze("let x = 1;\nconsole.text.var(y, v.x);");
    assert_eq!(
        codes(&result.diagnostics),
        vec!["UNDEFINED_VARIABLE", "UNDEFINED_IN_NAMESPACE"]
    );
}

#[test]
fn test_functions_live_in_const_store() {
    let result = analyzer().analyze("function greet(name) { return 'hi ' + name; }\ngreet('Fuffy');");
    assert!(result.ok, "{:?}", result.diagnostics);
    let semantic = result.semantic.unwrap();
    let greet = semantic.symbols.get(Store::C, "greet").unwrap();
    assert_eq!(greet.kind, SymbolKind::Function);
    assert!(!greet.mutable);
}

#[test]
fn test_const_reassignment_is_rejected() {
    let result = Analyzer::default().analyze("const LIMIT = 3;\nc.LIMIT = 4;");
    assert!(!result.ok);
    assert_eq!(count(&result.diagnostics, "LINT_CONST_STORE"), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// MODULE GATING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_every_module_is_enabled_by_default() {
    let result = analyzer().analyze("let n = Sys.cpu.cores();\nlet p = Math.PI;");
    assert!(result.ok, "{:?}", result.diagnostics);
    let semantic = result.semantic.unwrap();
    for module in Module::ALL {
        assert!(semantic.modules.is_enabled(module), "{} disabled", module);
    }
}

#[test]
fn test_gated_module_reports_once() {
    let source = "disable 'AllInOne';\nable 'Math';\nlet p = Math.PI;\nlet n = Sys.cpu.cores();";
    let result = analyzer().analyze(source);
    assert_eq!(codes(&result.diagnostics), vec!["MODULE_NOT_ENABLED"]);
    let diag = &result.diagnostics[0];
    assert_eq!(diag.severity, Severity::Error);
    assert!(diag.message.contains("Sys"));
    assert_eq!(diag.range.start.line, 3);
}

#[test]
fn test_soft_gating_downgrades_to_warning() {
    let analyzer = Analyzer::new(ForgeConfig {
        lint_enabled: false,
        soft_module_gating: true,
        ..Default::default()
    });
    let result = analyzer.analyze("disable 'AllInOne';\nlet n = Sys.pid();");
    assert!(result.ok);
    let diag = result
        .diagnostics
        .iter()
        .find(|d| d.code == "MODULE_NOT_ENABLED")
        .unwrap();
    assert_eq!(diag.severity, Severity::Warning);
}

#[test]
fn test_able_after_disable_restores_module() {
    let result = analyzer().analyze("disable 'AllInOne';\nable 'Sys', 'Math';\nlet n = Sys.pid();");
    assert!(result.ok, "{:?}", result.diagnostics);
    let semantic = result.semantic.unwrap();
    assert!(semantic.modules.is_enabled(Module::Sys));
    assert!(!semantic.modules.is_enabled(Module::Net));
}

#[test]
fn test_unknown_member_of_builtin_is_warning() {
    let result = analyzer().analyze("let t = Math.tau;");
    assert!(result.ok);
    assert_eq!(codes(&result.diagnostics), vec!["UNKNOWN_MODULE_MEMBER"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// MEMBER ACCESS AND CALLS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_missing_property_on_object_literal() {
    let result = analyzer().analyze("const pet = { name: 'Fuffy' };\nconsole.text.var(pet.age);");
    assert_eq!(codes(&result.diagnostics), vec!["PROPERTY_NOT_FOUND"]);
    assert_eq!(result.diagnostics[0].severity, Severity::Error);
}

#[test]
fn test_relaxed_member_access_warns() {
    let analyzer = Analyzer::new(ForgeConfig {
        lint_enabled: false,
        relaxed_member_access: true,
        ..Default::default()
    });
    let result = analyzer.analyze("const pet = { name: 'Fuffy' };\nconsole.text.var(pet.age);");
    assert!(result.ok);
    assert_eq!(result.diagnostics[0].severity, Severity::Warning);
}

#[test]
fn test_user_function_argument_count() {
    let result = analyzer().analyze("function add(a, b) { return a + b; }\nadd(1);");
    assert_eq!(codes(&result.diagnostics), vec!["ARGUMENT_COUNT_MISMATCH"]);
}
