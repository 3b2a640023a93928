//! Style and correctness rules
//!
//! A single read-only walk over the program. Rules never stop the walk and
//! never depend on one another.

use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use crate::diagnostics::{Diagnostic, Position, Range, Severity, Stage};
use crate::intel::catalog::{Catalog, Lookup, CONSOLE};
use crate::semantic::{Module, ModuleContext, SymbolIndex, TypeMap};
use crate::syntax::ast::*;

/// Everything the rules may read
pub struct LintContext<'a> {
    pub modules: &'a ModuleContext,
    /// Root offsets the resolver found gated off at their position
    pub gated_uses: &'a BTreeSet<usize>,
    pub symbols: &'a SymbolIndex,
    pub types: &'a TypeMap,
    pub source: &'a str,
    pub max_line_length: usize,
    pub prefer_quoted_strings_for_prompts: bool,
}

/// Run every rule over `program`
pub fn lint(program: &Program, ctx: &LintContext<'_>) -> Vec<Diagnostic> {
    let mut linter = Linter {
        ctx,
        catalog: Catalog::global(),
        diagnostics: Vec::new(),
    };
    linter.line_lengths();
    linter.statements(&program.body);
    linter.diagnostics
}

//==============================================================================
// Naming conventions
//==============================================================================

fn pattern(cell: &'static OnceLock<Option<Regex>>, source: &str, name: &str) -> bool {
    cell.get_or_init(|| Regex::new(source).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

pub fn is_camel_case(name: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    pattern(&RE, r"^[a-z][a-zA-Z0-9]*$", name)
}

pub fn is_pascal_case(name: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    pattern(&RE, r"^[A-Z][a-zA-Z0-9]*$", name)
}

pub fn is_upper_snake(name: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    pattern(&RE, r"^[A-Z][A-Z0-9_]*$", name)
}

/// Naming rule for a variable in `store`
fn store_name_ok(store: Store, name: &str) -> bool {
    match store {
        Store::L | Store::V => is_camel_case(name),
        Store::C => is_camel_case(name) || is_upper_snake(name),
    }
}

fn store_convention(store: Store) -> &'static str {
    match store {
        Store::L | Store::V => "camelCase",
        Store::C => "camelCase or UPPER_SNAKE",
    }
}

/// Shared prefix plus shared suffix over the longer length. The two parts
/// are capped so they never count a character twice.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let shortest = a.len().min(b.len());
    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    (prefix + suffix).min(shortest) as f64 / longest as f64
}

const SPELLING_THRESHOLD: f64 = 0.6;

//==============================================================================
// Walker
//==============================================================================

struct Linter<'a> {
    ctx: &'a LintContext<'a>,
    catalog: &'static Catalog,
    diagnostics: Vec<Diagnostic>,
}

impl Linter<'_> {
    fn push(&mut self, severity: Severity, code: &str, message: String, range: Range) {
        self.diagnostics
            .push(Diagnostic::new(severity, code, message, range).with_stage(Stage::Lint));
    }

    fn push_with_hint(
        &mut self,
        severity: Severity,
        code: &str,
        message: String,
        range: Range,
        hint: String,
    ) {
        self.diagnostics.push(
            Diagnostic::new(severity, code, message, range)
                .with_stage(Stage::Lint)
                .with_hint(hint),
        );
    }

    fn line_lengths(&mut self) {
        let max = self.ctx.max_line_length;
        let mut offset = 0usize;
        for (line_no, line) in self.ctx.source.split('\n').enumerate() {
            let text = line.strip_suffix('\r').unwrap_or(line);
            let count = text.chars().count();
            if count > max {
                let start_byte = text
                    .char_indices()
                    .nth(max)
                    .map(|(i, _)| i)
                    .unwrap_or(text.len());
                let range = Range::new(
                    Position::new(offset + start_byte, line_no as u32, max as u32),
                    Position::new(offset + text.len(), line_no as u32, count as u32),
                );
                self.push(
                    Severity::Info,
                    "LINT_LINE_LENGTH",
                    format!("Line is {} characters long (max {})", count, max),
                    range,
                );
            }
            offset += line.len() + 1;
        }
    }

    fn statements(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.statement(stmt);
        }
    }

    fn empty_body(&mut self, body: &[Stmt], code: &str, what: &str, range: Range) {
        if body.is_empty() {
            self.push(Severity::Warning, code, format!("Empty {} body", what), range);
        }
    }

    fn statement(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Declaration {
                store, name, init, ..
            } => {
                if *store == Store::V {
                    self.push_with_hint(
                        Severity::Info,
                        "LINT_PREFER_LET",
                        format!("Prefer let over var for '{}'", name.name),
                        name.range,
                        "Use let, or const if it is never reassigned".to_string(),
                    );
                }
                if *store == Store::C && init.is_none() {
                    self.push(
                        Severity::Warning,
                        "LINT_CONST_NO_INIT",
                        format!("const '{}' has no initializer", name.name),
                        name.range,
                    );
                }
                self.check_var_name(*store, name);
                if let Some(init) = init {
                    self.expr(init);
                }
            }
            StmtKind::Assignment { target, value, .. } => {
                self.check_const_assignment(target);
                self.expr(target);
                self.expr(value);
            }
            StmtKind::Expression(expr) => self.expr(expr),
            StmtKind::Block(body) => self.statements(body),
            StmtKind::If {
                branches,
                else_body,
            } => {
                for (test, body) in branches {
                    self.expr(test);
                    self.empty_body(body, "LINT_EMPTY_BLOCK", "if", stmt.range);
                    self.statements(body);
                }
                if let Some(body) = else_body {
                    self.empty_body(body, "LINT_EMPTY_BLOCK", "else", stmt.range);
                    self.statements(body);
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.statement(init);
                }
                if let Some(test) = test {
                    self.expr(test);
                }
                if let Some(update) = update {
                    self.statement(update);
                }
                self.empty_body(body, "LINT_EMPTY_LOOP", "for", stmt.range);
                self.statements(body);
            }
            StmtKind::ForEach {
                store,
                binding,
                iterable,
                body,
            } => {
                self.check_var_name(*store, binding);
                self.expr(iterable);
                self.empty_body(body, "LINT_EMPTY_LOOP", "for-of", stmt.range);
                self.statements(body);
            }
            StmtKind::While { test, body } => {
                self.expr(test);
                self.empty_body(body, "LINT_EMPTY_LOOP", "while", stmt.range);
                self.statements(body);
            }
            StmtKind::DoWhile { body, test } => {
                self.empty_body(body, "LINT_EMPTY_LOOP", "do-while", stmt.range);
                self.statements(body);
                self.expr(test);
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => {
                if catch.is_none() && finally.is_none() {
                    self.push(
                        Severity::Warning,
                        "LINT_TRY_NO_HANDLER",
                        "try block has neither catch nor finally".to_string(),
                        stmt.range,
                    );
                }
                self.statements(body);
                if let Some(clause) = catch {
                    self.statements(&clause.body);
                }
                if let Some(body) = finally {
                    self.statements(body);
                }
            }
            StmtKind::Function(decl) => {
                self.check_func_name(&decl.name);
                self.statements(&decl.body);
            }
            StmtKind::Return(Some(expr)) | StmtKind::Throw(expr) => self.expr(expr),
            StmtKind::Return(None)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Disable(_)
            | StmtKind::Enable(_) => {}
        }
    }

    fn check_var_name(&mut self, store: Store, name: &Ident) {
        if !store_name_ok(store, &name.name) {
            self.push(
                Severity::Info,
                "LINT_VAR_NAME",
                format!(
                    "{} name '{}' should be {}",
                    store.keyword(),
                    name.name,
                    store_convention(store)
                ),
                name.range,
            );
        }
    }

    fn check_func_name(&mut self, name: &Ident) {
        if !is_camel_case(&name.name) {
            let note = if is_pascal_case(&name.name) {
                " (PascalCase is reserved for types)"
            } else {
                ""
            };
            self.push(
                Severity::Info,
                "LINT_FUNC_NAME",
                format!("Function name '{}' should be camelCase{}", name.name, note),
                name.range,
            );
        }
    }

    fn check_const_assignment(&mut self, target: &Expr) {
        let name = match &target.kind {
            ExprKind::Namespaced {
                store: Store::C,
                name,
            } => &name.name,
            ExprKind::Identifier(name)
                if self.ctx.symbols.stores_declaring(name) == [Store::C] =>
            {
                name
            }
            _ => return,
        };
        self.push(
            Severity::Error,
            "LINT_CONST_STORE",
            format!("Cannot assign to const '{}'", name),
            target.range,
        );
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Number(_) | ExprKind::Str(_) | ExprKind::Boolean(_) | ExprKind::Null => {}
            ExprKind::Identifier(name) => self.check_spelling(name, expr.range),
            ExprKind::Namespaced { store, name } => {
                if !store_name_ok(*store, &name.name) {
                    self.push(
                        Severity::Info,
                        "LINT_NS_NAME",
                        format!(
                            "{}.{} should be {}",
                            store,
                            name.name,
                            store_convention(*store)
                        ),
                        name.range,
                    );
                }
            }
            ExprKind::Member { object, .. } => {
                if let Some(path) = expr.member_path() {
                    if self.builtin_chain(&path) {
                        return;
                    }
                }
                self.expr(object);
            }
            ExprKind::Index { object, index } => {
                self.expr(object);
                self.expr(index);
            }
            ExprKind::Call { callee, args } => {
                self.check_prompt_argument(callee, args);
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Assign { target, value, .. } => {
                self.check_const_assignment(target);
                self.expr(target);
                self.expr(value);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Await(inner) => self.expr(inner),
            ExprKind::Function { body, .. } => match body {
                FunctionBody::Block(stmts) => self.statements(stmts),
                FunctionBody::Expr(value) => self.expr(value),
            },
            ExprKind::Object(props) => {
                let mut seen = HashSet::new();
                for prop in props {
                    if !seen.insert(prop.key.name.as_str()) {
                        self.push(
                            Severity::Warning,
                            "LINT_DUP_KEY",
                            format!("Duplicate key '{}' in object literal", prop.key.name),
                            prop.key.range,
                        );
                    }
                    self.expr(&prop.value);
                }
            }
            ExprKind::Array(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprKind::Template(parts) => {
                let mut interpolated = false;
                for part in parts {
                    if let TemplatePart::Expr(inner) = part {
                        interpolated = true;
                        self.expr(inner);
                    }
                }
                if !interpolated {
                    self.push(
                        Severity::Info,
                        "LINT_PLAIN_TEMPLATE",
                        "Template string has no interpolation; use a quoted string".to_string(),
                        expr.range,
                    );
                }
            }
        }
    }

    fn is_user_symbol(&self, name: &str) -> bool {
        !self.ctx.symbols.stores_declaring(name).is_empty()
    }

    /// Rules for `Root.a.b` chains under a builtin root. Returns false when
    /// the chain is not a builtin one.
    fn builtin_chain(&mut self, path: &MemberPath<'_>) -> bool {
        if !self.catalog.is_root(path.root) || self.is_user_symbol(path.root) {
            return false;
        }
        if let Some(module) = Module::from_name(path.root) {
            if self.ctx.gated_uses.contains(&path.root_range.start.offset) {
                self.push_with_hint(
                    Severity::Info,
                    "LINT_ENABLE_MODULE",
                    format!("{} is used but not enabled", module),
                    path.root_range,
                    format!("able '{}';", module),
                );
            }
        }
        let names = path.names();
        if let Some(Lookup::Missing { parent, index }) = self.catalog.lookup(path.root, &names) {
            let segment = path.segments[index];
            let candidates: Vec<&'static str> = parent.children().iter().map(|c| c.name).collect();
            self.suggest(&segment.name, &candidates, segment.range);
        }
        true
    }

    fn check_prompt_argument(&mut self, callee: &Expr, args: &[Expr]) {
        if !self.ctx.prefer_quoted_strings_for_prompts {
            return;
        }
        let Some(path) = callee.member_path() else {
            return;
        };
        let names = path.names();
        let is_prompt = path.root == CONSOLE
            && matches!(names.first(), Some(&"prompt") | Some(&"text"))
            && !self.is_user_symbol(CONSOLE);
        if !is_prompt {
            return;
        }
        if let Some(first) = args.first() {
            if matches!(first.kind, ExprKind::Template(_)) {
                self.push(
                    Severity::Info,
                    "LINT_QUOTE_PROMPT",
                    "Prefer a quoted string as the first argument".to_string(),
                    first.range,
                );
            }
        }
    }

    /// Unresolved bare identifiers close to a builtin name
    fn check_spelling(&mut self, name: &str, range: Range) {
        if self.is_user_symbol(name)
            || self.ctx.symbols.global.contains_key(name)
            || self.catalog.is_root(name)
        {
            return;
        }
        let candidates = self.catalog.known_names();
        self.suggest(name, &candidates, range);
    }

    fn suggest(&mut self, name: &str, candidates: &[&str], range: Range) {
        let best = candidates
            .iter()
            .filter(|c| **c != name)
            .map(|c| (similarity(name, c), *c))
            .filter(|(score, _)| *score >= SPELLING_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((_, candidate)) = best {
            self.push_with_hint(
                Severity::Info,
                "LINT_SPELLING",
                format!("'{}' looks like a misspelling of '{}'", name, candidate),
                range,
                format!("Did you mean '{}'?", candidate),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{resolve, AnalysisOptions};
    use crate::syntax::parse_source;

    fn run(source: &str) -> Vec<Diagnostic> {
        run_with(source, 120, true)
    }

    fn run_with(source: &str, max_line_length: usize, prefer_quoted: bool) -> Vec<Diagnostic> {
        let program = parse_source(source).unwrap();
        let (state, _) = resolve(&program, AnalysisOptions::default());
        let ctx = LintContext {
            modules: &state.modules,
            gated_uses: &state.gated_uses,
            symbols: &state.symbols,
            types: &state.types,
            source,
            max_line_length,
            prefer_quoted_strings_for_prompts: prefer_quoted,
        };
        lint(&program, &ctx)
    }

    fn codes(source: &str) -> Vec<String> {
        run(source).into_iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_casing_patterns() {
        assert!(is_camel_case("dogName"));
        assert!(!is_camel_case("DogName"));
        assert!(is_pascal_case("DogName"));
        assert!(is_upper_snake("MAX_SIZE"));
        assert!(!is_upper_snake("MaxSize"));
    }

    #[test]
    fn test_similarity() {
        assert!(similarity("consle", "console") >= 0.6);
        assert!(similarity("dog", "console") < 0.6);
        assert_eq!(similarity("abc", "abc"), 1.0);
    }

    #[test]
    fn test_empty_bodies_and_try() {
        assert_eq!(
            codes("if (true) { } while (false) { } try { x(); }"),
            vec!["LINT_EMPTY_BLOCK", "LINT_EMPTY_LOOP", "LINT_TRY_NO_HANDLER"]
        );
    }

    #[test]
    fn test_declaration_rules() {
        assert_eq!(
            codes("var count = 1; const LIMIT; let Bad_Name = 2;"),
            vec!["LINT_PREFER_LET", "LINT_CONST_NO_INIT", "LINT_VAR_NAME"]
        );
        assert!(codes("const MAX_SIZE = 3; const maxSize = 3;").is_empty());
    }

    #[test]
    fn test_const_store_assignment() {
        assert_eq!(codes("const limit = 1; c.limit = 2;"), vec!["LINT_CONST_STORE"]);
        assert_eq!(codes("const limit = 1; limit = 2;"), vec!["LINT_CONST_STORE"]);
        assert!(codes("const limit = 1; let limit = 0; limit = 2;").is_empty());
    }

    #[test]
    fn test_function_and_namespace_names() {
        assert_eq!(codes("function DoThing() { }"), vec!["LINT_FUNC_NAME"]);
        assert_eq!(codes("let ok = 1; l.ok; c.Bad_name;"), vec!["LINT_NS_NAME"]);
    }

    #[test]
    fn test_enable_module_hint() {
        let diags = run("disable 'AllInOne'; Sys.pid();");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "LINT_ENABLE_MODULE");
        assert_eq!(diags[0].hint.as_deref(), Some("able 'Sys';"));
    }

    #[test]
    fn test_enable_module_hint_follows_position() {
        let diags = run("disable 'AllInOne';\nlet p = Math.PI;\nable 'Math';\nlet q = Math.E;");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "LINT_ENABLE_MODULE");
        assert_eq!(diags[0].range.start.line, 1);

        assert!(run("let p = Math.PI;\ndisable 'AllInOne';").is_empty());
    }

    #[test]
    fn test_prompt_and_templates() {
        let source = "let name = 'a'; console.prompt.input(`Name ${name}?`); let t = `plain`;";
        assert_eq!(codes(source), vec!["LINT_QUOTE_PROMPT", "LINT_PLAIN_TEMPLATE"]);
        let quiet = run_with(source, 120, false);
        assert_eq!(quiet.len(), 1);
    }

    #[test]
    fn test_duplicate_keys() {
        assert_eq!(codes("let o = { a: 1, b: 2, a: 3 };"), vec!["LINT_DUP_KEY"]);
    }

    #[test]
    fn test_spelling() {
        let diags = run("consle.text.var('x'); Math.sqr(4);");
        let spelling: Vec<&str> = diags
            .iter()
            .filter(|d| d.code == "LINT_SPELLING")
            .filter_map(|d| d.hint.as_deref())
            .collect();
        assert_eq!(spelling, vec!["Did you mean 'console'?", "Did you mean 'sqrt'?"]);
    }

    #[test]
    fn test_line_length() {
        let diags = run_with("let a = 1;\nlet bb = 22222;", 12, true);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "LINT_LINE_LENGTH");
        assert_eq!(diags[0].range.start.line, 1);
        assert_eq!(diags[0].range.start.column, 12);
    }
}
