//! Single forward pass that binds names, gates modules and infers types
//!
//! Resolution is flat: a reference only sees declarations at or before its
//! position. Function bodies, `for` headers and `catch` clauses open a new
//! frame; every other block shares the enclosing one.

use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};

use super::{
    AnalysisOptions, SemanticState, StoreTables, SymbolIndex, SymbolInfo, SymbolKind, TypeMap,
};
use crate::diagnostics::{Diagnostic, Range, Severity, Stage};
use crate::intel::catalog::{Catalog, Lookup};
use crate::semantic::modules::{Module, ModuleContext};
use crate::syntax::ast::*;
use crate::types::{is_assignable, unify, ForgeType};

/// Resolve a program with fresh module state
pub fn resolve(program: &Program, options: AnalysisOptions) -> (SemanticState, Vec<Diagnostic>) {
    let mut resolver = Resolver::new(options);
    resolver.resolve_program(program);
    resolver.finish()
}

/// Result of looking a bare name up across the three stores
enum NameLookup {
    Missing,
    Unique(SymbolInfo),
    Ambiguous(Vec<Store>),
}

pub struct Resolver {
    options: AnalysisOptions,
    catalog: &'static Catalog,
    frames: Vec<StoreTables>,
    global: IndexMap<String, SymbolInfo>,
    modules: ModuleContext,
    types: TypeMap,
    gated_uses: BTreeSet<usize>,
    diagnostics: Vec<Diagnostic>,
    /// Return types collected per enclosing function
    returns: Vec<Vec<ForgeType>>,
}

impl Resolver {
    pub fn new(options: AnalysisOptions) -> Self {
        Self {
            options,
            catalog: Catalog::global(),
            frames: vec![StoreTables::default()],
            global: IndexMap::new(),
            modules: ModuleContext::default(),
            types: TypeMap::new(),
            gated_uses: BTreeSet::new(),
            diagnostics: Vec::new(),
            returns: Vec::new(),
        }
    }

    pub fn resolve_program(&mut self, program: &Program) {
        for stmt in &program.body {
            self.statement(stmt);
        }
    }

    pub fn finish(mut self) -> (SemanticState, Vec<Diagnostic>) {
        let stores = self.frames.swap_remove(0);
        let state = SemanticState {
            symbols: SymbolIndex {
                stores,
                global: self.global,
            },
            modules: self.modules,
            types: self.types,
            gated_uses: self.gated_uses,
        };
        (state, self.diagnostics)
    }

    //--------------------------------------------------------------------------
    // Diagnostics
    //--------------------------------------------------------------------------

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic.with_stage(Stage::Resolve));
    }

    fn member_severity(&self) -> Severity {
        if self.options.relaxed_member_access {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    //--------------------------------------------------------------------------
    // Frames and symbols
    //--------------------------------------------------------------------------

    fn push_frame(&mut self) {
        self.frames.push(StoreTables::default());
    }

    fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn current_frame(&mut self) -> &mut StoreTables {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn declare(&mut self, symbol: SymbolInfo, name_range: Range) {
        let store = symbol.store;
        let table = &mut self.current_frame()[store.index()];
        if table.contains_key(&symbol.name) {
            let message = format!(
                "'{}' is already declared in the {} store",
                symbol.name,
                store.keyword()
            );
            self.report(
                Diagnostic::error("DUPLICATE_DECLARATION", message, name_range)
                    .with_hint(format!("Rename it or assign with {}.{} = ...", store, symbol.name)),
            );
            return;
        }
        table.insert(symbol.name.clone(), symbol.clone());
        self.global.entry(symbol.name.clone()).or_insert(symbol);
    }

    fn update_type(&mut self, store: Store, name: &str, ty: ForgeType) {
        if let Some(symbol) = self.current_frame()[store.index()].get_mut(name) {
            symbol.ty = ty.clone();
        }
        if let Some(symbol) = self.global.get_mut(name) {
            if symbol.store == store {
                symbol.ty = ty;
            }
        }
    }

    fn lookup_name(&self, name: &str) -> NameLookup {
        for frame in self.frames.iter().rev() {
            let hits: Vec<&SymbolInfo> = frame.iter().filter_map(|t| t.get(name)).collect();
            match hits.len() {
                0 => continue,
                1 => return NameLookup::Unique(hits[0].clone()),
                _ => return NameLookup::Ambiguous(hits.iter().map(|s| s.store).collect()),
            }
        }
        NameLookup::Missing
    }

    fn lookup_in_store(&self, store: Store, name: &str) -> Option<&SymbolInfo> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame[store.index()].get(name))
    }

    fn has_user_symbol(&self, name: &str) -> bool {
        !matches!(self.lookup_name(name), NameLookup::Missing)
    }

    //--------------------------------------------------------------------------
    // Statements
    //--------------------------------------------------------------------------

    fn statements(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Declaration {
                store,
                name,
                annotation,
                init,
            } => self.declaration(*store, name, annotation.as_ref(), init.as_ref()),
            StmtKind::Assignment { target, op, value } => {
                self.assignment(target, *op, value);
            }
            StmtKind::Expression(expr) => {
                self.infer(expr);
            }
            StmtKind::Block(body) => self.statements(body),
            StmtKind::If {
                branches,
                else_body,
            } => {
                for (test, body) in branches {
                    self.infer(test);
                    self.statements(body);
                }
                if let Some(body) = else_body {
                    self.statements(body);
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.push_frame();
                if let Some(init) = init {
                    self.statement(init);
                }
                if let Some(test) = test {
                    self.infer(test);
                }
                if let Some(update) = update {
                    self.statement(update);
                }
                self.statements(body);
                self.pop_frame();
            }
            StmtKind::ForEach {
                store,
                binding,
                iterable,
                body,
            } => {
                let iterable_ty = self.infer(iterable);
                let element = match iterable_ty.widen() {
                    ForgeType::Array { element } => *element,
                    ForgeType::String => ForgeType::String,
                    _ => ForgeType::Any,
                };
                self.push_frame();
                self.declare(
                    SymbolInfo {
                        name: binding.name.clone(),
                        store: *store,
                        mutable: store.is_mutable(),
                        kind: SymbolKind::Variable,
                        ty: element,
                        annotation: None,
                        declared_at: binding.range,
                    },
                    binding.range,
                );
                self.statements(body);
                self.pop_frame();
            }
            StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => {
                self.infer(test);
                self.statements(body);
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => {
                self.statements(body);
                if let Some(clause) = catch {
                    self.push_frame();
                    if let Some(param) = &clause.param {
                        self.declare(
                            SymbolInfo {
                                name: param.name.clone(),
                                store: Store::L,
                                mutable: true,
                                kind: SymbolKind::Parameter,
                                ty: ForgeType::Any,
                                annotation: None,
                                declared_at: param.range,
                            },
                            param.range,
                        );
                    }
                    self.statements(&clause.body);
                    self.pop_frame();
                }
                if let Some(body) = finally {
                    self.statements(body);
                }
            }
            StmtKind::Function(decl) => self.function_declaration(decl),
            StmtKind::Return(value) => {
                let ty = match value {
                    Some(expr) => self.infer(expr),
                    None => ForgeType::Void,
                };
                if let Some(collected) = self.returns.last_mut() {
                    collected.push(ty);
                }
            }
            StmtKind::Throw(expr) => {
                self.infer(expr);
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Disable(names) => {
                for name in names {
                    self.modules.disable(&name.name);
                }
            }
            StmtKind::Enable(names) => {
                for name in names {
                    self.modules.enable(&name.name);
                }
            }
        }
    }

    fn declaration(
        &mut self,
        store: Store,
        name: &Ident,
        annotation: Option<&TypeExpr>,
        init: Option<&Expr>,
    ) {
        let annotated = annotation.map(annotation_type);
        let init_ty = init.map(|expr| (expr.range, self.infer(expr)));

        if let (Some(expected), Some((range, actual))) = (&annotated, &init_ty) {
            if !is_assignable(actual, expected) {
                self.report(Diagnostic::error(
                    "TYPE_MISMATCH",
                    format!("Type '{}' is not assignable to '{}'", actual, expected),
                    *range,
                ));
            }
        }

        let ty = match (&annotated, init_ty) {
            (Some(expected), _) => expected.clone(),
            (None, Some((_, actual))) if store == Store::C => actual,
            (None, Some((_, actual))) => actual.widen(),
            (None, None) => ForgeType::Any,
        };
        self.declare(
            SymbolInfo {
                name: name.name.clone(),
                store,
                mutable: store.is_mutable(),
                kind: SymbolKind::Variable,
                ty,
                annotation: annotated,
                declared_at: name.range,
            },
            name.range,
        );
    }

    fn assignment(&mut self, target: &Expr, op: AssignOp, value: &Expr) -> ForgeType {
        let target_symbol = match &target.kind {
            ExprKind::Identifier(_) | ExprKind::Namespaced { .. } => {
                self.infer(target);
                self.symbol_for(target)
            }
            _ => {
                self.infer(target);
                None
            }
        };
        let value_ty = self.infer(value);
        let assigned = match op.binary() {
            Some(bin) => {
                let current = self.types.get(&target.id).cloned().unwrap_or(ForgeType::Any);
                binary_type(bin, &current, &value_ty)
            }
            None => value_ty,
        };
        if let Some(expected) = target_symbol.and_then(|s| s.annotation) {
            if !is_assignable(&assigned, &expected) {
                self.report(Diagnostic::error(
                    "TYPE_MISMATCH",
                    format!("Type '{}' is not assignable to '{}'", assigned, expected),
                    value.range,
                ));
            }
        }
        assigned
    }

    /// Symbol a plain or namespaced reference resolves to, without reporting
    fn symbol_for(&self, expr: &Expr) -> Option<SymbolInfo> {
        match &expr.kind {
            ExprKind::Identifier(name) => match self.lookup_name(name) {
                NameLookup::Unique(symbol) => Some(symbol),
                _ => None,
            },
            ExprKind::Namespaced { store, name } => {
                self.lookup_in_store(*store, &name.name).cloned()
            }
            _ => None,
        }
    }

    fn function_declaration(&mut self, decl: &FunctionDecl) {
        let params: Vec<ForgeType> = decl.params.iter().map(param_type).collect();
        self.declare(
            SymbolInfo {
                name: decl.name.name.clone(),
                store: Store::C,
                mutable: false,
                kind: SymbolKind::Function,
                ty: ForgeType::function(params.clone(), ForgeType::Any),
                annotation: None,
                declared_at: decl.name.range,
            },
            decl.name.range,
        );
        let returns = self.function_body(&decl.params, |r| {
            r.statements(&decl.body);
            None
        });
        self.update_type(
            Store::C,
            &decl.name.name,
            ForgeType::function(params, returns),
        );
    }

    /// Resolve a function body in its own frame and return the unified
    /// return type. `body` may hand back the type of an expression body.
    fn function_body<F>(&mut self, params: &[Param], body: F) -> ForgeType
    where
        F: FnOnce(&mut Self) -> Option<ForgeType>,
    {
        self.push_frame();
        for param in params {
            self.declare(
                SymbolInfo {
                    name: param.name.name.clone(),
                    store: Store::L,
                    mutable: true,
                    kind: SymbolKind::Parameter,
                    ty: param_type(param),
                    annotation: param.annotation.as_ref().map(annotation_type),
                    declared_at: param.name.range,
                },
                param.name.range,
            );
        }
        self.returns.push(Vec::new());
        let expr_ty = body(self);
        let collected = self.returns.pop().unwrap_or_default();
        self.pop_frame();

        if let Some(ty) = expr_ty {
            return ty;
        }
        collected
            .iter()
            .fold(None, |acc: Option<ForgeType>, ty| {
                Some(match acc {
                    Some(prev) => unify(&prev, ty),
                    None => ty.clone(),
                })
            })
            .unwrap_or(ForgeType::Void)
    }

    //--------------------------------------------------------------------------
    // Expressions
    //--------------------------------------------------------------------------

    /// Infer and record the type of `expr`
    pub fn infer(&mut self, expr: &Expr) -> ForgeType {
        let ty = self.infer_kind(expr);
        self.types.insert(expr.id, ty.clone());
        ty
    }

    fn infer_kind(&mut self, expr: &Expr) -> ForgeType {
        match &expr.kind {
            ExprKind::Number(n) => ForgeType::literal_number(*n),
            ExprKind::Str(s) => ForgeType::literal_string(s.clone()),
            ExprKind::Boolean(b) => ForgeType::literal_boolean(*b),
            ExprKind::Null => ForgeType::Null,
            ExprKind::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Expr(inner) = part {
                        self.infer(inner);
                    }
                }
                ForgeType::String
            }
            ExprKind::Identifier(name) => self.identifier(name, expr.range),
            ExprKind::Namespaced { store, name } => {
                match self.lookup_in_store(*store, &name.name) {
                    Some(symbol) => symbol.ty.clone(),
                    None => {
                        self.report(
                            Diagnostic::error(
                                "UNDEFINED_IN_NAMESPACE",
                                format!(
                                    "'{}' is not declared in the {} store",
                                    name.name,
                                    store.keyword()
                                ),
                                expr.range,
                            )
                            .with_hint(format!(
                                "Declare it with {} {} = ...",
                                store.keyword(),
                                name.name
                            )),
                        );
                        ForgeType::Any
                    }
                }
            }
            ExprKind::Member { object, property } => self.member(expr, object, property),
            ExprKind::Index { object, index } => {
                let object_ty = self.infer(object);
                self.infer(index);
                match object_ty.widen() {
                    ForgeType::Array { element } => *element,
                    ForgeType::String => ForgeType::String,
                    _ => ForgeType::Any,
                }
            }
            ExprKind::Call { callee, args } => self.call(callee, args),
            ExprKind::Assign { target, op, value } => self.assignment(target, *op, value),
            ExprKind::Unary { op, operand } => {
                self.infer(operand);
                match op {
                    UnaryOp::Not => ForgeType::Boolean,
                    UnaryOp::Neg | UnaryOp::Plus => ForgeType::Number,
                }
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.infer(left);
                let r = self.infer(right);
                binary_type(*op, &l, &r)
            }
            ExprKind::Logical { left, right, .. } => {
                let l = self.infer(left);
                let r = self.infer(right);
                unify(&l.widen(), &r.widen())
            }
            ExprKind::Await(inner) => self.infer(inner),
            ExprKind::Function { params, body, .. } => {
                let param_types: Vec<ForgeType> = params.iter().map(param_type).collect();
                let returns = self.function_body(params, |r| match body {
                    FunctionBody::Block(stmts) => {
                        r.statements(stmts);
                        None
                    }
                    FunctionBody::Expr(value) => Some(r.infer(value)),
                });
                ForgeType::function(param_types, returns)
            }
            ExprKind::Object(props) => {
                let mut shape = BTreeMap::new();
                for prop in props {
                    let ty = self.infer(&prop.value).widen();
                    shape.insert(prop.key.name.clone(), ty);
                }
                ForgeType::object(shape, false)
            }
            ExprKind::Array(items) => {
                let mut element: Option<ForgeType> = None;
                for item in items {
                    let ty = self.infer(item).widen();
                    element = Some(match element {
                        Some(prev) => unify(&prev, &ty),
                        None => ty,
                    });
                }
                ForgeType::array(element.unwrap_or(ForgeType::Any))
            }
        }
    }

    fn identifier(&mut self, name: &str, range: Range) -> ForgeType {
        match self.lookup_name(name) {
            NameLookup::Unique(symbol) => symbol.ty,
            NameLookup::Ambiguous(stores) => {
                let listed: Vec<&str> = stores.iter().map(|s| s.prefix()).collect();
                let qualified: Vec<String> =
                    stores.iter().map(|s| format!("{}.{}", s, name)).collect();
                self.report(
                    Diagnostic::error(
                        "AMBIGUOUS_VARIABLE",
                        format!(
                            "'{}' is declared in stores {}; qualify the reference",
                            name,
                            listed.join(", ")
                        ),
                        range,
                    )
                    .with_hint(format!("Use {}", qualified.join(" or "))),
                );
                ForgeType::Any
            }
            NameLookup::Missing => {
                if let Some(root) = self.catalog.root(name) {
                    self.check_gate(name, range);
                    return root.ty();
                }
                self.report(Diagnostic::error(
                    "UNDEFINED_VARIABLE",
                    format!("'{}' is not defined", name),
                    range,
                ));
                ForgeType::Any
            }
        }
    }

    /// Report `MODULE_NOT_ENABLED` when `root` names a gated-off module
    fn check_gate(&mut self, root: &str, range: Range) {
        let Some(module) = Module::from_name(root) else {
            return;
        };
        if self.modules.is_enabled(module) {
            return;
        }
        self.gated_uses.insert(range.start.offset);
        if !self.options.ignore_module_gating {
            self.report(
                Diagnostic::error(
                    "MODULE_NOT_ENABLED",
                    format!("Module '{}' is not enabled", module),
                    range,
                )
                .with_hint(format!("Add able '{}'; before using it", module)),
            );
        }
    }

    fn member(&mut self, expr: &Expr, object: &Expr, property: &Ident) -> ForgeType {
        if let Some(path) = expr.member_path() {
            if self.catalog.is_root(path.root) && !self.has_user_symbol(path.root) {
                return self.builtin_chain(object, &path);
            }
        }
        let object_ty = self.infer(object);
        self.property_type(&object_ty, property)
    }

    /// Type of `Root.a.b...` read from the catalog. The gate is checked once
    /// at the root.
    fn builtin_chain(&mut self, object: &Expr, path: &MemberPath<'_>) -> ForgeType {
        self.check_gate(path.root, path.root_range);
        let names = path.names();
        let ty = match self.catalog.lookup(path.root, &names) {
            Some(Lookup::Found(entry)) => entry.ty(),
            Some(Lookup::Missing { parent, index }) => {
                let segment = path.segments[index];
                self.report(Diagnostic::warning(
                    "UNKNOWN_MODULE_MEMBER",
                    format!("'{}' has no member '{}'", parent.path, segment.name),
                    segment.range,
                ));
                ForgeType::Any
            }
            Some(Lookup::PastLeaf { leaf, index }) => {
                let mut ty = leaf.ty();
                for segment in &path.segments[index..] {
                    ty = self.property_type(&ty, segment);
                }
                ty
            }
            None => ForgeType::Any,
        };
        self.types.insert(object.id, ForgeType::Any);
        ty
    }

    fn property_type(&mut self, object_ty: &ForgeType, property: &Ident) -> ForgeType {
        let severity = self.member_severity();
        match object_ty {
            ForgeType::Any | ForgeType::Unknown | ForgeType::Union { .. } => ForgeType::Any,
            ForgeType::Function { .. } => ForgeType::Any,
            ForgeType::Object { props, open } => match props.get(&property.name) {
                Some(ty) => ty.clone(),
                None if *open => ForgeType::Any,
                None => {
                    if let Some(ty) = method_type(object_ty, &property.name) {
                        return ty;
                    }
                    self.report(Diagnostic::new(
                        severity,
                        "PROPERTY_NOT_FOUND",
                        format!("Property '{}' does not exist on '{}'", property.name, object_ty),
                        property.range,
                    ));
                    ForgeType::Any
                }
            },
            ForgeType::String
            | ForgeType::LiteralString { .. }
            | ForgeType::Array { .. } => match method_type(object_ty, &property.name) {
                Some(ty) => ty,
                None => {
                    self.report(Diagnostic::new(
                        severity,
                        "PROPERTY_NOT_FOUND",
                        format!(
                            "Property '{}' does not exist on '{}'",
                            property.name,
                            object_ty.widen()
                        ),
                        property.range,
                    ));
                    ForgeType::Any
                }
            },
            _ => {
                self.report(Diagnostic::new(
                    severity,
                    "PROPERTY_ON_NON_OBJECT",
                    format!(
                        "Cannot read '{}' on a value of type '{}'",
                        property.name,
                        object_ty.widen()
                    ),
                    property.range,
                ));
                ForgeType::Any
            }
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> ForgeType {
        let callee_ty = self.infer(callee);
        let arg_types: Vec<ForgeType> = args.iter().map(|a| self.infer(a)).collect();
        let ForgeType::Function { params, returns } = &callee_ty else {
            return ForgeType::Any;
        };

        let user_function = matches!(
            callee.kind,
            ExprKind::Identifier(_) | ExprKind::Namespaced { .. }
        ) && self.symbol_for(callee).is_some();
        if user_function {
            if params.len() != args.len() {
                self.report(Diagnostic::warning(
                    "ARGUMENT_COUNT_MISMATCH",
                    format!(
                        "Expected {} argument(s), got {}",
                        params.len(),
                        args.len()
                    ),
                    callee.range,
                ));
            }
            for ((param, arg_ty), arg) in params.iter().zip(&arg_types).zip(args) {
                if !is_assignable(arg_ty, param) {
                    self.report(Diagnostic::error(
                        "ARGUMENT_TYPE_MISMATCH",
                        format!(
                            "Argument of type '{}' is not assignable to parameter of type '{}'",
                            arg_ty, param
                        ),
                        arg.range,
                    ));
                }
            }
        }
        returns.as_ref().clone()
    }
}

//==============================================================================
// Type helpers
//==============================================================================

fn annotation_type(annotation: &TypeExpr) -> ForgeType {
    match annotation {
        TypeExpr::Named(name) => match name.as_str() {
            "any" => ForgeType::Any,
            "unknown" => ForgeType::Unknown,
            "void" => ForgeType::Void,
            "null" => ForgeType::Null,
            "boolean" => ForgeType::Boolean,
            "number" => ForgeType::Number,
            "string" => ForgeType::String,
            "object" => ForgeType::object(BTreeMap::new(), true),
            _ => ForgeType::Any,
        },
        TypeExpr::Array(inner) => ForgeType::array(annotation_type(inner)),
        TypeExpr::Union(members) => ForgeType::union(members.iter().map(annotation_type)),
    }
}

fn param_type(param: &Param) -> ForgeType {
    param
        .annotation
        .as_ref()
        .map(annotation_type)
        .unwrap_or(ForgeType::Any)
}

/// Result type of a binary operator over the given operand types
pub(crate) fn binary_type(op: BinaryOp, left: &ForgeType, right: &ForgeType) -> ForgeType {
    if op.is_comparison() {
        return ForgeType::Boolean;
    }
    let (l, r) = (left.widen(), right.widen());
    match op {
        BinaryOp::Add => match (&l, &r) {
            (ForgeType::String, _) | (_, ForgeType::String) => ForgeType::String,
            (ForgeType::Number, ForgeType::Number) => ForgeType::Number,
            _ => ForgeType::Any,
        },
        _ => ForgeType::Number,
    }
}

/// Type of a builtin method or property on strings and arrays
pub(crate) fn method_type(receiver: &ForgeType, name: &str) -> Option<ForgeType> {
    let f = ForgeType::function;
    let (num, text, boolean, any) = (
        ForgeType::Number,
        ForgeType::String,
        ForgeType::Boolean,
        ForgeType::Any,
    );
    match receiver.widen() {
        ForgeType::String => Some(match name {
            "length" => num,
            "toUpperCase" | "toLowerCase" | "trim" => f(vec![], text),
            "split" => f(vec![text.clone()], ForgeType::array(text)),
            "includes" => f(vec![text], boolean),
            "indexOf" => f(vec![text], num),
            "slice" => f(vec![num.clone(), num], text),
            _ => return None,
        }),
        ForgeType::Array { element } => {
            let element = *element;
            let callback = f(vec![element.clone()], any.clone());
            Some(match name {
                "length" => num,
                "push" => f(vec![element], num),
                "pop" => f(vec![], element),
                "join" => f(vec![text.clone()], text),
                "includes" => f(vec![element], boolean),
                "indexOf" => f(vec![element], num),
                "slice" => f(vec![num.clone(), num], ForgeType::array(element)),
                "map" => f(vec![callback], ForgeType::array(any)),
                "filter" => f(vec![callback], ForgeType::array(element)),
                "forEach" => f(vec![callback], ForgeType::Void),
                _ => return None,
            })
        }
        ForgeType::Object { .. } => match name {
            "keys" => Some(f(vec![], ForgeType::array(text))),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;

    fn analyze(source: &str) -> (SemanticState, Vec<Diagnostic>) {
        let program = parse_source(source).unwrap();
        resolve(&program, AnalysisOptions::default())
    }

    fn codes(diags: &[Diagnostic]) -> Vec<&str> {
        diags.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn test_ambiguous_bare_reference() {
        let (_, diags) = analyze("let dog = 1; var dog = 2; dog;");
        assert_eq!(codes(&diags), vec!["AMBIGUOUS_VARIABLE"]);
        assert!(diags[0].message.contains("l, v"));

        let (_, diags) = analyze("let dog = 1; var dog = 2; l.dog;");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_duplicate_declaration_at_second() {
        let source = "let dog = 1;\nlet dog = 1;";
        let (_, diags) = analyze(source);
        assert_eq!(codes(&diags), vec!["DUPLICATE_DECLARATION"]);
        assert_eq!(diags[0].range.start.line, 1);
        assert_eq!(diags[0].range.start.column, 4);
    }

    #[test]
    fn test_undefined_and_namespace_misses() {
        let (_, diags) = analyze("cat; let x = 1; v.x;");
        assert_eq!(codes(&diags), vec!["UNDEFINED_VARIABLE", "UNDEFINED_IN_NAMESPACE"]);
    }

    #[test]
    fn test_forward_only_resolution() {
        let (_, diags) = analyze("x; let x = 1;");
        assert_eq!(codes(&diags), vec!["UNDEFINED_VARIABLE"]);
    }

    #[test]
    fn test_module_gating() {
        let (_, diags) = analyze("disable 'AllInOne'; able 'Math'; let a = Math.PI;");
        assert!(diags.is_empty());

        let (_, diags) = analyze("disable 'AllInOne'; able 'Math'; let b = Sys.cpu.cores();");
        assert_eq!(codes(&diags), vec!["MODULE_NOT_ENABLED"]);
        assert!(diags[0].message.contains("Sys"));
        assert!(diags[0].hint.is_some());
    }

    #[test]
    fn test_ignore_module_gating() {
        let program = parse_source("disable 'AllInOne'; Sys.pid();").unwrap();
        let (_, diags) = resolve(
            &program,
            AnalysisOptions {
                ignore_module_gating: true,
                ..Default::default()
            },
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_unknown_module_member() {
        let (_, diags) = analyze("Math.tau;");
        assert_eq!(codes(&diags), vec!["UNKNOWN_MODULE_MEMBER"]);
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn test_property_checks() {
        let (_, diags) = analyze("const p = { name: 'a' }; p.name; p.age; let n = 1; n.x;");
        assert_eq!(codes(&diags), vec!["PROPERTY_NOT_FOUND", "PROPERTY_ON_NON_OBJECT"]);

        let program = parse_source("let n = 1; n.x;").unwrap();
        let (_, diags) = resolve(
            &program,
            AnalysisOptions {
                relaxed_member_access: true,
                ..Default::default()
            },
        );
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn test_string_and_array_members() {
        let (_, diags) = analyze("let s = 'a'; s.length; s.toUpperCase(); let xs = [1]; xs.push(2);");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_declared_types() {
        let (state, _) = analyze("let a = 'x'; const b = 'x'; let c = [1, 2]; let d: number | null = null;");
        let syms = &state.symbols;
        assert_eq!(syms.get(Store::L, "a").unwrap().ty, ForgeType::String);
        assert_eq!(
            syms.get(Store::C, "b").unwrap().ty,
            ForgeType::literal_string("x")
        );
        assert_eq!(
            syms.get(Store::L, "c").unwrap().ty,
            ForgeType::array(ForgeType::Number)
        );
        assert_eq!(
            syms.get(Store::L, "d").unwrap().ty,
            ForgeType::union([ForgeType::Number, ForgeType::Null])
        );
    }

    #[test]
    fn test_type_mismatch() {
        let (_, diags) = analyze("let a: number = 'x'; let b: string = 'ok'; b = 3;");
        assert_eq!(codes(&diags), vec!["TYPE_MISMATCH", "TYPE_MISMATCH"]);
    }

    #[test]
    fn test_function_types_and_arguments() {
        let (state, diags) = analyze(
            "function twice(n: number) { return n * 2; } twice('a'); twice(1, 2);",
        );
        assert_eq!(
            state.symbols.get(Store::C, "twice").unwrap().ty,
            ForgeType::function(vec![ForgeType::Number], ForgeType::Number)
        );
        assert_eq!(
            codes(&diags),
            vec!["ARGUMENT_TYPE_MISMATCH", "ARGUMENT_COUNT_MISMATCH"]
        );
    }

    #[test]
    fn test_function_frames() {
        let (state, diags) =
            analyze("function fact(n) { if (n < 2) { return 1; } return n * fact(n - 1); } n;");
        assert_eq!(codes(&diags), vec!["UNDEFINED_VARIABLE"]);
        assert!(state.symbols.get(Store::L, "n").is_none());
        assert!(state.symbols.global.contains_key("n"));
    }

    #[test]
    fn test_branch_returns_unify() {
        let (state, _) =
            analyze("function pick(f) { if (f) { return 'yes'; } return 1; }");
        let ty = &state.symbols.get(Store::C, "pick").unwrap().ty;
        assert_eq!(
            ty,
            &ForgeType::function(
                vec![ForgeType::Any],
                ForgeType::union([ForgeType::literal_string("yes"), ForgeType::literal_number(1.0)])
            )
        );
    }

    #[test]
    fn test_for_each_and_catch_frames() {
        let (_, diags) = analyze(
            "for (const item of [1, 2]) { item.toFixed; } try { } catch (e) { e.message; } item;",
        );
        assert_eq!(
            codes(&diags),
            vec!["PROPERTY_ON_NON_OBJECT", "UNDEFINED_VARIABLE"]
        );
    }

    #[test]
    fn test_type_map_records_visited_nodes() {
        let program = parse_source("let a = 1 + 2;").unwrap();
        let (state, _) = resolve(&program, AnalysisOptions::default());
        if let StmtKind::Declaration { init: Some(e), .. } = &program.body[0].kind {
            assert_eq!(state.type_of(e.id), Some(&ForgeType::Number));
        } else {
            panic!("expected declaration");
        }
    }
}
