//! Tree-walking evaluator
//!
//! Executes a resolved [`Program`] statement by statement. Scopes mirror the
//! resolver: function bodies, `for` headers and `catch` clauses open a frame,
//! every frame holds the three stores. Side effects go through the [`Host`].

use indexmap::IndexMap;
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use thiserror::Error;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::host::Host;
use super::value::Value;
use crate::config::RunOptions;
use crate::diagnostics::Range;
use crate::intel::catalog::{Catalog, EntryKind};
use crate::semantic::{Module, ModuleContext};
use crate::syntax::ast::{
    AssignOp, BinaryOp, Expr, ExprKind, FunctionBody, LogicalOp, Param, Program, Stmt, StmtKind,
    Store, TemplatePart, UnaryOp,
};

/// Nested user-function calls allowed before execution stops
pub const MAX_CALL_DEPTH: usize = 128;

pub const RUNTIME_ERROR: &str = "RUNTIME_ERROR";
pub const EXECUTION_LIMIT_EXCEEDED: &str = "EXECUTION_LIMIT_EXCEEDED";

/// A user function together with the frame it was created in
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<FunctionBody>,
    env: Env,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub(super) struct Frame {
    stores: [IndexMap<String, Value>; 3],
    parent: Option<Env>,
}

pub(super) type Env = Rc<RefCell<Frame>>;

impl Frame {
    fn child(parent: &Env) -> Env {
        Rc::new(RefCell::new(Frame {
            stores: Default::default(),
            parent: Some(Rc::clone(parent)),
        }))
    }
}

/// Error that stops execution
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "{message} at line {}, column {}",
    .range.start.line + 1,
    .range.start.column + 1
)]
pub struct ExecError {
    pub code: &'static str,
    pub message: String,
    pub range: Range,
}

impl ExecError {
    pub fn new(message: impl Into<String>, range: Range) -> Self {
        Self {
            code: RUNTIME_ERROR,
            message: message.into(),
            range,
        }
    }

    pub fn limit(message: impl Into<String>, range: Range) -> Self {
        Self {
            code: EXECUTION_LIMIT_EXCEEDED,
            message: message.into(),
            range,
        }
    }

    /// Limit errors cannot be caught by `try`
    pub fn is_catchable(&self) -> bool {
        self.code == RUNTIME_ERROR
    }
}

/// Statement that was not executed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedStatement {
    pub reason: String,
    pub range: Range,
}

/// Non-local exits while unwinding the tree
pub(super) enum Unwind {
    Thrown(Value, Range),
    Error(ExecError),
}

impl From<ExecError> for Unwind {
    fn from(err: ExecError) -> Self {
        Unwind::Error(err)
    }
}

pub(super) type Exec<T> = Result<T, Unwind>;

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Evaluator<'h> {
    pub(super) host: &'h mut dyn Host,
    env: Env,
    modules: ModuleContext,
    enforce_gating: bool,
    pub(super) output: Vec<String>,
    pub(super) errors: Vec<String>,
    skipped: Vec<SkippedStatement>,
    steps: u64,
    max_steps: Option<u64>,
    timeout_ms: Option<u64>,
    deadline: Option<Instant>,
    verbose: bool,
    depth: usize,
    /// Frame rate for animated terminal output
    pub(super) fps: f64,
}

impl<'h> Evaluator<'h> {
    pub fn new(host: &'h mut dyn Host, options: &RunOptions) -> Self {
        Self {
            host,
            env: Rc::new(RefCell::new(Frame::default())),
            modules: ModuleContext::default(),
            enforce_gating: !options.ignore_module_gating,
            output: Vec::new(),
            errors: Vec::new(),
            skipped: Vec::new(),
            steps: 0,
            max_steps: options.max_steps,
            timeout_ms: options.timeout_ms,
            deadline: None,
            verbose: options.verbose,
            depth: 0,
            fps: 10.0,
        }
    }

    /// Whether calls into gated modules are checked against the directives
    pub fn with_gating(mut self, enforce: bool) -> Self {
        self.enforce_gating = enforce;
        self
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn skipped(&self) -> &[SkippedStatement] {
        &self.skipped
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Value of a top-level binding, for embedding and tests
    pub fn global(&self, store: Store, name: &str) -> Option<Value> {
        let frame = self.env.borrow();
        frame.stores[store.index()].get(name).cloned()
    }

    /// Execute top-level statements in order
    pub fn run(&mut self, program: &Program) -> Result<(), ExecError> {
        self.deadline = self
            .timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        for stmt in &program.body {
            match &stmt.kind {
                StmtKind::Disable(names) => {
                    self.tick(stmt)?;
                    for module in names {
                        self.modules.disable(&module.name);
                    }
                }
                StmtKind::Enable(names) => {
                    self.tick(stmt)?;
                    for module in names {
                        self.modules.enable(&module.name);
                    }
                }
                _ => match self.exec_stmt(stmt) {
                    Ok(Flow::Return(_)) => break,
                    Ok(_) => {}
                    Err(Unwind::Error(err)) => return Err(err),
                    Err(Unwind::Thrown(value, range)) => {
                        return Err(ExecError::new(
                            format!("Uncaught exception: {}", value),
                            range,
                        ))
                    }
                },
            }
        }
        Ok(())
    }

    fn tick(&mut self, stmt: &Stmt) -> Result<(), ExecError> {
        self.steps += 1;
        if let Some(max) = self.max_steps {
            if self.steps > max {
                return Err(ExecError::limit(
                    format!("Execution exceeded the limit of {} steps", max),
                    stmt.range,
                ));
            }
        }
        if let (Some(deadline), Some(ms)) = (self.deadline, self.timeout_ms) {
            if Instant::now() >= deadline {
                return Err(ExecError::limit(
                    format!("Execution exceeded the time limit of {} ms", ms),
                    stmt.range,
                ));
            }
        }
        if self.verbose {
            debug!(
                step = self.steps,
                line = stmt.range.start.line + 1,
                statement = statement_name(&stmt.kind),
                "executing"
            );
        }
        Ok(())
    }

    pub(super) fn print(&mut self, line: String) {
        self.host.write_out(&line);
        self.output.push(line);
    }

    pub(super) fn print_error(&mut self, line: String) {
        self.host.write_err(&line);
        self.errors.push(line);
    }

    pub(super) fn check_module(&self, module: Module, range: Range) -> Result<(), ExecError> {
        if self.enforce_gating && !self.modules.is_enabled(module) {
            return Err(ExecError::new(
                format!("Module '{}' is not enabled", module),
                range,
            ));
        }
        Ok(())
    }

    //==========================================================================
    // Statements
    //==========================================================================

    fn exec_block(&mut self, body: &[Stmt]) -> Exec<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    /// Run `f` inside a fresh child frame
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Exec<T>) -> Exec<T> {
        let frame = Frame::child(&self.env);
        let saved = std::mem::replace(&mut self.env, frame);
        let result = f(self);
        self.env = saved;
        result
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Exec<Flow> {
        self.tick(stmt)?;
        match &stmt.kind {
            StmtKind::Declaration {
                store, name, init, ..
            } => {
                let value = match init {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                self.declare(*store, &name.name, value);
                Ok(Flow::Normal)
            }
            StmtKind::Assignment { target, op, value } => {
                self.assign(target, *op, value)?;
                Ok(Flow::Normal)
            }
            StmtKind::Expression(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            StmtKind::Block(body) => self.exec_block(body),
            StmtKind::If {
                branches,
                else_body,
            } => {
                for (test, body) in branches {
                    if self.eval(test)?.is_truthy() {
                        return self.exec_block(body);
                    }
                }
                match else_body {
                    Some(body) => self.exec_block(body),
                    None => Ok(Flow::Normal),
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => self.scoped(|ev| {
                if let Some(init) = init {
                    ev.exec_stmt(init)?;
                }
                loop {
                    if let Some(test) = test {
                        if !ev.eval(test)?.is_truthy() {
                            break;
                        }
                    }
                    match ev.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    match update {
                        Some(update) => {
                            ev.exec_stmt(update)?;
                        }
                        None => ev.tick(stmt)?,
                    }
                }
                Ok(Flow::Normal)
            }),
            StmtKind::ForEach {
                store,
                binding,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable)? {
                    Value::Array(items) => items,
                    Value::Text(s) => s.chars().map(|c| Value::Text(c.to_string())).collect(),
                    Value::Object(map) => map.into_keys().map(Value::Text).collect(),
                    other => {
                        return Err(ExecError::new(
                            format!("Cannot iterate over {}", other.type_name()),
                            iterable.range,
                        )
                        .into())
                    }
                };
                self.scoped(|ev| {
                    for item in items {
                        ev.tick(stmt)?;
                        ev.declare(*store, &binding.name, item);
                        match ev.exec_block(body)? {
                            Flow::Break => break,
                            Flow::Return(value) => return Ok(Flow::Return(value)),
                            Flow::Normal | Flow::Continue => {}
                        }
                    }
                    Ok(Flow::Normal)
                })
            }
            StmtKind::While { test, body } => {
                loop {
                    if !self.eval(test)?.is_truthy() {
                        break;
                    }
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    self.tick(stmt)?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::DoWhile { body, test } => {
                loop {
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(test)?.is_truthy() {
                        break;
                    }
                    self.tick(stmt)?;
                }
                Ok(Flow::Normal)
            }
            StmtKind::Try {
                body,
                catch,
                finally,
            } => {
                let outcome = match (self.exec_block(body), catch) {
                    (Err(Unwind::Thrown(value, _)), Some(clause)) => {
                        self.run_catch(clause.param.as_ref().map(|p| p.name.as_str()), &clause.body, value)
                    }
                    (Err(Unwind::Error(err)), Some(clause)) if err.is_catchable() => self
                        .run_catch(
                            clause.param.as_ref().map(|p| p.name.as_str()),
                            &clause.body,
                            Value::Text(err.message),
                        ),
                    (other, _) => other,
                };
                if let Some(finally) = finally {
                    match self.exec_block(finally)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                outcome
            }
            StmtKind::Function(decl) => {
                let closure = self.make_closure(
                    Some(decl.name.name.clone()),
                    &decl.params,
                    FunctionBody::Block(decl.body.clone()),
                );
                self.declare(Store::C, &decl.name.name, closure);
                Ok(Flow::Normal)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Throw(expr) => {
                let value = self.eval(expr)?;
                Err(Unwind::Thrown(value, stmt.range))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Disable(_) | StmtKind::Enable(_) => {
                debug!(line = stmt.range.start.line + 1, "skipping nested module directive");
                self.skipped.push(SkippedStatement {
                    reason: "Module directives only take effect at the top level".to_string(),
                    range: stmt.range,
                });
                Ok(Flow::Normal)
            }
        }
    }

    fn run_catch(&mut self, param: Option<&str>, body: &[Stmt], value: Value) -> Exec<Flow> {
        self.scoped(|ev| {
            if let Some(name) = param {
                ev.declare(Store::L, name, value);
            }
            ev.exec_block(body)
        })
    }

    fn make_closure(&self, name: Option<String>, params: &[Param], body: FunctionBody) -> Value {
        Value::Function(Rc::new(Closure {
            name,
            params: params.iter().map(|p| p.name.name.clone()).collect(),
            body: Rc::new(body),
            env: Rc::clone(&self.env),
        }))
    }

    //==========================================================================
    // Bindings
    //==========================================================================

    fn declare(&mut self, store: Store, name: &str, value: Value) {
        self.env.borrow_mut().stores[store.index()].insert(name.to_string(), value);
    }

    /// Innermost frame binding `name`, restricted to `store` when given.
    /// The first frame with any hit decides.
    fn find_binding(
        &self,
        name: &str,
        store: Option<Store>,
        range: Range,
    ) -> Result<Option<(Env, Store)>, ExecError> {
        let candidates: Vec<Store> = store.map_or_else(|| Store::ALL.to_vec(), |s| vec![s]);
        let mut current = Some(Rc::clone(&self.env));
        while let Some(frame) = current {
            let hits: Vec<Store> = {
                let f = frame.borrow();
                candidates
                    .iter()
                    .copied()
                    .filter(|s| f.stores[s.index()].contains_key(name))
                    .collect()
            };
            match hits.as_slice() {
                [] => {
                    let parent = frame.borrow().parent.clone();
                    current = parent;
                }
                [found] => return Ok(Some((frame, *found))),
                _ => {
                    let stores: Vec<&str> = hits.iter().map(|s| s.prefix()).collect();
                    return Err(ExecError::new(
                        format!(
                            "'{}' is declared in stores {}; qualify the reference",
                            name,
                            stores.join(", ")
                        ),
                        range,
                    ));
                }
            }
        }
        Ok(None)
    }

    fn read_binding(frame: &Env, store: Store, name: &str) -> Value {
        let value = frame.borrow().stores[store.index()].get(name).cloned();
        value.unwrap_or(Value::Null)
    }

    fn lookup_variable(&self, name: &str, range: Range) -> Result<Value, ExecError> {
        if let Some((frame, store)) = self.find_binding(name, None, range)? {
            return Ok(Self::read_binding(&frame, store, name));
        }
        if Catalog::global().is_root(name) {
            if let Some(module) = Module::from_name(name) {
                self.check_module(module, range)?;
            }
            return Ok(Value::Namespace(name.to_string()));
        }
        Err(ExecError::new(format!("'{}' is not defined", name), range))
    }

    fn lookup_in_store(&self, store: Store, name: &str, range: Range) -> Result<Value, ExecError> {
        match self.find_binding(name, Some(store), range)? {
            Some((frame, store)) => Ok(Self::read_binding(&frame, store, name)),
            None => Err(ExecError::new(
                format!("'{}.{}' is not defined", store.prefix(), name),
                range,
            )),
        }
    }

    fn assign(&mut self, target: &Expr, op: AssignOp, value: &Expr) -> Exec<Value> {
        let rhs = self.eval(value)?;
        let new_value = match op.binary() {
            None => rhs,
            Some(binary) => {
                let current = self.eval(target)?;
                binary_op(binary, &current, &rhs)
                    .map_err(|message| ExecError::new(message, target.range.cover(value.range)))?
            }
        };
        self.store_into(target, new_value.clone(), false)?;
        Ok(new_value)
    }

    /// Write `value` to an assignable expression. Containers are values, so
    /// member and index writes rebuild the container and store it back.
    /// `nested` is set for those write-backs; a constant binding may have
    /// its contents changed but not be rebound.
    pub(super) fn store_into(&mut self, target: &Expr, value: Value, nested: bool) -> Exec<()> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                let binding = self.find_binding(name, None, target.range)?;
                let Some((frame, store)) = binding else {
                    return Err(
                        ExecError::new(format!("'{}' is not defined", name), target.range).into(),
                    );
                };
                self.write_binding(&frame, store, name, value, nested, target.range)
            }
            ExprKind::Namespaced { store, name } => {
                let binding = self.find_binding(&name.name, Some(*store), target.range)?;
                let Some((frame, store)) = binding else {
                    return Err(ExecError::new(
                        format!("'{}.{}' is not defined", store.prefix(), name.name),
                        target.range,
                    )
                    .into());
                };
                self.write_binding(&frame, store, &name.name, value, nested, target.range)
            }
            ExprKind::Member { object, property } => {
                let mut container = self.eval(object)?;
                match &mut container {
                    Value::Object(map) => {
                        map.insert(property.name.clone(), value);
                    }
                    other => {
                        return Err(ExecError::new(
                            format!(
                                "Cannot set property '{}' on {}",
                                property.name,
                                other.type_name()
                            ),
                            target.range,
                        )
                        .into())
                    }
                }
                self.store_into(object, container, true)
            }
            ExprKind::Index { object, index } => {
                let mut container = self.eval(object)?;
                let key = self.eval(index)?;
                match &mut container {
                    Value::Array(items) => {
                        let slot = array_slot(&key, items.len() + 1).ok_or_else(|| {
                            ExecError::new(
                                format!("Index {} is out of bounds", key),
                                index.range,
                            )
                        })?;
                        if slot == items.len() {
                            items.push(value);
                        } else {
                            items[slot] = value;
                        }
                    }
                    Value::Object(map) => {
                        map.insert(key.as_text(), value);
                    }
                    other => {
                        return Err(ExecError::new(
                            format!("Cannot index into {}", other.type_name()),
                            target.range,
                        )
                        .into())
                    }
                }
                self.store_into(object, container, true)
            }
            _ => Err(ExecError::new("Invalid assignment target", target.range).into()),
        }
    }

    fn write_binding(
        &mut self,
        frame: &Env,
        store: Store,
        name: &str,
        value: Value,
        nested: bool,
        range: Range,
    ) -> Exec<()> {
        if !store.is_mutable() && !nested {
            return Err(ExecError::new(
                format!("Cannot assign to constant '{}'", name),
                range,
            )
            .into());
        }
        frame.borrow_mut().stores[store.index()].insert(name.to_string(), value);
        Ok(())
    }

    //==========================================================================
    // Expressions
    //==========================================================================

    pub(super) fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Text(s.clone())),
            ExprKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Identifier(name) => Ok(self.lookup_variable(name, expr.range)?),
            ExprKind::Namespaced { store, name } => {
                Ok(self.lookup_in_store(*store, &name.name, expr.range)?)
            }
            ExprKind::Member { object, property } => {
                let target = self.eval(object)?;
                Ok(self.get_property(target, &property.name, expr.range)?)
            }
            ExprKind::Index { object, index } => {
                let target = self.eval(object)?;
                let key = self.eval(index)?;
                Ok(get_index(target, &key, expr.range)?)
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args, expr.range),
            ExprKind::Assign { target, op, value } => self.assign(target, *op, value),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(unary_op(*op, &value).map_err(|m| ExecError::new(m, expr.range))?)
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                Ok(binary_op(*op, &l, &r).map_err(|m| ExecError::new(m, expr.range))?)
            }
            ExprKind::Logical { op, left, right } => {
                let l = self.eval(left)?;
                match op {
                    LogicalOp::And if !l.is_truthy() => Ok(l),
                    LogicalOp::Or if l.is_truthy() => Ok(l),
                    LogicalOp::Coalesce if !l.is_null() => Ok(l),
                    _ => self.eval(right),
                }
            }
            // Operands are already values once evaluated
            ExprKind::Await(inner) => self.eval(inner),
            ExprKind::Function { params, body, .. } => {
                Ok(self.make_closure(None, params, body.clone()))
            }
            ExprKind::Object(properties) => {
                let mut map = IndexMap::new();
                for property in properties {
                    let value = self.eval(&property.value)?;
                    map.insert(property.key.name.clone(), value);
                }
                Ok(Value::Object(map))
            }
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::Array(values))
            }
            ExprKind::Template(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(s) => text.push_str(s),
                        TemplatePart::Expr(e) => text.push_str(&self.eval(e)?.as_text()),
                    }
                }
                Ok(Value::Text(text))
            }
        }
    }

    fn get_property(&self, target: Value, name: &str, range: Range) -> Result<Value, ExecError> {
        match target {
            Value::Namespace(path) => {
                let full = format!("{}.{}", path, name);
                let Some(entry) = Catalog::global().get(&full) else {
                    return Err(ExecError::new(
                        format!("'{}' is not a builtin", full),
                        range,
                    ));
                };
                match &entry.kind {
                    EntryKind::Namespace(_) => Ok(Value::Namespace(full)),
                    EntryKind::Function { .. } => Ok(Value::Builtin(full)),
                    EntryKind::Value(_) => super::builtins::constant(&full).ok_or_else(|| {
                        ExecError::new(format!("'{}' has no runtime value", full), range)
                    }),
                }
            }
            Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
            Value::Text(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
            Value::Array(items) if name == "length" => Ok(Value::Number(items.len() as f64)),
            Value::Null => Err(ExecError::new(
                format!("Cannot read property '{}' of null", name),
                range,
            )),
            other => {
                let message = if super::methods::is_method(&other, name) {
                    format!("'{}' is a method of {} and must be called", name, other.type_name())
                } else {
                    format!("Property '{}' does not exist on {}", name, other.type_name())
                };
                Err(ExecError::new(message, range))
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Exec<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        Ok(values)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], range: Range) -> Exec<Value> {
        if let ExprKind::Member { object, property } = &callee.kind {
            let receiver = self.eval(object)?;
            if super::methods::is_method(&receiver, &property.name) {
                let values = self.eval_args(args)?;
                return self.call_method(receiver, &property.name, values, object, range);
            }
            let function = self.get_property(receiver, &property.name, callee.range)?;
            let values = self.eval_args(args)?;
            return self.call_value(function, values, range);
        }
        let function = self.eval(callee)?;
        let values = self.eval_args(args)?;
        self.call_value(function, values, range)
    }

    pub(super) fn call_value(&mut self, function: Value, args: Vec<Value>, range: Range) -> Exec<Value> {
        match function {
            Value::Function(closure) => self.call_closure(&closure, args, range),
            Value::Builtin(path) => Ok(self.call_builtin(&path, args, range)?),
            Value::Namespace(path) => Err(ExecError::new(
                format!("'{}' is a namespace, not a function", path),
                range,
            )
            .into()),
            other => Err(ExecError::new(
                format!("{} is not a function", other.type_name()),
                range,
            )
            .into()),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>, range: Range) -> Exec<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ExecError::new("Maximum call depth exceeded", range).into());
        }
        let frame = Frame::child(&closure.env);
        {
            let mut f = frame.borrow_mut();
            let mut args = args.into_iter();
            for param in &closure.params {
                let value = args.next().unwrap_or(Value::Null);
                f.stores[Store::L.index()].insert(param.clone(), value);
            }
        }
        let saved = std::mem::replace(&mut self.env, frame);
        self.depth += 1;
        let result = match closure.body.as_ref() {
            FunctionBody::Block(body) => self.exec_block(body).map(|flow| match flow {
                Flow::Return(value) => value,
                _ => Value::Null,
            }),
            FunctionBody::Expr(expr) => self.eval(expr),
        };
        self.depth -= 1;
        self.env = saved;
        result
    }
}

fn statement_name(kind: &StmtKind) -> &'static str {
    match kind {
        StmtKind::Declaration { .. } => "declaration",
        StmtKind::Assignment { .. } => "assignment",
        StmtKind::Expression(_) => "expression",
        StmtKind::Block(_) => "block",
        StmtKind::If { .. } => "if",
        StmtKind::For { .. } => "for",
        StmtKind::ForEach { .. } => "for-each",
        StmtKind::While { .. } => "while",
        StmtKind::DoWhile { .. } => "do-while",
        StmtKind::Try { .. } => "try",
        StmtKind::Function(_) => "function",
        StmtKind::Return(_) => "return",
        StmtKind::Throw(_) => "throw",
        StmtKind::Break => "break",
        StmtKind::Continue => "continue",
        StmtKind::Disable(_) => "disable",
        StmtKind::Enable(_) => "able",
    }
}

/// Array position for `key` when it is a whole number below `len`
pub(super) fn array_slot(key: &Value, len: usize) -> Option<usize> {
    match key {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && (*n as usize) < len => {
            Some(*n as usize)
        }
        _ => None,
    }
}

fn get_index(target: Value, key: &Value, range: Range) -> Result<Value, ExecError> {
    match target {
        Value::Array(items) => Ok(array_slot(key, items.len())
            .map(|i| items[i].clone())
            .unwrap_or(Value::Null)),
        Value::Object(map) => Ok(map.get(&key.as_text()).cloned().unwrap_or(Value::Null)),
        Value::Text(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(array_slot(key, chars.len())
                .map(|i| Value::Text(chars[i].to_string()))
                .unwrap_or(Value::Null))
        }
        other => Err(ExecError::new(
            format!("Cannot index into {}", other.type_name()),
            range,
        )),
    }
}

fn unary_op(op: UnaryOp, operand: &Value) -> Result<Value, String> {
    match op {
        UnaryOp::Not => Ok(Value::Boolean(!operand.is_truthy())),
        UnaryOp::Neg | UnaryOp::Plus => {
            let n = operand.as_number().ok_or_else(|| {
                format!("Operator '{}' needs a number, got {}", if op == UnaryOp::Neg { "-" } else { "+" }, operand.type_name())
            })?;
            Ok(Value::Number(if op == UnaryOp::Neg { -n } else { n }))
        }
    }
}

fn number_operands(op: BinaryOp, left: &Value, right: &Value) -> Result<(f64, f64), String> {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(format!(
            "Operator '{}' cannot be applied to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )),
    }
}

/// Evaluate a binary operation
pub(super) fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    match op {
        BinaryOp::Add => {
            // Handle text concatenation
            if matches!(left, Value::Text(_)) || matches!(right, Value::Text(_)) {
                Ok(Value::Text(format!("{}{}", left.as_text(), right.as_text())))
            } else {
                let (l, r) = number_operands(op, left, right)?;
                Ok(Value::Number(l + r))
            }
        }
        BinaryOp::Sub => {
            let (l, r) = number_operands(op, left, right)?;
            Ok(Value::Number(l - r))
        }
        BinaryOp::Mul => {
            let (l, r) = number_operands(op, left, right)?;
            Ok(Value::Number(l * r))
        }
        BinaryOp::Div => {
            let (l, r) = number_operands(op, left, right)?;
            if r == 0.0 {
                Err("Division by zero".to_string())
            } else {
                Ok(Value::Number(l / r))
            }
        }
        BinaryOp::Rem => {
            let (l, r) = number_operands(op, left, right)?;
            if r == 0.0 {
                Err("Division by zero".to_string())
            } else {
                Ok(Value::Number(l % r))
            }
        }
        BinaryOp::Eq => Ok(Value::Boolean(left.loose_equals(right))),
        BinaryOp::NotEq => Ok(Value::Boolean(!left.loose_equals(right))),
        BinaryOp::StrictEq => Ok(Value::Boolean(left.strict_equals(right))),
        BinaryOp::StrictNotEq => Ok(Value::Boolean(!left.strict_equals(right))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (left, right) {
                (Value::Text(l), Value::Text(r)) => l.partial_cmp(r),
                _ => {
                    let (l, r) = number_operands(op, left, right)?;
                    l.partial_cmp(&r)
                }
            };
            let result = match ordering {
                None => false,
                Some(ord) => match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::LtEq => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                },
            };
            Ok(Value::Boolean(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::host::MemoryHost;
    use crate::syntax::parse_source;

    fn run_with(source: &str, options: &RunOptions) -> (Result<(), ExecError>, Vec<String>) {
        let program = parse_source(source).unwrap();
        let mut host = MemoryHost::new();
        let mut evaluator = Evaluator::new(&mut host, options);
        let result = evaluator.run(&program);
        let output = evaluator.output().to_vec();
        (result, output)
    }

    fn run(source: &str) -> Vec<String> {
        let (result, output) = run_with(source, &RunOptions::default());
        result.unwrap();
        output
    }

    fn run_err(source: &str) -> ExecError {
        run_with(source, &RunOptions::default()).0.unwrap_err()
    }

    #[test]
    fn test_eval_arithmetic_and_concat() {
        let out = run("let a = 2 + 3 * 4; console.text.var(a); console.text.var('n=' + a);");
        assert_eq!(out, vec!["14", "n=14"]);
    }

    #[test]
    fn test_eval_stores_are_separate() {
        let out = run("let dog = 'l'; var cat = 'v'; console.text.var(l.dog, v.cat);");
        assert_eq!(out, vec!["l v"]);
    }

    #[test]
    fn test_eval_const_cannot_be_rebound() {
        let err = run_err("const x = 1; x = 2;");
        assert!(err.message.contains("constant 'x'"));
        assert_eq!(err.code, RUNTIME_ERROR);
    }

    #[test]
    fn test_eval_const_contents_can_change() {
        let out = run("const box = { n: 1 }; box.n = 2; console.text.var(box.n);");
        assert_eq!(out, vec!["2"]);
    }

    #[test]
    fn test_eval_loops() {
        let out = run(
            "let total = 0; for (let i = 0; i < 5; i += 1) { if (i == 3) { continue; } total += i; } console.text.var(total);",
        );
        assert_eq!(out, vec!["7"]);
        let out = run("let n = 0; while (true) { n += 1; if (n >= 4) { break; } } console.text.var(n);");
        assert_eq!(out, vec!["4"]);
        let out = run("let n = 10; do { n += 1; } while (n < 5); console.text.var(n);");
        assert_eq!(out, vec!["11"]);
    }

    #[test]
    fn test_eval_for_each_and_methods() {
        let out = run(
            "let names = ['rex', 'fuffy']; for (let name of names) { console.text.var(name.toUpperCase()); }",
        );
        assert_eq!(out, vec!["REX", "FUFFY"]);
    }

    #[test]
    fn test_eval_functions_and_recursion() {
        let out = run(
            "function fact(n) { if (n <= 1) { return 1; } return n * fact(n - 1); } console.text.var(fact(5));",
        );
        assert_eq!(out, vec!["120"]);
        let out = run("let twice = (x) => x * 2; console.text.var(twice(21));");
        assert_eq!(out, vec!["42"]);
    }

    #[test]
    fn test_eval_closures_capture() {
        let out = run(
            "function counter() { let count = 0; return () => { count += 1; return count; }; } let next = counter(); next(); console.text.var(next());",
        );
        assert_eq!(out, vec!["2"]);
    }

    #[test]
    fn test_eval_try_catch_finally() {
        let out = run(
            "try { throw 'boom'; } catch (e) { console.text.var('caught ' + e); } finally { console.text.var('done'); }",
        );
        assert_eq!(out, vec!["caught boom", "done"]);
        let out = run("try { let x = 1 / 0; } catch (e) { console.text.var(e); }");
        assert_eq!(out, vec!["Division by zero"]);
    }

    #[test]
    fn test_eval_uncaught_throw() {
        let err = run_err("throw 'bad';");
        assert_eq!(err.message, "Uncaught exception: bad");
    }

    #[test]
    fn test_eval_step_limit() {
        let options = RunOptions {
            max_steps: Some(50),
            ..Default::default()
        };
        let (result, _) = run_with("while (true) { }", &options);
        let err = result.unwrap_err();
        assert_eq!(err.code, EXECUTION_LIMIT_EXCEEDED);
    }

    #[test]
    fn test_eval_limit_is_not_catchable() {
        let options = RunOptions {
            max_steps: Some(20),
            ..Default::default()
        };
        let (result, _) = run_with("try { while (true) { } } catch (e) { }", &options);
        assert_eq!(result.unwrap_err().code, EXECUTION_LIMIT_EXCEEDED);
    }

    #[test]
    fn test_eval_runtime_gating() {
        let err = run_err("disable 'AllInOne'; Sys.pid();");
        assert!(err.message.contains("Module 'Sys' is not enabled"));

        let options = RunOptions {
            ignore_module_gating: true,
            ..Default::default()
        };
        let (result, _) = run_with("disable 'AllInOne'; console.text.var(Math.floor(2.7));", &options);
        assert!(result.is_ok());
    }

    #[test]
    fn test_eval_nested_directive_is_skipped() {
        let program = parse_source("if (true) { able 'Math'; } console.text.var(1);").unwrap();
        let mut host = MemoryHost::new();
        let mut evaluator = Evaluator::new(&mut host, &RunOptions::default());
        evaluator.run(&program).unwrap();
        assert_eq!(evaluator.skipped().len(), 1);
        assert_eq!(evaluator.output(), ["1"]);
    }

    #[test]
    fn test_eval_template_and_coalesce() {
        let out = run("let n = null; let name = n ?? 'Fuffy'; console.text.var(`hi ${name}!`);");
        assert_eq!(out, vec!["hi Fuffy!"]);
    }

    #[test]
    fn test_eval_index_assignment() {
        let out = run("let xs = [1, 2]; xs[2] = 3; xs[0] = 9; console.text.var(xs);");
        assert_eq!(out, vec!["[9, 2, 3]"]);
    }

    #[test]
    fn test_binary_op_comparisons() {
        let t = |op, l: Value, r: Value| binary_op(op, &l, &r).unwrap();
        assert_eq!(t(BinaryOp::Lt, "a".into(), "b".into()), Value::Boolean(true));
        assert_eq!(t(BinaryOp::GtEq, 2.0.into(), "2".into()), Value::Boolean(true));
        assert_eq!(t(BinaryOp::StrictEq, 1.0.into(), "1".into()), Value::Boolean(false));
        assert!(binary_op(BinaryOp::Sub, &Value::Array(vec![]), &Value::Number(1.0)).is_err());
    }
}
