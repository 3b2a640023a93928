//! Builtin library
//!
//! Calls are dispatched by catalog path. Each module lives in its own file
//! as an `impl Evaluator` block so builtins can reach the host, the output
//! streams and user callbacks.

mod console;
mod crypto;
mod data;
mod file;
mod math;
mod net;
mod sys;
mod terminal;
mod time;

pub use crypto::{decrypt, encrypt, normalize_key};

use data::{call_json, call_regex};

use thiserror::Error;

use super::evaluator::{Evaluator, ExecError};
use super::host::HostError;
use super::value::Value;
use crate::diagnostics::Range;
use crate::intel::catalog::CONSOLE;
use crate::semantic::Module;

/// Error raised inside a builtin, before the call site is attached
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<HostError> for EvalError {
    fn from(err: HostError) -> Self {
        EvalError::new(err.to_string())
    }
}

pub(super) type BuiltinResult = Result<Value, EvalError>;

/// Runtime value of a catalog constant such as `Math.PI`
pub fn constant(path: &str) -> Option<Value> {
    match path {
        "Math.PI" => Some(Value::Number(std::f64::consts::PI)),
        "Math.E" => Some(Value::Number(std::f64::consts::E)),
        _ => None,
    }
}

impl Evaluator<'_> {
    /// Invoke the builtin at `path`; errors carry the path and call site
    pub(crate) fn call_builtin(
        &mut self,
        path: &str,
        args: Vec<Value>,
        range: Range,
    ) -> Result<Value, ExecError> {
        let (root, name) = path.split_once('.').unwrap_or((path, ""));
        if let Some(module) = Module::from_name(root) {
            self.check_module(module, range)?;
        }
        let result = match Module::from_name(root) {
            None if root == CONSOLE => self.call_console(name, &args),
            None => Err(unknown(name)),
            Some(Module::Math) => self.call_math(name, &args),
            Some(Module::Time) => self.call_time(name, &args),
            Some(Module::Sys) => self.call_sys(name, &args),
            Some(Module::Terminal) => self.call_terminal(name, &args),
            Some(Module::File) => self.call_file(name, &args),
            Some(Module::Net) => self.call_net(name, &args),
            Some(Module::Crypto) => self.call_crypto(name, &args),
            Some(Module::DateTime) => self.call_datetime(name, &args),
            Some(Module::Regex) => call_regex(name, &args),
            Some(Module::Json) => call_json(name, &args),
            Some(Module::Async) => self.call_async(name, &args),
        };
        result.map_err(|err| ExecError::new(format!("{}: {}", path, err.message), range))
    }

    /// Uniform number in [0, 1) from host random bytes
    pub(super) fn random_unit(&mut self) -> Result<f64, EvalError> {
        let mut bytes = [0u8; 8];
        self.host.random_bytes(&mut bytes)?;
        let bits = u64::from_le_bytes(bytes) >> 11;
        Ok(bits as f64 / (1u64 << 53) as f64)
    }
}

//==============================================================================
// Argument helpers
//==============================================================================

pub(super) fn unknown(name: &str) -> EvalError {
    EvalError::new(format!("unknown builtin '{}'", name))
}

/// Argument `index`, `null` when missing
pub(super) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

/// Require at least `count` arguments
pub(super) fn require_args(args: &[Value], count: usize) -> Result<(), EvalError> {
    if args.len() < count {
        Err(EvalError::new(format!(
            "requires {} argument(s), got {}",
            count,
            args.len()
        )))
    } else {
        Ok(())
    }
}

/// Text argument; numbers and booleans are converted
pub(super) fn text_arg(args: &[Value], index: usize) -> Result<String, EvalError> {
    match args.get(index) {
        Some(Value::Text(s)) => Ok(s.clone()),
        Some(v @ (Value::Number(_) | Value::Boolean(_))) => Ok(v.as_text()),
        Some(other) => Err(EvalError::new(format!(
            "argument {} must be a string, got {}",
            index + 1,
            other.type_name()
        ))),
        None => Err(EvalError::new(format!("argument {} is missing", index + 1))),
    }
}

pub(super) fn number_arg(args: &[Value], index: usize) -> Result<f64, EvalError> {
    let value = args
        .get(index)
        .ok_or_else(|| EvalError::new(format!("argument {} is missing", index + 1)))?;
    match value {
        Value::Number(n) => Ok(*n),
        Value::Text(_) | Value::Boolean(_) => value.as_number().ok_or_else(|| {
            EvalError::new(format!("argument {} must be a number", index + 1))
        }),
        other => Err(EvalError::new(format!(
            "argument {} must be a number, got {}",
            index + 1,
            other.type_name()
        ))),
    }
}

/// Optional numeric argument; `null` and missing mean absent
pub(super) fn optional_number(args: &[Value], index: usize) -> Result<Option<f64>, EvalError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => number_arg(args, index).map(Some),
    }
}

/// Values joined by spaces, as printed by the console builtins
pub(super) fn join_args(args: &[Value]) -> String {
    args.iter().map(Value::as_text).collect::<Vec<_>>().join(" ")
}

/// Milliseconds from a number or a duration string
pub(super) fn duration_arg(args: &[Value], index: usize) -> u64 {
    match args.get(index) {
        Some(Value::Number(n)) if n.is_finite() && *n > 0.0 => n.round() as u64,
        Some(Value::Text(s)) => super::duration::parse_duration(s),
        _ => 0,
    }
}
