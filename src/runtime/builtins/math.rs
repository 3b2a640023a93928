//! Math functions

use super::{number_arg, require_args, unknown, BuiltinResult, EvalError};
use crate::runtime::evaluator::Evaluator;
use crate::runtime::value::Value;

/// Numbers from the arguments, flattening arrays
fn collect_numbers(args: &[Value]) -> Result<Vec<f64>, EvalError> {
    let mut numbers = Vec::new();
    for value in args {
        match value {
            Value::Array(items) => numbers.extend(collect_numbers(items)?),
            other => numbers.push(other.as_number().ok_or_else(|| {
                EvalError::new(format!("expected numbers, got {}", other.type_name()))
            })?),
        }
    }
    Ok(numbers)
}

impl Evaluator<'_> {
    pub(super) fn call_math(&mut self, name: &str, args: &[Value]) -> BuiltinResult {
        let result = match name {
            "sqrt" => {
                let x = number_arg(args, 0)?;
                if x < 0.0 {
                    return Err(EvalError::new(
                        "cannot compute square root of negative number",
                    ));
                }
                x.sqrt()
            }
            "abs" => number_arg(args, 0)?.abs(),
            "floor" => number_arg(args, 0)?.floor(),
            "ceil" => number_arg(args, 0)?.ceil(),
            "round" => number_arg(args, 0)?.round(),
            "min" | "max" => {
                let numbers = collect_numbers(args)?;
                if numbers.is_empty() {
                    return Err(EvalError::new("requires at least one number"));
                }
                let fold: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
                numbers.into_iter().reduce(fold).unwrap_or(0.0)
            }
            "pow" => {
                require_args(args, 2)?;
                number_arg(args, 0)?.powf(number_arg(args, 1)?)
            }
            "random" => self.random_unit()?,
            _ => return Err(unknown(name)),
        };
        Ok(Value::Number(result))
    }
}
