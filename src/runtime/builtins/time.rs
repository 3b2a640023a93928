//! Time and Async

use super::{duration_arg, number_arg, unknown, BuiltinResult, EvalError};
use crate::runtime::evaluator::Evaluator;
use crate::runtime::value::Value;

impl Evaluator<'_> {
    pub(super) fn call_time(&mut self, name: &str, args: &[Value]) -> BuiltinResult {
        match name {
            "wait" => {
                let ms = duration_arg(args, 0);
                self.host.sleep(ms);
                Ok(Value::Null)
            }
            "fps" => {
                let rate = number_arg(args, 0)?;
                if !(rate.is_finite() && rate > 0.0) {
                    return Err(EvalError::new("frame rate must be a positive number"));
                }
                self.fps = rate;
                Ok(Value::Null)
            }
            "now" => Ok(Value::Number(self.host.now_ms() as f64)),
            _ => Err(unknown(name)),
        }
    }

    pub(super) fn call_async(&mut self, name: &str, args: &[Value]) -> BuiltinResult {
        match name {
            "sleep" => {
                let ms = duration_arg(args, 0);
                self.host.sleep(ms);
                Ok(Value::Null)
            }
            // Every value is settled once evaluated
            "all" => match args.first() {
                Some(Value::Array(items)) => Ok(Value::Array(items.clone())),
                Some(other) => Err(EvalError::new(format!(
                    "expects an array, got {}",
                    other.type_name()
                ))),
                None => Ok(Value::Array(Vec::new())),
            },
            _ => Err(unknown(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use crate::runtime::host::MemoryHost;

    #[test]
    fn test_wait_uses_host_sleep() {
        let mut host = MemoryHost::new();
        {
            let mut evaluator = Evaluator::new(&mut host, &RunOptions::default());
            evaluator.call_time("wait", &[Value::text("2s")]).unwrap();
            evaluator.call_async("sleep", &[Value::Number(150.0)]).unwrap();
            evaluator.call_time("wait", &[Value::text("later")]).unwrap();
        }
        assert_eq!(host.sleeps, vec![2000, 150, 0]);
    }

    #[test]
    fn test_fps_must_be_positive() {
        let mut host = MemoryHost::new();
        let mut evaluator = Evaluator::new(&mut host, &RunOptions::default());
        assert!(evaluator.call_time("fps", &[Value::Number(0.0)]).is_err());
        evaluator.call_time("fps", &[Value::Number(30.0)]).unwrap();
        assert_eq!(evaluator.fps, 30.0);
    }
}
