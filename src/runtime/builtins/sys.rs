//! Sys: processes and machine facts

use super::{number_arg, text_arg, unknown, BuiltinResult, EvalError};
use crate::runtime::evaluator::Evaluator;
use crate::runtime::value::Value;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

impl Evaluator<'_> {
    pub(super) fn call_sys(&mut self, name: &str, args: &[Value]) -> BuiltinResult {
        match name {
            "exec" => {
                let command = text_arg(args, 0)?;
                let output = self.host.exec(&command)?;
                if output.status != 0 {
                    return Err(EvalError::new(format!(
                        "command exited with status {}: {}",
                        output.status,
                        output.stderr.trim()
                    )));
                }
                Ok(Value::Text(output.stdout.trim_end().to_string()))
            }
            "execAsync" => {
                let command = text_arg(args, 0)?;
                self.host.exec_detached(&command);
                Ok(Value::Null)
            }
            "pid" => Ok(Value::Number(f64::from(self.host.pid()))),
            "kill" => {
                let pid = number_arg(args, 0)?;
                if pid < 1.0 || pid.fract() != 0.0 || pid > f64::from(u32::MAX) {
                    return Err(EvalError::new(format!("invalid process id {}", pid)));
                }
                Ok(Value::Boolean(self.host.kill(pid as u32)?))
            }
            "ram" => {
                let info = self.host.system_info();
                Ok(Value::Number((info.total_memory as f64 / BYTES_PER_MB).round()))
            }
            "cpu.cores" => Ok(Value::Number(self.host.system_info().cores as f64)),
            "cpu.usage" => Ok(Value::Number(f64::from(self.host.system_info().cpu_usage))),
            "cpu.model" => Ok(Value::Text(self.host.system_info().cpu_model)),
            "os.name" => Ok(Value::Text(self.host.system_info().os_name)),
            "os.version" => Ok(Value::Text(self.host.system_info().os_version)),
            "os.arch" => Ok(Value::Text(self.host.system_info().arch)),
            _ => Err(unknown(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;
    use crate::runtime::host::{ExecOutput, MemoryHost};

    #[test]
    fn test_exec_and_facts() {
        let mut host = MemoryHost::new().with_command(
            "echo hi",
            ExecOutput {
                status: 0,
                stdout: "hi\n".to_string(),
                stderr: String::new(),
            },
        );
        let mut evaluator = Evaluator::new(&mut host, &RunOptions::default());
        assert_eq!(
            evaluator.call_sys("exec", &[Value::text("echo hi")]).unwrap(),
            Value::text("hi")
        );
        assert_eq!(evaluator.call_sys("cpu.cores", &[]).unwrap(), Value::Number(4.0));
        assert_eq!(evaluator.call_sys("ram", &[]).unwrap(), Value::Number(8192.0));
        assert_eq!(evaluator.call_sys("os.arch", &[]).unwrap(), Value::text("x86_64"));
    }

    #[test]
    fn test_failed_command_is_an_error() {
        let mut host = MemoryHost::new().with_command(
            "false",
            ExecOutput {
                status: 1,
                stdout: String::new(),
                stderr: "nope".to_string(),
            },
        );
        let mut evaluator = Evaluator::new(&mut host, &RunOptions::default());
        let err = evaluator.call_sys("exec", &[Value::text("false")]).unwrap_err();
        assert!(err.message.contains("status 1"));
    }

    #[test]
    fn test_exec_async_never_fails() {
        let mut host = MemoryHost::new();
        {
            let mut evaluator = Evaluator::new(&mut host, &RunOptions::default());
            let result = evaluator.call_sys("execAsync", &[Value::text("missing-tool")]);
            assert_eq!(result.unwrap(), Value::Null);
        }
        assert_eq!(host.executed, vec!["missing-tool"]);
    }
}
