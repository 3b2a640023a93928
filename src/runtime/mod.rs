//! Program execution
//!
//! [`Executor`] analyzes a source first and only runs it when analysis
//! allows. Execution is single-threaded; every side effect goes through the
//! injected [`Host`].

pub mod builtins;
pub mod duration;
pub mod evaluator;
pub mod host;
mod methods;
pub mod value;

use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ForgeConfig, RunOptions};
use crate::diagnostics::{self, Diagnostic, Range, Stage};
use crate::pipeline::{panic_message, Analyzer, StageTimings};
use crate::semantic::AnalysisOptions;

pub use duration::parse_duration;
pub use evaluator::{
    Closure, Evaluator, ExecError, SkippedStatement, EXECUTION_LIMIT_EXCEEDED, MAX_CALL_DEPTH,
    RUNTIME_ERROR,
};
pub use host::{Host, HostError, HostResult, MemoryHost, SystemHost};
pub use value::Value;

pub const NO_PROGRAM: &str = "NO_PROGRAM";
pub const RUN_INTERNAL: &str = "RUN_INTERNAL";

/// Outcome of [`Executor::run`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub success: bool,
    pub exit_code: i32,
    pub output: Vec<String>,
    pub errors: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub skipped: Vec<SkippedStatement>,
    pub timings: StageTimings,
    pub duration_ms: f64,
}

impl RunResult {
    fn blocked(diagnostics: Vec<Diagnostic>, timings: StageTimings) -> Self {
        Self {
            success: false,
            exit_code: 1,
            output: Vec::new(),
            errors: Vec::new(),
            diagnostics,
            skipped: Vec::new(),
            timings,
            duration_ms: 0.0,
        }
    }

    /// Captured output joined into one block of text
    pub fn stdout(&self) -> String {
        self.output.join("\n")
    }
}

/// Analyze-then-run driver
pub struct Executor {
    analyzer: Analyzer,
    options: RunOptions,
}

impl Executor {
    pub fn new(config: ForgeConfig, options: RunOptions) -> Self {
        Self::with_analyzer(Analyzer::new(config), options)
    }

    pub fn with_analyzer(analyzer: Analyzer, options: RunOptions) -> Self {
        Self { analyzer, options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn run(&self, source: &str, host: &mut dyn Host) -> RunResult {
        let config = self.analyzer.config();
        let analysis = self.analyzer.analyze_with(
            source,
            AnalysisOptions {
                relaxed_member_access: config.relaxed_member_access,
                ignore_module_gating: self.options.ignore_module_gating,
            },
        );

        let blocked = !analysis.ok
            || (self.options.stop_on_warnings && diagnostics::has_warnings(&analysis.diagnostics));
        if blocked {
            info!(
                diagnostics = analysis.diagnostics.len(),
                "execution skipped after analysis"
            );
            return RunResult::blocked(analysis.diagnostics, analysis.timings);
        }

        let Some(program) = analysis.program else {
            let mut diagnostics = analysis.diagnostics;
            diagnostics.push(
                Diagnostic::error(NO_PROGRAM, "Analysis produced no program to run", Range::default())
                    .with_stage(Stage::Run),
            );
            return RunResult::blocked(diagnostics::sort(diagnostics), analysis.timings);
        };

        let enforce_gating = !(self.options.ignore_module_gating || config.soft_module_gating);
        let start = Instant::now();
        let mut evaluator = Evaluator::new(host, &self.options).with_gating(enforce_gating);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| evaluator.run(&program)));
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => {
                debug!(code = err.code, message = %err.message, "execution stopped");
                Some(Diagnostic::error(err.code, err.message, err.range).with_stage(Stage::Run))
            }
            Err(payload) => {
                let detail = panic_message(payload);
                warn!(%detail, "evaluator panicked");
                Some(
                    Diagnostic::error(
                        RUN_INTERNAL,
                        format!("Internal run failure: {}", detail),
                        Range::default(),
                    )
                    .with_stage(Stage::Run),
                )
            }
        };

        let mut diagnostics = analysis.diagnostics;
        let success = failure.is_none();
        diagnostics.extend(failure);
        debug!(
            steps = evaluator.steps(),
            duration_ms,
            success,
            "execution finished"
        );

        RunResult {
            success,
            exit_code: if success { 0 } else { 1 },
            output: evaluator.output().to_vec(),
            errors: evaluator.errors().to_vec(),
            diagnostics: diagnostics::sort(diagnostics),
            skipped: evaluator.skipped().to_vec(),
            timings: analysis.timings,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> RunResult {
        Executor::new(ForgeConfig::default(), RunOptions::default())
            .run(source, &mut MemoryHost::new())
    }

    #[test]
    fn test_fuffy_end_to_end() {
        let result = run(
            "disable 'AllInOne'; able 'Math','Time','Sys'; let dog = 'Fuffy'; console.text.var(l.dog);",
        );
        assert!(result.success, "{:?}", result.diagnostics);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, vec!["Fuffy"]);
        assert!(!diagnostics::has_errors(&result.diagnostics));
    }

    #[test]
    fn test_analysis_errors_block_execution() {
        let result = run("console.text.var('never'); missing;");
        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.is_empty());
        assert!(result.diagnostics.iter().any(|d| d.code == "UNDEFINED_VARIABLE"));
    }

    #[test]
    fn test_stop_on_warnings() {
        let source = "if (true) { } console.text.var('ran');";
        let lenient = run(source);
        assert!(lenient.success);
        let strict = Executor::new(
            ForgeConfig::default(),
            RunOptions {
                stop_on_warnings: true,
                ..Default::default()
            },
        )
        .run(source, &mut MemoryHost::new());
        assert!(!strict.success);
        assert!(strict.output.is_empty());
    }

    #[test]
    fn test_runtime_error_keeps_partial_output() {
        let result = run("console.text.var('before'); throw 'boom'; console.text.var('after');");
        assert!(!result.success);
        assert_eq!(result.output, vec!["before"]);
        let err = result
            .diagnostics
            .iter()
            .find(|d| d.code == RUNTIME_ERROR)
            .unwrap();
        assert_eq!(err.stage, Some(Stage::Run));
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn test_step_limit_is_reported() {
        let result = Executor::new(
            ForgeConfig::default(),
            RunOptions {
                max_steps: Some(50),
                ..Default::default()
            },
        )
        .run("let n = 0; while (true) { l.n += 1; }", &mut MemoryHost::new());
        assert!(!result.success);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.code == EXECUTION_LIMIT_EXCEEDED));
    }

    #[test]
    fn test_soft_gating_runs_gated_calls() {
        let config = ForgeConfig {
            soft_module_gating: true,
            ..Default::default()
        };
        let result = Executor::new(config, RunOptions::default())
            .run("disable 'AllInOne'; console.text.var(Math.abs(-2));", &mut MemoryHost::new());
        assert!(result.success, "{:?}", result.diagnostics);
        assert_eq!(result.output, vec!["2"]);
    }

    #[test]
    fn test_stdout_joins_lines() {
        let result = run("console.text.var('a'); console.text.var('b');");
        assert_eq!(result.stdout(), "a\nb");
    }
}
