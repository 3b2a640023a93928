//! Analysis pipeline
//!
//! Runs lex, parse, resolve and lint in order. Each stage sits behind its
//! own panic boundary: a failing stage yields one internal diagnostic and a
//! safe substitute so the later stages still run.

pub mod cache;

use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::ForgeConfig;
use crate::diagnostics::{self, Diagnostic, Range, Severity, Stage};
use crate::lint::{self, LintContext};
use crate::semantic::{self, AnalysisOptions, SemanticState};
use crate::syntax::ast::Program;
use crate::syntax::tokenizer::Token;
use crate::syntax::{ForgeFrontend, Frontend};

pub use cache::{DocumentCache, ProcessedDocument};

/// Wall-clock duration of each stage in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    pub lex_ms: f64,
    pub parse_ms: f64,
    pub resolve_ms: f64,
    pub lint_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// No diagnostic has error severity
    pub ok: bool,
    /// `None` when lexing failed
    pub tokens: Option<Vec<Token>>,
    /// `None` when lexing or parsing failed
    pub program: Option<Arc<Program>>,
    pub diagnostics: Vec<Diagnostic>,
    pub semantic: Option<Arc<SemanticState>>,
    pub timings: StageTimings,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn internal(code: &str, severity: Severity, stage: Stage, detail: String) -> Diagnostic {
    warn!(stage = %stage, %detail, "analysis stage failed");
    Diagnostic::new(
        severity,
        code,
        format!("Internal {} failure: {}", stage, detail),
        Range::default(),
    )
    .with_stage(stage)
}

/// Resolve stage: builds the semantic state for a parsed program
pub type ResolveStage = fn(&Program, AnalysisOptions) -> (SemanticState, Vec<Diagnostic>);

/// Lint stage: style and safety rules over a resolved program
pub type LintStage = fn(&Program, &LintContext<'_>) -> Vec<Diagnostic>;

/// Drives a [`Frontend`] and the analysis stages with one configuration
pub struct Analyzer {
    frontend: Box<dyn Frontend>,
    resolve: ResolveStage,
    lint: LintStage,
    config: ForgeConfig,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(ForgeConfig::default())
    }
}

impl Analyzer {
    pub fn new(config: ForgeConfig) -> Self {
        Self::with_frontend(config, Box::new(ForgeFrontend))
    }

    pub fn with_frontend(config: ForgeConfig, frontend: Box<dyn Frontend>) -> Self {
        Self {
            frontend,
            resolve: semantic::resolve,
            lint: lint::lint,
            config,
        }
    }

    /// Replace the resolve stage
    pub fn with_resolver(mut self, resolve: ResolveStage) -> Self {
        self.resolve = resolve;
        self
    }

    /// Replace the lint stage
    pub fn with_linter(mut self, lint: LintStage) -> Self {
        self.lint = lint;
        self
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn analyze(&self, source: &str) -> AnalysisResult {
        self.analyze_with(source, self.config.analysis_options())
    }

    pub fn analyze_with(&self, source: &str, options: AnalysisOptions) -> AnalysisResult {
        let total = Instant::now();
        let mut timings = StageTimings::default();
        let mut stage_diagnostics: Vec<Vec<Diagnostic>> = Vec::new();

        // Lex
        let start = Instant::now();
        let tokens = match panic::catch_unwind(AssertUnwindSafe(|| self.frontend.tokenize(source)))
        {
            Ok(Ok(tokens)) => Some(tokens),
            Ok(Err(err)) => {
                stage_diagnostics.push(vec![Diagnostic::error("LEX_ERROR", err.message, err.range)
                    .with_stage(Stage::Lex)]);
                None
            }
            Err(payload) => {
                stage_diagnostics.push(vec![internal(
                    "LEX_INTERNAL",
                    Severity::Error,
                    Stage::Lex,
                    panic_message(payload),
                )]);
                Some(Vec::new())
            }
        };
        timings.lex_ms = elapsed_ms(start);

        // Parse
        let start = Instant::now();
        let program = match &tokens {
            None => None,
            Some(tokens) => {
                match panic::catch_unwind(AssertUnwindSafe(|| self.frontend.parse(tokens, source)))
                {
                    Ok(Ok(program)) => Some(Arc::new(program)),
                    Ok(Err(err)) => {
                        stage_diagnostics.push(vec![Diagnostic::error(
                            "PARSE_ERROR",
                            err.message,
                            err.range,
                        )
                        .with_stage(Stage::Parse)]);
                        None
                    }
                    Err(payload) => {
                        stage_diagnostics.push(vec![internal(
                            "PARSE_INTERNAL",
                            Severity::Error,
                            Stage::Parse,
                            panic_message(payload),
                        )]);
                        Some(Arc::new(Program::empty()))
                    }
                }
            }
        };
        timings.parse_ms = elapsed_ms(start);

        // Resolve
        let start = Instant::now();
        let semantic = match &program {
            None => None,
            Some(program) => {
                match panic::catch_unwind(AssertUnwindSafe(|| (self.resolve)(program, options)))
                {
                    Ok((state, diags)) => {
                        stage_diagnostics.push(diags);
                        Some(Arc::new(state))
                    }
                    Err(payload) => {
                        stage_diagnostics.push(vec![internal(
                            "SEM_INTERNAL",
                            Severity::Error,
                            Stage::Resolve,
                            panic_message(payload),
                        )]);
                        Some(Arc::new(SemanticState::fallback()))
                    }
                }
            }
        };
        timings.resolve_ms = elapsed_ms(start);

        // Lint
        let start = Instant::now();
        if self.config.lint_enabled {
            if let (Some(program), Some(state)) = (&program, &semantic) {
                let ctx = LintContext {
                    modules: &state.modules,
                    gated_uses: &state.gated_uses,
                    symbols: &state.symbols,
                    types: &state.types,
                    source,
                    max_line_length: self.config.max_line_length,
                    prefer_quoted_strings_for_prompts: self
                        .config
                        .prefer_quoted_strings_for_prompts,
                };
                match panic::catch_unwind(AssertUnwindSafe(|| (self.lint)(program, &ctx))) {
                    Ok(diags) => stage_diagnostics.push(diags),
                    Err(payload) => stage_diagnostics.push(vec![internal(
                        "LINT_INTERNAL",
                        Severity::Warning,
                        Stage::Lint,
                        panic_message(payload),
                    )]),
                }
            }
        }
        timings.lint_ms = elapsed_ms(start);

        let mut merged = diagnostics::dedupe(diagnostics::merge(stage_diagnostics));
        if self.config.soft_module_gating {
            merged = merged
                .into_iter()
                .map(|d| {
                    if d.code == "MODULE_NOT_ENABLED" {
                        d.downgraded(Severity::Warning)
                    } else {
                        d
                    }
                })
                .collect();
            merged = diagnostics::sort(merged);
        }
        if !self.config.diagnostics_enabled {
            merged.clear();
        }
        timings.total_ms = elapsed_ms(total);

        debug!(
            lex_ms = timings.lex_ms,
            parse_ms = timings.parse_ms,
            resolve_ms = timings.resolve_ms,
            lint_ms = timings.lint_ms,
            diagnostics = merged.len(),
            "analysis finished"
        );

        AnalysisResult {
            ok: !diagnostics::has_errors(&merged),
            tokens,
            program,
            diagnostics: merged,
            semantic,
            timings,
        }
    }
}
