//! Forge - language-service core for the Forge scripting language
//!
//! This library turns Forge source into symbol and type information,
//! diagnostics, execution results and editor answers.
//!
//! # Features
//!
//! - Structural type inference with unification and literal widening
//! - Three-store symbol resolution (`l`, `v`, `c`) with ambiguity detection
//! - Optional standard-library modules gated by `disable`/`able` directives
//! - Fault-isolated analysis pipeline with a bounded per-document cache
//! - Tree-walking interpreter behind an injectable [`Host`](runtime::Host)
//! - Completion, hover and document symbols
//!
//! # Example
//!
//! ```no_run
//! use forge_lang::config::{ForgeConfig, RunOptions};
//! use forge_lang::runtime::{Executor, MemoryHost};
//!
//! let source = "disable 'AllInOne'; able 'Math'; let dog = 'Fuffy'; console.text.var(l.dog);";
//! let executor = Executor::new(ForgeConfig::default(), RunOptions::default());
//! let result = executor.run(source, &mut MemoryHost::new());
//!
//! assert!(result.success);
//! assert_eq!(result.output, vec!["Fuffy"]);
//! ```

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod intel;
pub mod lint;
pub mod pipeline;
pub mod runtime;
pub mod semantic;
pub mod syntax;
pub mod types;

// Re-export commonly used types
pub use config::{ForgeConfig, RunOptions};
pub use diagnostics::{Diagnostic, Range, Severity};
pub use error::{ForgeError, ForgeResult};
pub use pipeline::{AnalysisResult, Analyzer, DocumentCache, ProcessedDocument};
pub use runtime::{Executor, RunResult};
pub use types::ForgeType;
