//! Analysis and execution settings
//!
//! [`ForgeConfig`] mirrors the settings an editor hands to the language
//! service. Loading it from a file is the caller's business; every field has
//! a default so a partial JSON object deserializes cleanly.

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, ForgeResult};
use crate::semantic::AnalysisOptions;

pub const DEFAULT_MAX_LINE_LENGTH: usize = 120;
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForgeConfig {
    pub diagnostics_enabled: bool,
    /// Report `MODULE_NOT_ENABLED` as a warning instead of an error
    pub soft_module_gating: bool,
    pub relaxed_member_access: bool,
    pub lint_enabled: bool,
    pub prefer_quoted_strings_for_prompts: bool,
    pub max_line_length: usize,
    /// Modules offered by the `able` completion snippet
    pub default_modules: Vec<String>,
    /// Passed through untouched
    pub include: Vec<String>,
    /// Passed through untouched
    pub exclude: Vec<String>,
    pub cache_capacity: usize,
    /// Keep the last error-free program for completion during syntax errors
    pub keep_last_good: bool,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            diagnostics_enabled: true,
            soft_module_gating: false,
            relaxed_member_access: false,
            lint_enabled: true,
            prefer_quoted_strings_for_prompts: true,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            default_modules: vec!["Math".to_string(), "Time".to_string(), "Sys".to_string()],
            include: vec!["**/*.forge".to_string()],
            exclude: Vec::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            keep_last_good: true,
        }
    }
}

impl ForgeConfig {
    /// Parse a JSON settings object, filling gaps with defaults
    pub fn from_json(text: &str) -> ForgeResult<Self> {
        let config: ForgeConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ForgeResult<()> {
        if self.cache_capacity == 0 {
            return Err(ForgeError::Config(
                "cacheCapacity must be at least 1".to_string(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(ForgeError::Config(
                "maxLineLength must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            relaxed_member_access: self.relaxed_member_access,
            ignore_module_gating: false,
        }
    }
}

/// Options for a single program run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
    /// Refuse to execute when analysis reports warnings
    pub stop_on_warnings: bool,
    /// Statement budget, checked at each statement boundary
    pub max_steps: Option<u64>,
    /// Wall-clock budget in milliseconds
    pub timeout_ms: Option<u64>,
    /// Trace every executed statement
    pub verbose: bool,
    pub ignore_module_gating: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ForgeConfig::default();
        assert!(config.diagnostics_enabled);
        assert!(!config.soft_module_gating);
        assert_eq!(config.max_line_length, 120);
        assert_eq!(config.cache_capacity, 50);
        assert!(config.keep_last_good);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            ForgeConfig::from_json(r#"{"softModuleGating": true, "maxLineLength": 80}"#).unwrap();
        assert!(config.soft_module_gating);
        assert_eq!(config.max_line_length, 80);
        assert!(config.lint_enabled);
        assert_eq!(config.cache_capacity, 50);
    }

    #[test]
    fn test_invalid_capacity_rejected() {
        let err = ForgeConfig::from_json(r#"{"cacheCapacity": 0}"#).unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn test_run_options_camel_case() {
        let opts: RunOptions =
            serde_json::from_str(r#"{"stopOnWarnings": true, "maxSteps": 10}"#).unwrap();
        assert!(opts.stop_on_warnings);
        assert_eq!(opts.max_steps, Some(10));
        assert_eq!(opts.timeout_ms, None);
    }
}
