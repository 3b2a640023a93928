//! Gated standard-library modules
//!
//! Access to a module root such as `Sys` is allowed while the `AllInOne`
//! bundle is active, or once the module has been enabled with `able`.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Reserved name of the default bundle
pub const ALL_IN_ONE: &str = "AllInOne";

/// The closed set of gated modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Module {
    Math,
    Time,
    Sys,
    Terminal,
    File,
    Net,
    Crypto,
    DateTime,
    Regex,
    #[serde(rename = "JSON")]
    Json,
    Async,
}

impl Module {
    pub const ALL: [Module; 11] = [
        Module::Math,
        Module::Time,
        Module::Sys,
        Module::Terminal,
        Module::File,
        Module::Net,
        Module::Crypto,
        Module::DateTime,
        Module::Regex,
        Module::Json,
        Module::Async,
    ];

    pub fn from_name(name: &str) -> Option<Module> {
        Module::ALL.into_iter().find(|m| m.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Module::Math => "Math",
            Module::Time => "Time",
            Module::Sys => "Sys",
            Module::Terminal => "Terminal",
            Module::File => "File",
            Module::Net => "Net",
            Module::Crypto => "Crypto",
            Module::DateTime => "DateTime",
            Module::Regex => "Regex",
            Module::Json => "JSON",
            Module::Async => "Async",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which modules a document may touch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleContext {
    pub all_in_one_enabled: bool,
    pub enabled: BTreeSet<String>,
}

impl Default for ModuleContext {
    fn default() -> Self {
        Self {
            all_in_one_enabled: true,
            enabled: BTreeSet::new(),
        }
    }
}

impl ModuleContext {
    /// State reported after an internal resolver failure
    pub fn fallback() -> Self {
        Self {
            all_in_one_enabled: true,
            enabled: BTreeSet::from([ALL_IN_ONE.to_string()]),
        }
    }

    /// Apply `disable '<name>'`. Only the bundle can be disabled; other
    /// names are ignored.
    pub fn disable(&mut self, name: &str) {
        if name == ALL_IN_ONE {
            self.all_in_one_enabled = false;
            self.enabled.clear();
        }
    }

    /// Apply `able '<name>'`. Names outside the closed set are ignored.
    pub fn enable(&mut self, name: &str) {
        if name == ALL_IN_ONE {
            self.all_in_one_enabled = true;
        } else if let Some(module) = Module::from_name(name) {
            self.enabled.insert(module.as_str().to_string());
        }
    }

    pub fn is_enabled(&self, module: Module) -> bool {
        self.all_in_one_enabled || self.enabled.contains(module.as_str())
    }

    pub fn is_enabled_name(&self, name: &str) -> bool {
        Module::from_name(name).map_or(true, |m| self.is_enabled(m))
    }
}
