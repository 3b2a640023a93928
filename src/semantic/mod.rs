//! Symbol, module and type state for a program
//!
//! [`resolve`] walks a [`Program`](crate::syntax::ast::Program) once and
//! produces a [`SemanticState`] plus resolver diagnostics. Lint, the
//! runtime and the editor features only ever read this state.

pub mod modules;
pub mod resolver;

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::diagnostics::Range;
use crate::syntax::ast::{NodeId, Store};
use crate::types::ForgeType;

pub use modules::{Module, ModuleContext, ALL_IN_ONE};
pub use resolver::{resolve, Resolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Variable,
    Function,
    Parameter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub name: String,
    pub store: Store,
    pub mutable: bool,
    pub kind: SymbolKind,
    #[serde(rename = "type")]
    pub ty: ForgeType,
    /// Written annotation, checked against later assignments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<ForgeType>,
    pub declared_at: Range,
}

/// Three independent tables, one per store
pub type StoreTables = [IndexMap<String, SymbolInfo>; 3];

/// Symbols of the document frame plus a listing table for editors
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SymbolIndex {
    pub stores: StoreTables,
    /// Every declaration seen in any frame, first one per name. Listing
    /// only: resolution never consults it.
    pub global: IndexMap<String, SymbolInfo>,
}

impl SymbolIndex {
    pub fn store(&self, store: Store) -> &IndexMap<String, SymbolInfo> {
        &self.stores[store.index()]
    }

    pub fn get(&self, store: Store, name: &str) -> Option<&SymbolInfo> {
        self.store(store).get(name)
    }

    /// Stores of the document frame that declare `name`
    pub fn stores_declaring(&self, name: &str) -> Vec<Store> {
        Store::ALL
            .into_iter()
            .filter(|s| self.store(*s).contains_key(name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.iter().all(IndexMap::is_empty) && self.global.is_empty()
    }
}

/// Inferred type per visited expression node
pub type TypeMap = HashMap<NodeId, ForgeType>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticState {
    pub symbols: SymbolIndex,
    /// Module context after the last directive
    pub modules: ModuleContext,
    pub types: TypeMap,
    /// Start offsets of builtin roots used while their module was off
    pub gated_uses: BTreeSet<usize>,
}

impl SemanticState {
    /// Safe state substituted when resolution fails internally
    pub fn fallback() -> Self {
        Self {
            symbols: SymbolIndex::default(),
            modules: ModuleContext::fallback(),
            types: TypeMap::new(),
            gated_uses: BTreeSet::new(),
        }
    }

    pub fn type_of(&self, id: NodeId) -> Option<&ForgeType> {
        self.types.get(&id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Report property problems as warnings instead of errors
    pub relaxed_member_access: bool,
    pub ignore_module_gating: bool,
}
