//! Per-document analysis cache
//!
//! Bounded FIFO keyed by document URI. Re-analysing a document keeps its
//! insertion slot; the oldest document is evicted once the bound is passed.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::trace;

use super::{Analyzer, StageTimings};
use crate::diagnostics::{self, Diagnostic};
use crate::semantic::{ModuleContext, SemanticState, SymbolIndex, TypeMap};
use crate::syntax::ast::Program;

/// Analysis of one document version
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub uri: String,
    pub version: i64,
    pub source: String,
    pub program: Option<Arc<Program>>,
    pub diagnostics: Vec<Diagnostic>,
    pub semantic: Option<Arc<SemanticState>>,
    pub timings: StageTimings,
    /// Program and semantic state were carried over from the last
    /// error-free version
    pub from_last_good: bool,
}

impl ProcessedDocument {
    pub fn symbols(&self) -> Option<&SymbolIndex> {
        self.semantic.as_deref().map(|s| &s.symbols)
    }

    pub fn modules(&self) -> Option<&ModuleContext> {
        self.semantic.as_deref().map(|s| &s.modules)
    }

    pub fn types(&self) -> Option<&TypeMap> {
        self.semantic.as_deref().map(|s| &s.types)
    }

    fn is_version(&self, version: i64, source: &str) -> bool {
        self.version == version && self.source == source
    }

    pub fn has_errors(&self) -> bool {
        diagnostics::has_errors(&self.diagnostics)
    }
}

#[derive(Debug)]
struct CacheEntry {
    document: ProcessedDocument,
    last_good: Option<(Arc<Program>, Arc<SemanticState>)>,
}

#[derive(Debug)]
pub struct DocumentCache {
    capacity: usize,
    keep_last_good: bool,
    entries: IndexMap<String, CacheEntry>,
}

impl DocumentCache {
    pub fn new(capacity: usize, keep_last_good: bool) -> Self {
        Self {
            capacity: capacity.max(1),
            keep_last_good,
            entries: IndexMap::new(),
        }
    }

    /// Cache sized and configured from an analyzer's settings
    pub fn for_analyzer(analyzer: &Analyzer) -> Self {
        let config = analyzer.config();
        Self::new(config.cache_capacity, config.keep_last_good)
    }

    /// Analyse `source` unless this exact version is already cached
    pub fn process(
        &mut self,
        analyzer: &Analyzer,
        uri: &str,
        version: i64,
        source: &str,
    ) -> &ProcessedDocument {
        let cached = self
            .entries
            .get_index_of(uri)
            .filter(|&i| self.entries[i].document.is_version(version, source));
        let index = match cached {
            Some(index) => {
                trace!(uri, version, "cache hit");
                index
            }
            None => self.refresh(analyzer, uri, version, source),
        };
        &self.entries[index].document
    }

    /// Analyse and store; returns the entry's index
    fn refresh(&mut self, analyzer: &Analyzer, uri: &str, version: i64, source: &str) -> usize {
        let result = analyzer.analyze(source);
        let mut last_good = self.entries.get(uri).and_then(|e| e.last_good.clone());

        let mut document = ProcessedDocument {
            uri: uri.to_string(),
            version,
            source: source.to_string(),
            program: result.program,
            diagnostics: result.diagnostics,
            semantic: result.semantic,
            timings: result.timings,
            from_last_good: false,
        };

        if let (true, Some(program), Some(semantic)) =
            (result.ok, &document.program, &document.semantic)
        {
            last_good = Some((Arc::clone(program), Arc::clone(semantic)));
        } else if self.keep_last_good
            && (document.program.is_none() || document.semantic.is_none())
        {
            if let Some((program, semantic)) = &last_good {
                trace!(uri, version, "substituting last good analysis");
                document.program = Some(Arc::clone(program));
                document.semantic = Some(Arc::clone(semantic));
                document.from_last_good = true;
            }
        }

        if !self.entries.contains_key(uri) {
            while self.entries.len() >= self.capacity {
                if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                    trace!(uri = %evicted, "cache eviction");
                }
            }
        }
        // Replacing an existing key keeps its position.
        let (index, _) = self.entries.insert_full(
            uri.to_string(),
            CacheEntry {
                document,
                last_good,
            },
        );
        index
    }

    pub fn get(&self, uri: &str) -> Option<&ProcessedDocument> {
        self.entries.get(uri).map(|e| &e.document)
    }

    pub fn remove(&mut self, uri: &str) -> Option<ProcessedDocument> {
        self.entries.shift_remove(uri).map(|e| e.document)
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
