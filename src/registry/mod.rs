//! Long-lived symbol registry
//!
//! The registry owns the set of registered symbols, their group membership
//! and the sorted order snapshot shared with per-message runtimes. It also
//! carries the last-profile timestamp shared across messages; runtimes read
//! and update it through accessors rather than ambient state.
//!
//! Dependency-graph construction and topological sorting happen before
//! symbols reach the registry; `maybe_resort` only rebuilds the per-stage
//! priority ordering when the symbol set changed.

mod order;
mod symbol;

pub use order::{PriorityOrder, Stage, SymbolOrder};
pub use symbol::{Symbol, SymbolFlags, SymbolHandler, SymbolId, SymbolKind};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

/// Registry of all known symbols and their group membership
pub struct Registry {
    symbols: Vec<Arc<Symbol>>,
    groups: HashMap<String, Vec<String>>,
    order: Option<Arc<SymbolOrder>>,
    dirty: bool,
    last_profile: Option<Instant>,
    next_id: u32,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            groups: HashMap::new(),
            order: None,
            dirty: false,
            last_profile: None,
            next_id: 0,
        }
    }

    /// Register a symbol, assigning its stable id. Marks the order stale.
    pub fn add(&mut self, mut symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.next_id);
        self.next_id += 1;
        symbol.id = id;

        debug!(symbol = %symbol.name, %id, stage = %symbol.stage, "registered symbol");
        self.symbols.push(Arc::new(symbol));
        self.dirty = true;
        id
    }

    /// Add a symbol name to a named group
    pub fn add_to_group(&mut self, group: &str, symbol_name: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .push(symbol_name.to_string());
    }

    /// Member symbol names of a group, if the group exists
    pub fn group_members(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    /// Rebuild the order snapshot if symbols changed since the last message,
    /// and return the current snapshot.
    pub fn maybe_resort(&mut self) -> Arc<SymbolOrder> {
        match &self.order {
            Some(order) if !self.dirty => order.clone(),
            _ => {
                let order = Arc::new(SymbolOrder::build(self.symbols.clone()));
                debug!(symbols = self.symbols.len(), "rebuilt symbol order");
                self.order = Some(order.clone());
                self.dirty = false;
                order
            }
        }
    }

    /// Current order snapshot, if one has been built
    pub fn order(&self) -> Option<Arc<SymbolOrder>> {
        self.order.clone()
    }

    /// When profiling was last enabled for any message
    pub fn last_profile(&self) -> Option<Instant> {
        self.last_profile
    }

    /// Record that profiling was enabled at `when`
    pub fn set_last_profile(&mut self, when: Instant) {
        self.last_profile = Some(when);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
