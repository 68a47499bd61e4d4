//! Stage taxonomy and the sorted symbol order snapshot
//!
//! The order is built once by the registry (and rebuilt lazily when symbols
//! change) and shared read-only with every per-message runtime via `Arc`. A
//! runtime created against one snapshot keeps it for the whole message even
//! if the registry re-sorts for later messages.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use super::symbol::{Symbol, SymbolId};

/// One phase of message processing with its own symbol subsequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Connection-level filters, run before the message body is read
    ConnFilter,
    /// Pre-filters, run before the main filter pass
    PreFilter,
    /// The main filter pass, dependency-aware
    Filter,
    /// Post-filters, run after scoring
    PostFilter,
    /// Idempotent filters, run last; must not alter the result
    Idempotent,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 5] = [
        Stage::ConnFilter,
        Stage::PreFilter,
        Stage::Filter,
        Stage::PostFilter,
        Stage::Idempotent,
    ];

    /// Priority direction this stage schedules in
    pub fn priority_order(self) -> PriorityOrder {
        match self {
            Stage::ConnFilter | Stage::PreFilter | Stage::Filter => PriorityOrder::Ascending,
            Stage::PostFilter | Stage::Idempotent => PriorityOrder::Descending,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnFilter => write!(f, "connfilters"),
            Self::PreFilter => write!(f, "prefilters"),
            Self::Filter => write!(f, "filters"),
            Self::PostFilter => write!(f, "postfilters"),
            Self::Idempotent => write!(f, "idempotent"),
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connfilters" => Ok(Self::ConnFilter),
            "prefilters" => Ok(Self::PreFilter),
            "filters" => Ok(Self::Filter),
            "postfilters" => Ok(Self::PostFilter),
            "idempotent" => Ok(Self::Idempotent),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

/// Comparator direction for a stage's watermark deferral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityOrder {
    /// Lower numeric priority runs first
    Ascending,
    /// Higher numeric priority runs first
    Descending,
}

impl PriorityOrder {
    /// Whether `priority` is strictly worse than the watermark
    pub fn is_worse(self, priority: i32, watermark: i32) -> bool {
        match self {
            PriorityOrder::Ascending => priority > watermark,
            PriorityOrder::Descending => priority < watermark,
        }
    }
}

/// Immutable, sorted snapshot of all registered symbols.
///
/// Indexes into the snapshot double as indexes into a runtime's dynamic item
/// table, so cross-references between the two are plain `usize` values.
pub struct SymbolOrder {
    items: Vec<Arc<Symbol>>,
    by_id: HashMap<SymbolId, usize>,
    by_name: HashMap<String, usize>,
    stages: HashMap<Stage, Vec<usize>>,
}

impl SymbolOrder {
    /// Build a snapshot from the registry's symbol table. Keeps the table's
    /// insertion order for the item slots; each stage subsequence is sorted
    /// best-priority-first for that stage's direction.
    pub(super) fn build(items: Vec<Arc<Symbol>>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        let mut stages: HashMap<Stage, Vec<usize>> = HashMap::new();

        for (index, item) in items.iter().enumerate() {
            by_id.insert(item.id, index);
            by_name.insert(item.name.clone(), index);
            stages.entry(item.stage).or_default().push(index);
        }

        for (stage, list) in stages.iter_mut() {
            match stage.priority_order() {
                PriorityOrder::Ascending => list.sort_by_key(|&i| items[i].priority),
                PriorityOrder::Descending => list.sort_by_key(|&i| Reverse(items[i].priority)),
            }
        }

        Self {
            items,
            by_id,
            by_name,
            stages,
        }
    }

    /// Number of symbols in the snapshot
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Symbol at a slot index
    pub fn symbol(&self, index: usize) -> &Arc<Symbol> {
        &self.items[index]
    }

    /// Exact id → index resolution
    pub fn index_of(&self, id: SymbolId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// Exact name → index resolution
    pub fn index_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Symbol looked up by name
    pub fn symbol_by_name(&self, name: &str) -> Option<&Arc<Symbol>> {
        self.index_by_name(name).map(|i| &self.items[i])
    }

    /// Slot indexes of a stage's subsequence, best priority first
    pub fn stage_indices(&self, stage: Stage) -> &[usize] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate all symbols in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Symbol>> {
        self.items.iter()
    }
}
