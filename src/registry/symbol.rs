//! Symbol descriptors and the handler trait

use super::order::Stage;
use crate::runtime::ExecFrame;
use crate::task::TaskContext;

/// Stable numeric id assigned to a symbol by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind tag controlling how the generic execution path treats a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Ordinary check with its own invocation entry point
    Normal,

    /// Carries no logic of its own; resolved through a parent symbol
    Virtual,

    /// Queries other symbols' state; evaluated by a dedicated collaborator
    Composite,

    /// Statistical classification; evaluated by a dedicated collaborator
    Classifier,
}

/// Capability flags of a symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolFlags {
    /// Exempt from the settings overlay's disable-all sweep
    pub skip_disable: bool,

    /// Fine-grained symbol, not subject to the score budget early-exit
    pub fine: bool,
}

/// Per-symbol logic supplied by the check implementation.
///
/// The invocation contract: `call` must either finalize the symbol
/// synchronously via [`ExecFrame::finalize`], or register outstanding work
/// via [`ExecFrame::add_async_event`] before returning. Doing neither is a
/// programming error that aborts processing of the message.
pub trait SymbolHandler {
    /// Permission predicate: may this symbol run for this message at all
    fn is_allowed(&self, _task: &TaskContext) -> bool {
        true
    }

    /// Precondition predicate, evaluated after permission
    fn check_conditions(&self, _task: &TaskContext) -> bool {
        true
    }

    /// Invocation entry point
    fn call(&self, task: &mut TaskContext, frame: &mut ExecFrame<'_>);
}

impl<F> SymbolHandler for F
where
    F: Fn(&mut TaskContext, &mut ExecFrame<'_>),
{
    fn call(&self, task: &mut TaskContext, frame: &mut ExecFrame<'_>) {
        self(task, frame)
    }
}

/// A registered check: identity, scheduling metadata and its logic
pub struct Symbol {
    /// Stable id, assigned when the symbol is added to the registry
    pub id: SymbolId,

    /// Unique symbol name
    pub name: String,

    /// Scheduling priority; direction of "better" depends on the stage
    pub priority: i32,

    /// Kind tag
    pub kind: SymbolKind,

    /// Capability flags
    pub flags: SymbolFlags,

    /// Stage whose subsequence this symbol belongs to
    pub stage: Stage,

    /// Ids of symbols that must finish before this one may run
    pub deps: Vec<SymbolId>,

    /// Check logic; absent for virtual symbols
    pub handler: Option<Box<dyn SymbolHandler>>,
}

impl Symbol {
    /// Create a normal symbol with no flags, deps or handler
    pub fn new(name: impl Into<String>, stage: Stage, priority: i32) -> Self {
        Self {
            id: SymbolId(0),
            name: name.into(),
            priority,
            kind: SymbolKind::Normal,
            flags: SymbolFlags::default(),
            stage,
            deps: Vec::new(),
            handler: None,
        }
    }

    /// Set the kind tag
    pub fn with_kind(mut self, kind: SymbolKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the capability flags
    pub fn with_flags(mut self, flags: SymbolFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Declare dependencies on previously registered symbols
    pub fn with_deps(mut self, deps: Vec<SymbolId>) -> Self {
        self.deps = deps;
        self
    }

    /// Attach the check logic
    pub fn with_handler(mut self, handler: impl SymbolHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Whether this symbol carries no logic of its own
    pub fn is_virtual(&self) -> bool {
        self.kind == SymbolKind::Virtual
    }

    /// Evaluate the permission predicate
    pub fn allowed(&self, task: &TaskContext) -> bool {
        self.handler.as_ref().map(|h| h.is_allowed(task)).unwrap_or(true)
    }

    /// Evaluate the precondition predicate
    pub fn conditions(&self, task: &TaskContext) -> bool {
        self.handler
            .as_ref()
            .map(|h| h.check_conditions(task))
            .unwrap_or(true)
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Symbol")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("stage", &self.stage)
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_builder() {
        let sym = Symbol::new("TEST", Stage::Filter, 5)
            .with_kind(SymbolKind::Composite)
            .with_flags(SymbolFlags {
                skip_disable: true,
                fine: false,
            })
            .with_deps(vec![SymbolId(1), SymbolId(2)]);

        assert_eq!(sym.name, "TEST");
        assert_eq!(sym.priority, 5);
        assert_eq!(sym.kind, SymbolKind::Composite);
        assert!(sym.flags.skip_disable);
        assert_eq!(sym.deps.len(), 2);
        assert!(sym.handler.is_none());
    }

    #[test]
    fn test_predicates_default_true_without_handler() {
        let sym = Symbol::new("VIRT", Stage::Filter, 0).with_kind(SymbolKind::Virtual);
        let task = TaskContext::new(0);

        assert!(sym.is_virtual());
        assert!(sym.allowed(&task));
        assert!(sym.conditions(&task));
    }
}
