//! symsched - per-message check scheduler
//!
//! symsched drives execution of a rule/check engine over a single message.
//! Given an immutable, dependency-and-priority-sorted order of named
//! "symbols" (checks), it decides stage by stage which symbols run now,
//! which are deferred, and which are skipped, while tracking each symbol's
//! transient state and outstanding asynchronous work.
//!
//! # Core Concepts
//!
//! - **Message-Scoped Runtime**: one [`Runtime`] per in-flight message, torn
//!   down with the message; nothing persists across messages
//! - **Staged Scheduling**: connection, pre-filter, filter, post-filter and
//!   idempotent stages, each with its own priority direction
//! - **Async Completion**: a symbol's invocation may return before finishing,
//!   leaving registered async events that resume scheduling later
//! - **Settings Overlay**: per-task enable/disable directives applied on top
//!   of the default all-enabled state
//!
//! # Modules
//!
//! - [`registry`] - Symbol descriptors, the sorted order snapshot and groups
//! - [`runtime`] - The per-message scheduler runtime and stage driver
//! - [`task`] - Per-message context consumed by the scheduler
//! - [`error`] - Error taxonomy

pub mod error;
pub mod registry;
pub mod runtime;
pub mod task;

// Re-export commonly used types
pub use error::Error;
pub use registry::{
    PriorityOrder, Registry, Stage, Symbol, SymbolFlags, SymbolHandler, SymbolId, SymbolKind,
    SymbolOrder,
};
pub use runtime::{DynamicItem, ExecFrame, Runtime, RuntimeConfig};
pub use task::TaskContext;
