//! Per-message scheduler runtime
//!
//! One [`Runtime`] is created per in-flight message and destroyed with it.
//! It owns the dynamic item table (one transient state record per symbol in
//! the order snapshot), a small MRU id→index cache, the profiling decision
//! and the inflight bookkeeping for asynchronous symbols.

mod cache;
mod config;
mod core;
mod item;
mod settings;

pub use config::RuntimeConfig;
pub use core::Runtime;
pub use item::{DynamicItem, ExecFrame};
