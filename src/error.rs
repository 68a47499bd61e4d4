//! Error types for the scheduler runtime

use thiserror::Error;

/// Errors that abort processing of a single message.
///
/// Soft conditions (unknown symbol names, cache misses, the backlog signal)
/// are never surfaced here; they are logged and ignored at the point of
/// occurrence. A variant of this enum means the message cannot continue in a
/// consistent state. Other messages are unaffected since runtimes are
/// message-scoped.
#[derive(Debug, Error)]
pub enum Error {
    /// A symbol's invocation returned without finalizing itself and without
    /// registering outstanding async work. Programming error in the symbol
    /// implementation, not a recoverable condition.
    #[error("symbol {symbol} has no async events pending but is not finalized")]
    UnbalancedAsync { symbol: String },
}
