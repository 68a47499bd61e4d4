//! Per-symbol transient execution state

use std::time::Duration;

/// Transient state of one symbol within one message.
///
/// Invariants: `finished` implies `started`. While `started && !finished`,
/// `async_events` is the number of outstanding asynchronous sub-operations
/// registered by the symbol's own logic.
#[derive(Debug, Clone, Default)]
pub struct DynamicItem {
    /// The symbol has begun execution (or was disabled by the overlay)
    pub started: bool,

    /// The symbol has fully finished
    pub finished: bool,

    /// Outstanding asynchronous sub-operations
    pub async_events: u32,

    /// Offset from the runtime's profile start, recorded when profiling
    pub start_offset: Option<Duration>,
}

/// Handle passed to a symbol's invocation.
///
/// The invocation must either call [`finalize`](Self::finalize) before
/// returning, or register outstanding work with
/// [`add_async_event`](Self::add_async_event) and finalize later through the
/// runtime's async completion hooks.
pub struct ExecFrame<'a> {
    item: &'a mut DynamicItem,
    items_inflight: &'a mut u32,
}

impl<'a> ExecFrame<'a> {
    pub(super) fn new(item: &'a mut DynamicItem, items_inflight: &'a mut u32) -> Self {
        Self {
            item,
            items_inflight,
        }
    }

    /// Mark the symbol finished and release its inflight slot. Idempotent.
    pub fn finalize(&mut self) {
        if !self.item.finished {
            self.item.finished = true;
            *self.items_inflight = self.items_inflight.saturating_sub(1);
        }
    }

    /// Register one outstanding asynchronous sub-operation
    pub fn add_async_event(&mut self) {
        self.item.async_events += 1;
    }

    /// Outstanding async events registered so far
    pub fn async_events(&self) -> u32 {
        self.item.async_events
    }

    /// Whether the symbol has already been finalized
    pub fn is_finished(&self) -> bool {
        self.item.finished
    }
}
