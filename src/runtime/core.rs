//! Runtime lifecycle, stage driver and the symbol execution state machine

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::error::Error;
use crate::registry::{Registry, Stage, Symbol, SymbolId, SymbolKind, SymbolOrder};
use crate::task::TaskContext;

use super::cache::IdIndexCache;
use super::config::RuntimeConfig;
use super::item::{DynamicItem, ExecFrame};

/// Per-message scheduler state.
///
/// Owns one [`DynamicItem`] per symbol in the order snapshot, the id→index
/// cache, the profiling decision and the inflight bookkeeping. Never shared
/// across threads or messages; all mutation happens on the thread driving
/// the message's event loop.
pub struct Runtime {
    pub(super) order: Arc<SymbolOrder>,
    pub(super) items: Vec<DynamicItem>,
    pub(super) id_cache: IdIndexCache,
    pub(super) profile: bool,
    pub(super) profile_start: Instant,
    pub(super) cur_item: Option<usize>,
    pub(super) items_inflight: u32,
    pub(super) has_slow: bool,
    pub(super) skipped: bool,
}

impl Runtime {
    /// Create the runtime for one message.
    ///
    /// Triggers the registry's lazy re-sort, zero-initializes the dynamic
    /// item table against the resulting snapshot and computes the profiling
    /// decision: profile when the registry's last sample is unset or stale,
    /// when the message is large, or on a random draw.
    pub fn create(task: &mut TaskContext, registry: &mut Registry, config: &RuntimeConfig) -> Self {
        let order = registry.maybe_resort();
        let now = task.now();

        let stale = registry
            .last_profile()
            .map(|last| now.duration_since(last) > config.profile_interval())
            .unwrap_or(true);
        let large = task.msg_size >= config.profile_size_threshold;
        let sampled = task.random_double() >= 1.0 - config.profile_probability;

        let profile = stale || large || sampled;
        if profile {
            debug!(stale, large, sampled, "enabled profiling of symbols for task");
            registry.set_last_profile(now);
        }

        Self {
            items: vec![DynamicItem::default(); order.len()],
            id_cache: IdIndexCache::new(),
            order,
            profile,
            profile_start: now,
            cur_item: None,
            items_inflight: 0,
            has_slow: false,
            skipped: false,
        }
    }

    /// Whether fine-grained timing is being recorded for this message
    pub fn profiling(&self) -> bool {
        self.profile
    }

    /// Whether the message was marked to skip symbol processing entirely
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Mark the message to skip symbol processing
    pub fn set_skipped(&mut self) {
        self.skipped = true;
    }

    /// Raise the event-loop backlog signal; the next pass observing it
    /// defers further scheduling and clears it.
    pub fn mark_slow(&mut self) {
        self.has_slow = true;
    }

    /// Symbols currently awaiting asynchronous completion
    pub fn items_inflight(&self) -> u32 {
        self.items_inflight
    }

    /// The symbol whose invocation is currently on the stack, if any
    pub fn current_symbol(&self) -> Option<&Arc<Symbol>> {
        self.cur_item.map(|i| self.order.symbol(i))
    }

    /// Resolve a symbol id to its item slot. With `save_in_cache` the MRU
    /// cache is consulted first and updated on a miss; without it, only the
    /// exact map is used. Both paths resolve to the same slot.
    pub fn dynamic_item_index(&mut self, id: SymbolId, save_in_cache: bool) -> Option<usize> {
        if save_in_cache {
            if let Some(index) = self.id_cache.lookup(id) {
                return Some(index);
            }
        }

        let index = self.order.index_of(id)?;
        if save_in_cache {
            self.id_cache.insert(id, index);
        }
        Some(index)
    }

    /// Dynamic item for a symbol id, or None if the id is unknown to the
    /// order snapshot this runtime was built against
    pub fn dynamic_item(&mut self, id: SymbolId, save_in_cache: bool) -> Option<&DynamicItem> {
        let index = self.dynamic_item_index(id, save_in_cache)?;
        Some(&self.items[index])
    }

    /// Dynamic item looked up by symbol name, bypassing the cache
    pub fn item_state(&self, name: &str) -> Option<&DynamicItem> {
        let index = self.order.index_by_name(name)?;
        Some(&self.items[index])
    }

    /// Drive one pass of a stage. Returns true once every symbol in the
    /// stage's subsequence is started and finished (or was intentionally
    /// skipped as already done).
    pub fn process_stage(&mut self, task: &mut TaskContext, stage: Stage) -> Result<bool, Error> {
        debug!(%stage, "symbols processing stage");

        if self.skipped {
            return Ok(true);
        }

        let start_events = task.pending_events;
        match stage {
            Stage::Filter => self.process_filters(task),
            _ => self.process_pre_postfilters(task, stage, start_events),
        }
    }

    /// Watermark-based pass over a connection / pre / post / idempotent
    /// stage. The first pending symbol fixes the watermark; subsequent
    /// symbols with strictly worse priority are deferred while session
    /// events remain pending from before this pass began.
    fn process_pre_postfilters(
        &mut self,
        task: &mut TaskContext,
        stage: Stage,
        start_events: u32,
    ) -> Result<bool, Error> {
        let order = self.order.clone();
        let direction = stage.priority_order();
        let mut saved_priority: Option<i32> = None;
        let mut all_done = true;

        for &index in order.stage_indices(stage) {
            let item = order.symbol(index);

            if item.is_virtual() {
                // Resolved through their parent symbol, never driven here
                continue;
            }

            let pending = {
                let dyn_item = &self.items[index];
                !dyn_item.started && !dyn_item.finished
            };
            if !pending {
                continue;
            }

            if self.has_slow {
                // An earlier symbol reported backlog; let the loop drain
                self.has_slow = false;
                all_done = false;
                break;
            }

            match saved_priority {
                None => saved_priority = Some(item.priority),
                Some(watermark) => {
                    if direction.is_worse(item.priority, watermark)
                        && task.pending_events > start_events
                    {
                        // Higher priority work from this pass has not
                        // settled yet
                        debug!(
                            symbol = %item.name,
                            priority = item.priority,
                            watermark,
                            "deferring lower priority checks"
                        );
                        all_done = false;
                        break;
                    }
                }
            }

            self.process_symbol(task, item, index)?;
            all_done = false;
        }

        Ok(all_done)
    }

    /// Dependency-aware pass over the filter stage. Classifier symbols are
    /// handled elsewhere; symbols with unfinished dependencies are deferred
    /// to a later pass; once the score budget is exceeded, no further
    /// non-fine symbols are planned and the stage reports done.
    fn process_filters(&mut self, task: &mut TaskContext) -> Result<bool, Error> {
        let order = self.order.clone();
        let mut all_done = true;

        for &index in order.stage_indices(Stage::Filter) {
            let item = order.symbol(index);

            if item.kind == SymbolKind::Classifier || item.is_virtual() {
                continue;
            }

            let pending = {
                let dyn_item = &self.items[index];
                !dyn_item.started && !dyn_item.finished
            };
            if pending {
                all_done = false;

                if !self.deps_satisfied(item) {
                    debug!(symbol = %item.name, id = %item.id, "blocked execution until deps are resolved");
                    continue;
                }

                self.process_symbol(task, item, index)?;

                if self.has_slow {
                    self.has_slow = false;
                    break;
                }
            }

            if !item.flags.fine && task.score_limit_reached() {
                info!(
                    score = task.score,
                    "score limit reached, not planning more checks"
                );
                all_done = true;
                break;
            }
        }

        Ok(all_done)
    }

    /// Whether all of the symbol's declared dependencies have finished.
    /// Unknown dependency ids are soft misses, treated as satisfied.
    fn deps_satisfied(&mut self, item: &Symbol) -> bool {
        for &dep in &item.deps {
            match self.dynamic_item_index(dep, true) {
                Some(index) => {
                    if !self.items[index].finished {
                        return false;
                    }
                }
                None => {
                    debug!(dep = %dep, symbol = %item.name, "unknown dependency id, ignoring");
                }
            }
        }
        true
    }

    /// Single-symbol state machine: idle → started → finished.
    ///
    /// Returns whether the symbol has fully finished. A symbol whose
    /// invocation returns neither finalized nor with async events registered
    /// is a fatal programming error that aborts the message.
    pub fn process_symbol(
        &mut self,
        task: &mut TaskContext,
        item: &Arc<Symbol>,
        index: usize,
    ) -> Result<bool, Error> {
        if matches!(
            item.kind,
            SymbolKind::Classifier | SymbolKind::Composite | SymbolKind::Virtual
        ) {
            // Evaluated through dedicated collaborators (or, for virtuals,
            // through their parent symbol), never by this path
            return Ok(true);
        }

        if task.blocked {
            // Session is being torn down; no new events may be added
            return Ok(true);
        }

        if self.items[index].started {
            // Deps can span stages; a symbol must never be invoked twice
            return Ok(self.items[index].finished);
        }

        self.items[index].started = true;

        if !item.allowed(task) || !item.conditions(task) {
            self.items[index].finished = true;
            return Ok(true);
        }

        debug!(symbol = %item.name, id = %item.id, "execute symbol");

        if self.profile {
            self.items[index].start_offset = Some(task.now().duration_since(self.profile_start));
        }

        self.items[index].async_events = 0;
        self.cur_item = Some(index);
        self.items_inflight += 1;

        match item.handler.as_ref() {
            Some(handler) => {
                let mut frame = ExecFrame::new(&mut self.items[index], &mut self.items_inflight);
                handler.call(task, &mut frame);
            }
            None => {
                // Nothing to invoke; finalize vacuously
                self.items[index].finished = true;
                self.items_inflight -= 1;
            }
        }
        self.cur_item = None;

        if self.items_inflight == 0 {
            return Ok(true);
        }

        let dyn_item = &self.items[index];
        if dyn_item.async_events == 0 && !dyn_item.finished {
            error!(
                symbol = %item.name,
                "critical: no async events pending but the symbol is not finalized"
            );
            return Err(Error::UnbalancedAsync {
                symbol: item.name.clone(),
            });
        }

        Ok(false)
    }

    /// One unit of a symbol's outstanding async work has completed. When the
    /// last unit completes, the symbol is finalized and its inflight slot
    /// released. Returns the remaining count.
    pub fn async_event_done(&mut self, id: SymbolId) -> u32 {
        let Some(index) = self.dynamic_item_index(id, true) else {
            debug!(%id, "async completion for unknown symbol id");
            return 0;
        };

        let dyn_item = &mut self.items[index];
        dyn_item.async_events = dyn_item.async_events.saturating_sub(1);
        let remaining = dyn_item.async_events;

        if remaining == 0 && !dyn_item.finished {
            dyn_item.finished = true;
            self.items_inflight = self.items_inflight.saturating_sub(1);
            debug!(%id, "symbol finalized by async completion");
        }

        remaining
    }

    /// Force-finalize a symbol from its async machinery, abandoning any
    /// remaining async events
    pub fn finalize_item(&mut self, id: SymbolId) {
        let Some(index) = self.dynamic_item_index(id, true) else {
            debug!(%id, "finalize for unknown symbol id");
            return;
        };

        let dyn_item = &mut self.items[index];
        dyn_item.async_events = 0;
        if !dyn_item.finished {
            dyn_item.finished = true;
            self.items_inflight = self.items_inflight.saturating_sub(1);
        }
    }

    /// Whether the named symbol has begun execution for this message
    pub fn is_symbol_started(&mut self, name: &str) -> bool {
        let order = self.order.clone();
        let Some(item) = order.symbol_by_name(name) else {
            return false;
        };

        match self.dynamic_item_index(item.id, true) {
            Some(index) => self.items[index].started,
            None => false,
        }
    }

    /// Whether the named symbol is still eligible to run for this message:
    /// permitted, not yet started, and its preconditions hold. Does not
    /// mutate execution state.
    pub fn is_symbol_enabled(&mut self, task: &TaskContext, name: &str) -> bool {
        let order = self.order.clone();
        let Some(item) = order.symbol_by_name(name) else {
            debug!(symbol = %name, "cannot check eligibility: symbol not found");
            return true;
        };

        if !item.allowed(task) {
            return false;
        }

        if let Some(index) = self.dynamic_item_index(item.id, true) {
            if self.items[index].started {
                // Already started; cannot be started twice
                return false;
            }

            if !item.is_virtual() {
                return item.conditions(task);
            }
        }

        true
    }
}
