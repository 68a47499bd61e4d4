//! Task-scoped settings overlay
//!
//! Applies enable/disable directives from the task's settings object on top
//! of the default all-enabled state. Disabling a symbol marks its dynamic
//! item started and finished, so the stage driver treats it as already
//! handled; enabling resets both flags. Disables always apply after enables
//! within one call and win over them.

use serde_json::Value;
use tracing::{debug, error, info};

use crate::registry::Registry;
use crate::task::TaskContext;

use super::core::Runtime;

impl Runtime {
    /// Apply per-task setting overrides. Returns true when the message is
    /// whitelisted and should skip symbol processing entirely.
    ///
    /// Calling this without a settings object on the task is a caller
    /// contract violation: it is logged and nothing is mutated.
    pub fn apply_settings(&mut self, task: &TaskContext, registry: &Registry) -> bool {
        let Some(settings) = task.settings.as_ref() else {
            error!("apply_settings called with no settings object");
            return false;
        };

        if settings.get("whitelist").is_some() {
            info!("task is whitelisted");
            self.set_skipped();
            return true;
        }

        let mut already_disabled = false;

        if let Some(enabled) = settings.get("symbols_enabled") {
            // Disable all symbols but the explicit allow-list
            self.disable_all();
            already_disabled = true;

            for name in string_items(enabled) {
                self.enable_symbol(name);
            }
        }

        if let Some(enabled_groups) = settings.get("groups_enabled") {
            if !already_disabled {
                self.disable_all();
            }

            for name in group_member_names(registry, enabled_groups) {
                self.enable_symbol(&name);
            }
        }

        if let Some(disabled) = settings.get("symbols_disabled") {
            for name in string_items(disabled) {
                self.disable_symbol(name);
            }
        }

        if let Some(disabled_groups) = settings.get("groups_disabled") {
            for name in group_member_names(registry, disabled_groups) {
                self.disable_symbol(&name);
            }
        }

        false
    }

    /// Disable every symbol not exempt via the skip-disable flag
    pub fn disable_all(&mut self) {
        let order = self.order.clone();
        for (index, item) in order.iter().enumerate() {
            if !item.flags.skip_disable {
                let dyn_item = &mut self.items[index];
                dyn_item.started = true;
                dyn_item.finished = true;
            }
        }
    }

    /// Disable execution of the named symbol for this message. Unknown
    /// names are soft misses.
    pub fn disable_symbol(&mut self, name: &str) -> bool {
        match self.order.index_by_name(name) {
            Some(index) => {
                let dyn_item = &mut self.items[index];
                dyn_item.started = true;
                dyn_item.finished = true;
                debug!(symbol = %name, "disable execution");
                true
            }
            None => {
                debug!(symbol = %name, "cannot disable: symbol not found");
                false
            }
        }
    }

    /// Re-enable execution of the named symbol for this message. Unknown
    /// names are soft misses.
    pub fn enable_symbol(&mut self, name: &str) -> bool {
        match self.order.index_by_name(name) {
            Some(index) => {
                let dyn_item = &mut self.items[index];
                dyn_item.started = false;
                dyn_item.finished = false;
                debug!(symbol = %name, "enable execution");
                true
            }
            None => {
                debug!(symbol = %name, "cannot enable: symbol not found");
                false
            }
        }
    }
}

/// String items of a settings directive: a single string or an array of
/// strings; anything else is ignored
fn string_items(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Resolve group directives to their member symbol names. Unknown groups
/// are soft misses.
fn group_member_names(registry: &Registry, value: &Value) -> Vec<String> {
    let mut names = Vec::new();
    for group in string_items(value) {
        match registry.group_members(group) {
            Some(members) => names.extend(members.iter().cloned()),
            None => debug!(%group, "unknown symbol group in settings"),
        }
    }
    names
}
