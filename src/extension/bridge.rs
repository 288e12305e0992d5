//! The boundary between the engine and configuration-supplied callables.
//!
//! Every callable runs through [`guarded`]: an `Err` or a panic is logged and the
//! call becomes a no-op, so the engine operation that triggered it carries on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{error, warn};

use super::flags::Flags;
use super::hooks::{Callback, Hook, Hooks, StatusQuery};

/// Hooks may trigger further hooks; past this depth they are skipped
pub const MAX_CALL_DEPTH: usize = 16;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Run an external callable, catching both errors and panics.
/// Returns `None` if it failed.
pub fn guarded<T>(what: &str, f: impl FnOnce() -> anyhow::Result<T>) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!(callable = what, error = %format!("{:#}", e), "Callable failed");
            None
        }
        Err(payload) => {
            error!(
                callable = what,
                panic = panic_message(payload.as_ref()),
                "Callable panicked"
            );
            None
        }
    }
}

/// Hook table, status query and flags, plus reentrancy tracking
#[derive(Default)]
pub struct ExtensionBridge {
    hooks: Hooks,
    status_query: Option<StatusQuery>,
    flags: Flags,
    /// Callables currently on the stack
    depth: usize,
}

impl ExtensionBridge {
    pub fn new(flags: Flags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn hook(&self, hook: Hook) -> Option<Callback> {
        self.hooks.get(hook)
    }

    pub fn set_status_query(&mut self, query: Option<StatusQuery>) {
        self.status_query = query;
    }

    pub fn status_query(&self) -> Option<StatusQuery> {
        self.status_query.clone()
    }

    /// Reserve a call slot. Returns false when nesting is too deep.
    pub fn enter(&mut self, what: &str) -> bool {
        if self.depth >= MAX_CALL_DEPTH {
            warn!(callable = what, depth = self.depth, "Callable nesting too deep, skipping");
            return false;
        }
        self.depth += 1;
        true
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    #[test]
    fn test_guarded_passes_values_through() {
        assert_eq!(guarded("ok", || Ok(5)), Some(5));
    }

    #[test]
    fn test_guarded_swallows_errors() {
        let result: Option<()> = guarded("failing", || bail!("boom"));
        assert!(result.is_none());
    }

    #[test]
    fn test_guarded_swallows_panics() {
        let result: Option<()> = guarded("panicking", || panic!("kaboom"));
        assert!(result.is_none());
        let result: Option<()> = guarded("panicking", || panic!("{}", String::from("formatted")));
        assert!(result.is_none());
    }

    #[test]
    fn test_depth_limit() {
        let mut bridge = ExtensionBridge::default();
        for _ in 0..MAX_CALL_DEPTH {
            assert!(bridge.enter("hook"));
        }
        assert!(!bridge.enter("hook"));
        bridge.leave();
        assert!(bridge.enter("hook"));
        assert_eq!(bridge.depth(), MAX_CALL_DEPTH);
    }
}
