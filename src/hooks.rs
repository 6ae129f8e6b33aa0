//! Per-collection extension points
//!
//! Each [`Collection`](crate::collection::Collection) owns its own `Hooks`.
//! Nothing here is global, so two collections in one process never see each
//! other's listeners.

use tracing::debug;

use crate::models::Card;

/// Callback invoked when a card becomes a leech
///
/// Returns `true` to allow the configured leech action (suspension) to run.
pub type LeechHandler = Box<dyn Fn(&Card) -> bool + Send>;

#[derive(Default)]
pub struct Hooks {
    leech: Vec<LeechHandler>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a leech listener
    pub fn on_leech<F>(&mut self, handler: F)
    where
        F: Fn(&Card) -> bool + Send + 'static,
    {
        self.leech.push(Box::new(handler));
    }

    /// Notifies every leech listener
    ///
    /// ### Returns
    ///
    /// `false` if any listener vetoed the leech action; `true` otherwise,
    /// including when no listener is registered
    pub fn run_leech(&self, card: &Card) -> bool {
        let mut allow = true;
        for handler in &self.leech {
            if !handler(card) {
                allow = false;
            }
        }
        if !allow {
            debug!(card_id = card.id, "Leech action vetoed by listener");
        }
        allow
    }

    pub fn clear(&mut self) {
        self.leech.clear();
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").field("leech", &self.leech.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_no_listener_allows() {
        let hooks = Hooks::new();
        assert!(hooks.run_leech(&Card::new(1, 1, 1, 0, 0)));
    }

    #[test]
    fn test_any_veto_blocks_and_all_listeners_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut hooks = Hooks::new();
        let c1 = calls.clone();
        hooks.on_leech(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
            false
        });
        let c2 = calls.clone();
        hooks.on_leech(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert!(!hooks.run_leech(&Card::new(1, 1, 1, 0, 0)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        hooks.clear();
        assert!(hooks.run_leech(&Card::new(1, 1, 1, 0, 0)));
    }
}
