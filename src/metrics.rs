//! Minimal in-process counters for game activity.
//! Counters are process-local and reset on restart; they feed log lines and
//! the `status` command, not an exposition endpoint.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

static LEVEL_COUNTERS: OnceLock<Mutex<HashMap<String, LevelCounter>>> = OnceLock::new();

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LevelCounter {
    pub views: u64,
    pub completions: u64,
}

fn level_counter_lock() -> &'static Mutex<HashMap<String, LevelCounter>> {
    LEVEL_COUNTERS.get_or_init(|| Mutex::new(HashMap::new()))
}

pub fn record_level_view(slug: &str) -> LevelCounter {
    let mut guard = level_counter_lock()
        .lock()
        .expect("level counter mutex poisoned");
    let counter = guard.entry(slug.to_string()).or_default();
    counter.views = counter.views.saturating_add(1);
    *counter
}

pub fn record_level_completion(slug: &str) -> LevelCounter {
    let mut guard = level_counter_lock()
        .lock()
        .expect("level counter mutex poisoned");
    let counter = guard.entry(slug.to_string()).or_default();
    counter.completions = counter.completions.saturating_add(1);
    *counter
}

pub fn level_counters_snapshot() -> HashMap<String, LevelCounter> {
    level_counter_lock()
        .lock()
        .expect("level counter mutex poisoned")
        .clone()
}

#[cfg(test)]
pub(crate) fn reset_level_counters_for_tests() {
    if let Some(lock) = LEVEL_COUNTERS.get() {
        let mut guard = lock.lock().expect("level counter mutex poisoned");
        guard.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_and_completion_counters_accumulate() {
        reset_level_counters_for_tests();
        assert!(level_counters_snapshot().is_empty());

        let after_view = record_level_view("puzzle");
        assert_eq!(after_view.views, 1);
        assert_eq!(after_view.completions, 0);

        record_level_view("puzzle");
        let after_completion = record_level_completion("puzzle");
        assert_eq!(after_completion.views, 2);
        assert_eq!(after_completion.completions, 1);

        let snapshot = level_counters_snapshot();
        assert_eq!(snapshot.get("puzzle").unwrap().views, 2);
        assert!(snapshot.get("volume").is_none());
    }
}
