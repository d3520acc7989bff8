//! Generation naming: `<alias>_<millis>`, strictly increasing per process and
//! past any suffix already recorded for the alias.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

#[derive(Debug, Default)]
pub struct GenerationNamer {
    last_suffix: AtomicI64,
}

impl GenerationNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next generation name for `alias`.
    ///
    /// The suffix is the current time in milliseconds, bumped past the last
    /// issued suffix when the clock has not advanced.
    pub fn next(&self, alias: &str) -> String {
        self.next_after(alias, None)
    }

    /// Like [`next`](Self::next), but also strictly above `floor`, the
    /// highest suffix another namer has already used for this alias.
    pub fn next_after(&self, alias: &str, floor: Option<i64>) -> String {
        let now = match floor {
            Some(floor) => Utc::now().timestamp_millis().max(floor + 1),
            None => Utc::now().timestamp_millis(),
        };
        let previous = self
            .last_suffix
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        generation_name(alias, now.max(previous + 1))
    }
}

pub fn generation_name(alias: &str, suffix: i64) -> String {
    format!("{alias}_{suffix}")
}

/// The suffix of a generation name belonging to `alias`.
pub fn generation_suffix(name: &str, alias: &str) -> Option<i64> {
    name.strip_prefix(alias)?.strip_prefix('_')?.parse().ok()
}
