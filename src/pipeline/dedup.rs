//! Subject-based deduplication for one run.

use std::collections::HashSet;

/// Subjects already admitted this run. Exact, case-sensitive matching.
#[derive(Debug, Default)]
pub struct SeenSubjects {
    seen: HashSet<String>,
}

impl SeenSubjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `subject`. Returns `true` if it is new, `false` for a repeat.
    ///
    /// The empty subject is a subject like any other.
    pub fn admit(&mut self, subject: &str) -> bool {
        self.seen.insert(subject.to_string())
    }
}
