//! Append-only line buffer shared between a writer and a renderer

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle to a shared, append-only list of log lines
///
/// Writers only ever append; readers take snapshots. A poisoned lock is recovered
/// instead of propagated, since a half-written line list is still worth showing.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, line: impl Into<String>) {
        self.lock().push(line.into());
    }

    pub fn extend<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().extend(lines.into_iter().map(Into::into));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// The last `n` lines, oldest first
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lock();
        let start = lines.len().saturating_sub(n);
        lines[start..].to_vec()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
