//! Input recall log
//!
//! Densely indexed append log of prior user inputs with a single cursor
//! used by the Up/Down recall keys. Never persisted across runs.

/// Cursor-based history of submitted inputs.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: Vec<String>,
    cursor: isize,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input and park the cursor on its index.
    ///
    /// Compatibility quirk: because the cursor lands on the new entry
    /// itself, the first `previous()` after an add returns the entry
    /// that was just added, not the one before it.
    pub fn add(&mut self, input: impl Into<String>) {
        self.cursor = isize::try_from(self.entries.len()).unwrap_or(isize::MAX);
        self.entries.push(input.into());
    }

    /// Entry at the cursor, stepping backwards; `None` below the start.
    pub fn previous(&mut self) -> Option<&str> {
        let index = usize::try_from(self.cursor).ok()?;
        let entry = self.entries.get(index)?;
        self.cursor -= 1;
        Some(entry.as_str())
    }

    /// Entry just above the cursor, stepping forwards; `None` at the top.
    pub fn next(&mut self) -> Option<&str> {
        let index = usize::try_from(self.cursor + 1).ok()?;
        let entry = self.entries.get(index)?;
        self.cursor += 1;
        Some(entry.as_str())
    }

    /// Drop all entries and rewind the cursor.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::HistoryLog;

    #[test]
    fn walks_backwards_then_forwards() {
        let mut history = HistoryLog::new();
        history.add("a");
        history.add("b");

        assert_eq!(history.previous(), Some("b"));
        assert_eq!(history.previous(), Some("a"));
        assert_eq!(history.previous(), None);

        assert_eq!(history.next(), Some("a"));
        assert_eq!(history.next(), Some("b"));
        assert_eq!(history.next(), None);
    }

    #[test]
    fn first_previous_after_add_returns_the_added_entry() {
        let mut history = HistoryLog::new();
        history.add("only");
        assert_eq!(history.previous(), Some("only"));
    }

    #[test]
    fn empty_log_yields_nothing() {
        let mut history = HistoryLog::new();
        assert_eq!(history.previous(), None);
        assert_eq!(history.next(), None);
    }

    #[test]
    fn reset_clears_entries_and_cursor() {
        let mut history = HistoryLog::new();
        history.add("a");
        history.add("b");
        history.reset();

        assert!(history.is_empty());
        assert_eq!(history.previous(), None);

        history.add("c");
        assert_eq!(history.previous(), Some("c"));
    }

    #[test]
    fn add_after_navigation_reparks_the_cursor() {
        let mut history = HistoryLog::new();
        history.add("a");
        history.add("b");
        let _ = history.previous();
        let _ = history.previous();

        history.add("c");
        assert_eq!(history.len(), 3);
        assert_eq!(history.previous(), Some("c"));
        assert_eq!(history.previous(), Some("b"));
    }
}
