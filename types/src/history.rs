//! Ad-hoc query history.
//!
//! The bridge remembers the last few query strings the user submitted so
//! they can be recalled in later activations. The history is persisted by
//! `pasbridge-host` as part of the bridge state file.

use serde::{Deserialize, Serialize};

const MAX_QUERY_HISTORY: usize = 10;

/// Bounded history of ad-hoc query strings, most-recent-first.
///
/// Entries are deduplicated by exact string match: recording a query that
/// is already present moves it to the front instead of appending a second
/// copy. The buffer is capped at the 10 most recent distinct queries.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHistory {
    queries: Vec<String>,
}

impl QueryHistory {
    /// Record a submitted query.
    ///
    /// Blank queries are ignored. An exact duplicate of an existing entry
    /// is moved to the front; otherwise the query is inserted at the front
    /// and the oldest entry beyond the cap is dropped.
    pub fn record(&mut self, query: &str) {
        if query.trim().is_empty() {
            return;
        }
        if let Some(pos) = self.queries.iter().position(|q| q == query) {
            let existing = self.queries.remove(pos);
            self.queries.insert(0, existing);
            return;
        }
        self.queries.insert(0, query.to_string());
        self.queries.truncate(MAX_QUERY_HISTORY);
    }

    /// Entries, most recent first.
    #[must_use]
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_QUERY_HISTORY, QueryHistory};

    #[test]
    fn record_stores_most_recent_first() {
        let mut history = QueryHistory::default();
        history.record("SELECT 1");
        history.record("SELECT 2");
        assert_eq!(history.queries(), ["SELECT 2", "SELECT 1"]);
    }

    #[test]
    fn duplicate_moves_to_front_instead_of_appending() {
        let mut history = QueryHistory::default();
        history.record("A");
        history.record("B");
        history.record("A");
        assert_eq!(history.queries(), ["A", "B"]);
    }

    #[test]
    fn dedup_is_exact_match() {
        let mut history = QueryHistory::default();
        history.record("select *");
        history.record("SELECT *");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn caps_at_ten_most_recent() {
        let mut history = QueryHistory::default();
        for i in 0..11 {
            history.record(&format!("query {i}"));
        }
        assert_eq!(history.len(), MAX_QUERY_HISTORY);
        assert_eq!(history.queries()[0], "query 10");
        assert_eq!(history.queries()[9], "query 1");
        assert!(!history.queries().contains(&"query 0".to_string()));
    }

    #[test]
    fn blank_queries_are_ignored() {
        let mut history = QueryHistory::default();
        history.record("");
        history.record("   ");
        assert!(history.is_empty());
    }

    #[test]
    fn serialization_roundtrip() {
        let mut history = QueryHistory::default();
        history.record("SELECT name FROM scopes");
        history.record("SELECT 1");

        let json = serde_json::to_string(&history).unwrap();
        let restored: QueryHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, history);
    }
}
