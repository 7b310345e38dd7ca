//! Score ranking
//!
//! Top scores ordered by score (highest first), newer entries first on ties,
//! capped at `MAX_RANKING_ENTRIES`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub use crate::consts::MAX_RANKING_ENTRIES;

/// A single finished session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_name: String,
    pub score: i64,
    /// Unix timestamp (ms) when recorded
    pub timestamp: i64,
}

/// Ranking order: score descending, then timestamp descending
fn rank_order(a: &ScoreEntry, b: &ScoreEntry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Ranking {
    entries: Vec<ScoreEntry>,
}

impl Ranking {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build from arbitrary entries, restoring order and cap
    pub fn from_entries(mut entries: Vec<ScoreEntry>) -> Self {
        entries.sort_by(rank_order);
        entries.truncate(MAX_RANKING_ENTRIES);
        Self { entries }
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    /// Check if a score would make it onto the ranking right now
    pub fn qualifies(&self, score: i64) -> bool {
        if self.entries.len() < MAX_RANKING_ENTRIES {
            return true;
        }
        // Newer entries win ties, so matching the lowest score is enough
        self.entries.last().is_none_or(|e| score >= e.score)
    }

    /// Get the rank a new score would achieve (1-indexed, None if it would be trimmed)
    pub fn potential_rank(&self, score: i64) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let rank = self.entries.iter().position(|e| score >= e.score);
        Some(rank.unwrap_or(self.entries.len()) + 1)
    }

    /// Insert an entry, re-sort and trim.
    /// Returns the rank achieved (1-indexed) or None if it was trimmed away.
    pub fn insert(&mut self, entry: ScoreEntry) -> Option<usize> {
        let probe = entry.clone();
        self.entries.push(entry);
        self.entries.sort_by(rank_order);
        self.entries.truncate(MAX_RANKING_ENTRIES);
        self.entries.iter().position(|e| *e == probe).map(|i| i + 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the top score (if any)
    pub fn top_score(&self) -> Option<i64> {
        self.entries.first().map(|e| e.score)
    }
}

/// Format an entry timestamp relative to `now_ms`
pub fn format_date(timestamp: i64, now_ms: i64) -> String {
    let diff_mins = (now_ms - timestamp).max(0) / 60_000;
    let diff_hours = diff_mins / 60;
    let diff_days = diff_hours / 24;

    if diff_days >= 1 {
        match diff_days {
            1 => "Yesterday".to_string(),
            d => format!("{} days ago", d),
        }
    } else if diff_hours >= 1 {
        match diff_hours {
            1 => "1 hour ago".to_string(),
            h => format!("{} hours ago", h),
        }
    } else if diff_mins >= 1 {
        match diff_mins {
            1 => "1 min ago".to_string(),
            m => format!("{} mins ago", m),
        }
    } else {
        "Just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, score: i64, timestamp: i64) -> ScoreEntry {
        ScoreEntry {
            player_name: name.to_string(),
            score,
            timestamp,
        }
    }

    fn is_sorted(ranking: &Ranking) -> bool {
        ranking
            .entries()
            .windows(2)
            .all(|w| rank_order(&w[0], &w[1]) != Ordering::Greater)
    }

    #[test]
    fn test_insert_orders_by_score_then_newest() {
        let mut ranking = Ranking::new();
        assert_eq!(ranking.insert(entry("a", 50, 1)), Some(1));
        assert_eq!(ranking.insert(entry("b", 80, 2)), Some(1));
        assert_eq!(ranking.insert(entry("c", 50, 3)), Some(2));

        let names: Vec<_> = ranking
            .entries()
            .iter()
            .map(|e| e.player_name.as_str())
            .collect();
        assert_eq!(names, ["b", "c", "a"]);
        assert!(is_sorted(&ranking));
    }

    #[test]
    fn test_insert_trims_to_cap() {
        let mut ranking = Ranking::new();
        for i in 0..(MAX_RANKING_ENTRIES as i64 + 5) {
            ranking.insert(entry("p", i, i));
        }
        assert_eq!(ranking.len(), MAX_RANKING_ENTRIES);
        assert_eq!(ranking.top_score(), Some(MAX_RANKING_ENTRIES as i64 + 4));
        assert!(is_sorted(&ranking));

        // Lower than everything on a full board: trimmed
        assert!(!ranking.qualifies(-1));
        assert_eq!(ranking.insert(entry("late", -1, 100)), None);
        assert_eq!(ranking.len(), MAX_RANKING_ENTRIES);
    }

    #[test]
    fn test_negative_scores_rank() {
        let mut ranking = Ranking::new();
        ranking.insert(entry("a", -20, 1));
        ranking.insert(entry("b", -5, 2));
        assert_eq!(ranking.top_score(), Some(-5));
    }

    #[test]
    fn test_potential_rank_matches_insert() {
        let mut ranking = Ranking::new();
        ranking.insert(entry("a", 30, 1));
        ranking.insert(entry("b", 10, 2));
        assert_eq!(ranking.potential_rank(20), Some(2));
        assert_eq!(ranking.potential_rank(30), Some(1));
        assert_eq!(ranking.insert(entry("c", 30, 3)), Some(1));
    }

    #[test]
    fn test_from_entries_restores_invariants() {
        let entries = (0..15).map(|i| entry("p", i % 4, i)).collect();
        let ranking = Ranking::from_entries(entries);
        assert_eq!(ranking.len(), MAX_RANKING_ENTRIES);
        assert!(is_sorted(&ranking));
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let mut ranking = Ranking::new();
        ranking.insert(entry("a", 1, 2));
        let json = serde_json::to_string(&ranking).unwrap();
        assert!(json.starts_with('['));
        let back: Ranking = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ranking);
    }

    #[test]
    fn test_format_date() {
        let now = 10 * 86_400_000;
        assert_eq!(format_date(now, now), "Just now");
        assert_eq!(format_date(now - 60_000, now), "1 min ago");
        assert_eq!(format_date(now - 3 * 3_600_000, now), "3 hours ago");
        assert_eq!(format_date(now - 86_400_000, now), "Yesterday");
        assert_eq!(format_date(now - 4 * 86_400_000, now), "4 days ago");
    }
}
