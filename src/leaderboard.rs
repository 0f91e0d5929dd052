use chrono::{DateTime, Local};
use itertools::Itertools;
use time_humanize::{Accuracy, HumanTime, Tense};

/// Rows always shown from the top of the ranking
const TOP_ROWS: usize = 2;
/// Rows shown when the current player is not placed below the top rows
const DEFAULT_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    /// 1-based rank
    pub position: usize,
    pub nick: String,
    pub score: i64,
    pub updated_at: DateTime<Local>,
}

impl LeaderboardEntry {
    /// "3 hours ago" style age of the last score change
    pub fn last_played(&self, now: DateTime<Local>) -> String {
        let age = (now - self.updated_at).to_std().unwrap_or_default();
        HumanTime::from(age).to_text_en(Accuracy::Rough, Tense::Past)
    }
}

/// Pick the rows to display: the top of the ranking, plus a window around the
/// current player when they are ranked further down.
pub fn select_window<'a>(
    ranking: &'a [LeaderboardEntry],
    current: Option<&str>,
) -> Vec<&'a LeaderboardEntry> {
    let position = current.and_then(|nick| ranking.iter().position(|e| e.nick == nick));

    match position {
        Some(idx) if idx >= TOP_ROWS => {
            let start = idx.saturating_sub(1);
            let end = (idx + 2).min(ranking.len());
            ranking[..TOP_ROWS]
                .iter()
                .chain(ranking[start..end].iter())
                .unique_by(|e| e.position)
                .collect()
        }
        _ => ranking.iter().take(DEFAULT_ROWS).collect(),
    }
}
