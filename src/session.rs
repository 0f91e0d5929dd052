use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::classifier::CancelToken;

/// Tunables for one play-through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub max_attempts: u32,
    pub round_duration_secs: u32,
    pub result_dwell_ms: u64,
    pub points_per_correct_attempt: u32,
    pub classify_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            round_duration_secs: 60,
            result_dwell_ms: 3000,
            points_per_correct_attempt: 1,
            classify_timeout_ms: 15_000,
        }
    }
}

impl EngineSettings {
    pub fn result_dwell(&self) -> Duration {
        Duration::from_millis(self.result_dwell_ms)
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_millis(self.classify_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Status {
    NotStarted,
    InRound,
    ShowingResult,
    GameOver,
}

/// Identity of a single round instance, never reused within an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoundId(pub u64);

/// How a resolved round turned out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct { label: String },
    Incorrect { label: String },
    /// The classifier failed; the attempt is worth nothing
    Unrecognized { reason: String },
}

impl Verdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct { .. })
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Verdict::Correct { label } | Verdict::Incorrect { label } => Some(label),
            Verdict::Unrecognized { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct Round {
    pub id: RoundId,
    pub target_word: String,
    /// One-shot submission guard, local to this round
    pub submitted: bool,
    pub time_remaining: u32,
    pub next_tick_at: Instant,
    pub submitted_at: Option<Instant>,
    pub cancel: CancelToken,
    pub verdict: Option<Verdict>,
    pub dwell_until: Option<Instant>,
}

impl Round {
    pub fn new(id: RoundId, target_word: String, duration_secs: u32, now: Instant) -> Self {
        Self {
            id,
            target_word,
            submitted: false,
            time_remaining: duration_secs,
            next_tick_at: now + Duration::from_secs(1),
            submitted_at: None,
            cancel: CancelToken::new(),
            verdict: None,
            dwell_until: None,
        }
    }

    pub fn is_awaiting_verdict(&self) -> bool {
        self.submitted && self.verdict.is_none()
    }
}

/// Aggregate state for one play-through
#[derive(Debug)]
pub struct GameSession {
    pub attempts_completed: u32,
    pub score_total: u32,
    pub status: Status,
    pub round: Option<Round>,
    pub persisted: bool,
    pub persist_warning: Option<String>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self {
            attempts_completed: 0,
            score_total: 0,
            status: Status::NotStarted,
            round: None,
            persisted: false,
            persist_warning: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = EngineSettings::default();
        assert_eq!(s.max_attempts, 5);
        assert_eq!(s.round_duration_secs, 60);
        assert_eq!(s.result_dwell(), Duration::from_secs(3));
        assert_eq!(s.points_per_correct_attempt, 1);
    }

    #[test]
    fn test_new_round_is_unguarded() {
        let now = Instant::now();
        let round = Round::new(RoundId(7), "cat".into(), 60, now);
        assert!(!round.submitted);
        assert!(!round.is_awaiting_verdict());
        assert_eq!(round.time_remaining, 60);
        assert_eq!(round.next_tick_at, now + Duration::from_secs(1));
    }

    #[test]
    fn test_verdict_label() {
        let v = Verdict::Correct { label: "cat".into() };
        assert!(v.is_correct());
        assert_eq!(v.label(), Some("cat"));
        let v = Verdict::Unrecognized { reason: "boom".into() };
        assert!(!v.is_correct());
        assert_eq!(v.label(), None);
    }

    #[test]
    fn test_fresh_session() {
        let s = GameSession::default();
        assert_eq!(s.status, Status::NotStarted);
        assert_eq!(s.attempts_completed, 0);
        assert!(s.round.is_none());
    }
}
