//! Timed, attempt-based drawing game.
//!
//! The engine owns one [`GameSession`] and is driven by its host: the host
//! forwards explicit submissions and calls [`Engine::pump`] with the current
//! time so the engine can run its countdown, collect classifier answers and
//! move on after the result has been on screen long enough. Classification is
//! the only blocking step and runs on a worker thread; its answer comes back
//! over a channel tagged with the round it belongs to.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::canvas::{DrawingSurface, Snapshot};
use crate::classifier::{CancelToken, Classifier, ClassifyError};
use crate::scores::{ScoreSink, SessionOutcome};
use crate::session::{EngineSettings, GameSession, Round, RoundId, Status, Verdict};
use crate::words::{Language, WordSource};

const ONE_SECOND: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("all attempts of this session are used")]
    SessionComplete,
    #[error("a round is still in progress")]
    RoundInProgress,
}

/// Classifier answer for a specific round
#[derive(Debug)]
pub struct Classification {
    pub round: RoundId,
    pub outcome: Result<String, ClassifyError>,
}

/// Comparison rule for target words and classifier labels
pub fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}

pub struct Engine {
    settings: EngineSettings,
    language: Language,
    words: Box<dyn WordSource>,
    classifier: Arc<dyn Classifier>,
    sink: Box<dyn ScoreSink>,
    session: GameSession,
    next_round_id: u64,
    results_tx: Sender<Classification>,
    results_rx: Receiver<Classification>,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        language: Language,
        words: Box<dyn WordSource>,
        classifier: Arc<dyn Classifier>,
        sink: Box<dyn ScoreSink>,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::channel();
        Self {
            settings: EngineSettings {
                max_attempts: settings.max_attempts.max(1),
                round_duration_secs: settings.round_duration_secs.max(1),
                ..settings
            },
            language,
            words,
            classifier,
            sink,
            session: GameSession::default(),
            next_round_id: 0,
            results_tx,
            results_rx,
        }
    }

    /// Throw away whatever is going on and start over from the first round
    pub fn start_session(&mut self, now: Instant) {
        if let Some(round) = self.session.round.take() {
            round.cancel.cancel();
            debug!("abandoning round {:?}", round.id);
        }
        // anything already queued belongs to the old session
        while self.results_rx.try_recv().is_ok() {}

        self.session = GameSession::default();
        info!(
            "new session: {} attempts of {}s, {}",
            self.settings.max_attempts, self.settings.round_duration_secs, self.language
        );
        if let Err(e) = self.begin_round(now) {
            warn!("could not open the first round: {e}");
        }
    }

    /// Open the next round. Only valid while no round is unresolved.
    pub fn start_round(&mut self, now: Instant) -> Result<RoundId, EngineError> {
        match self.session.status {
            Status::InRound | Status::ShowingResult => Err(EngineError::RoundInProgress),
            Status::NotStarted | Status::GameOver => self.begin_round(now),
        }
    }

    fn begin_round(&mut self, now: Instant) -> Result<RoundId, EngineError> {
        if self.session.attempts_completed >= self.settings.max_attempts {
            return Err(EngineError::SessionComplete);
        }

        self.next_round_id += 1;
        let id = RoundId(self.next_round_id);
        let word = self.words.next_word(self.language);
        debug!("round {id:?}: drawing {word:?}");

        self.session.round = Some(Round::new(
            id,
            word,
            self.settings.round_duration_secs,
            now,
        ));
        self.session.status = Status::InRound;
        Ok(id)
    }

    /// Hand the drawing in. Returns false if the round was already submitted
    /// or there is no round to submit.
    pub fn submit_round(&mut self, snapshot: Snapshot, now: Instant) -> bool {
        if self.session.status != Status::InRound {
            return false;
        }
        let Some(round) = self.session.round.as_mut() else {
            return false;
        };
        if round.submitted {
            return false;
        }
        round.submitted = true;
        round.submitted_at = Some(now);
        self.session.status = Status::ShowingResult;

        let id = round.id;
        let cancel = round.cancel.clone();
        debug!("round {id:?} submitted with {}s left", round.time_remaining);
        self.dispatch(id, snapshot, cancel, now);
        true
    }

    fn dispatch(&mut self, round: RoundId, snapshot: Snapshot, cancel: CancelToken, now: Instant) {
        let classifier = Arc::clone(&self.classifier);
        let tx = self.results_tx.clone();
        let language = self.language;

        let spawned = thread::Builder::new()
            .name(format!("classify-{}", round.0))
            .spawn(move || {
                let outcome = classifier.classify(&snapshot, language, &cancel);
                if cancel.is_cancelled() {
                    debug!("dropping answer for superseded round {round:?}");
                    return;
                }
                let _ = tx.send(Classification { round, outcome });
            });

        if let Err(e) = spawned {
            warn!("could not start classification: {e}");
            self.handle_classification(
                Classification {
                    round,
                    outcome: Err(ClassifyError::Http(e.to_string())),
                },
                now,
            );
        }
    }

    /// Advance timers and apply any classifier answers that arrived
    pub fn pump(&mut self, now: Instant, surface: Option<&dyn DrawingSurface>) {
        while let Ok(c) = self.results_rx.try_recv() {
            self.handle_classification(c, now);
        }

        match self.session.status {
            Status::InRound => self.run_countdown(now, surface),
            Status::ShowingResult => self.run_result(now),
            Status::NotStarted | Status::GameOver => {}
        }
    }

    fn run_countdown(&mut self, now: Instant, surface: Option<&dyn DrawingSurface>) {
        let Some(round) = self.session.round.as_mut() else {
            return;
        };

        // one tick per elapsed second, catching up if we were paused
        while !round.submitted && round.time_remaining > 0 && now >= round.next_tick_at {
            round.time_remaining -= 1;
            round.next_tick_at += ONE_SECOND;
        }

        if round.time_remaining == 0 && !round.submitted {
            info!("round {:?} ran out of time", round.id);
            let snapshot = match surface.map(|s| s.snapshot()) {
                Some(Ok(snapshot)) => snapshot,
                Some(Err(e)) => {
                    warn!("drawing snapshot failed, sending a blank one: {e}");
                    Snapshot::fallback()
                }
                None => {
                    warn!("no drawing surface, sending a blank one");
                    Snapshot::fallback()
                }
            };
            self.submit_round(snapshot, now);
        }
    }

    fn run_result(&mut self, now: Instant) {
        let timeout = self.settings.classify_timeout();
        let Some(round) = self.session.round.as_ref() else {
            return;
        };

        if round.is_awaiting_verdict() {
            let waited_out = round
                .submitted_at
                .is_some_and(|at| now.saturating_duration_since(at) >= timeout);
            if waited_out {
                round.cancel.cancel();
                let id = round.id;
                self.handle_classification(
                    Classification {
                        round: id,
                        outcome: Err(ClassifyError::TimedOut(timeout)),
                    },
                    now,
                );
            }
            return;
        }

        if round.dwell_until.is_some_and(|until| now >= until) {
            self.finish_round(now);
        }
    }

    /// Score a classifier answer. Answers for any round other than the one
    /// awaiting a verdict are ignored.
    pub fn handle_classification(&mut self, c: Classification, now: Instant) {
        let points = self.settings.points_per_correct_attempt;
        let dwell = self.settings.result_dwell();

        let round = match self.session.round.as_mut() {
            Some(round) if round.id == c.round && round.is_awaiting_verdict() => round,
            _ => {
                warn!("discarding stale classification for round {:?}", c.round);
                return;
            }
        };

        let verdict = match c.outcome {
            Ok(label) => {
                let label = normalize(&label);
                if label == normalize(&round.target_word) {
                    Verdict::Correct { label }
                } else {
                    Verdict::Incorrect { label }
                }
            }
            Err(e) => {
                warn!("classification failed for round {:?}: {e}", round.id);
                Verdict::Unrecognized {
                    reason: e.to_string(),
                }
            }
        };

        debug!("round {:?}: {verdict:?}", round.id);
        if verdict.is_correct() {
            self.session.score_total = self.session.score_total.saturating_add(points);
        }
        round.verdict = Some(verdict);
        round.dwell_until = Some(now + dwell);
    }

    /// Block until one classifier answer arrives or `timeout` passes
    pub fn wait_for_classification(&mut self, timeout: Duration, now: Instant) -> bool {
        match self.results_rx.recv_timeout(timeout) {
            Ok(c) => {
                self.handle_classification(c, now);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn finish_round(&mut self, now: Instant) {
        self.session.attempts_completed += 1;
        debug!(
            "attempt {}/{} done, score {}",
            self.session.attempts_completed, self.settings.max_attempts, self.session.score_total
        );

        if self.session.attempts_completed >= self.settings.max_attempts {
            self.game_over();
        } else if let Err(e) = self.begin_round(now) {
            warn!("could not open the next round: {e}");
        }
    }

    fn game_over(&mut self) {
        self.session.status = Status::GameOver;
        self.session.round = None;
        if self.session.persisted {
            return;
        }
        self.session.persisted = true;

        let outcome = SessionOutcome {
            points: self.session.score_total,
            attempts: self.session.attempts_completed,
            max_attempts: self.settings.max_attempts,
            language: self.language,
        };
        info!("game over, {} points", outcome.points);
        if let Err(e) = self.sink.persist(&outcome) {
            warn!("saving the session score failed: {e}");
            self.session.persist_warning = Some(e.to_string());
        }
    }

    pub fn status(&self) -> Status {
        self.session.status
    }

    pub fn attempts_completed(&self) -> u32 {
        self.session.attempts_completed
    }

    pub fn score_total(&self) -> u32 {
        self.session.score_total
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Takes effect from the next round
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn round_id(&self) -> Option<RoundId> {
        self.session.round.as_ref().map(|r| r.id)
    }

    pub fn current_word(&self) -> Option<&str> {
        self.session.round.as_ref().map(|r| r.target_word.as_str())
    }

    pub fn time_remaining(&self) -> Option<u32> {
        self.session.round.as_ref().map(|r| r.time_remaining)
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        self.session.round.as_ref().and_then(|r| r.verdict.as_ref())
    }

    pub fn is_analyzing(&self) -> bool {
        self.session
            .round
            .as_ref()
            .is_some_and(|r| r.is_awaiting_verdict())
    }

    pub fn persist_warning(&self) -> Option<&str> {
        self.session.persist_warning.as_deref()
    }
}
