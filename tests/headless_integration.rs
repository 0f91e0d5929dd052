use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use screebai::canvas::{Canvas, DrawingSurface, Snapshot, FALLBACK_HEIGHT, FALLBACK_WIDTH};
use screebai::classifier::{CancelToken, Classifier, ClassifyError};
use screebai::engine::Engine;
use screebai::runtime::{FixedTicker, Runner, ScreebEvent, TestEventSource};
use screebai::scores::{ScoreError, ScoreSink, SessionOutcome};
use screebai::session::{EngineSettings, Status, Verdict};
use screebai::words::{Language, WordSource};

const WAIT: Duration = Duration::from_secs(5);

struct Gatto;

impl WordSource for Gatto {
    fn next_word(&self, _: Language) -> String {
        "Gatto".to_string()
    }
}

/// Hands out one scripted answer per call, in order
#[derive(Clone, Default)]
struct Scripted {
    answers: Arc<Mutex<VecDeque<Result<String, ClassifyError>>>>,
    seen: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl Scripted {
    fn new(answers: Vec<Result<String, ClassifyError>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into())),
            seen: Arc::default(),
        }
    }

    fn calls(&self) -> Vec<(u32, u32)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Classifier for Scripted {
    fn classify(&self, s: &Snapshot, _: Language, _: &CancelToken) -> Result<String, ClassifyError> {
        self.seen.lock().unwrap().push(s.dimensions());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("none".into()))
    }
}

/// Holds its answer until the test lets it go
struct Gated {
    release: Mutex<Receiver<()>>,
}

impl Classifier for Gated {
    fn classify(&self, _: &Snapshot, _: Language, _: &CancelToken) -> Result<String, ClassifyError> {
        let _ = self.release.lock().unwrap().recv_timeout(WAIT);
        Ok("gatto".into())
    }
}

#[derive(Clone, Default)]
struct Recording(Arc<Mutex<Vec<SessionOutcome>>>);

impl Recording {
    fn points(&self) -> Vec<u32> {
        self.0.lock().unwrap().iter().map(|o| o.points).collect()
    }
}

impl ScoreSink for Recording {
    fn persist(&self, outcome: &SessionOutcome) -> Result<(), ScoreError> {
        self.0.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

fn settings(max_attempts: u32) -> EngineSettings {
    EngineSettings {
        max_attempts,
        round_duration_secs: 5,
        result_dwell_ms: 50,
        points_per_correct_attempt: 1,
        classify_timeout_ms: 10_000,
    }
}

fn engine(max_attempts: u32, classifier: impl Classifier, sink: Recording) -> Engine {
    Engine::new(
        settings(max_attempts),
        Language::Italian,
        Box::new(Gatto),
        Arc::new(classifier),
        Box::new(sink),
    )
}

/// Submit the current round, wait for its verdict and let the dwell pass
fn play_round(engine: &mut Engine, now: &mut Instant) {
    assert!(engine.submit_round(Snapshot::blank(16, 16), *now));
    assert!(engine.wait_for_classification(WAIT, *now));
    *now += Duration::from_millis(50);
    engine.pump(*now, None);
}

#[test]
fn scenario_a_two_of_three_correct() {
    let sink = Recording::default();
    let classifier = Scripted::new(vec![
        Ok("gatto".into()),
        Ok("cane".into()),
        Ok("GATTO".into()),
    ]);
    let mut engine = engine(3, classifier.clone(), sink.clone());
    let mut now = Instant::now();
    engine.start_session(now);

    for _ in 0..3 {
        play_round(&mut engine, &mut now);
    }

    assert_eq!(engine.status(), Status::GameOver);
    assert_eq!(engine.score_total(), 2);
    assert_eq!(engine.attempts_completed(), 3);
    assert_eq!(classifier.calls().len(), 3);
    assert_eq!(sink.points(), vec![2]);
    let outcome = &sink.0.lock().unwrap()[0];
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.language, Language::Italian);
}

#[test]
fn scenario_b_failed_classification_scores_zero() {
    let sink = Recording::default();
    let classifier = Scripted::new(vec![
        Ok("gatto".into()),
        Err(ClassifyError::Http("connection reset".into())),
        Ok("gatto".into()),
    ]);
    let mut engine = engine(3, classifier, sink.clone());
    let mut now = Instant::now();
    engine.start_session(now);

    play_round(&mut engine, &mut now);
    assert_eq!(engine.score_total(), 1);

    assert!(engine.submit_round(Snapshot::blank(16, 16), now));
    assert!(engine.wait_for_classification(WAIT, now));
    match engine.verdict() {
        Some(Verdict::Unrecognized { reason }) => assert!(reason.contains("connection reset")),
        other => panic!("expected an unrecognized verdict, got {other:?}"),
    }
    now += Duration::from_millis(50);
    engine.pump(now, None);
    assert_eq!(engine.status(), Status::InRound);
    assert_eq!(engine.score_total(), 1);

    play_round(&mut engine, &mut now);
    assert_eq!(engine.status(), Status::GameOver);
    assert_eq!(engine.score_total(), 2);
    assert_eq!(sink.points(), vec![2]);

    // nothing else moves once the game is over
    engine.pump(now + Duration::from_secs(60), None);
    assert_eq!(sink.points(), vec![2]);
}

#[test]
fn scenario_c_timer_auto_submits_blank_fallback() {
    let sink = Recording::default();
    let classifier = Scripted::new(vec![Ok("gatto".into())]);
    let mut engine = engine(1, classifier.clone(), sink.clone());
    let t0 = Instant::now();
    engine.start_session(t0);

    for secs in 1..=4 {
        engine.pump(t0 + Duration::from_secs(secs), None);
        assert_eq!(engine.time_remaining(), Some(5 - secs as u32));
        assert_eq!(engine.status(), Status::InRound);
    }
    engine.pump(t0 + Duration::from_secs(5), None);
    assert_eq!(engine.status(), Status::ShowingResult);
    // a late manual submit loses the race
    assert!(!engine.submit_round(Snapshot::blank(1, 1), t0 + Duration::from_secs(5)));

    assert!(engine.wait_for_classification(WAIT, t0 + Duration::from_secs(5)));
    engine.pump(t0 + Duration::from_secs(6), None);

    assert_eq!(classifier.calls(), vec![(FALLBACK_WIDTH, FALLBACK_HEIGHT)]);
    assert_eq!(engine.status(), Status::GameOver);
    assert_eq!(sink.points(), vec![1]);
}

#[test]
fn scenario_c_timer_snapshots_the_canvas() {
    let classifier = Scripted::new(vec![Ok("cane".into())]);
    let mut engine = engine(1, classifier.clone(), Recording::default());
    let t0 = Instant::now();
    engine.start_session(t0);

    let mut canvas = Canvas::new(10, 6);
    canvas.stroke((0, 0), (9, 5));
    engine.pump(t0 + Duration::from_secs(30), Some(&canvas));

    assert!(engine.wait_for_classification(WAIT, t0 + Duration::from_secs(30)));
    assert_eq!(classifier.calls(), vec![(80, 48)]);
    assert_eq!(engine.score_total(), 0);
}

#[test]
fn scenario_d_restart_mid_round_leaks_nothing() {
    let sink = Recording::default();
    let (release, gate) = mpsc::channel();
    let mut engine = engine(
        2,
        Gated {
            release: Mutex::new(gate),
        },
        sink.clone(),
    );
    let t0 = Instant::now();
    engine.start_session(t0);
    let first = engine.round_id();
    engine.pump(t0 + Duration::from_secs(3), None);
    assert!(engine.submit_round(Snapshot::blank(4, 4), t0 + Duration::from_secs(3)));

    let t1 = t0 + Duration::from_secs(4);
    engine.start_session(t1);
    assert_ne!(engine.round_id(), first);
    assert_eq!(engine.time_remaining(), Some(5));

    // the old call now answers correctly, and must not count
    release.send(()).unwrap();
    assert!(!engine.wait_for_classification(Duration::from_millis(300), t1));
    engine.pump(t1 + Duration::from_millis(500), None);

    assert_eq!(engine.score_total(), 0);
    assert_eq!(engine.status(), Status::InRound);
    assert_eq!(engine.time_remaining(), Some(5));
    assert_eq!(engine.attempts_completed(), 0);
    assert!(sink.points().is_empty());

    engine.pump(t1 + Duration::from_secs(2), None);
    assert_eq!(engine.time_remaining(), Some(3));
}

#[test]
fn persistence_failure_still_ends_the_game() {
    struct Broken;

    impl ScoreSink for Broken {
        fn persist(&self, _: &SessionOutcome) -> Result<(), ScoreError> {
            Err(ScoreError::UnknownPlayer("ghost".into()))
        }
    }

    let mut engine = Engine::new(
        settings(1),
        Language::English,
        Box::new(Gatto),
        Arc::new(Scripted::new(vec![Ok("gatto".into())])),
        Box::new(Broken),
    );
    let mut now = Instant::now();
    engine.start_session(now);
    play_round(&mut engine, &mut now);

    assert_eq!(engine.status(), Status::GameOver);
    assert_eq!(engine.score_total(), 1);
    assert!(engine.persist_warning().unwrap().contains("ghost"));
}

// Drives the engine the way the terminal loop does: Runner steps, ticks pump
// the engine and Enter submits.
#[test]
fn headless_runner_loop_reaches_game_over() {
    let sink = Recording::default();
    let classifier = Scripted::new(vec![Ok("gatto".into()), Ok("gatto".into())]);
    let mut engine = Engine::new(
        EngineSettings {
            result_dwell_ms: 0,
            ..settings(2)
        },
        Language::Italian,
        Box::new(Gatto),
        Arc::new(classifier),
        Box::new(sink.clone()),
    );

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );
    let enter = || ScreebEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));

    engine.start_session(Instant::now());
    let canvas = Canvas::new(8, 8);
    tx.send(enter()).unwrap();

    for _ in 0..1000u32 {
        match runner.step() {
            ScreebEvent::Tick | ScreebEvent::Resize | ScreebEvent::Mouse(_) => {
                let before = engine.round_id();
                engine.pump(Instant::now(), Some(&canvas));
                if engine.status() == Status::InRound && engine.round_id() != before {
                    tx.send(enter()).unwrap();
                }
            }
            ScreebEvent::Key(key) if key.code == KeyCode::Enter => {
                if let Ok(snapshot) = canvas.snapshot() {
                    engine.submit_round(snapshot, Instant::now());
                }
            }
            ScreebEvent::Key(_) => {}
        }
        if engine.status() == Status::GameOver {
            break;
        }
    }

    assert_eq!(engine.status(), Status::GameOver);
    assert_eq!(engine.score_total(), 2);
    assert_eq!(sink.points(), vec![2]);
}
