mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use webbrowser::Browser;

use screebai::{
    app_dirs::AppDirs,
    canvas::{Canvas, DrawingSurface, Snapshot, Tool},
    classifier::VisionClassifier,
    config::{self, Config, ConfigStore, FileConfigStore},
    engine::Engine,
    history::HistoryLog,
    i18n::{tf, Msg},
    leaderboard::LeaderboardEntry,
    logging, nickname,
    runtime::{CrosstermEventSource, FixedTicker, Runner, ScreebEvent},
    scores::{PlayerScoreSink, ScoreError, ScoreStore, Sinks},
    session::{RoundId, Status},
    words::{Language, WordBank},
};

const SHARE_URL: &str = "https://twitter.com/intent/tweet";

/// draw a word in your terminal and let an AI guess it
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal drawing game: you get a word and a timer, you draw it on a character canvas, and a vision model tries to guess it. Every right guess is a point on the leaderboard."
)]
pub struct Cli {
    /// language of the words and of the guesses
    #[clap(short = 'l', long, value_enum)]
    language: Option<Language>,

    /// nickname on the leaderboard (a new one is picked on first launch)
    #[clap(short = 'n', long)]
    player: Option<String>,

    /// number of attempts per session
    #[clap(short = 'a', long)]
    attempts: Option<u32>,

    /// seconds to draw each word
    #[clap(short = 's', long)]
    secs: Option<u32>,

    /// base url of the chat completions API
    #[clap(long)]
    api_base: Option<String>,

    /// vision model used to guess the drawing
    #[clap(long)]
    model: Option<String>,
}

impl Cli {
    /// Flags win over whatever `cfg` holds
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(language) = self.language {
            cfg.language = language;
        }
        if let Some(player) = &self.player {
            cfg.player = Some(player.clone());
        }
        if let Some(n) = self.attempts.filter(|n| *n > 0) {
            cfg.max_attempts = n;
        }
        if let Some(n) = self.secs.filter(|n| *n > 0) {
            cfg.round_duration_secs = n;
        }
        if let Some(base) = &self.api_base {
            cfg.api_base = base.clone();
        }
        if let Some(model) = &self.model {
            cfg.model = model.clone();
        }
        cfg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    Leaderboard,
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    None,
    Share,
    Quit,
}

pub struct App {
    pub engine: Engine,
    pub canvas: Canvas,
    pub cursor: (u16, u16),
    pub screen: Screen,
    pub player: String,
    pub leaderboard: Vec<LeaderboardEntry>,
    db_path: Option<PathBuf>,
    /// Round the canvas content belongs to
    canvas_round: Option<RoundId>,
    last_drag: Option<(u16, u16)>,
}

impl App {
    pub fn new(engine: Engine, player: String, db_path: Option<PathBuf>) -> Self {
        Self {
            engine,
            canvas: Canvas::new(0, 0),
            cursor: (0, 0),
            screen: Screen::Playing,
            player,
            leaderboard: Vec::new(),
            db_path,
            canvas_round: None,
            last_drag: None,
        }
    }

    pub fn max_score(&self) -> u32 {
        let s = self.engine.settings();
        s.max_attempts.saturating_mul(s.points_per_correct_attempt)
    }

    /// Match the drawing grid to the space the layout gives it
    pub fn sync_canvas(&mut self, area: Rect) {
        self.canvas.resize(area.width, area.height);
        self.cursor = (
            self.cursor.0.min(area.width.saturating_sub(1)),
            self.cursor.1.min(area.height.saturating_sub(1)),
        );
    }

    pub fn restart(&mut self, now: Instant) {
        self.engine.start_session(now);
        self.canvas.clear();
        self.canvas_round = self.engine.round_id();
        self.screen = Screen::Playing;
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.engine.pump(now, Some(&self.canvas as &dyn DrawingSurface));

        // fresh round, fresh sheet
        if self.engine.status() == Status::InRound && self.engine.round_id() != self.canvas_round {
            self.canvas.clear();
            self.canvas_round = self.engine.round_id();
        }
    }

    /// Input first, then the clock. A steady stream of input must not hold
    /// the countdown back.
    fn handle_event(&mut self, event: ScreebEvent, canvas_area: Rect, now: Instant) -> Action {
        let action = match event {
            ScreebEvent::Key(key) => self.on_key(key, now),
            ScreebEvent::Mouse(mouse) => {
                self.on_mouse(mouse, canvas_area);
                Action::None
            }
            ScreebEvent::Tick | ScreebEvent::Resize => Action::None,
        };
        self.on_tick(now);
        action
    }

    pub fn submit(&mut self, now: Instant) -> bool {
        let snapshot = self.canvas.snapshot().unwrap_or_else(|e| {
            warn!("drawing snapshot failed, sending a blank one: {e}");
            Snapshot::fallback()
        });
        self.engine.submit_round(snapshot, now)
    }

    pub fn refresh_leaderboard(&mut self) {
        let Some(path) = &self.db_path else {
            return;
        };
        match ScoreStore::open(path).and_then(|store| store.ranking()) {
            Ok(ranking) => self.leaderboard = ranking,
            Err(e) => warn!("could not load the leaderboard: {e}"),
        }
    }

    fn share_url(&self) -> Result<String, Box<dyn Error>> {
        let text = tf(
            self.engine.language(),
            Msg::ShareText,
            &[
                ("score", self.engine.score_total().to_string()),
                ("max", self.max_score().to_string()),
            ],
        );
        let url = reqwest::Url::parse_with_params(SHARE_URL, &[("text", text)])?;
        Ok(url.to_string())
    }

    fn on_key(&mut self, key: KeyEvent, now: Instant) -> Action {
        if key.kind != KeyEventKind::Press {
            return Action::None;
        }
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return Action::Quit;
        }

        if key.code == KeyCode::Char('l') {
            self.screen = match self.screen {
                Screen::Playing => {
                    self.refresh_leaderboard();
                    Screen::Leaderboard
                }
                Screen::Leaderboard => Screen::Playing,
            };
            return Action::None;
        }
        if self.screen == Screen::Leaderboard {
            return Action::None;
        }
        if key.code == KeyCode::Tab {
            let language = self.engine.language().next();
            info!("switching to {language}");
            self.engine.set_language(language);
            return Action::None;
        }

        match self.engine.status() {
            Status::InRound => self.on_drawing_key(key.code, now),
            Status::GameOver => match key.code {
                KeyCode::Char('r') => self.restart(now),
                KeyCode::Char('t') => return Action::Share,
                _ => {}
            },
            Status::NotStarted | Status::ShowingResult => {}
        }
        Action::None
    }

    fn on_drawing_key(&mut self, code: KeyCode, now: Instant) {
        let (x, y) = self.cursor;
        match code {
            KeyCode::Left => self.cursor.0 = x.saturating_sub(1),
            KeyCode::Right => {
                self.cursor.0 = (x + 1).min(self.canvas.width().saturating_sub(1))
            }
            KeyCode::Up => self.cursor.1 = y.saturating_sub(1),
            KeyCode::Down => {
                self.cursor.1 = (y + 1).min(self.canvas.height().saturating_sub(1))
            }
            KeyCode::Char(' ') => self.canvas.paint(x, y),
            KeyCode::Char('p') => self.canvas.tool = Tool::Pen,
            KeyCode::Char('e') => self.canvas.tool = Tool::Eraser,
            KeyCode::Char('c') => self.canvas.clear(),
            KeyCode::Enter => {
                self.submit(now);
            }
            _ => {}
        }
    }

    /// `area` is where the canvas sits on screen
    fn on_mouse(&mut self, mouse: MouseEvent, area: Rect) {
        if self.screen != Screen::Playing || self.engine.status() != Status::InRound {
            self.last_drag = None;
            return;
        }

        let inside = mouse.column >= area.x
            && mouse.column < area.right()
            && mouse.row >= area.y
            && mouse.row < area.bottom();
        let cell = (mouse.column - area.x.min(mouse.column), mouse.row - area.y.min(mouse.row));

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) if inside => {
                self.canvas.paint(cell.0, cell.1);
                self.cursor = cell;
                self.last_drag = Some(cell);
            }
            MouseEventKind::Drag(MouseButton::Left) if inside => {
                let from = self.last_drag.unwrap_or(cell);
                self.canvas.stroke(from, cell);
                self.cursor = cell;
                self.last_drag = Some(cell);
            }
            MouseEventKind::Drag(MouseButton::Left) => self.last_drag = None,
            MouseEventKind::Up(MouseButton::Left) => self.last_drag = None,
            _ => {}
        }
    }
}

fn register_new_player(db_path: &Path) -> Result<String, ScoreError> {
    let store = ScoreStore::open(db_path)?;
    let nick = store.unique_nickname()?;
    store.register_player(&nick)?;
    Ok(nick)
}

/// Saved nickname, or a fresh one registered in the store
fn resolve_player(cfg: &Config, db_path: Option<&PathBuf>) -> String {
    if let Some(player) = cfg.player.as_ref().filter(|p| !p.trim().is_empty()) {
        return player.trim().to_string();
    }
    match db_path.map(|path| register_new_player(path)) {
        Some(Ok(nick)) => nick,
        Some(Err(e)) => {
            warn!("could not register a nickname: {e}");
            nickname::generate(&mut rand::thread_rng())
        }
        None => nickname::generate(&mut rand::thread_rng()),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        if let Err(e) = logging::init_to_file(&path) {
            eprintln!("logging disabled: {e}");
        }
    }

    let db_path = AppDirs::db_path();
    let store = FileConfigStore::new();
    let mut saved = cli.apply(store.load());
    let player = resolve_player(&saved, db_path.as_ref());
    saved.player = Some(player.clone());
    if let Err(e) = store.save(&saved) {
        warn!("could not save {}: {e}", store.path().display());
    }

    // environment beats the file, flags beat both
    let cfg = cli.apply(saved.clone().with_env());
    info!("starting as {player} ({}, {} x {}s)", cfg.language, cfg.max_attempts, cfg.round_duration_secs);

    let settings = cfg.to_settings();
    let classifier = VisionClassifier::new(
        cfg.api_base.clone(),
        cfg.model.clone(),
        config::api_key(),
        settings.classify_timeout(),
    )?;
    if config::api_key().is_none() {
        warn!("{} is not set, every drawing will come back unrecognized", config::ENV_API_KEY);
    }

    let mut sinks = Sinks::new();
    if let Some(path) = &db_path {
        sinks = sinks.with(PlayerScoreSink::new(path, player.clone()));
    }
    if let Some(path) = AppDirs::history_path() {
        sinks = sinks.with(HistoryLog::new(path, player.clone()));
    }

    let engine = Engine::new(
        settings,
        cfg.language,
        Box::new(WordBank::new()),
        Arc::new(classifier),
        Box::new(sinks),
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(engine, player, db_path);
    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if app.engine.language() != cfg.language {
        saved.language = app.engine.language();
        if let Err(e) = store.save(&saved) {
            warn!("could not save {}: {e}", store.path().display());
        }
    }

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    app.restart(Instant::now());

    loop {
        let size = terminal.size()?;
        let canvas_area = ui::canvas_area(Rect::new(0, 0, size.width, size.height));
        app.sync_canvas(canvas_area);
        terminal.draw(|f| draw(app, f))?;

        match app.handle_event(runner.step(), canvas_area, Instant::now()) {
            Action::Quit => break,
            Action::Share => share(app),
            Action::None => {}
        }
    }

    Ok(())
}

fn share(app: &App) {
    if !Browser::is_available() {
        return;
    }
    match app.share_url() {
        Ok(url) => {
            if let Err(e) = webbrowser::open(&url) {
                warn!("could not open the browser: {e}");
            }
        }
        Err(e) => warn!("could not build the share link: {e}"),
    }
}

fn draw(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}
