use chrono::{DateTime, Local};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::leaderboard::LeaderboardEntry;
use crate::nickname;
use crate::words::Language;

/// Give up looking for a free nickname after this many collisions
const MAX_NICK_TRIES: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("score database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("could not prepare score storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("no free nickname after {0} tries")]
    NicknamesExhausted(usize),
    #[error("unknown player {0}")]
    UnknownPlayer(String),
    #[error("history log error: {0}")]
    History(#[from] csv::Error),
}

/// What a finished session reports to the score sinks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Points earned during this session only
    pub points: u32,
    pub attempts: u32,
    pub max_attempts: u32,
    pub language: Language,
}

/// Destination for a finished session's points. Implementations merge the
/// points into whatever running total they keep.
pub trait ScoreSink: Send {
    fn persist(&self, outcome: &SessionOutcome) -> Result<(), ScoreError>;
}

/// Forwards an outcome to several sinks. Every sink is tried; the first error
/// is returned.
#[derive(Default)]
pub struct Sinks(Vec<Box<dyn ScoreSink>>);

impl Sinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ScoreSink + 'static) -> Self {
        self.0.push(Box::new(sink));
        self
    }
}

impl ScoreSink for Sinks {
    fn persist(&self, outcome: &SessionOutcome) -> Result<(), ScoreError> {
        let mut first_err = None;
        for sink in &self.0 {
            if let Err(e) = sink.persist(outcome) {
                warn!("score sink failed: {e}");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: i64,
    pub nick: String,
    pub score: i64,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

/// SQLite store of players, lifetime scores and played sessions
#[derive(Debug)]
pub struct ScoreStore {
    conn: Connection,
}

impl ScoreStore {
    /// Open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, ScoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ScoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nick TEXT NOT NULL UNIQUE,
                score INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id INTEGER NOT NULL REFERENCES players(id),
                language TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                points INTEGER NOT NULL,
                played_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_players_score ON players(score);
            CREATE INDEX IF NOT EXISTS idx_sessions_player ON sessions(player_id);
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn register_player(&self, nick: &str) -> Result<Player, ScoreError> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO players (nick, score, created_at, updated_at) VALUES (?1, 0, ?2, ?2)",
            params![nick, now],
        )?;
        info!("registered player {nick}");
        self.player(nick)?
            .ok_or_else(|| ScoreError::UnknownPlayer(nick.to_string()))
    }

    /// Look the player up, registering them on first sight
    pub fn ensure_player(&self, nick: &str) -> Result<Player, ScoreError> {
        match self.player(nick)? {
            Some(p) => Ok(p),
            None => self.register_player(nick),
        }
    }

    pub fn player(&self, nick: &str) -> Result<Option<Player>, ScoreError> {
        let player = self
            .conn
            .query_row(
                "SELECT id, nick, score, created_at, updated_at FROM players WHERE nick = ?1",
                [nick],
                |row| {
                    Ok(Player {
                        id: row.get(0)?,
                        nick: row.get(1)?,
                        score: row.get(2)?,
                        created_at: parse_timestamp(row.get::<_, String>(3)?, 3)?,
                        updated_at: parse_timestamp(row.get::<_, String>(4)?, 4)?,
                    })
                },
            )
            .optional()?;
        Ok(player)
    }

    /// A generated nickname nobody has taken yet
    pub fn unique_nickname(&self) -> Result<String, ScoreError> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_NICK_TRIES {
            let nick = nickname::generate(&mut rng);
            if self.player(&nick)?.is_none() {
                return Ok(nick);
            }
        }
        Err(ScoreError::NicknamesExhausted(MAX_NICK_TRIES))
    }

    /// Add a session's points to the player's lifetime total and log the
    /// session. Returns the new total.
    pub fn add_points(&mut self, nick: &str, outcome: &SessionOutcome) -> Result<i64, ScoreError> {
        let now = Local::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let player_id: i64 = tx
            .query_row("SELECT id FROM players WHERE nick = ?1", [nick], |row| row.get(0))
            .optional()?
            .ok_or_else(|| ScoreError::UnknownPlayer(nick.to_string()))?;

        tx.execute(
            "UPDATE players SET score = score + ?1, updated_at = ?2 WHERE id = ?3",
            params![outcome.points, now, player_id],
        )?;
        tx.execute(
            r#"
            INSERT INTO sessions (player_id, language, attempts, points, played_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                player_id,
                outcome.language.code(),
                outcome.attempts,
                outcome.points,
                now
            ],
        )?;
        let total: i64 =
            tx.query_row("SELECT score FROM players WHERE id = ?1", [player_id], |row| row.get(0))?;

        tx.commit()?;
        Ok(total)
    }

    pub fn sessions_played(&self, nick: &str) -> Result<i64, ScoreError> {
        let count = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM sessions s
            JOIN players p ON p.id = s.player_id
            WHERE p.nick = ?1
            "#,
            [nick],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Every player, best first. Ties go to whoever reached the score first.
    pub fn ranking(&self) -> Result<Vec<LeaderboardEntry>, ScoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT nick, score, updated_at FROM players ORDER BY score DESC, updated_at ASC, id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                parse_timestamp(row.get::<_, String>(2)?, 2)?,
            ))
        })?;

        let mut ranking = Vec::new();
        for (idx, row) in rows.enumerate() {
            let (nick, score, updated_at) = row?;
            ranking.push(LeaderboardEntry {
                position: idx + 1,
                nick,
                score,
                updated_at,
            });
        }
        Ok(ranking)
    }
}

fn parse_timestamp(raw: String, col: usize) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                col,
                "timestamp".to_string(),
                rusqlite::types::Type::Text,
            )
        })
}

/// Sink that credits a session to one player in the local database
#[derive(Debug, Clone)]
pub struct PlayerScoreSink {
    db_path: PathBuf,
    nick: String,
}

impl PlayerScoreSink {
    pub fn new<P: AsRef<Path>>(db_path: P, nick: impl Into<String>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            nick: nick.into(),
        }
    }
}

impl ScoreSink for PlayerScoreSink {
    fn persist(&self, outcome: &SessionOutcome) -> Result<(), ScoreError> {
        let mut store = ScoreStore::open(&self.db_path)?;
        store.ensure_player(&self.nick)?;
        let total = store.add_points(&self.nick, outcome)?;
        info!(
            "credited {} points to {}, lifetime total {}",
            outcome.points, self.nick, total
        );
        Ok(())
    }
}
