use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::scores::{ScoreError, ScoreSink, SessionOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: String,
    pub language: String,
    pub player: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub points: u32,
}

/// Append-only CSV log of finished sessions
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
    player: String,
}

impl HistoryLog {
    pub fn new<P: AsRef<Path>>(path: P, player: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            player: player.into(),
        }
    }

    pub fn append(&self, outcome: &SessionOutcome) -> Result<(), ScoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // header only for a fresh or empty file
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        writer.serialize(HistoryRecord {
            date: Local::now().format("%c").to_string(),
            language: outcome.language.code().to_string(),
            player: self.player.clone(),
            attempts: outcome.attempts,
            max_attempts: outcome.max_attempts,
            points: outcome.points,
        })?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<HistoryRecord>, ScoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for record in reader.deserialize() {
            records.push(record?);
        }
        Ok(records)
    }
}

impl ScoreSink for HistoryLog {
    fn persist(&self, outcome: &SessionOutcome) -> Result<(), ScoreError> {
        self.append(outcome)
    }
}
