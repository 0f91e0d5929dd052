// Library surface for the game engine, its collaborators and headless tests.
// The terminal front end lives in main.rs.
pub mod app_dirs;
pub mod canvas;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod history;
pub mod i18n;
pub mod leaderboard;
pub mod logging;
pub mod nickname;
pub mod runtime;
pub mod scores;
pub mod session;
pub mod words;
