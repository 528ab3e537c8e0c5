//! Personal dictionary: word storage, ranked suggestions and a recent-history
//! list, plus an optional JSON API (`web` feature).

pub mod entry;
pub mod error;
pub mod history;
pub mod kv;
pub mod ranking;
pub mod repository;
pub mod sequence;
#[cfg(feature = "web")]
pub mod web;

pub use entry::{NewEntry, WordEntry, parse_batch};
pub use error::{Error, Result};
pub use history::{HISTORY_KEY, HistoryTracker, MAX_HISTORY};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore, UnavailableStore};
pub use ranking::{
    DEFAULT_LIMIT, SearchConfig, SearchHit, SearchStrategy, rank, score, search_by_contains,
};
pub use repository::{CreateOutcome, MemoryRepository, SqliteRepository, WordRepository};
pub use sequence::{RequestSequencer, SuggestionSession, Ticket};

use std::path::PathBuf;

/// `<data dir>/wordbook-rs/words.sqlite3`.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wordbook-rs")
        .join("words.sqlite3")
}
