use thiserror::Error;

mod board;
pub use board::*;
mod commands;
pub use commands::*;
mod locale;
pub use locale::*;
pub mod parser;
pub use parser::{ExtractionPolicy, ParserConfig, PreambleMode, ScriptParser, Segment};
mod shot;
pub use shot::*;

#[derive(Debug, Error)]
pub enum StoryboardError {
    #[error("shot not found: {0}")]
    ShotNotFound(ShotId),
    #[error("shot already exists: {0}")]
    ShotExists(ShotId),
    #[error("index {index} out of range for {len} shots")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("unknown style: {0}")]
    UnknownStyle(String),
    #[error("unknown aspect ratio: {0}")]
    UnknownAspectRatio(String),
    #[error("unknown locale: {0}")]
    UnknownLocale(String),
    #[error("at least one shot/scene marker keyword is required")]
    NoMarkerKeywords,
    #[error("invalid marker keyword: {0}")]
    InvalidKeyword(#[from] regex::Error),
    #[error("history empty: {0}")]
    HistoryEmpty(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
