// Errors surfaced by loading, the feature pipeline and the classifier.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TennisError {
    #[error("invalid match record #{index}: winner {winner:?} is neither {player1:?} nor {player2:?}")]
    InvalidMatchRecord {
        index: usize,
        player1: String,
        player2: String,
        winner: String,
    },

    #[error("no matches found for player {0:?}")]
    UnknownPlayer(String),

    #[error("a player cannot face themselves ({0:?})")]
    SamePlayer(String),

    #[error("unknown surface {0:?} (expected Hard, Clay or Grass)")]
    UnknownSurface(String),

    #[error("no usable matches in the dataset")]
    EmptyDataset,

    #[error("model error: {0}")]
    Model(String),

    #[error("plot error: {0}")]
    Plot(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TennisError>;
