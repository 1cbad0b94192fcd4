use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading configuration or game data from disk.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("circular inheritance detected at '{0}'")]
    CircularInheritance(String),
    #[error("entity '{child}' extends unknown parent '{parent}'")]
    UnknownParent { child: String, parent: String },
    #[error("room '{room}' has an exit to unknown room '{target}'")]
    UnknownExit { room: String, target: String },
    #[error("starting room '{0}' does not exist")]
    MissingStartingRoom(String),
    #[error("duplicate room id '{0}'")]
    DuplicateRoom(String),
}

/// Boss-tracking backend failures. Never surfaced to players.
#[derive(Debug, Error)]
pub enum BossTrackerError {
    #[error("unknown area '{0}'")]
    UnknownArea(String),
    #[error("boss tracking unavailable: {0}")]
    Unavailable(String),
}

/// Rejections for host-initiated combat calls.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CombatError {
    #[error("no connected player named '{0}'")]
    UnknownPlayer(String),
    #[error("nothing called '{0}' here")]
    NoSuchTarget(String),
    #[error("already fighting")]
    AlreadyFighting,
    #[error("player is not alive")]
    NotAlive,
}
