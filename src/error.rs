//! Error types for presence-tracker.
//!
//! Only setup can fail: loading configuration, reading a roster seed file,
//! building the roster. Tracker operations never return errors; ignored
//! mutations are reported through [`crate::tracker::Mutation`].

use thiserror::Error;

use crate::model::WorkerId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("worker not found: {0}")]
    UnknownWorker(WorkerId),

    #[error("duplicate worker id in roster: {0}")]
    DuplicateWorker(WorkerId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
