use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("insufficient memory to continue ({available} bytes free, need {minimum})")]
    LowMemory { available: u64, minimum: u64 },
}

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error("state file: {0}")]
    Io(#[from] io::Error),
    #[error("state file encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("network connection attempts exceeded ({0})")]
    AttemptsExceeded(u32),
    #[error("running {command}: {source}")]
    Command {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} exited with {status}")]
    CommandFailed { command: String, status: String },
}

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("{0} is not usable for GPIO")]
    InvalidPin(String),
    #[cfg(feature = "pi")]
    #[error("gpio: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

#[derive(Error, Debug)]
pub enum OtaError {
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error("content of {file} is not valid base64: {source}")]
    Decode {
        file: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("new {file} will not validate: {reason}")]
    Validation { file: String, reason: String },
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("version database: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("already an entry for {0} in database")]
    AlreadyExists(String),
    #[error("no entry exists for {0}")]
    Missing(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
