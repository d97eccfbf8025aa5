use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors. Anything here either stops the process before it goes live
/// or, for listener failures, drives it into an orderly shutdown.
#[derive(Debug, Error)]
pub enum GarageError {
    #[error("reading config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config from {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported mode {0:?}")]
    UnsupportedMode(String),

    #[error("mode {mode:?} selected but the `{mode}` section is missing")]
    MissingSection { mode: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("hubitat self-check: {0}")]
    SelfCheck(String),

    #[error("opening GPIO pin {pin}: {source}")]
    Gpio {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("setting up manual control of built-in LED: {0}")]
    IndicatorSetup(#[source] std::io::Error),

    #[error("restricting {addr:?} to interface {interface:?}: {reason}")]
    Interface {
        addr: String,
        interface: String,
        reason: String,
    },

    #[error("binding HTTP listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serving HTTP on {addr}: {source}")]
    Listener {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Where in the taxonomy a [`GarageError`] falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    ResourceAcquisition,
    ListenerRuntime,
}

impl GarageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GarageError::ConfigRead { .. }
            | GarageError::ConfigParse { .. }
            | GarageError::UnsupportedMode(_)
            | GarageError::MissingSection { .. }
            | GarageError::InvalidConfig(_)
            | GarageError::SelfCheck(_) => ErrorKind::Configuration,
            GarageError::Gpio { .. }
            | GarageError::IndicatorSetup(_)
            | GarageError::Interface { .. }
            | GarageError::Bind { .. } => ErrorKind::ResourceAcquisition,
            GarageError::Listener { .. } => ErrorKind::ListenerRuntime,
        }
    }
}

/// A single activation failed. Reported to the caller, never retried.
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("activation already in progress")]
    Busy,

    #[error("hubitat did not respond within {0:?}")]
    Timeout(std::time::Duration),

    #[error("fetching from hubitat: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("non-200 response from hubitat: {0}")]
    Status(reqwest::StatusCode),

    #[error("decoding JSON response from hubitat: {0}")]
    Decode(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GarageError>;
