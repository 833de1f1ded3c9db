//! Error handling for point observation storage.
//!
//! Every failure surfaces as a typed result from the operation that
//! detected it. Nothing in the library retries or exits the process.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PointObsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("NetCDF error on {path}: {source}")]
    NetcdfAt {
        path: PathBuf,
        #[source]
        source: netcdf::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid point observation file: {message}")]
    Format { message: String },

    #[error("Missing required dimension: {name}")]
    MissingDimension { name: String },

    #[error("Missing required variable: {name}")]
    MissingVariable { name: String },

    #[error("{what} index {index} out of range (size {len})")]
    OutOfRange {
        what: String,
        index: usize,
        len: usize,
    },

    #[error("Invalid state: {message}")]
    State { message: String },
}

/// Coarse classification used by owning tools to decide whether to abort
/// or skip a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Format,
    Io,
    OutOfRange,
    State,
}

impl PointObsError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    pub fn out_of_range(what: impl Into<String>, index: usize, len: usize) -> Self {
        Self::OutOfRange {
            what: what.into(),
            index,
            len,
        }
    }

    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoAt {
            path: path.into(),
            source,
        }
    }

    pub fn netcdf_at(path: impl Into<PathBuf>, source: netcdf::Error) -> Self {
        Self::NetcdfAt {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::IoAt { .. } | Self::Netcdf(_) | Self::NetcdfAt { .. } => {
                ErrorKind::Io
            }
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Format { .. } | Self::MissingDimension { .. } | Self::MissingVariable { .. } => {
                ErrorKind::Format
            }
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::State { .. } => ErrorKind::State,
        }
    }
}

pub type Result<T> = std::result::Result<T, PointObsError>;
