//! Error taxonomy for the core (spec.md §7).
//!
//! Parse/schema/geometry/checkpoint errors are fatal to the operation that
//! triggered them and propagate via `Result`. Routing and evaluation
//! failures are modeled as data (`RouteResult`, `PlacementScore`) rather
//! than as `Err` values, since the driver absorbs them and continues.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Error::Parse { position, message: message.into() }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    pub fn geometry(message: impl Into<String>) -> Self {
        Error::Geometry(message.into())
    }

    pub fn checkpoint(message: impl Into<String>) -> Self {
        Error::Checkpoint(message.into())
    }
}
