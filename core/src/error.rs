//! Errors

use thiserror::Error;

/// Errors surfaced by scene assembly, configuration and rendering.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// A reference to an asset that does not exist.
    #[error("missing asset '{id}' of type {kind}")]
    MissingAsset { kind: &'static str, id: String },

    /// Malformed mesh data.
    #[error("mesh error: {0}")]
    Mesh(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Image encoding or decoding failure.
    #[error("image error: {0}")]
    Image(String),

    /// Integrity failure that aborts rendering.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl Error {
    /// Configuration error from a message.
    ///
    /// * `msg` - The message.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Missing asset error.
    ///
    /// * `kind` - Asset type.
    /// * `id`   - Asset id.
    pub fn missing_asset<S: Into<String>>(kind: &'static str, id: S) -> Self {
        Self::MissingAsset { kind, id: id.into() }
    }

    /// Mesh error from a message.
    ///
    /// * `msg` - The message.
    pub fn mesh<S: Into<String>>(msg: S) -> Self {
        Self::Mesh(msg.into())
    }
}

/// Result type used throughout the renderer.
pub type Result<T> = std::result::Result<T, Error>;
