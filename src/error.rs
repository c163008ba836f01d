// src/error.rs
//! Error handling for the showroom core.
//!
//! Load failures are absorbed by the orchestrator (logged, recorded as `last_error`) and never
//! returned to the UI layer; everything below the orchestrator propagates with `?`.

use thiserror::Error;

/// Main error type for catalog, config and model loading.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Asset could not be read from its source.
    #[error("failed to fetch {locator}: {source}")]
    Fetch {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    /// Bytes were read but are not a decodable glTF/GLB document.
    #[error("failed to decode {locator}: {source}")]
    Decode {
        locator: String,
        #[source]
        source: gltf::Error,
    },

    /// Document parsed but failed schema validation or references missing data.
    #[error("invalid model {locator}: {reason}")]
    Invalid { locator: String, reason: String },

    /// Decoded scene holds no triangle meshes.
    #[error("model {locator} contains no renderable meshes")]
    EmptyScene { locator: String },

    /// Catalog entry without a model asset was handed to the loader.
    #[error("catalog entry '{id}' has no 3D model asset")]
    NoModelAsset { id: String },

    /// Configuration or catalog JSON is malformed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// I/O outside of asset fetching (config files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rich context chaining.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    #[inline]
    pub fn invalid<L: Into<String>, R: Into<String>>(locator: L, reason: R) -> Self {
        Self::Invalid {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Add context to any error (chainable, like `.context()` in anyhow).
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    #[inline]
    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::Fetch { .. })
    }

    #[inline]
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Error::Decode { .. } | Error::Invalid { .. } | Error::EmptyScene { .. }
        )
    }

    /// Locator of the asset involved, if this error came from the load pipeline.
    pub fn locator(&self) -> Option<&str> {
        match self {
            Error::Fetch { locator, .. }
            | Error::Decode { locator, .. }
            | Error::Invalid { locator, .. }
            | Error::EmptyScene { locator } => Some(locator),
            Error::WithContext { source, .. } => source.locator(),
            _ => None,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;
