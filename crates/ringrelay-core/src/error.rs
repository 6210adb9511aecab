//! Error types for the RingRelay ingestion pipeline.

use thiserror::Error;

/// Errors raised while turning a raw log or transaction into a typed payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{name}: expected at least {expected} topics, got {got}")]
    MissingTopics {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("ABI decode failed: {reason}")]
    AbiDecodeFailed { reason: String },

    #[error("Type mismatch for '{field}': expected {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Unknown signature: {signature}")]
    UnknownSignature { signature: String },
}

/// Errors returned by a bus handler. The dispatcher logs them and moves on.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("payload mismatch: expected {expected}")]
    PayloadMismatch { expected: String },

    #[error("{0}")]
    Other(String),
}

/// Errors from the external data collaborators (token/market sources, order store).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Errors from the token/market registry.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("market registry cannot find any token")]
    NoTokens,

    #[error("market registry cannot find any base market")]
    NoMarkets,

    #[error("not supported market type: {s}-{b}")]
    UnsupportedMarket { s: String, b: String },

    #[error("source error: {0}")]
    Source(#[from] StoreError),
}

/// Errors loading configuration or catalog snapshots.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl MarketError {
    /// Returns `true` for errors the registry cannot operate without.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoTokens | Self::NoMarkets | Self::Source(_))
    }
}
