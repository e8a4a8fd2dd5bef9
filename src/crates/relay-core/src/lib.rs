//! Mediation and materialization pipeline sitting between a paginated,
//! rate-limited rich-content workspace API and a graph-editing client.
//!
//! This crate owns the entity transformation pipeline, the bidirectional
//! write path with inverse-relation maintenance, the delta calculator, the
//! in-memory cache coordinator, and the rate-limited upstream gateway. It
//! does not speak HTTP: routing, auth, CORS, and request validation are the
//! job of whatever binary embeds this crate.

pub mod cache;
pub use cache::Cache;
pub mod capture;
pub mod config;
pub mod delta;
pub mod encode;
pub mod gateway;
pub mod graph;
pub mod inverse;
pub mod merge;
pub mod model;
pub mod router;
pub mod synth;
pub mod transform;

mod decode;
pub use decode::{decode_property, decode_relation_complete, DecodedValue};

use thiserror::Error;

/// Crate-wide error type. Subsystem errors convert into this via `#[from]`
/// so callers at the router boundary only need to match one enum.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Gateway(#[from] gateway::GatewayError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unrecognized entity kind: {0}")]
    UnknownKind(String),

    /// Caller supplied an `ifVersion` that no longer matches the cached
    /// entity version (§6's optional version-token check; §1's "no
    /// conflict resolution beyond last-write-wins with optional
    /// version-token checks").
    #[error("version conflict: expected {expected}, entity is at {actual:?}")]
    VersionConflict { expected: u64, actual: Option<u64> },

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Stable machine-readable error code, per the taxonomy in the error
    /// handling design.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::Gateway(e) => e.code(),
            RelayError::Validation(_) => "VALIDATION_ERROR",
            RelayError::UnknownKind(_) => "UNKNOWN_KIND",
            RelayError::VersionConflict { .. } => "VERSION_CONFLICT",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Suggested HTTP status, advisory only — this crate never constructs
    /// an HTTP response itself.
    pub fn status_code_hint(&self) -> u16 {
        match self {
            RelayError::Config(_) => 500,
            RelayError::Gateway(e) => e.status_code_hint(),
            RelayError::Validation(_) => 400,
            RelayError::UnknownKind(_) => 400,
            RelayError::VersionConflict { .. } => 409,
            RelayError::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
