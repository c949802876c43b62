//! Error types for the SciDB shim client.

use thiserror::Error;

/// Result type alias using ShimError.
pub type ShimResult<T> = Result<T, ShimError>;

/// Primary error type for shim operations.
#[derive(Debug, Error)]
pub enum ShimError {
    // === Transport Errors ===
    #[error("Connection to shim failed after {retries} attempts: {message}")]
    ConnectFailed { retries: u32, message: String },

    #[error("HTTP {status} from shim endpoint {endpoint}")]
    HttpStatus { status: u16, endpoint: String },

    #[error("Transport error: {0}")]
    Transport(String),

    // === Authentication / Session Errors ===
    #[error("Login to SciDB failed: {0}")]
    AuthFailed(String),

    #[error("Invalid session id: {0}")]
    InvalidSession(i64),

    // === Schema Validation Errors ===
    #[error("Dimension '{name}' has non-integer type '{type_id}': integer dimensions only")]
    NonIntegerDimension { name: String, type_id: String },

    #[error("Requested array subset is outside array boundaries")]
    WindowOutOfBounds,

    #[error("Requested band {band} does not exist ({available} attributes)")]
    BandOutOfRange { band: usize, available: usize },

    #[error("Array '{0}' has no dimension usable as '{1}' axis")]
    MissingDimension(String, char),

    #[error("Cannot create unnamed arrays")]
    UnnamedArray,

    #[error("Array '{0}' already exists in SciDB database")]
    ArrayExists(String),

    #[error("Array '{0}' does not exist in SciDB database")]
    ArrayUnknown(String),

    #[error("Array '{0}' has no attributes with a supported pixel type")]
    NoUsableAttributes(String),

    #[error("Tile buffer holds {actual} bytes but the window requires {expected}")]
    TileSizeMismatch { expected: usize, actual: usize },

    // === Parsing Errors ===
    #[error("Cannot extract SciDB / shim version from string '{0}'")]
    VersionParse(String),

    #[error("Invalid table cell requested: ({row},{col}) in a {rows}x{cols} table")]
    CellOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Cannot cast cell ({row},{col}) value '{value}' to {target}")]
    CellCast {
        row: usize,
        col: usize,
        value: String,
        target: &'static str,
    },

    #[error("Cannot extract reference metadata of array '{0}'")]
    MalformedReference(String),

    #[error("Cannot derive setting for array '{0}': unrecognized tag {1}")]
    UnknownSetting(String, String),

    #[error("Binary result has {actual} bytes, expected {expected}")]
    BinaryLength { expected: usize, actual: usize },

    // === Operation Errors ===
    #[error("Array creation failed: {0}")]
    CreateFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Closed enumeration of outcome kinds, one per failure phase.
///
/// Raster adapters switch on this rather than on the full error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    TransportError,
    AuthError,
    SessionError,
    SchemaError,
    ParseError,
    CreateError,
    QueryError,
}

impl ShimError {
    /// Map this error onto the coarse per-phase status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ShimError::ConnectFailed { .. }
            | ShimError::HttpStatus { .. }
            | ShimError::Transport(_) => StatusCode::TransportError,

            ShimError::AuthFailed(_) => StatusCode::AuthError,
            ShimError::InvalidSession(_) => StatusCode::SessionError,

            ShimError::NonIntegerDimension { .. }
            | ShimError::WindowOutOfBounds
            | ShimError::BandOutOfRange { .. }
            | ShimError::MissingDimension(..)
            | ShimError::NoUsableAttributes(_)
            | ShimError::TileSizeMismatch { .. } => StatusCode::SchemaError,

            ShimError::VersionParse(_)
            | ShimError::CellOutOfRange { .. }
            | ShimError::CellCast { .. }
            | ShimError::MalformedReference(_)
            | ShimError::UnknownSetting(..)
            | ShimError::BinaryLength { .. } => StatusCode::ParseError,

            ShimError::UnnamedArray
            | ShimError::ArrayExists(_)
            | ShimError::CreateFailed(_) => StatusCode::CreateError,

            ShimError::ArrayUnknown(_) | ShimError::QueryFailed(_) => StatusCode::QueryError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            ShimError::WindowOutOfBounds.status_code(),
            StatusCode::SchemaError
        );
        assert_eq!(
            ShimError::InvalidSession(-1).status_code(),
            StatusCode::SessionError
        );
        assert_eq!(
            ShimError::VersionParse("x".into()).status_code(),
            StatusCode::ParseError
        );
        assert_eq!(
            ShimError::ArrayExists("a".into()).status_code(),
            StatusCode::CreateError
        );
    }
}
