//! Error type shared by every telemetry operation.

use thiserror::Error;

/// Errors raised across the telemetry core
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A definition or instance was used with the wrong kind
    #[error("Incompatible definition for '{key}': registered as {existing}, requested {requested}")]
    IncompatibleDefinition {
        /// Key of the definition that rejected the request
        key: String,
        /// What the definition was registered as
        existing: String,
        /// What the caller asked for
        requested: String,
    },

    /// A value column name is already taken on the definition (case-insensitive)
    #[error("Duplicate value column '{column}' on definition '{definition}'")]
    DuplicateColumnName {
        /// Definition key
        definition: String,
        /// Requested column name
        column: String,
    },

    /// The definition's column set is frozen
    #[error("Definition is locked: {0}")]
    AlreadyLocked(String),

    /// No value column matches the name, index or handle
    #[error("Unknown value column '{column}' on definition '{definition}'")]
    UnknownValueColumn {
        /// Definition key
        definition: String,
        /// Column name or index that failed to resolve
        column: String,
    },

    /// Invalid time range or granularity
    #[error("Range error: {0}")]
    Range(String),

    /// A trendable value could not be read as a number under `CoercionPolicy::Fail`
    #[error("Cannot convert value '{value}' of column '{column}' to a number")]
    CoercionFailure {
        /// Column name
        column: String,
        /// Offending value as displayed
        value: String,
    },

    /// A rehydrated sample reuses a sequence number already in the store
    #[error("Sequence number {0} is already present")]
    DuplicateSequence(u64),

    /// Invalid or unparsable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading a configuration file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

impl TelemetryError {
    /// Creates a new range error
    pub fn range<S: Into<String>>(msg: S) -> Self {
        Self::Range(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an unknown column error from anything displayable (name or index)
    pub fn unknown_column(definition: impl std::fmt::Display, column: impl std::fmt::Display) -> Self {
        Self::UnknownValueColumn {
            definition: definition.to_string(),
            column: column.to_string(),
        }
    }

    /// Returns true if this error is recoverable
    ///
    /// Only per-value coercion failures are; everything else is a shape or
    /// usage error raised at the call that caused it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CoercionFailure { .. })
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::IncompatibleDefinition { .. } => "definition",
            Self::DuplicateColumnName { .. } | Self::AlreadyLocked(_) => "column",
            Self::UnknownValueColumn { .. } => "not_found",
            Self::Range(_) => "validation",
            Self::CoercionFailure { .. } => "coercion",
            Self::DuplicateSequence(_) => "sequence",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}
