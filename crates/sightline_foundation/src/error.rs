//! Error types for the Sightline system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::ids::TokenId;

/// The main error type for Sightline operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

/// Result alias used throughout Sightline.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a token not found error.
    #[must_use]
    pub fn token_not_found(id: TokenId) -> Self {
        Self::new(ErrorKind::TokenNotFound(id))
    }

    /// Creates an invalid geometry error.
    #[must_use]
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidGeometry(message.into()))
    }

    /// Creates an invalid scene configuration error.
    #[must_use]
    pub fn invalid_scene(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidScene(message.into()))
    }

    /// Creates a capability unavailable error.
    #[must_use]
    pub fn unavailable(capability: Capability) -> Self {
        Self::new(ErrorKind::CapabilityUnavailable(capability))
    }

    /// Creates a rate limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: RateLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Returns true if this error means a whole capability is down, as opposed
    /// to a single query failing.
    #[must_use]
    pub fn is_systemic(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::CapabilityUnavailable(_) | ErrorKind::InvalidScene(_)
        )
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Token was not present in the scene snapshot.
    #[error("token not found: {0}")]
    TokenNotFound(TokenId),

    /// A shape or segment could not be evaluated.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Scene-wide configuration is unusable (bad grid, non-finite darkness).
    #[error("invalid scene: {0}")]
    InvalidScene(String),

    /// A whole computation capability is unavailable.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(Capability),

    /// The host's richer visibility test failed.
    #[error("host query failed: {0}")]
    HostQuery(String),

    /// The persistence collaborator rejected an operation.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// File I/O failed.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A rate limit (circuit breaker, retry cap) was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(RateLimit),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Computation capabilities that can fail as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Capability {
    /// Illumination queries.
    Lighting,
    /// Cover geometry evaluation.
    Cover,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lighting => write!(f, "lighting"),
            Self::Cover => write!(f, "cover"),
        }
    }
}

/// Rate limits that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimit {
    /// Too many full recomputations inside the breaker window.
    CircuitBreaker {
        /// The configured limit.
        limit: u32,
        /// Window length in milliseconds.
        window_ms: u64,
    },
    /// Retry attempts for a capability were exhausted.
    RetryAttempts {
        /// The capability being probed.
        capability: Capability,
        /// The configured cap.
        limit: u32,
    },
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitBreaker { limit, window_ms } => {
                write!(f, "circuit breaker ({limit} per {window_ms}ms) tripped")
            }
            Self::RetryAttempts { capability, limit } => {
                write!(f, "retry attempts ({limit}) exhausted for {capability}")
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed.
    pub operation: Option<String>,
    /// Tokens involved in the operation.
    pub tokens: Vec<TokenId>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Adds an involved token.
    #[must_use]
    pub fn with_token(mut self, token: TokenId) -> Self {
        self.tokens.push(token);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(op) = &self.operation {
            write!(f, "in {op}")?;
        }
        if !self.tokens.is_empty() {
            let ids: Vec<&str> = self.tokens.iter().map(TokenId::as_str).collect();
            write!(f, " [{}]", ids.join(", "))?;
        }
        Ok(())
    }
}
