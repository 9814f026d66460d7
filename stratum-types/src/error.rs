//! Error types for all stratum crates.

use std::time::Duration;

/// Errors from LLM provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    // Retryable errors
    /// Network-level error (connection reset, DNS failure, etc.).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Rate limited by the provider.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit {
        /// Suggested retry delay, if provided by the API.
        retry_after: Option<Duration>,
    },
    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// Provider service is temporarily unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    // Terminal errors
    /// Authentication/authorization failure.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Malformed or invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Catch-all
    /// Any other provider error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether this error is likely transient and the request can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimit { .. } | Self::Timeout(_) | Self::ServiceUnavailable(_)
        )
    }
}

/// Errors from tool operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool not found in the active registry view.
    #[error("tool not found: {0}")]
    NotFound(String),
    /// Invalid input for the tool.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Tool execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// Tool execution was cancelled.
    #[error("cancelled")]
    Cancelled,
}

/// Errors from the compressor.
///
/// These stay inside the compression boundary: the compressor converts them
/// into a structured outcome with the original messages untouched, it never
/// returns them to the loop as `Err`.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    /// A strategy exceeded the configured timeout.
    #[error("compression timed out after {0:?}")]
    Timeout(Duration),
    /// Provider error during LLM summarisation.
    #[error("provider error during summarisation: {0}")]
    Provider(#[from] ProviderError),
    /// The rate limiter refused the call.
    #[error("compression rate limited, backoff {0:?} remaining")]
    RateLimited(Duration),
    /// Any other compression failure.
    #[error("compression failed: {0}")]
    Failed(String),
}

/// Errors from hooks. A hook error never aborts the chain; it is recorded in
/// the hook's stats and the chain continues.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Hook execution failed.
    #[error("hook failed: {0}")]
    Failed(String),
    /// Any other hook error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the phase orchestrator. A *failed* validation is not an error;
/// these cover malformed requests.
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    /// A phase name that is not part of the workflow.
    #[error("unknown phase: {0}")]
    Unknown(String),
    /// A transition request that is not the linear successor.
    #[error("malformed transition from {from} to {to}")]
    MalformedTransition {
        /// The active phase.
        from: String,
        /// The requested phase.
        to: String,
    },
    /// Advancing out of the terminal phase.
    #[error("workflow already complete")]
    AlreadyComplete,
}

/// Errors from state and session storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Session not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// I/O error during a storage operation.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A state invariant was violated; fatal for the loop.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Errors from configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A threshold outside the open interval (0, 1).
    #[error("{name} must be in (0, 1), got {value}")]
    ThresholdOutOfRange {
        /// Configuration key.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A value that must be positive was not.
    #[error("{name} must be positive, got {value}")]
    NotPositive {
        /// Configuration key.
        name: &'static str,
        /// Offending value.
        value: i64,
    },
}

/// Errors from the agent loop. Only fatal conditions surface here; recoverable
/// failures become messages or metadata.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// Fatal provider failure (after escalation policy).
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    /// Fatal tool failure escalated by a hook.
    #[error("fatal tool error: {0}")]
    FatalTool(String),
    /// Token budget exceeded after a compression attempt.
    #[error("token overflow: {tokens} tokens exceeds window of {limit}")]
    TokenOverflow {
        /// Counted tokens at the time of the violation.
        tokens: usize,
        /// The configured context window.
        limit: usize,
    },
    /// Loop exceeded the configured iteration limit.
    #[error("max iterations reached ({0})")]
    MaxIterations(usize),
    /// The loop was cancelled.
    #[error("cancelled")]
    Cancelled,
    /// Malformed phase transition requested by a sub-agent.
    #[error("phase error: {0}")]
    Phase(#[from] PhaseError),
    /// State invariant violation.
    #[error("state error: {0}")]
    State(#[from] StateError),
}
