//! Unified error handling for sentineld.
//!
//! Two families: transient platform failures (swallowed and logged at the
//! call site, never escalated into a handler) and command rejections
//! (surfaced to the invoking moderator, never logged as faults).

use thiserror::Error;

/// A platform side effect that did not happen this cycle.
///
/// These are always best-effort: callers log the error with `tracing` and
/// move on. None of them may crash a handler.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// No connector is attached to the bridge.
    #[error("connector not attached")]
    Disconnected,

    /// The connector did not answer within the request deadline.
    #[error("request timed out")]
    Timeout,

    /// The connector executed the request and the platform refused it
    /// (missing permissions, unknown channel, rate limit).
    #[error("platform rejected request: {0}")]
    Rejected(String),

    /// The connector answered with a payload of the wrong shape.
    #[error("unexpected reply payload")]
    UnexpectedReply,
}

impl PlatformError {
    /// Static code for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Timeout => "timeout",
            Self::Rejected(_) => "rejected",
            Self::UnexpectedReply => "unexpected_reply",
        }
    }

    /// True when the request reached the platform and was actively refused,
    /// as opposed to never happening at all.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Rejection of a moderator-invoked operation.
///
/// These are answers to the invoker, not faults: an unauthorized `/confirm`
/// is normal traffic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("you do not have permission to use this command")]
    NotAuthorized,

    #[error("invalid user format: {0}")]
    InvalidTarget(String),

    #[error("no pending lockdown for that user")]
    NothingPending,
}

impl CommandError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "not_authorized",
            Self::InvalidTarget(_) => "invalid_target",
            Self::NothingPending => "nothing_pending",
        }
    }

    /// Render as a chat reply for the invoking user.
    pub fn user_message(&self) -> String {
        format!("❌ {self}")
    }
}

/// Result type for moderator-invoked operations.
pub type CommandResult = Result<String, CommandError>;
