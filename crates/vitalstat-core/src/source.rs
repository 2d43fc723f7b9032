//! Provider identifiers, error classification, and the uniform fetch contract.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::domain::ProviderRecords;

/// Stable identifier for each upstream data provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Wonder,
    Ahr,
    Ipums,
    Datafenix,
}

impl ProviderId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wonder => "wonder",
            Self::Ahr => "ahr",
            Self::Ipums => "ipums",
            Self::Datafenix => "datafenix",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    /// Network failure, request timeout, or a non-2xx status.
    Transport,
    /// Malformed or unparsable response body, including a GraphQL
    /// error array and an undecodable extract payload.
    Protocol,
    /// The extract service reported the job as failed.
    JobFailed,
    /// The extract poll loop exhausted its wall-clock budget.
    JobTimedOut,
    /// The fallback computation was given too little input.
    InsufficientData,
}

impl SourceErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::JobFailed => "job_failed",
            Self::JobTimedOut => "job_timed_out",
            Self::InsufficientData => "insufficient_data",
        }
    }
}

/// Structured source error absorbed into a provider's `Failure` outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Transport,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Protocol,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn job_failed(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::JobFailed,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn job_timed_out(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::JobTimedOut,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InsufficientData,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::Protocol => "source.protocol",
            SourceErrorKind::JobFailed => "source.job_failed",
            SourceErrorKind::JobTimedOut => "source.job_timed_out",
            SourceErrorKind::InsufficientData => "source.insufficient_data",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Outcome of one provider's work item in a cycle.
///
/// A fetch either yields a (possibly empty) normalized record set or a
/// failure; the two are never mixed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderOutcome {
    Success { records: ProviderRecords },
    Failure { kind: SourceErrorKind, message: String },
}

impl ProviderOutcome {
    pub fn from_fetch(result: Result<ProviderRecords, SourceError>) -> Self {
        match result {
            Ok(records) => Self::Success { records },
            Err(error) => Self::Failure {
                kind: error.kind(),
                message: error.message().to_owned(),
            },
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub const fn failure_kind(&self) -> Option<SourceErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Uniform provider fetch contract.
///
/// Implementations convert every transport, serialization, and
/// provider-declared error into a `Failure` outcome; nothing escapes
/// this boundary. Fetches are idempotent at the protocol level and safe
/// to retry on a later cycle.
///
/// Implementations hold no state across invocations beyond their
/// injected transport and optional cache handle.
pub trait StatSource: Send + Sync {
    /// Returns the unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Runs this provider's configured query plan.
    fn fetch<'a>(&'a self) -> Pin<Box<dyn Future<Output = ProviderOutcome> + Send + 'a>>;
}
