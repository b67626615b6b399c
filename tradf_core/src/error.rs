//! Error types for graph loading, schedule generation and validation

use thiserror::Error;

/// Coarse classification of a [`TradfError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The graph or network description is malformed or not closed
    Load,
    /// The requested constraints cannot be met by the model
    Infeasible,
    /// Bad configuration or API misuse
    Config,
    /// File or (de)serialization failure
    Io,
}

/// Main error type for TRADF scheduling
#[derive(Debug, Error)]
pub enum TradfError {
    #[error("actor '{0}' has no producer and is not connected to any input")]
    UnboundEntry(String),

    #[error("actor '{0}' is isolated from rest of the graph")]
    IsolatedActor(String),

    #[error("actor '{0}' has no consumer and its output is not weighted")]
    UnweightedExit(String),

    #[error("duplicate actor '{0}'")]
    DuplicateActor(String),

    #[error("duplicate channel ({source_actor},{target})")]
    DuplicateChannel { source_actor: String, target: String },

    #[error("actor '{0}' is bound to more than one input")]
    DuplicateSource(String),

    #[error("actor '{0}' has more than one weighted output")]
    DuplicateSink(String),

    #[error("channel ({source_actor},{target}) targets an unknown actor")]
    UnknownActor { source_actor: String, target: String },

    #[error("weighted output refers to unknown actor '{0}'")]
    UnknownOutput(String),

    #[error("weights of the graph outputs sum to zero")]
    ZeroOutputWeight,

    #[error("network description has no delay model for hosts '{src_host}' -> '{dst_host}'")]
    UnknownHostPair { src_host: String, dst_host: String },

    #[error("precedence graph has a cycle through actor '{0}' (missing initial token?)")]
    PrecedenceCycle(String),

    #[error("unknown unit '{unit}' in duration '{literal}'")]
    UnknownUnit { literal: String, unit: String },

    #[error("malformed duration '{0}'")]
    InvalidDuration(String),

    #[error("unknown delay distribution '{0}'")]
    UnknownDistribution(String),

    #[error("invalid delay distribution: {0}")]
    Distribution(String),

    #[error("non-positive slack {slack} on path from '{source_actor}' to '{sink}'")]
    NonPositiveSlack {
        source_actor: String,
        sink: String,
        slack: f64,
    },

    #[error("non-positive period {diff} at actor '{actor}'")]
    NonPositivePeriod { actor: String, diff: f64 },

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("rho {0} is outside [0, 1]")]
    RhoOutOfRange(f64),

    #[error("illegal session transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TradfError {
    pub fn config(msg: impl Into<String>) -> Self {
        TradfError::Config(msg.into())
    }

    pub fn violation(msg: impl Into<String>) -> Self {
        TradfError::ConstraintViolation(msg.into())
    }

    /// Which part of the taxonomy this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            TradfError::UnboundEntry(_)
            | TradfError::IsolatedActor(_)
            | TradfError::UnweightedExit(_)
            | TradfError::DuplicateActor(_)
            | TradfError::DuplicateChannel { .. }
            | TradfError::DuplicateSource(_)
            | TradfError::DuplicateSink(_)
            | TradfError::UnknownActor { .. }
            | TradfError::UnknownOutput(_)
            | TradfError::ZeroOutputWeight
            | TradfError::UnknownHostPair { .. }
            | TradfError::PrecedenceCycle(_)
            | TradfError::UnknownUnit { .. }
            | TradfError::InvalidDuration(_)
            | TradfError::UnknownDistribution(_)
            | TradfError::Distribution(_) => ErrorKind::Load,
            TradfError::NonPositiveSlack { .. }
            | TradfError::NonPositivePeriod { .. }
            | TradfError::ConstraintViolation(_)
            | TradfError::RhoOutOfRange(_) => ErrorKind::Infeasible,
            TradfError::InvalidTransition { .. } | TradfError::Config(_) | TradfError::Toml(_) => {
                ErrorKind::Config
            }
            TradfError::Io(_) | TradfError::Json(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias used throughout the crate
pub type TradfResult<T> = Result<T, TradfError>;
