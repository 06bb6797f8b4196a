//! Error categorization for upstream (LLM/graph-store) failures encountered
//! while running a graph-ingestion batch, used to decide whether the batch
//! is retried and whether the scheduler should keep ticking at all.

use common::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    RateLimit,
    QuotaExceeded,
    AuthFailure,
    NetworkTimeout,
    GraphEngineError,
    InvalidInput,
    Unclassified,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::QuotaExceeded => "quota_exceeded",
            Self::AuthFailure => "auth_failure",
            Self::NetworkTimeout => "network_timeout",
            Self::GraphEngineError => "graph_engine_error",
            Self::InvalidInput => "invalid_input",
            Self::Unclassified => "unclassified",
        }
    }

    /// Whether the scheduler should leave the backing turns uningested and
    /// try again on a later tick.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimit | Self::NetworkTimeout)
    }

    /// Whether the category is severe enough that the scheduler should stop
    /// scheduling further graph-ingestion ticks until an operator intervenes.
    pub fn halts_scheduler(self) -> bool {
        matches!(self, Self::QuotaExceeded | Self::AuthFailure)
    }

    pub fn advice(self) -> &'static str {
        match self {
            Self::RateLimit => "back off and retry on a later tick",
            Self::QuotaExceeded => "provider quota exhausted; halt until the quota resets",
            Self::AuthFailure => "credentials rejected by the provider; halt until fixed",
            Self::NetworkTimeout => "transient network failure; retry on a later tick",
            Self::GraphEngineError => "graph store rejected the write; batch marked failed",
            Self::InvalidInput => "dropped the offending item; batch is not failed",
            Self::Unclassified => "unrecognized failure; batch marked failed",
        }
    }
}

/// Classifies an `AppError` the way the graph-curator daemon classifies a raw
/// exception message: lowercase substring matching, checked in a fixed
/// priority order so a message naming both "timeout" and "neo4j" still lands
/// on `graph_engine_error`.
pub fn categorize(err: &AppError) -> ErrorCategory {
    if matches!(err, AppError::Validation(_)) {
        return ErrorCategory::InvalidInput;
    }
    categorize_message(&err.to_string())
}

fn categorize_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();

    if lower.contains("rate limit") || lower.contains("429") || lower.contains("too many requests")
    {
        return ErrorCategory::RateLimit;
    }

    if lower.contains("quota")
        || lower.contains("insufficient")
        || lower.contains("billing")
        || lower.contains("credit balance")
    {
        return ErrorCategory::QuotaExceeded;
    }

    if lower.contains("auth")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("invalid api key")
        || lower.contains("api key")
    {
        return ErrorCategory::AuthFailure;
    }

    if lower.contains("neo4j")
        || lower.contains("bolt")
        || lower.contains("cypher")
        || lower.contains("constraint")
    {
        return ErrorCategory::GraphEngineError;
    }

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("read timeout")
        || lower.contains("connection timeout")
    {
        return ErrorCategory::NetworkTimeout;
    }

    if lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("connection error")
    {
        return ErrorCategory::NetworkTimeout;
    }

    ErrorCategory::Unclassified
}
