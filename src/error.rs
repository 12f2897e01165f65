use thiserror::Error;

use crate::id::{Guid, NodeId};

/// A fault in the static catalog. Fatal only to the entity that carries it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("{referrer} references unknown guid {guid}")]
    UnresolvedGuid { guid: Guid, referrer: String },

    #[error("guid {guid} is defined more than once")]
    DuplicateGuid { guid: Guid },

    #[error("{guid} has cycle time {cycle_time}, expected a positive number of seconds")]
    InvalidCycleTime { guid: Guid, cycle_time: f64 },

    #[error("{guid}: {field} must be a finite non-negative number, got {value}")]
    InvalidAmount {
        guid: Guid,
        field: &'static str,
        value: f64,
    },

    #[error("residence {residence} belongs to unknown population level {level}")]
    MissingPopulationLevel { residence: Guid, level: Guid },

    #[error("malformed catalog: {0}")]
    Malformed(String),
}

/// A failure raised while (re)evaluating a computed node.
///
/// Stored on the failing node, so it has to be cheap to clone.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecomputeError {
    #[error("dependency cycle detected at node {0}")]
    Cycle(NodeId),

    #[error("node {0} has no value yet")]
    NoValue(NodeId),

    #[error("{what} evaluated to non-finite {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("runtime has been disposed")]
    Disposed,
}

/// Storage adapter failure. Never aborts computation.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("failed to write {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("malformed persisted value {value:?} for {key}")]
    Malformed { key: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Recompute(#[from] RecomputeError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reject NaN and infinities before they can flow into dependents.
pub fn ensure_finite(what: &'static str, value: f64) -> Result<f64, RecomputeError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RecomputeError::NonFinite { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_values_pass_through() {
        assert_eq!(ensure_finite("boost", 1.5), Ok(1.5));
    }

    #[test]
    fn infinity_is_rejected() {
        let err = ensure_finite("throughput", f64::INFINITY).unwrap_err();
        assert!(matches!(err, RecomputeError::NonFinite { what: "throughput", .. }));
    }

    #[test]
    fn configuration_error_wraps_into_recompute_error() {
        let err: RecomputeError = ConfigurationError::InvalidCycleTime {
            guid: 1010,
            cycle_time: 0.0,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "1010 has cycle time 0, expected a positive number of seconds"
        );
    }
}
