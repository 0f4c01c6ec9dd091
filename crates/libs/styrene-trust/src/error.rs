use crate::types::{BoundaryId, Pid};

/// Errors returned by registry and manager operations.
///
/// Duplicate inserts and removals of absent associations are not errors;
/// those calls return `Ok(false)` so racing callers can treat them as benign.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TrustError {
    #[error("invalid boundary: {id} is not registered")]
    InvalidBoundary { id: BoundaryId },

    #[error("target not found: no live session with pid {pid}")]
    TargetNotFound { pid: Pid },

    #[error("limit exceeded: {limit} (max {max})")]
    LimitExceeded { limit: &'static str, max: usize },
}

impl TrustError {
    /// Returns `true` for errors caused by host misuse rather than runtime
    /// conditions. These indicate a broken invariant and should be surfaced
    /// loudly.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::InvalidBoundary { .. })
    }

    pub fn limit_exceeded(limit: &'static str, max: usize) -> Self {
        Self::LimitExceeded { limit, max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identifiers() {
        let err = TrustError::InvalidBoundary { id: BoundaryId(3) };
        assert_eq!(err.to_string(), "invalid boundary: 3 is not registered");
        let err = TrustError::TargetNotFound { pid: Pid(42) };
        assert_eq!(err.to_string(), "target not found: no live session with pid 42");
    }

    #[test]
    fn only_invalid_boundary_is_a_programming_error() {
        assert!(TrustError::InvalidBoundary { id: BoundaryId(1) }.is_programming_error());
        assert!(!TrustError::TargetNotFound { pid: Pid(1) }.is_programming_error());
        assert!(!TrustError::limit_exceeded("max_waiting_per_boundary", 4).is_programming_error());
    }
}
