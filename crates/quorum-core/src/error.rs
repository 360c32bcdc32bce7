//! Rejection reasons surfaced to the ledger collaborator.
//!
//! Per-entry problems (bad signature, failed membership) are not errors: they
//! are recorded as [`EntryStatus`](crate::approval::EntryStatus) values and
//! only zero that entry's contribution. Every variant here aborts the whole
//! authorization attempt.

use thiserror::Error;

use crate::registry::RegistryError;

/// Reasons an authorization attempt is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// Malformed construction or inconsistent input.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// Human-readable reason.
        reason: String,
    },

    /// More entries than the fixed bundle capacity.
    #[error("bundle has {count} entries, capacity is {capacity}")]
    CapacityExceeded {
        /// Number of entries supplied.
        count: usize,
        /// Fixed capacity.
        capacity: usize,
    },

    /// The action is not bound to the account's current sequence number.
    #[error("sequence mismatch: account is at {expected}, action carries {found}")]
    SequenceMismatch {
        /// Current sequence number of the account.
        expected: u32,
        /// Sequence number carried by the action.
        found: u32,
    },

    /// The action names a different subject account.
    #[error("action subject does not match the authorizing account")]
    IdentityMismatch,

    /// The permit's authorization-data hash does not match the payload.
    #[error("permit auth data hash does not match the operation payload")]
    AuthDataMismatch,

    /// Valid, distinct, membership-proven weight is below the threshold.
    #[error("threshold not met: approved weight {approved} of {threshold} required")]
    ThresholdNotMet {
        /// Total approved weight.
        approved: u32,
        /// Required threshold.
        threshold: u32,
    },
}

impl AuthorizationError {
    /// Convenience constructor for [`AuthorizationError::InvalidParameter`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable reason code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::SequenceMismatch { .. } => "sequence_mismatch",
            Self::IdentityMismatch => "identity_mismatch",
            Self::AuthDataMismatch => "auth_data_mismatch",
            Self::ThresholdNotMet { .. } => "threshold_not_met",
        }
    }
}

impl From<RegistryError> for AuthorizationError {
    fn from(err: RegistryError) -> Self {
        Self::InvalidParameter {
            reason: err.to_string(),
        }
    }
}

/// Result type for authorization operations.
pub type AuthorizationResult<T> = Result<T, AuthorizationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            AuthorizationError::invalid("x"),
            AuthorizationError::CapacityExceeded {
                count: 33,
                capacity: 32,
            },
            AuthorizationError::SequenceMismatch {
                expected: 6,
                found: 5,
            },
            AuthorizationError::IdentityMismatch,
            AuthorizationError::AuthDataMismatch,
            AuthorizationError::ThresholdNotMet {
                approved: 10,
                threshold: 25,
            },
        ];
        let mut codes: Vec<_> = errors.iter().map(AuthorizationError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn registry_error_maps_to_invalid_parameter() {
        let err: AuthorizationError = RegistryError::TooManyRecords {
            count: 300,
            max: 256,
        }
        .into();
        assert!(matches!(err, AuthorizationError::InvalidParameter { .. }));
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn display_includes_weights() {
        let err = AuthorizationError::ThresholdNotMet {
            approved: 10,
            threshold: 25,
        };
        assert_eq!(
            err.to_string(),
            "threshold not met: approved weight 10 of 25 required"
        );
    }
}
