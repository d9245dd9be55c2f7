//! Error types for custodia.
//!
//! All errors are strongly typed using thiserror, so a calling surface can
//! pattern match conflicts apart from missing records apart from plain
//! storage failures when translating to status codes.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ids::{AssetId, AssignmentId};
use crate::storage::StorageError;

/// Input validation errors, rejected before any mutation happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A bounded span must end strictly after it starts.
    #[error("Invalid timespan: from ({from}) must be before to ({to})")]
    InvalidTimespan {
        /// Start of the offending span.
        from: DateTime<Utc>,
        /// End of the offending span.
        to: DateTime<Utc>,
    },

    /// A filter condition arrived without a field name.
    #[error("Filter condition field name cannot be empty")]
    EmptyFieldName,

    /// A directory record arrived without a display name.
    #[error("Name cannot be empty")]
    EmptyName,
}

/// Errors raised by the assignment ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The candidate interval conflicts with an existing one for the asset.
    #[error("Overlapping assignment exists for asset {asset_id}")]
    OverlappingAssignment {
        /// Asset whose history rejected the candidate.
        asset_id: AssetId,
    },

    /// No assignment with this id (or it has been deleted).
    #[error("Assignment not found: {id}")]
    AssignmentNotFound {
        /// The missing assignment id.
        id: AssignmentId,
    },

    /// A current assignment was required but the asset has none.
    #[error("Asset {asset_id} has no current assignment")]
    NoCurrentAssignment {
        /// The asset without an active interval.
        asset_id: AssetId,
    },
}

/// Top-level error type for custodia.
#[derive(Debug, Error)]
pub enum CustodiaError {
    /// Invalid input, rejected before reaching the ledger or query engine.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Assignment lifecycle failure.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Backing store failure, surfaced as-is; retry policy belongs to the
    /// caller.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CustodiaError {
    /// Returns true if this is a validation (invalid input) error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an overlapping-assignment conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Ledger(LedgerError::OverlappingAssignment { .. }))
    }

    /// Returns true if this is a missing-record error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Ledger(
                LedgerError::AssignmentNotFound { .. } | LedgerError::NoCurrentAssignment { .. }
            )
        )
    }

    /// Returns true if this is a backing-store failure.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias for custodia operations.
pub type CustodiaResult<T> = Result<T, CustodiaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validation_error_timespan() {
        let from = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = ValidationError::InvalidTimespan { from, to };
        assert!(format!("{err}").contains("Invalid timespan"));
    }

    #[test]
    fn test_ledger_error_messages() {
        let err = LedgerError::OverlappingAssignment {
            asset_id: AssetId::new(3),
        };
        assert!(format!("{err}").contains("asset 3"));

        let err = LedgerError::AssignmentNotFound {
            id: AssignmentId::new(9),
        };
        assert!(format!("{err}").contains('9'));
    }

    #[test]
    fn test_error_classification() {
        let conflict: CustodiaError = LedgerError::OverlappingAssignment {
            asset_id: AssetId::new(1),
        }
        .into();
        assert!(conflict.is_conflict());
        assert!(!conflict.is_not_found());

        let missing: CustodiaError = LedgerError::NoCurrentAssignment {
            asset_id: AssetId::new(1),
        }
        .into();
        assert!(missing.is_not_found());

        let invalid: CustodiaError = ValidationError::EmptyFieldName.into();
        assert!(invalid.is_validation());

        let storage: CustodiaError = StorageError::BackendError("boom".to_string()).into();
        assert!(storage.is_storage());
    }
}
