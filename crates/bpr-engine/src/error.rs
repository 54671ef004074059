use std::fmt;

use bpr_reconcile::{DecisionError, EffectiveStatus};
use bpr_schemas::DecisionStatus;

use crate::sources::{SourceFailure, SourceKind};

/// Every way an engine operation can fail.
///
/// Callers branch on [`EngineError::is_retryable`] and
/// [`EngineError::is_conflict`]; a missing bid is never an empty roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    BidNotFound {
        bid_id: String,
    },
    /// A required collection could not be read. Retryable.
    SourceUnavailable {
        kind: SourceKind,
        detail: String,
    },
    ParticipationNotFound {
        bid_id: String,
        phone: String,
    },
    /// The pair already carries a decision.
    AlreadyDecided {
        bid_id: String,
        phone: String,
        current: EffectiveStatus,
        attempted: DecisionStatus,
    },
    /// The store refused a second row for the pair, but the row was not
    /// visible on re-read yet.
    DuplicateDecision {
        bid_id: String,
        phone: String,
    },
    InvalidPhone {
        raw: String,
    },
    /// The confirmation write did not complete. Retryable.
    WriteFailed {
        detail: String,
    },
}

impl EngineError {
    pub fn source(kind: SourceKind, failure: SourceFailure) -> Self {
        EngineError::SourceUnavailable {
            kind,
            detail: failure.message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::SourceUnavailable { .. } | EngineError::WriteFailed { .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            EngineError::AlreadyDecided { .. } | EngineError::DuplicateDecision { .. }
        )
    }

    /// Stable machine-readable code for transports.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::BidNotFound { .. } => "BID_NOT_FOUND",
            EngineError::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            EngineError::ParticipationNotFound { .. } => "PARTICIPATION_NOT_FOUND",
            EngineError::AlreadyDecided { .. } => "ALREADY_DECIDED",
            EngineError::DuplicateDecision { .. } => "DUPLICATE_DECISION",
            EngineError::InvalidPhone { .. } => "INVALID_PHONE",
            EngineError::WriteFailed { .. } => "WRITE_FAILED",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::BidNotFound { bid_id } => write!(f, "bid {bid_id} not found"),
            EngineError::SourceUnavailable { kind, detail } => {
                write!(f, "source {kind} unavailable (retryable): {detail}")
            }
            EngineError::ParticipationNotFound { bid_id, phone } => {
                write!(f, "no participation for bid={bid_id} phone={phone}")
            }
            EngineError::AlreadyDecided {
                bid_id,
                phone,
                current,
                attempted,
            } => write!(
                f,
                "conflict: bid={bid_id} phone={phone} already {current}; refusing {attempted}"
            ),
            EngineError::DuplicateDecision { bid_id, phone } => write!(
                f,
                "conflict: confirmation already recorded for bid={bid_id} phone={phone}"
            ),
            EngineError::InvalidPhone { raw } => write!(f, "phone {raw:?} contains no digits"),
            EngineError::WriteFailed { detail } => {
                write!(f, "confirmation write failed (retryable): {detail}")
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<DecisionError> for EngineError {
    fn from(e: DecisionError) -> Self {
        match e {
            DecisionError::InvalidPhone { raw } => EngineError::InvalidPhone { raw },
            DecisionError::ParticipationNotFound { bid_id, phone } => {
                EngineError::ParticipationNotFound { bid_id, phone }
            }
            DecisionError::AlreadyDecided {
                bid_id,
                phone,
                current,
                attempted,
            } => EngineError::AlreadyDecided {
                bid_id,
                phone,
                current,
                attempted,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let src = EngineError::source(SourceKind::Participations, SourceFailure::new("timeout"));
        assert!(src.is_retryable());
        assert!(!src.is_conflict());
        assert!(src.to_string().contains("participations"));

        let dup = EngineError::DuplicateDecision {
            bid_id: "B1".into(),
            phone: "9999999999".into(),
        };
        assert!(dup.is_conflict());
        assert!(!dup.is_retryable());

        let nf = EngineError::BidNotFound { bid_id: "B9".into() };
        assert!(!nf.is_retryable() && !nf.is_conflict());
        assert_eq!(nf.code(), "BID_NOT_FOUND");
    }
}
