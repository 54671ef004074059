//! Confirmation state machine.
//!
//! # Design
//!
//! ```text
//!            Confirmed (term.)
//!          ▲
//!  Review ─┤
//!          ▼
//!            Rejected (term.)
//! ```
//!
//! `Review` is implicit: a participation with no confirmation row. The only
//! legal move is out of `Review`; every other request is a conflict. The
//! store's uniqueness constraint on (bid, phone) backs the same rule for
//! writers racing past this check.

use bpr_schemas::{DecisionSnapshot, DecisionStatus, NewConfirmation, RawId};
use chrono::{DateTime, Utc};

use crate::identity::PhoneNormalizer;
use crate::roster::{EffectiveStatus, RosterEntry};

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// A decision was requested on a participation that is no longer in Review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: EffectiveStatus,
    pub attempted: DecisionStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal confirmation transition: {} -> {}",
            self.from, self.attempted
        )
    }
}

impl std::error::Error for TransitionError {}

/// The single authoritative transition function.
pub fn transition(
    current: EffectiveStatus,
    decision: DecisionStatus,
) -> Result<EffectiveStatus, TransitionError> {
    match current {
        EffectiveStatus::Review => Ok(EffectiveStatus::from(decision)),
        EffectiveStatus::Confirmed | EffectiveStatus::Rejected => Err(TransitionError {
            from: current,
            attempted: decision,
        }),
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    /// Phone value holds no digits.
    InvalidPhone { raw: String },
    /// No participation for (bid, phone) in the current roster.
    ParticipationNotFound { bid_id: String, phone: String },
    /// The pair already carries a terminal decision.
    AlreadyDecided {
        bid_id: String,
        phone: String,
        current: EffectiveStatus,
        attempted: DecisionStatus,
    },
}

impl std::fmt::Display for DecisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionError::InvalidPhone { raw } => {
                write!(f, "phone {raw:?} contains no digits")
            }
            DecisionError::ParticipationNotFound { bid_id, phone } => {
                write!(f, "no participation for bid={bid_id} phone={phone}")
            }
            DecisionError::AlreadyDecided {
                bid_id,
                phone,
                current,
                attempted,
            } => write!(
                f,
                "bid={bid_id} phone={phone} already {current}; refusing {attempted}"
            ),
        }
    }
}

impl std::error::Error for DecisionError {}

/// Everything needed to decide one participation.
#[derive(Debug, Clone)]
pub struct DecisionInput<'a> {
    pub bid_id: &'a str,
    pub phone: &'a RawId,
    pub snapshot: &'a DecisionSnapshot,
    pub decision: DecisionStatus,
    pub decided_by: &'a str,
    pub decided_at: DateTime<Utc>,
}

/// Validate a decision against the freshly built roster of its bid and
/// produce the write request.
///
/// `roster` must be the roster of `input.bid_id`.
pub fn plan_decision(
    roster: &[RosterEntry],
    normalizer: PhoneNormalizer,
    input: DecisionInput<'_>,
) -> Result<NewConfirmation, DecisionError> {
    let key = normalizer
        .normalize(input.phone)
        .ok_or_else(|| DecisionError::InvalidPhone {
            raw: input.phone.as_text(),
        })?;

    let entry = roster
        .iter()
        .find(|e| e.bid_id == input.bid_id && e.phone_key.as_deref() == Some(key.as_str()))
        .ok_or_else(|| DecisionError::ParticipationNotFound {
            bid_id: input.bid_id.to_string(),
            phone: key.clone(),
        })?;

    transition(entry.effective_status, input.decision).map_err(|e| {
        DecisionError::AlreadyDecided {
            bid_id: input.bid_id.to_string(),
            phone: key.clone(),
            current: e.from,
            attempted: e.attempted,
        }
    })?;

    Ok(NewConfirmation {
        bid_id: input.bid_id.to_string(),
        phone: input.phone.clone(),
        phone_normalized: key,
        snapshot: input.snapshot.clone(),
        status: input.decision,
        decided_by: input.decided_by.to_string(),
        decided_at: input.decided_at,
    })
}
