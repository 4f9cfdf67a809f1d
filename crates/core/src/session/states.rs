use serde::Serialize;
use thiserror::Error;

use crate::domain::Allocation;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Negotiating,
    PresentingFinalOffer,
    Resolved { resolution: Resolution },
}

impl SessionState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Agreement { first: Allocation, second: Allocation },
    NoDeal { reason: NoDealReason },
}

impl Resolution {
    pub fn allocations(&self) -> Option<(Allocation, Allocation)> {
        match self {
            Self::Agreement { first, second } => Some((*first, *second)),
            Self::NoDeal { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDealReason {
    /// The restated final shares claim more than the pool holds.
    AllocationOverflow,
    /// The cumulative round count passed the hard ceiling.
    RoundExhaustion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    BothHalted,
    ConfirmedAgreement,
    RoundCeiling,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SessionEvent {
    RoundCompleted { round: u32, halt: Option<HaltReason> },
    FinalOffersStated { first: Allocation, second: Allocation },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub from: SessionState,
    pub to: SessionState,
    pub event: SessionEvent,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: SessionState, event: SessionEvent },
}
