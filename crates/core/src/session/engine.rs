use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::ItemCounts;
use crate::session::states::{
    NoDealReason, Resolution, SessionEvent, SessionState, SessionTransitionError, TransitionOutcome,
};

/// Transition table of a negotiation session. Pure apart from auditing.
#[derive(Clone, Debug)]
pub struct SessionEngine {
    counts: ItemCounts,
    hard_round_ceiling: u32,
}

impl SessionEngine {
    pub fn new(counts: ItemCounts, hard_round_ceiling: u32) -> Self {
        Self { counts, hard_round_ceiling }
    }

    pub fn initial_state(&self) -> SessionState {
        SessionState::Negotiating
    }

    pub fn apply(
        &self,
        current: &SessionState,
        event: &SessionEvent,
    ) -> Result<TransitionOutcome, SessionTransitionError> {
        let to = match (current, event) {
            (SessionState::Negotiating, SessionEvent::RoundCompleted { round, .. })
                if *round > self.hard_round_ceiling =>
            {
                no_deal(NoDealReason::RoundExhaustion)
            }
            (SessionState::Negotiating, SessionEvent::RoundCompleted { halt: Some(_), .. }) => {
                SessionState::PresentingFinalOffer
            }
            (SessionState::Negotiating, SessionEvent::RoundCompleted { halt: None, .. }) => {
                SessionState::Negotiating
            }
            (SessionState::PresentingFinalOffer, SessionEvent::FinalOffersStated { first, second }) => {
                if first.jointly_fits(second, &self.counts) {
                    SessionState::Resolved {
                        resolution: Resolution::Agreement { first: *first, second: *second },
                    }
                } else {
                    no_deal(NoDealReason::AllocationOverflow)
                }
            }
            _ => {
                return Err(SessionTransitionError::InvalidTransition {
                    state: current.clone(),
                    event: event.clone(),
                });
            }
        };

        Ok(TransitionOutcome { from: current.clone(), to, event: event.clone() })
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &SessionState,
        event: &SessionEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, SessionTransitionError>
    where
        S: AuditSink,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "negotiation.transition_applied",
                        AuditCategory::Negotiation,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "negotiation.transition_rejected",
                        AuditCategory::Negotiation,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

fn no_deal(reason: NoDealReason) -> SessionState {
    SessionState::Resolved { resolution: Resolution::NoDeal { reason } }
}
