use serde::Serialize;

use crate::belief::{BeliefModel, BeliefSnapshot, BeliefUpdate};
use crate::domain::{Allocation, ItemCounts, ProposalHistory, Seat, Valuation};
use crate::errors::{DomainError, ResponseError, SessionError};
use crate::partition::PartitionSpace;
use crate::proposal::ProposalPolicy;
use crate::session::collaborator::{RetryPolicy, TurnCollaborator, TurnContext, TurnGuidance, TurnReply};

/// What one agent did in its turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply: TurnReply,
    pub belief_update: Option<BeliefUpdate>,
}

/// One side of the table. Owns its history, beliefs and transcript; the
/// session only ever hands it translated copies of the opponent's offers.
#[derive(Clone, Debug)]
pub struct NegotiatingAgent {
    seat: Seat,
    counts: ItemCounts,
    valuation: Valuation,
    space: PartitionSpace,
    history: ProposalHistory,
    beliefs: BeliefModel,
    transcript: Vec<String>,
    uses_workflow: bool,
    deterioration_rate: f64,
    retry: RetryPolicy,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentTrace {
    pub name: &'static str,
    pub proposals: Vec<Allocation>,
    pub observed: Vec<Allocation>,
    pub beliefs: Vec<BeliefSnapshot>,
}

impl NegotiatingAgent {
    pub fn new(
        seat: Seat,
        counts: ItemCounts,
        valuation: Valuation,
        uses_workflow: bool,
        deterioration_rate: f64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            seat,
            counts,
            valuation,
            space: PartitionSpace::new(counts),
            history: ProposalHistory::default(),
            beliefs: BeliefModel::new(counts),
            transcript: Vec::new(),
            uses_workflow,
            deterioration_rate,
            retry,
        }
    }

    pub fn name(&self) -> &'static str {
        self.seat.display_name()
    }

    pub fn seat(&self) -> Seat {
        self.seat
    }

    pub fn history(&self) -> &ProposalHistory {
        &self.history
    }

    pub fn beliefs(&self) -> &BeliefModel {
        &self.beliefs
    }

    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn hear(&mut self, line: impl Into<String>) {
        self.transcript.push(line.into());
    }

    /// Installs the opponent's offers, already translated into our shares.
    pub fn observe_opponent(&mut self, observed: Vec<Allocation>) {
        self.history.replace_observed(observed);
    }

    /// Our offers as the opponent sees them.
    pub fn offers_as_seen_by_opponent(&self) -> Result<Vec<Allocation>, DomainError> {
        self.history
            .own()
            .iter()
            .map(|allocation| {
                allocation.complement(&self.counts).ok_or_else(|| {
                    DomainError::InvariantViolation(format!(
                        "{} recorded an offer outside the pool: {allocation}",
                        self.name()
                    ))
                })
            })
            .collect()
    }

    pub fn take_turn<C>(
        &mut self,
        collaborator: &C,
        round: u32,
        max_rounds: u32,
    ) -> Result<TurnOutcome, SessionError>
    where
        C: TurnCollaborator,
    {
        let belief_update = match (self.uses_workflow, self.history.last_observed()) {
            (true, Some(theirs)) => {
                let theirs = *theirs;
                Some(self.beliefs.update(self.history.last_own(), &theirs))
            }
            _ => None,
        };

        let with_feedback = self.uses_workflow && round >= 2 && !self.history.own().is_empty();
        let reply = {
            let guidance = if with_feedback { self.guidance() } else { None };
            let context = self.context(round, max_rounds, guidance);
            // An offer that does not fit the pool is a malformed response and
            // spends the retry budget like any other.
            self.retry
                .run("negotiate", |_| match collaborator.negotiate(&context) {
                    Err(fatal) => Ok(Err(fatal)),
                    Ok(reply) => match reply.proposal() {
                        Some(allocation) if !allocation.fits_within(&self.counts) => {
                            Err(ResponseError::AllocationOutOfRange { allocation: allocation.to_string() })
                        }
                        _ => Ok(Ok(reply)),
                    },
                })
                .and_then(|reply| reply)
                .map_err(|source| SessionError::Collaborator { agent: self.name().to_string(), source })?
        };

        if let Some(allocation) = reply.proposal() {
            self.history.record_own(allocation);
        }

        Ok(TurnOutcome { reply, belief_update })
    }

    pub fn present_final_offer<C>(&self, collaborator: &C, round: u32, max_rounds: u32) -> Result<Allocation, SessionError>
    where
        C: TurnCollaborator,
    {
        let context = self.context(round, max_rounds, None);
        collaborator
            .present_final_offer(&context)
            .map_err(|source| SessionError::Collaborator { agent: self.name().to_string(), source })
    }

    pub fn trace(&self) -> AgentTrace {
        AgentTrace {
            name: self.name(),
            proposals: self.history.own().to_vec(),
            observed: self.history.observed().to_vec(),
            beliefs: self.beliefs.snapshots().to_vec(),
        }
    }

    fn guidance(&self) -> Option<TurnGuidance<'_>> {
        let beliefs = self.beliefs.current()?;
        let probabilities = beliefs.probabilities()?;
        let policy = ProposalPolicy::new(
            self.seat,
            &self.space,
            &self.valuation,
            &self.history,
            self.deterioration_rate,
        );
        Some(TurnGuidance { beliefs, probabilities, policy })
    }

    fn context<'a>(&'a self, round: u32, max_rounds: u32, guidance: Option<TurnGuidance<'a>>) -> TurnContext<'a> {
        TurnContext {
            name: self.name(),
            opponent: self.seat.opponent().display_name(),
            seat: self.seat,
            counts: &self.counts,
            valuation: &self.valuation,
            round,
            max_rounds,
            transcript: &self.transcript,
            history: &self.history,
            guidance,
        }
    }
}
