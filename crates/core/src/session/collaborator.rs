//! The seam between the deterministic session and whatever turns a turn
//! context into words: a language model in production, a script in tests.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::belief::{BeliefProbabilities, BeliefSet};
use crate::domain::{Allocation, ItemCounts, ProposalHistory, Seat, Valuation};
use crate::errors::{CollaboratorError, ResponseError};
use crate::proposal::ProposalPolicy;

/// The one phrase that ends negotiation, after normalization.
pub const HALT_SIGNAL: &str = "halt negotiation";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnSignal {
    Proposal { allocation: Allocation },
    NoProposal,
    Halt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub message: String,
    pub signal: TurnSignal,
}

impl TurnReply {
    pub fn is_halt(&self) -> bool {
        self.signal == TurnSignal::Halt
    }

    pub fn proposal(&self) -> Option<Allocation> {
        match self.signal {
            TurnSignal::Proposal { allocation } => Some(allocation),
            TurnSignal::NoProposal | TurnSignal::Halt => None,
        }
    }
}

/// Belief analysis offered to an agent that runs the guided workflow.
#[derive(Clone, Copy, Debug)]
pub struct TurnGuidance<'a> {
    pub beliefs: &'a BeliefSet,
    pub probabilities: BeliefProbabilities,
    pub policy: ProposalPolicy<'a>,
}

/// Everything a collaborator may read when producing one turn.
#[derive(Clone, Copy, Debug)]
pub struct TurnContext<'a> {
    pub name: &'static str,
    pub opponent: &'static str,
    pub seat: Seat,
    pub counts: &'a ItemCounts,
    pub valuation: &'a Valuation,
    pub round: u32,
    pub max_rounds: u32,
    pub transcript: &'a [String],
    pub history: &'a ProposalHistory,
    pub guidance: Option<TurnGuidance<'a>>,
}

pub trait TurnCollaborator {
    /// Produces the next negotiation message and what it amounts to.
    fn negotiate(&self, context: &TurnContext<'_>) -> Result<TurnReply, CollaboratorError>;

    /// Restates the share this agent believes it walks away with.
    fn present_final_offer(&self, context: &TurnContext<'_>) -> Result<Allocation, CollaboratorError>;
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Runs `attempt` with the 1-based attempt number until it succeeds or
    /// the budget is spent.
    pub fn run<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut(u32) -> Result<T, ResponseError>,
    ) -> Result<T, CollaboratorError> {
        let mut number = 1;
        loop {
            match attempt(number) {
                Ok(value) => return Ok(value),
                Err(error) if number >= self.max_attempts => {
                    return Err(CollaboratorError::RetriesExhausted {
                        operation,
                        attempts: number,
                        last_error: error,
                    });
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.collaborator.retry",
                        operation,
                        attempt = number,
                        error = %error,
                        "collaborator response rejected, retrying"
                    );
                    if !self.backoff.is_zero() {
                        thread::sleep(self.backoff);
                    }
                    number += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(100))
    }
}
