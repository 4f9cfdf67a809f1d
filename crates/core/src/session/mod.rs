//! Turn-based negotiation between two agents.
//!
//! [`engine::SessionEngine`] owns the transition table; [`driver::NegotiationSession`]
//! runs the rounds, translates offers between the two seats and feeds the
//! resulting events to the engine.

pub mod agent;
pub mod collaborator;
pub mod driver;
pub mod engine;
pub mod states;

pub use agent::{AgentTrace, NegotiatingAgent, TurnOutcome};
pub use collaborator::{
    RetryPolicy, TurnCollaborator, TurnContext, TurnGuidance, TurnReply, TurnSignal, HALT_SIGNAL,
};
pub use driver::{NegotiationSession, SessionResult, SessionSettings};
pub use engine::SessionEngine;
pub use states::{
    HaltReason, NoDealReason, Resolution, SessionEvent, SessionState, SessionTransitionError,
    TransitionOutcome,
};
