use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
    RecordingAuditSink,
};
use crate::belief::BeliefUpdate;
use crate::config::WorkflowSeats;
use crate::domain::{Allocation, ItemCounts, Seat, Valuation};
use crate::errors::SessionError;
use crate::session::agent::{AgentTrace, NegotiatingAgent};
use crate::session::collaborator::{RetryPolicy, TurnCollaborator};
use crate::session::engine::SessionEngine;
use crate::session::states::{HaltReason, Resolution, SessionEvent, SessionState};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionSettings {
    pub max_rounds: u32,
    pub hard_round_ceiling: u32,
    pub deterioration_rate: f64,
    pub workflow: WorkflowSeats,
    /// Budget for turns whose offer does not fit the pool.
    pub retry: RetryPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_rounds: 20,
            hard_round_ceiling: 20,
            deterioration_rate: 0.0,
            workflow: WorkflowSeats::Both,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionResult {
    pub session_id: String,
    pub resolution: Resolution,
    pub rounds: u32,
    pub halt: Option<HaltReason>,
    pub transcript: Vec<String>,
    /// Alice's offers and Bob's offers, both expressed as Alice's share.
    pub first_trajectory: Vec<Allocation>,
    pub second_trajectory: Vec<Allocation>,
    pub first: AgentTrace,
    pub second: AgentTrace,
    pub audit_events: Vec<AuditEvent>,
}

/// Drives two agents through the session state machine.
pub struct NegotiationSession<C, S = InMemoryAuditSink> {
    session_id: String,
    settings: SessionSettings,
    engine: SessionEngine,
    first: NegotiatingAgent,
    second: NegotiatingAgent,
    first_collaborator: C,
    second_collaborator: C,
    audit: RecordingAuditSink<S>,
    transcript: Vec<String>,
    state: SessionState,
    rounds: u32,
    halt: Option<HaltReason>,
}

impl<C> NegotiationSession<C, InMemoryAuditSink>
where
    C: TurnCollaborator,
{
    pub fn new(
        counts: ItemCounts,
        valuations: (Valuation, Valuation),
        settings: SessionSettings,
        collaborators: (C, C),
    ) -> Self {
        Self::with_audit_sink(counts, valuations, settings, collaborators, InMemoryAuditSink::default())
    }
}

impl<C, S> NegotiationSession<C, S>
where
    C: TurnCollaborator,
    S: AuditSink,
{
    pub fn with_audit_sink(
        counts: ItemCounts,
        (first_valuation, second_valuation): (Valuation, Valuation),
        settings: SessionSettings,
        (first_collaborator, second_collaborator): (C, C),
        sink: S,
    ) -> Self {
        let agent = |seat: Seat, valuation: Valuation| {
            NegotiatingAgent::new(
                seat,
                counts,
                valuation,
                settings.workflow.enables(seat),
                settings.deterioration_rate,
                settings.retry,
            )
        };
        let engine = SessionEngine::new(counts, settings.hard_round_ceiling);
        Self {
            session_id: Uuid::new_v4().to_string(),
            settings,
            state: engine.initial_state(),
            engine,
            first: agent(Seat::First, first_valuation),
            second: agent(Seat::Second, second_valuation),
            first_collaborator,
            second_collaborator,
            audit: RecordingAuditSink::new(sink),
            transcript: Vec::new(),
            rounds: 0,
            halt: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Runs the session to resolution. Only an exhausted collaborator or a
    /// broken invariant aborts; every other failure resolves as no deal.
    pub fn play(mut self) -> Result<SessionResult, SessionError> {
        info!(
            event_name = "negotiation.session.started",
            session_id = %self.session_id,
            max_rounds = self.settings.max_rounds,
            "negotiation session started"
        );

        let resolution = match self.run_to_resolution() {
            Ok(resolution) => resolution,
            Err(error) => {
                self.abort(&error);
                return Err(error);
            }
        };
        Ok(self.finish(resolution))
    }

    fn abort(&self, error: &SessionError) {
        warn!(
            event_name = "negotiation.session.aborted",
            session_id = %self.session_id,
            round = self.rounds,
            error_class = error.error_class(),
            error = %error,
            "negotiation session aborted"
        );
        self.audit.emit(
            AuditEvent::new(
                &self.audit_context("session"),
                "negotiation.session.aborted",
                AuditCategory::Collaborator,
                AuditOutcome::Failed,
            )
            .with_metadata("error_class", error.error_class())
            .with_metadata("error", error.to_string()),
        );
    }

    fn run_to_resolution(&mut self) -> Result<Resolution, SessionError> {
        loop {
            let event = match &self.state {
                SessionState::Resolved { resolution } => return Ok(resolution.clone()),
                SessionState::Negotiating => {
                    self.rounds += 1;
                    let halt = self.play_round()?;
                    SessionEvent::RoundCompleted { round: self.rounds, halt }
                }
                SessionState::PresentingFinalOffer => {
                    let (round, max_rounds) = (self.rounds, self.settings.max_rounds);
                    let first = self.first.present_final_offer(&self.first_collaborator, round, max_rounds)?;
                    let second = self.second.present_final_offer(&self.second_collaborator, round, max_rounds)?;
                    SessionEvent::FinalOffersStated { first, second }
                }
            };

            let context = self.audit_context("session");
            let outcome = self.engine.apply_with_audit(&self.state, &event, &self.audit, &context)?;
            self.state = outcome.to;
        }
    }

    /// One exchange: Alice speaks, Bob replies. Returns why negotiation
    /// should stop, if it should.
    fn play_round(&mut self) -> Result<Option<HaltReason>, SessionError> {
        let round = self.rounds;
        let max_rounds = self.settings.max_rounds;

        let opening = self.first.take_turn(&self.first_collaborator, round, max_rounds)?;
        self.record_belief_update(Seat::First, opening.belief_update);
        self.broadcast(format!("{} said in round {round}: {}", self.first.name(), opening.reply.message));
        let seen_by_second = self.first.offers_as_seen_by_opponent()?;
        self.second.observe_opponent(seen_by_second);

        let reply = self.second.take_turn(&self.second_collaborator, round, max_rounds)?;
        self.record_belief_update(Seat::Second, reply.belief_update);
        self.broadcast(format!("{} replied in round {round}: {}", self.second.name(), reply.reply.message));
        let seen_by_first = self.second.offers_as_seen_by_opponent()?;
        self.first.observe_opponent(seen_by_first);

        let halt = if opening.reply.is_halt() && reply.reply.is_halt() {
            Some(HaltReason::BothHalted)
        } else if self.first.history().agreement_confirmed_twice() {
            Some(HaltReason::ConfirmedAgreement)
        } else if round >= max_rounds {
            Some(HaltReason::RoundCeiling)
        } else {
            None
        };

        info!(
            event_name = "negotiation.round.completed",
            session_id = %self.session_id,
            round,
            first_offer = ?opening.reply.proposal(),
            second_offer = ?reply.reply.proposal(),
            halt = ?halt,
            "negotiation round completed"
        );
        if halt.is_some() {
            self.halt = halt;
        }
        Ok(halt)
    }

    fn broadcast(&mut self, line: String) {
        self.first.hear(line.clone());
        self.second.hear(line.clone());
        self.transcript.push(line);
    }

    fn record_belief_update(&mut self, seat: Seat, update: Option<BeliefUpdate>) {
        let (event_type, outcome) = match update {
            Some(BeliefUpdate::Reset) => ("negotiation.belief.reset", AuditOutcome::Recovered),
            Some(BeliefUpdate::Collapsed) => ("negotiation.belief.collapsed", AuditOutcome::Recovered),
            _ => return,
        };
        let agent = match seat {
            Seat::First => &self.first,
            Seat::Second => &self.second,
        };
        let hypotheses = agent.beliefs().current().map_or(0, |beliefs| beliefs.len());
        let event = AuditEvent::new(&self.audit_context(agent.name()), event_type, AuditCategory::Belief, outcome)
            .with_metadata("hypotheses", hypotheses.to_string());
        self.audit.emit(event);
    }

    fn finish(self, resolution: Resolution) -> SessionResult {
        let outcome = match &resolution {
            Resolution::Agreement { .. } => AuditOutcome::Success,
            Resolution::NoDeal { .. } => AuditOutcome::Recovered,
        };
        self.audit.emit(
            AuditEvent::new(
                &self.audit_context("session"),
                "negotiation.session.resolved",
                AuditCategory::Resolution,
                outcome,
            )
                .with_metadata("resolution", format!("{resolution:?}"))
                .with_metadata("rounds", self.rounds.to_string()),
        );
        info!(
            event_name = "negotiation.session.resolved",
            session_id = %self.session_id,
            rounds = self.rounds,
            resolution = ?resolution,
            "negotiation session resolved"
        );

        SessionResult {
            session_id: self.session_id,
            resolution,
            rounds: self.rounds,
            halt: self.halt,
            transcript: self.transcript,
            first_trajectory: self.first.history().own().to_vec(),
            second_trajectory: self.first.history().observed().to_vec(),
            first: self.first.trace(),
            second: self.second.trace(),
            audit_events: self.audit.recorded(),
        }
    }

    fn audit_context(&self, actor: &str) -> AuditContext {
        AuditContext::new(self.session_id.clone(), Some(self.rounds), actor)
    }
}
