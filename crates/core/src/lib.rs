pub mod audit;
pub mod belief;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod errors;
pub mod fairness;
pub mod outcome;
pub mod partition;
pub mod proposal;
pub mod scoring;
pub mod session;

pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink};
pub use belief::{BeliefModel, BeliefProbabilities, BeliefSet, BeliefSnapshot, BeliefUpdate};
pub use dataset::{select_by_difficulty, DatasetSummary};
pub use domain::{
    Allocation, Category, ItemCounts, NegotiationRecord, ProposalHistory, ReferenceOutcome, Seat,
    Valuation,
};
pub use errors::{CollaboratorError, DomainError, RecordError, ResponseError, SessionError};
pub use outcome::{OutcomeEvaluator, OutcomeReport};
pub use partition::{Partition, PartitionSpace};
pub use proposal::{ProposalPolicy, RankedProposal};
pub use scoring::score;
pub use session::{
    NegotiationSession, Resolution, RetryPolicy, SessionResult, SessionSettings, TurnCollaborator,
    TurnContext, TurnReply, TurnSignal,
};
