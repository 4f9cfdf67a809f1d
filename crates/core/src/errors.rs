use thiserror::Error;

use crate::domain::items::CATEGORY_COUNT;
use crate::session::states::SessionTransitionError;

type Triple = [u32; CATEGORY_COUNT];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("item values {values:?} must each lie in 0..=10")]
    ValueOutOfRange { values: Triple },
    #[error("item values {values:?} price counts {counts:?} at {total}, expected 10")]
    OffBudget { values: Triple, counts: Triple, total: u32 },
    #[error("item counts {counts:?} must each lie in 0..=10")]
    CountOutOfRange { counts: Triple },
    #[error("allocation {allocation:?} exceeds item counts {counts:?}")]
    AllocationExceedsCounts { allocation: Triple, counts: Triple },
    #[error("unknown item category `{0}`")]
    UnknownCategory(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is missing the `{tag}` segment")]
    MissingSegment { tag: &'static str },
    #[error("segment `{tag}` holds malformed token `{token}`")]
    MalformedToken { tag: &'static str, token: String },
    #[error("segment `{tag}` holds {found} tokens, expected {expected}")]
    WrongTokenCount { tag: &'static str, expected: usize, found: usize },
    #[error("agent item counts disagree: {first:?} vs {second:?}")]
    CountMismatch { first: Triple, second: Triple },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("line {line}: {source}")]
    Line { line: usize, source: Box<RecordError> },
}

/// A single collaborator response that broke the delimiter contract, or a
/// generation call that failed outright. Always retriable.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("response is missing `{open}`...`{close}` delimiters")]
    MissingDelimiter { open: &'static str, close: &'static str },
    #[error("malformed allocation `{0}`")]
    MalformedAllocation(String),
    #[error("unrecognized answer `{0}`")]
    UnrecognizedAnswer(String),
    #[error("proposed allocation {allocation} exceeds the item pool")]
    AllocationOutOfRange { allocation: String },
    #[error("text generation failed: {0}")]
    Generation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("`{operation}` gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { operation: &'static str, attempts: u32, last_error: ResponseError },
}

/// Fatal session failures. Everything recoverable is folded into the
/// session resolution instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("collaborator for {agent} failed: {source}")]
    Collaborator { agent: String, source: CollaboratorError },
    #[error(transparent)]
    Transition(#[from] SessionTransitionError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl SessionError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Collaborator { .. } => "collaborator_retry_exhausted",
            Self::Transition(_) => "invalid_transition",
            Self::Domain(_) => "domain_invariant",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{CollaboratorError, RecordError, ResponseError, SessionError};

    #[test]
    fn exhausted_collaborator_maps_to_fatal_error_class() {
        let error = SessionError::Collaborator {
            agent: "Alice".to_owned(),
            source: CollaboratorError::RetriesExhausted {
                operation: "negotiate",
                attempts: 3,
                last_error: ResponseError::MissingDelimiter { open: "<s>", close: "</s>" },
            },
        };

        assert_eq!(error.error_class(), "collaborator_retry_exhausted");
        assert!(error.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn line_errors_keep_the_inner_reason() {
        let error = RecordError::Line {
            line: 4,
            source: Box::new(RecordError::MissingSegment { tag: "<output>" }),
        };

        assert_eq!(error.to_string(), "line 4: record is missing the `<output>` segment");
    }
}
