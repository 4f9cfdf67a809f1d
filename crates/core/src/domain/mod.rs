pub mod history;
pub mod items;
pub mod record;

pub use history::{ProposalHistory, Seat};
pub use items::{
    Allocation, Category, ItemCounts, Valuation, CATEGORY_COUNT, MAX_ITEM_COUNT, MAX_ITEM_VALUE,
    VALUATION_BUDGET,
};
pub use record::{describe_valuation, parse_records, NegotiationRecord, ReferenceOutcome};
