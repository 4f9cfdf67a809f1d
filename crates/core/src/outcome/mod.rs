//! Post-hoc verdicts on a finished session and on the human reference deal.

use serde::Serialize;

use crate::domain::{Allocation, ItemCounts, NegotiationRecord, ReferenceOutcome, Valuation};
use crate::fairness::{
    have_envy_free_solution, is_envy_free_partition, is_pareto_optimal,
    pareto_optimal_envy_free_partitions,
};
use crate::scoring::score;
use crate::session::Resolution;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutcomeReport {
    pub first_share: Allocation,
    pub second_share: Allocation,
    pub first_score: u32,
    pub second_score: u32,
    /// What each party would score holding the other's share.
    pub first_switch_score: u32,
    pub second_switch_score: u32,
    pub pareto_optimal: bool,
    pub envy_free: bool,
    pub envy_free_and_pareto_optimal: bool,
    pub valuation_distance: u32,
}

#[derive(Clone, Debug)]
pub struct OutcomeEvaluator {
    counts: ItemCounts,
    first_valuation: Valuation,
    second_valuation: Valuation,
}

impl OutcomeEvaluator {
    pub fn new(counts: ItemCounts, first_valuation: Valuation, second_valuation: Valuation) -> Self {
        Self { counts, first_valuation, second_valuation }
    }

    pub fn for_record(record: &NegotiationRecord) -> Self {
        Self::new(record.counts, record.first_valuation, record.second_valuation)
    }

    pub fn has_envy_free_solution(&self) -> bool {
        have_envy_free_solution(&self.counts, &self.first_valuation, &self.second_valuation)
    }

    pub fn evaluate(&self, first: &Allocation, second: &Allocation) -> OutcomeReport {
        let envy_free = is_envy_free_partition(
            first,
            second,
            &self.first_valuation,
            &self.second_valuation,
            &self.counts,
        );
        let pareto_optimal =
            is_pareto_optimal(first, &self.first_valuation, second, &self.second_valuation, &self.counts);
        let envy_free_and_pareto_optimal =
            pareto_optimal_envy_free_partitions(&self.counts, &self.first_valuation, &self.second_valuation)
                .iter()
                .any(|partition| partition.first == *first && partition.second == *second);

        OutcomeReport {
            first_share: *first,
            second_share: *second,
            first_score: score(&self.first_valuation, first),
            second_score: score(&self.second_valuation, second),
            first_switch_score: score(&self.first_valuation, second),
            second_switch_score: score(&self.second_valuation, first),
            pareto_optimal,
            envy_free,
            envy_free_and_pareto_optimal,
            valuation_distance: self.first_valuation.l1_distance(&self.second_valuation),
        }
    }

    /// `None` unless the session ended with concrete shares.
    pub fn evaluate_resolution(&self, resolution: &Resolution) -> Option<OutcomeReport> {
        resolution.allocations().map(|(first, second)| self.evaluate(&first, &second))
    }

    /// `None` when the humans never reached a concrete split.
    pub fn evaluate_reference(&self, reference: &ReferenceOutcome) -> Option<OutcomeReport> {
        reference.allocations().map(|(first, second)| self.evaluate(&first, &second))
    }
}

#[cfg(test)]
mod tests {
    use super::OutcomeEvaluator;
    use crate::domain::{Allocation, ItemCounts, ReferenceOutcome, Valuation};
    use crate::session::{NoDealReason, Resolution};

    fn evaluator() -> OutcomeEvaluator {
        let counts = ItemCounts::new([1, 1, 1]);
        OutcomeEvaluator::new(
            counts,
            Valuation::new([10, 0, 0], &counts).expect("valid valuation"),
            Valuation::new([0, 5, 5], &counts).expect("valid valuation"),
        )
    }

    #[test]
    fn agreement_reports_scores_and_verdicts() {
        let report = evaluator()
            .evaluate_resolution(&Resolution::Agreement {
                first: Allocation::new([1, 0, 0]),
                second: Allocation::new([0, 1, 1]),
            })
            .expect("agreement is concrete");

        assert_eq!((report.first_score, report.second_score), (10, 10));
        assert_eq!((report.first_switch_score, report.second_switch_score), (0, 0));
        assert!(report.pareto_optimal);
        assert!(report.envy_free);
        assert!(report.envy_free_and_pareto_optimal);
        assert_eq!(report.valuation_distance, 20);
    }

    #[test]
    fn items_left_on_the_table_are_neither_fair_nor_efficient() {
        let report = evaluator().evaluate(&Allocation::new([1, 0, 0]), &Allocation::new([0, 1, 0]));

        assert!(!report.envy_free);
        assert!(!report.pareto_optimal);
        assert!(!report.envy_free_and_pareto_optimal);
    }

    #[test]
    fn no_deal_and_symbolic_references_have_no_report() {
        let evaluator = evaluator();

        assert_eq!(
            evaluator.evaluate_resolution(&Resolution::NoDeal { reason: NoDealReason::RoundExhaustion }),
            None
        );
        assert_eq!(
            evaluator.evaluate_reference(&ReferenceOutcome::Symbolic { tokens: vec!["<disagree>".to_string()] }),
            None
        );
        assert!(evaluator.has_envy_free_solution());
    }
}
