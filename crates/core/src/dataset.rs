//! Aggregate fairness statistics and difficulty filtering over record files.

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::{Category, NegotiationRecord};
use crate::fairness::{have_envy_free_solution, pareto_optimal_envy_free_partitions};
use crate::outcome::OutcomeEvaluator;
use crate::partition::PartitionSpace;
use crate::scoring::round_to_hundredths;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub records: usize,
    pub concrete_references: usize,
    /// Shares of all records whose human outcome has the property.
    pub pareto_optimal_rate: f64,
    pub envy_free_rate: f64,
    pub envy_free_and_pareto_optimal_rate: f64,
    pub envy_free_solution_rate: f64,
    /// Mean count of fair and efficient splits among records that have any.
    pub mean_pareto_envy_free_partitions: Option<f64>,
    /// Fraction of efficient splits across the dataset that are also fair.
    pub envy_free_share_of_pareto_partitions: Option<f64>,
}

impl DatasetSummary {
    pub fn from_records(records: &[NegotiationRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut summary = Self { records: records.len(), ..Self::default() };
        let (mut pareto, mut envy_free, mut both, mut solvable) = (0usize, 0usize, 0usize, 0usize);
        let (mut fair_efficient_total, mut with_fair_efficient) = (0usize, 0usize);
        let (mut efficient_splits, mut fair_efficient_splits) = (0usize, 0usize);

        for record in records {
            let evaluator = OutcomeEvaluator::for_record(record);
            if let Some(report) = evaluator.evaluate_reference(&record.reference) {
                summary.concrete_references += 1;
                pareto += usize::from(report.pareto_optimal);
                envy_free += usize::from(report.envy_free);
                both += usize::from(report.envy_free_and_pareto_optimal);
            }

            if have_envy_free_solution(&record.counts, &record.first_valuation, &record.second_valuation) {
                solvable += 1;
            }

            let fair_efficient = pareto_optimal_envy_free_partitions(
                &record.counts,
                &record.first_valuation,
                &record.second_valuation,
            )
            .len();
            if fair_efficient > 0 {
                fair_efficient_total += fair_efficient;
                with_fair_efficient += 1;
            }

            for partition in PartitionSpace::new(record.counts).partitions() {
                let report = evaluator.evaluate(&partition.first, &partition.second);
                if report.pareto_optimal {
                    efficient_splits += 1;
                    fair_efficient_splits += usize::from(report.envy_free);
                }
            }
        }

        let rate = |count: usize| round_to_hundredths(count as f64 / records.len() as f64);
        summary.pareto_optimal_rate = rate(pareto);
        summary.envy_free_rate = rate(envy_free);
        summary.envy_free_and_pareto_optimal_rate = rate(both);
        summary.envy_free_solution_rate = rate(solvable);
        summary.mean_pareto_envy_free_partitions = (with_fair_efficient > 0)
            .then(|| round_to_hundredths(fair_efficient_total as f64 / with_fair_efficient as f64));
        summary.envy_free_share_of_pareto_partitions = (efficient_splits > 0)
            .then(|| round_to_hundredths(fair_efficient_splits as f64 / efficient_splits as f64));
        summary
    }
}

/// Keeps the records that make for a hard negotiation: distinct settings,
/// not trivially halvable, no shared favourite that the rest of the pool
/// can compensate for, and valuations at most `max_distance` apart.
pub fn select_by_difficulty(records: &[NegotiationRecord], max_distance: u32) -> Vec<NegotiationRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| seen.insert(record.setting_key()))
        .filter(|record| !record.counts.is_all_even())
        .filter(|record| !shared_favourite_is_covered(record))
        .filter(|record| record.valuation_distance() <= max_distance)
        .cloned()
        .collect()
}

/// Both sides prize the same category most, and for each side the rest of
/// the pool is worth at least one unit of that category.
fn shared_favourite_is_covered(record: &NegotiationRecord) -> bool {
    let favourite = record.first_valuation.top_category();
    if record.second_valuation.top_category() != favourite {
        return false;
    }

    [&record.first_valuation, &record.second_valuation].iter().all(|valuation| {
        let rest: u32 = Category::ALL
            .iter()
            .filter(|category| **category != favourite)
            .map(|category| record.counts.get(*category) * valuation.get(*category))
            .sum();
        rest >= valuation.get(favourite)
    })
}

#[cfg(test)]
mod tests {
    use super::{select_by_difficulty, DatasetSummary};
    use crate::domain::{parse_records, NegotiationRecord};

    const HUMAN_FAIR: &str = "<input> 1 4 4 1 1 2 </input> <output> item0=1 item1=0 item2=1 item0=0 item1=4 item2=0 </output> <partner_input> 1 0 4 2 1 2 </partner_input>";
    const DISAGREED: &str = "<input> 1 10 3 0 1 0 </input> <output> <disagree> <disagree> <disagree> <disagree> <disagree> <disagree> </output> <partner_input> 1 1 3 3 1 0 </partner_input>";
    const EVEN_POOL: &str = "<input> 2 1 2 2 2 2 </input> <output> item0=1 item1=1 item2=1 item0=1 item1=1 item2=1 </output> <partner_input> 2 3 2 1 2 1 </partner_input>";
    const SHARED_FAVOURITE: &str = "<input> 1 4 2 2 2 1 </input> <output> item0=1 item1=0 item2=0 item0=0 item1=2 item2=2 </output> <partner_input> 1 4 2 1 2 2 </partner_input>";

    fn record(line: &str) -> NegotiationRecord {
        NegotiationRecord::parse(line).expect("valid test record")
    }

    #[test]
    fn summary_counts_human_outcomes_over_all_records() {
        let records = parse_records(&format!("{HUMAN_FAIR}\n{DISAGREED}\n")).expect("valid records");
        let summary = DatasetSummary::from_records(&records);

        assert_eq!(summary.records, 2);
        assert_eq!(summary.concrete_references, 1);
        assert_eq!(summary.envy_free_rate, 0.5);
        assert_eq!(summary.pareto_optimal_rate, 0.5);
        assert_eq!(summary.envy_free_and_pareto_optimal_rate, 0.5);
        assert!(summary.mean_pareto_envy_free_partitions.is_some());
    }

    #[test]
    fn empty_dataset_has_an_empty_summary() {
        assert_eq!(DatasetSummary::from_records(&[]), DatasetSummary::default());
    }

    #[test]
    fn selection_drops_duplicates_even_pools_and_covered_favourites() {
        let records = vec![
            record(HUMAN_FAIR),
            record(HUMAN_FAIR),
            record(EVEN_POOL),
            record(SHARED_FAVOURITE),
            record(DISAGREED),
        ];

        let selected = select_by_difficulty(&records, 20);

        assert_eq!(selected, vec![record(HUMAN_FAIR), record(DISAGREED)]);
    }

    #[test]
    fn selection_respects_the_distance_bound() {
        let records = vec![record(HUMAN_FAIR), record(DISAGREED)];

        // 4,1,2 vs 0,2,2 is 5 apart; 10,0,0 vs 1,3,0 is 12 apart.
        assert_eq!(select_by_difficulty(&records, 5), vec![record(HUMAN_FAIR)]);
    }
}
