//! Pareto-optimality and envy-freeness predicates over the partition space.

use crate::domain::{Allocation, ItemCounts, Valuation};
use crate::partition::{Partition, PartitionSpace};
use crate::scoring::score;

/// True iff no split of the pool leaves both parties at least as well off
/// and one of them strictly better off.
pub fn is_pareto_optimal(
    alloc_a: &Allocation,
    val_a: &Valuation,
    alloc_b: &Allocation,
    val_b: &Valuation,
    counts: &ItemCounts,
) -> bool {
    let score_a = score(val_a, alloc_a);
    let score_b = score(val_b, alloc_b);

    !PartitionSpace::new(*counts).partitions().iter().any(|partition| {
        let alternative_a = score(val_a, &partition.first);
        let alternative_b = score(val_b, &partition.second);
        (alternative_a > score_a && alternative_b >= score_b)
            || (alternative_a >= score_a && alternative_b > score_b)
    })
}

/// True iff a party with `valuation` values `other` strictly above `own`.
pub fn envies(valuation: &Valuation, own: &Allocation, other: &Allocation) -> bool {
    score(valuation, own) < score(valuation, other)
}

/// Each party values its own share at least as much as the other's.
pub fn is_envy_free(
    alloc_a: &Allocation,
    alloc_b: &Allocation,
    val_a: &Valuation,
    val_b: &Valuation,
) -> bool {
    !envies(val_a, alloc_a, alloc_b) && !envies(val_b, alloc_b, alloc_a)
}

/// Envy-free and an exact split of the pool. Outcome verdicts use this form:
/// shares that leave items on the table never count as envy-free.
pub fn is_envy_free_partition(
    alloc_a: &Allocation,
    alloc_b: &Allocation,
    val_a: &Valuation,
    val_b: &Valuation,
    counts: &ItemCounts,
) -> bool {
    alloc_a.partitions_with(alloc_b, counts) && is_envy_free(alloc_a, alloc_b, val_a, val_b)
}

pub fn envy_free_partitions(
    counts: &ItemCounts,
    val_a: &Valuation,
    val_b: &Valuation,
) -> Vec<Partition> {
    PartitionSpace::new(*counts)
        .partitions()
        .iter()
        .filter(|partition| is_envy_free(&partition.first, &partition.second, val_a, val_b))
        .copied()
        .collect()
}

pub fn pareto_optimal_envy_free_partitions(
    counts: &ItemCounts,
    val_a: &Valuation,
    val_b: &Valuation,
) -> Vec<Partition> {
    envy_free_partitions(counts, val_a, val_b)
        .into_iter()
        .filter(|partition| {
            is_pareto_optimal(&partition.first, val_a, &partition.second, val_b, counts)
        })
        .collect()
}

pub fn have_envy_free_solution(counts: &ItemCounts, val_a: &Valuation, val_b: &Valuation) -> bool {
    PartitionSpace::new(*counts)
        .partitions()
        .iter()
        .any(|partition| is_envy_free(&partition.first, &partition.second, val_a, val_b))
}
