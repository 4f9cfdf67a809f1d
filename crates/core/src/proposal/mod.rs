//! Candidate counter-offers ranked against the current belief.

use std::cmp::Ordering;

use serde::Serialize;

use crate::belief::BeliefSet;
use crate::domain::{Allocation, ProposalHistory, Seat, Valuation};
use crate::partition::PartitionSpace;
use crate::scoring::{round_to_hundredths, score};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RankedProposal {
    pub allocation: Allocation,
    pub acceptance_probability: f64,
    pub own_score: u32,
}

/// Proposal search for one agent, borrowing that agent's private state.
#[derive(Clone, Copy, Debug)]
pub struct ProposalPolicy<'a> {
    seat: Seat,
    space: &'a PartitionSpace,
    valuation: &'a Valuation,
    history: &'a ProposalHistory,
    deterioration_rate: f64,
}

impl<'a> ProposalPolicy<'a> {
    pub fn new(
        seat: Seat,
        space: &'a PartitionSpace,
        valuation: &'a Valuation,
        history: &'a ProposalHistory,
        deterioration_rate: f64,
    ) -> Self {
        Self { seat, space, valuation, history, deterioration_rate }
    }

    /// How often the candidate was already offered and turned down. A
    /// candidate that matches the opponent's latest offer counts as fresh.
    pub fn rejection_count(&self, candidate: &Allocation) -> usize {
        if self.history.last_observed() == Some(candidate) {
            return 0;
        }
        self.history.times_proposed(candidate)
    }

    /// Share of `hypotheses` under which the opponent would not envy us the
    /// candidate. Zero over an empty set.
    pub fn envy_free_probability<'v>(
        &self,
        hypotheses: impl IntoIterator<Item = &'v Valuation>,
        candidate: &Allocation,
    ) -> f64 {
        let Some(left) = candidate.complement(self.space.counts()) else {
            return 0.0;
        };
        let (content, total) = hypotheses.into_iter().fold((0usize, 0usize), |(content, total), v| {
            (content + usize::from(score(v, &left) >= score(v, candidate)), total + 1)
        });
        if total == 0 {
            return 0.0;
        }
        round_to_hundredths(content as f64 / total as f64)
    }

    /// Envy-free probability over every hypothesis, decayed geometrically by
    /// the number of earlier rejections of the same candidate.
    pub fn acceptance_probability(&self, beliefs: &BeliefSet, candidate: &Allocation) -> f64 {
        let envy_free = self.envy_free_probability(beliefs.hypotheses(), candidate);
        let rejections = i32::try_from(self.rejection_count(candidate)).unwrap_or(i32::MAX);
        round_to_hundredths(envy_free * (1.0 - self.deterioration_rate).powi(rejections))
    }

    /// Mean value the opponent would place on its share, rounded to two
    /// decimals. `None` over an empty set.
    pub fn expected_opponent_value(&self, hypotheses: &[Valuation], candidate: &Allocation) -> Option<f64> {
        let left = candidate.complement(self.space.counts())?;
        if hypotheses.is_empty() {
            return None;
        }
        let total: u32 = hypotheses.iter().map(|valuation| score(valuation, &left)).sum();
        Some(round_to_hundredths(f64::from(total) / hypotheses.len() as f64))
    }

    /// We value our own share at least as much as what we leave behind.
    pub fn is_self_envy_free(&self, candidate: &Allocation) -> bool {
        candidate
            .complement(self.space.counts())
            .is_some_and(|left| score(self.valuation, candidate) >= score(self.valuation, &left))
    }

    /// Shares this seat could claim, in this seat's enumeration order.
    pub fn candidates(&self) -> impl Iterator<Item = Allocation> + 'a {
        self.space.shares_for(self.seat)
    }

    /// Offers that raise our own score, stay fair to us and stand any chance
    /// of acceptance. Ties on probability prefer the higher own score.
    pub fn self_interest_maximization(&self, beliefs: &BeliefSet, current: &Allocation) -> Vec<RankedProposal> {
        let floor = score(self.valuation, current);
        let mut ranked = self
            .candidates()
            .filter(|candidate| score(self.valuation, candidate) > floor)
            .filter(|candidate| self.is_self_envy_free(candidate))
            .map(|candidate| self.rank(beliefs, candidate))
            .filter(|proposal| proposal.acceptance_probability > 0.0)
            .collect::<Vec<_>>();

        ranked.sort_by(|left, right| {
            by_probability(left, right).then_with(|| right.own_score.cmp(&left.own_score))
        });
        ranked
    }

    /// Alternatives fair to us that the opponent more likely than not accepts.
    pub fn envy_freeness_maximization(&self, beliefs: &BeliefSet, current: &Allocation) -> Vec<RankedProposal> {
        let mut ranked = self
            .candidates()
            .filter(|candidate| candidate != current)
            .filter(|candidate| self.is_self_envy_free(candidate))
            .map(|candidate| self.rank(beliefs, candidate))
            .filter(|proposal| proposal.acceptance_probability > 0.5)
            .collect::<Vec<_>>();

        ranked.sort_by(by_probability);
        ranked
    }

    fn rank(&self, beliefs: &BeliefSet, candidate: Allocation) -> RankedProposal {
        RankedProposal {
            allocation: candidate,
            acceptance_probability: self.acceptance_probability(beliefs, &candidate),
            own_score: score(self.valuation, &candidate),
        }
    }
}

fn by_probability(left: &RankedProposal, right: &RankedProposal) -> Ordering {
    right.acceptance_probability.total_cmp(&left.acceptance_probability)
}
