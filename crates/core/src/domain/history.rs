use serde::{Deserialize, Serialize};

use crate::domain::items::Allocation;

/// Which side of the table an agent sits on. The first seat opens every round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seat {
    First,
    Second,
}

impl Seat {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::First => "Alice",
            Self::Second => "Bob",
        }
    }

    pub fn opponent(self) -> Seat {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

/// One agent's record of offers, always expressed as that agent's own share.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProposalHistory {
    own: Vec<Allocation>,
    observed: Vec<Allocation>,
}

impl ProposalHistory {
    pub fn own(&self) -> &[Allocation] {
        &self.own
    }

    pub fn observed(&self) -> &[Allocation] {
        &self.observed
    }

    pub fn last_own(&self) -> Option<&Allocation> {
        self.own.last()
    }

    pub fn last_observed(&self) -> Option<&Allocation> {
        self.observed.last()
    }

    pub fn record_own(&mut self, allocation: Allocation) {
        self.own.push(allocation);
    }

    /// Replaces the opponent's offers with a freshly translated copy.
    pub fn replace_observed(&mut self, observed: Vec<Allocation>) {
        self.observed = observed;
    }

    pub fn times_proposed(&self, allocation: &Allocation) -> usize {
        self.own.iter().filter(|own| *own == allocation).count()
    }

    /// Both sides' latest offers coincide, and so did the ones before them.
    pub fn agreement_confirmed_twice(&self) -> bool {
        let (own, observed) = (&self.own, &self.observed);
        if own.len() < 2 || observed.len() < 2 {
            return false;
        }
        own[own.len() - 1] == observed[observed.len() - 1]
            && own[own.len() - 2] == observed[observed.len() - 2]
    }
}

#[cfg(test)]
mod tests {
    use super::{ProposalHistory, Seat};
    use crate::domain::items::Allocation;

    #[test]
    fn agreement_needs_two_matching_rounds() {
        let mut history = ProposalHistory::default();
        history.record_own(Allocation::new([1, 0, 0]));
        history.replace_observed(vec![Allocation::new([1, 0, 0])]);
        assert!(!history.agreement_confirmed_twice());

        history.record_own(Allocation::new([1, 0, 0]));
        history.replace_observed(vec![Allocation::new([1, 0, 0]), Allocation::new([1, 0, 0])]);
        assert!(history.agreement_confirmed_twice());
    }

    #[test]
    fn times_proposed_counts_repeats() {
        let mut history = ProposalHistory::default();
        history.record_own(Allocation::new([1, 1, 0]));
        history.record_own(Allocation::new([0, 1, 0]));
        history.record_own(Allocation::new([1, 1, 0]));

        assert_eq!(history.times_proposed(&Allocation::new([1, 1, 0])), 2);
        assert_eq!(history.times_proposed(&Allocation::new([0, 0, 0])), 0);
        assert_eq!(Seat::First.opponent(), Seat::Second);
    }
}
