//! Inference of the opponent's hidden valuation from rejected offers.
//!
//! Every hypothesis is a vector from the normalized cube (all integer triples
//! in `[0, 10]³` pricing the pool at exactly 10). After each exchange the
//! agent splits the hypotheses that remain plausible into two disjoint
//! explanations for why its own offer was turned down:
//!
//! - envy: the opponent would have envied our share under our offer, and
//!   does not envy it under their counter-offer;
//! - greed: our offer was already fair to the opponent, but the counter-offer
//!   simply gives the opponent more.
//!
//! Sets only narrow from one update to the next, including repeated opening
//! observations made before the agent has proposed. When narrowing leaves
//! nothing, the model rescans the full cube; when even that is empty, the
//! previous belief is kept and the update is reported as a collapse.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{Allocation, ItemCounts, Valuation};
use crate::scoring::{round_to_hundredths, score};

/// Candidate opponent valuations, split by rejection explanation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BeliefSet {
    envy: Vec<Valuation>,
    greed: Vec<Valuation>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BeliefProbabilities {
    pub envy: f64,
    pub greed: f64,
}

impl BeliefSet {
    pub fn new(envy: Vec<Valuation>, greed: Vec<Valuation>) -> Self {
        Self { envy, greed }
    }

    pub fn envy(&self) -> &[Valuation] {
        &self.envy
    }

    pub fn greed(&self) -> &[Valuation] {
        &self.greed
    }

    pub fn len(&self) -> usize {
        self.envy.len() + self.greed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envy.is_empty() && self.greed.is_empty()
    }

    /// Envy hypotheses first, then greed hypotheses.
    pub fn hypotheses(&self) -> impl Iterator<Item = &Valuation> + Clone + '_ {
        self.envy.iter().chain(self.greed.iter())
    }

    /// Share of hypotheses under each explanation, or `None` when the set is
    /// empty and there is no active belief.
    pub fn probabilities(&self) -> Option<BeliefProbabilities> {
        let total = self.len();
        if total == 0 {
            return None;
        }
        Some(BeliefProbabilities {
            envy: round_to_hundredths(self.envy.len() as f64 / total as f64),
            greed: round_to_hundredths(self.greed.len() as f64 / total as f64),
        })
    }

    pub fn is_subset_of(&self, other: &BeliefSet) -> bool {
        self.hypotheses().all(|valuation| other.hypotheses().any(|known| known == valuation))
    }
}

/// How a call to [`BeliefModel::update`] resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeliefUpdate {
    /// Only the opponent has proposed so far.
    Opening,
    /// First rejection: both sets derived from the full cube.
    Initialized,
    /// Sets restricted to the previous hypotheses.
    Narrowed,
    /// Narrowing left nothing; rederived from the full cube.
    Reset,
    /// Even the full cube admits nothing; the stale belief is kept.
    Collapsed,
    /// The counter-offer matches our own offer, so there is nothing to learn.
    Unchanged,
}

impl BeliefUpdate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Initialized => "initialized",
            Self::Narrowed => "narrowed",
            Self::Reset => "reset",
            Self::Collapsed => "collapsed",
            Self::Unchanged => "unchanged",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BeliefSnapshot {
    pub update: BeliefUpdate,
    pub beliefs: BeliefSet,
    pub probabilities: Option<BeliefProbabilities>,
}

/// One agent's private belief about its opponent. Never shared.
#[derive(Clone, Debug)]
pub struct BeliefModel {
    counts: ItemCounts,
    cube: Vec<Valuation>,
    current: Option<BeliefSet>,
    snapshots: Vec<BeliefSnapshot>,
}

impl BeliefModel {
    pub fn new(counts: ItemCounts) -> Self {
        Self { counts, cube: Valuation::normalized_cube(&counts), current: None, snapshots: Vec::new() }
    }

    pub fn current(&self) -> Option<&BeliefSet> {
        self.current.as_ref()
    }

    pub fn snapshots(&self) -> &[BeliefSnapshot] {
        &self.snapshots
    }

    /// Folds one exchange into the belief. `mine` is our latest offer, if we
    /// made one; `theirs` is the opponent's latest offer in our-share terms.
    pub fn update(&mut self, mine: Option<&Allocation>, theirs: &Allocation) -> BeliefUpdate {
        let outcome = match mine {
            None => self.observe_opening(theirs),
            Some(mine) if mine == theirs => BeliefUpdate::Unchanged,
            Some(mine) => self.explain_rejection(mine, theirs),
        };

        debug!(
            event_name = "negotiation.belief.updated",
            update = outcome.as_str(),
            hypotheses = self.current.as_ref().map_or(0, BeliefSet::len),
            "belief updated"
        );

        if let Some(current) = &self.current {
            self.snapshots.push(BeliefSnapshot {
                update: outcome,
                beliefs: current.clone(),
                probabilities: current.probabilities(),
            });
        }
        outcome
    }

    /// Before we propose, the opponent's offers only tell us which
    /// valuations leave them content with their own share. Later offers
    /// narrow the opening set like any other evidence.
    fn observe_opening(&mut self, theirs: &Allocation) -> BeliefUpdate {
        let Some(prior) = &self.current else {
            self.current = Some(self.opening(self.cube.iter(), theirs));
            return BeliefUpdate::Opening;
        };

        let narrowed = self.opening(prior.hypotheses(), theirs);
        if !narrowed.is_empty() {
            self.current = Some(narrowed);
            return BeliefUpdate::Narrowed;
        }

        let rederived = self.opening(self.cube.iter(), theirs);
        if !rederived.is_empty() {
            debug!(
                event_name = "negotiation.belief.reset",
                hypotheses = rederived.len(),
                "opening offers contradicted the prior belief, rescanned the cube"
            );
            self.current = Some(rederived);
            return BeliefUpdate::Reset;
        }

        warn!(
            event_name = "negotiation.belief.collapsed",
            theirs = %theirs,
            "no valuation is content with the opening offer, keeping the previous belief"
        );
        BeliefUpdate::Collapsed
    }

    fn opening<'v>(&self, universe: impl Iterator<Item = &'v Valuation>, theirs: &Allocation) -> BeliefSet {
        let envy = universe.filter(|valuation| self.opponent_is_content(valuation, theirs)).copied().collect();
        BeliefSet::new(envy, Vec::new())
    }

    fn explain_rejection(&mut self, mine: &Allocation, theirs: &Allocation) -> BeliefUpdate {
        let Some(prior) = &self.current else {
            let derived = self.classify(self.cube.iter(), mine, theirs);
            if derived.is_empty() {
                warn!(
                    event_name = "negotiation.belief.collapsed",
                    mine = %mine,
                    theirs = %theirs,
                    "no valuation explains the first rejection"
                );
                self.current = Some(derived);
                return BeliefUpdate::Collapsed;
            }
            self.current = Some(derived);
            return BeliefUpdate::Initialized;
        };

        let narrowed = self.classify(prior.hypotheses(), mine, theirs);
        if !narrowed.is_empty() {
            self.current = Some(narrowed);
            return BeliefUpdate::Narrowed;
        }

        let rederived = self.classify(self.cube.iter(), mine, theirs);
        if !rederived.is_empty() {
            debug!(
                event_name = "negotiation.belief.reset",
                hypotheses = rederived.len(),
                "narrowing contradicted the prior belief, rescanned the cube"
            );
            self.current = Some(rederived);
            return BeliefUpdate::Reset;
        }

        warn!(
            event_name = "negotiation.belief.collapsed",
            mine = %mine,
            theirs = %theirs,
            "no valuation explains the rejection, keeping the previous belief"
        );
        BeliefUpdate::Collapsed
    }

    fn classify<'v>(
        &self,
        universe: impl Iterator<Item = &'v Valuation>,
        mine: &Allocation,
        theirs: &Allocation,
    ) -> BeliefSet {
        let mut beliefs = BeliefSet::default();
        let (Some(left_by_mine), Some(left_by_theirs)) =
            (mine.complement(&self.counts), theirs.complement(&self.counts))
        else {
            return beliefs;
        };

        for valuation in universe {
            let keeps_under_mine = score(valuation, &left_by_mine);
            let keeps_under_theirs = score(valuation, &left_by_theirs);
            let envied_mine = keeps_under_mine < score(valuation, mine);
            let content_with_theirs = keeps_under_theirs >= score(valuation, theirs);

            if envied_mine && content_with_theirs {
                beliefs.envy.push(*valuation);
            } else if !envied_mine && keeps_under_theirs > keeps_under_mine {
                beliefs.greed.push(*valuation);
            }
        }
        beliefs
    }

    /// The opponent, holding `valuation`, does not envy us our `share`.
    fn opponent_is_content(&self, valuation: &Valuation, share: &Allocation) -> bool {
        share
            .complement(&self.counts)
            .is_some_and(|left| score(valuation, &left) >= score(valuation, share))
    }
}

#[cfg(test)]
mod tests {
    use super::{BeliefModel, BeliefSet, BeliefUpdate};
    use crate::domain::{Allocation, ItemCounts, Valuation};

    fn unit_pool() -> ItemCounts {
        ItemCounts::new([1, 1, 1])
    }

    #[test]
    fn opening_keeps_valuations_content_with_the_counter_offer() {
        let mut model = BeliefModel::new(unit_pool());
        let update = model.update(None, &Allocation::new([1, 0, 1]));

        assert_eq!(update, BeliefUpdate::Opening);
        let beliefs = model.current().expect("opening installs a belief");
        assert!(beliefs.greed().is_empty());
        assert!(beliefs.envy().iter().all(|v| {
            let [book, hat, ball] = v.values();
            hat >= book + ball
        }));
        assert_eq!(beliefs.probabilities().map(|p| (p.envy, p.greed)), Some((1.0, 0.0)));
    }

    #[test]
    fn repeated_opening_offers_narrow_the_belief() {
        let mut model = BeliefModel::new(unit_pool());
        model.update(None, &Allocation::new([1, 0, 0]));
        let first = model.current().cloned().expect("opening belief");

        let update = model.update(None, &Allocation::new([0, 1, 1]));

        assert_eq!(update, BeliefUpdate::Narrowed);
        let second = model.current().expect("narrowed belief");
        assert!(second.is_subset_of(&first));
        assert!(second.len() < first.len());
    }

    #[test]
    fn contradictory_opening_offers_reset_to_the_full_cube() {
        let mut model = BeliefModel::new(ItemCounts::new([2, 1, 1]));
        // Content to keep the hat and ball: each book is worth at most 2.
        model.update(None, &Allocation::new([2, 0, 0]));
        // Content to keep both books: each book is worth at least 3.
        let update = model.update(None, &Allocation::new([0, 1, 1]));

        assert_eq!(update, BeliefUpdate::Reset);
        let beliefs = model.current().expect("reset belief");
        assert!(!beliefs.is_empty());
        assert!(beliefs.envy().iter().all(|v| v.values()[0] >= 3));
    }

    #[test]
    fn contradiction_resets_to_the_full_cube() {
        let mut model = BeliefModel::new(unit_pool());
        model.update(None, &Allocation::new([1, 0, 1]));

        // The prior says hats dominate, yet the opponent turned down a
        // hat-and-ball share and asks us to take the hat instead.
        let update = model.update(Some(&Allocation::new([1, 0, 0])), &Allocation::new([0, 1, 0]));

        assert_eq!(update, BeliefUpdate::Reset);
        let beliefs = model.current().expect("reset installs a belief");
        assert!(!beliefs.envy().is_empty());
        assert!(!beliefs.greed().is_empty());
        assert!(beliefs.envy().iter().all(|v| {
            let [book, hat, ball] = v.values();
            book > hat + ball
        }));
        assert!(beliefs.greed().iter().all(|v| {
            let [book, hat, ball] = v.values();
            hat + ball >= book && book > hat
        }));
    }

    #[test]
    fn narrowing_only_shrinks_the_hypotheses() {
        let mut model = BeliefModel::new(unit_pool());
        model.update(None, &Allocation::new([0, 1, 1]));
        let prior = model.current().cloned().expect("opening belief");

        let update = model.update(Some(&Allocation::new([1, 0, 0])), &Allocation::new([0, 1, 0]));

        assert_eq!(update, BeliefUpdate::Narrowed);
        let narrowed = model.current().expect("narrowed belief");
        assert!(narrowed.is_subset_of(&prior));
        assert!(narrowed.len() < prior.len());
    }

    #[test]
    fn repeating_the_same_evidence_changes_nothing() {
        let mut model = BeliefModel::new(unit_pool());
        let mine = Allocation::new([1, 1, 0]);
        let theirs = Allocation::new([0, 1, 0]);

        assert_eq!(model.update(Some(&mine), &theirs), BeliefUpdate::Initialized);
        let first = model.current().cloned();
        assert_eq!(model.update(Some(&mine), &theirs), BeliefUpdate::Narrowed);

        assert_eq!(model.current().cloned(), first);
    }

    #[test]
    fn matching_offers_skip_the_update() {
        let mut model = BeliefModel::new(unit_pool());
        model.update(None, &Allocation::new([1, 0, 0]));
        let before = model.current().cloned();

        let offer = Allocation::new([0, 1, 1]);
        assert_eq!(model.update(Some(&offer), &offer), BeliefUpdate::Unchanged);
        assert_eq!(model.current().cloned(), before);
        assert_eq!(model.snapshots().len(), 2);
    }

    #[test]
    fn collapse_keeps_the_stale_belief() {
        let mut model = BeliefModel::new(unit_pool());
        model.update(None, &Allocation::new([1, 0, 0]));
        let stale = model.current().cloned();

        // Asking for nothing can never be envied, and nothing beats the full pool.
        let update = model.update(Some(&Allocation::new([0, 0, 0])), &Allocation::new([1, 0, 0]));

        assert_eq!(update, BeliefUpdate::Collapsed);
        assert_eq!(model.current().cloned(), stale);
    }

    #[test]
    fn collapse_without_prior_leaves_no_active_belief() {
        let mut model = BeliefModel::new(unit_pool());
        let update = model.update(Some(&Allocation::new([0, 0, 0])), &Allocation::new([0, 1, 0]));

        assert_eq!(update, BeliefUpdate::Collapsed);
        assert_eq!(model.current().and_then(BeliefSet::probabilities), None);
    }

    #[test]
    fn hypothesis_sets_are_disjoint() {
        let counts = ItemCounts::new([1, 4, 1]);
        let mut model = BeliefModel::new(counts);
        model.update(Some(&Allocation::new([1, 2, 0])), &Allocation::new([0, 2, 1]));

        let beliefs = model.current().expect("initialized belief");
        assert!(beliefs.envy().iter().all(|v: &Valuation| !beliefs.greed().contains(v)));
    }
}
