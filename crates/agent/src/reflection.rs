//! Renders the core's belief analysis as text the model can act on.
//!
//! Nothing here decides anything: probabilities, expected values and the
//! ranked alternatives all come from [`divvy_core::ProposalPolicy`].

use divvy_core::proposal::RankedProposal;
use divvy_core::scoring::round_to_hundredths;
use divvy_core::session::TurnGuidance;
use divvy_core::{score, Allocation, TurnContext, Valuation};

use crate::prompts::describe_split;

/// Why the opponent turned down our last offer, as currently believed.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Explanations {
    Both { envy: f64, greed: f64 },
    EnvyOnly,
    GreedOnly,
}

impl Explanations {
    fn of(guidance: &TurnGuidance<'_>) -> Self {
        let (envy, greed) = (guidance.probabilities.envy, guidance.probabilities.greed);
        match (envy > 0.0, greed > 0.0) {
            (true, true) => Self::Both { envy, greed },
            (true, false) => Self::EnvyOnly,
            _ => Self::GreedOnly,
        }
    }
}

/// Recap of the last exchange followed by the rejection analysis. Prepended
/// to the negotiation prompt of a guided turn.
pub fn analysis_preamble(context: &TurnContext<'_>, guidance: &TurnGuidance<'_>) -> String {
    let opponent = context.opponent;
    let mut text = String::from("### Last Round of Negotiation\n\n");
    text.push_str(&last_round_summary(context));
    text.push_str("\n\n### Analysis of the Last Round\n\n");

    match Explanations::of(guidance) {
        Explanations::Both { envy, greed } => {
            text.push_str(&format!(
                "{opponent} rejected your proposal for one of two reasons:\n\
                 (1) with probability {envy}, the proposal was not envy free for {opponent}: {opponent} would \
                 envy the items you get;\n\
                 (2) with probability {greed}, the proposal was envy free but {opponent} was greedy: {opponent} \
                 would not envy you but expects a better reward from a different split.\n"
            ));
        }
        Explanations::EnvyOnly => {
            text.push_str(&format!(
                "{opponent} rejected your proposal because {opponent} envied the items you get.\n"
            ));
        }
        Explanations::GreedOnly => {
            text.push_str(&format!("{opponent} rejected your proposal because {opponent} was greedy.\n"));
        }
    }
    text
}

/// Feedback on one drafted proposal.
pub fn reflect(context: &TurnContext<'_>, guidance: &TurnGuidance<'_>, proposed: &Allocation) -> String {
    let opponent = context.opponent;
    let policy = &guidance.policy;
    let beliefs = guidance.beliefs;
    let explanations = Explanations::of(guidance);
    let mut text = String::from("# Will This Deal be Unfair?\n\n");

    text.push_str(&format!(
        "By your own values, you get {} if this proposal is accepted.\n\n",
        score(context.valuation, proposed)
    ));

    let expected = |hypotheses: &[Valuation]| {
        policy.expected_opponent_value(hypotheses, proposed).unwrap_or_default()
    };
    match explanations {
        Explanations::Both { .. } => {
            text.push_str(&format!(
                "From the last rejection you inferred two possibilities:\n\
                 Possibility 1: {opponent} rejected out of envy. Then {opponent} expects a value of {} from this proposal.\n\
                 Possibility 2: {opponent} rejected out of greed. Then {opponent} expects a value of {} from this proposal.\n",
                expected(beliefs.envy()),
                expected(beliefs.greed()),
            ));
        }
        Explanations::EnvyOnly => {
            text.push_str(&format!(
                "You inferred that {opponent} rejected out of envy. {opponent} expects a value of {} from this proposal.\n",
                expected(beliefs.envy()),
            ));
        }
        Explanations::GreedOnly => {
            text.push_str(&format!(
                "You inferred that {opponent} rejected out of greed. {opponent} expects a value of {} from this proposal.\n",
                expected(beliefs.greed()),
            ));
        }
    }

    if policy.is_self_envy_free(proposed) {
        text.push_str(&format!(
            "\nYou would not envy what {opponent} gets: by your own values your share is worth at least as much. \
             This is a good deal for you."
        ));
    } else {
        text.push_str(&format!(
            "\nYou would envy what {opponent} gets: by your own values your share is worth less.\n\
             This is NOT A GOOD DEAL for you. MAXIMIZE your own reward and consider a better proposal. \
             If {opponent} refuses a better deal, you can THREATEN to halt the negotiation."
        ));
    }

    let envy_odds = |hypotheses: &[Valuation]| {
        round_to_hundredths(1.0 - policy.envy_free_probability(hypotheses, proposed))
    };
    if !beliefs.envy().is_empty() {
        text.push_str(&format!(
            "\nUnder the envy explanation, {opponent} envies your share with probability {}.",
            envy_odds(beliefs.envy())
        ));
    }
    if !beliefs.greed().is_empty() {
        text.push_str(&format!(
            "\nUnder the greed explanation, {opponent} envies your share with probability {}.",
            envy_odds(beliefs.greed())
        ));
    }

    let fairer = policy.envy_freeness_maximization(beliefs, proposed);
    if !fairer.is_empty() {
        text.push_str(&format!(
            "\n\n# Fairer Options to Consider\n\n\
             To avoid a rejection out of envy, consider these splits, which both sides are more likely to accept:"
        ));
        for (index, option) in fairer.iter().enumerate() {
            text.push_str(&describe_option(context, guidance, index, option));
            if option.acceptance_probability > 0.6 && policy.rejection_count(&option.allocation) == 0 {
                text.push_str(", and the probability is relatively high.");
            }
        }
    }

    text.push_str("\n\n# More Self-Interested Options to Consider");
    let greedier = policy.self_interest_maximization(beliefs, proposed);
    if greedier.is_empty() {
        text.push_str(
            "\n\nWith what you know, no other split raises your reward while keeping the deal possible.",
        );
    } else {
        text.push_str(&format!("\nThese splits could raise your reward if {opponent} accepts:"));
        for (index, option) in greedier.iter().enumerate() {
            text.push_str(&describe_option(context, guidance, index, option));
            if policy.rejection_count(&option.allocation) == 0 {
                text.push_str(probability_qualifier(option.acceptance_probability));
            }
        }
    }
    text
}

fn describe_option(
    context: &TurnContext<'_>,
    guidance: &TurnGuidance<'_>,
    index: usize,
    option: &RankedProposal,
) -> String {
    let opponent = context.opponent;
    let mut line = format!(
        "\nOption {}: {}. Your reward is {} and the chance that {opponent} accepts is {}",
        index + 1,
        describe_split(context, &option.allocation),
        option.own_score,
        option.acceptance_probability,
    );
    let rejections = guidance.policy.rejection_count(&option.allocation);
    if rejections > 0 {
        line.push_str(&format!(
            ". {opponent} has REJECTED this proposal {rejections} time(s) already, so do not propose it again."
        ));
    }
    line
}

fn probability_qualifier(probability: f64) -> &'static str {
    if probability <= 0.4 {
        ", but the probability is relatively low."
    } else if probability >= 0.6 {
        ", and the probability is relatively high."
    } else {
        ", and the probability is moderate."
    }
}

/// What we offered last and how the opponent answered.
fn last_round_summary(context: &TurnContext<'_>) -> String {
    let opponent = context.opponent;
    let Some(mine) = context.history.last_own() else {
        return "You have not made a proposal yet.".to_string();
    };
    let mut text = format!("In the last round you proposed: {}.\n\n", describe_split(context, mine));

    match context.history.last_observed() {
        Some(theirs) if theirs == mine => {
            text.push_str(&format!("{opponent} agreed and you have reached an agreement."));
        }
        Some(theirs) => {
            text.push_str(&format!(
                "{opponent} rejected the proposal and proposed a different split: {}.",
                describe_split(context, theirs)
            ));
        }
        None => {
            text.push_str(&format!("{opponent} has not answered with a proposal of its own."));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use divvy_core::belief::BeliefSet;
    use divvy_core::domain::{ProposalHistory, Seat};
    use divvy_core::partition::PartitionSpace;
    use divvy_core::proposal::ProposalPolicy;
    use divvy_core::session::TurnGuidance;
    use divvy_core::{Allocation, ItemCounts, TurnContext, Valuation};

    use super::{analysis_preamble, probability_qualifier, reflect};

    struct Fixture {
        counts: ItemCounts,
        valuation: Valuation,
        space: PartitionSpace,
        history: ProposalHistory,
        beliefs: BeliefSet,
    }

    impl Fixture {
        fn new(own_offer: [u32; 3], beliefs: BeliefSet) -> Self {
            let counts = ItemCounts::new([1, 1, 1]);
            let mut history = ProposalHistory::default();
            history.record_own(Allocation::new(own_offer));
            history.replace_observed(vec![Allocation::new([0, 1, 1])]);
            Self {
                counts,
                valuation: Valuation::new([4, 3, 3], &counts).expect("valid valuation"),
                space: PartitionSpace::new(counts),
                history,
                beliefs,
            }
        }

        fn with<R>(&self, run: impl FnOnce(&TurnContext<'_>, &TurnGuidance<'_>) -> R) -> R {
            let guidance = TurnGuidance {
                beliefs: &self.beliefs,
                probabilities: self.beliefs.probabilities().expect("active belief"),
                policy: ProposalPolicy::new(Seat::First, &self.space, &self.valuation, &self.history, 0.0),
            };
            let context = TurnContext {
                name: "Alice",
                opponent: "Bob",
                seat: Seat::First,
                counts: &self.counts,
                valuation: &self.valuation,
                round: 2,
                max_rounds: 20,
                transcript: &[],
                history: &self.history,
                guidance: Some(guidance),
            };
            run(&context, &guidance)
        }
    }

    fn valuation(values: [u32; 3]) -> Valuation {
        Valuation::new(values, &ItemCounts::new([1, 1, 1])).expect("valid valuation")
    }

    #[test]
    fn preamble_recaps_the_counter_offer_and_both_explanations() {
        let fixture = Fixture::new([1, 1, 1], BeliefSet::new(vec![valuation([0, 5, 5])], vec![valuation([10, 0, 0])]));

        let text = fixture.with(analysis_preamble);

        assert!(text.contains(
            "In the last round you proposed: you take 1 book, 1 hat and 1 ball; Bob takes 0 books, 0 hats and 0 balls."
        ));
        assert!(text.contains("proposed a different split: you take 0 books, 1 hat and 1 ball"));
        assert!(text.contains("with probability 0.5, the proposal was not envy free"));
    }

    #[test]
    fn envy_only_belief_skips_the_greed_branch() {
        let fixture = Fixture::new([1, 1, 1], BeliefSet::new(vec![valuation([0, 5, 5])], Vec::new()));

        let preamble = fixture.with(analysis_preamble);
        let text = fixture.with(|context, guidance| reflect(context, guidance, &Allocation::new([1, 0, 0])));

        assert!(preamble.contains("because Bob envied the items you get"));
        assert!(text.contains("Bob expects a value of 10 from this proposal."));
        assert!(text.contains("Under the envy explanation, Bob envies your share with probability 0."));
        assert!(!text.contains("greed explanation"));
    }

    #[test]
    fn unfair_self_share_is_flagged_and_alternatives_listed() {
        let fixture = Fixture::new([1, 1, 1], BeliefSet::new(vec![valuation([0, 5, 5])], Vec::new()));

        // Own values 4,3,3: the hat alone is worth 3 against 7 left behind.
        let text = fixture.with(|context, guidance| reflect(context, guidance, &Allocation::new([0, 1, 0])));

        assert!(text.contains("This is NOT A GOOD DEAL for you."));
        assert!(text.contains("# Fairer Options to Consider"));
        assert!(text.contains("Option 1: you take 1 book, 0 hats and 1 ball"));
        assert!(!text.contains("REJECTED"));
        assert!(text.contains("# More Self-Interested Options to Consider"));
    }

    #[test]
    fn repeated_offers_carry_a_rejection_warning() {
        let fixture = Fixture::new([1, 1, 0], BeliefSet::new(vec![valuation([0, 5, 5])], Vec::new()));

        let text = fixture.with(|context, guidance| reflect(context, guidance, &Allocation::new([0, 1, 0])));

        assert!(text.contains(
            "Option 2: you take 1 book, 1 hat and 0 balls; Bob takes 0 books, 0 hats and 1 ball. Your reward is 7 \
             and the chance that Bob accepts is 1. Bob has REJECTED this proposal 1 time(s) already"
        ));
    }

    #[test]
    fn hopeless_self_interest_is_reported() {
        let fixture = Fixture::new([1, 1, 1], BeliefSet::new(vec![valuation([10, 0, 0])], Vec::new()));

        // A book-only opponent accepts nothing that takes the book away.
        let text = fixture.with(|context, guidance| reflect(context, guidance, &Allocation::new([0, 1, 1])));

        assert!(text.contains("no other split raises your reward"));
        assert!(!text.contains("# Fairer Options"));
    }

    #[test]
    fn qualifiers_follow_probability_bands() {
        assert_eq!(probability_qualifier(0.4), ", but the probability is relatively low.");
        assert_eq!(probability_qualifier(0.5), ", and the probability is moderate.");
        assert_eq!(probability_qualifier(0.6), ", and the probability is relatively high.");
    }
}
