use divvy_core::config::AppConfig;
use divvy_core::session::TurnGuidance;
use divvy_core::{
    Allocation, CollaboratorError, ResponseError, RetryPolicy, TurnCollaborator, TurnContext,
    TurnReply, TurnSignal,
};
use tracing::{debug, info};

use crate::llm::TextGenerator;
use crate::prompts::{
    classifier_prompt, final_offer_prompt, negotiation_prompt, revision_prompt, summarizer_prompt,
};
use crate::protocol::{is_halt_signal, parse_answer, parse_deal, parse_message, parse_revision};
use crate::reflection::{analysis_preamble, reflect};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiatorSettings {
    /// Writes negotiation messages and final offers.
    pub model: String,
    /// Extracts deals and answers yes/no questions about drafted messages.
    pub summarizer_model: String,
    pub max_message_revisions: u32,
    pub retry: RetryPolicy,
}

impl NegotiatorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            summarizer_model: config.llm.summarizer_model.clone(),
            max_message_revisions: config.negotiation.max_message_revisions,
            retry: config.retry_policy(),
        }
    }
}

/// Turn collaborator backed by a text generator. It phrases messages and
/// restates the deal they contain; every judgement comes in through the
/// turn context.
#[derive(Clone, Debug)]
pub struct LlmNegotiator<G> {
    generator: G,
    settings: NegotiatorSettings,
}

impl<G> LlmNegotiator<G>
where
    G: TextGenerator,
{
    pub fn new(generator: G, settings: NegotiatorSettings) -> Self {
        Self { generator, settings }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn settings(&self) -> &NegotiatorSettings {
        &self.settings
    }

    fn ask<T>(
        &self,
        operation: &'static str,
        model: &str,
        prompt: &str,
        parse: impl Fn(&str) -> Result<T, ResponseError>,
    ) -> Result<T, CollaboratorError> {
        self.settings.retry.run(operation, |attempt| {
            let text = self
                .generator
                .generate(prompt, model)
                .map_err(|error| ResponseError::Generation(error.to_string()))?;
            debug!(event_name = "agent.generation.completed", operation, model, attempt, "model responded");
            parse(&text)
        })
    }

    fn draft(&self, context: &TurnContext<'_>, analysis: Option<&str>) -> Result<String, CollaboratorError> {
        let prompt = negotiation_prompt(context, analysis);
        self.ask("negotiate", &self.settings.model, &prompt, parse_message)
    }

    /// The share the drafted message claims, or `None` when it names no
    /// concrete split.
    fn extract_deal(
        &self,
        context: &TurnContext<'_>,
        message: &str,
    ) -> Result<Option<Allocation>, CollaboratorError> {
        let model = self.settings.summarizer_model.as_str();
        let concrete = self.ask("classify_message", model, &classifier_prompt(context, message), parse_answer)?;
        if !concrete {
            return Ok(None);
        }
        let counts = context.counts;
        self.ask("summarize_proposal", model, &summarizer_prompt(context, message), |text| {
            parse_deal(text, counts)
        })
        .map(Some)
    }

    fn unguided(&self, context: &TurnContext<'_>) -> Result<TurnReply, CollaboratorError> {
        let message = self.draft(context, None)?;
        self.settle(context, message)
    }

    /// Draft, extract, reflect, and let the model revise until the deal
    /// repeats, the model keeps its draft, or the revision budget runs out.
    fn guided(
        &self,
        context: &TurnContext<'_>,
        guidance: &TurnGuidance<'_>,
    ) -> Result<TurnReply, CollaboratorError> {
        let preamble = analysis_preamble(context, guidance);
        let mut message = self.draft(context, Some(&preamble))?;
        let mut considered: Vec<Allocation> = Vec::new();
        let mut revisions = 0;

        loop {
            if is_halt_signal(&message) {
                return Ok(TurnReply { message, signal: TurnSignal::Halt });
            }
            let Some(deal) = self.extract_deal(context, &message)? else {
                return Ok(TurnReply { message, signal: TurnSignal::NoProposal });
            };
            if considered.contains(&deal) || revisions >= self.settings.max_message_revisions {
                return Ok(proposal(message, deal));
            }
            considered.push(deal);

            let reflection = reflect(context, guidance, &deal);
            let prompt = revision_prompt(context, &message, &reflection);
            match self.ask("revise_message", &self.settings.model, &prompt, parse_revision)? {
                Some(revised) => {
                    revisions += 1;
                    info!(
                        event_name = "agent.negotiator.revised",
                        agent = context.name,
                        round = context.round,
                        revision = revisions,
                        previous_deal = %deal,
                        "message revised after reflection"
                    );
                    message = revised;
                }
                None => return Ok(proposal(message, deal)),
            }
        }
    }

    fn settle(&self, context: &TurnContext<'_>, message: String) -> Result<TurnReply, CollaboratorError> {
        if is_halt_signal(&message) {
            return Ok(TurnReply { message, signal: TurnSignal::Halt });
        }
        Ok(match self.extract_deal(context, &message)? {
            Some(deal) => proposal(message, deal),
            None => TurnReply { message, signal: TurnSignal::NoProposal },
        })
    }
}

impl<G> TurnCollaborator for LlmNegotiator<G>
where
    G: TextGenerator,
{
    fn negotiate(&self, context: &TurnContext<'_>) -> Result<TurnReply, CollaboratorError> {
        let reply = match &context.guidance {
            Some(guidance) => self.guided(context, guidance)?,
            None => self.unguided(context)?,
        };
        debug!(
            event_name = "agent.negotiator.turn_completed",
            agent = context.name,
            round = context.round,
            guided = context.guidance.is_some(),
            proposal = ?reply.proposal(),
            halt = reply.is_halt(),
            "negotiation turn produced"
        );
        Ok(reply)
    }

    fn present_final_offer(&self, context: &TurnContext<'_>) -> Result<Allocation, CollaboratorError> {
        let counts = context.counts;
        self.ask("present_final_offer", &self.settings.model, &final_offer_prompt(context), |text| {
            parse_deal(text, counts)
        })
    }
}

fn proposal(message: String, allocation: Allocation) -> TurnReply {
    TurnReply { message, signal: TurnSignal::Proposal { allocation } }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use divvy_core::belief::BeliefSet;
    use divvy_core::domain::{ProposalHistory, Seat};
    use divvy_core::partition::PartitionSpace;
    use divvy_core::proposal::ProposalPolicy;
    use divvy_core::session::TurnGuidance;
    use divvy_core::{
        Allocation, CollaboratorError, ItemCounts, ResponseError, RetryPolicy, TurnCollaborator,
        TurnContext, TurnSignal, Valuation,
    };

    use super::{LlmNegotiator, NegotiatorSettings};
    use crate::llm::ScriptedGenerator;

    fn negotiator(responses: &[&str], max_message_revisions: u32) -> LlmNegotiator<ScriptedGenerator> {
        LlmNegotiator::new(
            ScriptedGenerator::new(responses.iter().copied()),
            NegotiatorSettings {
                model: "chat".to_string(),
                summarizer_model: "summarizer".to_string(),
                max_message_revisions,
                retry: RetryPolicy::new(2, Duration::ZERO),
            },
        )
    }

    struct Table {
        counts: ItemCounts,
        valuation: Valuation,
        space: PartitionSpace,
        history: ProposalHistory,
        beliefs: BeliefSet,
    }

    impl Table {
        fn new() -> Self {
            let counts = ItemCounts::new([1, 1, 1]);
            let mut history = ProposalHistory::default();
            history.record_own(Allocation::new([1, 1, 1]));
            history.replace_observed(vec![Allocation::new([0, 1, 1])]);
            let opponent = Valuation::new([0, 5, 5], &counts).expect("valid valuation");
            Self {
                counts,
                valuation: Valuation::new([4, 3, 3], &counts).expect("valid valuation"),
                space: PartitionSpace::new(counts),
                history,
                beliefs: BeliefSet::new(vec![opponent], Vec::new()),
            }
        }

        fn context(&self, guided: bool) -> TurnContext<'_> {
            let guidance = guided.then(|| TurnGuidance {
                beliefs: &self.beliefs,
                probabilities: self.beliefs.probabilities().expect("active belief"),
                policy: ProposalPolicy::new(Seat::First, &self.space, &self.valuation, &self.history, 0.0),
            });
            TurnContext {
                name: "Alice",
                opponent: "Bob",
                seat: Seat::First,
                counts: &self.counts,
                valuation: &self.valuation,
                round: 2,
                max_rounds: 20,
                transcript: &[],
                history: &self.history,
                guidance,
            }
        }
    }

    #[test]
    fn unguided_turn_extracts_the_proposed_share() {
        let negotiator = negotiator(
            &[
                "<s>I'd like the book and the ball.</s>",
                "<answer>yes</answer>",
                "<deal>book=1 hat=0 ball=1</deal>",
            ],
            3,
        );
        let table = Table::new();

        let reply = negotiator.negotiate(&table.context(false)).expect("turn succeeds");

        assert_eq!(reply.message, "I'd like the book and the ball.");
        assert_eq!(reply.signal, TurnSignal::Proposal { allocation: Allocation::new([1, 0, 1]) });
        let models: Vec<String> =
            negotiator.generator().prompts().into_iter().map(|prompt| prompt.model_id).collect();
        assert_eq!(models, vec!["chat", "summarizer", "summarizer"]);
    }

    #[test]
    fn halt_message_skips_extraction() {
        let negotiator = negotiator(&["<s>Halt negotiation.</s>"], 3);
        let table = Table::new();

        let reply = negotiator.negotiate(&table.context(false)).expect("turn succeeds");

        assert_eq!(reply.signal, TurnSignal::Halt);
        assert_eq!(negotiator.generator().prompts().len(), 1);
    }

    #[test]
    fn message_without_concrete_deal_is_no_proposal() {
        let negotiator = negotiator(&["<s>What do you value most?</s>", "<answer>no</answer>"], 3);
        let table = Table::new();

        let reply = negotiator.negotiate(&table.context(false)).expect("turn succeeds");

        assert_eq!(reply.signal, TurnSignal::NoProposal);
    }

    #[test]
    fn malformed_responses_are_retried_then_fatal() {
        let negotiator = negotiator(&["I take the book", "still no tags"], 3);
        let table = Table::new();

        let error = negotiator.negotiate(&table.context(false)).expect_err("retries exhausted");

        assert_eq!(
            error,
            CollaboratorError::RetriesExhausted {
                operation: "negotiate",
                attempts: 2,
                last_error: ResponseError::MissingDelimiter { open: "<s>", close: "</s>" },
            }
        );
    }

    #[test]
    fn exhausted_generator_surfaces_as_generation_error() {
        let negotiator = negotiator(&[], 3);
        let table = Table::new();

        let error = negotiator.present_final_offer(&table.context(false)).expect_err("no responses");

        assert!(matches!(
            error,
            CollaboratorError::RetriesExhausted { last_error: ResponseError::Generation(_), .. }
        ));
    }

    #[test]
    fn guided_turn_revises_until_the_model_keeps_its_draft() {
        let negotiator = negotiator(
            &[
                "<s>I take everything.</s>",
                "<answer>yes</answer>",
                "<deal>book=1 hat=1 ball=1</deal>",
                "<answer>yes</answer> Bob will never accept. <s>You take the hat, I take the rest.</s>",
                "<answer>yes</answer>",
                "<deal>book=1 hat=0 ball=1</deal>",
                "<answer>no</answer>",
            ],
            3,
        );
        let table = Table::new();

        let reply = negotiator.negotiate(&table.context(true)).expect("turn succeeds");

        assert_eq!(reply.message, "You take the hat, I take the rest.");
        assert_eq!(reply.proposal(), Some(Allocation::new([1, 0, 1])));
        let prompts = negotiator.generator().prompts();
        assert_eq!(prompts.len(), 7);
        assert!(prompts[0].prompt.contains("### Analysis of the Last Round"));
        assert!(prompts[3].prompt.contains("# Will This Deal be Unfair?"));
    }

    #[test]
    fn guided_turn_stops_when_a_deal_repeats() {
        let negotiator = negotiator(
            &[
                "<s>I take the book and the ball.</s>",
                "<answer>yes</answer>",
                "<deal>book=1 hat=0 ball=1</deal>",
                "<answer>yes</answer> <s>Book and ball for me, hat for you.</s>",
                "<answer>yes</answer>",
                "<deal>book=1 hat=0 ball=1</deal>",
            ],
            3,
        );
        let table = Table::new();

        let reply = negotiator.negotiate(&table.context(true)).expect("turn succeeds");

        assert_eq!(reply.message, "Book and ball for me, hat for you.");
        assert_eq!(reply.proposal(), Some(Allocation::new([1, 0, 1])));
        assert_eq!(negotiator.generator().remaining(), 0);
    }

    #[test]
    fn revision_budget_bounds_the_loop() {
        let negotiator = negotiator(
            &[
                "<s>I take everything.</s>",
                "<answer>yes</answer>",
                "<deal>book=1 hat=1 ball=1</deal>",
                "<answer>yes</answer> <s>Fine, the hat is yours.</s>",
                "<answer>yes</answer>",
                "<deal>book=1 hat=0 ball=1</deal>",
            ],
            1,
        );
        let table = Table::new();

        let reply = negotiator.negotiate(&table.context(true)).expect("turn succeeds");

        assert_eq!(reply.proposal(), Some(Allocation::new([1, 0, 1])));
        assert_eq!(negotiator.generator().prompts().len(), 6);
    }

    #[test]
    fn final_offer_must_fit_the_pool() {
        let negotiator = negotiator(
            &["<deal>book=2 hat=0 ball=0</deal>", "<deal>book=1 hat=0 ball=0</deal>"],
            3,
        );
        let table = Table::new();

        let offer = negotiator.present_final_offer(&table.context(false)).expect("second attempt fits");

        assert_eq!(offer, Allocation::new([1, 0, 0]));
    }
}
