//! Prompt composition. Every prompt starts from the game description and
//! ends with the delimiter instructions its parser expects.

use divvy_core::domain::describe_valuation;
use divvy_core::session::HALT_SIGNAL;
use divvy_core::{score, Allocation, Category, ItemCounts, TurnContext};

use crate::protocol::{MESSAGE_CLOSE, MESSAGE_OPEN};

pub fn game_description(context: &TurnContext<'_>) -> String {
    let counts = context.counts;
    let opponent = context.opponent;
    format!(
        "### Game Description\n\n\
         This is a negotiation game over {pool}.\n\
         Each item has a value to you and a value to {opponent}. {opponent}'s values are unknown to you \
         and can be very different from yours, so do not assume they match.\n\
         Every item is worth between 0 and 10 to a player, and the whole pool is worth exactly 10 to each player.\n\n\
         Your goal is to MAXIMIZE the total value you alone obtain from the items you take. Items cannot be split.\n\
         If the negotiation ends without an agreement, neither of you gets anything.\n\
         DO NOT REVEAL your values to {opponent} at any point.\n\n\
         You are playing {name}. The player you negotiate with is {opponent}.\n\n\
         ### Item Values to You\n\n\
         {values}\n\n\
         Taking every item would give you {maximum}.\n",
        pool = describe_pool(counts),
        name = context.name,
        values = describe_valuation(counts, context.valuation),
        maximum = score(context.valuation, &counts.as_allocation()),
    )
}

/// Asks for the next message. `analysis` is the belief-guided preamble, if any.
pub fn negotiation_prompt(context: &TurnContext<'_>, analysis: Option<&str>) -> String {
    let mut prompt = game_description(context);
    if let Some(analysis) = analysis {
        prompt.push('\n');
        prompt.push_str(analysis);
    }
    prompt.push_str(&format!(
        "\n### Negotiation\n\n\
         Negotiate with {opponent} to MAXIMIZE the total value you obtain. This is round {round} of at most {max_rounds}.\n\
         Analyze the situation and decide what to say to {opponent}.\n\n\
         Surround your message with '<s>' and '</s>', for example '<s>Hi, how are you?</s>'.\n\
         You can end the negotiation by saying {halt}. Once you have reached an agreement, say {halt} to close it.\n\n\
         Remember not to reveal your values to {opponent}.\n",
        opponent = context.opponent,
        round = context.round,
        max_rounds = context.max_rounds,
        halt = format!("'{MESSAGE_OPEN}{HALT_SIGNAL}{MESSAGE_CLOSE}'"),
    ));
    prompt.push_str(&previous_rounds(context.transcript));
    prompt
}

/// Yes/no: does the drafted message pin down a concrete split?
pub fn classifier_prompt(context: &TurnContext<'_>, message: &str) -> String {
    let mut prompt = game_description(context);
    prompt.push_str(&previous_rounds(context.transcript));
    prompt.push_str(&format!(
        "\n\nHere is the negotiation message you are about to send to {opponent}:\n{message}\n\n\
         Does this message contain a concrete proposal of how to divide the items, one that can be \
         derived from this message alone?\n\n\
         Analyze the message first and then answer <answer>yes</answer> or <answer>no</answer>.\n",
        opponent = context.opponent,
    ));
    prompt
}

/// Restates the drafted message as the share the speaker would take.
pub fn summarizer_prompt(context: &TurnContext<'_>, message: &str) -> String {
    let mut prompt = game_description(context);
    prompt.push_str(&format!(
        "\n### Your Drafted Message (not yet sent to {opponent})\n\n{message}\n\n\
         ### Summarize the Proposal\n\n\
         What split does this message propose to {opponent}?\n\
         {deal_format}\n\n\
         Analyze the message first and then write down the proposed deal.\n",
        opponent = context.opponent,
        deal_format = DEAL_FORMAT,
    ));
    prompt
}

/// Offers the reflection and asks whether to rewrite the draft.
pub fn revision_prompt(context: &TurnContext<'_>, draft: &str, reflection: &str) -> String {
    let opponent = context.opponent;
    let mut prompt = game_description(context);
    prompt.push_str(&previous_rounds(context.transcript));
    let last_heard = context
        .transcript
        .last()
        .map(|line| format!("\n## {opponent}'s Last Message\n\n{line}\n"))
        .unwrap_or_default();
    prompt.push_str(&format!(
        "\n\n### Revise Your Message?\n\n\
         ## Drafted Message\n\nYour first draft of what to say next is:\n{draft}\n\
         {last_heard}\n\
         ## Self-Reflection\n\n{reflection}\n\n\
         ### Decide\n\n\
         Do not take items that are worth 0 to you; they do you no good.\n\
         Should you rewrite the message to maximize your own interest while keeping the deal acceptable to both sides?\n\n\
         If the draft is good enough, answer <answer>no</answer>.\n\
         If you can propose a better deal, answer <answer>yes</answer>, explain how you would change the message, \
         and give the rewritten message surrounded by '<s>' and '</s>'.\n\
         Keep the tone natural with respect to {opponent}'s last message.\n",
    ));
    prompt
}

/// After negotiation: state the share you walk away with.
pub fn final_offer_prompt(context: &TurnContext<'_>) -> String {
    let mut prompt = game_description(context);
    prompt.push_str(&previous_rounds(context.transcript));
    prompt.push_str(&format!(
        "\n\n### Present Deal\n\n\
         The negotiation is over. State which items you take based on what was negotiated.\n\
         {DEAL_FORMAT}\n",
    ));
    prompt
}

/// "1 book, 2 hats and 0 balls"
pub fn describe_share(share: &Allocation) -> String {
    let parts = Category::ALL
        .iter()
        .map(|category| quantity(share.get(*category), *category))
        .collect::<Vec<_>>();
    format!("{}, {} and {}", parts[0], parts[1], parts[2])
}

/// Both halves of a split, from the speaker's side.
pub fn describe_split(context: &TurnContext<'_>, share: &Allocation) -> String {
    match share.complement(context.counts) {
        Some(rest) => format!(
            "you take {}; {} takes {}",
            describe_share(share),
            context.opponent,
            describe_share(&rest)
        ),
        None => format!("you take {}", describe_share(share)),
    }
}

const DEAL_FORMAT: &str = "Write down the number of books, hats, and balls you get in the format \
     <deal>book=x hat=y ball=z</deal>, where x, y, and z are the counts you get.";

fn describe_pool(counts: &ItemCounts) -> String {
    describe_share(&counts.as_allocation())
}

fn quantity(count: u32, category: Category) -> String {
    if count == 1 {
        format!("1 {}", category.as_str())
    } else {
        format!("{count} {}", category.plural())
    }
}

fn previous_rounds(transcript: &[String]) -> String {
    if transcript.is_empty() {
        return String::new();
    }
    format!("\n\n### Previous Rounds of Negotiation\n\n{}", transcript.join("\n"))
}
