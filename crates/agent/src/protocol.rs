//! Delimiter contract between prompts and model output.

use divvy_core::domain::CATEGORY_COUNT;
use divvy_core::session::HALT_SIGNAL;
use divvy_core::{Allocation, Category, ItemCounts, ResponseError};

pub const MESSAGE_OPEN: &str = "<s>";
pub const MESSAGE_CLOSE: &str = "</s>";
pub const DEAL_OPEN: &str = "<deal>";
pub const DEAL_CLOSE: &str = "</deal>";
pub const ANSWER_OPEN: &str = "<answer>";
pub const ANSWER_CLOSE: &str = "</answer>";

/// Text between the first `<s>` and the last `</s>`, trimmed.
pub fn parse_message(text: &str) -> Result<String, ResponseError> {
    let missing = ResponseError::MissingDelimiter { open: MESSAGE_OPEN, close: MESSAGE_CLOSE };
    let start = text.find(MESSAGE_OPEN).ok_or_else(|| missing.clone())? + MESSAGE_OPEN.len();
    let end = text.rfind(MESSAGE_CLOSE).ok_or_else(|| missing.clone())?;
    if end < start {
        return Err(missing);
    }
    Ok(text[start..end].trim().to_string())
}

/// Parses `<deal>book=x hat=y ball=z</deal>` into a share that must fit the pool.
pub fn parse_deal(text: &str, counts: &ItemCounts) -> Result<Allocation, ResponseError> {
    let body = enclosed(text, DEAL_OPEN, DEAL_CLOSE)?;
    let mut shares: [Option<u32>; CATEGORY_COUNT] = [None; CATEGORY_COUNT];

    for token in body.split_whitespace() {
        let (name, value) = token
            .split_once('=')
            .ok_or_else(|| ResponseError::MalformedAllocation(body.trim().to_string()))?;
        let category: Category = name
            .parse()
            .map_err(|_| ResponseError::MalformedAllocation(body.trim().to_string()))?;
        let value: u32 = value
            .trim_end_matches(&[',', ';', '.'][..])
            .parse()
            .map_err(|_| ResponseError::MalformedAllocation(body.trim().to_string()))?;
        let slot = &mut shares[category.index()];
        if slot.is_some() {
            return Err(ResponseError::MalformedAllocation(body.trim().to_string()));
        }
        *slot = Some(value);
    }

    let mut complete = [0; CATEGORY_COUNT];
    for (target, share) in complete.iter_mut().zip(shares) {
        *target = share.ok_or_else(|| ResponseError::MalformedAllocation(body.trim().to_string()))?;
    }

    let allocation = Allocation::new(complete);
    if !allocation.fits_within(counts) {
        return Err(ResponseError::AllocationOutOfRange { allocation: allocation.to_string() });
    }
    Ok(allocation)
}

/// `<answer>yes</answer>` or `<answer>no</answer>`.
pub fn parse_answer(text: &str) -> Result<bool, ResponseError> {
    let answer = enclosed(text, ANSWER_OPEN, ANSWER_CLOSE)?.trim().to_ascii_lowercase();
    match answer.as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err(ResponseError::UnrecognizedAnswer(answer)),
    }
}

/// A revision reply: `None` when the model keeps its draft, otherwise the
/// rewritten message.
pub fn parse_revision(text: &str) -> Result<Option<String>, ResponseError> {
    if parse_answer(text)? {
        parse_message(text).map(Some)
    } else {
        Ok(None)
    }
}

/// True when the message, once normalized, opens or closes with the halt phrase.
pub fn is_halt_signal(message: &str) -> bool {
    let normalized = normalize_message(message);
    normalized.starts_with(HALT_SIGNAL) || normalized.ends_with(HALT_SIGNAL)
}

fn normalize_message(message: &str) -> String {
    message
        .trim()
        .to_lowercase()
        .trim_end_matches(|character: char| character.is_ascii_punctuation() || character.is_whitespace())
        .to_string()
}

fn enclosed<'a>(text: &'a str, open: &'static str, close: &'static str) -> Result<&'a str, ResponseError> {
    let missing = ResponseError::MissingDelimiter { open, close };
    let start = text.find(open).ok_or_else(|| missing.clone())? + open.len();
    let end = text[start..].find(close).ok_or(missing)? + start;
    Ok(&text[start..end])
}

#[cfg(test)]
mod tests {
    use divvy_core::{Allocation, ItemCounts, ResponseError};

    use super::{is_halt_signal, parse_answer, parse_deal, parse_message, parse_revision};

    const COUNTS: ItemCounts = ItemCounts::new([1, 4, 1]);

    #[test]
    fn message_spans_first_open_to_last_close() {
        let text = "Thinking... <s>I take the book.</s> and <s>You get the hats.</s> done";

        assert_eq!(
            parse_message(text).as_deref(),
            Ok("I take the book.</s> and <s>You get the hats.")
        );
    }

    #[test]
    fn message_without_delimiters_is_rejected() {
        assert_eq!(
            parse_message("I take the book."),
            Err(ResponseError::MissingDelimiter { open: "<s>", close: "</s>" })
        );
        assert!(parse_message("</s> backwards <s>").is_err());
    }

    #[test]
    fn deal_parses_in_any_category_order() {
        let text = "Analysis first. <deal>hat=2 ball=1 book=0</deal>";

        assert_eq!(parse_deal(text, &COUNTS), Ok(Allocation::new([0, 2, 1])));
    }

    #[test]
    fn deal_must_name_every_category_once() {
        assert!(matches!(
            parse_deal("<deal>book=1 hat=2</deal>", &COUNTS),
            Err(ResponseError::MalformedAllocation(_))
        ));
        assert!(matches!(
            parse_deal("<deal>book=1 book=0 hat=2 ball=0</deal>", &COUNTS),
            Err(ResponseError::MalformedAllocation(_))
        ));
        assert!(matches!(
            parse_deal("<deal>book=x hat=2 ball=0</deal>", &COUNTS),
            Err(ResponseError::MalformedAllocation(_))
        ));
    }

    #[test]
    fn deal_beyond_the_pool_is_retriable() {
        assert_eq!(
            parse_deal("<deal>book=2 hat=0 ball=0</deal>", &COUNTS),
            Err(ResponseError::AllocationOutOfRange { allocation: "book=2 hat=0 ball=0".to_string() })
        );
    }

    #[test]
    fn answers_are_case_insensitive() {
        assert_eq!(parse_answer("Sure. <answer> Yes </answer>"), Ok(true));
        assert_eq!(parse_answer("<answer>no</answer>"), Ok(false));
        assert_eq!(
            parse_answer("<answer>maybe</answer>"),
            Err(ResponseError::UnrecognizedAnswer("maybe".to_string()))
        );
    }

    #[test]
    fn revision_requires_a_message_only_when_revising() {
        assert_eq!(parse_revision("<answer>no</answer>"), Ok(None));
        assert_eq!(
            parse_revision("<answer>yes</answer> <s>How about two hats?</s>"),
            Ok(Some("How about two hats?".to_string()))
        );
        assert!(parse_revision("<answer>yes</answer> no message").is_err());
    }

    #[test]
    fn halt_signal_survives_case_and_trailing_punctuation() {
        assert!(is_halt_signal("halt negotiation"));
        assert!(is_halt_signal("  Halt Negotiation.  "));
        assert!(is_halt_signal("We agree, so: halt negotiation!"));
        assert!(is_halt_signal("HALT NEGOTIATION, thanks for the deal"));
        assert!(!is_halt_signal("Let us not halt negotiation yet, I want the hats"));
    }
}
