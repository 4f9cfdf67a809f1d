use serde::Serialize;

use crate::domain::items::{Allocation, Category, ItemCounts, Valuation, CATEGORY_COUNT};
use crate::errors::RecordError;

const FIRST_INPUT: (&str, &str) = ("<input>", "</input>");
const SECOND_INPUT: (&str, &str) = ("<partner_input>", "</partner_input>");
const OUTPUT: (&str, &str) = ("<output>", "</output>");

/// What the human negotiators in the dataset ended up with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceOutcome {
    Concrete { first: Allocation, second: Allocation },
    /// Tokens such as `<disagree>` or `<no_agreement>`, kept verbatim.
    Symbolic { tokens: Vec<String> },
}

impl ReferenceOutcome {
    pub fn allocations(&self) -> Option<(Allocation, Allocation)> {
        match self {
            Self::Concrete { first, second } => Some((*first, *second)),
            Self::Symbolic { .. } => None,
        }
    }
}

/// One line of the dialogue dataset: the shared pool, both private
/// valuations and the human reference outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NegotiationRecord {
    pub counts: ItemCounts,
    pub first_valuation: Valuation,
    pub second_valuation: Valuation,
    pub reference: ReferenceOutcome,
}

impl NegotiationRecord {
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let (first_counts, first_values) = parse_input(line, FIRST_INPUT)?;
        let (second_counts, second_values) = parse_input(line, SECOND_INPUT)?;
        if first_counts != second_counts {
            return Err(RecordError::CountMismatch { first: first_counts, second: second_counts });
        }

        let counts = ItemCounts::new(first_counts);
        let first_valuation = Valuation::new(first_values, &counts)?;
        let second_valuation = Valuation::new(second_values, &counts)?;
        let reference = parse_output(line)?;
        if let Some((first, second)) = reference.allocations() {
            first.validated(&counts)?;
            second.validated(&counts)?;
        }

        Ok(Self { counts, first_valuation, second_valuation, reference })
    }

    /// Identity of the bargaining setting, ignoring the human outcome.
    pub fn setting_key(&self) -> ([u32; CATEGORY_COUNT], [u32; CATEGORY_COUNT], [u32; CATEGORY_COUNT]) {
        (self.counts.as_array(), self.first_valuation.values(), self.second_valuation.values())
    }

    pub fn valuation_distance(&self) -> u32 {
        self.first_valuation.l1_distance(&self.second_valuation)
    }
}

/// Parses a record file, one record per non-blank line.
pub fn parse_records(text: &str) -> Result<Vec<NegotiationRecord>, RecordError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            NegotiationRecord::parse(line)
                .map_err(|source| RecordError::Line { line: index + 1, source: Box::new(source) })
        })
        .collect()
}

/// Plain-language description of a valuation, used in prompts and reports.
pub fn describe_valuation(counts: &ItemCounts, valuation: &Valuation) -> String {
    Category::ALL
        .iter()
        .map(|category| {
            format!(
                "There are {} {} whose values to you are {}.",
                counts.get(*category),
                category.plural(),
                valuation.get(*category)
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn segment<'a>(line: &'a str, (open, close): (&'static str, &'static str)) -> Result<&'a str, RecordError> {
    let start = line.find(open).ok_or(RecordError::MissingSegment { tag: open })? + open.len();
    let end = line[start..].find(close).ok_or(RecordError::MissingSegment { tag: close })? + start;
    Ok(&line[start..end])
}

fn parse_input(
    line: &str,
    tags: (&'static str, &'static str),
) -> Result<([u32; CATEGORY_COUNT], [u32; CATEGORY_COUNT]), RecordError> {
    let tokens = segment(line, tags)?.split_whitespace().collect::<Vec<_>>();
    if tokens.len() != CATEGORY_COUNT * 2 {
        return Err(RecordError::WrongTokenCount {
            tag: tags.0,
            expected: CATEGORY_COUNT * 2,
            found: tokens.len(),
        });
    }

    let mut counts = [0; CATEGORY_COUNT];
    let mut values = [0; CATEGORY_COUNT];
    for (index, pair) in tokens.chunks(2).enumerate() {
        counts[index] = parse_number(tags.0, pair[0])?;
        values[index] = parse_number(tags.0, pair[1])?;
    }
    Ok((counts, values))
}

fn parse_output(line: &str) -> Result<ReferenceOutcome, RecordError> {
    let tokens = segment(line, OUTPUT)?.split_whitespace().collect::<Vec<_>>();
    let concrete = tokens.first().is_some_and(|token| token.starts_with("item0="));
    if !concrete {
        return Ok(ReferenceOutcome::Symbolic {
            tokens: tokens.iter().map(|token| token.to_string()).collect(),
        });
    }

    if tokens.len() != CATEGORY_COUNT * 2 {
        return Err(RecordError::WrongTokenCount {
            tag: OUTPUT.0,
            expected: CATEGORY_COUNT * 2,
            found: tokens.len(),
        });
    }

    let mut shares = [[0; CATEGORY_COUNT]; 2];
    for (position, token) in tokens.iter().enumerate() {
        let (_, value) = token.split_once('=').ok_or_else(|| RecordError::MalformedToken {
            tag: OUTPUT.0,
            token: token.to_string(),
        })?;
        shares[position / CATEGORY_COUNT][position % CATEGORY_COUNT] =
            parse_number(OUTPUT.0, value)?;
    }

    Ok(ReferenceOutcome::Concrete {
        first: Allocation::new(shares[0]),
        second: Allocation::new(shares[1]),
    })
}

fn parse_number(tag: &'static str, token: &str) -> Result<u32, RecordError> {
    token
        .trim()
        .parse::<u32>()
        .map_err(|_| RecordError::MalformedToken { tag, token: token.to_string() })
}
