//! Brace expansion, the first stage of the word pipeline.
//!
//! `a{b,c}d` multiplies into `abd acd`; `{1..3}` and `{a..c}` enumerate
//! ranges. Expansion is purely syntactic: nothing inside the braces is
//! evaluated here, alternatives are spliced into new words that rerun
//! through this stage until no brace parts remain.

use crate::ast::{BraceItem, RangeEnd, Word, WordPart};

/// Expand every brace part in the word, producing one or more words.
pub fn expand_braces(word: &Word) -> Vec<Word> {
    let index = match word
        .parts
        .iter()
        .position(|p| matches!(p, WordPart::Brace(_)))
    {
        Some(i) => i,
        None => return vec![word.clone()],
    };
    let items = match &word.parts[index] {
        WordPart::Brace(items) => items,
        _ => unreachable!(),
    };
    let prefix = &word.parts[..index];
    let suffix = &word.parts[index + 1..];

    let mut results = Vec::new();
    for item in items {
        for alternative in item_alternatives(item) {
            let mut parts = Vec::with_capacity(prefix.len() + alternative.len() + suffix.len());
            parts.extend_from_slice(prefix);
            parts.extend(alternative);
            parts.extend_from_slice(suffix);
            // The spliced word may hold further brace parts (nested
            // alternatives or a second group in the suffix).
            results.extend(expand_braces(&Word { parts }));
        }
    }
    results
}

fn item_alternatives(item: &BraceItem) -> Vec<Vec<WordPart>> {
    match item {
        BraceItem::Word(word) => vec![word.parts.clone()],
        BraceItem::Range { start, end, step, width } => enumerate_range(*start, *end, *step, *width)
            .into_iter()
            .map(|text| vec![WordPart::Literal(text)])
            .collect(),
    }
}

fn enumerate_range(start: RangeEnd, end: RangeEnd, step: Option<i64>, width: usize) -> Vec<String> {
    match (start, end) {
        (RangeEnd::Int(a), RangeEnd::Int(b)) => {
            let step = normalize_step(step, a <= b);
            let mut out = Vec::new();
            let mut v = a;
            loop {
                if (step > 0 && v > b) || (step < 0 && v < b) {
                    break;
                }
                if width > 0 {
                    let sign = if v < 0 { "-" } else { "" };
                    out.push(format!("{}{:0>width$}", sign, v.abs(), width = width.saturating_sub(sign.len())));
                } else {
                    out.push(v.to_string());
                }
                v += step;
            }
            out
        }
        (RangeEnd::Char(a), RangeEnd::Char(b)) => {
            let step = normalize_step(step, a <= b);
            let mut out = Vec::new();
            let mut v = a as i64;
            let end = b as i64;
            loop {
                if (step > 0 && v > end) || (step < 0 && v < end) {
                    break;
                }
                if let Some(c) = char::from_u32(v as u32) {
                    out.push(c.to_string());
                }
                v += step;
            }
            out
        }
        // Mixed endpoints never enumerate; keep the text as one item.
        (a, b) => vec![format!("{}..{}", range_end_text(a), range_end_text(b))],
    }
}

fn range_end_text(end: RangeEnd) -> String {
    match end {
        RangeEnd::Int(n) => n.to_string(),
        RangeEnd::Char(c) => c.to_string(),
    }
}

/// The step's sign follows the direction when omitted or contradictory.
fn normalize_step(step: Option<i64>, ascending: bool) -> i64 {
    let magnitude = step.unwrap_or(1).abs().max(1);
    if ascending {
        magnitude
    } else {
        -magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{word::parse_word, word::WordMode, Parser};

    fn expand_texts(source: &str) -> Vec<String> {
        let mut parser = Parser::new(source);
        let word = parse_word(&mut parser, WordMode::Normal).unwrap();
        expand_braces(&word)
            .iter()
            .map(|w| w.static_text().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_simple_alternatives() {
        assert_eq!(expand_texts("a{b,c}d"), vec!["abd", "acd"]);
    }

    #[test]
    fn test_numeric_range() {
        assert_eq!(expand_texts("a{1..3}b"), vec!["a1b", "a2b", "a3b"]);
    }

    #[test]
    fn test_descending_range() {
        assert_eq!(expand_texts("{3..1}"), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_negative_range() {
        assert_eq!(expand_texts("{-1..1}"), vec!["-1", "0", "1"]);
    }

    #[test]
    fn test_range_with_step() {
        assert_eq!(expand_texts("{0..10..5}"), vec!["0", "5", "10"]);
        assert_eq!(expand_texts("{10..0..5}"), vec!["10", "5", "0"]);
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(expand_texts("{01..03}"), vec!["01", "02", "03"]);
    }

    #[test]
    fn test_char_range() {
        assert_eq!(expand_texts("{a..d}"), vec!["a", "b", "c", "d"]);
        assert_eq!(expand_texts("{d..a}"), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_nested_braces() {
        assert_eq!(expand_texts("{a,b{1,2}}"), vec!["a", "b1", "b2"]);
    }

    #[test]
    fn test_multiple_groups_multiply() {
        assert_eq!(
            expand_texts("{a,b}{1,2}"),
            vec!["a1", "a2", "b1", "b2"]
        );
    }

    #[test]
    fn test_empty_alternative() {
        assert_eq!(expand_texts("x{,y}"), vec!["x", "xy"]);
    }

    #[test]
    fn test_word_without_braces() {
        assert_eq!(expand_texts("plain"), vec!["plain"]);
    }
}
