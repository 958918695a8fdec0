//! Brace Expansion
//!
//! First expansion stage. A word holding `BraceExpansion` parts becomes the
//! cartesian product of its alternatives, each a plain part list for the
//! later stages. Sequence expressions (`{1..10..2}`, `{a..e}`) are generated
//! here.

use crate::ast::types::{BraceItem, BraceRange, WordPart};
use crate::interpreter::errors::{InterpreterError, InterpreterResult};

/// Upper bound on the number of words one brace expression may produce.
pub const MAX_BRACE_RESULTS: usize = 100_000;

/// Whether any part needs brace expansion.
pub fn has_braces(parts: &[WordPart]) -> bool {
    parts.iter().any(|p| matches!(p, WordPart::BraceExpansion(_)))
}

/// Expands every brace part; a word without braces yields itself.
pub fn expand_braces(parts: &[WordPart]) -> InterpreterResult<Vec<Vec<WordPart>>> {
    let mut results: Vec<Vec<WordPart>> = vec![Vec::new()];
    for part in parts {
        match part {
            WordPart::BraceExpansion(items) => {
                let mut alternatives = Vec::new();
                for item in items {
                    match item {
                        BraceItem::Word(word) => alternatives.extend(expand_braces(&word.parts)?),
                        BraceItem::Range(range) => alternatives.extend(
                            expand_range(range).into_iter().map(|s| vec![WordPart::Literal(s)]),
                        ),
                    }
                }
                if results.len().saturating_mul(alternatives.len()) > MAX_BRACE_RESULTS {
                    return Err(InterpreterError::ExecutionLimit(
                        "brace expansion: too many results".to_string(),
                    ));
                }
                let mut next = Vec::with_capacity(results.len() * alternatives.len());
                for prefix in &results {
                    for alt in &alternatives {
                        let mut combined = prefix.clone();
                        combined.extend(alt.iter().cloned());
                        next.push(combined);
                    }
                }
                results = next;
            }
            other => {
                for result in &mut results {
                    result.push(other.clone());
                }
            }
        }
    }
    Ok(results)
}

/// Text of a brace part when it is not expanded (inside assignments).
pub fn render_range(range: &BraceRange) -> String {
    match range.step {
        Some(step) => format!("{{{}..{}..{}}}", range.start, range.end, step),
        None => format!("{{{}..{}}}", range.start, range.end),
    }
}

fn zero_pad_width(s: &str) -> Option<usize> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.len() > 1 && digits.starts_with('0') {
        Some(s.len())
    } else {
        None
    }
}

/// Generates a numeric or character sequence.
pub fn expand_range(range: &BraceRange) -> Vec<String> {
    let step = range.step.map(|s| s.unsigned_abs().max(1)).unwrap_or(1) as i64;

    if let (Ok(start), Ok(end)) = (range.start.parse::<i64>(), range.end.parse::<i64>()) {
        let width = zero_pad_width(&range.start).max(zero_pad_width(&range.end));
        let count = ((start - end).unsigned_abs() / step as u64) as usize + 1;
        if count > MAX_BRACE_RESULTS {
            return vec![render_range(range)];
        }
        let dir = if start <= end { 1 } else { -1 };
        return (0..count as i64)
            .map(|i| {
                let n = start + dir * i * step;
                match width {
                    Some(w) if n < 0 => format!("-{:0>width$}", -n, width = w - 1),
                    Some(w) => format!("{:0>width$}", n, width = w),
                    None => n.to_string(),
                }
            })
            .collect();
    }

    let (Some(start), Some(end)) = (range.start.chars().next(), range.end.chars().next()) else {
        return vec![render_range(range)];
    };
    let (s, e) = (start as i64, end as i64);
    let dir = if s <= e { 1 } else { -1 };
    let count = (s - e).abs() / step + 1;
    (0..count)
        .filter_map(|i| char::from_u32((s + dir * i * step) as u32))
        .map(|c| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_word;

    fn literal_words(raw: &str) -> Vec<String> {
        let word = parse_word(raw, 1).unwrap();
        expand_braces(&word.parts)
            .unwrap()
            .into_iter()
            .map(|parts| {
                parts
                    .iter()
                    .map(|p| match p {
                        WordPart::Literal(s) | WordPart::SingleQuoted(s) | WordPart::Escaped(s) => s.clone(),
                        other => panic!("unexpected part {:?}", other),
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_comma_lists_and_nesting() {
        assert_eq!(literal_words("a{b,c}d"), vec!["abd", "acd"]);
        assert_eq!(literal_words("{x,y}{1,2}"), vec!["x1", "x2", "y1", "y2"]);
        assert_eq!(literal_words("{a,b{1,2}}"), vec!["a", "b1", "b2"]);
        assert_eq!(literal_words("plain"), vec!["plain"]);
    }

    #[test]
    fn test_sequences() {
        assert_eq!(literal_words("{1..4}"), vec!["1", "2", "3", "4"]);
        assert_eq!(literal_words("{3..1}"), vec!["3", "2", "1"]);
        assert_eq!(literal_words("{0..10..5}"), vec!["0", "5", "10"]);
        assert_eq!(literal_words("{a..e..2}"), vec!["a", "c", "e"]);
        assert_eq!(literal_words("{01..03}"), vec!["01", "02", "03"]);
        assert_eq!(literal_words("{-1..1}"), vec!["-1", "0", "1"]);
    }
}
