//! Word Splitting
//!
//! Splits the unquoted expansion results of a field on `$IFS`.
//!
//! - IFS whitespace (space, tab, newline) collapses and is trimmed at both ends
//! - Every other IFS character delimits exactly one field, so `a::b` with
//!   `IFS=:` gives `a`, ``, `b`; whitespace around it is absorbed
//! - Quoted and literal segments never split, and a quoted empty segment
//!   keeps its field alive

use super::{Field, Segment};

pub const DEFAULT_IFS: &str = " \t\n";

fn is_ifs_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastDelim {
    Start,
    None,
    Whitespace,
    Other,
}

struct Splitter<'a> {
    ifs: &'a str,
    words: Vec<Field>,
    current: Field,
    has_content: bool,
    last: LastDelim,
}

impl<'a> Splitter<'a> {
    fn finish_word(&mut self) {
        self.words.push(std::mem::take(&mut self.current));
        self.has_content = false;
    }

    fn push_text(&mut self, seg: &Segment, text: &str) {
        match self.current.last_mut() {
            Some(last) if last.quoted == seg.quoted && last.splittable == seg.splittable => last.text.push_str(text),
            _ => self.current.push(Segment { text: text.to_string(), quoted: seg.quoted, splittable: seg.splittable }),
        }
    }

    fn feed(&mut self, seg: &Segment) {
        if !seg.splittable {
            if seg.quoted || !seg.text.is_empty() {
                self.has_content = true;
                self.last = LastDelim::None;
            }
            self.current.push(seg.clone());
            return;
        }
        let mut pending = String::new();
        for c in seg.text.chars() {
            if !self.ifs.contains(c) {
                pending.push(c);
                self.has_content = true;
                self.last = LastDelim::None;
                continue;
            }
            if !pending.is_empty() {
                self.push_text(seg, &pending);
                pending.clear();
            }
            if is_ifs_whitespace(c) {
                if self.has_content {
                    self.finish_word();
                    self.last = LastDelim::Whitespace;
                }
            } else {
                if self.has_content {
                    self.finish_word();
                } else if matches!(self.last, LastDelim::Start | LastDelim::Other) {
                    self.words.push(Vec::new());
                }
                self.last = LastDelim::Other;
            }
        }
        if !pending.is_empty() {
            self.push_text(seg, &pending);
        }
    }
}

/// Splits one field into words. With an empty IFS nothing splits.
pub fn split_field(field: Field, ifs: &str) -> Vec<Field> {
    if ifs.is_empty() || !field.iter().any(|s| s.splittable) {
        let keep = field.iter().any(|s| s.quoted || !s.text.is_empty());
        return if keep { vec![field] } else { Vec::new() };
    }
    let mut splitter = Splitter { ifs, words: Vec::new(), current: Vec::new(), has_content: false, last: LastDelim::Start };
    for seg in &field {
        splitter.feed(seg);
    }
    if splitter.has_content {
        splitter.finish_word();
    }
    splitter.words
}

/// Splits plain text the way an unquoted expansion would be split.
pub fn split_text(text: &str, ifs: &str) -> Vec<String> {
    let field = vec![Segment { text: text.to_string(), quoted: false, splittable: true }];
    split_field(field, ifs)
        .into_iter()
        .map(|f| f.into_iter().map(|s| s.text).collect())
        .collect()
}

/// Field splitting for `read`: at most `max` fields, the last one taking
/// the rest of the line with trailing IFS whitespace removed.
pub fn split_for_read(line: &str, ifs: &str, max: usize) -> Vec<String> {
    if max == 0 {
        return Vec::new();
    }
    let ws: Vec<char> = ifs.chars().filter(|c| is_ifs_whitespace(*c)).collect();
    let trim_ws = |s: &str| s.trim_matches(|c: char| ws.contains(&c)).to_string();
    if ifs.is_empty() {
        return vec![line.to_string()];
    }
    let mut fields = Vec::new();
    let mut rest = line.trim_start_matches(|c: char| ws.contains(&c));
    while fields.len() + 1 < max {
        if rest.is_empty() {
            break;
        }
        match rest.find(|c: char| ifs.contains(c)) {
            Some(pos) => {
                fields.push(rest[..pos].to_string());
                let mut after = &rest[pos..];
                let sep = after.chars().next().unwrap_or(' ');
                after = &after[sep.len_utf8()..];
                after = after.trim_start_matches(|c: char| ws.contains(&c));
                if is_ifs_whitespace(sep) {
                    if let Some(c) = after.chars().next() {
                        if ifs.contains(c) && !is_ifs_whitespace(c) {
                            after = after[c.len_utf8()..].trim_start_matches(|c: char| ws.contains(&c));
                        }
                    }
                }
                rest = after;
            }
            None => {
                fields.push(rest.to_string());
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        let mut last = trim_ws(rest);
        // a single trailing non-whitespace delimiter is dropped
        if let Some(c) = last.chars().last() {
            if ifs.contains(c) && !is_ifs_whitespace(c) && !last[..last.len() - c.len_utf8()].ends_with(|d: char| ifs.contains(d)) {
                last.truncate(last.len() - c.len_utf8());
            }
        }
        fields.push(last);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seg(text: &str, quoted: bool, splittable: bool) -> Segment {
        Segment { text: text.to_string(), quoted, splittable }
    }

    #[test]
    fn test_default_ifs_collapses_and_trims() {
        assert_eq!(split_text("  a   b  ", DEFAULT_IFS), vec!["a", "b"]);
        assert_eq!(split_text("\ta\nb", DEFAULT_IFS), vec!["a", "b"]);
        assert!(split_text("   ", DEFAULT_IFS).is_empty());
    }

    #[test]
    fn test_non_whitespace_ifs_keeps_empty_fields() {
        assert_eq!(split_text("a::b", ":"), vec!["a", "", "b"]);
        assert_eq!(split_text(":a", ":"), vec!["", "a"]);
        assert_eq!(split_text("a:", ":"), vec!["a"]);
        assert_eq!(split_text(" a : b ", " :"), vec!["a", "b"]);
        assert_eq!(split_text("a: :b", " :"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_quoted_segments_join_neighbours() {
        let field = vec![seg("x y", false, true), seg(" q ", true, false), seg("z w", false, true)];
        let words: Vec<String> = split_field(field, DEFAULT_IFS)
            .into_iter()
            .map(|f| f.into_iter().map(|s| s.text).collect())
            .collect();
        assert_eq!(words, vec!["x", "y q z", "w"]);
    }

    #[test]
    fn test_quoted_empty_survives() {
        assert_eq!(split_field(vec![seg("", true, false)], DEFAULT_IFS).len(), 1);
        assert!(split_field(vec![seg("", false, true)], DEFAULT_IFS).is_empty());
        assert_eq!(split_field(vec![seg("a b", false, true)], "").len(), 1);
    }

    #[test]
    fn test_split_for_read() {
        assert_eq!(split_for_read("  one two  three  ", DEFAULT_IFS, 2), vec!["one", "two  three"]);
        assert_eq!(split_for_read("a:b:c", ":", 2), vec!["a", "b:c"]);
        assert_eq!(split_for_read("a b", DEFAULT_IFS, 3), vec!["a", "b"]);
        assert_eq!(split_for_read("x", DEFAULT_IFS, 1), vec!["x"]);
    }

    proptest! {
        #[test]
        fn prop_default_ifs_matches_whitespace_split(s in "[ a-c\t\n]{0,24}") {
            let expected: Vec<String> = s.split_whitespace().map(String::from).collect();
            prop_assert_eq!(split_text(&s, DEFAULT_IFS), expected);
        }
    }
}
