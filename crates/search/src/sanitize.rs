//! Query sanitization for the search backend.
//!
//! Every user-influenced string that reaches the backend's query language
//! goes through [`sanitize_query`] first.

/// Characters with structural meaning in GraphQL / filter expressions.
const STRUCTURAL_CHARS: &[char] = &[
    '"', '\'', '{', '}', '[', ']', '\\', '<', '>', '|', '&', ';', '`',
];

/// Strip control and structural characters and collapse whitespace.
///
/// A structural character is deleted outright unless it sits between two
/// alphanumerics, where it becomes a word break (`a|b` -> `a b`). Apostrophes
/// inside words are always deleted so contractions stay one keyword.
/// Control characters become spaces, then runs of whitespace collapse.
pub fn sanitize_query(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut cleaned = String::with_capacity(raw.len());

    for (i, &c) in chars.iter().enumerate() {
        if c.is_control() {
            cleaned.push(' ');
        } else if STRUCTURAL_CHARS.contains(&c) {
            if c != '\'' && joins_words(&chars, i) {
                cleaned.push(' ');
            }
        } else {
            cleaned.push(c);
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn joins_words(chars: &[char], i: usize) -> bool {
    let before = i.checked_sub(1).and_then(|j| chars.get(j));
    let after = chars.get(i + 1);
    matches!((before, after), (Some(b), Some(a)) if b.is_alphanumeric() && a.is_alphanumeric())
}
