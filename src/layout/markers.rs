//! Marker recognition: footnote markers, citations and list markers.

use std::sync::OnceLock;

use regex::Regex;

/// Symbols used as footnote markers, in conventional order.
pub const FOOTNOTE_SYMBOLS: [char; 7] = ['*', '†', '‡', '§', '¶', '‖', '#'];

/// A recognised marker label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerLabel {
    /// Numbered marker (document scope)
    Numeral(String),
    /// Symbol marker (page scope)
    Symbol(String),
}

impl MarkerLabel {
    /// The label text.
    pub fn as_str(&self) -> &str {
        match self {
            MarkerLabel::Numeral(s) | MarkerLabel::Symbol(s) => s,
        }
    }
}

/// A superscript marker attached to the end of a word (`result¹`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedMarker<'t> {
    /// Text before the marker
    pub before: &'t str,
    /// The marker characters as written
    pub marker: &'t str,
    /// Trailing punctuation after the marker
    pub after: &'t str,
    /// Normalized numeral label
    pub label: String,
}

/// Map a Unicode superscript digit to its ASCII digit.
fn superscript_digit(c: char) -> Option<char> {
    match c {
        '⁰' => Some('0'),
        '¹' => Some('1'),
        '²' => Some('2'),
        '³' => Some('3'),
        '⁴' => Some('4'),
        '⁵' => Some('5'),
        '⁶' => Some('6'),
        '⁷' => Some('7'),
        '⁸' => Some('8'),
        '⁹' => Some('9'),
        _ => None,
    }
}

/// Label of a token made only of superscript digits (`¹²` → `12`).
pub fn superscript_label(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.chars().map(superscript_digit).collect()
}

/// Split a word carrying trailing superscript digits.
pub fn attached_superscript(text: &str) -> Option<AttachedMarker<'_>> {
    let trimmed = text.trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | ')'));
    let after = &text[trimmed.len()..];
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| superscript_digit(*c).is_some())
        .last()
        .map(|(i, _)| i)?;
    if start == 0 {
        return None;
    }
    let marker = &trimmed[start..];
    Some(AttachedMarker {
        before: &trimmed[..start],
        marker,
        after,
        label: superscript_label(marker)?,
    })
}

/// Label of a symbol marker (`*`, `**`, `†`).
pub fn symbol_label(text: &str) -> Option<String> {
    let text = text.trim();
    let first = text.chars().next()?;
    if FOOTNOTE_SYMBOLS.contains(&first) && text.chars().all(|c| c == first) && text.chars().count() <= 3 {
        Some(text.to_string())
    } else {
        None
    }
}

/// Label of a short plain numeral (`3`, `12`), as used by small-font markers.
pub fn numeral_label(text: &str) -> Option<String> {
    let text = text.trim();
    if !text.is_empty() && text.len() <= 3 && text.chars().all(|c| c.is_ascii_digit()) {
        Some(text.trim_start_matches('0').to_string()).filter(|s| !s.is_empty())
    } else {
        None
    }
}

fn citation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(\d{1,3}(?:\s*[,–—-]\s*\d{1,3})*)\][.,;:)]*$").expect("static regex")
    })
}

/// Numbers cited by a bracket citation (`[3]`, `[1,2]`, `[4–6]`).
pub fn citation_labels(text: &str) -> Option<Vec<String>> {
    let caps = citation_regex().captures(text.trim())?;
    let inner = caps.get(1)?.as_str();

    let mut labels = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        let bounds: Vec<&str> = part.split(['–', '—', '-']).map(str::trim).collect();
        match bounds.as_slice() {
            [single] => labels.push(single.parse::<u32>().ok()?.to_string()),
            [start, end] => {
                let start: u32 = start.parse().ok()?;
                let end: u32 = end.parse().ok()?;
                if end < start || end - start > 50 {
                    labels.push(start.to_string());
                    labels.push(end.to_string());
                } else {
                    labels.extend((start..=end).map(|n| n.to_string()));
                }
            }
            _ => return None,
        }
    }
    Some(labels)
}

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\[(\d{1,3})\]|(\d{1,3})\.)$").expect("static regex"))
}

/// Label of a reference-list entry marker (`[12]` or `12.`).
pub fn reference_label(text: &str) -> Option<String> {
    let caps = reference_regex().captures(text.trim())?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Marker at the start of a footnote body (`¹`, `1`, `1.`, `*`, `†Note`).
pub fn footnote_body_label(text: &str) -> Option<MarkerLabel> {
    let text = text.trim();
    if let Some(label) = superscript_label(text) {
        return Some(MarkerLabel::Numeral(label));
    }
    if let Some(label) = symbol_label(text) {
        return Some(MarkerLabel::Symbol(label));
    }
    let bare = text.trim_end_matches(['.', ')']);
    if let Some(label) = numeral_label(bare) {
        return Some(MarkerLabel::Numeral(label));
    }
    if let Some(label) = reference_label(text) {
        return Some(MarkerLabel::Numeral(label));
    }
    // marker glued to the first word
    let first = text.chars().next()?;
    if let Some(digit) = superscript_digit(first) {
        let label: String = std::iter::once(digit)
            .chain(text.chars().skip(1).map_while(superscript_digit))
            .collect();
        return Some(MarkerLabel::Numeral(label));
    }
    if FOOTNOTE_SYMBOLS.contains(&first) && text.chars().nth(1).is_some_and(char::is_alphanumeric) {
        return Some(MarkerLabel::Symbol(first.to_string()));
    }
    None
}

fn caption_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?i:table|fig\.?|figure)\s*[0-9IVX]+[.:]?").expect("static regex")
    })
}

/// Check if text opens a figure or table caption.
pub fn is_caption(text: &str) -> bool {
    caption_regex().is_match(text.trim_start())
}

/// Check if a caption introduces a table.
pub fn is_table_caption(text: &str) -> bool {
    is_caption(text) && text.trim_start().to_lowercase().starts_with("table")
}

/// Check if text is a bullet marker (•, -, etc.).
pub fn is_bullet_marker(text: &str) -> bool {
    let trimmed = text.trim();
    matches!(
        trimmed,
        "-" | "–" | "—" | "•" | "·" | "○" | "▪" | "◦" | "▸" | "▹" | "►" | "■" | "●" | "※" | "□" | "◆" | "◇" | "▶" | "▷" | "➤" | "➜"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
pub fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let prefix = &cleaned[..pos];
        let suffix = &cleaned[pos..];
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }

    // Bare one- or two-digit numbers only; longer ones are data (years, ids)
    if cleaned.len() <= 2 && cleaned.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    let chars: Vec<char> = cleaned.chars().collect();
    chars.len() == 2 && chars[0].is_alphabetic() && (chars[1] == '.' || chars[1] == ')')
}

/// Check if a text string looks like a list marker (number, bullet, etc.).
pub fn is_list_marker(text: &str) -> bool {
    is_bullet_marker(text) || is_number_marker(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superscript_label() {
        assert_eq!(superscript_label("¹"), Some("1".to_string()));
        assert_eq!(superscript_label("¹²"), Some("12".to_string()));
        assert_eq!(superscript_label("1"), None);
        assert_eq!(superscript_label(""), None);
    }

    #[test]
    fn test_attached_superscript() {
        let m = attached_superscript("result¹,").unwrap();
        assert_eq!(m.before, "result");
        assert_eq!(m.marker, "¹");
        assert_eq!(m.after, ",");
        assert_eq!(m.label, "1");

        assert!(attached_superscript("¹").is_none());
        assert!(attached_superscript("plain").is_none());
    }

    #[test]
    fn test_citation_labels() {
        assert_eq!(citation_labels("[3]"), Some(vec!["3".to_string()]));
        assert_eq!(
            citation_labels("[1, 2]."),
            Some(vec!["1".to_string(), "2".to_string()])
        );
        assert_eq!(
            citation_labels("[4–6]"),
            Some(vec!["4".to_string(), "5".to_string(), "6".to_string()])
        );
        assert_eq!(citation_labels("[a]"), None);
        assert_eq!(citation_labels("3"), None);
    }

    #[test]
    fn test_symbol_and_body_labels() {
        assert_eq!(symbol_label("†"), Some("†".to_string()));
        assert_eq!(symbol_label("**"), Some("**".to_string()));
        assert_eq!(symbol_label("*a"), None);

        assert_eq!(footnote_body_label("¹"), Some(MarkerLabel::Numeral("1".into())));
        assert_eq!(footnote_body_label("2."), Some(MarkerLabel::Numeral("2".into())));
        assert_eq!(footnote_body_label("[7]"), Some(MarkerLabel::Numeral("7".into())));
        assert_eq!(footnote_body_label("*"), Some(MarkerLabel::Symbol("*".into())));
        assert_eq!(footnote_body_label("†Corresponding"), Some(MarkerLabel::Symbol("†".into())));
        assert_eq!(footnote_body_label("¹See"), Some(MarkerLabel::Numeral("1".into())));
        assert_eq!(footnote_body_label("Note"), None);
    }

    #[test]
    fn test_reference_label() {
        assert_eq!(reference_label("[12]"), Some("12".to_string()));
        assert_eq!(reference_label("3."), Some("3".to_string()));
        assert_eq!(reference_label("Smith"), None);
    }

    #[test]
    fn test_caption() {
        assert!(is_caption("Table 3: Results"));
        assert!(is_caption("Fig. 2 Overview"));
        assert!(is_caption("Figure 10."));
        assert!(!is_caption("Tables are useful"));
        assert!(is_table_caption("TABLE 1"));
        assert!(!is_table_caption("Figure 1"));
    }

    #[test]
    fn test_is_list_marker() {
        assert!(is_list_marker("1."));
        assert!(is_list_marker("12)"));
        assert!(is_list_marker("a."));
        assert!(is_list_marker("•"));
        assert!(is_list_marker("3"));
        assert!(!is_list_marker("2021"));
        assert!(!is_list_marker("Hello"));
    }
}
