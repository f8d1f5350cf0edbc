/// Field label formatting.
///
/// Machine-style ASCII keys (`document_id`) are humanized into `Document Id`.
/// Keys carrying any non-ASCII or CJK character are shown verbatim so literal
/// Chinese field names survive untouched.
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PRINTABLE_ASCII_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\x20-\x7E]+$").expect("valid regex"));
static CJK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x{4e00}-\x{9fff}]").expect("valid regex"));
static WORD_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w").expect("valid regex"));

pub fn format_label(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    if !PRINTABLE_ASCII_RE.is_match(key) || CJK_RE.is_match(key) {
        return key.to_string();
    }
    let spaced = key.replace('_', " ");
    WORD_START_RE
        .replace_all(&spaced, |caps: &Captures| caps[0].to_uppercase())
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanizes_snake_case() {
        assert_eq!(format_label("document_id"), "Document Id");
        assert_eq!(format_label("source_reference"), "Source Reference");
        assert_eq!(format_label("risk"), "Risk");
    }

    #[test]
    fn only_word_starts_change_case() {
        assert_eq!(format_label("camelCase"), "CamelCase");
        assert_eq!(format_label("ECN_no"), "ECN No");
        assert_eq!(format_label("step-2 owner"), "Step-2 Owner");
    }

    #[test]
    fn cjk_and_non_ascii_keys_are_kept() {
        assert_eq!(format_label("標題"), "標題");
        assert_eq!(format_label("負責_人"), "負責_人");
        assert_eq!(format_label("café_menu"), "café_menu");
    }

    #[test]
    fn empty_key() {
        assert_eq!(format_label(""), "");
    }
}
