//! Filename sanitization for titles coming from remote metadata.

use once_cell::sync::Lazy;
use regex::Regex;

// \ / : * ? " < > | and ASCII control characters
static INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1F]"#).expect("invalid filename charset regex"));

/// Strip every character that is illegal in a filesystem path name.
///
/// Pure and idempotent; does not truncate. The result may be empty when the
/// input consists entirely of illegal characters, so callers needing a
/// non-empty name must supply their own fallback.
pub fn sanitize_filename(input: &str) -> String {
    INVALID_CHARS.replace_all(input, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_reserved_characters() {
        assert_eq!(sanitize_filename(r#"a\b/c:d*e?f"g<h>i|j"#), "abcdefghij");
    }

    #[test]
    fn strips_control_characters() {
        let input: String = (0x00u8..0x20).map(|b| b as char).chain("ok".chars()).collect();
        assert_eq!(sanitize_filename(&input), "ok");
    }

    #[test]
    fn idempotent() {
        for s in ["", "plain", r#"we/ird:*name?"#, "tab\there", "ünïcode — ok"] {
            let once = sanitize_filename(s);
            assert_eq!(sanitize_filename(&once), once);
        }
    }

    #[test]
    fn leaves_legal_names_untouched() {
        assert_eq!(sanitize_filename("Some Song (Official Video) [HD]"), "Some Song (Official Video) [HD]");
    }

    #[test]
    fn preserves_unicode() {
        assert_eq!(sanitize_filename("日本語タイトル"), "日本語タイトル");
    }

    #[test]
    fn can_sanitize_to_empty() {
        assert_eq!(sanitize_filename("???///"), "");
    }
}
