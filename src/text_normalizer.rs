//! Pure canonicalization of transcript/reference text before scoring.
//!
//! Applied identically to ASR transcripts and subtitle slices — this is the contract that
//! makes `min_confidence` portable across ASR backends.

use regex::Regex;
use std::sync::LazyLock;

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*?\]|<.*?>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Lowercases, strips bracketed scene/HI markers, collapses stutters (`X-X-X` -> `X`),
/// and collapses whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let trimmed = lowered.trim();
    let no_brackets = BRACKETED.replace_all(trimmed, "");
    let no_stutter = collapse_stutter(&no_brackets);
    WHITESPACE
        .replace_all(no_stutter.trim(), " ")
        .trim()
        .to_string()
}

/// Collapses runs of the form `X-X(-X)*` (the same letter repeated, dash-separated) down
/// to a single `X`. Written as a manual scan rather than a regex: `regex` has no
/// backreference support, so `([A-Za-z])-\1+` can't express "the same letter again".
fn collapse_stutter(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let mut j = i + 1;
        if c.is_ascii_alphabetic() {
            while j + 1 < chars.len() && chars[j] == '-' && chars[j + 1] == c {
                j += 2;
            }
        }
        out.push(c);
        i = if j > i + 1 { j } else { i + 1 };
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(normalize("  Hello World  "), "hello world");
    }

    #[test]
    fn strips_bracketed_markers() {
        assert_eq!(normalize("[music playing] hello <i>there</i>"), "hello");
    }

    #[test]
    fn collapses_stutter() {
        assert_eq!(normalize("w-w-walter white"), "walter white");
    }

    #[test]
    fn leaves_non_stutter_hyphenation_alone() {
        assert_eq!(collapse_stutter("well-known say-so"), "well-known say-so");
    }

    #[test]
    fn collapse_stutter_handles_longer_runs() {
        assert_eq!(collapse_stutter("n-n-n-no way"), "no way");
    }

    #[test]
    fn leaves_non_letter_dash_runs_alone() {
        assert_eq!(normalize("room 1-1-1"), "room 1-1-1");
        assert_eq!(collapse_stutter("case a-1-1"), "case a-1-1");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("hello    my\tname"), "hello my name");
    }

    #[test]
    fn is_idempotent() {
        let input = "  [Intro music] W-w-walter   White <i>says</i> hi  ";
        let once = normalize(input);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }
}
