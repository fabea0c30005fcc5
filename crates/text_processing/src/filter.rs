//! Speech-safe response filter
//!
//! Order: markup → disallowed characters → abbreviations → whitespace.
//!
//! Characters are stripped before abbreviations are expanded so that
//! removing a character can never join two halves into a fresh
//! abbreviation on a second pass. Expansions only produce letters and
//! spaces, which keeps the filter idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::simplifier::AbbreviationExpander;

static MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[*_`#]").expect("markup pattern is valid"));

static UNSPEAKABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s.,!?-]").expect("character class is valid"));

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Normalizes generated answers before synthesis
pub struct ResponseFilter {
    expander: AbbreviationExpander,
}

impl ResponseFilter {
    pub fn new() -> Self {
        Self {
            expander: AbbreviationExpander::new(),
        }
    }

    /// Use a custom expander (extra abbreviations on top of the built-in table)
    pub fn with_expander(expander: AbbreviationExpander) -> Self {
        Self { expander }
    }

    /// Pure and deterministic; `filter(filter(x)) == filter(x)`
    pub fn filter(&self, text: &str) -> String {
        let text = MARKUP.replace_all(text, "");
        let text = UNSPEAKABLE.replace_all(&text, "");
        let text = self.expander.expand(&text);
        WHITESPACE.replace_all(&text, " ").trim().to_string()
    }
}

impl Default for ResponseFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_and_abbreviations() {
        let filter = ResponseFilter::new();
        assert_eq!(
            filter.filter("Check your **VPN** and Wi-Fi settings!"),
            "Check your V P N and wifi settings!"
        );
    }

    #[test]
    fn test_strips_unspeakable_characters() {
        let filter = ResponseFilter::new();
        assert_eq!(
            filter.filter("# Steps\n1. Open (settings) -> *Network*\n2. Tap `Reset`"),
            "Steps 1. Open settings - Network 2. Tap Reset"
        );
    }

    #[test]
    fn test_keeps_sentence_punctuation() {
        let filter = ResponseFilter::new();
        assert_eq!(
            filter.filter("Hi, can you hear me? Great. Let's go!"),
            "Hi, can you hear me? Great. Lets go!"
        );
    }

    #[test]
    fn test_collapses_whitespace() {
        let filter = ResponseFilter::new();
        assert_eq!(filter.filter("  too \t many\n\nspaces  "), "too many spaces");
        assert_eq!(filter.filter(""), "");
    }

    #[test]
    fn test_removal_cannot_create_abbreviation() {
        let filter = ResponseFilter::new();
        let once = filter.filter("V@PN and I&P");
        assert_eq!(once, "V P N and I P");
        assert_eq!(filter.filter(&once), once);
    }

    #[test]
    fn test_idempotent() {
        let filter = ResponseFilter::new();
        let samples = [
            "Check your **VPN** and Wi-Fi settings!",
            "Your IP is 10.0.0.1; the SSID is `home_net`.",
            "Visit the URL: https://example.com/help?x=1",
            "___ ** ## ``",
            "Reboot -- then wait 30s... OK?",
            "wi-fi, WI-FI, Wi-Fi-6 and vpn/ip",
            "Ünïcödé text — with “quotes” and emoji 📶",
            "   ",
        ];
        for sample in samples {
            let once = filter.filter(sample);
            assert_eq!(filter.filter(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
