//! Abbreviation Expander for TTS
//!
//! Expands technical abbreviations into the form a synthesizer reads out
//! clearly. Matching is case-insensitive and whole-word only, so "VPN"
//! and "vpn" both become "V P N" while "VPNs" is left alone.

use once_cell::sync::Lazy;
use regex::Regex;

/// Abbreviations with their spoken forms
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Wi-Fi", "wifi"),
    ("VPN", "V P N"),
    ("URL", "U R L"),
    ("IP", "I P"),
    ("SSID", "S S I D"),
];

static COMPILED: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    ABBREVIATIONS
        .iter()
        .map(|(abbrev, spoken)| (whole_word_pattern(abbrev), *spoken))
        .collect()
});

fn whole_word_pattern(abbrev: &str) -> Regex {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(abbrev));
    Regex::new(&pattern).expect("escaped abbreviation is a valid pattern")
}

/// Abbreviation expander for TTS
pub struct AbbreviationExpander {
    /// Additional custom abbreviations, applied after the built-in table
    custom: Vec<(Regex, String)>,
}

impl AbbreviationExpander {
    pub fn new() -> Self {
        Self { custom: Vec::new() }
    }

    /// Add custom abbreviation
    pub fn add_abbreviation(&mut self, abbrev: &str, expansion: &str) {
        self.custom
            .push((whole_word_pattern(abbrev), expansion.to_string()));
    }

    /// Expand abbreviations in text
    pub fn expand(&self, text: &str) -> String {
        let mut result = text.to_string();

        for (re, spoken) in COMPILED.iter() {
            result = re.replace_all(&result, *spoken).into_owned();
        }

        for (re, spoken) in &self.custom {
            result = re.replace_all(&result, spoken.as_str()).into_owned();
        }

        result
    }
}

impl Default for AbbreviationExpander {
    fn default() -> Self {
        Self::new()
    }
}
