//! Fuzzy matching of free text against the ingredient vocabulary.
//!
//! Similarity is the Sørensen–Dice coefficient over character bigrams with
//! whitespace ignored, so `"oatmilk"` and `"oat milk"` score 1.0. A match is
//! accepted only at or above the configured threshold; below it the input is
//! treated as unknown.

use std::collections::HashSet;

use strsim::sorensen_dice;

use crate::config::MatchingConfig;
use crate::vocabulary::Vocabulary;

/// Default acceptance threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.77;

/// Default cap on the number of matched substitutes.
pub const DEFAULT_MAX_MATCHES: usize = 10;

/// A vocabulary name together with its similarity to the input.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    /// Lower-cased canonical name.
    pub name: String,
    /// Dice similarity in `[0, 1]`.
    pub score: f64,
}

/// Threshold-gated fuzzy matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatcher {
    threshold: f64,
    max_matches: usize,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_MAX_MATCHES)
    }
}

impl FuzzyMatcher {
    /// Create a matcher with an explicit threshold and result cap.
    #[must_use]
    pub fn new(threshold: f64, max_matches: usize) -> Self {
        Self {
            threshold,
            max_matches,
        }
    }

    /// Create a matcher from the `[matching]` config section.
    #[must_use]
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(config.threshold, config.max_matches)
    }

    /// Acceptance threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Result cap for [`match_substitutes`](Self::match_substitutes).
    #[must_use]
    pub fn max_matches(&self) -> usize {
        self.max_matches
    }

    /// Best-scoring vocabulary name regardless of threshold.
    ///
    /// Ties keep the earliest name in vocabulary order.
    #[must_use]
    pub fn best_match(&self, vocabulary: &Vocabulary, input: &str) -> Option<BestMatch> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let mut best: Option<BestMatch> = None;
        for name in vocabulary.names() {
            let score = sorensen_dice(&needle, name);
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(BestMatch {
                    name: name.clone(),
                    score,
                });
            }
        }
        best
    }

    /// Closest vocabulary name if it scores at least the threshold.
    #[must_use]
    pub fn find_closest_match(&self, vocabulary: &Vocabulary, input: &str) -> Option<String> {
        self.best_match(vocabulary, input)
            .filter(|m| m.score >= self.threshold)
            .map(|m| m.name)
    }

    /// Match each raw name, keeping first-seen order without duplicates, capped
    /// at [`max_matches`](Self::max_matches).
    #[must_use]
    pub fn match_substitutes<S: AsRef<str>>(&self, vocabulary: &Vocabulary, raw_names: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        for raw in raw_names {
            if matches.len() >= self.max_matches {
                break;
            }
            if let Some(name) = self.find_closest_match(vocabulary, raw.as_ref()) {
                if seen.insert(name.clone()) {
                    matches.push(name);
                }
            }
        }
        matches
    }
}
