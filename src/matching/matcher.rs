use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::directory::DirectoryEntry;
use super::normalize::{name_tokens, normalize_name};

/// Threshold and token length are tuned on the municipal phone list and are
/// not expected to carry over to other naming conventions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub threshold: f64,
    pub min_token_len: usize,
    pub substring_bonus: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            min_token_len: 2,
            substring_bonus: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a> {
    pub target: String,
    pub entry: Option<&'a DirectoryEntry>,
    pub best_score: f64,
}

impl MatchResult<'_> {
    pub fn phone(&self) -> &str {
        self.entry.map(|entry| entry.phone.as_str()).unwrap_or("")
    }

    /// Score of the accepted entry; `None` when nothing cleared the threshold.
    pub fn accepted_score(&self) -> Option<f64> {
        self.entry.map(|_| self.best_score)
    }
}

#[derive(Debug, Clone)]
pub struct FuzzyMatcher<'a> {
    entries: &'a [DirectoryEntry],
    config: MatchConfig,
}

impl<'a> FuzzyMatcher<'a> {
    pub fn new(entries: &'a [DirectoryEntry], config: MatchConfig) -> Self {
        Self { entries, config }
    }

    /// Token overlap over the larger token set, plus a bonus when either
    /// normalized name contains the other.
    pub fn score(
        &self,
        target_normalized: &str,
        target_tokens: &BTreeSet<String>,
        entry: &DirectoryEntry,
    ) -> f64 {
        if target_tokens.is_empty() || entry.tokens.is_empty() {
            return 0.0;
        }

        let overlap = target_tokens.intersection(&entry.tokens).count();
        let denominator = entry.tokens.len().max(target_tokens.len());
        let mut score = overlap as f64 / denominator as f64;

        if entry.normalized_name.contains(target_normalized)
            || target_normalized.contains(entry.normalized_name.as_str())
        {
            score += self.config.substring_bonus;
        }

        score
    }

    /// Highest scoring entry in directory order; the first entry to reach the
    /// maximum wins ties.
    pub fn best_match(&self, target: &str) -> MatchResult<'a> {
        let target_normalized = normalize_name(target);
        let target_tokens = name_tokens(&target_normalized, self.config.min_token_len);

        let mut best: Option<&'a DirectoryEntry> = None;
        let mut best_score = 0.0_f64;

        if !target_tokens.is_empty() {
            for entry in self.entries {
                if entry.tokens.is_empty() {
                    continue;
                }

                let score = self.score(&target_normalized, &target_tokens, entry);
                if score > best_score {
                    best_score = score;
                    best = Some(entry);
                }
            }
        }

        MatchResult {
            target: target.to_string(),
            entry: best.filter(|_| best_score >= self.config.threshold),
            best_score,
        }
    }
}
