//! Weighted token index over an entry's title, body text and tags.
//!
//! Each entry carries one [`SearchIndex`]: every distinct token mapped to the
//! set of zones it occurs in. Ranking sums zone weights per matched query term
//! without tokenizing the entry again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Title,
    Body,
    Tags,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Title, Zone::Body, Zone::Tags];

    pub fn bit(self) -> u8 {
        match self {
            Zone::Title => 0b001,
            Zone::Body => 0b010,
            Zone::Tags => 0b100,
        }
    }

    pub fn weight(self) -> u32 {
        match self {
            Zone::Title => 10,
            Zone::Body => 4,
            Zone::Tags => 2,
        }
    }
}

/// Sum of the weights of every zone present in `mask`.
pub fn mask_weight(mask: u8) -> u32 {
    Zone::ALL
        .iter()
        .filter(|z| mask & z.bit() != 0)
        .map(|z| z.weight())
        .sum()
}

/// Upper bound on the serialized size of one entry's index.
pub const MAX_INDEX_BYTES: usize = 1_048_575;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("search index too large ({0} bytes, max {MAX_INDEX_BYTES})")]
    TooLarge(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub tokens: BTreeMap<String, u8>,
}

impl SearchIndex {
    pub fn build(title: &str, body_text: &str, tags: &str) -> Self {
        let mut tokens = BTreeMap::new();
        for (zone, text) in [(Zone::Title, title), (Zone::Body, body_text), (Zone::Tags, tags)] {
            for token in tokenize(text) {
                *tokens.entry(token).or_insert(0u8) |= zone.bit();
            }
        }
        SearchIndex { tokens }
    }

    pub fn try_build(title: &str, body_text: &str, tags: &str) -> Result<Self, IndexError> {
        let index = Self::build(title, body_text, tags);
        let size = index.approx_bytes();
        if size > MAX_INDEX_BYTES {
            return Err(IndexError::TooLarge(size));
        }
        Ok(index)
    }

    /// Size of the JSON form: `"token":N,` per entry plus the wrapper.
    pub fn approx_bytes(&self) -> usize {
        self.tokens.keys().map(|t| t.len() + 5).sum::<usize>() + 13
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Zones in which some token starts with `term` (already lower-cased).
    pub fn prefix_zones(&self, term: &str) -> u8 {
        if term.is_empty() {
            return 0;
        }
        self.tokens
            .range(term.to_string()..)
            .take_while(|(token, _)| token.starts_with(term))
            .fold(0u8, |acc, (_, mask)| acc | mask)
    }

    /// Weighted prefix score, or `None` unless every term prefixes some token.
    pub fn prefix_score(&self, terms: &[String]) -> Option<u32> {
        if terms.is_empty() {
            return None;
        }
        let mut score = 0;
        for term in terms {
            let zones = self.prefix_zones(term);
            if zones == 0 {
                return None;
            }
            score += mask_weight(zones);
        }
        Some(score)
    }
}

/// Lower-cases one char at a time, with final sigma folded to `σ`.
///
/// There is no context rule, so a folded string lines up with its source char
/// by char. Every case-insensitive comparison in search goes through this.
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(fold_char).collect()
}

pub fn fold_char(c: char) -> impl Iterator<Item = char> {
    c.to_lowercase().map(|l| if l == 'ς' { 'σ' } else { l })
}

/// Splits on anything that is not alphanumeric and folds case. No stemming.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(fold_case)
}

/// Whitespace-delimited, case-folded query terms.
pub fn query_terms(text: &str) -> Vec<String> {
    text.split_whitespace().map(fold_case).collect()
}
