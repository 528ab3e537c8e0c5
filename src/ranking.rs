use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entry::{WordEntry, normalize_word};
use crate::error::Error;

pub const DEFAULT_LIMIT: usize = 10;
const PARALLEL_THRESHOLD: usize = 2048;

/// Counts index-aligned characters that are equal in both strings, up to the
/// shorter length. Callers are expected to normalize both sides first.
pub fn score(query: &str, candidate: &str) -> usize {
    query
        .chars()
        .zip(candidate.chars())
        .filter(|(a, b)| a == b)
        .count()
}

/// A candidate that survived ranking, with its positional score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranked<'a> {
    pub entry: &'a WordEntry,
    pub score: usize,
}

/// Scores every candidate, drops zero scores and returns the best `limit`
/// hits. Equal scores keep their input order.
pub fn rank<'a>(query: &str, candidates: &'a [WordEntry], limit: usize) -> Vec<Ranked<'a>> {
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }
    let scores: Vec<usize> = if candidates.len() >= PARALLEL_THRESHOLD {
        candidates
            .par_iter()
            .map(|entry| score(query, &entry.word))
            .collect()
    } else {
        candidates
            .iter()
            .map(|entry| score(query, &entry.word))
            .collect()
    };
    let mut hits: Vec<Ranked<'a>> = candidates
        .iter()
        .zip(scores)
        .filter(|(_, score)| *score > 0)
        .map(|(entry, score)| Ranked { entry, score })
        .collect();
    // sort_by is stable, which is what keeps ties in repository order.
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits.truncate(limit);
    hits
}

/// Case-insensitive substring filter on `word`. The candidates' order is kept.
pub fn search_by_contains<'a>(
    query: &str,
    candidates: &'a [WordEntry],
    limit: usize,
) -> Vec<&'a WordEntry> {
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    candidates
        .iter()
        .filter(|entry| entry.word.to_lowercase().contains(&needle))
        .take(limit)
        .collect()
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStrategy {
    PositionalSimilarity,
    #[default]
    SubstringMatch,
}

impl SearchStrategy {
    pub fn query_value(&self) -> &'static str {
        match self {
            SearchStrategy::PositionalSimilarity => "positional-similarity",
            SearchStrategy::SubstringMatch => "substring-match",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

impl FromStr for SearchStrategy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positional-similarity" | "positional" | "similarity" => {
                Ok(SearchStrategy::PositionalSimilarity)
            }
            "substring-match" | "substring" | "contains" => Ok(SearchStrategy::SubstringMatch),
            other => Err(Error::validation(format!(
                "unknown search mode {other:?}; expected positional-similarity or substring-match"
            ))),
        }
    }
}

/// A hit returned by [`SearchConfig::apply`]. `score` is only present for the
/// positional strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub entry: WordEntry,
    pub score: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub strategy: SearchStrategy,
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::default(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SearchConfig {
    pub fn new(strategy: SearchStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Normalizes the raw query and runs the configured strategy over
    /// `candidates`. A blank query yields no hits.
    pub fn apply(&self, raw_query: &str, candidates: &[WordEntry]) -> Vec<SearchHit> {
        let query = normalize_word(raw_query);
        match self.strategy {
            SearchStrategy::PositionalSimilarity => rank(&query, candidates, self.limit)
                .into_iter()
                .map(|hit| SearchHit {
                    entry: hit.entry.clone(),
                    score: Some(hit.score),
                })
                .collect(),
            SearchStrategy::SubstringMatch => search_by_contains(&query, candidates, self.limit)
                .into_iter()
                .map(|entry| SearchHit {
                    entry: entry.clone(),
                    score: None,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(id: &str, word: &str) -> WordEntry {
        WordEntry {
            id: id.to_string(),
            word: word.to_string(),
            definition: format!("definition of {word}"),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn words(hits: &[Ranked<'_>]) -> Vec<String> {
        hits.iter().map(|hit| hit.entry.word.clone()).collect()
    }

    #[test]
    fn score_counts_aligned_matches() {
        assert_eq!(score("cat", "cot"), 2);
        assert_eq!(score("cat", "tac"), 0);
        assert_eq!(score("", "anything"), 0);
        assert_eq!(score("anything", ""), 0);
    }

    #[test]
    fn identical_strings_score_their_length() {
        for q in ["a", "ephemeral", "zeitgeist", "naïve"] {
            assert_eq!(score(q, q), q.chars().count());
        }
    }

    #[test]
    fn score_truncates_at_shorter_string() {
        assert_eq!(score("catalogue", "cat"), 3);
        assert_eq!(score("ca", "catalogue"), 2);
    }

    #[test]
    fn rank_drops_zero_scores_and_sorts_descending() {
        let candidates = vec![
            entry("1", "dog"),
            entry("2", "cot"),
            entry("3", "cat"),
            entry("4", "tac"),
        ];
        let hits = rank("cat", &candidates, DEFAULT_LIMIT);
        assert_eq!(words(&hits), vec!["cat", "cot"]);
        assert_eq!(hits[0].score, 3);
        assert!(hits.iter().all(|hit| hit.score > 0));
    }

    #[test]
    fn rank_keeps_input_order_for_ties() {
        let candidates = vec![entry("1", "cab"), entry("2", "car"), entry("3", "can")];
        let hits = rank("cat", &candidates, DEFAULT_LIMIT);
        assert_eq!(words(&hits), vec!["cab", "car", "can"]);
    }

    #[test]
    fn rank_caps_results() {
        let candidates: Vec<_> = (0..25)
            .map(|i| entry(&i.to_string(), &format!("word{i}")))
            .collect();
        let hits = rank("word", &candidates, DEFAULT_LIMIT);
        assert_eq!(hits.len(), DEFAULT_LIMIT);
    }

    #[test]
    fn rank_parallel_path_matches_sequential_order() {
        let candidates: Vec<_> = (0..PARALLEL_THRESHOLD + 10)
            .map(|i| entry(&i.to_string(), if i % 2 == 0 { "cat" } else { "cot" }))
            .collect();
        let hits = rank("cat", &candidates, 3);
        let ids: Vec<_> = hits.iter().map(|hit| hit.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "2", "4"]);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let candidates = vec![entry("1", "cat")];
        assert!(rank("", &candidates, DEFAULT_LIMIT).is_empty());
        assert!(search_by_contains("", &candidates, DEFAULT_LIMIT).is_empty());
        assert!(SearchConfig::default().apply("   ", &candidates).is_empty());
    }

    #[test]
    fn contains_is_case_insensitive_and_keeps_order() {
        let candidates = vec![
            entry("1", "scatter"),
            entry("2", "dog"),
            entry("3", "cat"),
            entry("4", "Catalogue"),
        ];
        let hits = search_by_contains("CAT", &candidates, DEFAULT_LIMIT);
        let ids: Vec<_> = hits.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
        assert_eq!(search_by_contains("cat", &candidates, 2).len(), 2);
    }

    #[test]
    fn config_normalizes_query_before_scoring() {
        let candidates = vec![entry("1", "cat"), entry("2", "tac")];
        let hits =
            SearchConfig::new(SearchStrategy::PositionalSimilarity).apply("  CAT ", &candidates);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, Some(3));
        let substring = SearchConfig::new(SearchStrategy::SubstringMatch).apply("A", &candidates);
        assert_eq!(substring.len(), 2);
        assert!(substring.iter().all(|hit| hit.score.is_none()));
    }

    #[test]
    fn strategy_round_trips_through_text() {
        for strategy in [
            SearchStrategy::PositionalSimilarity,
            SearchStrategy::SubstringMatch,
        ] {
            assert_eq!(strategy.to_string().parse::<SearchStrategy>().unwrap(), strategy);
        }
        let json = serde_json::to_string(&SearchStrategy::PositionalSimilarity).unwrap();
        assert_eq!(json, "\"positional-similarity\"");
        assert!("levenshtein".parse::<SearchStrategy>().is_err());
    }
}
