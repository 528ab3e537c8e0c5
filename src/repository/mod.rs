//! Word storage behind a single capability trait.
//!
//! Backends differ only in where entries live; normalization, duplicate
//! handling and the search strategies behave the same for all of them.

mod memory;
mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

use serde::{Deserialize, Serialize};

use crate::entry::{NewEntry, WordEntry};
use crate::error::Result;
use crate::ranking::{SearchConfig, SearchHit};

/// Result of a bulk insert. Duplicates are skipped, so `inserted` may be
/// smaller than the number of submitted entries (possibly zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateOutcome {
    pub inserted: usize,
}

pub trait WordRepository: Send + Sync {
    /// Normalizes and stores `entries`, skipping any `(word, definition)` pair
    /// that already exists. Invalid entries reject the batch before any write.
    fn create(&self, entries: &[NewEntry]) -> Result<CreateOutcome>;

    /// Runs `config`'s strategy. A blank query returns no hits.
    fn search(&self, query: &str, config: &SearchConfig) -> Result<Vec<SearchHit>>;

    /// Newest entries first.
    fn list_recent(&self, limit: usize) -> Result<Vec<WordEntry>>;

    /// Every entry ordered by word.
    fn list_all(&self) -> Result<Vec<WordEntry>>;

    /// Bulk fetch in no particular order. Unknown ids are left out.
    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<WordEntry>>;

    /// Removes an entry, returning whether it existed.
    fn delete(&self, id: &str) -> Result<bool>;

    fn get(&self, id: &str) -> Result<Option<WordEntry>> {
        Ok(self.get_by_ids(&[id.to_string()])?.into_iter().next())
    }
}

impl<R: WordRepository + ?Sized> WordRepository for std::sync::Arc<R> {
    fn create(&self, entries: &[NewEntry]) -> Result<CreateOutcome> {
        (**self).create(entries)
    }

    fn search(&self, query: &str, config: &SearchConfig) -> Result<Vec<SearchHit>> {
        (**self).search(query, config)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<WordEntry>> {
        (**self).list_recent(limit)
    }

    fn list_all(&self) -> Result<Vec<WordEntry>> {
        (**self).list_all()
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<Vec<WordEntry>> {
        (**self).get_by_ids(ids)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        (**self).delete(id)
    }

    fn get(&self, id: &str) -> Result<Option<WordEntry>> {
        (**self).get(id)
    }
}

fn validate_batch(entries: &[NewEntry]) -> Result<Vec<NewEntry>> {
    entries.iter().map(NewEntry::validated).collect()
}

#[cfg(test)]
mod tests {
    //! Behaviour every backend has to share.

    use super::*;
    use crate::ranking::SearchStrategy;

    fn backends() -> Vec<(&'static str, Box<dyn WordRepository>)> {
        vec![
            ("memory", Box::new(MemoryRepository::new())),
            (
                "sqlite",
                Box::new(SqliteRepository::open_in_memory().expect("in-memory sqlite")),
            ),
        ]
    }

    fn seed(repo: &dyn WordRepository, pairs: &[(&str, &str)]) {
        let entries: Vec<_> = pairs.iter().map(|(w, d)| NewEntry::new(*w, *d)).collect();
        repo.create(&entries).expect("seed entries");
    }

    #[test]
    fn bulk_create_skips_duplicates() {
        for (name, repo) in backends() {
            seed(repo.as_ref(), &[("w1", "d1")]);
            let outcome = repo
                .create(&[
                    NewEntry::new("w1", "d1"),
                    NewEntry::new("W1 ", " d1"),
                    NewEntry::new("w2", "d2"),
                ])
                .expect(name);
            assert_eq!(outcome.inserted, 1, "{name}");
            assert_eq!(repo.list_all().unwrap().len(), 2, "{name}");
        }
    }

    #[test]
    fn same_word_with_new_definition_is_not_a_duplicate() {
        for (name, repo) in backends() {
            let outcome = repo
                .create(&[NewEntry::new("bank", "river side"), NewEntry::new("bank", "money")])
                .unwrap();
            assert_eq!(outcome.inserted, 2, "{name}");
        }
    }

    #[test]
    fn invalid_entry_rejects_batch_before_writing() {
        for (name, repo) in backends() {
            let err = repo
                .create(&[NewEntry::new("good", "fine"), NewEntry::new("  ", "blank")])
                .unwrap_err();
            assert!(err.is_client_error(), "{name}");
            assert!(repo.list_all().unwrap().is_empty(), "{name}");
        }
    }

    #[test]
    fn create_normalizes_input() {
        for (name, repo) in backends() {
            seed(repo.as_ref(), &[("  Serendipity ", "  happy accident ")]);
            let all = repo.list_all().unwrap();
            assert_eq!(all[0].word, "serendipity", "{name}");
            assert_eq!(all[0].definition, "happy accident", "{name}");
            assert!(!all[0].id.is_empty(), "{name}");
        }
    }

    #[test]
    fn list_all_orders_by_word() {
        for (name, repo) in backends() {
            seed(repo.as_ref(), &[("pear", "p"), ("apple", "a"), ("mango", "m")]);
            let words: Vec<_> = repo.list_all().unwrap().into_iter().map(|e| e.word).collect();
            assert_eq!(words, vec!["apple", "mango", "pear"], "{name}");
        }
    }

    #[test]
    fn list_recent_is_newest_first_and_bounded() {
        for (name, repo) in backends() {
            for i in 0..12 {
                seed(repo.as_ref(), &[(&format!("word{i:02}"), "d")]);
            }
            let recent = repo.list_recent(10).unwrap();
            assert_eq!(recent.len(), 10, "{name}");
            assert_eq!(recent[0].word, "word11", "{name}");
            assert_eq!(recent[9].word, "word02", "{name}");
        }
    }

    #[test]
    fn get_by_ids_omits_unknown_ids() {
        for (name, repo) in backends() {
            seed(repo.as_ref(), &[("alpha", "a"), ("beta", "b")]);
            let all = repo.list_all().unwrap();
            let ids = vec![all[1].id.clone(), "missing".to_string(), all[0].id.clone()];
            let mut found: Vec<_> = repo
                .get_by_ids(&ids)
                .unwrap()
                .into_iter()
                .map(|e| e.word)
                .collect();
            found.sort();
            assert_eq!(found, vec!["alpha", "beta"], "{name}");
            assert!(repo.get_by_ids(&[]).unwrap().is_empty(), "{name}");
            assert!(repo.get("missing").unwrap().is_none(), "{name}");
        }
    }

    #[test]
    fn delete_removes_entry() {
        for (name, repo) in backends() {
            seed(repo.as_ref(), &[("alpha", "a")]);
            let id = repo.list_all().unwrap()[0].id.clone();
            assert!(repo.delete(&id).unwrap(), "{name}");
            assert!(!repo.delete(&id).unwrap(), "{name}");
            assert!(repo.get(&id).unwrap().is_none(), "{name}");
        }
    }

    #[test]
    fn substring_search_is_alphabetical_and_capped() {
        for (name, repo) in backends() {
            let pairs: Vec<(String, String)> = (0..15)
                .rev()
                .map(|i| (format!("cat{i:02}"), "d".to_string()))
                .collect();
            let entries: Vec<_> = pairs.iter().map(|(w, d)| NewEntry::new(w, d)).collect();
            repo.create(&entries).unwrap();
            seed(repo.as_ref(), &[("dog", "d")]);
            let hits = repo
                .search("CAT", &SearchConfig::new(SearchStrategy::SubstringMatch))
                .unwrap();
            assert_eq!(hits.len(), 10, "{name}");
            assert_eq!(hits[0].entry.word, "cat00", "{name}");
            assert_eq!(hits[9].entry.word, "cat09", "{name}");
        }
    }

    #[test]
    fn positional_search_ranks_by_score() {
        for (name, repo) in backends() {
            seed(repo.as_ref(), &[("cot", "c"), ("tac", "t"), ("cat", "c"), ("cut", "c")]);
            let hits = repo
                .search("cat", &SearchConfig::new(SearchStrategy::PositionalSimilarity))
                .unwrap();
            let words: Vec<_> = hits.iter().map(|hit| hit.entry.word.as_str()).collect();
            assert_eq!(words, vec!["cat", "cot", "cut"], "{name}");
            assert_eq!(hits[0].score, Some(3), "{name}");
        }
    }

    #[test]
    fn blank_search_returns_nothing() {
        for (name, repo) in backends() {
            seed(repo.as_ref(), &[("cat", "c")]);
            for strategy in [SearchStrategy::SubstringMatch, SearchStrategy::PositionalSimilarity] {
                let hits = repo.search("  ", &SearchConfig::new(strategy)).unwrap();
                assert!(hits.is_empty(), "{name} {strategy}");
            }
        }
    }
}
