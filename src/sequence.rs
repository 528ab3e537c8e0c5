//! Tagging for as-you-type lookups so that only the newest response is used.
//!
//! Each keystroke issues a [`Ticket`]. Lookups may finish in any order; a
//! result is delivered only if its ticket is still the latest one issued.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::entry::WordEntry;
use crate::error::Result;
use crate::ranking::SearchConfig;
use crate::repository::WordRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn latest(&self) -> Option<Ticket> {
        match self.latest.load(Ordering::Acquire) {
            0 => None,
            value => Some(Ticket(value)),
        }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// Hands `value` back only when `ticket` has not been superseded.
    pub fn accept<T>(&self, ticket: Ticket, value: T) -> Option<T> {
        self.is_current(ticket).then_some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    pub ticket: Ticket,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionResponse {
    pub ticket: Ticket,
    pub entries: Vec<WordEntry>,
}

/// Live suggestions for one input box.
pub struct SuggestionSession<R> {
    repository: R,
    config: SearchConfig,
    sequencer: RequestSequencer,
}

impl<R: WordRepository> SuggestionSession<R> {
    pub fn new(repository: R, config: SearchConfig) -> Self {
        Self {
            repository,
            config,
            sequencer: RequestSequencer::new(),
        }
    }

    /// Registers a new query, superseding every earlier request.
    pub fn begin(&self, query: impl Into<String>) -> SuggestionRequest {
        SuggestionRequest {
            ticket: self.sequencer.issue(),
            query: query.into(),
        }
    }

    pub fn run(&self, request: &SuggestionRequest) -> Result<SuggestionResponse> {
        let entries = if request.query.trim().is_empty() {
            Vec::new()
        } else {
            self.repository
                .search(&request.query, &self.config)?
                .into_iter()
                .map(|hit| hit.entry)
                .collect()
        };
        Ok(SuggestionResponse {
            ticket: request.ticket,
            entries,
        })
    }

    /// Returns the entries to display, or `None` for a stale response.
    pub fn deliver(&self, response: SuggestionResponse) -> Option<Vec<WordEntry>> {
        self.sequencer.accept(response.ticket, response.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::NewEntry;
    use crate::repository::MemoryRepository;

    #[test]
    fn tickets_increase_and_only_latest_is_current() {
        let sequencer = RequestSequencer::new();
        assert_eq!(sequencer.latest(), None);
        let first = sequencer.issue();
        let second = sequencer.issue();
        assert!(second > first);
        assert!(!sequencer.is_current(first));
        assert!(sequencer.is_current(second));
        assert_eq!(sequencer.accept(first, "stale"), None);
        assert_eq!(sequencer.accept(second, "fresh"), Some("fresh"));
    }

    #[test]
    fn out_of_order_responses_are_dropped() {
        let repo = MemoryRepository::new();
        repo.create(&[NewEntry::new("cat", "feline"), NewEntry::new("catalog", "a list")])
            .unwrap();
        let session = SuggestionSession::new(repo, SearchConfig::default());

        let slow = session.begin("c");
        let fast = session.begin("catal");
        let fast_response = session.run(&fast).unwrap();
        let slow_response = session.run(&slow).unwrap();

        let shown = session.deliver(fast_response).expect("latest response");
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].word, "catalog");
        assert!(session.deliver(slow_response).is_none());
    }

    #[test]
    fn blank_query_clears_suggestions() {
        let repo = MemoryRepository::new();
        repo.create(&[NewEntry::new("cat", "feline")]).unwrap();
        let session = SuggestionSession::new(repo, SearchConfig::default());
        let request = session.begin("   ");
        let response = session.run(&request).unwrap();
        assert_eq!(session.deliver(response), Some(Vec::new()));
    }
}
