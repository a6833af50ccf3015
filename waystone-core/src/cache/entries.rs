//! Insertion-ordered entry table shared by the storage backends

use std::collections::{BTreeMap, HashMap};

use crate::http::{RequestKey, StoredResponse};

/// Entries of one namespace, iterated oldest-inserted first.
///
/// Each insert takes a fresh sequence number, so overwriting a key moves it
/// to the back of the order.
#[derive(Debug, Default, Clone)]
pub struct EntryTable {
    next_seq: u64,
    index: HashMap<RequestKey, u64>,
    ordered: BTreeMap<u64, (RequestKey, StoredResponse)>,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a table from entries listed oldest first
    pub fn from_entries(entries: Vec<(RequestKey, StoredResponse)>) -> Self {
        let mut table = Self::new();
        for (key, response) in entries {
            table.insert(key, response);
        }
        table
    }

    pub fn get(&self, key: &RequestKey) -> Option<&StoredResponse> {
        let seq = self.index.get(key)?;
        self.ordered.get(seq).map(|(_, response)| response)
    }

    pub fn insert(&mut self, key: RequestKey, response: StoredResponse) {
        if let Some(old) = self.index.remove(&key) {
            self.ordered.remove(&old);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(key.clone(), seq);
        self.ordered.insert(seq, (key, response));
    }

    pub fn remove(&mut self, key: &RequestKey) -> bool {
        match self.index.remove(key) {
            Some(seq) => self.ordered.remove(&seq).is_some(),
            None => false,
        }
    }

    pub fn keys(&self) -> Vec<RequestKey> {
        self.ordered.values().map(|(key, _)| key.clone()).collect()
    }

    /// Entries oldest first, cloned out for persistence
    pub fn entries(&self) -> Vec<(RequestKey, StoredResponse)> {
        self.ordered.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
