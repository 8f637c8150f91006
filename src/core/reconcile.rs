use hashbrown::HashSet;

use crate::{record::Record, types::RecordId};

/// A list element with a stable id that supports shallow merging.
pub trait CacheItem: Clone {
    fn item_id(&self) -> RecordId;
    /// Overwrites fields present in `other`, keeping the rest.
    fn merge_from(&mut self, other: &Self);
}

impl CacheItem for Record {
    fn item_id(&self) -> RecordId {
        self.id
    }

    fn merge_from(&mut self, other: &Self) {
        Record::merge_from(self, other);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Merged,
    Appended,
}

/// Merges `record` into the entry with the same id, or appends it.
///
/// Position of existing entries never changes, so sort order survives.
pub fn upsert_into_list<T: CacheItem>(list: &mut Vec<T>, record: &T) -> Upserted {
    let id = record.item_id();
    match list.iter_mut().find(|item| item.item_id() == id) {
        Some(existing) => {
            existing.merge_from(record);
            Upserted::Merged
        }
        None => {
            list.push(record.clone());
            Upserted::Appended
        }
    }
}

/// Server list first, then every local record the server does not know yet.
///
/// On id collision the fetched record wins untouched.
pub fn merge_fetched_with_local<T: CacheItem>(fetched: Vec<T>, local: &[T]) -> Vec<T> {
    let seen: HashSet<RecordId> = fetched.iter().map(CacheItem::item_id).collect();
    let mut merged = fetched;
    for item in local {
        if !seen.contains(&item.item_id()) {
            merged.push(item.clone());
        }
    }
    merged
}

pub fn remove_from_list<T: CacheItem>(list: &mut Vec<T>, id: RecordId) -> bool {
    let before = list.len();
    list.retain(|item| item.item_id() != id);
    list.len() != before
}

/// Where a page load ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLoadState {
    Empty,
    LoadingCache,
    CacheReady,
    EmptyNoCache,
    Fetching,
    Fresh,
    StaleFallbackToCache,
}

impl PageLoadState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: PageLoadState) -> bool {
        use PageLoadState::*;
        matches!(
            (self, next),
            (Empty, LoadingCache)
                | (LoadingCache, CacheReady)
                | (LoadingCache, EmptyNoCache)
                | (CacheReady, Fetching)
                | (EmptyNoCache, Fetching)
                | (CacheReady, StaleFallbackToCache)
                | (EmptyNoCache, StaleFallbackToCache)
                | (Fetching, Fresh)
                | (Fetching, StaleFallbackToCache)
        )
    }
}

/// Non-fatal banner shown when a page falls back to cached data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Device offline; cached data shown.
    Offline,
    /// Remote call failed; cached data shown.
    RemoteUnavailable(String),
    /// Offline with nothing cached; connect once to seed the cache.
    NoOfflineData,
}
