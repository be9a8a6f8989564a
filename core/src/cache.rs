//! Query cache state machine.
//!
//! # Design
//! `QueryCache` performs no I/O and reads no clock: every operation takes
//! `now` explicitly, and fetching is expressed as tickets the caller must
//! execute and hand back through `complete`. This keeps staleness,
//! deduplication and ordering deterministic and testable without a runtime.
//!
//! Ordering works per key. Each fetch gets a sequence number from a single
//! counter and the entry remembers the ticket currently in flight. Only that
//! ticket may complete; anything older was superseded and its result is
//! discarded on arrival, so a late response never overwrites newer state.
//!
//! Invalidating an entry while its fetch is in flight records a watermark.
//! The outstanding response may still predate the write that caused the
//! invalidation, so when it lands its data is stored but the entry stays
//! invalidated, and the next read issues a fresh fetch that supersedes it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::ApiError;
use crate::keys::{FromQueryData, QueryData, QueryKey, StalePolicy, WriteEffect};

/// Handle for one outstanding fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    seq: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What the caller should do to satisfy a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadPlan {
    /// Serve the cached value; no fetch needed.
    Fresh(QueryData),
    /// Serve the cached value now and refresh it in the background.
    Revalidate { data: QueryData, ticket: FetchTicket },
    /// Nothing usable is cached: fetch and wait.
    Fetch(FetchTicket),
    /// A fetch for this key is already outstanding; share it.
    Join { seq: u64, data: Option<QueryData> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Discarded,
}

/// Snapshot of one cache entry as a view sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
    /// No data yet and a fetch is outstanding.
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub updated_at: Option<Instant>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_fetching: false,
            is_stale: true,
            updated_at: None,
        }
    }
}

impl<T> QueryState<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        QueryState {
            data: self.data.map(f),
            error: self.error,
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            updated_at: self.updated_at,
        }
    }
}

impl QueryState<QueryData> {
    /// Project the cached payload into its concrete type.
    pub fn typed<U: FromQueryData>(self) -> QueryState<U> {
        QueryState {
            data: self.data.and_then(U::from_query_data),
            error: self.error,
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    data: Option<QueryData>,
    error: Option<ApiError>,
    updated_at: Option<Instant>,
    invalidated: bool,
    in_flight: Option<u64>,
    /// Last read, write or completed fetch. Drives garbage collection.
    last_used: Option<Instant>,
    /// Tickets with `seq <= invalidated_through` were issued before the
    /// latest invalidation.
    invalidated_through: u64,
}

impl Entry {
    fn is_stale(&self, policy: &StalePolicy, key: &QueryKey, now: Instant) -> bool {
        if self.invalidated || self.error.is_some() {
            return true;
        }
        match (self.updated_at, policy.stale_time(key)) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(at), Some(window)) => now.saturating_duration_since(at) >= window,
        }
    }

    fn is_collectable(&self, gc_time: Duration, now: Instant) -> bool {
        self.in_flight.is_none()
            && self
                .last_used
                .is_some_and(|at| now.saturating_duration_since(at) >= gc_time)
    }

    /// An outstanding fetch that was issued after the last invalidation.
    fn joinable(&self) -> Option<u64> {
        self.in_flight.filter(|seq| *seq > self.invalidated_through)
    }
}

/// Central store for fetched server state, addressed by `QueryKey`.
#[derive(Debug)]
pub struct QueryCache {
    policy: StalePolicy,
    entries: HashMap<QueryKey, Entry>,
    last_seq: u64,
}

impl QueryCache {
    pub fn new(policy: StalePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
            last_seq: 0,
        }
    }

    pub fn policy(&self) -> &StalePolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn begin_read(&mut self, key: &QueryKey, now: Instant) -> ReadPlan {
        self.collect_garbage(now);
        let entry = self.entries.entry(key.clone()).or_default();
        entry.last_used = Some(now);
        if let Some(seq) = entry.joinable() {
            return ReadPlan::Join {
                seq,
                data: entry.data.clone(),
            };
        }
        let stale = entry.is_stale(&self.policy, key, now);
        match entry.data.clone() {
            Some(data) if !stale => ReadPlan::Fresh(data),
            Some(data) => ReadPlan::Revalidate {
                data,
                ticket: self.issue(key),
            },
            None => ReadPlan::Fetch(self.issue(key)),
        }
    }

    /// Start a fetch regardless of freshness, superseding any outstanding one.
    pub fn begin_refetch(&mut self, key: &QueryKey) -> FetchTicket {
        self.issue(key)
    }

    fn issue(&mut self, key: &QueryKey) -> FetchTicket {
        self.last_seq += 1;
        let seq = self.last_seq;
        let entry = self.entries.entry(key.clone()).or_default();
        if let Some(previous) = entry.in_flight.replace(seq) {
            debug!(key = %key, previous, seq, "superseding in-flight fetch");
        }
        FetchTicket { key: key.clone(), seq }
    }

    /// Apply a fetch result. Results from superseded tickets are discarded.
    pub fn complete(&mut self, ticket: &FetchTicket, result: Result<QueryData, ApiError>, now: Instant) -> Completion {
        let Some(entry) = self.entries.get_mut(&ticket.key) else {
            debug!(key = %ticket.key, seq = ticket.seq, "discarding result for evicted entry");
            return Completion::Discarded;
        };
        if entry.in_flight != Some(ticket.seq) {
            debug!(
                key = %ticket.key,
                seq = ticket.seq,
                current = ?entry.in_flight,
                "discarding out-of-date result"
            );
            return Completion::Discarded;
        }
        entry.in_flight = None;
        match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.error = None;
                entry.updated_at = Some(now);
                entry.invalidated = ticket.seq <= entry.invalidated_through;
            }
            Err(ApiError::NotFound) => {
                entry.data = None;
                entry.error = Some(ApiError::NotFound);
                entry.updated_at = Some(now);
            }
            Err(error) => entry.error = Some(error),
        }
        entry.last_used = Some(now);
        Completion::Applied
    }

    /// Overwrite an entry with a value the server just returned. Any fetch
    /// in flight for the key predates it and will be discarded.
    pub fn set_data(&mut self, key: QueryKey, data: QueryData, now: Instant) {
        let entry = self.entries.entry(key).or_default();
        entry.data = Some(data);
        entry.error = None;
        entry.updated_at = Some(now);
        entry.invalidated = false;
        entry.in_flight = None;
        entry.last_used = Some(now);
    }

    /// Drop entries that nobody has used within the gc window and that have
    /// no fetch outstanding. Returns how many were dropped.
    pub fn collect_garbage(&mut self, now: Instant) -> usize {
        let Some(gc_time) = self.policy.gc_time else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let keep = !entry.is_collectable(gc_time, now);
            if !keep {
                debug!(key = %key, "collected unused entry");
            }
            keep
        });
        before - self.entries.len()
    }

    /// Mark matching entries so their next read refetches. Returns how many
    /// entries were touched.
    pub fn invalidate(&mut self, mut predicate: impl FnMut(&QueryKey) -> bool) -> usize {
        let watermark = self.last_seq;
        let mut touched = 0;
        for (key, entry) in self.entries.iter_mut().filter(|(key, _)| predicate(key)) {
            entry.invalidated = true;
            entry.invalidated_through = watermark;
            touched += 1;
            debug!(key = %key, "invalidated");
        }
        touched
    }

    pub fn remove(&mut self, key: &QueryKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Reconcile the cache with a confirmed write. Every aggregate that could
    /// depend on the written entity is invalidated rather than patched.
    pub fn apply(&mut self, effect: &WriteEffect, now: Instant) -> usize {
        match effect {
            WriteEffect::TodoCreated(_) => self.invalidate(QueryKey::is_todo_derived),
            WriteEffect::TodoUpdated(todo) => {
                let touched = self.invalidate(QueryKey::is_todo_derived);
                self.set_data(QueryKey::Todo(todo.id), QueryData::Todo(todo.clone()), now);
                touched
            }
            WriteEffect::TodoDeleted(id) => {
                let touched = self.invalidate(QueryKey::is_todo_derived);
                self.remove(&QueryKey::Todo(*id));
                touched
            }
            WriteEffect::CategoryCreated(_) => self.invalidate(|key| *key == QueryKey::Categories),
            WriteEffect::CategoryUpdated(category) => {
                let touched = self.invalidate(|key| *key == QueryKey::Categories);
                self.set_data(
                    QueryKey::Category(category.id),
                    QueryData::Category(category.clone()),
                    now,
                );
                touched
            }
            WriteEffect::CategoryDeleted(id) => {
                let touched = self.invalidate(|key| {
                    *key == QueryKey::Categories || key.is_todo_derived() || matches!(key, QueryKey::Todo(_))
                });
                self.remove(&QueryKey::Category(*id));
                touched
            }
        }
    }

    pub fn state(&self, key: &QueryKey, now: Instant) -> QueryState<QueryData> {
        let Some(entry) = self.entries.get(key) else {
            return QueryState::default();
        };
        QueryState {
            data: entry.data.clone(),
            error: entry.error.clone(),
            is_loading: entry.data.is_none() && entry.in_flight.is_some(),
            is_fetching: entry.in_flight.is_some(),
            is_stale: entry.is_stale(&self.policy, key, now),
            updated_at: entry.updated_at,
        }
    }

    /// Sequence numbers of every fetch still outstanding.
    pub fn in_flight(&self) -> Vec<u64> {
        self.entries.values().filter_map(|entry| entry.in_flight).collect()
    }
}
