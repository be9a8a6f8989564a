//! Async driver around `QueryCache`: the handle views read from and write
//! through.
//!
//! # Design
//! `QueryClient` is created once at application start and cloned into
//! whatever needs it; every clone shares one cache. The cache and the table
//! of in-flight fetches sit behind a single mutex that is never held across
//! an await, so cache mutation stays a series of short synchronous steps.
//!
//! Reads consult the cache first. A missing value is fetched and awaited, a
//! stale one is returned immediately while the refresh proceeds in the
//! background, and a read for a key that already has a fetch outstanding
//! awaits that same shared future instead of issuing another request.
//!
//! Every fetch runs on its own task. A caller that is cancelled mid-read
//! stops waiting, but the fetch still completes and settles its entry.
//!
//! Writes go straight to the API and are never retried. Only after the
//! server confirms one is the cache reconciled, through `WriteEffect`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::api::TodoApi;
use crate::cache::{Completion, FetchTicket, QueryCache, QueryState, ReadPlan};
use crate::client::TodoClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::filters::TodoFilters;
use crate::keys::{QueryData, QueryKey, WriteEffect};
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    CategoryId, CreateCategory, CreateTodo, Page, Status, Todo, TodoCategory, TodoId, TodoStats,
    UpdateCategory, UpdateTodo, User,
};

type SharedFetch = Shared<BoxFuture<'static, ()>>;

/// A write intent as a view emits it.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateTodo(CreateTodo),
    UpdateTodo { id: TodoId, patch: UpdateTodo },
    UpdateStatus { id: TodoId, status: Status },
    MarkCompleted(TodoId),
    DeleteTodo(TodoId),
    CreateCategory(CreateCategory),
    UpdateCategory { id: CategoryId, patch: UpdateCategory },
    DeleteCategory(CategoryId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutput {
    Todo(Todo),
    Category(TodoCategory),
    Deleted,
}

struct State {
    cache: QueryCache,
    in_flight: HashMap<u64, SharedFetch>,
}

struct Inner<T> {
    api: TodoApi<T>,
    state: Mutex<State>,
    read_retries: u32,
}

pub struct QueryClient<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for QueryClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl<T: Transport + 'static> Inner<T> {
    /// Register the fetch for `ticket` and run it on its own task. The
    /// returned handle only observes completion; dropping it does not stop
    /// the fetch.
    fn start(self: &Arc<Self>, state: &mut State, ticket: FetchTicket) -> SharedFetch {
        let seq = ticket.seq();
        let inner = Arc::clone(self);
        let fetch = async move { inner.run_fetch(ticket).await }.boxed().shared();
        state.in_flight.insert(seq, fetch.clone());
        tokio::spawn(fetch.clone());
        fetch
    }

    async fn run_fetch(&self, ticket: FetchTicket) {
        let result = self.fetch_with_retry(ticket.key()).await;
        let mut state = self.state.lock();
        if state.cache.complete(&ticket, result, now()) == Completion::Discarded {
            debug!(key = %ticket.key(), seq = ticket.seq(), "fetch result superseded");
        }
        state.in_flight.remove(&ticket.seq());
    }

    async fn fetch_with_retry(&self, key: &QueryKey) -> Result<QueryData, ApiError> {
        let mut attempt = 0;
        loop {
            match self.api.fetch(key).await {
                Err(e) if e.is_retryable() && attempt < self.read_retries => {
                    attempt += 1;
                    warn!(key = %key, attempt, error = %e, "read failed, retrying");
                }
                result => return result,
            }
        }
    }

    fn commit(&self, effect: WriteEffect) {
        let touched = self.state.lock().cache.apply(&effect, now());
        debug!(?effect, touched, "write reconciled with cache");
    }
}

impl QueryClient<UreqTransport> {
    /// Client over a ureq transport using the configured timeout.
    pub fn connect(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout);
        Self::new(config, transport)
    }
}

impl<T: Transport + 'static> QueryClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        let api = TodoApi::new(TodoClient::new(&config.base_url), transport, config.log_requests);
        Self {
            inner: Arc::new(Inner {
                api,
                state: Mutex::new(State {
                    cache: QueryCache::new(config.stale),
                    in_flight: HashMap::new(),
                }),
                read_retries: config.read_retries,
            }),
        }
    }

    /// Direct, uncached access to the resource API.
    pub fn api(&self) -> &TodoApi<T> {
        &self.inner.api
    }

    /// Read `key` through the cache.
    ///
    /// Fresh data returns without I/O. Stale data returns immediately with a
    /// background refresh started. Without data the call waits for the fetch,
    /// sharing it with any concurrent reader of the same key.
    pub async fn read(&self, key: QueryKey) -> QueryState<QueryData> {
        let pending = {
            let mut state = self.inner.state.lock();
            match state.cache.begin_read(&key, now()) {
                ReadPlan::Fresh(_) | ReadPlan::Join { data: Some(_), .. } => None,
                ReadPlan::Revalidate { ticket, .. } => {
                    self.inner.start(&mut state, ticket);
                    None
                }
                ReadPlan::Fetch(ticket) => Some(self.inner.start(&mut state, ticket)),
                ReadPlan::Join { seq, data: None } => state.in_flight.get(&seq).cloned(),
            }
        };
        if let Some(fetch) = pending {
            fetch.await;
        }
        self.peek(&key)
    }

    /// Fetch `key` now and wait for it, whatever the cached state.
    pub async fn refetch(&self, key: QueryKey) -> QueryState<QueryData> {
        let fetch = {
            let mut state = self.inner.state.lock();
            let ticket = state.cache.begin_refetch(&key);
            self.inner.start(&mut state, ticket)
        };
        fetch.await;
        self.peek(&key)
    }

    /// Current cached state of `key` without triggering a fetch.
    pub fn peek(&self, key: &QueryKey) -> QueryState<QueryData> {
        self.inner.state.lock().cache.state(key, now())
    }

    pub fn invalidate(&self, predicate: impl FnMut(&QueryKey) -> bool) -> usize {
        self.inner.state.lock().cache.invalidate(predicate)
    }

    /// Drop entries unused for longer than the gc window. Reads also sweep.
    pub fn collect_garbage(&self) -> usize {
        self.inner.state.lock().cache.collect_garbage(now())
    }

    pub async fn todos(&self, filters: &TodoFilters) -> QueryState<Page<Todo>> {
        self.read(QueryKey::todos(filters)).await.typed()
    }

    pub async fn todo(&self, id: TodoId) -> QueryState<Todo> {
        self.read(QueryKey::Todo(id)).await.typed()
    }

    pub async fn stats(&self) -> QueryState<TodoStats> {
        self.read(QueryKey::TodoStats).await.typed()
    }

    pub async fn high_priority(&self) -> QueryState<Vec<Todo>> {
        self.read(QueryKey::HighPriority).await.typed()
    }

    pub async fn overdue(&self) -> QueryState<Vec<Todo>> {
        self.read(QueryKey::Overdue).await.typed()
    }

    pub async fn categories(&self) -> QueryState<Page<TodoCategory>> {
        self.read(QueryKey::Categories).await.typed()
    }

    pub async fn category(&self, id: CategoryId) -> QueryState<TodoCategory> {
        self.read(QueryKey::Category(id)).await.typed()
    }

    pub async fn users(&self) -> QueryState<Page<User>> {
        self.read(QueryKey::Users).await.typed()
    }

    pub async fn test_connection(&self) -> bool {
        self.inner.api.test_connection().await
    }

    /// Dispatch a write intent.
    pub async fn mutate(&self, mutation: Mutation) -> Result<MutationOutput, ApiError> {
        match mutation {
            Mutation::CreateTodo(input) => self.create_todo(input).await.map(MutationOutput::Todo),
            Mutation::UpdateTodo { id, patch } => self.update_todo(id, patch).await.map(MutationOutput::Todo),
            Mutation::UpdateStatus { id, status } => self.update_status(id, status).await.map(MutationOutput::Todo),
            Mutation::MarkCompleted(id) => self.mark_completed(id).await.map(MutationOutput::Todo),
            Mutation::DeleteTodo(id) => self.delete_todo(id).await.map(|()| MutationOutput::Deleted),
            Mutation::CreateCategory(input) => self.create_category(input).await.map(MutationOutput::Category),
            Mutation::UpdateCategory { id, patch } => {
                self.update_category(id, patch).await.map(MutationOutput::Category)
            }
            Mutation::DeleteCategory(id) => self.delete_category(id).await.map(|()| MutationOutput::Deleted),
        }
    }

    pub async fn create_todo(&self, input: CreateTodo) -> Result<Todo, ApiError> {
        input.validate()?;
        let todo = self.inner.api.create_todo(&input).await?;
        self.inner.commit(WriteEffect::TodoCreated(todo.clone()));
        Ok(todo)
    }

    pub async fn update_todo(&self, id: TodoId, patch: UpdateTodo) -> Result<Todo, ApiError> {
        patch.validate()?;
        let result = self.inner.api.update_todo(id, &patch).await;
        self.settle_todo(id, result)
    }

    pub async fn update_status(&self, id: TodoId, status: Status) -> Result<Todo, ApiError> {
        let result = self.inner.api.update_status(id, status).await;
        self.settle_todo(id, result)
    }

    pub async fn mark_completed(&self, id: TodoId) -> Result<Todo, ApiError> {
        let result = self.inner.api.mark_completed(id).await;
        self.settle_todo(id, result)
    }

    pub async fn delete_todo(&self, id: TodoId) -> Result<(), ApiError> {
        let result = self.inner.api.delete_todo(id).await;
        if matches!(result, Ok(()) | Err(ApiError::NotFound)) {
            self.inner.commit(WriteEffect::TodoDeleted(id));
        }
        result
    }

    pub async fn create_category(&self, input: CreateCategory) -> Result<TodoCategory, ApiError> {
        input.validate()?;
        let category = self.inner.api.create_category(&input).await?;
        self.inner.commit(WriteEffect::CategoryCreated(category.clone()));
        Ok(category)
    }

    pub async fn update_category(&self, id: CategoryId, patch: UpdateCategory) -> Result<TodoCategory, ApiError> {
        match self.inner.api.update_category(id, &patch).await {
            Ok(category) => {
                self.inner.commit(WriteEffect::CategoryUpdated(category.clone()));
                Ok(category)
            }
            Err(ApiError::NotFound) => {
                self.inner.commit(WriteEffect::CategoryDeleted(id));
                Err(ApiError::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn delete_category(&self, id: CategoryId) -> Result<(), ApiError> {
        let result = self.inner.api.delete_category(id).await;
        if matches!(result, Ok(()) | Err(ApiError::NotFound)) {
            self.inner.commit(WriteEffect::CategoryDeleted(id));
        }
        result
    }

    /// A 404 on a write means the todo is gone server-side.
    fn settle_todo(&self, id: TodoId, result: Result<Todo, ApiError>) -> Result<Todo, ApiError> {
        match result {
            Ok(todo) => {
                self.inner.commit(WriteEffect::TodoUpdated(todo.clone()));
                Ok(todo)
            }
            Err(ApiError::NotFound) => {
                self.inner.commit(WriteEffect::TodoDeleted(id));
                Err(ApiError::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Wait until no fetch is outstanding, including ones started meanwhile.
    pub async fn idle(&self) {
        loop {
            let pending: Vec<SharedFetch> = self.inner.state.lock().in_flight.values().cloned().collect();
            if pending.is_empty() {
                return;
            }
            futures::future::join_all(pending).await;
        }
    }

    /// Drain outstanding fetches and drop every cached entry.
    pub async fn shutdown(&self) {
        self.idle().await;
        let mut state = self.inner.state.lock();
        state.cache.clear();
        state.in_flight.clear();
    }
}
