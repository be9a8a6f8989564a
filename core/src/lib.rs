//! Data layer of the todo client: typed access to the todo REST API plus a
//! query cache that deduplicates reads and reconciles confirmed writes.
//!
//! # Overview
//! - `TodoClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without touching the network (host-does-IO pattern).
//! - `Transport` executes requests; `UreqTransport` is the default.
//! - `TodoApi` joins the two into one async call per backend operation.
//! - `QueryCache` is the clock-injected cache state machine: staleness
//!   windows, in-flight deduplication, ordering by sequence number and
//!   invalidation rules.
//! - `QueryClient` drives the cache against `TodoApi` and is what a view
//!   reads from and writes through.
//!
//! # Design
//! - Types use owned `String` / `Vec` fields and are defined independently
//!   from the mock-server crate; integration tests catch schema drift.
//! - Every write waits for server confirmation before the cache changes.
//!   There are no optimistic updates.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod filters;
pub mod http;
pub mod keys;
pub mod query_client;
pub mod transport;
pub mod types;

pub use api::TodoApi;
pub use cache::{Completion, FetchTicket, QueryCache, QueryState, ReadPlan};
pub use client::TodoClient;
pub use config::{ClientConfig, Environment};
pub use error::{ApiError, ConfigError, ErrorKind, FieldErrors};
pub use filters::TodoFilters;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use keys::{FromQueryData, QueryData, QueryKey, StalePolicy, WriteEffect};
pub use query_client::{Mutation, MutationOutput, QueryClient};
pub use transport::{Transport, TransportError, UreqTransport};
pub use types::{
    Attachment, CategoryId, CreateCategory, CreateTodo, Page, Priority, Status, StatusUpdate, Todo,
    TodoCategory, TodoId, TodoStats, UpdateCategory, UpdateTodo, User, UserId,
};
