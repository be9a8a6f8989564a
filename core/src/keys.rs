//! Cache addressing: query keys, cached payloads, staleness windows and the
//! effects a successful write has on the cache.

use std::fmt;
use std::time::Duration;

use crate::filters::TodoFilters;
use crate::types::{CategoryId, Page, Todo, TodoCategory, TodoId, TodoStats, User};

/// Logical identity of a cached read. Structurally equal keys address the
/// same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Todos(TodoFilters),
    Todo(TodoId),
    TodoStats,
    HighPriority,
    Overdue,
    Categories,
    Category(CategoryId),
    Users,
}

impl QueryKey {
    /// Filters are normalized so equivalent filter sets share an entry.
    pub fn todos(filters: &TodoFilters) -> Self {
        QueryKey::Todos(filters.clone().normalized())
    }

    /// Keys whose value is computed from the set of todos: every list and
    /// aggregate, but not single entities.
    pub fn is_todo_derived(&self) -> bool {
        matches!(
            self,
            QueryKey::Todos(_) | QueryKey::TodoStats | QueryKey::HighPriority | QueryKey::Overdue
        )
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Todos(filters) if filters.is_empty() => f.write_str("todos"),
            QueryKey::Todos(filters) => write!(f, "todos?{}", filters.to_query_string()),
            QueryKey::Todo(id) => write!(f, "todos/{id}"),
            QueryKey::TodoStats => f.write_str("todos/stats"),
            QueryKey::HighPriority => f.write_str("todos/high_priority"),
            QueryKey::Overdue => f.write_str("todos/overdue"),
            QueryKey::Categories => f.write_str("categories"),
            QueryKey::Category(id) => write!(f, "categories/{id}"),
            QueryKey::Users => f.write_str("users"),
        }
    }
}

/// A cached value. Each key class stores exactly one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    TodoPage(Page<Todo>),
    Todo(Todo),
    Stats(TodoStats),
    TodoList(Vec<Todo>),
    CategoryPage(Page<TodoCategory>),
    Category(TodoCategory),
    UserPage(Page<User>),
}

/// Typed projection out of `QueryData`.
pub trait FromQueryData: Sized {
    fn from_query_data(data: QueryData) -> Option<Self>;
}

macro_rules! from_query_data {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl FromQueryData for $ty {
                fn from_query_data(data: QueryData) -> Option<Self> {
                    match data {
                        QueryData::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for QueryData {
                fn from(value: $ty) -> Self {
                    QueryData::$variant(value)
                }
            }
        )*
    };
}

from_query_data! {
    TodoPage => Page<Todo>,
    Todo => Todo,
    Stats => TodoStats,
    TodoList => Vec<Todo>,
    CategoryPage => Page<TodoCategory>,
    Category => TodoCategory,
    UserPage => Page<User>,
}

/// How long a fetched value is served without a background refresh.
/// `None` means fresh until invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalePolicy {
    pub todo_lists: Option<Duration>,
    pub highlights: Option<Duration>,
    pub stats: Option<Duration>,
    pub categories: Option<Duration>,
    pub users: Option<Duration>,
    pub entities: Option<Duration>,
    /// Entries not read for this long, with no fetch outstanding, are
    /// dropped. `None` keeps them for the life of the cache.
    pub gc_time: Option<Duration>,
}

impl Default for StalePolicy {
    fn default() -> Self {
        Self {
            todo_lists: Some(Duration::from_secs(30)),
            highlights: Some(Duration::from_secs(30)),
            stats: Some(Duration::from_secs(60)),
            categories: Some(Duration::from_secs(300)),
            users: Some(Duration::from_secs(300)),
            entities: None,
            gc_time: Some(Duration::from_secs(300)),
        }
    }
}

impl StalePolicy {
    pub fn stale_time(&self, key: &QueryKey) -> Option<Duration> {
        match key {
            QueryKey::Todos(_) => self.todo_lists,
            QueryKey::HighPriority | QueryKey::Overdue => self.highlights,
            QueryKey::TodoStats => self.stats,
            QueryKey::Categories => self.categories,
            QueryKey::Users => self.users,
            QueryKey::Todo(_) | QueryKey::Category(_) => self.entities,
        }
    }
}

/// What a confirmed write did on the server.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteEffect {
    TodoCreated(Todo),
    /// Field update, status change or completion; carries the server's copy.
    TodoUpdated(Todo),
    TodoDeleted(TodoId),
    CategoryCreated(TodoCategory),
    CategoryUpdated(TodoCategory),
    CategoryDeleted(CategoryId),
}
