//! Filter set for todo list queries.
//!
//! A `TodoFilters` value is both the query string of `GET /todos/` and part
//! of the cache key for the resulting list, so it is normalized before use:
//! two filter sets that would produce the same request compare equal.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::types::{CategoryId, Priority, Status, UserId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TodoFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overdue: Option<bool>,
}

impl TodoFilters {
    /// Build filters from string pairs as a form emits them.
    ///
    /// Empty values mean "no filter" and are dropped. Unknown keys and
    /// unparsable values are rejected.
    pub fn from_params<I, K, V>(params: I) -> Result<Self, ApiError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = TodoFilters::default();
        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            if value.is_empty() {
                continue;
            }
            let invalid = || ApiError::InvalidFilter {
                key: key.to_string(),
                value: value.to_string(),
            };
            match key {
                "search" => filters.search = Some(value.to_string()),
                "status" => filters.status = Some(value.parse()?),
                "priority" => filters.priority = Some(value.parse()?),
                "category" => filters.category = Some(value.parse().map_err(|_| invalid())?),
                "user" => filters.user = Some(value.parse().map_err(|_| invalid())?),
                "overdue" => filters.overdue = Some(parse_flag(value).ok_or_else(invalid)?),
                _ => return Err(invalid()),
            }
        }
        Ok(filters.normalized())
    }

    /// Trim the search term and drop it when nothing is left.
    pub fn normalized(mut self) -> Self {
        self.search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }

    /// Reset every filter (the "clear filters" intent).
    pub fn clear(&mut self) {
        *self = TodoFilters::default();
    }

    /// Present filters in wire order. Empty values are never emitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.as_str().to_string()));
        }
        if let Some(category) = self.category {
            pairs.push(("category", category.to_string()));
        }
        if let Some(user) = self.user {
            pairs.push(("user", user.to_string()));
        }
        if let Some(overdue) = self.overdue {
            pairs.push(("overdue", overdue.to_string()));
        }
        pairs
    }

    /// URL-encoded query string without the leading `?`.
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query_pairs())
            .finish()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
