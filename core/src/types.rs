//! Domain DTOs for the todo API.
//!
//! # Design
//! These types mirror the backend's JSON schema but are defined
//! independently of the mock-server crate; integration tests catch schema
//! drift between the two. Server-owned fields (`id`, timestamps, derived
//! counters) only appear on the response types. Request payloads skip
//! absent fields so partial updates stay partial on the wire.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, FieldErrors};

pub type TodoId = i64;
pub type CategoryId = i64;
pub type UserId = i64;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;
pub const CATEGORY_NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ApiError::InvalidFilter {
                key: "priority".to_string(),
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Pending, Status::InProgress, Status::Completed, Status::Cancelled];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In progress",
            Status::Completed => "Completed",
            Status::Cancelled => "Cancelled",
        }
    }

    /// Whether the task still needs work.
    pub fn is_open(self) -> bool {
        matches!(self, Status::Pending | Status::InProgress)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ApiError::InvalidFilter {
                key: "status".to_string(),
                value: s.to_string(),
            })
    }
}

/// A file attached to a todo. Attachments are managed by the server and
/// read-only from the client's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub filename: String,
    pub file: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A single todo item returned by the API.
///
/// `is_overdue` and `days_until_due` are computed by the backend at
/// serialization time. `category` may reference a category that no longer
/// exists; callers must not assume it resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: Priority,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub category: Option<CategoryId>,
    #[serde(default)]
    pub category_details: Option<TodoCategory>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub is_overdue: bool,
    #[serde(default)]
    pub days_until_due: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoCategory {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tasks_count: u32,
}

/// Aggregate counters computed by the backend. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoStats {
    pub total_tasks: u32,
    pub pending_tasks: u32,
    pub completed_tasks: u32,
    pub in_progress_tasks: u32,
    #[serde(default)]
    pub cancelled_tasks: u32,
    pub overdue_tasks: u32,
    /// Percentage in `0.0..=100.0`.
    #[serde(default)]
    pub completion_rate: f64,
    #[serde(default)]
    pub tasks_by_priority: BTreeMap<String, u32>,
    #[serde(default)]
    pub tasks_by_category: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A list response in the backend's paginated shape.
///
/// Endpoints may also answer with a bare array; `TodoClient` normalizes
/// both into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wrap a bare list: `count` is the list length, no neighbouring pages.
    pub fn from_vec(results: Vec<T>) -> Self {
        Self {
            count: results.len() as u64,
            next: None,
            previous: None,
            results,
        }
    }
}

/// Request payload for creating a new todo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateTodo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
}

impl CreateTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Check the field limits locally, producing the same error shape the
    /// backend would.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut fields = FieldErrors::new();
        check_title(&mut fields, Some(&self.title));
        check_description(&mut fields, self.description.as_deref());
        ApiError::from_fields(fields)
    }
}

/// Request payload for updating an existing todo. Only the fields present in
/// the JSON are applied; omitted fields remain unchanged on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateTodo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
}

impl UpdateTodo {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut fields = FieldErrors::new();
        if self.title.is_some() {
            check_title(&mut fields, self.title.as_deref());
        }
        check_description(&mut fields, self.description.as_deref());
        ApiError::from_fields(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: Status,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl CreateCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let mut fields = FieldErrors::new();
        let name = self.name.trim();
        if name.is_empty() {
            push(&mut fields, "name", "This field may not be blank.");
        } else if name.chars().count() > CATEGORY_NAME_MAX_CHARS {
            push(
                &mut fields,
                "name",
                format!("Ensure this field has no more than {CATEGORY_NAME_MAX_CHARS} characters."),
            );
        }
        ApiError::from_fields(fields)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

fn push(fields: &mut FieldErrors, field: &str, message: impl Into<String>) {
    fields.entry(field.to_string()).or_default().push(message.into());
}

fn check_title(fields: &mut FieldErrors, title: Option<&str>) {
    let title = title.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        push(fields, "title", "This field may not be blank.");
    } else if title.chars().count() > TITLE_MAX_CHARS {
        push(
            fields,
            "title",
            format!("Ensure this field has no more than {TITLE_MAX_CHARS} characters."),
        );
    }
}

fn check_description(fields: &mut FieldErrors, description: Option<&str>) {
    if description.is_some_and(|d| d.chars().count() > DESCRIPTION_MAX_CHARS) {
        push(
            fields,
            "description",
            format!("Ensure this field has no more than {DESCRIPTION_MAX_CHARS} characters."),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn todo_tolerates_missing_optional_fields() {
        let todo: Todo = serde_json::from_str(
            r#"{"id":1,"title":"T","priority":"urgent","status":"in_progress",
                "created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(todo.priority, Priority::Urgent);
        assert_eq!(todo.status, Status::InProgress);
        assert!(todo.category.is_none());
        assert!(todo.attachments.is_empty());
        assert!(!todo.is_overdue);
    }

    #[test]
    fn todo_ignores_display_fields() {
        let todo: Todo = serde_json::from_str(
            r#"{"id":1,"title":"T","priority":"low","priority_display":"Low","status":"pending",
                "status_display":"Pending","created_at":"2024-01-01T00:00:00Z",
                "updated_at":"2024-01-01T00:00:00Z","category":9,"category_details":null}"#,
        )
        .unwrap();
        assert_eq!(todo.category, Some(9));
        assert!(todo.category_details.is_none());
    }

    #[test]
    fn create_todo_omits_absent_fields() {
        let input = CreateTodo {
            priority: Some(Priority::Low),
            ..CreateTodo::new("Buy milk")
        };
        let body = serde_json::to_value(&input).unwrap();
        assert_eq!(body, serde_json::json!({"title": "Buy milk", "priority": "low"}));
    }

    #[test]
    fn update_todo_empty_serializes_to_empty_object() {
        let body = serde_json::to_string(&UpdateTodo::default()).unwrap();
        assert_eq!(body, "{}");
    }

    #[test]
    fn status_serializes_snake_case() {
        let body = serde_json::to_string(&StatusUpdate { status: Status::InProgress }).unwrap();
        assert_eq!(body, r#"{"status":"in_progress"}"#);
    }

    #[test]
    fn priority_and_status_parse_from_wire_names() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("cancelled".parse::<Status>().unwrap(), Status::Cancelled);
        assert!(matches!(
            "someday".parse::<Priority>(),
            Err(ApiError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn create_todo_validation_reports_fields() {
        let input = CreateTodo {
            description: Some("x".repeat(DESCRIPTION_MAX_CHARS + 1)),
            ..CreateTodo::new("   ")
        };
        let err = input.validate().unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("description"));
    }

    #[test]
    fn create_todo_title_limit_counts_chars() {
        assert!(CreateTodo::new("é".repeat(TITLE_MAX_CHARS)).validate().is_ok());
        assert!(CreateTodo::new("a".repeat(TITLE_MAX_CHARS + 1)).validate().is_err());
    }

    #[test]
    fn update_todo_validates_only_present_fields() {
        assert!(UpdateTodo::default().validate().is_ok());
        let blank = UpdateTodo {
            title: Some(String::new()),
            ..UpdateTodo::default()
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn category_name_is_required() {
        assert!(CreateCategory::new("").validate().is_err());
        assert!(CreateCategory::new("Work").validate().is_ok());
    }

    #[test]
    fn page_from_vec_counts_results() {
        let page = Page::from_vec(vec![1, 2, 3]);
        assert_eq!(page.count, 3);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }
}
