//! In-memory implementation of the todo backend's REST contract.
//!
//! Routes live under `/api` and follow the backend's conventions: trailing
//! slashes on every path, 400 responses carrying a field → messages map,
//! 404 with `{"detail": "Not found."}`. List endpoints answer with a bare
//! array or a page object depending on `ListShape`, so clients can be tested
//! against both.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;

const PRIORITIES: [&str; 4] = ["low", "medium", "high", "urgent"];
const STATUSES: [&str; 4] = ["pending", "in_progress", "completed", "cancelled"];

/// Shape of list responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListShape {
    #[default]
    Bare,
    Paginated,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub tasks_count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub priority_display: String,
    pub status: String,
    pub status_display: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub user: Option<i64>,
    pub category: Option<i64>,
    pub category_details: Option<Category>,
    pub attachments: Vec<serde_json::Value>,
    pub is_overdue: bool,
    pub days_until_due: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TodoInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub category: Option<i64>,
    pub user: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusInput {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TodoQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<i64>,
    pub user: Option<i64>,
    pub overdue: Option<String>,
}

#[derive(Clone, Debug)]
struct TodoRecord {
    id: i64,
    title: String,
    description: Option<String>,
    priority: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    due_date: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    user: Option<i64>,
    category: Option<i64>,
}

impl TodoRecord {
    fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != "completed" && self.due_date.is_some_and(|due| now > due)
    }

    fn is_open(&self) -> bool {
        self.status == "pending" || self.status == "in_progress"
    }

    fn set_status(&mut self, status: String, now: DateTime<Utc>) {
        if status == "completed" {
            if self.status != "completed" {
                self.completed_at = Some(now);
            }
        } else {
            self.completed_at = None;
        }
        self.status = status;
    }
}

#[derive(Clone, Debug)]
struct CategoryRecord {
    id: i64,
    name: String,
    description: Option<String>,
    color: String,
    icon: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Store {
    todos: BTreeMap<i64, TodoRecord>,
    categories: BTreeMap<i64, CategoryRecord>,
    users: BTreeMap<i64, User>,
    next_todo_id: i64,
    next_category_id: i64,
}

impl Store {
    fn seeded() -> Self {
        let mut store = Store {
            next_todo_id: 1,
            next_category_id: 1,
            ..Store::default()
        };
        store.users.insert(
            1,
            User {
                id: 1,
                username: "demo".to_string(),
                email: Some("demo@example.com".to_string()),
                first_name: None,
                last_name: None,
            },
        );
        store
    }

    fn category_view(&self, record: &CategoryRecord) -> Category {
        Category {
            id: record.id,
            name: record.name.clone(),
            description: record.description.clone(),
            color: record.color.clone(),
            icon: record.icon.clone(),
            created_at: record.created_at,
            tasks_count: self.todos.values().filter(|t| t.category == Some(record.id)).count() as u32,
        }
    }

    fn todo_view(&self, record: &TodoRecord, now: DateTime<Utc>) -> Todo {
        Todo {
            id: record.id,
            title: record.title.clone(),
            description: record.description.clone(),
            priority: record.priority.clone(),
            priority_display: display(&record.priority),
            status: record.status.clone(),
            status_display: display(&record.status),
            created_at: record.created_at,
            updated_at: record.updated_at,
            due_date: record.due_date,
            completed_at: record.completed_at,
            user: record.user,
            category: record.category,
            category_details: record
                .category
                .and_then(|id| self.categories.get(&id))
                .map(|c| self.category_view(c)),
            attachments: Vec::new(),
            is_overdue: record.is_overdue(now),
            days_until_due: record.due_date.map(|due| (due - now).num_days()),
        }
    }

    /// Newest first, as the backend orders them.
    fn todo_views<'a>(&self, records: impl Iterator<Item = &'a TodoRecord>, now: DateTime<Utc>) -> Vec<Todo> {
        let mut views: Vec<Todo> = records.map(|r| self.todo_view(r, now)).collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        views
    }
}

fn display(value: &str) -> String {
    let spaced = value.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Field name → messages, rendered as a 400.
#[derive(Debug, Default)]
struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    fn into_result(self) -> Result<(), Failure> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Failure::Invalid(self.0))
        }
    }
}

#[derive(Debug)]
pub enum Failure {
    NotFound,
    Invalid(BTreeMap<String, Vec<String>>),
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        match self {
            Failure::NotFound => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
            Failure::Invalid(fields) => (StatusCode::BAD_REQUEST, Json(fields)).into_response(),
        }
    }
}

fn check_choice(errors: &mut FieldErrors, field: &str, value: Option<&str>, choices: &[&str]) {
    if let Some(value) = value {
        if !choices.contains(&value) {
            errors.add(field, format!("\"{value}\" is not a valid choice."));
        }
    }
}

fn check_length(errors: &mut FieldErrors, field: &str, value: Option<&str>, max: usize) {
    if value.is_some_and(|v| v.chars().count() > max) {
        errors.add(field, format!("Ensure this field has no more than {max} characters."));
    }
}

#[derive(Clone)]
pub struct AppState {
    db: Arc<RwLock<Store>>,
    shape: ListShape,
}

impl AppState {
    fn list<T: Serialize>(&self, items: Vec<T>) -> Json<serde_json::Value> {
        match self.shape {
            ListShape::Bare => Json(json!(items)),
            ListShape::Paginated => Json(json!({
                "count": items.len(),
                "next": null,
                "previous": null,
                "results": items,
            })),
        }
    }
}

pub fn app() -> Router {
    app_with(ListShape::default())
}

pub fn app_with(shape: ListShape) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Store::seeded())),
        shape,
    };
    let api = Router::new()
        .route("/todos/", get(list_todos).post(create_todo))
        .route("/todos/stats/", get(stats))
        .route("/todos/high_priority/", get(high_priority))
        .route("/todos/overdue/", get(overdue))
        .route("/todos/{id}/", get(get_todo).patch(update_todo).delete(delete_todo))
        .route("/todos/{id}/update_status/", patch(update_status))
        .route("/todos/{id}/mark_completed/", post(mark_completed))
        .route("/categories/", get(list_categories).post(create_category))
        .route(
            "/categories/{id}/",
            get(get_category).patch(update_category).delete(delete_category),
        )
        .route("/users/", get(list_users))
        .with_state(state);
    Router::new().nest("/api", api).layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener, shape: ListShape) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(shape)).await
}

// -- todos ------------------------------------------------------------------

async fn list_todos(State(state): State<AppState>, Query(query): Query<TodoQuery>) -> Json<serde_json::Value> {
    let db = state.db.read().await;
    let now = Utc::now();
    let search = query.search.as_deref().map(str::to_lowercase).filter(|s| !s.is_empty());
    let overdue = query
        .overdue
        .as_deref()
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"));
    let matching = db.todos.values().filter(|t| {
        query.status.as_deref().map_or(true, |s| t.status == s)
            && query.priority.as_deref().map_or(true, |p| t.priority == p)
            && query.category.map_or(true, |c| t.category == Some(c))
            && query.user.map_or(true, |u| t.user == Some(u))
            && search.as_deref().map_or(true, |s| {
                t.title.to_lowercase().contains(s)
                    || t.description.as_deref().is_some_and(|d| d.to_lowercase().contains(s))
            })
            && overdue.map_or(true, |flag| !flag || (t.is_open() && t.due_date.is_some_and(|due| due < now)))
    });
    state.list(db.todo_views(matching, now))
}

fn validate_todo(db: &Store, input: &TodoInput, creating: bool) -> Result<(), Failure> {
    let mut errors = FieldErrors::default();
    match input.title.as_deref().map(str::trim) {
        None if creating => errors.add("title", "This field is required."),
        Some("") => errors.add("title", "This field may not be blank."),
        title => check_length(&mut errors, "title", title, 200),
    }
    check_length(&mut errors, "description", input.description.as_deref(), 1000);
    check_choice(&mut errors, "priority", input.priority.as_deref(), &PRIORITIES);
    check_choice(&mut errors, "status", input.status.as_deref(), &STATUSES);
    if let Some(id) = input.category {
        if !db.categories.contains_key(&id) {
            errors.add("category", format!("Invalid pk \"{id}\" - object does not exist."));
        }
    }
    if let Some(id) = input.user {
        if !db.users.contains_key(&id) {
            errors.add("user", format!("Invalid pk \"{id}\" - object does not exist."));
        }
    }
    errors.into_result()
}

async fn create_todo(
    State(state): State<AppState>,
    Json(input): Json<TodoInput>,
) -> Result<(StatusCode, Json<Todo>), Failure> {
    let mut db = state.db.write().await;
    validate_todo(&db, &input, true)?;
    let now = Utc::now();
    let id = db.next_todo_id;
    db.next_todo_id += 1;
    let mut record = TodoRecord {
        id,
        title: input.title.unwrap_or_default().trim().to_string(),
        description: input.description,
        priority: input.priority.unwrap_or_else(|| "medium".to_string()),
        status: "pending".to_string(),
        created_at: now,
        updated_at: now,
        due_date: input.due_date,
        completed_at: None,
        user: input.user,
        category: input.category,
    };
    if let Some(status) = input.status {
        record.set_status(status, now);
    }
    db.todos.insert(id, record.clone());
    tracing::debug!(id, "todo created");
    Ok((StatusCode::CREATED, Json(db.todo_view(&record, now))))
}

async fn get_todo(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Todo>, Failure> {
    let db = state.db.read().await;
    let record = db.todos.get(&id).ok_or(Failure::NotFound)?;
    Ok(Json(db.todo_view(record, Utc::now())))
}

async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<TodoInput>,
) -> Result<Json<Todo>, Failure> {
    let mut db = state.db.write().await;
    if !db.todos.contains_key(&id) {
        return Err(Failure::NotFound);
    }
    validate_todo(&db, &input, false)?;
    let now = Utc::now();
    let record = db.todos.get_mut(&id).ok_or(Failure::NotFound)?;
    if let Some(title) = input.title {
        record.title = title.trim().to_string();
    }
    if let Some(description) = input.description {
        record.description = Some(description);
    }
    if let Some(priority) = input.priority {
        record.priority = priority;
    }
    if let Some(due_date) = input.due_date {
        record.due_date = Some(due_date);
    }
    if let Some(category) = input.category {
        record.category = Some(category);
    }
    if let Some(user) = input.user {
        record.user = Some(user);
    }
    if let Some(status) = input.status {
        record.set_status(status, now);
    }
    record.updated_at = now;
    let record = record.clone();
    Ok(Json(db.todo_view(&record, now)))
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<StatusInput>,
) -> Result<Json<Todo>, Failure> {
    let mut db = state.db.write().await;
    if !db.todos.contains_key(&id) {
        return Err(Failure::NotFound);
    }
    let mut errors = FieldErrors::default();
    match input.status.as_deref() {
        None => errors.add("status", "This field is required."),
        status => check_choice(&mut errors, "status", status, &STATUSES),
    }
    errors.into_result()?;
    let now = Utc::now();
    let record = db.todos.get_mut(&id).ok_or(Failure::NotFound)?;
    record.set_status(input.status.unwrap_or_default(), now);
    record.updated_at = now;
    let record = record.clone();
    Ok(Json(db.todo_view(&record, now)))
}

async fn mark_completed(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Todo>, Failure> {
    let mut db = state.db.write().await;
    let now = Utc::now();
    let record = db.todos.get_mut(&id).ok_or(Failure::NotFound)?;
    record.status = "completed".to_string();
    record.completed_at = Some(now);
    record.updated_at = now;
    let record = record.clone();
    Ok(Json(db.todo_view(&record, now)))
}

async fn delete_todo(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, Failure> {
    let mut db = state.db.write().await;
    db.todos.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(Failure::NotFound)
}

async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db = state.db.read().await;
    let now = Utc::now();
    let count = |status: &str| db.todos.values().filter(|t| t.status == status).count();
    let total = db.todos.len();
    let completed = count("completed");
    let overdue = db
        .todos
        .values()
        .filter(|t| t.is_open() && t.due_date.is_some_and(|due| due < now))
        .count();
    let completion_rate = if total == 0 {
        0.0
    } else {
        (completed as f64 / total as f64 * 1000.0).round() / 10.0
    };
    let by_priority: HashMap<&str, usize> = PRIORITIES
        .iter()
        .map(|p| (*p, db.todos.values().filter(|t| t.priority == *p).count()))
        .collect();
    let by_category: HashMap<String, usize> = db
        .categories
        .values()
        .map(|c| (c.name.clone(), db.todos.values().filter(|t| t.category == Some(c.id)).count()))
        .collect();
    Json(json!({
        "total_tasks": total,
        "pending_tasks": count("pending"),
        "completed_tasks": completed,
        "in_progress_tasks": count("in_progress"),
        "cancelled_tasks": count("cancelled"),
        "overdue_tasks": overdue,
        "completion_rate": completion_rate,
        "tasks_by_priority": by_priority,
        "tasks_by_category": by_category,
    }))
}

async fn high_priority(State(state): State<AppState>) -> Json<Vec<Todo>> {
    let db = state.db.read().await;
    let matching = db
        .todos
        .values()
        .filter(|t| (t.priority == "high" || t.priority == "urgent") && t.status != "completed" && t.status != "cancelled");
    Json(db.todo_views(matching, Utc::now()))
}

async fn overdue(State(state): State<AppState>) -> Json<Vec<Todo>> {
    let db = state.db.read().await;
    let now = Utc::now();
    let matching = db
        .todos
        .values()
        .filter(|t| t.is_open() && t.due_date.is_some_and(|due| due < now));
    Json(db.todo_views(matching, now))
}

// -- categories -------------------------------------------------------------

async fn list_categories(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db = state.db.read().await;
    let mut views: Vec<Category> = db.categories.values().map(|c| db.category_view(c)).collect();
    views.sort_by(|a, b| a.name.cmp(&b.name));
    state.list(views)
}

fn validate_category(db: &Store, id: Option<i64>, input: &CategoryInput, creating: bool) -> Result<(), Failure> {
    let mut errors = FieldErrors::default();
    match input.name.as_deref().map(str::trim) {
        None if creating => errors.add("name", "This field is required."),
        Some("") => errors.add("name", "This field may not be blank."),
        Some(name) if db.categories.values().any(|c| c.name == name && Some(c.id) != id) => {
            errors.add("name", "todo category with this name already exists.")
        }
        name => check_length(&mut errors, "name", name, 100),
    }
    check_length(&mut errors, "color", input.color.as_deref(), 7);
    check_length(&mut errors, "icon", input.icon.as_deref(), 50);
    errors.into_result()
}

async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), Failure> {
    let mut db = state.db.write().await;
    validate_category(&db, None, &input, true)?;
    let id = db.next_category_id;
    db.next_category_id += 1;
    let record = CategoryRecord {
        id,
        name: input.name.unwrap_or_default().trim().to_string(),
        description: input.description,
        color: input.color.unwrap_or_else(|| "#007bff".to_string()),
        icon: input.icon,
        created_at: Utc::now(),
    };
    let view = db.category_view(&record);
    db.categories.insert(id, record);
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Category>, Failure> {
    let db = state.db.read().await;
    let record = db.categories.get(&id).ok_or(Failure::NotFound)?;
    Ok(Json(db.category_view(record)))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, Failure> {
    let mut db = state.db.write().await;
    if !db.categories.contains_key(&id) {
        return Err(Failure::NotFound);
    }
    validate_category(&db, Some(id), &input, false)?;
    let record = db.categories.get_mut(&id).ok_or(Failure::NotFound)?;
    if let Some(name) = input.name {
        record.name = name.trim().to_string();
    }
    if let Some(description) = input.description {
        record.description = Some(description);
    }
    if let Some(color) = input.color {
        record.color = color;
    }
    if let Some(icon) = input.icon {
        record.icon = Some(icon);
    }
    let record = record.clone();
    Ok(Json(db.category_view(&record)))
}

/// Todos keep existing but lose their category reference.
async fn delete_category(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, Failure> {
    let mut db = state.db.write().await;
    db.categories.remove(&id).ok_or(Failure::NotFound)?;
    for todo in db.todos.values_mut().filter(|t| t.category == Some(id)) {
        todo.category = None;
    }
    Ok(StatusCode::NO_CONTENT)
}

// -- users ------------------------------------------------------------------

async fn list_users(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db = state.db.read().await;
    state.list(db.users.values().cloned().collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(status: &str, due_in_days: Option<i64>) -> TodoRecord {
        let now = Utc::now();
        TodoRecord {
            id: 1,
            title: "T".to_string(),
            description: None,
            priority: "medium".to_string(),
            status: status.to_string(),
            created_at: now,
            updated_at: now,
            due_date: due_in_days.map(|d| now + Duration::days(d)),
            completed_at: None,
            user: None,
            category: None,
        }
    }

    #[test]
    fn display_labels() {
        assert_eq!(display("in_progress"), "In progress");
        assert_eq!(display("urgent"), "Urgent");
    }

    #[test]
    fn overdue_requires_past_due_and_not_completed() {
        let now = Utc::now();
        assert!(record("pending", Some(-2)).is_overdue(now));
        assert!(!record("completed", Some(-2)).is_overdue(now));
        assert!(!record("pending", Some(3)).is_overdue(now));
        assert!(!record("pending", None).is_overdue(now));
    }

    #[test]
    fn completing_stamps_and_reopening_clears() {
        let now = Utc::now();
        let mut todo = record("pending", None);
        todo.set_status("completed".to_string(), now);
        assert_eq!(todo.completed_at, Some(now));
        todo.set_status("pending".to_string(), now);
        assert!(todo.completed_at.is_none());
    }

    #[test]
    fn todo_input_accepts_partial_bodies() {
        let input: TodoInput = serde_json::from_str(r#"{"title":"New title"}"#).unwrap();
        assert_eq!(input.title.as_deref(), Some("New title"));
        assert!(input.status.is_none());
        let input: TodoInput = serde_json::from_str("{}").unwrap();
        assert!(input.title.is_none());
    }

    #[test]
    fn missing_title_is_a_field_error_on_create_only() {
        let db = Store::seeded();
        let input: TodoInput = serde_json::from_str("{}").unwrap();
        assert!(matches!(validate_todo(&db, &input, true), Err(Failure::Invalid(f)) if f.contains_key("title")));
        assert!(validate_todo(&db, &input, false).is_ok());
    }

    #[test]
    fn unknown_choice_and_category_are_rejected() {
        let db = Store::seeded();
        let input: TodoInput =
            serde_json::from_str(r#"{"title":"x","priority":"someday","category":99}"#).unwrap();
        let Err(Failure::Invalid(fields)) = validate_todo(&db, &input, true) else {
            panic!("expected validation failure");
        };
        assert!(fields.contains_key("priority"));
        assert!(fields.contains_key("category"));
    }
}
