//! Request building and response parsing for every backend operation.
//!
//! # Design
//! `TodoClient` only knows the API root. Every operation comes as a pair:
//! `build_*` returns the `HttpRequest` to send and `parse_*` turns the
//! `HttpResponse` into a typed result or an `ApiError`. Nothing here touches
//! the network, so request shapes are tested against canned responses.
//!
//! List endpoints may answer with a bare array or with a page object. Both
//! are normalized into `Page<T>` here so nothing above this layer has to
//! care which one the backend sent.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::filters::TodoFilters;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    CategoryId, CreateCategory, CreateTodo, Page, Status, StatusUpdate, Todo, TodoCategory, TodoId,
    TodoStats, UpdateCategory, UpdateTodo, User,
};

/// Builds requests against one API root. Holds no per-call state.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    fn json_request<T: Serialize>(&self, method: HttpMethod, path: &str, input: &T) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
            ..self.request(method, path)
        })
    }

    // -- todos --------------------------------------------------------------

    pub fn build_list_todos(&self, filters: &TodoFilters) -> HttpRequest {
        let query = filters.to_query_string();
        if query.is_empty() {
            self.request(HttpMethod::Get, "/todos/")
        } else {
            self.request(HttpMethod::Get, &format!("/todos/?{query}"))
        }
    }

    pub fn build_get_todo(&self, id: TodoId) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/todos/{id}/"))
    }

    pub fn build_create_todo(&self, input: &CreateTodo) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/todos/", input)
    }

    pub fn build_update_todo(&self, id: TodoId, input: &UpdateTodo) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Patch, &format!("/todos/{id}/"), input)
    }

    pub fn build_update_status(&self, id: TodoId, status: Status) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Patch,
            &format!("/todos/{id}/update_status/"),
            &StatusUpdate { status },
        )
    }

    pub fn build_mark_completed(&self, id: TodoId) -> HttpRequest {
        self.request(HttpMethod::Post, &format!("/todos/{id}/mark_completed/"))
    }

    pub fn build_delete_todo(&self, id: TodoId) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/todos/{id}/"))
    }

    pub fn build_get_stats(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/todos/stats/")
    }

    pub fn build_list_high_priority(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/todos/high_priority/")
    }

    pub fn build_list_overdue(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/todos/overdue/")
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Page<Todo>, ApiError> {
        parse_page(response)
    }

    pub fn parse_get_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        parse_json(response)
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        parse_json(response)
    }

    pub fn parse_update_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        parse_json(response)
    }

    pub fn parse_update_status(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        parse_json(response)
    }

    pub fn parse_mark_completed(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        parse_json(response)
    }

    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_get_stats(&self, response: HttpResponse) -> Result<TodoStats, ApiError> {
        parse_json(response)
    }

    pub fn parse_list_high_priority(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        parse_json(response)
    }

    pub fn parse_list_overdue(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        parse_json(response)
    }

    // -- categories ---------------------------------------------------------

    pub fn build_list_categories(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/categories/")
    }

    pub fn build_get_category(&self, id: CategoryId) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/categories/{id}/"))
    }

    pub fn build_create_category(&self, input: &CreateCategory) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/categories/", input)
    }

    pub fn build_update_category(&self, id: CategoryId, input: &UpdateCategory) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Patch, &format!("/categories/{id}/"), input)
    }

    pub fn build_delete_category(&self, id: CategoryId) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/categories/{id}/"))
    }

    pub fn parse_list_categories(&self, response: HttpResponse) -> Result<Page<TodoCategory>, ApiError> {
        parse_page(response)
    }

    pub fn parse_get_category(&self, response: HttpResponse) -> Result<TodoCategory, ApiError> {
        parse_json(response)
    }

    pub fn parse_create_category(&self, response: HttpResponse) -> Result<TodoCategory, ApiError> {
        parse_json(response)
    }

    pub fn parse_update_category(&self, response: HttpResponse) -> Result<TodoCategory, ApiError> {
        parse_json(response)
    }

    pub fn parse_delete_category(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    // -- users --------------------------------------------------------------

    pub fn build_list_users(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/users/")
    }

    pub fn parse_list_users(&self, response: HttpResponse) -> Result<Page<User>, ApiError> {
        parse_page(response)
    }
}

/// Either list shape the backend may send.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Paged(Page<T>),
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ApiError::from_response(response))
    }
}

fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

fn parse_page<T: DeserializeOwned>(response: HttpResponse) -> Result<Page<T>, ApiError> {
    match parse_json(response)? {
        ListBody::Bare(results) => Ok(Page::from_vec(results)),
        ListBody::Paged(page) => Ok(page),
    }
}
