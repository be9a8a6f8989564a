//! Async resource API: one call-and-parse function per backend operation.
//!
//! `TodoApi` pairs the stateless `TodoClient` with a `Transport`. It never
//! swallows errors; transport failures become `ApiError::Unreachable` and
//! non-2xx responses are classified by the parse step. No retries happen
//! here.

use tracing::{debug, warn};

use crate::client::TodoClient;
use crate::error::ApiError;
use crate::filters::TodoFilters;
use crate::http::{HttpRequest, HttpResponse};
use crate::keys::{QueryData, QueryKey};
use crate::transport::Transport;
use crate::types::{
    CategoryId, CreateCategory, CreateTodo, Page, Status, Todo, TodoCategory, TodoId, TodoStats,
    UpdateCategory, UpdateTodo, User,
};

#[derive(Debug)]
pub struct TodoApi<T> {
    client: TodoClient,
    transport: T,
    log_requests: bool,
}

impl<T: Transport> TodoApi<T> {
    pub fn new(client: TodoClient, transport: T, log_requests: bool) -> Self {
        Self {
            client,
            transport,
            log_requests,
        }
    }

    pub fn client(&self) -> &TodoClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute one request. Logs only when request logging is enabled.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let (method, path) = (request.method, request.path.clone());
        if self.log_requests {
            debug!(%method, %path, "dispatching request");
        }
        match self.transport.execute(request).await {
            Ok(response) => {
                if self.log_requests && !response.is_success() {
                    warn!(%method, %path, status = response.status, body = %response.body, "request failed");
                }
                Ok(response)
            }
            Err(e) => {
                if self.log_requests {
                    warn!(%method, %path, error = %e, "no response from server");
                }
                Err(ApiError::Unreachable(e.message))
            }
        }
    }

    pub async fn list_todos(&self, filters: &TodoFilters) -> Result<Page<Todo>, ApiError> {
        let response = self.send(self.client.build_list_todos(filters)).await?;
        self.client.parse_list_todos(response)
    }

    pub async fn get_todo(&self, id: TodoId) -> Result<Todo, ApiError> {
        let response = self.send(self.client.build_get_todo(id)).await?;
        self.client.parse_get_todo(response)
    }

    pub async fn create_todo(&self, input: &CreateTodo) -> Result<Todo, ApiError> {
        let response = self.send(self.client.build_create_todo(input)?).await?;
        self.client.parse_create_todo(response)
    }

    pub async fn update_todo(&self, id: TodoId, input: &UpdateTodo) -> Result<Todo, ApiError> {
        let response = self.send(self.client.build_update_todo(id, input)?).await?;
        self.client.parse_update_todo(response)
    }

    pub async fn update_status(&self, id: TodoId, status: Status) -> Result<Todo, ApiError> {
        let response = self.send(self.client.build_update_status(id, status)?).await?;
        self.client.parse_update_status(response)
    }

    pub async fn mark_completed(&self, id: TodoId) -> Result<Todo, ApiError> {
        let response = self.send(self.client.build_mark_completed(id)).await?;
        self.client.parse_mark_completed(response)
    }

    pub async fn delete_todo(&self, id: TodoId) -> Result<(), ApiError> {
        let response = self.send(self.client.build_delete_todo(id)).await?;
        self.client.parse_delete_todo(response)
    }

    pub async fn get_stats(&self) -> Result<TodoStats, ApiError> {
        let response = self.send(self.client.build_get_stats()).await?;
        self.client.parse_get_stats(response)
    }

    pub async fn list_high_priority(&self) -> Result<Vec<Todo>, ApiError> {
        let response = self.send(self.client.build_list_high_priority()).await?;
        self.client.parse_list_high_priority(response)
    }

    pub async fn list_overdue(&self) -> Result<Vec<Todo>, ApiError> {
        let response = self.send(self.client.build_list_overdue()).await?;
        self.client.parse_list_overdue(response)
    }

    pub async fn list_categories(&self) -> Result<Page<TodoCategory>, ApiError> {
        let response = self.send(self.client.build_list_categories()).await?;
        self.client.parse_list_categories(response)
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<TodoCategory, ApiError> {
        let response = self.send(self.client.build_get_category(id)).await?;
        self.client.parse_get_category(response)
    }

    pub async fn create_category(&self, input: &CreateCategory) -> Result<TodoCategory, ApiError> {
        let response = self.send(self.client.build_create_category(input)?).await?;
        self.client.parse_create_category(response)
    }

    pub async fn update_category(&self, id: CategoryId, input: &UpdateCategory) -> Result<TodoCategory, ApiError> {
        let response = self.send(self.client.build_update_category(id, input)?).await?;
        self.client.parse_update_category(response)
    }

    pub async fn delete_category(&self, id: CategoryId) -> Result<(), ApiError> {
        let response = self.send(self.client.build_delete_category(id)).await?;
        self.client.parse_delete_category(response)
    }

    pub async fn list_users(&self) -> Result<Page<User>, ApiError> {
        let response = self.send(self.client.build_list_users()).await?;
        self.client.parse_list_users(response)
    }

    /// `true` when the todo list endpoint answers with a 2xx.
    pub async fn test_connection(&self) -> bool {
        match self.send(self.client.build_list_todos(&TodoFilters::default())).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                warn!(error = %e, "API connection failed");
                false
            }
        }
    }

    /// Run the read that backs `key`.
    pub async fn fetch(&self, key: &QueryKey) -> Result<QueryData, ApiError> {
        let data = match key {
            QueryKey::Todos(filters) => self.list_todos(filters).await?.into(),
            QueryKey::Todo(id) => self.get_todo(*id).await?.into(),
            QueryKey::TodoStats => self.get_stats().await?.into(),
            QueryKey::HighPriority => QueryData::TodoList(self.list_high_priority().await?),
            QueryKey::Overdue => QueryData::TodoList(self.list_overdue().await?),
            QueryKey::Categories => self.list_categories().await?.into(),
            QueryKey::Category(id) => self.get_category(*id).await?.into(),
            QueryKey::Users => self.list_users().await?.into(),
        };
        Ok(data)
    }
}
