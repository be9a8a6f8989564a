//! Scripted in-memory transport shared by the async client tests.
//!
//! Replies are queued per `"METHOD /path"` route (path relative to
//! `BASE_URL`, query string included) and consumed in order. A gated reply
//! is held back until the test releases it, which lets tests choose the
//! order in which concurrent requests complete.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use todo_client::{
    ClientConfig, HttpRequest, HttpResponse, QueryClient, Transport, TransportError,
};
use tokio::sync::oneshot;

pub const BASE_URL: &str = "http://fake.test/api";

enum Reply {
    Ready(Result<HttpResponse, TransportError>),
    Gated(oneshot::Receiver<()>, HttpResponse),
}

#[derive(Default)]
struct Script {
    calls: Vec<HttpRequest>,
    replies: HashMap<String, VecDeque<Reply>>,
}

#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<Script>,
}

fn route(method: &str, path: &str) -> String {
    format!("{method} {path}")
}

pub fn response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: if body.is_null() { String::new() } else { body.to_string() },
    }
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: &str, path: &str, reply: Reply) {
        self.script
            .lock()
            .unwrap()
            .replies
            .entry(route(method, path))
            .or_default()
            .push_back(reply);
    }

    pub fn reply(&self, method: &str, path: &str, status: u16, body: Value) {
        self.push(method, path, Reply::Ready(Ok(response(status, body))));
    }

    pub fn fail(&self, method: &str, path: &str, message: &str) {
        self.push(method, path, Reply::Ready(Err(TransportError::new(message))));
    }

    /// Queue a reply that is only delivered once the returned sender fires.
    pub fn gate(&self, method: &str, path: &str, status: u16, body: Value) -> oneshot::Sender<()> {
        let (release, wait) = oneshot::channel();
        self.push(method, path, Reply::Gated(wait, response(status, body)));
        release
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Number of requests made to `"METHOD /path"`.
    pub fn count(&self, method: &str, path: &str) -> usize {
        let target = format!("{BASE_URL}{path}");
        self.calls()
            .iter()
            .filter(|c| c.method.as_str() == method && c.path == target)
            .count()
    }
}

impl Transport for FakeTransport {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        let reply = {
            let mut script = self.script.lock().unwrap();
            let path = request.path.strip_prefix(BASE_URL).unwrap_or(&request.path).to_string();
            let key = route(request.method.as_str(), &path);
            script.calls.push(request);
            script.replies.get_mut(&key).and_then(VecDeque::pop_front).ok_or(key)
        };
        async move {
            tokio::task::yield_now().await;
            match reply {
                Ok(Reply::Ready(result)) => result,
                Ok(Reply::Gated(wait, response)) => {
                    let _ = wait.await;
                    Ok(response)
                }
                Err(key) => Err(TransportError::new(format!("no scripted reply for {key}"))),
            }
        }
    }
}

pub fn client(transport: &Arc<FakeTransport>) -> QueryClient<Arc<FakeTransport>> {
    let mut config = ClientConfig::new(BASE_URL);
    config.log_requests = false;
    QueryClient::new(config, Arc::clone(transport))
}

pub fn todo_json(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": null,
        "priority": "medium",
        "status": "pending",
        "created_at": "2026-01-05T09:00:00Z",
        "updated_at": "2026-01-05T09:00:00Z",
        "due_date": null,
        "completed_at": null,
        "user": 1,
        "category": null,
        "category_details": null,
        "attachments": [],
        "is_overdue": false,
        "days_until_due": null
    })
}

pub fn category_json(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": null,
        "color": "#007bff",
        "icon": null,
        "created_at": "2026-01-01T00:00:00Z",
        "tasks_count": 0
    })
}

pub fn stats_json(total: u32) -> Value {
    json!({
        "total_tasks": total,
        "pending_tasks": total,
        "completed_tasks": 0,
        "in_progress_tasks": 0,
        "cancelled_tasks": 0,
        "overdue_tasks": 0,
        "completion_rate": 0.0,
        "tasks_by_priority": {"medium": total},
        "tasks_by_category": {}
    })
}
