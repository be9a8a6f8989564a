//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results. Comparing parsed JSON (not raw strings) avoids
//! false negatives from field-ordering differences.

use serde_json::Value;
use todo_client::{
    ApiError, CreateTodo, ErrorKind, FieldErrors, HttpMethod, HttpResponse, Page, Status, Todo,
    TodoClient, TodoFilters,
};

const BASE_URL: &str = "http://localhost:8000/api";

fn client() -> TodoClient {
    TodoClient::new(BASE_URL)
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn load(raw: &str) -> Vec<Value> {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: Vec::new(),
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

fn headers(expected: &Value) -> Vec<(String, String)> {
    expected
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn body_json(body: Option<&str>) -> Value {
    body.map(|b| serde_json::from_str(b).unwrap()).unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[test]
fn list_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/list.json")) {
        let name = case["name"].as_str().unwrap();
        let filters: TodoFilters = serde_json::from_value(case["filters"].clone()).unwrap();
        let expected_req = &case["expected_request"];

        let req = c.build_list_todos(&filters);
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.path, format!("{BASE_URL}{}", expected_req["path"].as_str().unwrap()), "{name}: path");
        assert!(req.body.is_none(), "{name}: body should be None");

        let page = c.parse_list_todos(simulated(&case)).unwrap();
        let expected: Page<Todo> = serde_json::from_value(case["expected_result"].clone()).unwrap();
        assert_eq!(page, expected, "{name}: parsed result");
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[test]
fn create_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/create.json")) {
        let name = case["name"].as_str().unwrap();
        let input: CreateTodo = serde_json::from_value(case["input"].clone()).unwrap();
        let expected_req = &case["expected_request"];

        let req = c.build_create_todo(&input).unwrap();
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.path, format!("{BASE_URL}{}", expected_req["path"].as_str().unwrap()), "{name}: path");
        assert_eq!(req.headers, headers(&expected_req["headers"]), "{name}: headers");
        assert_eq!(body_json(req.body.as_deref()), expected_req["body"], "{name}: body");

        let todo = c.parse_create_todo(simulated(&case)).unwrap();
        let expected: Todo = serde_json::from_value(case["expected_result"].clone()).unwrap();
        assert_eq!(todo, expected, "{name}: parsed result");
    }
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

#[test]
fn status_test_vectors() {
    let c = client();
    for case in load(include_str!("../../test-vectors/status.json")) {
        let name = case["name"].as_str().unwrap();
        let id = case["input_id"].as_i64().unwrap();
        let expected_req = &case["expected_request"];

        let req = match case.get("input_status").and_then(Value::as_str) {
            Some(status) => c.build_update_status(id, status.parse::<Status>().unwrap()).unwrap(),
            None => c.build_mark_completed(id),
        };
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.path, format!("{BASE_URL}{}", expected_req["path"].as_str().unwrap()), "{name}: path");
        assert_eq!(body_json(req.body.as_deref()), expected_req["body"], "{name}: body");
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn error_test_vectors() {
    for case in load(include_str!("../../test-vectors/errors.json")) {
        let name = case["name"].as_str().unwrap();
        let response = HttpResponse {
            status: case["response"]["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: case["response"]["body"].as_str().unwrap().to_string(),
        };
        let err = ApiError::from_response(&response);

        let kind = match case["expected_kind"].as_str().unwrap() {
            "Validation" => ErrorKind::Validation,
            "NotFound" => ErrorKind::NotFound,
            "Server" => ErrorKind::Server,
            "Other" => ErrorKind::Other,
            other => panic!("{name}: unknown expected_kind: {other}"),
        };
        assert_eq!(err.kind(), kind, "{name}: kind");

        if let Some(fields) = case.get("expected_fields") {
            let expected: FieldErrors = serde_json::from_value(fields.clone()).unwrap();
            assert_eq!(err.field_errors(), Some(&expected), "{name}: fields");
        }
    }
}
