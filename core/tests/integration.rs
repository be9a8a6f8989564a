//! Full lifecycle tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `QueryClient` over
//! real HTTP with the ureq transport. Validates that request building,
//! response parsing and cache reconciliation agree with an actual backend.

use std::net::SocketAddr;

use mock_server::ListShape;
use todo_client::{
    ApiError, ClientConfig, CreateCategory, CreateTodo, Priority, QueryClient, QueryKey, Status,
    TodoFilters, UpdateTodo, UreqTransport,
};

fn start_server(shape: ListShape) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, shape).await
        })
        .unwrap();
    });

    addr
}

fn connect(addr: SocketAddr) -> QueryClient<UreqTransport> {
    let mut config = ClientConfig::new(format!("http://{addr}/api"));
    config.log_requests = false;
    QueryClient::connect(config)
}

#[tokio::test(flavor = "multi_thread")]
async fn todo_lifecycle() {
    let qc = connect(start_server(ListShape::Bare));
    assert!(qc.test_connection().await);

    // Step 1: list is empty.
    let all = TodoFilters::default();
    let page = qc.todos(&all).await.data.unwrap();
    assert_eq!(page.count, 0);

    // Step 2: create in a category.
    let category = qc.create_category(CreateCategory::new("Home")).await.unwrap();
    let mut input = CreateTodo::new("Integration test");
    input.priority = Some(Priority::Urgent);
    input.category = Some(category.id);
    let created = qc.create_todo(input).await.unwrap();
    assert_eq!(created.status, Status::Pending);
    assert_eq!(created.category_details.as_ref().unwrap().name, "Home");

    // Step 3: the stale list refreshes in the background.
    qc.todos(&all).await;
    qc.idle().await;
    let page = qc.todos(&all).await.data.unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].id, created.id);

    // Step 4: derived lists and stats.
    assert_eq!(qc.high_priority().await.data.unwrap().len(), 1);
    assert!(qc.overdue().await.data.unwrap().is_empty());
    let stats = qc.stats().await.data.unwrap();
    assert_eq!(stats.total_tasks, 1);
    assert_eq!(stats.tasks_by_category.get("Home"), Some(&1));

    // Step 5: update, served from cache afterwards.
    let patch = UpdateTodo {
        title: Some("Updated title".to_string()),
        ..UpdateTodo::default()
    };
    let updated = qc.update_todo(created.id, patch).await.unwrap();
    assert_eq!(updated.title, "Updated title");
    assert_eq!(qc.peek(&QueryKey::Todo(created.id)).typed::<todo_client::Todo>().data, Some(updated));

    // Step 6: complete it.
    let done = qc.update_status(created.id, Status::Completed).await.unwrap();
    assert!(done.completed_at.is_some());
    let stats = qc.refetch(QueryKey::TodoStats).await.typed::<todo_client::TodoStats>().data.unwrap();
    assert_eq!(stats.completed_tasks, 1);
    assert_eq!(stats.completion_rate, 100.0);

    // Step 7: filtering by status.
    let filters = TodoFilters::from_params([("status", "completed"), ("search", "updated")]).unwrap();
    let page = qc.todos(&filters).await.data.unwrap();
    assert_eq!(page.count, 1);

    // Step 8: delete, then both reads and writes report NotFound.
    qc.delete_todo(created.id).await.unwrap();
    assert!(qc.peek(&QueryKey::Todo(created.id)).data.is_none());
    let state = qc.todo(created.id).await;
    assert_eq!(state.error, Some(ApiError::NotFound));
    let err = qc.delete_todo(created.id).await.unwrap_err();
    assert_eq!(err, ApiError::NotFound);

    qc.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn server_validation_surfaces_field_errors() {
    let qc = connect(start_server(ListShape::Bare));

    qc.create_category(CreateCategory::new("Work")).await.unwrap();
    let err = qc.create_category(CreateCategory::new("Work")).await.unwrap_err();
    assert!(err.field_errors().unwrap().contains_key("name"));

    let mut input = CreateTodo::new("Orphan");
    input.category = Some(404);
    let err = qc.create_todo(input).await.unwrap_err();
    assert!(err.field_errors().unwrap().contains_key("category"));
}

#[tokio::test(flavor = "multi_thread")]
async fn paginated_lists_normalize_the_same_way() {
    let qc = connect(start_server(ListShape::Paginated));

    let users = qc.users().await.data.unwrap();
    assert_eq!(users.count, 1);
    assert_eq!(users.results[0].username, "demo");

    let category = qc.create_category(CreateCategory::new("Errands")).await.unwrap();
    let mut input = CreateTodo::new("Post office");
    input.category = Some(category.id);
    qc.create_todo(input).await.unwrap();
    let categories = qc.categories().await.data.unwrap();
    assert_eq!(categories.results[0].id, category.id);

    let page = qc.todos(&TodoFilters::default()).await.data.unwrap();
    assert_eq!(page.count, 1);
    assert!(page.next.is_none());

    // deleting the category leaves its todos in place
    qc.delete_category(category.id).await.unwrap();
    let state = qc.category(category.id).await;
    assert_eq!(state.error, Some(ApiError::NotFound));
    let page = qc
        .refetch(QueryKey::todos(&TodoFilters::default()))
        .await
        .typed::<todo_client::Page<todo_client::Todo>>()
        .data
        .unwrap();
    assert_eq!(page.count, 1);
    assert!(page.results[0].category.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_backend_reports_an_error() {
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let qc = connect(addr);

    assert!(!qc.test_connection().await);
    let state = qc.stats().await;
    assert!(state.data.is_none());
    assert!(matches!(state.error, Some(ApiError::Unreachable(_))));
}
