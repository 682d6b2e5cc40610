//! HTTP Server Integration Tests
//!
//! These tests run the real client against [`HttpServer`] backed by a
//! [`MemoryStore`] and cover:
//! - the write path: add, update, removal and cleanup
//! - queries, retrieval and aggregates across separate clients
//! - actions, unknown methods and the user directory
//! - API key checks and non-POST requests

use graphrpc_client::{ClientConfig, GraphRpcClient, OnlineState, RetryConfig};
use graphrpc_common::auth::AuthConfig;
use graphrpc_common::graph::{
    DomainType, ObjectRef, PersistentObject, TypeDescriptor, TypeRegistry, Value, ValueKind,
};
use graphrpc_common::protocol::{ErrorCode, Filter, Paging};
use graphrpc_common::GraphRpcError;
use graphrpc_server::{GenericOperations, HttpServer, MemoryDirectory, MemoryStore, RpcRouter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use uuid::Uuid;

struct Invoice;

impl DomainType for Invoice {
    const TYPE_TAG: &'static str = "Invoice";

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_TAG, "invoices")
            .element("Title", ValueKind::Text)
            .element("Amount", ValueKind::Decimal)
            .references("Lines")
    }
}

struct Line;

impl DomainType for Line {
    const TYPE_TAG: &'static str = "Line";

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_TAG, "lines").element("Quantity", ValueKind::Integer)
    }
}

fn registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register_type::<Invoice>().register_type::<Line>();
    Arc::new(registry)
}

/// Server running on a separate task, stopped on drop.
struct TestServer {
    url: String,
    store: Arc<MemoryStore>,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start(configure: impl FnOnce(RpcRouter<MemoryStore>) -> RpcRouter<MemoryStore>, auth: AuthConfig) -> Self {
        let registry = registry();
        let store = Arc::new(MemoryStore::new(registry.clone()));
        let generic = GenericOperations::new().register::<Invoice>().register::<Line>();
        let router = configure(RpcRouter::new(store.clone(), registry, generic));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let server = HttpServer::new(router).with_auth(auth);
        let task = tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        Self { url, store, task }
    }

    async fn plain() -> Self {
        Self::start(|router| router, AuthConfig::disabled()).await
    }

    fn client(&self) -> GraphRpcClient {
        GraphRpcClient::new(&self.url, registry()).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn invoice(title: &str, amount: f64) -> PersistentObject {
    let mut invoice = PersistentObject::new(Invoice::TYPE_TAG);
    invoice.set_element("Title", title);
    invoice.set_element("Amount", amount);
    invoice
}

fn line(quantity: i64) -> PersistentObject {
    let mut line = PersistentObject::new(Line::TYPE_TAG);
    line.set_element("Quantity", quantity);
    line
}

/// Adds an invoice holding one line per quantity, through `client`.
async fn add_invoice(client: &GraphRpcClient, title: &str, quantities: &[i64]) -> (ObjectRef, Vec<ObjectRef>) {
    let lines: Vec<ObjectRef> = quantities.iter().map(|&q| client.insert(line(q))).collect();
    let mut root = invoice(title, 10.0);
    root.set_references("Lines", lines.clone());
    let target = client.add(root).await.unwrap();
    (target, lines)
}

// ============================================================================
// Write Path Tests
// ============================================================================

#[tokio::test]
async fn test_add_stores_the_whole_graph() {
    let server = TestServer::plain().await;
    let client = server.client();

    let (target, lines) = add_invoice(&client, "A", &[1, 2]).await;

    assert_eq!(server.store.len(), 3);
    assert_eq!(client.online_state(), OnlineState::Online);
    assert!(client.object(target.id).unwrap().is_attached());
    assert!(client.contains_id("invoices", target.id).await.unwrap());
    assert!(client.contains_id("lines", lines[0].id).await.unwrap());
    assert_eq!(client.count("lines", "Line", &Filter::All).await.unwrap(), 2);
}

#[tokio::test]
async fn test_update_and_orphan_removal() {
    let server = TestServer::plain().await;
    let client = server.client();
    let (target, lines) = add_invoice(&client, "A", &[1, 2]).await;

    client.edit(target.id, |node| {
        node.set_element("Title", "B");
        node.remove_reference("Lines", lines[1].id);
    });
    client.update(&target).await.unwrap();

    let found = client
        .find("invoices", "Invoice", &Filter::eq("Title", "B"), &[], Paging::default())
        .await
        .unwrap();
    assert_eq!(found, vec![target.clone()]);
    assert_eq!(client.count("lines", "Line", &Filter::All).await.unwrap(), 1);
    assert!(client.is_id_deleted("lines", lines[1].id).await.unwrap());
}

#[tokio::test]
async fn test_remove_cascaded_then_cleanup() {
    let server = TestServer::plain().await;
    let client = server.client();
    let (target, lines) = add_invoice(&client, "A", &[1, 2]).await;

    client.remove_cascaded(&target, false).await.unwrap();

    assert!(server.store.is_empty());
    assert!(client.object(target.id).unwrap().is_removed());
    assert!(client.is_id_deleted("invoices", target.id).await.unwrap());
    assert!(client.is_id_deleted("lines", lines[0].id).await.unwrap());

    client.cleanup().await.unwrap();
    assert!(!client.is_id_deleted("invoices", target.id).await.unwrap());
}

#[tokio::test]
async fn test_remove_unknown_object_is_a_server_error() {
    let server = TestServer::plain().await;
    let client = server.client();
    let ghost = client.insert(invoice("ghost", 0.0));

    match client.remove(&ghost).await.unwrap_err() {
        GraphRpcError::Remote { code, .. } => assert_eq!(code, ErrorCode::ServerError),
        other => panic!("unexpected error: {}", other),
    }
}

// ============================================================================
// Query Tests
// ============================================================================

#[tokio::test]
async fn test_retrieve_from_a_fresh_client() {
    let server = TestServer::plain().await;
    let (target, lines) = add_invoice(&server.client(), "A", &[7]).await;

    let reader = server.client();
    let found = reader.retrieve("invoices", target.id).await.unwrap();
    assert_eq!(found, Some(target.clone()));

    let root = reader.object(target.id).unwrap();
    assert_eq!(root.element("Title"), Some(&Value::from("A")));
    let line = reader.object(lines[0].id).unwrap();
    assert_eq!(line.element("Quantity"), Some(&Value::Int(7)));

    assert_eq!(reader.retrieve("invoices", Uuid::new_v4()).await.unwrap(), None);
}

#[tokio::test]
async fn test_repeated_find_sees_another_clients_update() {
    let server = TestServer::plain().await;
    let writer = server.client();
    let reader = server.client();
    let (target, lines) = add_invoice(&writer, "A", &[3]).await;

    let found = reader
        .find("invoices", "Invoice", &Filter::eq("Title", "A"), &[], Paging::default())
        .await
        .unwrap();
    assert_eq!(found, vec![target.clone()]);
    assert_eq!(reader.object(target.id).unwrap().element("Title"), Some(&Value::from("A")));

    writer.edit(target.id, |node| node.set_element("Title", "B"));
    writer.edit(lines[0].id, |node| node.set_element("Quantity", 4i64));
    writer.update(&target).await.unwrap();

    let found = reader
        .find("invoices", "Invoice", &Filter::eq("Title", "B"), &[], Paging::default())
        .await
        .unwrap();
    assert_eq!(found, vec![target.clone()]);
    assert_eq!(reader.object(target.id).unwrap().element("Title"), Some(&Value::from("B")));
    assert_eq!(reader.object(lines[0].id).unwrap().element("Quantity"), Some(&Value::Int(4)));
}

#[tokio::test]
async fn test_find_complement_and_aggregates() {
    let server = TestServer::plain().await;
    let client = server.client();
    add_invoice(&client, "A", &[]).await;
    let (b, _) = add_invoice(&client, "B", &[]).await;

    let others = client
        .find_complement("invoices", "Invoice", &Filter::eq("Title", "A"), &[], Paging::default())
        .await
        .unwrap();
    assert_eq!(others, vec![b]);

    let sums = client
        .find_sums_of_values("invoices", "Invoice", &["Amount"], &Filter::All)
        .await
        .unwrap();
    assert_eq!(sums, vec![20.0]);

    let titles = client
        .find_distinct_values("invoices", "Invoice", "Title", &Filter::All)
        .await
        .unwrap();
    assert_eq!(titles.len(), 2);
}

#[tokio::test]
async fn test_container_names() {
    let server = TestServer::plain().await;
    let client = server.client();

    assert_eq!(
        client.container_name_of_type("Line").await.unwrap().as_deref(),
        Some("lines")
    );
    assert_eq!(
        client.type_of_container("invoices").await.unwrap().as_deref(),
        Some("Invoice")
    );
    assert_eq!(client.container_name_of_type("Nope").await.unwrap(), None);
}

// ============================================================================
// Actions and Directory Tests
// ============================================================================

#[tokio::test]
async fn test_actions_and_unknown_methods() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let server = TestServer::start(
        move |router| {
            router.with_action("rebuildindex", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        },
        AuthConfig::disabled(),
    )
    .await;
    let client = server.client();

    client.call_action("rebuildindex").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    match client.call_action("doesnotexist").await.unwrap_err() {
        GraphRpcError::Remote { code, data, .. } => {
            assert_eq!(code, ErrorCode::MethodNotFound);
            assert_eq!(data.as_deref(), Some("doesnotexist"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_user_directory() {
    let ada = Uuid::new_v4();
    let directory = Arc::new(MemoryDirectory::new().with_user(ada, "Ada"));
    let server = TestServer::start(move |router| router.with_users(directory), AuthConfig::disabled()).await;
    let client = server.client();

    let user = client.find_user(ada).await.unwrap().unwrap();
    assert_eq!(user.display_name.as_deref(), Some("Ada"));
    assert_eq!(client.find_user(Uuid::new_v4()).await.unwrap(), None);
    assert_eq!(
        client.find_user_ids(&Filter::eq("DisplayName", "Ada")).await.unwrap(),
        vec![ada]
    );
}

// ============================================================================
// HTTP Surface Tests
// ============================================================================

#[tokio::test]
async fn test_api_key_is_required() {
    let server = TestServer::start(|router| router, AuthConfig::with_api_key("secret")).await;

    let anonymous = GraphRpcClient::with_config(
        &server.url,
        registry(),
        ClientConfig::new().retry(RetryConfig::none()),
    )
    .unwrap();
    assert!(!anonymous.ping().await);
    assert_eq!(anonymous.online_state(), OnlineState::Offline);

    let trusted =
        GraphRpcClient::with_config(&server.url, registry(), ClientConfig::new().api_key("secret"))
            .unwrap();
    assert!(trusted.ping().await);
}

#[tokio::test]
async fn test_only_post_is_accepted() {
    let server = TestServer::plain().await;

    let response = reqwest::Client::new().get(&server.url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 405);
    assert_eq!(response.headers()["allow"], "POST");
}

#[tokio::test]
async fn test_garbage_body_gets_a_parse_error() {
    let server = TestServer::plain().await;

    let response = reqwest::Client::new()
        .post(&server.url)
        .body("not a message")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let text = response.text().await.unwrap();
    assert!(text.contains(&ErrorCode::ParseError.code().to_string()));
}
