//! Transport integration tests: frame → bus dispatch → reply frame.

use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use verticore::address::{self, DbOp, EntitySchema, FieldType};
use verticore::bus::{FailureKind, ReplyOutcome};
use verticore::components::{self, AddressInfo, EntityId, Pong};
use verticore::transport::codec::{
    read_frame, write_frame, WireResponse, MSG_ERROR, MSG_REQUEST, MSG_RESPONSE,
};
use verticore::transport::{TransportClient, TransportServer};
use verticore::value::json;
use verticore::{Config, CorrelationId, EventBus};

/// Spin up a server on a random port with the built-in components.
async fn start_test_server() -> (std::net::SocketAddr, Arc<TransportServer>) {
    let mut config = Config::default();
    config.entities = vec![EntitySchema::new("project").field("title", FieldType::String, true)];
    let bus = components::install(EventBus::builder(&config), &config)
        .unwrap()
        .build()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(TransportServer::new(bus, config.transport.clone()));

    let serving = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = serving.serve_with(listener).await;
    });
    (addr, server)
}

#[tokio::test]
async fn test_echo_round_trip() {
    let (addr, server) = start_test_server().await;
    let mut client = TransportClient::connect(addr).await.unwrap();

    let outcome = client
        .request_value(address::debug::ECHO, json!({"hello": ["world", 1]}), None)
        .await
        .unwrap();
    assert_eq!(outcome, ReplyOutcome::Success(json!({"hello": ["world", 1]})));
    server.shutdown();
}

#[tokio::test]
async fn test_correlation_id_passes_through() {
    let (addr, server) = start_test_server().await;
    let mut client = TransportClient::connect(addr).await.unwrap();

    let id = CorrelationId::from_string("steady-lynx-300".to_string()).unwrap();
    let outcome = client
        .request_value(address::debug::PING, json!({}), Some(&id))
        .await
        .unwrap();
    let ReplyOutcome::Success(body) = outcome else {
        panic!("expected pong");
    };
    let pong: Pong = verticore::codec::decode(&body).unwrap();
    assert_eq!(pong.correlation_id, "steady-lynx-300");
    server.shutdown();
}

#[tokio::test]
async fn test_failures_keep_kind_and_code() {
    let (addr, server) = start_test_server().await;
    let mut client = TransportClient::connect(addr).await.unwrap();

    let outcome = client
        .request_value("nobody.home", json!({}), None)
        .await
        .unwrap();
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::NoHandlers);
    assert_eq!(failure.code, 404);

    // same connection, next request
    let outcome = client
        .request_value(&address::db("project", DbOp::Create), json!({}), None)
        .await
        .unwrap();
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.kind, FailureKind::RecipientFailure);
    assert_eq!(failure.code, 400);
    assert!(failure.message.contains("title"), "{}", failure.message);
    server.shutdown();
}

#[tokio::test]
async fn test_typed_requests_over_tcp() {
    let (addr, server) = start_test_server().await;
    let mut client = TransportClient::connect(addr).await.unwrap();

    let created: verticore::value::Value = client
        .request(&address::db("project", DbOp::Create), &json!({"title": "compilers"}))
        .await
        .unwrap();
    assert_eq!(created, json!({"id": 1, "title": "compilers"}));

    let read: verticore::value::Value = client
        .request(&address::db("project", DbOp::Read), &EntityId { id: 1 })
        .await
        .unwrap();
    assert_eq!(read["title"], "compilers");

    let infos: Vec<AddressInfo> = client.request(address::debug::ADDRESSES, &()).await.unwrap();
    assert_eq!(infos.len(), 10);
    assert!(infos.windows(2).all(|w| w[0].address <= w[1].address));
    server.shutdown();
}

#[tokio::test]
async fn test_unexpected_frame_type_gets_error_frame() {
    let (addr, server) = start_test_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    write_frame(&mut stream, 0x42, b"{}").await.unwrap();
    let (msg_type, payload) = read_frame(&mut stream, 1 << 20).await.unwrap().unwrap();
    assert_eq!(msg_type, MSG_ERROR);
    let response: WireResponse = serde_json::from_slice(&payload).unwrap();
    assert!(!response.ok);
    assert_eq!(response.error.unwrap().code, 400);

    // the connection survives a rejected frame
    let request = json!({"id": "r-2", "address": address::debug::ECHO, "body": [1, 2]});
    write_frame(&mut stream, MSG_REQUEST, &serde_json::to_vec(&request).unwrap())
        .await
        .unwrap();
    let (msg_type, payload) = read_frame(&mut stream, 1 << 20).await.unwrap().unwrap();
    assert_eq!(msg_type, MSG_RESPONSE);
    let response: WireResponse = serde_json::from_slice(&payload).unwrap();
    assert_eq!(response.id, "r-2");
    assert_eq!(response.body, Some(json!([1, 2])));
    server.shutdown();
}

#[tokio::test]
async fn test_malformed_request_is_rejected() {
    let (addr, server) = start_test_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    write_frame(&mut stream, MSG_REQUEST, b"not json").await.unwrap();
    let (msg_type, payload) = read_frame(&mut stream, 1 << 20).await.unwrap().unwrap();
    assert_eq!(msg_type, MSG_ERROR);
    let response: WireResponse = serde_json::from_slice(&payload).unwrap();
    assert!(response.error.unwrap().message.starts_with("Invalid request"));
    server.shutdown();
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let (addr, server) = start_test_server().await;
    server.shutdown();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // the listener is gone once the accept loop exits
    assert!(TcpStream::connect(addr).await.is_err());
}
