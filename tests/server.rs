//! Live server tests over a real TCP listener.

use axum::http::StatusCode;
use waypoint::{Context, Engine};

mod common;

#[tokio::test]
async fn test_serves_requests_until_shutdown() {
    let engine = Engine::with_defaults(common::test_config());
    engine
        .get("/hello/:name", |c: &mut Context| {
            let body = format!("hello {}", c.param("name"));
            c.string(StatusCode::OK, body);
        })
        .unwrap();
    engine
        .get("/ip", |c: &mut Context| {
            let ip = c.client_ip();
            c.string(StatusCode::OK, ip);
        })
        .unwrap();

    let server = common::start_server(engine).await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/hello/world")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "hello world");

    let response = client.get(server.url("/ip")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "127.0.0.1");

    let response = client.get(server.url("/bye")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);

    server.stop().await;
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let engine = Engine::new(common::test_config());
    engine
        .get("/id", |c: &mut Context| {
            let id = c.request_id().unwrap_or_default().to_string();
            c.string(StatusCode::OK, id);
        })
        .unwrap();

    let server = common::start_server(engine).await;
    let response = reqwest::Client::new()
        .get(server.url("/id"))
        .header("x-request-id", "trace-123")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-123");
    assert_eq!(response.text().await.unwrap(), "trace-123");

    server.stop().await;
}
