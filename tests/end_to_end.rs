//! End-to-end tests over a real listener, forwarding to mock upstreams.

use std::time::Duration;

use tokio::net::TcpListener;

use finbug_api::routing::UpstreamModule;
use finbug_api::{ApiServer, Shutdown};

mod common;
use common::{closed_port, start_mock_upstream, test_config, MockConnector};

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn forwards_module_requests_to_upstreams() {
    let (income_addr, captured) =
        start_mock_upstream("201 Created", r#"{"message":"Income added"}"#).await;
    let dead_addr = closed_port().await;

    let mut config = test_config();
    config.database.eager_connect = true;
    config
        .routes
        .upstreams
        .insert("income".to_string(), format!("http://{income_addr}"));
    config
        .routes
        .upstreams
        .insert("bill".to_string(), format!("http://{dead_addr}"));

    let connector = MockConnector::healthy();
    let modules = UpstreamModule::standard(&config.routes);
    let server = ApiServer::new(config, connector.clone(), modules);
    let readiness = server.readiness();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    // Eager connect runs in the background at startup.
    for _ in 0..50 {
        if readiness.is_ready() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(readiness.is_ready());

    let client = client();

    let res = client
        .post(format!("http://{addr}/api/v1/income/add?month=3"))
        .header("origin", "http://localhost:5173")
        .json(&serde_json::json!({"source": "salary", "amount": 4200}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
    assert!(res.headers().contains_key("x-request-id"));
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Income added");

    let received = captured.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    let request = received[0].to_ascii_lowercase();
    assert!(request.starts_with("post /api/v1/income/add?month=3 http/1.1"));
    assert!(request.contains("x-request-id:"));
    assert!(request.contains("x-forwarded-for: 127.0.0.1"));
    assert!(request.contains(r#""source":"salary""#));
    assert!(request.contains(r#""amount":4200"#));

    // Modules without an upstream stay unmounted.
    let res = client
        .get(format!("http://{addr}/api/v1/expense/list"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body["routes"],
        serde_json::json!(["/api/v1/income", "/api/v1/bill"])
    );

    // Unreachable upstream is a gateway error.
    let res = client
        .get(format!("http://{addr}/api/v1/bill/scan"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Upstream request failed");

    assert_eq!(connector.calls(), 1);

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn health_over_the_wire() {
    let server = ApiServer::new(test_config(), MockConnector::healthy(), vec![]);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    let res = client()
        .get(format!("http://{addr}/api"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["dbConnected"], false);

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}
