use ida_mcp_bridge::transport::serve_http;
use ida_mcp_bridge::{BridgeServer, RpcClient, RpcConfig, StubSet, ToolCatalog};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn start() -> (String, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let client = RpcClient::new(RpcConfig::default()).unwrap();
    let server = BridgeServer::new(Arc::new(client), Arc::new(ToolCatalog::new(&StubSet::default())));
    let cancel = CancellationToken::new();
    let origins = vec!["http://localhost".to_string()];
    let token = cancel.clone();
    tokio::spawn(async move {
        serve_http(listener, server, &origins, token).await.unwrap();
    });
    (base, cancel)
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let (base, cancel) = start().await;
    let http = reqwest::Client::new();
    for path in ["/", "/mcp", "/messages"] {
        let resp = http.post(format!("{base}{path}")).body("{}").send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
    }
    cancel.cancel();
}

#[tokio::test]
async fn disallowed_origin_is_forbidden() {
    let (base, cancel) = start().await;
    let resp = reqwest::Client::new()
        .get(format!("{base}/sse"))
        .header("Origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    cancel.cancel();
}
