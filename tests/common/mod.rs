//! In-process stand-in for the IDA plugin's JSON-RPC endpoint.

#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::http::{Request, Response};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use ida_mcp_bridge::{RpcClient, RpcConfig};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn fixture_plugin() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("mcp-plugin.py")
}

type Responder = dyn Fn(&Value) -> Value + Send + Sync;

/// Records every request body and answers with the responder's output.
pub struct MockPlugin {
    pub port: u16,
    requests: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockPlugin {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let respond: Arc<Responder> = Arc::new(respond);

        let task = {
            let requests = requests.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let requests = requests.clone();
                    let respond = respond.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |req: Request<Incoming>| {
                            let requests = requests.clone();
                            let respond = respond.clone();
                            async move {
                                let body = req.into_body().collect().await.unwrap().to_bytes();
                                let request: Value = serde_json::from_slice(&body).unwrap();
                                let reply = respond(&request);
                                requests.lock().unwrap().push(request);
                                Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(
                                    reply.to_string(),
                                ))))
                            }
                        });
                        let _ = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await;
                    });
                }
            })
        };

        Self {
            port,
            requests,
            connections,
            task,
        }
    }

    /// Answers every call with `result` wrapped in a success envelope.
    pub async fn returning(result: Value) -> Self {
        Self::start(move |req| json!({"jsonrpc": "2.0", "result": result.clone(), "id": req["id"]}))
            .await
    }

    pub fn client(&self) -> RpcClient {
        RpcClient::new(RpcConfig::new("127.0.0.1", self.port)).unwrap()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockPlugin {
    fn drop(&mut self) {
        self.task.abort();
    }
}
