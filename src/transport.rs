//! Serving the bridge over stdio or HTTP.

use crate::config::{MESSAGE_PATH, SSE_PATH};
use crate::server::BridgeServer;
use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::http::{header::ORIGIN, Request, Response, StatusCode};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use std::collections::HashSet;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_service::Service;
use tracing::{error, info};

/// Keep-alive interval of the event stream.
pub const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

type GuardBody = BoxBody<Bytes, Infallible>;

/// Rejects requests outside the two fixed endpoints and requests whose
/// `Origin` is not allowed. Requests without an `Origin` header pass.
#[derive(Clone)]
pub struct EndpointGuard<S> {
    inner: S,
    allowed_origins: Arc<HashSet<String>>,
}

impl<S> EndpointGuard<S> {
    pub fn new<I, O>(inner: S, allowed_origins: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: AsRef<str>,
    {
        let allowed_origins = allowed_origins
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            inner,
            allowed_origins: Arc::new(allowed_origins),
        }
    }
}

fn is_served_path(path: &str) -> bool {
    path == SSE_PATH || path.starts_with(MESSAGE_PATH)
}

fn reject(status: StatusCode, text: &'static str) -> Response<GuardBody> {
    let mut resp = Response::new(Full::new(Bytes::from(text)).boxed());
    *resp.status_mut() = status;
    resp
}

impl<B, S> Service<Request<B>> for EndpointGuard<S>
where
    B: http_body::Body + Send + 'static,
    B::Error: std::fmt::Display,
    S: Service<Request<B>, Response = Response<GuardBody>, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<GuardBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let allowed_origins = self.allowed_origins.clone();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            if let Some(origin) = req.headers().get(ORIGIN).and_then(|v| v.to_str().ok()) {
                if !allowed_origins.contains(origin) {
                    return Ok(reject(StatusCode::FORBIDDEN, "Forbidden"));
                }
            }
            if !is_served_path(req.uri().path()) {
                return Ok(reject(StatusCode::NOT_FOUND, "Not Found"));
            }
            inner.call(req).await
        })
    }
}

/// Serve over stdin/stdout until the client disconnects or `cancel` fires.
pub async fn serve_stdio(server: BridgeServer, cancel: CancellationToken) -> anyhow::Result<()> {
    info!("MCP server listening on stdio");
    let running = server.serve(stdio()).await?;
    tokio::select! {
        res = running.waiting() => {
            res?;
        }
        _ = cancel.cancelled() => {
            info!("MCP server shutting down");
        }
    }
    Ok(())
}

/// Serve HTTP connections from `listener` until `cancel` fires.
pub async fn serve_http(
    listener: TcpListener,
    server: BridgeServer,
    allowed_origins: &[String],
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let config = StreamableHttpServerConfig {
        sse_keep_alive: Some(SSE_KEEP_ALIVE),
        sse_retry: None,
        stateful_mode: true,
        cancellation_token: cancel.clone(),
    };
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        config,
    );
    let service = EndpointGuard::new(service, allowed_origins);

    if let Ok(addr) = listener.local_addr() {
        info!("MCP HTTP server listening on http://{addr}{SSE_PATH}");
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("HTTP server shutting down");
                break;
            }
            res = listener.accept() => {
                let (stream, _) = res.map_err(|e| anyhow::anyhow!("accept failed: {e}"))?;
                let svc = service.clone();
                tokio::spawn(async move {
                    let conn = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(svc));
                    if let Err(err) = conn.await {
                        error!("http connection error: {err}");
                    }
                });
            }
        }
    }
    Ok(())
}
