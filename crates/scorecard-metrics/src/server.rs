//! Scrape endpoint for the metric store.
//!
//! Plain HTTP/1: the configured metrics path returns the text exposition,
//! `/healthz` answers `OK`, everything else is a 404.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{MetricStore, MetricsError, Result};

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Where the scrape endpoint listens
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub metrics_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            metrics_path: "/metrics".to_string(),
        }
    }
}

pub struct MetricsServer {
    config: ServerConfig,
    store: Arc<MetricStore>,
}

impl MetricsServer {
    pub fn new(config: ServerConfig, store: Arc<MetricStore>) -> Self {
        Self { config, store }
    }

    /// Bind the listener. Split from `serve` so callers (and tests) can use
    /// port 0 and find out which port they got.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|_| MetricsError::InvalidAddress(self.config.listen_addr.clone()))?;
        Ok(TcpListener::bind(addr).await?)
    }

    /// Accept connections until `shutdown` flips to true (or its sender goes away)
    pub async fn serve(self, listener: TcpListener, shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Serving metrics on {} at {}",
            listener.local_addr()?,
            self.config.metrics_path
        );

        let listener = Arc::new(listener);
        let accept = move || {
            let listener = Arc::clone(&listener);
            async move { listener.accept().await }
        };
        self.accept_loop(accept, shutdown).await
    }

    async fn accept_loop<F, Fut>(self, mut accept: F, mut shutdown: watch::Receiver<bool>) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<(TcpStream, SocketAddr)>>,
    {
        let metrics_path: Arc<str> = Arc::from(self.config.metrics_path.as_str());

        loop {
            let accepted = tokio::select! {
                accepted = accept() => accepted,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Metrics server shutting down");
                        return Ok(());
                    }
                    continue;
                }
            };

            // Running out of file descriptors and the like is transient
            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Failed to accept scrape connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                    continue;
                }
            };
            debug!("Scrape connection from {}", peer);

            let io = TokioIo::new(stream);
            let store = Arc::clone(&self.store);
            let metrics_path = Arc::clone(&metrics_path);

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let store = Arc::clone(&store);
                    let metrics_path = Arc::clone(&metrics_path);
                    async move { handle_request(req, &metrics_path, &store) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Metrics connection error: {}", e);
                }
            });
        }
    }

    /// Bind and serve in one go
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}

fn handle_request<B>(
    req: Request<B>,
    metrics_path: &str,
    store: &MetricStore,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();

    let response = if path == metrics_path {
        match store.render() {
            Ok(body) => text_response(StatusCode::OK, EXPOSITION_CONTENT_TYPE, body),
            Err(e) => {
                error!("Failed to render metrics: {}", e);
                text_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    "failed to render metrics".to_string(),
                )
            }
        }
    } else if path == "/healthz" || path == "/health" {
        text_response(StatusCode::OK, "text/plain", "OK".to_string())
    } else {
        text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string())
    };

    Ok(response)
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
