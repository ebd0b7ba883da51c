//! HTTP front end of the gateway
//!
//! Routes `/health`, `/metrics` and everything below the API prefix. Object
//! requests are handed to [`Gateway::handle`] with the prefix stripped and
//! the remaining path percent-decoded.

use crate::error::{GatewayError, Result};
use crate::handlers::{error_response, finish, Gateway};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Gateway HTTP server
pub struct GatewayServer {
    gateway: Arc<Gateway>,
    api_prefix: String,
}

impl GatewayServer {
    pub fn new(gateway: Arc<Gateway>, api_prefix: impl Into<String>) -> Self {
        Self {
            gateway,
            api_prefix: api_prefix.into(),
        }
    }

    /// Bind `addr` and serve until the process is terminated
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, std::future::pending::<()>()).await
    }

    /// Serve connections from `listener` until `shutdown` completes
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!("S4 gateway listening on http://{}", local_addr);
        info!(
            "Object API at http://{}{}/, metrics at http://{}/metrics",
            local_addr, self.api_prefix, local_addr
        );

        let router = Arc::new(self);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("S4 gateway on {} shutting down", local_addr);
                    return Ok(());
                }
            };
            debug!("Accepted connection from {}", peer);

            let io = TokioIo::new(stream);
            let router = Arc::clone(&router);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let router = Arc::clone(&router);
                    async move { Ok::<_, Infallible>(router.route(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }
    }

    async fn route(&self, req: Request<hyper::body::Incoming>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();

        if let Some(object_path) = self.object_path(&path) {
            return match percent_decode_str(object_path).decode_utf8() {
                Ok(decoded) => {
                    let decoded = decoded.into_owned();
                    self.gateway.handle(req, &decoded).await
                }
                Err(e) => error_response(&GatewayError::InvalidRequest(format!(
                    "path is not valid UTF-8: {}",
                    e
                ))),
            };
        }

        match (req.method(), path.as_str()) {
            (&Method::GET | &Method::HEAD, "/health") => health_response(),
            (&Method::GET, "/metrics") => self.metrics_response(),
            _ => not_found_response(),
        }
    }

    /// Path below the API prefix, without its leading '/'
    fn object_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.api_prefix.as_str())?;
        if rest.is_empty() {
            return Some(rest);
        }
        rest.strip_prefix('/')
    }

    fn metrics_response(&self) -> Response<Full<Bytes>> {
        match self.gateway.metrics().encode() {
            Ok((content_type, body)) => finish(
                Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_TYPE, content_type),
                Bytes::from(body),
            ),
            Err(e) => error_response(&GatewayError::InternalError(format!(
                "Failed to encode metrics: {}",
                e
            ))),
        }
    }
}

fn health_response() -> Response<Full<Bytes>> {
    finish(
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/plain"),
        Bytes::from_static(b"OK\n"),
    )
}

fn not_found_response() -> Response<Full<Bytes>> {
    finish(
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header(CONTENT_TYPE, "text/plain"),
        Bytes::from_static(b"Not Found\n"),
    )
}
