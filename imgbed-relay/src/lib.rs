//! Compression relay for imgbed
//!
//! Accepts raw image bytes on `POST /api/tinypng`, forwards them to the
//! TinyPNG API with a server-side key, downloads the compressed result and
//! streams it back with its content type and length.
//!
//! Can be used as:
//! - An embedded server (via `start_server_on`)
//! - A standalone binary (`imgbed-relay`)

pub mod compress;
pub mod tinify;

pub use compress::{CompressError, CompressedImage, Compressor};
pub use hyper::body::Bytes;
pub use tinify::TinifyClient;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::HeaderValue;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info};

/// Path the relay answers on
pub const COMPRESS_PATH: &str = "/api/tinypng";

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, Infallible>;

fn json_response(status: StatusCode, value: serde_json::Value) -> Response<BoxBody> {
    let body = Full::new(Bytes::from(value.to_string())).boxed();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn image_response(image: CompressedImage) -> Response<BoxBody> {
    let length = image.data.len();
    let content_type = HeaderValue::from_str(&image.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let mut response = Response::new(Full::new(image.data).boxed());
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    response
}

/// Handle one relay request
///
/// `compressor` is `None` when no TinyPNG key is configured.
pub async fn handle_request<B>(
    req: Request<B>,
    compressor: Option<Arc<dyn Compressor>>,
) -> Response<BoxBody>
where
    B: Body,
    B::Error: Display,
{
    if req.uri().path() != COMPRESS_PATH {
        return json_response(StatusCode::NOT_FOUND, json!({ "error": "Not found" }));
    }

    if req.method() != Method::POST {
        return json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": "Method not allowed" }),
        );
    }

    let Some(compressor) = compressor else {
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "TinyPNG API key not configured" }),
        );
    };

    let data = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal Server Error", "details": e.to_string() }),
            );
        }
    };
    let input_size = data.len();

    match compressor.compress(data).await {
        Ok(image) => {
            info!(
                "Compressed {} bytes to {} bytes ({})",
                input_size, image.size, image.content_type
            );
            image_response(image)
        }
        Err(CompressError::Upstream { status, body }) => {
            error!("TinyPNG API Error: {} {}", status, body);
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            json_response(
                status,
                json!({ "error": "TinyPNG API error", "details": body }),
            )
        }
        Err(e) => {
            error!("Server Error: {}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal Server Error", "details": e.to_string() }),
            )
        }
    }
}

/// Handle to a running server that can be used to stop it
pub struct ServerHandle {
    shutdown_tx: oneshot::Sender<()>,
    addr: SocketAddr,
}

impl ServerHandle {
    /// Get the port the server is running on
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Get the URL of the compression endpoint
    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, COMPRESS_PATH)
    }

    /// Stop the server
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Start the relay on the specified host and port
///
/// Use port 0 to get a random available port.
pub async fn start_server_on(
    host: &str,
    port: u16,
    compressor: Option<Arc<dyn Compressor>>,
) -> anyhow::Result<ServerHandle> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    info!("Starting compression relay on {}", local_addr);
    if compressor.is_none() {
        tracing::warn!("No TinyPNG API key configured, requests will fail with 500");
    }

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutting down compression relay");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let io = TokioIo::new(stream);
                            let compressor = compressor.clone();

                            tokio::spawn(async move {
                                if let Err(err) = http1::Builder::new()
                                    .serve_connection(
                                        io,
                                        hyper::service::service_fn(move |req: Request<hyper::body::Incoming>| {
                                            let compressor = compressor.clone();
                                            async move {
                                                Ok::<_, Infallible>(handle_request(req, compressor).await)
                                            }
                                        }),
                                    )
                                    .await
                                {
                                    error!("Error serving connection: {:?}", err);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    });

    Ok(ServerHandle {
        shutdown_tx,
        addr: local_addr,
    })
}
