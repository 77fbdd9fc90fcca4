use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use imgbed_relay::{start_server_on, Compressor, TinifyClient};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Base64 of "api:secret"
const EXPECTED_AUTH: &str = "Basic YXBpOnNlY3JldA==";
const COMPRESSED: &[u8] = b"small";

async fn fake_tinify(req: Request<Incoming>, addr: SocketAddr) -> Response<Full<Bytes>> {
    let respond = |status: StatusCode, content_type: &str, body: Vec<u8>| {
        Response::builder()
            .status(status)
            .header("Content-Type", content_type)
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    };

    match (req.method(), req.uri().path()) {
        (&Method::POST, "/shrink") => {
            let authorized = req
                .headers()
                .get("authorization")
                .is_some_and(|v| v == EXPECTED_AUTH);
            if !authorized {
                return respond(
                    StatusCode::UNAUTHORIZED,
                    "application/json",
                    br#"{"error":"Unauthorized","message":"Credentials are invalid"}"#.to_vec(),
                );
            }
            let input = req.into_body().collect().await.unwrap().to_bytes();
            let body = serde_json::json!({
                "input": {"size": input.len(), "type": "image/png"},
                "output": {
                    "size": COMPRESSED.len(),
                    "type": "image/png",
                    "url": format!("http://{}/output/abc", addr),
                }
            });
            respond(StatusCode::CREATED, "application/json", body.to_string().into_bytes())
        }
        (&Method::GET, "/output/abc") => respond(StatusCode::OK, "image/png", COMPRESSED.to_vec()),
        _ => respond(StatusCode::NOT_FOUND, "text/plain", b"not found".to_vec()),
    }
}

/// Serve a stand-in for api.tinify.com and return its base URL
async fn start_fake_tinify() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(
                        TokioIo::new(stream),
                        hyper::service::service_fn(move |req| async move {
                            Ok::<_, Infallible>(fake_tinify(req, addr).await)
                        }),
                    )
                    .await;
            });
        }
    });

    format!("http://{}", addr)
}

async fn tinify_compressor(api_key: &str) -> Option<Arc<dyn Compressor>> {
    let base_url = start_fake_tinify().await;
    let client = TinifyClient::with_base_url(&base_url, api_key, Duration::from_secs(5)).unwrap();
    Some(Arc::new(client))
}

#[tokio::test]
async fn test_relay_end_to_end() {
    let handle = start_server_on("127.0.0.1", 0, tinify_compressor("secret").await)
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .post(handle.url())
        .body(b"\x89PNG original image bytes".to_vec())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.headers()["content-length"], "5");
    assert_eq!(&response.bytes().await.unwrap()[..], COMPRESSED);

    handle.stop();
}

#[tokio::test]
async fn test_relay_forwards_upstream_error() {
    let handle = start_server_on("127.0.0.1", 0, tinify_compressor("wrong").await)
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .post(handle.url())
        .body(b"png".to_vec())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "TinyPNG API error");
    assert!(body["details"].as_str().unwrap().contains("Credentials are invalid"));

    handle.stop();
}

#[tokio::test]
async fn test_relay_without_key() {
    let handle = start_server_on("127.0.0.1", 0, None).await.unwrap();
    assert!(handle.port() > 0);

    let response = reqwest::Client::new()
        .post(handle.url())
        .body(b"png".to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    let response = reqwest::get(handle.url()).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);

    handle.stop();
}
