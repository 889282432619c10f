//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::{body::Bytes, http::HeaderMap, http::Method, http::Uri, routing::any, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use rider_bff::config::{BffConfig, Mode};
use rider_bff::lifecycle::{self, Shutdown};

/// What the echo upstream saw.
#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

/// Start an upstream that answers every request with a JSON [`Echo`].
pub async fn start_echo_upstream() -> SocketAddr {
    async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
        let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in &headers {
            seen.entry(name.as_str().to_string())
                .or_default()
                .push(value.to_str().unwrap_or("<binary>").to_string());
        }
        Json(Echo {
            method: method.to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers: seen,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    let app = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Start an upstream that accepts connections and never answers.
pub async fn start_silent_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            held.push(socket);
        }
    });
    addr
}

/// Start an upstream that sends headers and one chunk, then stalls.
///
/// The receiver fires once the proxy closes the upstream connection.
pub async fn start_stalling_upstream() -> (SocketAddr, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ntransfer-encoding: chunked\r\n\r\n5\r\nhello\r\n")
            .await
            .unwrap();
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = closed_tx.send(());
    });
    (addr, closed_rx)
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Config pointing at `upstream` with a short upstream deadline.
pub fn config_for(upstream: SocketAddr, mode: Mode) -> BffConfig {
    let mut config = BffConfig::default();
    config.mode = mode;
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.upstream.base_url = format!("http://{upstream}");
    config.upstream.timeout_secs = 1;
    config.shutdown.grace_secs = 2;
    config
}

/// Write a small page source tree under `dir`.
pub fn write_app(dir: &Path) {
    std::fs::create_dir_all(dir.join("routes")).unwrap();
    std::fs::write(
        dir.join("root.html"),
        "<!DOCTYPE html><html><head><title>{{ title }}</title></head>\
         <body>{{{ outlet }}}</body></html>",
    )
    .unwrap();
    std::fs::write(dir.join("routes/index.html"), "+++\ntitle = \"Home\"\n+++\n<h1>Welcome</h1>").unwrap();
    std::fs::write(
        dir.join("routes/bands.$band_id.html"),
        "+++\ntitle = \"Band\"\n+++\n<h1>Band {{ params.band_id }}</h1>",
    )
    .unwrap();
}

/// Write a client build directory under `dir`.
pub fn write_client_build(dir: &Path) {
    std::fs::create_dir_all(dir.join("assets")).unwrap();
    std::fs::write(dir.join("assets/entry-4f2a.js"), "export const answer = 42;\n").unwrap();
    std::fs::write(dir.join("favicon.ico"), [0u8, 0, 1, 0, 1, 0, 16, 16]).unwrap();
}

/// A running server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Prepare, bind and run a server for `config`.
pub async fn spawn_server(config: BffConfig) -> TestServer {
    let server = lifecycle::prepare(config.clone()).unwrap();
    let listener = lifecycle::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));
    TestServer {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
