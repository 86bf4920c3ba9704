//! Shared utilities for integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use trace_propagation::config::ReporterConfig;
use trace_propagation::propagation::PropagationEngine;
use trace_propagation::tracer::{Closer, ConstSampler, MemorySink, TracerFacade};

/// Headers of one request received by a mock downstream, keys lowercased.
pub type CapturedHeaders = HashMap<String, String>;

/// Start a mock downstream that answers every request with `status` and
/// `body`, forwarding the request headers it saw to the returned channel.
#[allow(dead_code)]
pub async fn start_capturing_backend(
    addr: SocketAddr,
    status: u16,
    body: &'static str,
) -> mpsc::UnboundedReceiver<CapturedHeaders> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let head = read_request_head(&mut socket).await;
                        let _ = tx.send(parse_headers(&head));

                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    rx
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn parse_headers(head: &str) -> CapturedHeaders {
    head.split("\r\n")
        .skip(1)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

/// A ready tracer reporting into a memory sink.
#[allow(dead_code)]
pub struct TestTracer {
    pub facade: TracerFacade,
    pub closer: Closer,
    pub engine: PropagationEngine,
    pub sink: MemorySink,
}

#[allow(dead_code)]
pub fn test_tracer(sampled: bool) -> TestTracer {
    let sink = MemorySink::new();
    let facade = TracerFacade::new();
    let (tracer, closer) = facade
        .initialize_with_sink(
            "test-service",
            Arc::new(ConstSampler::new(sampled)),
            &ReporterConfig::default(),
            Arc::new(sink.clone()),
        )
        .unwrap();

    TestTracer {
        facade,
        closer,
        engine: PropagationEngine::new(tracer),
        sink,
    }
}

/// HTTP client without pooling or proxies.
#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
