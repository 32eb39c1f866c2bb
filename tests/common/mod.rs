//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use inference_service::config::{ModelConfig, ServiceConfig};
use inference_service::inference::{self, Classifier, Prediction, FEATURE_COUNT};
use inference_service::observability::{JsonLogLayer, LogLevel, ServiceMeta};
use inference_service::{HttpServer, ModelSlot, Shutdown};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;

/// A slot holding the real trained model.
pub fn trained_slot() -> ModelSlot {
    let model = inference::train(&ModelConfig::default()).expect("training succeeds");
    ModelSlot::ready(Arc::new(model))
}

/// A classifier that panics on every call.
pub struct Exploding;

impl Classifier for Exploding {
    fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Prediction {
        panic!("classifier exploded")
    }
}

/// A classifier whose probabilities do not sum to one.
pub struct Unnormalised;

impl Classifier for Unnormalised {
    fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> Prediction {
        Prediction {
            class: 0,
            probabilities: vec![0.9, 0.9, 0.2],
        }
    }
}

/// A server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Bind `127.0.0.1:0` and serve `model` until the returned server's
/// shutdown is triggered.
pub async fn spawn_server(model: ModelSlot) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(ServiceConfig::default(), model);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// In-memory log sink.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter(self.0.clone())
    }
}

impl Capture {
    /// Every captured line, parsed as JSON.
    pub fn records(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).expect("each line is one JSON object"))
            .collect()
    }

    /// Records with `event == "request"`.
    pub fn request_records(&self) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|r| r["event"] == "request")
            .collect()
    }
}

/// Route this thread's events into a fresh [`Capture`] until the guard drops.
pub fn capture_logs() -> (Capture, DefaultGuard) {
    let capture = Capture::default();
    let meta = ServiceMeta {
        service: "iris-test".to_string(),
        env: "test".to_string(),
        version: "0.0.0".to_string(),
    };
    let subscriber = tracing_subscriber::registry().with(JsonLogLayer::new(
        meta,
        LogLevel::Debug,
        capture.clone(),
    ));
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}
