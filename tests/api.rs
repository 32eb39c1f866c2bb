//! End-to-end tests against a bound server.

use std::collections::HashSet;
use std::time::Duration;

use inference_service::ModelSlot;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_health_when_ready() {
    let server = common::spawn_server(common::trained_slot()).await;

    let res = common::client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.json::<Value>().await.unwrap(), json!({"status": "ok"}));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_predict_setosa() {
    let server = common::spawn_server(common::trained_slot()).await;

    let res = common::client()
        .post(server.url("/predict"))
        .header("x-request-id", "req-demo-123")
        .json(&json!({"values": [5.1, 3.5, 1.4, 0.2]}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-request-id"], "req-demo-123");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["prediction"], 0);
    let probabilities: Vec<f64> = body["probabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_f64().unwrap())
        .collect();
    assert_eq!(probabilities.len(), 3);
    assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-6);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_predict_extreme_values() {
    let server = common::spawn_server(common::trained_slot()).await;
    let client = common::client();

    for values in [
        json!([5.1, 1e308, 1.4, 0.2]),
        json!([1e308, -1e308, 1e308, -1e308]),
        json!([f64::MIN_POSITIVE, 0, -0.0, 1]),
    ] {
        let res = client
            .post(server.url("/predict"))
            .json(&json!({ "values": values }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200, "{values}");

        let body: Value = res.json().await.unwrap();
        let probabilities = body["probabilities"].as_array().unwrap();
        assert_eq!(probabilities.len(), 3);
        let sum: f64 = probabilities.iter().map(|p| p.as_f64().unwrap()).sum();
        assert!((sum - 1.0).abs() < 1e-6, "{values}: {sum}");
    }

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_predict_rejects_bad_elements() {
    let server = common::spawn_server(common::trained_slot()).await;

    let res = common::client()
        .post(server.url("/predict"))
        .json(&json!({"values": [1.0, "two", 3.0, null]}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid request");
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["type"], "float_type");
    assert_eq!(errors[0]["loc"], json!(["body", "values", 1]));
    assert_eq!(errors[1]["loc"], json!(["body", "values", 3]));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_predict_rejects_non_json_bodies() {
    let server = common::spawn_server(common::trained_slot()).await;
    let client = common::client();

    let res = client
        .post(server.url("/predict"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errors"][0]["type"], "json_invalid");

    let res = client
        .post(server.url("/predict"))
        .body(r#"{"values":[1,2,3,4]}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errors"][0]["type"], "content_type");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_unready_service_answers_503_but_still_validates() {
    let server = common::spawn_server(ModelSlot::new()).await;
    let client = common::client();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({"detail": "Model not loaded"})
    );

    let res = client
        .post(server.url("/predict"))
        .json(&json!({"values": [5.1, 3.5, 1.4, 0.2]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);

    let res = client
        .post(server.url("/predict"))
        .json(&json!({"values": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_readiness_flips_once_model_is_installed() {
    let slot = ModelSlot::new();
    let server = common::spawn_server(slot.clone()).await;
    let client = common::client();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 503);

    let model = inference_service::inference::train(&Default::default()).unwrap();
    slot.install(std::sync::Arc::new(model)).unwrap();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    server.shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_keep_their_own_ids() {
    let server = common::spawn_server(common::trained_slot()).await;
    let client = common::client();

    let mut handles = Vec::new();
    for n in 0..40 {
        let client = client.clone();
        let url = server.url("/predict");
        handles.push(tokio::spawn(async move {
            let id = format!("req-{n}");
            let res = client
                .post(url)
                .header("x-request-id", &id)
                .json(&json!({"values": [6.3, 3.3, 6.0, 2.5]}))
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), 200);
            (id, res.headers()["x-request-id"].to_str().unwrap().to_string())
        }));
    }

    for handle in handles {
        let (sent, echoed) = handle.await.unwrap();
        assert_eq!(sent, echoed);
    }

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_generated_ids_are_unique() {
    let server = common::spawn_server(common::trained_slot()).await;
    let client = common::client();

    let mut seen = HashSet::new();
    for _ in 0..10 {
        let res = client.get(server.url("/health")).send().await.unwrap();
        let id = res.headers()["x-request-id"].to_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert!(seen.insert(id));
    }

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown_stops_server() {
    let server = common::spawn_server(common::trained_slot()).await;
    let res = common::client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    server.shutdown.trigger();
    let stopped = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server stops after shutdown");
    assert!(stopped.unwrap().is_ok());
}
