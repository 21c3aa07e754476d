//! Shared test backend: a local axum server on a random port that serves
//! form configs, option lists, a flaky endpoint that recovers on the third
//! attempt, and an async-validation endpoint. Hit counters and timestamps
//! let tests assert call counts and retry spacing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

#[derive(Default)]
pub struct Hits {
    pub config: AtomicUsize,
    pub flaky: AtomicUsize,
    pub options: AtomicUsize,
    pub validate: AtomicUsize,
    pub flaky_times: Mutex<Vec<Instant>>,
}

pub struct TestBackend {
    pub base_url: String,
    pub hits: Arc<Hits>,
}

impl TestBackend {
    pub async fn start() -> Self {
        let hits = Arc::new(Hits::default());

        let app = Router::new()
            .route("/config/ok", get(serve_config))
            .route("/config/invalid", get(serve_invalid_config))
            .route("/config/flaky", get(serve_flaky))
            .route("/options/countries", get(serve_options))
            .route("/data/profile", get(serve_profile))
            .route("/broken", get(serve_broken))
            .route("/validate/handle", post(serve_validate))
            .with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        TestBackend {
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub fn sample_config() -> Value {
    json!({
        "elements": [
            {"key": "name", "type": "input", "label": "Name",
             "validators": [{"name": "required"}]},
            {"key": "email", "type": "input", "controlType": "email",
             "validators": [{"name": "email"}]}
        ],
        "buttons": [
            {"key": "save", "type": "submit", "label": "Save",
             "settings": {"disableIfFormInvalid": true}}
        ]
    })
}

async fn serve_config(State(hits): State<Arc<Hits>>) -> Json<Value> {
    hits.config.fetch_add(1, Ordering::SeqCst);
    Json(sample_config())
}

async fn serve_invalid_config(State(hits): State<Arc<Hits>>) -> Json<Value> {
    hits.config.fetch_add(1, Ordering::SeqCst);
    // Unknown element type and a stray field: transport succeeds, schema fails.
    Json(json!({
        "elements": [{"key": "x", "type": "hologram", "bogus": 1}]
    }))
}

async fn serve_flaky(State(hits): State<Arc<Hits>>) -> Response {
    let attempt = hits.flaky.fetch_add(1, Ordering::SeqCst);
    hits.flaky_times.lock().unwrap().push(Instant::now());
    if attempt < 2 {
        (StatusCode::INTERNAL_SERVER_ERROR, "transient failure").into_response()
    } else {
        Json(sample_config()).into_response()
    }
}

async fn serve_options(State(hits): State<Arc<Hits>>) -> Json<Value> {
    hits.options.fetch_add(1, Ordering::SeqCst);
    Json(json!([
        {"id": "AT", "name": "Austria"},
        {"id": "BR", "name": "Brazil"},
        {"id": "CA", "name": "Canada"}
    ]))
}

async fn serve_profile() -> Json<Value> {
    Json(json!({
        "name": "Ada Lovelace",
        "email": "ada@example.org"
    }))
}

async fn serve_broken() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "permanently broken").into_response()
}

async fn serve_validate(State(hits): State<Arc<Hits>>, Json(body): Json<Value>) -> Json<Value> {
    hits.validate.fetch_add(1, Ordering::SeqCst);
    let value = body.get("value").cloned().unwrap_or(Value::Null);
    if value == json!("taken") {
        Json(json!({"valid": false, "error": "Handle already taken"}))
    } else {
        Json(json!({"valid": true}))
    }
}
