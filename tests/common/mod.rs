#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode},
    routing::post,
    Router,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use payflow_backend::api::{build_router, mpesa::MpesaState, AppState};
use payflow_backend::correlation::{
    CorrelationStore, InMemoryCorrelationStore, StoreError, StoreResult,
};
use payflow_backend::health::HealthChecker;
use payflow_backend::payments::provider::PaymentGateway;
use payflow_backend::payments::providers::{PayflowConfig, PayflowGateway};
use payflow_backend::payments::types::PaymentOutcome;

/// What the fake gateway saw on its last STK push.
#[derive(Debug, Clone)]
pub struct RecordedPush {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct FakeGatewayState {
    hits: Arc<AtomicUsize>,
    last_push: Arc<Mutex<Option<RecordedPush>>>,
    reply_status: StatusCode,
    reply_body: String,
}

/// A stand-in for the PayFlow API listening on an ephemeral local port.
pub struct FakeGateway {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    last_push: Arc<Mutex<Option<RecordedPush>>>,
}

impl FakeGateway {
    pub async fn start(reply_status: StatusCode, reply_body: &str) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let last_push = Arc::new(Mutex::new(None));
        let state = FakeGatewayState {
            hits: hits.clone(),
            last_push: last_push.clone(),
            reply_status,
            reply_body: reply_body.to_string(),
        };

        let app = Router::new()
            .route("/api/v2/stkpush.php", post(fake_stk_push))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
            last_push,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_push(&self) -> Option<RecordedPush> {
        self.last_push.lock().unwrap().clone()
    }

    pub fn gateway(&self) -> PayflowGateway {
        PayflowGateway::new(payflow_config(&self.base_url)).unwrap()
    }
}

async fn fake_stk_push(
    State(state): State<FakeGatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    *state.last_push.lock().unwrap() = Some(RecordedPush {
        api_key: header_value("x-api-key"),
        api_secret: header_value("x-api-secret"),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });
    (state.reply_status, state.reply_body.clone())
}

pub fn payflow_config(base_url: &str) -> PayflowConfig {
    PayflowConfig {
        api_key: "pk_test_key".to_string(),
        api_secret: "sk_test_secret".to_string(),
        payment_account_id: 17,
        base_url: base_url.to_string(),
        timeout_secs: 5,
        max_retries: 0,
        ..Default::default()
    }
}

/// Store whose every operation fails, for exercising error paths.
pub struct FailingStore;

#[async_trait]
impl CorrelationStore for FailingStore {
    async fn put(&self, _correlation_id: &str, _outcome: PaymentOutcome) -> StoreResult<()> {
        Err(StoreError::ConnectionError("store offline".to_string()))
    }

    async fn get(&self, _correlation_id: &str) -> StoreResult<Option<PaymentOutcome>> {
        Err(StoreError::ConnectionError("store offline".to_string()))
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        Ok(0)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Err(StoreError::ConnectionError("store offline".to_string()))
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

pub fn memory_store() -> Arc<InMemoryCorrelationStore> {
    Arc::new(InMemoryCorrelationStore::new(Duration::from_secs(600)))
}

pub fn app_with(
    store: Arc<dyn CorrelationStore>,
    gateway: Option<Arc<dyn PaymentGateway>>,
) -> Router {
    let health_checker = HealthChecker::new(store.clone(), gateway.is_some());
    build_router(AppState {
        mpesa: MpesaState::new(store, gateway),
        health_checker,
    })
}

/// Serves the app on an ephemeral port and returns its base url.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn raw_request(method: Method, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
