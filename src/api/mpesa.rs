use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection, QueryRejection},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::correlation::CorrelationStore;
use crate::error::{AppError, AppErrorKind, InfrastructureError};
use crate::middleware::error::get_request_id_from_headers;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{PaymentStatusView, StkPushRequest};
use crate::services::callback_receiver::{CallbackDisposition, CallbackError, CallbackReceiver};
use crate::services::payment_status::PaymentStatusService;

#[derive(Clone)]
pub struct MpesaState {
    /// `None` when PayFlow credentials are missing; initiation then fails with 500.
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub callbacks: Arc<CallbackReceiver>,
    pub status: Arc<PaymentStatusService>,
}

impl MpesaState {
    pub fn new(store: Arc<dyn CorrelationStore>, gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        Self {
            gateway,
            callbacks: Arc::new(CallbackReceiver::new(store.clone())),
            status: Arc::new(PaymentStatusService::new(store)),
        }
    }
}

pub fn routes(state: MpesaState) -> Router {
    Router::new()
        .route("/api/mpesa/stk-push", post(stk_push))
        .route(
            "/api/mpesa/callback",
            post(receive_callback).get(get_payment_status),
        )
        .route("/api/mpesa/status", get(get_payment_status))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushBody {
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Accepted as a JSON string or number.
    #[serde(default)]
    pub amount: Option<JsonValue>,
    #[serde(default)]
    pub account_reference: Option<String>,
    #[serde(default)]
    pub transaction_desc: Option<String>,
}

impl StkPushBody {
    fn into_request(self) -> StkPushRequest {
        let amount = match self.amount {
            Some(JsonValue::String(s)) => s,
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        StkPushRequest {
            phone_number: self.phone_number.unwrap_or_default(),
            amount,
            account_reference: self.account_reference.filter(|s| !s.trim().is_empty()),
            transaction_desc: self.transaction_desc.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushResponse {
    pub success: bool,
    pub checkout_request_id: String,
    pub response_code: u16,
    pub response_description: String,
    pub message: String,
}

/// POST /api/mpesa/stk-push
pub async fn stk_push(
    State(state): State<MpesaState>,
    headers: HeaderMap,
    payload: Result<Json<StkPushBody>, JsonRejection>,
) -> Result<Json<StkPushResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let attach = |err: AppError| match &request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    };

    let Json(body) = payload.map_err(|e| attach(AppError::malformed_body(e.body_text())))?;

    let gateway = state.gateway.as_ref().ok_or_else(|| {
        attach(AppError::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: "PayFlow credentials are not configured".to_string(),
            },
        )))
    })?;

    let accepted = gateway
        .initiate_stk_push(body.into_request())
        .await
        .map_err(|e| attach(AppError::from(e)))?;

    info!(
        checkout_request_id = %accepted.correlation_id,
        gateway = gateway.name(),
        "STK push accepted"
    );

    Ok(Json(StkPushResponse {
        success: true,
        response_description: accepted.description(),
        message: accepted.customer_message(),
        checkout_request_id: accepted.correlation_id,
        response_code: accepted.response_code,
    }))
}

/// POST /api/mpesa/callback
///
/// The gateway only needs to know the callback arrived, so every outcome,
/// including internal failures and unreadable bodies, is acknowledged with 200.
pub async fn receive_callback(
    State(state): State<MpesaState>,
    body: Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    let received = match body {
        Ok(body) => state.callbacks.receive(&body).await,
        Err(rejection) => Err(CallbackError::MalformedPayload(rejection.body_text())),
    };

    match received {
        Ok(CallbackDisposition::Recorded(_)) | Ok(CallbackDisposition::Ignored) => {}
        Err(CallbackError::MalformedPayload(reason)) => {
            warn!(error = %reason, "Malformed payment callback acknowledged");
        }
        Err(CallbackError::Store(e)) => {
            error!(error = %e, "Failed to record payment callback");
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "received" })),
    )
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "checkoutRequestId", default)]
    pub checkout_request_id: Option<String>,
}

/// GET /api/mpesa/status and GET /api/mpesa/callback
pub async fn get_payment_status(
    State(state): State<MpesaState>,
    headers: HeaderMap,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<PaymentStatusView>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    // An unreadable query string, such as a repeated id, counts as no id
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Unreadable status query");
            StatusQuery {
                checkout_request_id: None,
            }
        }
    };

    let checkout_request_id = match params
        .checkout_request_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        Some(id) => id,
        None => {
            let err = AppError::missing_field("checkoutRequestId");
            return Err(match request_id {
                Some(id) => err.with_request_id(id),
                None => err,
            });
        }
    };

    state
        .status
        .lookup(checkout_request_id)
        .await
        .map(Json)
        .map_err(|e| {
            let err = AppError::from(e);
            match request_id {
                Some(id) => err.with_request_id(id),
                None => err,
            }
        })
}
