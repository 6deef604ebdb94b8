//! HTTP route handlers for the gateway.
//!
//! Every handler forwards its request to the store service. The blocking
//! RPC call runs on tokio's blocking pool under a context that is cancelled
//! if the HTTP request is dropped.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::context::CallContext;
use crate::network::{ClientError, StoreClient};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<StoreClient>,
    pub request_timeout: Duration,
    pub span: tracing::Span,
}

impl AppState {
    /// Run `f` against the client on the blocking pool
    async fn call<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&StoreClient, &CallContext) -> Result<T, ClientError> + Send + 'static,
        T: Send + 'static,
    {
        let ctx = CallContext::with_timeout(self.request_timeout);
        let _cancel = ctx.cancel_on_drop();
        let client = Arc::clone(&self.client);

        let joined = tokio::task::spawn_blocking(move || f(&client, &ctx)).await;
        match joined {
            Ok(result) => result.map_err(ApiError::from),
            Err(e) => Err(ApiError::Internal(format!("store call panicked: {}", e))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValueBody {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanBody {
    pub entries: Vec<KeyValueBody>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanParams {
    pub prefix: Option<String>,
    pub limit: Option<i64>,
}

/// Handle GET /{key}
pub async fn get_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyValueBody>, ApiError> {
    let lookup = key.clone();
    let value = state.call(move |client, ctx| client.get(ctx, &lookup)).await?;
    Ok(Json(KeyValueBody {
        key,
        value: String::from_utf8_lossy(&value).into_owned(),
    }))
}

/// Handle PUT /{key}
pub async fn put_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state
        .call(move |client, ctx| client.put(ctx, &key, &body))
        .await?;
    Ok(StatusCode::OK)
}

/// Handle DELETE /{key}
pub async fn delete_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .call(move |client, ctx| client.delete(ctx, &key))
        .await?;
    Ok(StatusCode::OK)
}

/// Handle GET /?prefix=&limit=
pub async fn scan(
    State(state): State<AppState>,
    Query(params): Query<ScanParams>,
) -> Result<Json<ScanBody>, ApiError> {
    let prefix = params.prefix.unwrap_or_default();
    let limit = params.limit.unwrap_or(0);

    let entries = state
        .call(move |client, ctx| client.scan(ctx, &prefix, limit))
        .await?;

    Ok(Json(ScanBody {
        entries: entries
            .into_iter()
            .map(|e| KeyValueBody {
                key: e.key,
                value: String::from_utf8_lossy(&e.value).into_owned(),
            })
            .collect(),
    }))
}

/// Handle PUT / and DELETE /
pub async fn missing_key() -> ApiError {
    ApiError::BadRequest("key must not be empty".to_string())
}
