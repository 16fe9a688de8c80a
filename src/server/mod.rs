// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! HTTP surface over [`Store`], plus the background lease-expiry sweep.
//!
//! Every handler runs one store call, so each request is atomic on its own. Lease contention
//! and missing rows are ordinary `200`/`404` answers; only malformed input, auth failures and
//! persistence errors produce error bodies.

pub mod types;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::codec::{decode_scene, encode_scene, CodecError};
use crate::config::AuthMode;
use crate::model::{
    AccountId, DiagramId, LeaseDecision, LeaseRequest, NewVersion, VersionId, VersionScope,
    VersionSnapshot, VersionSummary,
};
use crate::store::{Store, StoreError};

use types::{
    CreateVersionBody, DeleteVersionResponse, DeleteVersionsResponse, DiagramNameResponse,
    DiagramQuery, ErrorBody, HealthResponse, LatestResponse, LeaseBody, LeaseResponse,
    MigrateBody, MigrateResponse, ReleaseBody, ReleaseResponse, RenameBody, RenameResponse,
    SaveLatestBody, TransferBody, TransferResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("missing bearer token")]
    Unauthorized,
    #[error("token does not grant access to this account")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Codec(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            Self::Store(err) => {
                tracing::error!(error = %err, "store failure");
                "internal server error".to_owned()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(store: Store) -> Router {
    let body_limit = store.config().body_limit_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/sessions/claim", post(claim))
        .route("/sessions/heartbeat", post(heartbeat))
        .route("/sessions/transfer", post(transfer))
        .route("/sessions/release", post(release))
        .route("/diagrams/{account_id}", get(load_latest).put(save_latest))
        .route(
            "/diagrams/{account_id}/versions",
            get(list_versions).post(create_version).delete(delete_versions),
        )
        .route("/diagrams/{account_id}/versions/migrate", post(migrate_versions))
        .route(
            "/diagrams/{account_id}/versions/{version_id}",
            get(get_version).delete(delete_version),
        )
        .route("/diagrams/{account_id}/name", get(diagram_name).put(rename_diagram))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(store)
}

/// Serves until `shutdown` fires, sweeping expired leases in the background.
pub async fn serve(
    listener: TcpListener,
    store: Store,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let sweep = spawn_expiry_sweep(store.clone(), shutdown.child_token());
    let app = router(store);

    let server_shutdown = shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await;

    shutdown.cancel();
    if let Err(err) = sweep.await {
        tracing::warn!(error = %err, "lease sweep task ended abnormally");
    }
    result
}

pub fn spawn_expiry_sweep(store: Store, cancel: CancellationToken) -> JoinHandle<()> {
    let period = store.config().lease.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match store.sweep_expired() {
                        Ok(expired) if !expired.is_empty() => {
                            tracing::debug!(count = expired.len(), "swept expired leases");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::warn!(error = %err, "lease sweep failed"),
                    }
                }
            }
        }
    })
}

fn authorize(store: &Store, headers: &HeaderMap, account_id: &AccountId) -> ApiResult<()> {
    if store.config().auth == AuthMode::Bearer {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized)?;
        if token != account_id.as_str() {
            return Err(ApiError::Forbidden);
        }
    }

    if let Err(err) = store.touch_account(account_id) {
        tracing::warn!(account = %account_id, error = %err, "failed to record account");
    }
    Ok(())
}

fn account_from_path(raw: String) -> ApiResult<AccountId> {
    AccountId::new(raw).map_err(|err| ApiError::BadRequest(format!("invalid account id: {err}")))
}

fn lease_request(body: LeaseBody) -> ApiResult<LeaseRequest> {
    match (body.account_id, body.diagram_id, body.holder_id) {
        (Some(account_id), Some(diagram_id), Some(holder_id)) => {
            Ok(LeaseRequest::new(account_id, diagram_id, holder_id)
                .with_diagram_name(body.diagram_name))
        }
        _ => Err(ApiError::BadRequest("accountId, diagramId and holderId are required".into())),
    }
}

fn lease_response(decision: LeaseDecision) -> LeaseResponse {
    match decision {
        LeaseDecision::Granted => LeaseResponse { is_active: true, active_holder_id: None },
        LeaseDecision::Denied { current_holder } => {
            LeaseResponse { is_active: false, active_holder_id: current_holder }
        }
    }
}

async fn health(State(store): State<Store>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK".to_owned(), timestamp: store.now() })
}

async fn claim(
    State(store): State<Store>,
    headers: HeaderMap,
    body: Result<Json<LeaseBody>, JsonRejection>,
) -> ApiResult<Json<LeaseResponse>> {
    let request = lease_request(body?.0)?;
    authorize(&store, &headers, &request.account_id)?;
    Ok(Json(lease_response(store.claim(&request)?)))
}

async fn heartbeat(
    State(store): State<Store>,
    headers: HeaderMap,
    body: Result<Json<LeaseBody>, JsonRejection>,
) -> ApiResult<Json<LeaseResponse>> {
    let request = lease_request(body?.0)?;
    authorize(&store, &headers, &request.account_id)?;
    Ok(Json(lease_response(store.heartbeat(&request)?)))
}

async fn transfer(
    State(store): State<Store>,
    headers: HeaderMap,
    body: Result<Json<TransferBody>, JsonRejection>,
) -> ApiResult<Json<TransferResponse>> {
    let body = body?.0;
    let request = lease_request(LeaseBody {
        account_id: body.account_id,
        diagram_id: body.diagram_id,
        holder_id: body.new_holder_id,
        diagram_name: body.diagram_name,
    })
    .map_err(|_| ApiError::BadRequest("accountId, diagramId and newHolderId are required".into()))?;
    authorize(&store, &headers, &request.account_id)?;

    let row = store.transfer(&request)?;
    Ok(Json(TransferResponse { is_active: true, holder_id: row.holder_id }))
}

async fn release(
    State(store): State<Store>,
    headers: HeaderMap,
    body: Result<Json<ReleaseBody>, JsonRejection>,
) -> ApiResult<Json<ReleaseResponse>> {
    let body = body?.0;
    let (Some(account_id), Some(holder_id)) = (body.account_id, body.holder_id) else {
        return Err(ApiError::BadRequest("accountId and holderId are required".into()));
    };
    authorize(&store, &headers, &account_id)?;

    let released = store.release(&account_id, &holder_id)?;
    Ok(Json(ReleaseResponse { success: true, released }))
}

async fn save_latest(
    State(store): State<Store>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<SaveLatestBody>, JsonRejection>,
) -> ApiResult<Json<LatestResponse>> {
    let account_id = account_from_path(path?.0)?;
    authorize(&store, &headers, &account_id)?;
    let body = body?.0;

    let scene = decode_scene(body.scene)?;
    let saved = store.save_latest(&account_id, scene, body.diagram_name)?;
    Ok(Json(LatestResponse {
        scene: encode_scene(&saved.scene),
        diagram_name: saved.diagram_name,
        updated_at: saved.updated_at,
    }))
}

async fn load_latest(
    State(store): State<Store>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<LatestResponse>> {
    let account_id = account_from_path(path?.0)?;
    authorize(&store, &headers, &account_id)?;

    let latest = store.load_latest(&account_id).ok_or(ApiError::NotFound("session"))?;
    Ok(Json(LatestResponse {
        scene: encode_scene(&latest.scene),
        diagram_name: latest.diagram_name,
        updated_at: latest.updated_at,
    }))
}

async fn create_version(
    State(store): State<Store>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<CreateVersionBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<VersionSummary>)> {
    let account_id = account_from_path(path?.0)?;
    authorize(&store, &headers, &account_id)?;
    let body = body?.0;

    let diagram_id =
        body.diagram_id.ok_or_else(|| ApiError::BadRequest("diagramId is required".into()))?;
    let scene = decode_scene(body.scene)?;
    let meta = NewVersion {
        is_auto_save: body.is_auto_save,
        diagram_name: body.diagram_name,
        note: body.note,
    };

    let summary = store.create_version(&account_id, &diagram_id, scene, meta)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn list_versions(
    State(store): State<Store>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<DiagramQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<VersionSummary>>> {
    let account_id = account_from_path(path?.0)?;
    authorize(&store, &headers, &account_id)?;
    let query = query?.0;

    let scope = VersionScope::from_option(query.diagram_id.as_ref());
    Ok(Json(store.list_versions(&account_id, scope)))
}

async fn delete_versions(
    State(store): State<Store>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<DiagramQuery>, QueryRejection>,
) -> ApiResult<Json<DeleteVersionsResponse>> {
    let account_id = account_from_path(path?.0)?;
    authorize(&store, &headers, &account_id)?;
    let query = query?.0;

    let count =
        store.delete_versions(&account_id, VersionScope::from_option(query.diagram_id.as_ref()))?;
    Ok(Json(DeleteVersionsResponse { success: true, count, diagram_id: query.diagram_id }))
}

fn version_path(
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<(AccountId, VersionId)> {
    let Path((account_raw, version_raw)) = path?;
    let account_id = account_from_path(account_raw)?;
    let version_id = version_raw
        .parse::<VersionId>()
        .map_err(|_| ApiError::BadRequest(format!("invalid version id `{version_raw}`")))?;
    Ok((account_id, version_id))
}

async fn get_version(
    State(store): State<Store>,
    headers: HeaderMap,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Json<VersionSnapshot>> {
    let (account_id, version_id) = version_path(path)?;
    authorize(&store, &headers, &account_id)?;

    store.get_version(&account_id, version_id).map(Json).ok_or(ApiError::NotFound("version"))
}

async fn delete_version(
    State(store): State<Store>,
    headers: HeaderMap,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Json<DeleteVersionResponse>> {
    let (account_id, version_id) = version_path(path)?;
    authorize(&store, &headers, &account_id)?;

    if !store.delete_version(&account_id, version_id)? {
        return Err(ApiError::NotFound("version"));
    }
    Ok(Json(DeleteVersionResponse { success: true, id: version_id }))
}

async fn migrate_versions(
    State(store): State<Store>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<MigrateBody>, JsonRejection>,
) -> ApiResult<Json<MigrateResponse>> {
    let account_id = account_from_path(path?.0)?;
    authorize(&store, &headers, &account_id)?;
    let diagram_id = body?
        .0
        .diagram_id
        .ok_or_else(|| ApiError::BadRequest("diagramId is required".into()))?;

    let count = store.migrate_legacy(&account_id, &diagram_id)?;
    Ok(Json(MigrateResponse { count, diagram_id }))
}

async fn rename_diagram(
    State(store): State<Store>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<RenameBody>, JsonRejection>,
) -> ApiResult<Json<RenameResponse>> {
    let account_id = account_from_path(path?.0)?;
    authorize(&store, &headers, &account_id)?;
    let body = body?.0;
    let diagram_id =
        body.diagram_id.ok_or_else(|| ApiError::BadRequest("diagramId is required".into()))?;

    let diagram_name = body.new_name.map(|name| name.trim().to_owned()).filter(|n| !n.is_empty());
    let updated = store.rename_diagram(&account_id, &diagram_id, diagram_name.clone())?;
    Ok(Json(RenameResponse { success: true, updated, diagram_name }))
}

async fn diagram_name(
    State(store): State<Store>,
    headers: HeaderMap,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<DiagramQuery>, QueryRejection>,
) -> ApiResult<Json<DiagramNameResponse>> {
    let account_id = account_from_path(path?.0)?;
    authorize(&store, &headers, &account_id)?;
    let diagram_id: DiagramId = query?
        .0
        .diagram_id
        .ok_or_else(|| ApiError::BadRequest("diagramId is required".into()))?;

    Ok(Json(DiagramNameResponse { diagram_name: store.diagram_name(&account_id, &diagram_id) }))
}

#[cfg(test)]
mod tests;
