//! Extension floppyserver pour l'API opérateur
//!
//! The operator API lets another machine on the network drive what the
//! console does: look at the service, simulate a tag being placed or
//! removed, edit the tag mappings, and complete the authorization handshake.
//!
//! Routes (under `/api/operator`):
//! - `GET /status`
//! - `POST /scan/{uid}`, `DELETE /scan/{uid}`
//! - `GET /last_scan`
//! - `GET /tags`, `POST /tags`, `DELETE /tags/{uid}`
//! - `GET /auth`
//! - `POST /auth/redirect`

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use floppyconfig::SettingsFile;
use floppyserver::Server;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use utoipa::OpenApi;

use crate::auth::AuthState;
use crate::model::{TagEvent, TagMapping};
use crate::openapi::{
    ApiDoc, AuthChallenge, ErrorResponse, LastScanSummary, LatestScan, RedirectRequest,
    ScanAccepted, StatusResponse, SuccessResponse, TagEntry, TagRequest,
};
use crate::operator::OperatorChannel;
use crate::registry::TagRegistry;
use crate::worker::LastScan;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// État partagé pour l'API opérateur
#[derive(Clone)]
pub struct OperatorApiState {
    channel: Arc<OperatorChannel>,
    auth_state: watch::Receiver<AuthState>,
    last_scan: watch::Receiver<Option<LastScan>>,
    scans: mpsc::Sender<TagEvent>,
    settings: SettingsFile,
    device_name: String,
}

impl OperatorApiState {
    pub fn new(
        channel: Arc<OperatorChannel>,
        auth_state: watch::Receiver<AuthState>,
        last_scan: watch::Receiver<Option<LastScan>>,
        scans: mpsc::Sender<TagEvent>,
        settings: SettingsFile,
        device_name: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            auth_state,
            last_scan,
            scans,
            settings,
            device_name: device_name.into(),
        }
    }

    /// Fresh view of the `tags` section, including edits made by the CLI.
    fn registry(&self) -> Result<TagRegistry, ApiError> {
        TagRegistry::load(self.settings.clone())
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }

    fn queue(&self, event: TagEvent) -> Result<(), ApiError> {
        self.scans.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                api_error(StatusCode::SERVICE_UNAVAILABLE, "scan queue is full")
            }
            mpsc::error::TrySendError::Closed(_) => {
                api_error(StatusCode::SERVICE_UNAVAILABLE, "scan worker is stopped")
            }
        })
    }

    /// Tells the worker to re-read the mappings.
    fn tags_changed(&self) {
        if let Err(e) = self.queue(TagEvent::TagsChanged) {
            warn!("Running registry not reloaded ({}), restart to apply the edit", e.1.error);
        }
    }
}

fn tag_uid_from(raw: &str) -> Result<String, ApiError> {
    let uid = raw.trim();
    if uid.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "empty tag uid"));
    }
    Ok(uid.to_string())
}

/// GET /operator/status - État du service
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Service status", body = StatusResponse)
    ),
    tag = "operator"
)]
pub(crate) async fn get_status(State(state): State<OperatorApiState>) -> Json<StatusResponse> {
    let last_scan = state.last_scan.borrow().as_ref().map(|scan| LastScanSummary {
        tag_uid: scan.tag_uid.clone(),
        handled_at: scan.handled_at.to_rfc3339(),
        result: scan.result.clone(),
    });

    Json(StatusResponse {
        auth_state: *state.auth_state.borrow(),
        device_name: state.device_name.clone(),
        pending_authorization: state.channel.pending_url().is_some(),
        last_scan,
    })
}

/// POST /operator/scan/{uid} - Simule le scan d'un tag
#[utoipa::path(
    post,
    path = "/scan/{uid}",
    params(
        ("uid" = String, Path, description = "Tag uid, as printed by the reader")
    ),
    responses(
        (status = 202, description = "Scan queued", body = ScanAccepted),
        (status = 503, description = "Scan queue full or worker stopped", body = ErrorResponse)
    ),
    tag = "operator"
)]
pub(crate) async fn post_scan(
    State(state): State<OperatorApiState>,
    Path(uid): Path<String>,
) -> Result<(StatusCode, Json<ScanAccepted>), ApiError> {
    let uid = tag_uid_from(&uid)?;
    state.queue(TagEvent::Scanned(uid.clone()))?;

    info!(tag = %uid, "Scan queued from the operator API");
    Ok((StatusCode::ACCEPTED, Json(ScanAccepted { tag_uid: uid })))
}

/// DELETE /operator/scan/{uid} - Simule le retrait d'un tag
#[utoipa::path(
    delete,
    path = "/scan/{uid}",
    params(
        ("uid" = String, Path, description = "Tag uid that left the reader")
    ),
    responses(
        (status = 202, description = "Removal queued", body = ScanAccepted),
        (status = 503, description = "Scan queue full or worker stopped", body = ErrorResponse)
    ),
    tag = "operator"
)]
pub(crate) async fn delete_scan(
    State(state): State<OperatorApiState>,
    Path(uid): Path<String>,
) -> Result<(StatusCode, Json<ScanAccepted>), ApiError> {
    let uid = tag_uid_from(&uid)?;
    state.queue(TagEvent::Removed(uid.clone()))?;

    info!(tag = %uid, "Tag removal queued from the operator API");
    Ok((StatusCode::ACCEPTED, Json(ScanAccepted { tag_uid: uid })))
}

/// GET /operator/last_scan - Dernier uid vu, enregistré ou non
#[utoipa::path(
    get,
    path = "/last_scan",
    responses(
        (status = 200, description = "Uid of the last tag handled", body = LatestScan)
    ),
    tag = "operator"
)]
pub(crate) async fn get_latest_scan(State(state): State<OperatorApiState>) -> Json<LatestScan> {
    let tag_uid = state.last_scan.borrow().as_ref().map(|scan| scan.tag_uid.clone());
    Json(LatestScan { tag_uid })
}

/// GET /operator/tags - Liste des tags enregistrés
#[utoipa::path(
    get,
    path = "/tags",
    responses(
        (status = 200, description = "Registered tags, sorted by uid", body = Vec<TagEntry>),
        (status = 500, description = "Settings file unreadable", body = ErrorResponse)
    ),
    tag = "operator"
)]
pub(crate) async fn list_tags(
    State(state): State<OperatorApiState>,
) -> Result<Json<Vec<TagEntry>>, ApiError> {
    let registry = state.registry()?;
    Ok(Json(registry.mappings().map(TagEntry::from).collect()))
}

/// POST /operator/tags - Ajoute ou remplace un tag
#[utoipa::path(
    post,
    path = "/tags",
    request_body = TagRequest,
    responses(
        (status = 201, description = "Tag saved", body = TagEntry),
        (status = 400, description = "Missing uid or value", body = ErrorResponse),
        (status = 500, description = "Settings file not writable", body = ErrorResponse)
    ),
    tag = "operator"
)]
pub(crate) async fn post_tag(
    State(state): State<OperatorApiState>,
    Json(payload): Json<TagRequest>,
) -> Result<(StatusCode, Json<TagEntry>), ApiError> {
    let tag_uid = tag_uid_from(&payload.tag_uid)?;
    let value = payload.value.trim();
    if value.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "empty target value"));
    }

    let mut mapping = TagMapping::new(tag_uid, payload.kind, value).with_shuffle(payload.shuffle);
    if let Some(name) = payload.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        mapping = mapping.with_name(name);
    }

    let mut registry = state.registry()?;
    registry
        .save_mapping(mapping.clone())
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state.tags_changed();

    info!(tag = %mapping.tag_uid, kind = %mapping.target_kind, "Tag saved from the operator API");
    Ok((StatusCode::CREATED, Json(TagEntry::from(&mapping))))
}

/// DELETE /operator/tags/{uid} - Supprime un tag
#[utoipa::path(
    delete,
    path = "/tags/{uid}",
    params(
        ("uid" = String, Path, description = "Tag uid")
    ),
    responses(
        (status = 200, description = "Tag removed", body = SuccessResponse),
        (status = 404, description = "Tag not registered", body = ErrorResponse)
    ),
    tag = "operator"
)]
pub(crate) async fn delete_tag(
    State(state): State<OperatorApiState>,
    Path(uid): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let uid = tag_uid_from(&uid)?;
    let mut registry = state.registry()?;
    let removed = registry
        .remove_mapping(&uid)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if !removed {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("tag {} is not registered", uid),
        ));
    }
    state.tags_changed();

    info!(tag = %uid, "Tag removed from the operator API");
    Ok(Json(SuccessResponse {
        message: format!("Tag {} removed", uid),
    }))
}

/// GET /operator/auth - Challenge d'autorisation en attente
#[utoipa::path(
    get,
    path = "/auth",
    responses(
        (status = 200, description = "Pending authorization, if any", body = AuthChallenge)
    ),
    tag = "operator"
)]
pub(crate) async fn get_auth(State(state): State<OperatorApiState>) -> Json<AuthChallenge> {
    let authorize_url = state.channel.pending_url();
    Json(AuthChallenge {
        pending: authorize_url.is_some(),
        authorize_url,
    })
}

/// POST /operator/auth/redirect - Répond au challenge en attente
#[utoipa::path(
    post,
    path = "/auth/redirect",
    request_body = RedirectRequest,
    responses(
        (status = 200, description = "Redirect URL handed to the waiting session", body = SuccessResponse),
        (status = 409, description = "No authorization is pending", body = ErrorResponse)
    ),
    tag = "operator"
)]
pub(crate) async fn post_auth_redirect(
    State(state): State<OperatorApiState>,
    Json(payload): Json<RedirectRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.channel.submit(payload.redirect_url).map_err(|e| {
        warn!("Redirect URL refused: {}", e);
        api_error(StatusCode::CONFLICT, e.to_string())
    })?;

    Ok(Json(SuccessResponse {
        message: "Redirect URL received".to_string(),
    }))
}

/// Crée le router de l'API opérateur
pub fn create_operator_router(state: OperatorApiState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/scan/{uid}", post(post_scan).delete(delete_scan))
        .route("/last_scan", get(get_latest_scan))
        .route("/tags", get(list_tags).post(post_tag))
        .route("/tags/{uid}", delete(delete_tag))
        .route("/auth", get(get_auth))
        .route("/auth/redirect", post(post_auth_redirect))
        .with_state(state)
}

/// Trait d'extension pour floppyserver::Server
#[async_trait]
pub trait OperatorApiExt {
    /// Enregistre l'API opérateur et sa documentation OpenAPI
    ///
    /// - API REST: `/api/operator/*`
    /// - Swagger: `/swagger-ui/operator`
    async fn init_operator_api(&mut self, state: OperatorApiState);
}

#[async_trait]
impl OperatorApiExt for Server {
    async fn init_operator_api(&mut self, state: OperatorApiState) {
        self.add_openapi(create_operator_router(state), ApiDoc::openapi(), "operator")
            .await;
    }
}
