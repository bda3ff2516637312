//! Documentation OpenAPI et DTOs pour l'API opérateur

use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::auth::AuthState;
use crate::model::{TagMapping, TargetKind};

/// État courant du service
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusResponse {
    pub auth_state: AuthState,
    /// Configured speaker name
    pub device_name: String,
    /// An authorization URL is waiting for the operator
    pub pending_authorization: bool,
    pub last_scan: Option<LastScanSummary>,
}

/// Dernier scan traité par le worker
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LastScanSummary {
    pub tag_uid: String,
    /// RFC 3339
    pub handled_at: String,
    pub result: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanAccepted {
    pub tag_uid: String,
}

/// Uid du dernier tag vu par le lecteur, pour pré-remplir un ajout
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LatestScan {
    pub tag_uid: Option<String>,
}

/// Un tag enregistré
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TagEntry {
    pub tag_uid: String,
    pub name: Option<String>,
    pub kind: TargetKind,
    /// Stream URI or filename under the media root
    pub value: String,
    pub shuffle: bool,
}

impl From<&TagMapping> for TagEntry {
    fn from(mapping: &TagMapping) -> Self {
        Self {
            tag_uid: mapping.tag_uid.clone(),
            name: mapping.name.clone(),
            kind: mapping.target_kind,
            value: mapping.target_value.clone(),
            shuffle: mapping.shuffle,
        }
    }
}

/// Ajout ou remplacement d'un tag
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TagRequest {
    pub tag_uid: String,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: TargetKind,
    pub value: String,
    #[serde(default)]
    pub shuffle: bool,
}

/// Challenge d'autorisation en attente
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthChallenge {
    pub pending: bool,
    pub authorize_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RedirectRequest {
    /// Full URL the browser was redirected to after login
    pub redirect_url: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::server_ext::get_status,
        crate::server_ext::post_scan,
        crate::server_ext::delete_scan,
        crate::server_ext::get_latest_scan,
        crate::server_ext::list_tags,
        crate::server_ext::post_tag,
        crate::server_ext::delete_tag,
        crate::server_ext::get_auth,
        crate::server_ext::post_auth_redirect,
    ),
    components(schemas(
        StatusResponse,
        LastScanSummary,
        ScanAccepted,
        LatestScan,
        TagEntry,
        TagRequest,
        TargetKind,
        AuthChallenge,
        RedirectRequest,
        SuccessResponse,
        ErrorResponse,
        AuthState,
    )),
    tags((name = "operator", description = "Status, manual scans, tag mappings and authorization handshake"))
)]
pub struct ApiDoc;
