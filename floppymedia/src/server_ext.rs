//! Extension floppyserver pour servir les fichiers audio locaux
//!
//! Les fichiers sont servis à la racine du serveur (`GET /<filename>`),
//! derrière toutes les routes d'API déjà enregistrées.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use floppyserver::Server;
use tracing::warn;

use crate::LocalMediaServer;

async fn serve_media(
    State(media): State<Arc<LocalMediaServer>>,
    Path(filename): Path<String>,
) -> Response {
    match media.serve(&filename).await {
        Ok(stream) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, stream.content_type.to_string()),
                (header::CONTENT_LENGTH, stream.length.to_string()),
            ],
            Body::from_stream(stream.body),
        )
            .into_response(),
        Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "File not found").into_response(),
        Err(e) => {
            warn!("Error reading media file {}: {}", filename, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error reading file").into_response()
        }
    }
}

/// Crée le router `GET /{*filename}` pour un serveur de médias
pub fn create_media_router(media: Arc<LocalMediaServer>) -> Router {
    Router::new()
        .route("/{*filename}", get(serve_media))
        .with_state(media)
}

/// Trait d'extension pour floppyserver::Server
#[async_trait]
pub trait MediaServerExt {
    /// Monte le serveur de médias en fallback du serveur HTTP.
    ///
    /// Every path no other route claims is looked up under the media root.
    async fn init_media_server(&mut self, media: Arc<LocalMediaServer>);
}

#[async_trait]
impl MediaServerExt for Server {
    async fn init_media_server(&mut self, media: Arc<LocalMediaServer>) {
        tracing::info!(root = %media.root().display(), "Serving local media files");
        self.set_fallback(create_media_router(media)).await;
    }
}
