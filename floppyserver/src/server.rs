//! # Module Server - API de haut niveau pour Axum
//!
//! Routes are collected into one router before the server starts:
//!
//! - JSON endpoints with [`Server::add_route`]
//! - sub-routers with [`Server::add_router`]
//! - documented APIs with [`Server::add_openapi`] (Swagger UI under `/swagger-ui/{name}`)
//! - one catch-all service with [`Server::set_fallback`], used by the media
//!   server so that `/<filename>` never shadows an API path
//!
//! [`Server::start`] binds the port (a bind failure is returned to the
//! caller) and serves until Ctrl+C.

use anyhow::{Context, Result};
use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::{signal, sync::RwLock, task::JoinHandle};
use tracing::{error, info, warn};
use utoipa_swagger_ui::SwaggerUi;

use crate::logs::{LogState, LoggingOptions, create_logs_router, init_logging, log_dump};
use floppyconfig::Config;

/// Info serveur sérialisable
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

/// Serveur principal
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
}

impl Server {
    /// Crée une nouvelle instance de serveur
    ///
    /// * `name` - server name, used in logs
    /// * `base_url` - host other machines use to reach us (no scheme, no port)
    /// * `http_port` - port to listen on, on every interface
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
        }
    }

    /// Server named `Floppyfy`, listening where the `host` section says.
    pub fn new_configured(config: &Config) -> Self {
        Self::new("Floppyfy", config.get_base_url(), config.get_http_port())
    }

    /// Ajoute une route JSON dynamique
    ///
    /// The closure is called on every GET request on `path`.
    ///
    /// ```rust,no_run
    /// # use floppyserver::Server;
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let mut server = Server::new("Test", "localhost", 3000);
    /// server.add_route("/info", || async {
    ///     serde_json::json!({"version": "1.0.0"})
    /// }).await;
    /// # }
    /// ```
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        let handler = move || {
            let f = f.clone();
            async move { Json(f().await) }
        };

        self.add_router(path, Router::new().route("/", get(handler)))
            .await;
    }

    /// Ajoute un sous-router au serveur
    ///
    /// - `path` "/" merges the router at the root
    /// - any other path nests it under that prefix
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        let mut r = self.router.write().await;
        *r = if path == "/" {
            std::mem::take(&mut *r).merge(sub_router)
        } else {
            let normalized = format!("/{}", path.trim_start_matches('/'));
            std::mem::take(&mut *r).nest(&normalized, sub_router)
        };
    }

    /// Installs `fallback` for every request no other route matches.
    ///
    /// Only one fallback can be installed; a second call replaces the first.
    pub async fn set_fallback(&mut self, fallback: Router) {
        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).fallback_service(fallback);
    }

    /// Ajoute une API documentée avec OpenAPI et Swagger UI
    ///
    /// - routes of `api_router` are served under `/api/{name}`
    /// - the OpenAPI document is served at `/api-docs/{name}.json`
    /// - Swagger UI is served at `/swagger-ui/{name}`
    pub async fn add_openapi(
        &mut self,
        api_router: Router,
        openapi: utoipa::openapi::OpenApi,
        name: &str,
    ) {
        let swagger_path: &'static str = Box::leak(format!("/swagger-ui/{}", name).into_boxed_str());
        let openapi_json_path: &'static str =
            Box::leak(format!("/api-docs/{}.json", name).into_boxed_str());
        let swagger = SwaggerUi::new(swagger_path).url(openapi_json_path, openapi);

        let nested_router = Router::new().nest(&format!("/api/{}", name), api_router);

        let mut r = self.router.write().await;
        *r = std::mem::take(&mut *r).merge(nested_router).merge(swagger);
    }

    /// Initialise le système de logging et enregistre les routes de logs
    ///
    /// Registers `GET /log-dump` and the `/api/logs/log_setup` endpoints.
    pub async fn init_logging(&mut self, options: LoggingOptions) -> LogState {
        let log_state = init_logging(options);

        self.add_router(
            "/log-dump",
            Router::new()
                .route("/", get(log_dump))
                .with_state(log_state.clone()),
        )
        .await;
        self.add_openapi(
            create_logs_router(log_state.clone()),
            <crate::logs::LogsApiDoc as utoipa::OpenApi>::openapi(),
            "logs",
        )
        .await;

        log_state
    }

    /// Snapshot of the router as registered so far.
    pub async fn router(&self) -> Router {
        self.router.read().await.clone()
    }

    /// Démarre le serveur HTTP
    ///
    /// Binds `0.0.0.0:{http_port}` and serves in a background task until
    /// Ctrl+C. Failing to bind is returned as an error.
    pub async fn start(&mut self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Cannot listen on port {}", self.http_port))?;

        info!(
            "Server {} running at http://{}:{}",
            self.name, self.base_url, self.http_port
        );

        let router = self.router.read().await.clone();
        let name = self.name.clone();
        self.join_handle = Some(tokio::spawn(async move {
            let shutdown = async {
                match signal::ctrl_c().await {
                    Ok(()) => info!("Ctrl+C reçu, arrêt gracieux"),
                    Err(e) => {
                        warn!("Cannot listen for Ctrl+C: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            if let Err(e) = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(server=%name, "HTTP server stopped with error: {}", e);
            }
        }));

        Ok(())
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    /// Récupère les infos du serveur
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            http_port: self.http_port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn api_routes_take_precedence_over_fallback() {
        let mut server = Server::new("Test", "localhost", 3000);
        server
            .add_route("/info", || async { serde_json::json!({"status": "ok"}) })
            .await;
        server
            .set_fallback(Router::new().route("/{*path}", get(|| async { "fallback" })))
            .await;

        let router = server.router().await;

        let response = router
            .clone()
            .oneshot(Request::get("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"status":"ok"}"#);

        let response = router
            .oneshot(Request::get("/song.mp3").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"fallback");
    }

    #[test]
    fn info_reports_configuration() {
        let server = Server::new("Test", "192.168.1.10", 8080);
        let info = server.info();
        assert_eq!(info.base_url, "192.168.1.10");
        assert_eq!(info.http_port, 8080);
    }
}
