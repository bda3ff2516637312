//! Assemblage du service : serveur HTTP, médias locaux, orchestrateur et console

use std::sync::Arc;

use anyhow::{Context, Result};
use floppyconfig::Config;
use floppycontrol::{
    AuthSessionManager, AvTransportRenderer, CloudPlayback, ControlConfigExt, DeviceCache,
    OperatorApiExt, OperatorApiState, OperatorChannel, OrchestratorOptions, PlaybackOrchestrator,
    RoutedPlayback, TagRegistry, spawn_worker,
};
use floppymedia::{LocalMediaServer, MediaConfigExt, MediaServerExt};
use floppyserver::{LoggingOptions, Server};
use floppyspotify::SpotifyClient;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::console::{run_console, stdin_lines};

/// Capacité de la file des scans en attente
const SCAN_QUEUE_CAPACITY: usize = 32;

/// Cloud backend: Spotify, with local HTTP files routed to the renderer
/// when one is configured.
pub fn build_backend(config: &Config) -> Result<Arc<dyn CloudPlayback>> {
    let spotify = SpotifyClient::from_config(config).context("Spotify is not configured")?;
    let renderer = config
        .get_renderer_control_url()
        .map(AvTransportRenderer::new)
        .transpose()
        .context("Invalid speaker.renderer_control_url")?;
    if renderer.is_none() {
        info!("No renderer configured, local files are sent to Spotify");
    }
    let backend: Arc<dyn CloudPlayback> =
        Arc::new(RoutedPlayback::new(Arc::new(spotify), renderer));
    Ok(backend)
}

pub async fn run(config: Config) -> Result<()> {
    let mut server = Server::new_configured(&config);
    server
        .init_logging(LoggingOptions::from_config(&config))
        .await;

    let settings = config.settings().clone();
    let info = server.info();

    let media = Arc::new(
        LocalMediaServer::new(config.get_media_root(), &info.base_url, info.http_port)
            .context("Cannot serve local media")?,
    );
    info!(root=%media.root().display(), "Serving local media");

    let backend = build_backend(&config)?;

    let device_name = config.get_speaker_device_name().unwrap_or_default();
    if device_name.is_empty() {
        warn!("speaker.device_name is empty, every scan will fail until it is set");
    }

    let registry = TagRegistry::load(settings.clone()).context("Cannot read the tags section")?;
    info!("{} tag(s) registered", registry.len());

    let channel = Arc::new(OperatorChannel::new());
    let auth = AuthSessionManager::new(
        backend.clone(),
        channel.clone(),
        settings.clone(),
        config.get_auth_margin(),
    );
    let auth_state = auth.watch_state();

    let mut options = OrchestratorOptions::new(device_name.clone());
    options.network_retry_backoff = config.get_network_retry_backoff();
    let orchestrator = PlaybackOrchestrator::new(
        registry,
        DeviceCache::load(settings.clone()),
        auth,
        media.clone(),
        backend,
        options,
    );

    let (scans, receiver) = mpsc::channel(SCAN_QUEUE_CAPACITY);
    let worker = spawn_worker(orchestrator, receiver, config.get_removal_debounce());

    server
        .init_operator_api(OperatorApiState::new(
            channel.clone(),
            auth_state,
            worker.last_scan(),
            scans.clone(),
            settings,
            device_name,
        ))
        .await;
    // les routes de l'API passent avant les fichiers
    server.init_media_server(media).await;

    server.start().await?;
    for (iface, addresses) in floppyutils::list_ipv4_addresses() {
        for address in addresses {
            info!(interface = %iface, "Operator API at http://{}:{}/swagger-ui/operator", address, info.http_port);
        }
    }
    info!("Floppyfy is ready, scan a tag or type its uid (prefix with '-' when it is removed)");

    let console = tokio::spawn(run_console(stdin_lines(), channel, scans));
    server.wait().await;

    console.abort();
    info!("Floppyfy stopped");
    Ok(())
}
