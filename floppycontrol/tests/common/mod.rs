#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use floppyconfig::SettingsFile;
use floppycontrol::{
    AuthPrompt, AuthSessionManager, AuthToken, BackendError, CloudPlayback, DeviceCache,
    DeviceInfo, OrchestratorOptions, PlaybackOrchestrator, TagRegistry,
};
use floppymedia::LocalMediaServer;
use tempfile::TempDir;
use url::Url;

pub const SPEAKER: &str = "Wohnzimmer TV";

pub fn token_expiring_in(secs: i64) -> AuthToken {
    AuthToken {
        access_token: format!("access-{}", secs),
        refresh_token: "refresh-1".to_string(),
        expires_at: Utc::now() + chrono::Duration::seconds(secs),
    }
}

/// In-memory cloud backend.
///
/// `play` succeeds when the device id is in `devices`, unless a scripted
/// result is queued in `play_results`. Pause and resume succeed unless
/// scripted too.
pub struct FakeCloud {
    pub devices: Mutex<Vec<DeviceInfo>>,
    pub play_results: Mutex<VecDeque<Result<(), BackendError>>>,
    pub list_results: Mutex<VecDeque<Result<Vec<DeviceInfo>, BackendError>>>,
    pub plays: Mutex<Vec<(String, String)>>,
    pub pause_results: Mutex<VecDeque<Result<(), BackendError>>>,
    pub resume_results: Mutex<VecDeque<Result<(), BackendError>>>,
    pub pauses: Mutex<Vec<String>>,
    pub resumes: Mutex<Vec<String>>,
    pub shuffles: Mutex<Vec<(String, bool)>>,
    pub list_calls: AtomicUsize,
    pub refresh_result: Mutex<Option<Result<AuthToken, BackendError>>>,
    pub refresh_calls: AtomicUsize,
    pub exchanged_codes: Mutex<Vec<String>>,
}

impl FakeCloud {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices: Mutex::new(devices),
            play_results: Mutex::new(VecDeque::new()),
            list_results: Mutex::new(VecDeque::new()),
            plays: Mutex::new(Vec::new()),
            pause_results: Mutex::new(VecDeque::new()),
            resume_results: Mutex::new(VecDeque::new()),
            pauses: Mutex::new(Vec::new()),
            resumes: Mutex::new(Vec::new()),
            shuffles: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            refresh_result: Mutex::new(None),
            refresh_calls: AtomicUsize::new(0),
            exchanged_codes: Mutex::new(Vec::new()),
        }
    }

    pub fn plays(&self) -> Vec<(String, String)> {
        self.plays.lock().unwrap().clone()
    }

    pub fn pauses(&self) -> Vec<String> {
        self.pauses.lock().unwrap().clone()
    }

    pub fn resumes(&self) -> Vec<String> {
        self.resumes.lock().unwrap().clone()
    }

    pub fn shuffles(&self) -> Vec<(String, bool)> {
        self.shuffles.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn script_play(&self, result: Result<(), BackendError>) {
        self.play_results.lock().unwrap().push_back(result);
    }

    pub fn script_pause(&self, result: Result<(), BackendError>) {
        self.pause_results.lock().unwrap().push_back(result);
    }

    pub fn script_resume(&self, result: Result<(), BackendError>) {
        self.resume_results.lock().unwrap().push_back(result);
    }

    pub fn script_list(&self, result: Result<Vec<DeviceInfo>, BackendError>) {
        self.list_results.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl CloudPlayback for FakeCloud {
    async fn list_active_devices(&self, _token: &AuthToken) -> Result<Vec<DeviceInfo>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.list_results.lock().unwrap().pop_front() {
            return result;
        }
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn play(&self, device_id: &str, uri: &str, _token: &AuthToken) -> Result<(), BackendError> {
        self.plays
            .lock()
            .unwrap()
            .push((device_id.to_string(), uri.to_string()));
        if let Some(result) = self.play_results.lock().unwrap().pop_front() {
            return result;
        }
        if self.devices.lock().unwrap().iter().any(|d| d.id == device_id) {
            Ok(())
        } else {
            Err(BackendError::device_not_found(device_id))
        }
    }

    async fn pause(&self, device_id: &str, _token: &AuthToken) -> Result<(), BackendError> {
        self.pauses.lock().unwrap().push(device_id.to_string());
        self.pause_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn resume(&self, device_id: &str, _token: &AuthToken) -> Result<(), BackendError> {
        self.resumes.lock().unwrap().push(device_id.to_string());
        self.resume_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn set_shuffle(&self, device_id: &str, shuffle: bool, _token: &AuthToken) -> Result<(), BackendError> {
        self.shuffles.lock().unwrap().push((device_id.to_string(), shuffle));
        Ok(())
    }

    fn authorize_url(&self, state: &str) -> String {
        format!("https://accounts.test/authorize?client_id=abc&state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthToken, BackendError> {
        self.exchanged_codes.lock().unwrap().push(code.to_string());
        if code == "good-code" {
            Ok(token_expiring_in(3600))
        } else {
            Err(BackendError::rejected("invalid_grant"))
        }
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<AuthToken, BackendError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        match self.refresh_result.lock().unwrap().clone() {
            Some(result) => result,
            None => Ok(token_expiring_in(3600)),
        }
    }
}

/// Operator that answers every challenge with `code`, echoing the state.
pub struct ScriptedPrompt {
    pub code: String,
    pub prompts: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthPrompt for ScriptedPrompt {
    async fn request_redirect(&self, authorize_url: &str) -> floppycontrol::Result<String> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(redirect_for(authorize_url, &self.code))
    }
}

/// Builds the redirect URL a browser would land on for `authorize_url`.
pub fn redirect_for(authorize_url: &str, code: &str) -> String {
    let url = Url::parse(authorize_url).unwrap();
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    format!("http://127.0.0.1:8888/callback?code={}&state={}", code, state)
}

pub struct Fixture {
    pub dir: TempDir,
    pub settings: SettingsFile,
    pub cloud: Arc<FakeCloud>,
    pub prompt: Arc<ScriptedPrompt>,
    pub media: Arc<LocalMediaServer>,
}

impl Fixture {
    /// Settings with the speaker name and the given `tags:` body.
    pub fn new(tags: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join("music");
        std::fs::create_dir(&music).unwrap();
        std::fs::write(music.join("track.mp3"), b"ID3").unwrap();

        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            format!("speaker:\n  device_name: {}\ntags:\n{}", SPEAKER, tags),
        )
        .unwrap();

        let media = Arc::new(LocalMediaServer::new(&music, "host", 8080).unwrap());
        Self {
            dir,
            settings: SettingsFile::new(path),
            cloud: Arc::new(FakeCloud::new(vec![DeviceInfo::new(SPEAKER, "fresh-id")])),
            prompt: Arc::new(ScriptedPrompt::new("good-code")),
            media,
        }
    }

    pub fn store_token(&self, token: &AuthToken) {
        self.settings
            .write_path(&["state", "auth"], serde_yaml::to_value(token).unwrap())
            .unwrap();
    }

    pub fn cache_device(&self, id: &str) {
        DeviceCache::load(self.settings.clone()).put(SPEAKER, id).unwrap();
    }

    pub fn cached_device(&self) -> Option<String> {
        DeviceCache::load(self.settings.clone()).get(SPEAKER).device_id
    }

    pub fn auth(&self, margin_secs: u64) -> AuthSessionManager {
        AuthSessionManager::new(
            self.cloud.clone(),
            self.prompt.clone(),
            self.settings.clone(),
            Duration::from_secs(margin_secs),
        )
    }

    pub fn orchestrator(&self) -> PlaybackOrchestrator {
        self.orchestrator_with(self.prompt.clone())
    }

    pub fn orchestrator_with(&self, prompt: Arc<dyn AuthPrompt>) -> PlaybackOrchestrator {
        let mut options = OrchestratorOptions::new(SPEAKER);
        options.network_retry_backoff = Duration::from_millis(1);
        PlaybackOrchestrator::new(
            TagRegistry::load(self.settings.clone()).unwrap(),
            DeviceCache::load(self.settings.clone()),
            AuthSessionManager::new(
                self.cloud.clone(),
                prompt,
                self.settings.clone(),
                Duration::from_secs(60),
            ),
            self.media.clone(),
            self.cloud.clone(),
            options,
        )
    }
}

pub const TAG001: &str = "  TAG001:\n    kind: stream_uri\n    value: \"spotify:track:XYZ\"\n";
pub const TAG_LOCAL: &str = "  TAG002:\n    kind: local_file\n    value: track.mp3\n";
