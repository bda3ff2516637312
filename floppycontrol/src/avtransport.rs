//! Minimal UPnP AVTransport client used to play local files directly on
//! the speaker.

use std::time::Duration;

use quick_xml::{Reader, escape::escape, events::Event};
use tracing::debug;

use crate::errors::BackendError;

const AVTRANSPORT_SERVICE: &str = "urn:schemas-upnp-org:service:AVTransport:1";
const SOAP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AvTransportRenderer {
    control_url: String,
    client: reqwest::Client,
}

impl AvTransportRenderer {
    pub fn new(control_url: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(SOAP_TIMEOUT)
            .build()
            .map_err(|e| BackendError::network(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            control_url: control_url.into(),
            client,
        })
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }

    /// Loads `uri` into the transport and starts it.
    pub async fn play_uri(&self, uri: &str) -> Result<(), BackendError> {
        self.invoke(
            "SetAVTransportURI",
            &[("InstanceID", "0"), ("CurrentURI", uri), ("CurrentURIMetaData", "")],
        )
        .await?;
        self.invoke("Play", &[("InstanceID", "0"), ("Speed", "1")])
            .await
    }

    pub async fn pause(&self) -> Result<(), BackendError> {
        self.invoke("Pause", &[("InstanceID", "0")]).await
    }

    /// Restarts the transport on the URI already loaded.
    pub async fn resume(&self) -> Result<(), BackendError> {
        self.invoke("Play", &[("InstanceID", "0"), ("Speed", "1")])
            .await
    }

    pub async fn set_shuffle(&self, shuffle: bool) -> Result<(), BackendError> {
        let mode = if shuffle { "SHUFFLE" } else { "NORMAL" };
        self.invoke("SetPlayMode", &[("InstanceID", "0"), ("NewPlayMode", mode)])
            .await
    }

    async fn invoke(&self, action: &str, args: &[(&str, &str)]) -> Result<(), BackendError> {
        let body = build_soap_request(action, args);
        debug!(action, url = %self.control_url, "Invoking AVTransport action");

        let response = self
            .client
            .post(&self.control_url)
            .header("Content-Type", r#"text/xml; charset="utf-8""#)
            .header("SOAPAction", format!(r#""{}#{}""#, AVTRANSPORT_SERVICE, action))
            .body(body)
            .send()
            .await
            .map_err(|e| BackendError::network(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // Une faute SOAP arrive en HTTP 500 : c'est un refus, pas une panne
        let raw_body = response.text().await.unwrap_or_default();
        match parse_upnp_error(&raw_body) {
            Some((code, description)) => Err(BackendError::rejected(format!(
                "{} returned UPnP error {}: {} (HTTP status {})",
                action, code, description, status
            ))),
            None if status.is_server_error() => Err(BackendError::network(format!(
                "{} failed with HTTP status {}",
                action, status
            ))),
            None => Err(BackendError::rejected(format!(
                "{} failed with HTTP status {}",
                action, status
            ))),
        }
    }
}

fn build_soap_request(action: &str, args: &[(&str, &str)]) -> String {
    let mut arguments = String::new();
    for (name, value) in args {
        arguments.push_str(&format!("<{name}>{}</{name}>", escape(*value)));
    }
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{service}">{arguments}</u:{action}></s:Body></s:Envelope>"#,
        action = action,
        service = AVTRANSPORT_SERVICE,
        arguments = arguments,
    )
}

/// Extracts `errorCode` / `errorDescription` from a SOAP fault body.
fn parse_upnp_error(body: &str) -> Option<(u32, String)> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut current: Option<String> = None;
    let mut code = None;
    let mut description = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                current = Some(name);
            }
            Ok(Event::Text(t)) => {
                let text = t.decode().ok()?.into_owned();
                match current.as_deref() {
                    Some("errorCode") => code = text.parse().ok(),
                    Some("errorDescription") => description = text,
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    code.map(|code| (code, description))
}
