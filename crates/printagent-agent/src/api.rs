// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backend API client.
//
// The backend owns the job queue and the printer catalogue.  The agent logs
// in with its own account, keeps the bearer token in the local store, and
// drops both token and credentials as soon as the backend answers 401.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use printagent_core::error::{AgentError, Result};
use printagent_core::types::{JobStatus, PrintJob, PrinterRecord};
use printagent_print::system::derive_capabilities;

use crate::store::{CREDENTIALS_KEY, KvStore, TOKEN_KEY};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The part of the backend the job processor drives.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn fetch_jobs(&self, status: JobStatus) -> Result<Vec<PrintJob>>;

    async fn update_job_status(&self, id: i64, status: JobStatus, message: Option<&str>) -> Result<()>;

    /// Fire-and-forget event.  Failures are logged, never returned.
    async fn send_telemetry(&self, event_type: &str, event_data: Value);

    async fn download_file(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub agent: Value,
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<PrintJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendCapabilities {
    pub color: bool,
    pub duplex: bool,
    pub paper_sizes: Vec<String>,
    pub max_resolution: String,
}

/// Printer payload for the backend catalogue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendPrinter {
    pub name: String,
    pub model: String,
    pub location: String,
    pub status: String,
    pub capabilities: BackendCapabilities,
    pub price_per_page: f64,
    pub price_color: f64,
}

impl From<&PrinterRecord> for BackendPrinter {
    fn from(record: &PrinterRecord) -> Self {
        let caps = derive_capabilities(&record.name, "");
        let location = match (&record.ip_address, record.port) {
            (Some(ip), Some(port)) => format!("{ip}:{port}"),
            (Some(ip), None) => ip.clone(),
            _ if record.is_usb => format!("USB {}", record.id),
            _ => "local".to_string(),
        };
        Self {
            name: record.name.clone(),
            model: record.name.clone(),
            location,
            status: if record.is_connected { "online" } else { "offline" }.to_string(),
            capabilities: BackendCapabilities {
                color: caps.color,
                duplex: caps.duplex,
                paper_sizes: caps.paper_sizes,
                max_resolution: caps.max_resolution,
            },
            price_per_page: 0.0,
            price_color: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedPrinter {
    id: i64,
}

fn transport(e: reqwest::Error) -> AgentError {
    AgentError::Backend(e.to_string())
}

/// `reqwest` implementation of the backend contract.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    store: Arc<dyn KvStore>,
    token: RwLock<Option<String>>,
}

impl HttpBackend {
    /// Build the client and pick up a token saved by an earlier login.
    pub fn new(base_url: impl Into<String>, store: Arc<dyn KvStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;

        let token = store
            .get(TOKEN_KEY)?
            .and_then(|v| v.as_str().map(str::to_string));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            token: RwLock::new(token),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Forget the token and stored credentials.
    fn clear_session(&self) {
        self.set_token(None);
        for key in [TOKEN_KEY, CREDENTIALS_KEY] {
            if let Err(e) = self.store.delete(key) {
                warn!(key, error = %e, "failed to clear stored session");
            }
        }
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            warn!("backend rejected the agent token");
            self.clear_session();
            return Err(AgentError::Unauthorized);
        }
        let text = response.text().await.unwrap_or_default();
        Err(AgentError::Backend(format!("{status}: {}", text.trim())))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = self.authorized(request).send().await.map_err(transport)?;
        self.check_status(response).await?.json().await.map_err(transport)
    }

    async fn send_empty(&self, request: reqwest::RequestBuilder) -> Result<()> {
        let response = self.authorized(request).send().await.map_err(transport)?;
        self.check_status(response).await?;
        Ok(())
    }

    // -- Auth --

    /// Log in, keeping the token and credentials for later sessions.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let credentials = AgentCredentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let login: LoginResponse = self
            .send_json(self.client.post(self.url("auth/agent/login")).json(&credentials))
            .await?;

        self.set_token(Some(login.access_token.clone()));
        self.store.set(TOKEN_KEY, &json!(login.access_token))?;
        self.store.set(CREDENTIALS_KEY, &serde_json::to_value(&credentials)?)?;
        info!("agent logged in");
        Ok(login)
    }

    /// Whether a session is available, re-logging in from stored
    /// credentials when no token is held.
    pub async fn check_auth(&self) -> bool {
        if self.is_authenticated() {
            return true;
        }
        let credentials = match self.store.get(CREDENTIALS_KEY) {
            Ok(Some(value)) => serde_json::from_value::<AgentCredentials>(value).ok(),
            _ => None,
        };
        let Some(credentials) = credentials.filter(|c| !c.email.is_empty() && !c.password.is_empty()) else {
            return false;
        };
        match self.login(&credentials.email, &credentials.password).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "re-login from stored credentials failed");
                false
            }
        }
    }

    pub fn logout(&self) {
        self.clear_session();
        info!("agent logged out");
    }

    // -- Printers --

    #[instrument(skip(self, printer), fields(name = %printer.name))]
    pub async fn create_printer(&self, printer: &BackendPrinter) -> Result<i64> {
        let created: CreatedPrinter = self
            .send_json(self.client.post(self.url("printers")).json(printer))
            .await?;
        Ok(created.id)
    }

    #[instrument(skip(self, printer))]
    pub async fn update_printer(&self, id: i64, printer: &BackendPrinter) -> Result<()> {
        self.send_empty(self.client.put(self.url(&format!("printers/{id}"))).json(printer))
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_printer_status(&self, id: i64, status: &str, queue_length: u32, is_online: bool) -> Result<()> {
        let body = json!({
            "status": status,
            "queue_length": queue_length,
            "is_online": is_online,
        });
        self.send_empty(self.client.put(self.url(&format!("printers/{id}/status"))).json(&body))
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_printer(&self, id: i64) -> Result<()> {
        self.send_empty(self.client.delete(self.url(&format!("printers/{id}"))))
            .await
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_jobs(&self, status: JobStatus) -> Result<Vec<PrintJob>> {
        let response: JobsResponse = self
            .send_json(
                self.client
                    .get(self.url("agent/jobs"))
                    .query(&[("status", status.as_str())]),
            )
            .await?;
        debug!(count = response.jobs.len(), "jobs fetched");
        Ok(response.jobs)
    }

    #[instrument(skip(self, message))]
    async fn update_job_status(&self, id: i64, status: JobStatus, message: Option<&str>) -> Result<()> {
        let mut body = json!({ "status": status.as_str() });
        if let Some(message) = message {
            body["message"] = json!(message);
        }
        self.send_empty(self.client.put(self.url(&format!("agent/jobs/{id}/status"))).json(&body))
            .await
    }

    async fn send_telemetry(&self, event_type: &str, event_data: Value) {
        let body = json!({ "event_type": event_type, "event_data": event_data });
        if let Err(e) = self
            .send_empty(self.client.post(self.url("telemetry/event")).json(&body))
            .await
        {
            warn!(event_type, error = %e, "failed to send telemetry");
        }
    }

    #[instrument(skip(self))]
    async fn download_file(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .authorized(self.client.get(self.url(url)))
            .send()
            .await
            .map_err(transport)?;
        let bytes = self.check_status(response).await?.bytes().await.map_err(transport)?;
        debug!(bytes = bytes.len(), "job file downloaded");
        Ok(bytes.to_vec())
    }
}
