use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

/// Path of the note save endpoint, relative to the department base URL.
pub const SAVE_NOTE_PATH: &str = "/Notes/save_note";

/// One note update, as posted to ScoDoc.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveRequest {
    pub etudid: String,
    pub evaluation_id: String,
    pub value: String,
    pub comment: String,
    /// Per-form dispatch sequence number. Never sent over the wire.
    #[serde(skip)]
    pub ticket: u64,
}

/// Acknowledgement returned by the save endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SaveAck {
    #[serde(default)]
    pub nbchanged: u32,
    #[serde(default, deserialize_with = "student_ids")]
    pub existing_decisions: Vec<String>,
    #[serde(default)]
    pub history_menu: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SaveAck {
    pub fn has_decision_for(&self, etudid: &str) -> bool {
        self.existing_decisions.iter().any(|id| id == etudid)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status.as_deref() == Some("unauthorized")
    }
}

/// ScoDoc emits student ids as integers; older pages used strings.
fn student_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(i64),
        Text(String),
    }

    let ids: Option<Vec<Id>> = Option::deserialize(deserializer)?;
    Ok(ids
        .unwrap_or_default()
        .into_iter()
        .map(|id| match id {
            Id::Num(n) => n.to_string(),
            Id::Text(s) => s,
        })
        .collect())
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("ScoDoc is not reachable at {0}")]
    Connection(String),

    #[error("save_note returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("malformed save_note response: {0}")]
    ResponseParsing(String),
}

/// Transport seam for the save dispatcher. Saves run on worker threads,
/// so implementations are shared across them.
pub trait NoteBackend: Send + Sync {
    fn save_note(&self, req: &SaveRequest) -> Result<SaveAck, BackendError>;

    fn describe(&self) -> String;
}

/// Blocking HTTP client for a ScoDoc department.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    pub fn from_config(cfg: &Config) -> Result<Option<Self>, BackendError> {
        let Some(base_url) = cfg.base_url.as_deref() else {
            return Ok(None);
        };
        Self::new(base_url, cfg.timeout_secs).map(Some)
    }

    /// No timeout is applied unless one is configured: a stalled request
    /// leaves its cell pending.
    pub fn new(base_url: &str, timeout_secs: Option<u64>) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| BackendError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn save_url(&self) -> String {
        format!("{}{}", self.base_url, SAVE_NOTE_PATH)
    }
}

impl NoteBackend for HttpBackend {
    fn save_note(&self, req: &SaveRequest) -> Result<SaveAck, BackendError> {
        let response = self
            .client
            .post(self.save_url())
            .form(req)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    BackendError::Connection(self.base_url.clone())
                } else {
                    BackendError::Client(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<SaveAck>()
            .map_err(|e| BackendError::ResponseParsing(e.to_string()))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
