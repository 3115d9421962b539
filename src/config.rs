use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "saisied";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_BASE_URL: &str = "SAISIED_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "SAISIED_TIMEOUT_SECS";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "saisied=info"
}

/// Connection settings for the ScoDoc department the forms belong to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Department base URL, e.g. `https://scodoc.example/ScoDoc/RT/Scolarite`.
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let base_url = get(ENV_BASE_URL)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let timeout_secs = match get(ENV_TIMEOUT_SECS) {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| {
                        format!("{ENV_TIMEOUT_SECS} must be an integer, got {raw:?}")
                    })?,
            ),
            _ => None,
        };
        Ok(Self {
            base_url,
            timeout_secs,
        })
    }
}
