use std::sync::Arc;

use crate::backend::{HttpBackend, NoteBackend};
use crate::config::{Config, APP_VERSION};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": APP_VERSION,
            "baseUrl": state.backend.as_ref().map(|b| b.describe()),
            "openForms": state.forms.len(),
            "savesInFlight": state.saves_in_flight(),
        }),
    )
}

fn handle_session_configure(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cfg: Config = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if cfg.base_url.as_deref().is_none_or(|u| u.trim().is_empty()) {
        return err(&req.id, "bad_params", "missing baseUrl", None);
    }

    match HttpBackend::from_config(&cfg) {
        Ok(backend) => {
            let backend = backend.map(|b| Arc::new(b) as Arc<dyn NoteBackend>);
            tracing::info!(
                base_url = cfg.base_url.as_deref().unwrap_or_default(),
                timeout_secs = ?cfg.timeout_secs,
                "backend configured"
            );
            state.backend = backend;
            state.config = cfg;
            ok(
                &req.id,
                json!({
                    "baseUrl": state.config.base_url,
                    "timeoutSecs": state.config.timeout_secs,
                }),
            )
        }
        Err(e) => err(&req.id, "bad_params", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.configure" => Some(handle_session_configure(state, req)),
        _ => None,
    }
}
