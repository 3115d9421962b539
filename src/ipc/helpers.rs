use std::sync::Arc;

use serde_json::json;

use super::error::HandlerErr;
use super::types::{AppState, Request};
use super::workers::SaveWorkers;
use crate::form::GradingForm;

pub fn req_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    req.params
        .get(key)
        .and_then(value_as_id)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

pub fn opt_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

pub fn req_f64(req: &Request, key: &str) -> Result<f64, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing/invalid {key}")))
}

/// ScoDoc ids are integers; the page may hand them over as numbers or strings.
pub fn value_as_id(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn form_mut<'a>(
    state: &'a mut AppState,
    form_id: &str,
) -> Result<&'a mut GradingForm, HandlerErr> {
    state.forms.get_mut(form_id).ok_or_else(|| HandlerErr {
        code: "not_found",
        message: "form not found".to_string(),
        details: Some(json!({ "formId": form_id })),
    })
}

/// The open form together with the workers its saves go through. Fails
/// before touching the form when no backend is configured.
pub fn form_and_workers<'a>(
    state: &'a mut AppState,
    form_id: &str,
) -> Result<(&'a mut GradingForm, SaveWorkers), HandlerErr> {
    let Some(backend) = state.backend.clone() else {
        return Err(HandlerErr {
            code: "no_backend",
            message: "configure a ScoDoc base URL first".to_string(),
            details: None,
        });
    };
    let workers = SaveWorkers {
        backend,
        form_id: form_id.to_string(),
        events: state.events.clone(),
        in_flight: Arc::clone(&state.saves_in_flight),
    };
    Ok((form_mut(state, form_id)?, workers))
}
