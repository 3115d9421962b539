use std::sync::atomic::Ordering;

use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::{err, event};
use crate::pipeline::{self, SaveCompletion};

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::forms::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::cells::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

/// Apply a finished save and build the event line announcing it. Returns
/// `None` when the form was closed meanwhile.
pub fn handle_completion(
    state: &mut AppState,
    completion: SaveCompletion,
) -> Option<serde_json::Value> {
    state.saves_in_flight.fetch_sub(1, Ordering::SeqCst);

    let form_id = completion.form_id.clone();
    let Some(form) = state.forms.get_mut(&form_id) else {
        tracing::debug!(
            form_id = %form_id,
            etudid = %completion.request.etudid,
            "save finished for a closed form"
        );
        return None;
    };

    match pipeline::apply_completion(form, completion) {
        Ok(report) => {
            let name = if report.failed() {
                "cell.saveFailed"
            } else {
                "cell.saved"
            };
            Some(event(name, &form_id, serde_json::json!(report)))
        }
        Err(e) => {
            tracing::warn!(
                form_id = %form_id,
                error = %e,
                "acknowledgement does not fit its form"
            );
            None
        }
    }
}
