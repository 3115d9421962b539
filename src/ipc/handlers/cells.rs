use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{form_and_workers, form_mut, opt_str, req_str};
use crate::ipc::types::{AppState, Request};
use crate::pipeline;
use serde_json::json;

/// Clipboard payloads larger than this are refused outright.
const PASTE_MAX_BYTES: usize = 256 * 1024;

fn cell_input(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let form_id = req_str(req, "formId")?;
    let etudid = req_str(req, "etudid")?;
    let text = opt_str(req, "text").unwrap_or_default();
    let form = form_mut(state, &form_id)?;
    let cell = form.input(&etudid, &text)?;
    Ok(json!({ "cell": cell }))
}

fn cell_blur(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let form_id = req_str(req, "formId")?;
    let etudid = req_str(req, "etudid")?;
    let (form, workers) = form_and_workers(state, &form_id)?;
    if let Some(text) = opt_str(req, "text") {
        form.input(&etudid, &text)?;
    }
    let report = pipeline::blur_and_save(form, &workers, &etudid)?;
    Ok(json!(report))
}

fn cell_paste(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let form_id = req_str(req, "formId")?;
    let etudid = req_str(req, "etudid")?;
    let Some(text) = opt_str(req, "text") else {
        return Err(HandlerErr::bad_params("missing text"));
    };
    if text.len() > PASTE_MAX_BYTES {
        return Err(HandlerErr {
            code: "bad_params",
            message: "clipboard payload too large".to_string(),
            details: Some(json!({ "bytes": text.len(), "max": PASTE_MAX_BYTES })),
        });
    }
    let (form, workers) = form_and_workers(state, &form_id)?;
    let reports = pipeline::paste_and_save(form, &workers, &etudid, &text)?;
    let sent = reports.iter().filter(|r| r.sent).count();
    Ok(json!({
        "assigned": reports.len(),
        "sent": sent,
        "reports": reports,
    }))
}

fn cell_pick_history(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let form_id = req_str(req, "formId")?;
    let etudid = req_str(req, "etudid")?;
    let value = req_str(req, "value")?;
    let (form, workers) = form_and_workers(state, &form_id)?;
    let report = pipeline::pick_history_and_save(form, &workers, &etudid, &value)?;
    Ok(json!(report))
}

fn respond(
    req: &Request,
    result: Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cell.input" => Some(respond(req, cell_input(state, req))),
        "cell.blur" => Some(respond(req, cell_blur(state, req))),
        "cell.paste" => Some(respond(req, cell_paste(state, req))),
        "cell.pickHistory" => Some(respond(req, cell_pick_history(state, req))),
        _ => None,
    }
}
