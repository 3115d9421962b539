//! Save dispatch: hands form decisions to a [`Dispatch`] and folds the
//! acknowledgements back into the cells once they arrive.
//!
//! Handlers never wait on the network. A request is handed off, the cell is
//! reported pending, and its [`SaveCompletion`] is applied later. Transport
//! failures are logged and otherwise swallowed: the affected cell stays
//! pending until the user edits it again; nothing is retried.

use serde::Serialize;

use crate::backend::{BackendError, NoteBackend, SaveAck, SaveRequest};
use crate::cell::{BlurOutcome, Cell};
use crate::form::{FormError, GradingForm};

/// Where save requests go once a cell decides it must be saved.
pub trait Dispatch {
    fn send(&self, req: SaveRequest);
}

/// Outcome of one save, carried back to the thread that owns the forms.
#[derive(Debug)]
pub struct SaveCompletion {
    pub form_id: String,
    pub request: SaveRequest,
    pub result: Result<SaveAck, BackendError>,
}

/// Immediate answer to a blur, paste step or history pick.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub etudid: String,
    /// Whether a request went out at all.
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cell: Cell,
}

/// A completed save as applied to its cell.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckReport {
    pub etudid: String,
    pub ticket: u64,
    pub value: String,
    /// False when a newer acknowledgement had already been applied.
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbchanged: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cell: Cell,
}

impl AckReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Perform one save. Blocks for the whole round-trip.
pub fn run_save(
    backend: &dyn NoteBackend,
    form_id: String,
    request: SaveRequest,
) -> SaveCompletion {
    tracing::debug!(
        form_id = %form_id,
        etudid = %request.etudid,
        evaluation_id = %request.evaluation_id,
        ticket = request.ticket,
        value = %request.value,
        "save_note"
    );
    let result = backend.save_note(&request);
    SaveCompletion {
        form_id,
        request,
        result,
    }
}

/// Fold a finished save into `form`.
pub fn apply_completion(
    form: &mut GradingForm,
    completion: SaveCompletion,
) -> Result<AckReport, FormError> {
    let req = completion.request;
    match completion.result {
        Ok(ack) => {
            if ack.is_unauthorized() {
                tracing::warn!(
                    etudid = %req.etudid,
                    evaluation_id = %req.evaluation_id,
                    "save_note answered unauthorized"
                );
            }
            let applied = form.acknowledge(&req, &ack)?;
            if applied {
                tracing::info!(etudid = %req.etudid, nbchanged = ack.nbchanged, "note saved");
            } else {
                tracing::debug!(
                    etudid = %req.etudid,
                    ticket = req.ticket,
                    "late acknowledgement ignored"
                );
            }
            Ok(AckReport {
                cell: form.cell(&req.etudid)?.clone(),
                etudid: req.etudid,
                ticket: req.ticket,
                value: req.value,
                applied,
                nbchanged: Some(ack.nbchanged),
                error: None,
            })
        }
        Err(e) => {
            tracing::warn!(
                etudid = %req.etudid,
                evaluation_id = %req.evaluation_id,
                ticket = req.ticket,
                error = %e,
                "save_note failed, cell left pending"
            );
            Ok(AckReport {
                cell: form.cell(&req.etudid)?.clone(),
                etudid: req.etudid,
                ticket: req.ticket,
                value: req.value,
                applied: false,
                nbchanged: None,
                error: Some(e.to_string()),
            })
        }
    }
}

fn hand_off(
    form: &GradingForm,
    dispatch: &dyn Dispatch,
    req: SaveRequest,
) -> Result<SaveReport, FormError> {
    let report = SaveReport {
        etudid: req.etudid.clone(),
        sent: true,
        value: Some(req.value.clone()),
        ticket: Some(req.ticket),
        error: None,
        cell: form.cell(&req.etudid)?.clone(),
    };
    dispatch.send(req);
    Ok(report)
}

fn settle(
    form: &GradingForm,
    dispatch: &dyn Dispatch,
    etudid: &str,
    outcome: BlurOutcome,
) -> Result<SaveReport, FormError> {
    let error = match outcome {
        BlurOutcome::Dispatch(req) => return hand_off(form, dispatch, req),
        BlurOutcome::Invalid(e) => Some(e.to_string()),
        BlurOutcome::Unchanged => None,
    };
    Ok(SaveReport {
        etudid: etudid.to_string(),
        sent: false,
        value: None,
        ticket: None,
        error,
        cell: form.cell(etudid)?.clone(),
    })
}

/// Validate a cell on leave and send it if it changed.
pub fn blur_and_save(
    form: &mut GradingForm,
    dispatch: &dyn Dispatch,
    etudid: &str,
) -> Result<SaveReport, FormError> {
    let outcome = form.blur(etudid)?;
    settle(form, dispatch, etudid, outcome)
}

/// Paste clipboard text from `start`, sending every field it lands on.
pub fn paste_and_save(
    form: &mut GradingForm,
    dispatch: &dyn Dispatch,
    start: &str,
    clipboard: &str,
) -> Result<Vec<SaveReport>, FormError> {
    let steps = form.paste(start, clipboard)?;
    steps
        .into_iter()
        .map(|step| settle(form, dispatch, &step.etudid, step.outcome))
        .collect()
}

pub fn pick_history_and_save(
    form: &mut GradingForm,
    dispatch: &dyn Dispatch,
    etudid: &str,
    value: &str,
) -> Result<SaveReport, FormError> {
    let req = form.pick_history(etudid, value)?;
    hand_off(form, dispatch, req)
}
