use crate::cell::Cell;
use crate::form::{EvaluationContext, GradingForm};
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{form_mut, opt_str, req_f64, req_str, value_as_id};
use crate::ipc::types::{AppState, Request};
use crate::note::NoteRange;
use serde_json::json;
use uuid::Uuid;

const FORM_MAX_CELLS: usize = 5000;

fn parse_cells(req: &Request) -> Result<Vec<Cell>, HandlerErr> {
    let Some(arr) = req.params.get("cells").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing cells[]"));
    };
    if arr.len() > FORM_MAX_CELLS {
        return Err(HandlerErr {
            code: "bad_params",
            message: "too many cells".to_string(),
            details: Some(json!({ "count": arr.len(), "max": FORM_MAX_CELLS })),
        });
    }

    let mut cells = Vec::with_capacity(arr.len());
    for (i, item) in arr.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            return Err(HandlerErr::bad_params(format!(
                "cell at index {} must be an object",
                i
            )));
        };
        let Some(etudid) = obj.get("etudid").and_then(value_as_id) else {
            return Err(HandlerErr::bad_params(format!(
                "cell at index {} missing etudid",
                i
            )));
        };
        let value = obj
            .get("value")
            .and_then(value_as_id)
            .unwrap_or_default();
        let groups = obj
            .get("groups")
            .and_then(|v| v.as_array())
            .map(|gs| gs.iter().filter_map(value_as_id).collect())
            .unwrap_or_default();
        cells.push(Cell::new(etudid, value, groups));
    }
    Ok(cells)
}

fn open_form(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let evaluation_id = req_str(req, "evaluationId")?;
    let formsemestre_id = req_str(req, "formsemestreId")?;
    let min = req_f64(req, "noteMin")?;
    let max = req_f64(req, "noteMax")?;
    let range = NoteRange::new(min, max).map_err(|e| HandlerErr {
        code: "bad_params",
        message: e.to_string(),
        details: Some(json!({ "noteMin": min, "noteMax": max })),
    })?;
    let comment = opt_str(req, "comment").unwrap_or_default();
    let cells = parse_cells(req)?;

    let form = GradingForm::new(
        EvaluationContext {
            evaluation_id,
            formsemestre_id,
            range,
            comment,
        },
        cells,
    )?;

    let form_id = Uuid::new_v4().to_string();
    tracing::info!(
        form_id = %form_id,
        evaluation_id = %form.context.evaluation_id,
        cells = form.cells().len(),
        "form opened"
    );
    let result = json!({
        "formId": form_id,
        "context": form.context,
        "cells": form.cells(),
    });
    state.forms.insert(form_id, form);
    Ok(result)
}

fn handle_form_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    match open_form(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_form_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let form_id = match req_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match form_mut(state, &form_id) {
        Ok(form) => ok(
            &req.id,
            json!({
                "formId": form_id,
                "context": form.context,
                "cells": form.cells(),
            }),
        ),
        Err(e) => e.response(&req.id),
    }
}

fn handle_form_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let form_id = match req_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match state.forms.remove(&form_id) {
        Some(_) => {
            tracing::info!(form_id = %form_id, "form closed");
            ok(&req.id, json!({ "ok": true }))
        }
        None => err(
            &req.id,
            "not_found",
            "form not found",
            Some(json!({ "formId": form_id })),
        ),
    }
}

fn handle_form_set_comment(state: &mut AppState, req: &Request) -> serde_json::Value {
    let form_id = match req_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let comment = opt_str(req, "comment").unwrap_or_default();
    match form_mut(state, &form_id) {
        Ok(form) => {
            form.set_comment(&comment);
            ok(&req.id, json!({ "comment": form.context.comment }))
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_form_show_groups(state: &mut AppState, req: &Request) -> serde_json::Value {
    let form_id = match req_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let groups: Option<Vec<String>> = match req.params.get("groupIds") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Array(arr)) => Some(arr.iter().filter_map(value_as_id).collect()),
        Some(_) => return err(&req.id, "bad_params", "groupIds must be an array or null", None),
    };
    match form_mut(state, &form_id) {
        Ok(form) => {
            let visible = form.show_groups(groups.as_deref());
            ok(
                &req.id,
                json!({ "visible": visible, "cells": form.cells() }),
            )
        }
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "form.open" => Some(handle_form_open(state, req)),
        "form.get" => Some(handle_form_get(state, req)),
        "form.close" => Some(handle_form_close(state, req)),
        "form.setComment" => Some(handle_form_set_comment(state, req)),
        "form.showGroups" => Some(handle_form_show_groups(state, req)),
        _ => None,
    }
}
