use serde_json::json;

use crate::form::FormError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

/// Unsolicited line, not tied to any request id.
pub fn event(name: &str, form_id: &str, report: serde_json::Value) -> serde_json::Value {
    json!({
        "event": name,
        "formId": form_id,
        "report": report
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<FormError> for HandlerErr {
    fn from(e: FormError) -> Self {
        let (code, details) = match &e {
            FormError::UnknownStudent(etudid) => ("not_found", Some(json!({ "etudid": etudid }))),
            FormError::DuplicateStudent(etudid) => {
                ("bad_params", Some(json!({ "etudid": etudid })))
            }
            FormError::WrongEvaluation { expected, got } => (
                "bad_params",
                Some(json!({ "expected": expected, "got": got })),
            ),
        };
        Self {
            code,
            message: e.to_string(),
            details,
        }
    }
}
