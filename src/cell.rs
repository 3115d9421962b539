use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::{SaveAck, SaveRequest};
use crate::note::{self, NoteError, NoteRange, NoteValue};

pub const JURY_LINK_LABEL: &str = "mettre à jour décision de jury";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Unvalidated,
    Invalid,
    Pending,
    Saved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JuryLink {
    pub href: String,
    pub label: String,
}

impl JuryLink {
    pub fn for_student(formsemestre_id: &str, etudid: &str) -> Self {
        Self {
            href: format!(
                "formsemestre_validation_etud_form?formsemestre_id={formsemestre_id}&etudid={etudid}"
            ),
            label: JURY_LINK_LABEL.to_string(),
        }
    }
}

/// Result of leaving a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum BlurOutcome {
    Invalid(NoteError),
    /// Valid, but nothing to send.
    Unchanged,
    Dispatch(SaveRequest),
}

/// Evaluation-wide values a cell needs to build a save request.
#[derive(Debug, Clone, Copy)]
pub struct SaveTarget<'a> {
    pub evaluation_id: &'a str,
    pub comment: &'a str,
    pub range: &'a NoteRange,
}

/// One editable note field for a student in the open evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub etudid: String,
    /// Text currently displayed in the field, as typed.
    pub text: String,
    /// Last value the server acknowledged (or the page rendered).
    pub baseline: String,
    /// Value rendered with the page, used for jury-link decisions.
    pub original: String,
    pub status: CellStatus,
    pub jury_link: Option<JuryLink>,
    pub history_html: Option<String>,
    pub saved_at: Option<DateTime<Utc>>,
    pub hidden: bool,
    pub groups: Vec<String>,
    /// Ticket of the most recent request sent for this cell.
    #[serde(skip)]
    last_dispatched: u64,
    /// Highest ticket whose acknowledgement has been applied.
    #[serde(skip)]
    last_acked: u64,
}

impl Cell {
    pub fn new(etudid: impl Into<String>, value: impl Into<String>, groups: Vec<String>) -> Self {
        let value = value.into();
        Self {
            etudid: etudid.into(),
            text: value.clone(),
            baseline: value.clone(),
            original: value,
            status: CellStatus::Unvalidated,
            jury_link: None,
            history_html: None,
            saved_at: None,
            hidden: false,
            groups,
            last_dispatched: 0,
            last_acked: 0,
        }
    }

    /// Local keystroke-level edit. Drops any saved guarantee; requests
    /// already on the wire stay tracked.
    pub fn input(&mut self, text: &str) {
        self.text = text.to_string();
        if self.status != CellStatus::Invalid {
            self.status = CellStatus::Unvalidated;
        }
    }

    /// Validate the displayed text and decide whether it must be saved.
    pub fn blur(&mut self, target: SaveTarget<'_>, ticket: u64) -> BlurOutcome {
        let v = note::normalize(&self.text);
        let value = match note::classify(&v, target.range) {
            Ok(value) => value,
            Err(e) => {
                self.status = CellStatus::Invalid;
                return BlurOutcome::Invalid(e);
            }
        };

        if value == NoteValue::Empty || v == self.baseline {
            if self.status == CellStatus::Invalid {
                self.status = CellStatus::Unvalidated;
            }
            return BlurOutcome::Unchanged;
        }

        BlurOutcome::Dispatch(self.dispatch(v, target, ticket))
    }

    /// Send `value` as-is, skipping range validation. Used when the value
    /// comes from the server's own history of this note.
    pub fn force(&mut self, value: &str, target: SaveTarget<'_>, ticket: u64) -> SaveRequest {
        self.text = value.to_string();
        self.dispatch(value.to_string(), target, ticket)
    }

    fn dispatch(&mut self, value: String, target: SaveTarget<'_>, ticket: u64) -> SaveRequest {
        self.status = CellStatus::Pending;
        self.last_dispatched = self.last_dispatched.max(ticket);
        SaveRequest {
            etudid: self.etudid.clone(),
            evaluation_id: target.evaluation_id.to_string(),
            value,
            comment: target.comment.to_string(),
            ticket,
        }
    }

    /// Reconcile the cell with the server's answer to `req`.
    ///
    /// Acknowledgements can arrive in any order. One older than an ack
    /// already applied is ignored and `false` is returned.
    pub fn acknowledge(
        &mut self,
        req: &SaveRequest,
        ack: &SaveAck,
        formsemestre_id: &str,
    ) -> bool {
        if req.ticket < self.last_acked {
            return false;
        }
        self.last_acked = req.ticket;
        self.baseline = req.value.clone();

        if ack.nbchanged > 0 {
            self.jury_link = if ack.has_decision_for(&self.etudid) && req.value != self.original {
                Some(JuryLink::for_student(formsemestre_id, &self.etudid))
            } else {
                None
            };
            if let Some(html) = ack.history_menu.as_deref().filter(|h| !h.is_empty()) {
                self.history_html = Some(html.to_string());
            }
        }

        if req.ticket == self.last_dispatched && note::normalize(&self.text) == req.value {
            self.status = CellStatus::Saved;
            self.saved_at = Some(Utc::now());
        }
        true
    }
}
