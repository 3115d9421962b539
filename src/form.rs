use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::backend::{SaveAck, SaveRequest};
use crate::cell::{BlurOutcome, Cell, SaveTarget};
use crate::note::NoteRange;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("no cell for student {0}")]
    UnknownStudent(String),

    #[error("student {0} appears twice in the form")]
    DuplicateStudent(String),

    #[error("acknowledgement for evaluation {got}, form is {expected}")]
    WrongEvaluation { expected: String, got: String },
}

/// Evaluation the form is grading.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    pub evaluation_id: String,
    pub formsemestre_id: String,
    pub range: NoteRange,
    /// Comment attached to every note saved from this form.
    pub comment: String,
}

/// One cell touched by a paste, in assignment order.
#[derive(Debug, Clone, PartialEq)]
pub struct PasteStep {
    pub etudid: String,
    pub token: String,
    pub outcome: BlurOutcome,
}

/// Split clipboard text the way spreadsheet copies arrive: one token per
/// line, tab or space. Empty tokens keep their slot so blank spreadsheet
/// cells stay aligned; only a single trailing line break is dropped.
pub fn split_clipboard(text: &str) -> Vec<&str> {
    let text = text
        .strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .or_else(|| text.strip_suffix('\r'))
        .unwrap_or(text);
    if text.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                out.push(&text[start..i]);
                i += 2;
                start = i;
            }
            b'\r' | b'\n' | b'\t' | b' ' => {
                out.push(&text[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    out.push(&text[start..]);
    out
}

/// Grading form for one evaluation: its cells in document order.
#[derive(Debug, Clone)]
pub struct GradingForm {
    pub context: EvaluationContext,
    cells: Vec<Cell>,
    index: HashMap<String, usize>,
    next_ticket: u64,
}

impl GradingForm {
    pub fn new(context: EvaluationContext, cells: Vec<Cell>) -> Result<Self, FormError> {
        let mut index = HashMap::with_capacity(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            if index.insert(cell.etudid.clone(), i).is_some() {
                return Err(FormError::DuplicateStudent(cell.etudid.clone()));
            }
        }
        Ok(Self {
            context,
            cells,
            index,
            next_ticket: 1,
        })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, etudid: &str) -> Result<&Cell, FormError> {
        self.position(etudid).map(|i| &self.cells[i])
    }

    fn position(&self, etudid: &str) -> Result<usize, FormError> {
        self.index
            .get(etudid)
            .copied()
            .ok_or_else(|| FormError::UnknownStudent(etudid.to_string()))
    }

    fn take_ticket(&mut self) -> u64 {
        let t = self.next_ticket;
        self.next_ticket += 1;
        t
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.context.comment = comment.to_string();
    }

    /// Show only rows belonging to one of `groups`; `None` shows every row.
    pub fn show_groups(&mut self, groups: Option<&[String]>) -> usize {
        for cell in &mut self.cells {
            cell.hidden = match groups {
                None => false,
                Some(wanted) => !cell.groups.iter().any(|g| wanted.contains(g)),
            };
        }
        self.cells.iter().filter(|c| !c.hidden).count()
    }

    pub fn input(&mut self, etudid: &str, text: &str) -> Result<&Cell, FormError> {
        let i = self.position(etudid)?;
        self.cells[i].input(text);
        Ok(&self.cells[i])
    }

    pub fn blur(&mut self, etudid: &str) -> Result<BlurOutcome, FormError> {
        let i = self.position(etudid)?;
        Ok(self.blur_at(i))
    }

    fn blur_at(&mut self, i: usize) -> BlurOutcome {
        let ticket = self.take_ticket();
        let target = SaveTarget {
            evaluation_id: &self.context.evaluation_id,
            comment: &self.context.comment,
            range: &self.context.range,
        };
        self.cells[i].blur(target, ticket)
    }

    /// Re-send a value picked from the note's history menu.
    pub fn pick_history(&mut self, etudid: &str, value: &str) -> Result<SaveRequest, FormError> {
        let i = self.position(etudid)?;
        let ticket = self.take_ticket();
        let target = SaveTarget {
            evaluation_id: &self.context.evaluation_id,
            comment: &self.context.comment,
            range: &self.context.range,
        };
        Ok(self.cells[i].force(value, target, ticket))
    }

    /// Distribute clipboard tokens over `start` and the visible cells after it.
    pub fn paste(&mut self, start: &str, clipboard: &str) -> Result<Vec<PasteStep>, FormError> {
        let mut i = self.position(start)?;
        let tokens = split_clipboard(clipboard);
        let mut steps = Vec::with_capacity(tokens.len());

        for (n, token) in tokens.iter().enumerate() {
            self.cells[i].input(token);
            let outcome = self.blur_at(i);
            steps.push(PasteStep {
                etudid: self.cells[i].etudid.clone(),
                token: token.to_string(),
                outcome,
            });
            if n + 1 == tokens.len() {
                break;
            }
            match self.next_visible(i) {
                Some(next) => i = next,
                None => break,
            }
        }
        Ok(steps)
    }

    fn next_visible(&self, i: usize) -> Option<usize> {
        (i + 1..self.cells.len()).find(|&j| !self.cells[j].hidden)
    }

    /// Apply a save acknowledgement; `Ok(false)` when a newer one was
    /// already applied to that cell.
    pub fn acknowledge(&mut self, req: &SaveRequest, ack: &SaveAck) -> Result<bool, FormError> {
        if req.evaluation_id != self.context.evaluation_id {
            return Err(FormError::WrongEvaluation {
                expected: self.context.evaluation_id.clone(),
                got: req.evaluation_id.clone(),
            });
        }
        let i = self.position(&req.etudid)?;
        Ok(self.cells[i].acknowledge(req, ack, &self.context.formsemestre_id))
    }
}
