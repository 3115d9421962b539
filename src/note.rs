use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Anything shaped like this is treated as a number, never as a status token.
static NUMERIC_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9.]*$").expect("numeric shape pattern"));

/// Special values accepted in place of a numeric note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusToken {
    /// Absent, counted as zero.
    Abs,
    /// Excused, neutralised in averages.
    Exc,
    /// Removes an existing note.
    Supr,
    /// Pending.
    Att,
    /// Student has resigned.
    Dem,
}

impl StatusToken {
    pub const ALL: [StatusToken; 5] = [
        StatusToken::Abs,
        StatusToken::Exc,
        StatusToken::Supr,
        StatusToken::Att,
        StatusToken::Dem,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatusToken::Abs => "ABS",
            StatusToken::Exc => "EXC",
            StatusToken::Supr => "SUPR",
            StatusToken::Att => "ATT",
            StatusToken::Dem => "DEM",
        }
    }

    pub fn parse(s: &str) -> Option<StatusToken> {
        StatusToken::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for StatusToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive bounds of an evaluation, as rendered on the grading page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteRange {
    pub min: f64,
    pub max: f64,
}

impl NoteRange {
    pub fn new(min: f64, max: f64) -> Result<Self, NoteError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(NoteError::BadRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteValue {
    /// No grade entered.
    Empty,
    Status(StatusToken),
    Numeric(f64),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NoteError {
    #[error("note {value} outside [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("malformed number: {0}")]
    Malformed(String),

    #[error("unknown status token: {0}")]
    UnknownToken(String),

    #[error("invalid note range [{min}, {max}]")]
    BadRange { min: f64, max: f64 },
}

/// Canonical form of a raw entry: trimmed, uppercased, first decimal comma
/// turned into a period.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase().replacen(',', ".", 1)
}

/// Classify an already normalized entry.
pub fn classify(normalized: &str, range: &NoteRange) -> Result<NoteValue, NoteError> {
    if normalized.is_empty() {
        return Ok(NoteValue::Empty);
    }

    if !NUMERIC_SHAPE.is_match(normalized) {
        return StatusToken::parse(normalized)
            .map(NoteValue::Status)
            .ok_or_else(|| NoteError::UnknownToken(normalized.to_string()));
    }

    let x: f64 = normalized
        .parse()
        .map_err(|_| NoteError::Malformed(normalized.to_string()))?;
    if !range.contains(x) {
        return Err(NoteError::OutOfRange {
            value: x,
            min: range.min,
            max: range.max,
        });
    }
    Ok(NoteValue::Numeric(x))
}
