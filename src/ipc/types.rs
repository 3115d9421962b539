use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use serde::Deserialize;

use crate::backend::NoteBackend;
use crate::config::Config;
use crate::form::GradingForm;
use crate::pipeline::SaveCompletion;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything the main loop waits on.
#[derive(Debug)]
pub enum Inbound {
    /// One raw line from stdin.
    Line(String),
    /// A save worker finished.
    Saved(SaveCompletion),
    /// stdin reached EOF or failed.
    Closed,
}

pub struct AppState {
    pub config: Config,
    pub backend: Option<Arc<dyn NoteBackend>>,
    /// Open grading forms by form id.
    pub forms: HashMap<String, GradingForm>,
    /// Save workers report back through this channel.
    pub events: Sender<Inbound>,
    /// Saves handed to a worker and not yet applied.
    pub saves_in_flight: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(
        config: Config,
        backend: Option<Arc<dyn NoteBackend>>,
        events: Sender<Inbound>,
    ) -> Self {
        Self {
            config,
            backend,
            forms: HashMap::new(),
            events,
            saves_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn saves_in_flight(&self) -> usize {
        self.saves_in_flight.load(Ordering::SeqCst)
    }
}
