use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use super::types::Inbound;
use crate::backend::{NoteBackend, SaveRequest};
use crate::pipeline::{self, Dispatch};

/// Runs each save of one form on its own thread and posts the completion
/// back to the main loop. Saves are independent of each other.
pub struct SaveWorkers {
    pub backend: Arc<dyn NoteBackend>,
    pub form_id: String,
    pub events: Sender<Inbound>,
    pub in_flight: Arc<AtomicUsize>,
}

impl Dispatch for SaveWorkers {
    fn send(&self, req: SaveRequest) {
        let backend = Arc::clone(&self.backend);
        let form_id = self.form_id.clone();
        let events = self.events.clone();
        let etudid = req.etudid.clone();

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name(format!("save-{etudid}"))
            .spawn(move || {
                let done = pipeline::run_save(backend.as_ref(), form_id, req);
                // Receiver is gone only when the process is exiting.
                let _ = events.send(Inbound::Saved(done));
            });
        if let Err(e) = spawned {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            tracing::error!(
                etudid = %etudid,
                error = %e,
                "could not start save worker, cell left pending"
            );
        }
    }
}
