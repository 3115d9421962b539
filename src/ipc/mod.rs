mod error;
mod handlers;
mod helpers;
mod router;
mod types;
mod workers;

pub use router::{handle_completion, handle_request};
pub use types::{AppState, Inbound, Request};
