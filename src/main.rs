mod backend;
mod cell;
mod config;
mod form;
mod ipc;
mod note;
mod pipeline;

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::backend::{HttpBackend, NoteBackend};
use crate::config::Config;
use crate::ipc::Inbound;

fn main() -> anyhow::Result<()> {
    // stdout carries the IPC stream; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(io::stderr)
        .init();

    let cfg = Config::from_env().context("reading configuration")?;
    let backend = HttpBackend::from_config(&cfg)
        .context("building ScoDoc client")?
        .map(|b| Arc::new(b) as Arc<dyn NoteBackend>);
    tracing::info!(
        "{} v{} starting, base url {:?}",
        config::APP_NAME,
        config::APP_VERSION,
        cfg.base_url
    );

    // Requests and save completions share one queue, so only this thread
    // ever touches the forms.
    let (tx, rx) = mpsc::channel();
    let mut state = ipc::AppState::new(cfg, backend, tx.clone());
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || read_stdin(tx))
        .context("starting stdin reader")?;

    let mut stdout = io::stdout();

    for inbound in rx {
        match inbound {
            Inbound::Line(line) => {
                let req: ipc::Request = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        // Can't reply without id.
                        let resp = serde_json::json!({
                            "ok": false,
                            "error": { "code": "bad_json", "message": e.to_string() }
                        });
                        emit(&mut stdout, &resp);
                        continue;
                    }
                };
                let resp = ipc::handle_request(&mut state, req);
                emit(&mut stdout, &resp);
            }
            Inbound::Saved(done) => {
                if let Some(ev) = ipc::handle_completion(&mut state, done) {
                    emit(&mut stdout, &ev);
                }
            }
            Inbound::Closed => break,
        }
    }

    tracing::info!(
        saves_in_flight = state.saves_in_flight(),
        "stdin closed, exiting"
    );
    Ok(())
}

fn read_stdin(tx: Sender<Inbound>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        if tx.send(Inbound::Line(line)).is_err() {
            return;
        }
    }
    let _ = tx.send(Inbound::Closed);
}

fn emit(stdout: &mut io::Stdout, value: &serde_json::Value) {
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
    let _ = stdout.flush();
}
