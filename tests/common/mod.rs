#![allow(dead_code)]

use axum::extract::{Form, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Upper bound for any single line from the sidecar.
pub const READ_TIMEOUT: Duration = Duration::from_secs(20);

/// One form-encoded POST received by the mock save endpoint.
#[derive(Debug, Clone)]
pub struct SavedNote {
    pub etudid: String,
    pub evaluation_id: String,
    pub value: String,
    pub comment: String,
}

#[derive(Clone, Default)]
pub struct MockScodoc {
    pub received: Arc<Mutex<Vec<SavedNote>>>,
    stored: Arc<Mutex<HashMap<String, String>>>,
    decisions: Arc<Mutex<HashSet<String>>>,
    /// Students whose saves never get an answer in test time.
    stalled: Arc<Mutex<HashSet<String>>>,
}

impl MockScodoc {
    pub fn with_decisions(ids: &[&str]) -> Self {
        let mock = Self::default();
        mock.decisions
            .lock()
            .expect("decisions lock")
            .extend(ids.iter().map(|s| s.to_string()));
        mock
    }

    pub fn stalling(ids: &[&str]) -> Self {
        let mock = Self::default();
        mock.stalled
            .lock()
            .expect("stalled lock")
            .extend(ids.iter().map(|s| s.to_string()));
        mock
    }

    pub fn received(&self) -> Vec<SavedNote> {
        self.received.lock().expect("received lock").clone()
    }
}

async fn save_note(
    State(mock): State<MockScodoc>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let note = SavedNote {
        etudid: form.get("etudid").cloned().unwrap_or_default(),
        evaluation_id: form.get("evaluation_id").cloned().unwrap_or_default(),
        value: form.get("value").cloned().unwrap_or_default(),
        comment: form.get("comment").cloned().unwrap_or_default(),
    };
    mock.received.lock().expect("received lock").push(note.clone());

    let stalled = mock.stalled.lock().expect("stalled lock").contains(&note.etudid);
    if stalled {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }

    let prev = mock
        .stored
        .lock()
        .expect("stored lock")
        .insert(note.etudid.clone(), note.value.clone());
    if prev.as_deref() == Some(note.value.as_str()) {
        return Json(json!({
            "nbchanged": 0,
            "existing_decisions": [],
            "history_menu": "",
            "status": "ok"
        }));
    }

    let has_decision = mock
        .decisions
        .lock()
        .expect("decisions lock")
        .contains(&note.etudid);
    // ScoDoc sends integer student ids.
    let decisions: Vec<serde_json::Value> = if has_decision {
        vec![note
            .etudid
            .parse::<i64>()
            .map(serde_json::Value::from)
            .unwrap_or_else(|_| json!(note.etudid))]
    } else {
        vec![]
    };
    Json(json!({
        "nbchanged": 1,
        "existing_decisions": decisions,
        "history_menu": format!(
            "<span class=\"history\"><span data-note=\"{}\">le 15/10/2026 à 10:00 (test)</span></span>",
            note.value
        ),
        "status": "ok"
    }))
}

/// Serve the mock on an ephemeral port; returns the department base URL.
pub fn spawn_mock_scodoc(mock: MockScodoc) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind mock scodoc");
    listener.set_nonblocking(true).expect("nonblocking listener");
    let addr = listener.local_addr().expect("mock addr");
    let app = Router::new()
        .route("/ScoDoc/RT/Scolarite/Notes/save_note", post(save_note))
        .with_state(mock);

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("mock runtime");
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
            axum::serve(listener, app).await.expect("serve mock scodoc");
        });
    });

    format!("http://{}/ScoDoc/RT/Scolarite", addr)
}

/// Sidecar stdout, read on its own thread. Replies are matched by id;
/// unsolicited event lines are kept until a test asks for them.
pub struct SidecarOut {
    lines: Receiver<serde_json::Value>,
    events: VecDeque<serde_json::Value>,
}

impl SidecarOut {
    fn new(stdout: ChildStdout) -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                let value: serde_json::Value =
                    serde_json::from_str(line.trim()).expect("parse sidecar json");
                if tx.send(value).is_err() {
                    break;
                }
            }
        });
        Self {
            lines: rx,
            events: VecDeque::new(),
        }
    }

    /// Next line that is not an event, if one arrives within `timeout`.
    pub fn reply_within(&mut self, timeout: Duration) -> Option<serde_json::Value> {
        loop {
            let value = self.lines.recv_timeout(timeout).ok()?;
            if value.get("event").is_some() {
                self.events.push_back(value);
            } else {
                return Some(value);
            }
        }
    }

    pub fn reply(&mut self) -> serde_json::Value {
        self.reply_within(READ_TIMEOUT).expect("no reply from sidecar")
    }

    /// Wait for the `name` event about `etudid` and return its report.
    pub fn event(&mut self, name: &str, etudid: &str) -> serde_json::Value {
        let matches = |v: &serde_json::Value| {
            v.get("event").and_then(|e| e.as_str()) == Some(name)
                && v.get("report")
                    .and_then(|r| r.get("etudid"))
                    .and_then(|e| e.as_str())
                    == Some(etudid)
        };
        if let Some(pos) = self.events.iter().position(matches) {
            let found = self.events.remove(pos).expect("buffered event");
            return found["report"].clone();
        }
        loop {
            let value = self
                .lines
                .recv_timeout(READ_TIMEOUT)
                .unwrap_or_else(|_| panic!("no {name} event for {etudid}"));
            if matches(&value) {
                return value["report"].clone();
            }
            assert!(value.get("event").is_some(), "unexpected reply {value}");
            self.events.push_back(value);
        }
    }
}

pub fn spawn_sidecar(base_url: Option<&str>) -> (Child, ChildStdin, SidecarOut) {
    let exe = env!("CARGO_BIN_EXE_saisied");
    let mut cmd = Command::new(exe);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env_remove("SAISIED_BASE_URL")
        .env_remove("SAISIED_TIMEOUT_SECS")
        .env("NO_PROXY", "127.0.0.1,localhost")
        .env("no_proxy", "127.0.0.1,localhost");
    if let Some(url) = base_url {
        cmd.env("SAISIED_BASE_URL", url);
    }
    let mut child = cmd.spawn().expect("spawn saisied");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, SidecarOut::new(stdout))
}

pub fn send(stdin: &mut ChildStdin, id: &str, method: &str, params: serde_json::Value) {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut SidecarOut,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    send(stdin, id, method, params);
    let value = reader.reply();
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut SidecarOut,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

/// Open a 0..20 evaluation with the given (etudid, value, group) rows.
pub fn open_form(
    stdin: &mut ChildStdin,
    reader: &mut SidecarOut,
    rows: &[(&str, &str, &str)],
) -> String {
    let cells: Vec<serde_json::Value> = rows
        .iter()
        .map(|(etudid, value, group)| {
            json!({ "etudid": etudid, "value": value, "groups": [group] })
        })
        .collect();
    let result = request_ok(
        stdin,
        reader,
        "open",
        "form.open",
        json!({
            "evaluationId": 501,
            "formsemestreId": 77,
            "noteMin": 0.0,
            "noteMax": 20.0,
            "cells": cells,
        }),
    );
    result
        .get("formId")
        .and_then(|v| v.as_str())
        .expect("formId")
        .to_string()
}

pub fn cell_status<'a>(cell: &'a serde_json::Value) -> Option<&'a str> {
    cell.get("status").and_then(|v| v.as_str())
}

pub fn cell_text<'a>(cell: &'a serde_json::Value) -> Option<&'a str> {
    cell.get("text").and_then(|v| v.as_str())
}

pub fn cell_baseline<'a>(cell: &'a serde_json::Value) -> Option<&'a str> {
    cell.get("baseline").and_then(|v| v.as_str())
}
