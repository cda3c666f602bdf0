// Scripted in-memory panel for coordinator and dispatcher tests.

#![allow(clippy::unwrap_used, dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use vesta_api::endpoints::{DEVICE_LIST, EVENT_LOG, PANEL_SET, PANEL_STATUS};
use vesta_api::{Error, Form, Method, PanelTransport};
use vesta_core::{Coordinator, FixedClock, PollSettings, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Status,
    Devices,
    Events,
    Command,
}

impl Endpoint {
    fn from_path(path: &str) -> Self {
        match path {
            PANEL_STATUS => Self::Status,
            DEVICE_LIST => Self::Devices,
            EVENT_LOG => Self::Events,
            PANEL_SET => Self::Command,
            other => panic!("unexpected path {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Fail(Error),
    /// Never answers.
    Hang,
    /// Fails with a transport timeout once the request timeout elapses.
    TimesOut(Duration),
}

#[derive(Debug)]
struct Script {
    default: Reply,
    queue: VecDeque<Reply>,
}

impl Script {
    fn new(default: Reply) -> Self {
        Self {
            default,
            queue: VecDeque::new(),
        }
    }

    fn next(&mut self) -> Reply {
        self.queue.pop_front().unwrap_or_else(|| self.default.clone())
    }
}

#[derive(Debug)]
struct State {
    mode: String,
    /// Mode the panel adopts after this many further status fetches.
    adopt: Option<(String, u32)>,
    adopt_after: Option<u32>,
    status_extra: Value,
    devices: Script,
    events: Script,
    status_queue: VecDeque<Reply>,
    /// Replaces generated status while set.
    status_default: Option<Reply>,
    command: Script,
    calls: Vec<(Endpoint, Method, Option<Form>)>,
}

/// Fake panel. Status is generated from `mode` unless overridden.
#[derive(Debug)]
pub struct FakePanel {
    state: Mutex<State>,
}

pub fn mode_name(code: &str) -> &'static str {
    match code {
        "0" => "Disarm",
        "1" => "Arm",
        "2" => "Home",
        "3" => "Night",
        other => panic!("unexpected mode code {other}"),
    }
}

impl FakePanel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                mode: "Disarm".into(),
                adopt: None,
                adopt_after: Some(1),
                status_extra: json!({ "battery": "Normal", "ac_fail": "0", "sig_gsm": "80" }),
                devices: Script::new(Reply::Json(devices(&[("dev-1", 1, "Door Close")]))),
                events: Script::new(Reply::Json(json!({ "logrows": [] }))),
                status_queue: VecDeque::new(),
                status_default: None,
                command: Script::new(Reply::Json(json!({ "result": 1 }))),
                calls: Vec::new(),
            }),
        })
    }

    pub fn set_mode(&self, mode: &str) {
        self.state.lock().unwrap().mode = mode.into();
    }

    /// After an accepted command the panel reports the new mode on the
    /// `n`th status fetch. `None` means it never does.
    pub fn adopt_after(&self, n: Option<u32>) {
        self.state.lock().unwrap().adopt_after = n;
    }

    pub fn set_default(&self, endpoint: Endpoint, reply: Reply) {
        let mut state = self.state.lock().unwrap();
        match endpoint {
            Endpoint::Status => state.status_default = Some(reply),
            Endpoint::Devices => state.devices = Script::new(reply),
            Endpoint::Events => state.events = Script::new(reply),
            Endpoint::Command => state.command = Script::new(reply),
        }
    }

    /// Go back to generating status from the mode.
    pub fn reset_status(&self) {
        self.state.lock().unwrap().status_default = None;
    }

    pub fn push(&self, endpoint: Endpoint, reply: Reply) {
        let mut state = self.state.lock().unwrap();
        match endpoint {
            Endpoint::Status => state.status_queue.push_back(reply),
            Endpoint::Devices => state.devices.queue.push_back(reply),
            Endpoint::Events => state.events.queue.push_back(reply),
            Endpoint::Command => state.command.queue.push_back(reply),
        }
    }

    pub fn fail_all(&self, error: &Error) {
        for endpoint in [Endpoint::Status, Endpoint::Devices, Endpoint::Events] {
            self.set_default(endpoint, Reply::Fail(error.clone()));
        }
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.iter().filter(|(e, _, _)| *e == endpoint).count()
    }

    pub fn last_form(&self, endpoint: Endpoint) -> Option<Form> {
        let state = self.state.lock().unwrap();
        state
            .calls
            .iter()
            .rev()
            .find(|(e, _, _)| *e == endpoint)
            .and_then(|(_, _, form)| form.clone())
    }

    fn respond(&self, method: Method, path: &str, form: Option<Form>) -> Reply {
        let endpoint = Endpoint::from_path(path);
        let mut state = self.state.lock().unwrap();
        state.calls.push((endpoint, method, form.clone()));

        match endpoint {
            Endpoint::Status => {
                if let Some(reply) = state.status_queue.pop_front() {
                    return reply;
                }
                if let Some(reply) = &state.status_default {
                    return reply.clone();
                }
                if let Some((mode, remaining)) = state.adopt.take() {
                    if remaining <= 1 {
                        state.mode = mode;
                    } else {
                        state.adopt = Some((mode, remaining - 1));
                    }
                }
                let mut body = state.status_extra.clone();
                body["mode_a1"] = Value::String(state.mode.clone());
                Reply::Json(json!({ "updates": body }))
            }
            Endpoint::Devices => state.devices.next(),
            Endpoint::Events => state.events.next(),
            Endpoint::Command => {
                let reply = state.command.next();
                let accepted = matches!(&reply, Reply::Json(v) if v["result"] == json!(1));
                if accepted {
                    let code = form
                        .as_ref()
                        .and_then(|f| f.iter().find(|(k, _)| *k == "mode"))
                        .map(|(_, v)| v.clone())
                        .unwrap();
                    if let Some(n) = state.adopt_after {
                        state.adopt = Some((mode_name(&code).to_owned(), n));
                    }
                }
                reply
            }
        }
    }
}

impl PanelTransport for FakePanel {
    fn request(
        &self,
        method: Method,
        path: &str,
        form: Option<Form>,
    ) -> impl Future<Output = Result<Bytes, Error>> + Send {
        let reply = self.respond(method, path, form);
        async move {
            match reply {
                Reply::Json(value) => Ok(Bytes::from(value.to_string())),
                Reply::Fail(error) => Err(error),
                Reply::Hang => std::future::pending().await,
                Reply::TimesOut(after) => {
                    tokio::time::sleep(after).await;
                    Err(Error::Timeout {
                        timeout_ms: u64::try_from(after.as_millis()).unwrap(),
                    })
                }
            }
        }
    }
}

// ── Payload builders ──

pub fn devices(rows: &[(&str, u32, &str)]) -> Value {
    let rows: Vec<Value> = rows
        .iter()
        .map(|(id, zone, status)| {
            json!({
                "id": id,
                "zone": zone.to_string(),
                "area": "1",
                "name": format!("Sensor {id}"),
                "type_f": "Door Contact",
                "status": status,
                "battery_ok": "1",
                "tamper_ok": "1",
            })
        })
        .collect();
    json!({ "senrows": rows })
}

/// Rows as `(uid, event, zone)`, newest first.
pub fn events(rows: &[(u64, &str, &str)]) -> Value {
    let rows: Vec<Value> = rows
        .iter()
        .map(|(uid, event, zone)| {
            json!({
                "uid": uid.to_string(),
                "time": "2024/05/01 10:00:00",
                "event": event,
                "zone": zone,
                "area": "1",
            })
        })
        .collect();
    json!({ "logrows": rows })
}

pub fn connection_error() -> Error {
    Error::Connection {
        url: "http://panel.test/".into(),
        message: "connection refused".into(),
    }
}

pub fn settings() -> PollSettings {
    PollSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        },
        ..PollSettings::default()
    }
}

pub fn coordinator(panel: &Arc<FakePanel>) -> Coordinator<Arc<FakePanel>> {
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    Coordinator::with_clock(Arc::clone(panel), settings(), Arc::new(clock))
}
