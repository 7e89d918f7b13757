// narrator.rs — the snarky commentary box. Requests go out on a worker
// thread (one per request, they are rare) and come back through an mpsc
// mailbox the UI drains each frame; the simulation never waits on HTTP.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::json;

const MODEL: &str = "gemini-3-flash-preview";
const API_KEY_VAR: &str = "GEMINI_API_KEY";
const REQUEST_WINDOW: Duration = Duration::from_millis(6000);

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Snarky,
    Impressed,
    Concerned,
    Evil,
}

impl Mood {
    pub fn color(self) -> egui::Color32 {
        match self {
            Mood::Snarky    => egui::Color32::from_rgb(251, 191, 36),
            Mood::Impressed => egui::Color32::from_rgb(74, 222, 128),
            Mood::Concerned => egui::Color32::from_rgb(96, 165, 250),
            Mood::Evil      => egui::Color32::from_rgb(239, 68, 68),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NarratorComment {
    pub text: String,
    pub mood: Mood,
}

impl Default for NarratorComment {
    fn default() -> Self {
        Self {
            text: "Calibration complete. Let the kinetic experiments begin.".into(),
            mood: Mood::Snarky,
        }
    }
}

fn fallback() -> NarratorComment {
    NarratorComment { text: "Physics is hard, isn't it?".into(), mood: Mood::Snarky }
}

/// Drops requests that arrive within `window` of the last accepted one.
struct RateGate {
    window: Duration,
    last: Option<Instant>,
}

impl RateGate {
    fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    fn try_pass(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

pub struct Narrator {
    tx: Sender<NarratorComment>,
    rx: Receiver<NarratorComment>,
    gate: RateGate,
    in_flight: bool,
}

impl Narrator {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx, gate: RateGate::new(REQUEST_WINDOW), in_flight: false }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Fire a commentary request. Silently dropped inside the rate window;
    /// any failure downstream resolves to the canned fallback line.
    pub fn request(&mut self, action: &str, setup: &str) {
        if !self.gate.try_pass(Instant::now()) {
            return;
        }
        self.in_flight = true;
        let tx = self.tx.clone();
        let action = action.to_owned();
        let setup = setup.to_owned();
        thread::spawn(move || {
            let comment = match fetch_comment(&action, &setup) {
                Ok(comment) => comment,
                Err(err) => {
                    log::warn!("narrator request failed: {err:#}");
                    fallback()
                }
            };
            // The app may have shut down; nobody left to tell is fine.
            let _ = tx.send(comment);
        });
    }

    /// Drain the mailbox. Call once per frame.
    pub fn poll(&mut self) -> Option<NarratorComment> {
        match self.rx.try_recv() {
            Ok(comment) => {
                self.in_flight = false;
                Some(comment)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

fn fetch_comment(action: &str, setup: &str) -> Result<NarratorComment> {
    let key = std::env::var(API_KEY_VAR)
        .with_context(|| format!("{API_KEY_VAR} is not set"))?;
    let prompt = format!(
        "The player just did this: \"{action}\" in the environment: \"{setup}\". \
         Give a short, witty, one-sentence commentary as a sadistic AI physics scientist."
    );
    let body = json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "text": { "type": "STRING" },
                    "mood": {
                        "type": "STRING",
                        "enum": ["snarky", "impressed", "concerned", "evil"]
                    }
                },
                "required": ["text", "mood"]
            }
        }
    });
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{MODEL}:generateContent"
    );
    let response: serde_json::Value = ureq::post(&url)
        .query("key", &key)
        .send_json(body)
        .context("generateContent call failed")?
        .into_json()
        .context("response body is not JSON")?;
    parse_response(&response)
}

/// The model's reply is a JSON document nested inside the API envelope as a
/// string; unwrap both layers.
fn parse_response(response: &serde_json::Value) -> Result<NarratorComment> {
    let text = response["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .ok_or_else(|| anyhow!("no text part in response"))?;
    serde_json::from_str(text).context("comment payload is malformed")
}
