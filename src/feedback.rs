// Feedback sinks
// Alert tones, console status line, and JSON event log driven by the tracking state machine

use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::constants::{FAILURE_TONE, SUCCESS_TONE, TONE_QUEUE_DEPTH};
use crate::eligibility::CandidateCounts;
use crate::position::ObjectId;

// ANSI color codes
const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[91m";
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const BLUE: &str = "\x1b[94m";
const MAGENTA: &str = "\x1b[95m";
const CYAN: &str = "\x1b[96m";
const CLEAR_EOL: &str = "\x1b[K";

/// How a new target was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffKind {
    /// Cold start: cluster center of the eligible pool
    Acquired,
    /// Cluster center picked again after holding a reference point
    Resumed,
    /// Current target set; nearest untracked neighbor took over
    Handoff,
    /// Operator asked for a switch; nearest untracked neighbor took over
    Switch,
}

/// A new target was selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandoffEvent {
    pub kind: HandoffKind,
    pub at: DateTime<Utc>,
    pub from: Option<ObjectId>,
    pub to: ObjectId,
    pub altitude: f64,
    pub azimuth: f64,
    /// Offset from the previous target; None for cluster-center picks
    pub delta_altitude: Option<f64>,
    pub delta_azimuth: Option<f64>,
    /// None when no set-time was found within the search horizon
    pub set_time: Option<DateTime<Utc>>,
}

impl HandoffEvent {
    /// Seconds until set at `now`, clamped at zero.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<f64> {
        self.set_time.map(|t| remaining_secs(t, now))
    }
}

/// Current situation, reported once per cycle while tracking and once when holding starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Status {
    Tracking {
        id: ObjectId,
        altitude: f64,
        azimuth: f64,
        elapsed_secs: f64,
        remaining_secs: Option<f64>,
        counts: CandidateCounts,
    },
    Holding {
        id: ObjectId,
        altitude: f64,
        azimuth: f64,
        at: DateTime<Utc>,
    },
}

/// Receiver of the state machine's side effects. Calls must return promptly.
pub trait FeedbackSink: Send {
    fn on_handoff_success(&mut self, event: &HandoffEvent);

    /// A requested switch found no candidate; `current` stays tracked.
    fn on_handoff_failure(&mut self, current: &ObjectId, at: DateTime<Utc>);

    fn on_status(&mut self, status: &Status);
}

/// Seconds from `now` until `until`, never negative.
pub fn remaining_secs(until: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let ms = (until - now).num_milliseconds();
    (ms as f64 / 1000.0).max(0.0)
}

/// An alert chime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub frequency_hz: u32,
    pub duration: Duration,
}

impl Tone {
    pub const fn new((frequency_hz, duration_ms): (u32, u64)) -> Self {
        Tone { frequency_hz, duration: Duration::from_millis(duration_ms) }
    }

    pub const fn success() -> Self {
        Tone::new(SUCCESS_TONE)
    }

    pub const fn failure() -> Self {
        Tone::new(FAILURE_TONE)
    }
}

/// Fire-and-forget tone player.
///
/// Tones queue on a bounded channel and are dropped when the queue is full;
/// playback order across overlapping alerts is not significant.
#[derive(Clone)]
pub struct TonePlayer {
    tx: mpsc::Sender<Tone>,
}

impl TonePlayer {
    /// Spawn the playback task. Must be called from inside a tokio runtime.
    pub fn spawn() -> Self {
        let (player, mut rx) = Self::queue(TONE_QUEUE_DEPTH);
        tokio::spawn(async move {
            while let Some(tone) = rx.recv().await {
                // A terminal can only ring its bell; pitch is advisory
                let mut err = std::io::stderr();
                let _ = err.write_all(b"\x07");
                let _ = err.flush();
                tokio::time::sleep(tone.duration).await;
            }
        });
        player
    }

    /// A player feeding a queue of `depth` tones, with the receiving end left to the caller.
    pub fn queue(depth: usize) -> (Self, mpsc::Receiver<Tone>) {
        let (tx, rx) = mpsc::channel::<Tone>(depth);
        (TonePlayer { tx }, rx)
    }

    /// Queue a tone without waiting. Returns false if it was dropped.
    pub fn play(&self, tone: Tone) -> bool {
        match self.tx.try_send(tone) {
            Ok(()) => true,
            Err(_) => {
                debug!("Tone queue full, dropping {} Hz tone", tone.frequency_hz);
                false
            }
        }
    }
}

/// Interactive console output on stderr: a rewritten status line plus handoff messages.
pub struct ConsoleFeedback {
    tones: Option<TonePlayer>,
    threshold_deg: f64,
}

impl ConsoleFeedback {
    pub fn new(tones: Option<TonePlayer>, threshold_deg: f64) -> Self {
        ConsoleFeedback { tones, threshold_deg }
    }

    fn chime(&self, tone: Tone) {
        if let Some(player) = &self.tones {
            player.play(tone);
        }
    }
}

impl FeedbackSink for ConsoleFeedback {
    fn on_handoff_success(&mut self, event: &HandoffEvent) {
        eprintln!();
        eprintln!("{}", format_handoff(event, Utc::now()));
        self.chime(Tone::success());
    }

    fn on_handoff_failure(&mut self, current: &ObjectId, _at: DateTime<Utc>) {
        debug!(%current, "No eligible object to switch to");
        self.chime(Tone::failure());
    }

    fn on_status(&mut self, status: &Status) {
        match status {
            Status::Tracking { .. } => {
                eprint!("\r{}{}", format_status(status, self.threshold_deg), CLEAR_EOL);
            }
            Status::Holding { .. } => {
                eprintln!();
                eprint!("\r{}{}", format_status(status, self.threshold_deg), CLEAR_EOL);
            }
        }
        let _ = std::io::stderr().flush();
    }
}

/// One-line summary of a handoff.
pub fn format_handoff(event: &HandoffEvent, now: DateTime<Utc>) -> String {
    let verb = match event.kind {
        HandoffKind::Acquired => "Tracking",
        HandoffKind::Resumed => "Resumed tracking",
        HandoffKind::Handoff | HandoffKind::Switch => "Switched to",
    };
    let mut line = format!(
        "{} {} | {}{:.3}°, {:.3}°{}",
        verb, event.to, CYAN, event.altitude, event.azimuth, RESET
    );
    if let (Some(d_alt), Some(d_az)) = (event.delta_altitude, event.delta_azimuth) {
        line.push_str(&format!(" | {}Δ{:+.3}°, Δ{:+.3}°{}", GREEN, d_alt, d_az, RESET));
    }
    match event.remaining_secs(now) {
        Some(left) => line.push_str(&format!(" | Time left: {:.2} seconds", left)),
        None => line.push_str(" | Time left: unknown"),
    }
    line
}

/// Status line text without the trailing clear-to-end-of-line.
pub fn format_status(status: &Status, threshold_deg: f64) -> String {
    match status {
        Status::Tracking { id, altitude, azimuth, elapsed_secs, remaining_secs, counts } => {
            let mut line = format!(
                "{}Tracking {}{} | {}Altitude: {:.3}°{} | {}Azimuth: {:.3}°{} | {}Tracked for: {:.2}s{}",
                GREEN, id, RESET, BLUE, altitude, RESET, MAGENTA, azimuth, RESET, CYAN, elapsed_secs, RESET
            );
            if let Some(left) = remaining_secs {
                line.push_str(&format!(" | {}Time Left: {:.2}s{}", RED, left, RESET));
            }
            line.push_str(&format!(
                " | {}Sats above {:.0}°: {}/{} ({}/{}){}",
                YELLOW, threshold_deg, counts.untracked_above, counts.above, counts.tracked, counts.total, RESET
            ));
            line
        }
        Status::Holding { id, altitude, azimuth, .. } => format!(
            "{}Holding at reference point: {} {:.3}°, {:.3}° (no eligible object){}",
            YELLOW, id, altitude, azimuth, RESET
        ),
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum LogRecord<'a> {
    Handoff(&'a HandoffEvent),
    SwitchFailed { at: DateTime<Utc>, current: &'a ObjectId },
    Hold(&'a Status),
}

/// Appends handoffs, failed switches and holds to a file as JSON lines.
pub struct JsonLogFeedback {
    writer: BufWriter<File>,
}

impl JsonLogFeedback {
    pub fn new(path: &str) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(JsonLogFeedback { writer: BufWriter::new(file) })
    }

    fn write(&mut self, record: &LogRecord<'_>) {
        let result = serde_json::to_writer(&mut self.writer, record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());
        if let Err(e) = result {
            error!("Failed to write event log: {}", e);
        }
    }
}

impl FeedbackSink for JsonLogFeedback {
    fn on_handoff_success(&mut self, event: &HandoffEvent) {
        self.write(&LogRecord::Handoff(event));
    }

    fn on_handoff_failure(&mut self, current: &ObjectId, at: DateTime<Utc>) {
        self.write(&LogRecord::SwitchFailed { at, current });
    }

    fn on_status(&mut self, status: &Status) {
        // Per-cycle tracking status is console-only
        if let Status::Holding { .. } = status {
            self.write(&LogRecord::Hold(status));
        }
    }
}

/// Forwards every call to each sink in order.
#[derive(Default)]
pub struct Fanout {
    sinks: Vec<Box<dyn FeedbackSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sink: Box<dyn FeedbackSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl FeedbackSink for Fanout {
    fn on_handoff_success(&mut self, event: &HandoffEvent) {
        for sink in &mut self.sinks {
            sink.on_handoff_success(event);
        }
    }

    fn on_handoff_failure(&mut self, current: &ObjectId, at: DateTime<Utc>) {
        for sink in &mut self.sinks {
            sink.on_handoff_failure(current, at);
        }
    }

    fn on_status(&mut self, status: &Status) {
        for sink in &mut self.sinks {
            sink.on_status(status);
        }
    }
}
