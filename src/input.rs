// Operator commands
// Key levels set by background readers, turned into one-shot commands by explicit debounce state

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// Commands for one control cycle. Each is true for exactly one cycle per key press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Commands {
    pub switch: bool,
    pub cancel: bool,
}

/// Non-blocking, edge-triggered command source polled once per cycle.
pub trait CommandInput: Send {
    fn poll(&mut self) -> Commands;
}

/// Raw "is the key down right now" queries.
pub trait KeyState: Send {
    fn switch_held(&self) -> bool;
    fn cancel_held(&self) -> bool;
}

/// Rising-edge detector: fires once when a level goes high, then waits for it to drop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeTrigger {
    held: bool,
}

impl EdgeTrigger {
    pub fn update(&mut self, pressed: bool) -> bool {
        let fired = pressed && !self.held;
        self.held = pressed;
        fired
    }
}

/// Debounces a [`KeyState`] into [`Commands`].
pub struct Debounced<K> {
    keys: K,
    switch: EdgeTrigger,
    cancel: EdgeTrigger,
}

impl<K: KeyState> Debounced<K> {
    pub fn new(keys: K) -> Self {
        Debounced { keys, switch: EdgeTrigger::default(), cancel: EdgeTrigger::default() }
    }
}

impl<K: KeyState> CommandInput for Debounced<K> {
    fn poll(&mut self) -> Commands {
        Commands {
            switch: self.switch.update(self.keys.switch_held()),
            cancel: self.cancel.update(self.keys.cancel_held()),
        }
    }
}

/// Key levels shared between reader tasks and the control loop.
///
/// A switch press reads as held for one query and then released; cancel latches.
#[derive(Debug, Clone, Default)]
pub struct SharedKeys {
    switch: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl SharedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press_switch(&self) {
        self.switch.store(true, Ordering::SeqCst);
    }

    pub fn press_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

impl KeyState for SharedKeys {
    fn switch_held(&self) -> bool {
        self.switch.swap(false, Ordering::SeqCst)
    }

    fn cancel_held(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// What a line typed on stdin asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCommand {
    Switch,
    Cancel,
}

pub fn parse_line(line: &str) -> Option<LineCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        // Bare Enter (or a line of spaces) switches
        "" | "s" | "switch" => Some(LineCommand::Switch),
        "q" | "quit" | "esc" | "exit" => Some(LineCommand::Cancel),
        _ => None,
    }
}

/// Read commands from stdin, one per line.
pub fn spawn_stdin_reader(keys: SharedKeys) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_line(&line) {
                    Some(LineCommand::Switch) => keys.press_switch(),
                    Some(LineCommand::Cancel) => keys.press_cancel(),
                    None => debug!("Ignoring input {:?}", line),
                },
                Ok(None) => {
                    debug!("stdin closed, keyboard commands disabled");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
}

/// Treat Ctrl-C as the cancel key.
pub fn spawn_ctrl_c(keys: SharedKeys) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal (Ctrl+C)");
                keys.press_cancel();
            }
            Err(e) => warn!("Unable to listen for shutdown signal: {}", e),
        }
    });
}
