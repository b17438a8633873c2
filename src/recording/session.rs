//! Recording session and the opcode emitter.
//!
//! # State Machine
//!
//! ```text
//!            toggle
//!   Idle ──────────────► Active
//!    ▲                     │
//!    └─────────────────────┘
//!      toggle / stop / exit  (lines handed to persistence)
//! ```
//!
//! Each start creates a fresh [`RecordingSession`]; nothing carries over from
//! an earlier recording.

use super::opcode::Opcode;
use std::collections::BTreeSet;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RecordingSession {
    lines: Vec<String>,

    // Frames since the last emitted opcode
    idle_frames: u32,

    // Latch: cleared when an input is held during the current gap, set again
    // only when a sleep is emitted
    downtime_only: bool,

    downtime_cap: u32,

    // Tokens pressed in this session and not yet released
    pressed: BTreeSet<String>,

    frames_recorded: u64,
}

impl RecordingSession {
    pub fn new(downtime_cap: u32) -> Self {
        Self {
            lines: Vec::new(),
            idle_frames: 0,
            downtime_only: true,
            downtime_cap,
            pressed: BTreeSet::new(),
            frames_recorded: 0,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn idle_frames(&self) -> u32 {
        self.idle_frames
    }

    pub fn downtime_only(&self) -> bool {
        self.downtime_only
    }

    /// Whether `name` was pressed during this session and is still down
    pub fn is_pressed(&self, name: &str) -> bool {
        self.pressed.contains(name)
    }

    /// Clears the downtime latch if an input was held during this frame
    pub fn observe_hold(&mut self, held: bool) {
        if held {
            self.downtime_only = false;
        }
    }

    /// Flushes the pending idle gap as a single `sleep(n)`.
    ///
    /// The gap is capped at `downtime_cap` only when nothing was held during
    /// it; gaps spent holding an input keep their full length.
    pub fn emit_sleep_if_needed(&mut self) {
        if self.idle_frames == 0 {
            return;
        }

        let frames = if self.downtime_only {
            self.idle_frames.min(self.downtime_cap)
        } else {
            self.idle_frames
        };
        self.push(Opcode::Sleep(frames));
        self.idle_frames = 0;
        self.downtime_only = true;
    }

    pub fn emit_press(&mut self, name: &str) {
        self.emit_sleep_if_needed();
        self.push(Opcode::Press(name.to_string()));
        self.pressed.insert(name.to_string());
        self.idle_frames = 0;
    }

    pub fn emit_release(&mut self, name: &str) {
        self.emit_sleep_if_needed();
        self.push(Opcode::Release(name.to_string()));
        self.pressed.remove(name);
        self.idle_frames = 0;
    }

    /// Counts the current frame toward the next gap
    pub fn end_frame(&mut self) {
        self.idle_frames = self.idle_frames.saturating_add(1);
        self.frames_recorded += 1;
    }

    fn push(&mut self, opcode: Opcode) {
        let line = opcode.to_string();
        debug!("{}", line);
        self.lines.push(line);
    }
}

/// Lines of a stopped recording, ready for persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRecording {
    pub lines: Vec<String>,
    pub frames: u64,
}

#[derive(Debug, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Active(RecordingSession),
}

#[derive(Debug)]
pub struct Recorder {
    state: RecorderState,
    downtime_cap: u32,
}

impl Recorder {
    pub fn new(downtime_cap: u32) -> Self {
        Self {
            state: RecorderState::Idle,
            downtime_cap,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RecorderState::Active(_))
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        match &self.state {
            RecorderState::Active(session) => Some(session),
            RecorderState::Idle => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut RecordingSession> {
        match &mut self.state {
            RecorderState::Active(session) => Some(session),
            RecorderState::Idle => None,
        }
    }

    /// Starts a fresh session when idle; stops and returns the recording when active
    pub fn toggle(&mut self) -> Option<FinishedRecording> {
        if self.is_active() {
            return self.finish();
        }

        info!("Recording started");
        self.state = RecorderState::Active(RecordingSession::new(self.downtime_cap));
        None
    }

    /// Stops an active session. Idle recorders have nothing to hand over.
    pub fn finish(&mut self) -> Option<FinishedRecording> {
        match std::mem::take(&mut self.state) {
            RecorderState::Active(session) => {
                info!(
                    "Recording stopped: {} opcodes over {} frames",
                    session.lines.len(),
                    session.frames_recorded
                );
                Some(FinishedRecording {
                    lines: session.lines,
                    frames: session.frames_recorded,
                })
            }
            RecorderState::Idle => None,
        }
    }
}
