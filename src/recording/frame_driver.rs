//! Frame driver
//!
//! One tick: pump the device, normalize, update the downtime latch, detect
//! transitions, emit opcodes while recording, advance the idle counter and
//! roll the previous-frame snapshot forward. The snapshot advances even while
//! idle so starting a recording does not re-fire inputs that are already held.
//!
//! ```text
//! InputDevice ──► ChannelNormalizer ──► FrameTransitions ──► RecordingSession
//!                  (ActiveSets)          (press/release)       (opcode lines)
//! ```

use super::session::{FinishedRecording, Recorder};
use crate::controller::device::InputDevice;
use crate::controller::normalizer::{ActiveSets, ChannelNormalizer};
use crate::controller::transitions::FrameTransitions;
use crate::hotkey::HotkeyEvent;
use crate::persistence::{MacroStore, PersistenceError};
use chrono::Local;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct FrameDriver<D: InputDevice> {
    device: D,
    normalizer: ChannelNormalizer,
    previous: ActiveSets,
    recorder: Recorder,
}

impl<D: InputDevice> FrameDriver<D> {
    pub fn new(device: D, normalizer: ChannelNormalizer, recorder: Recorder) -> Self {
        Self {
            device,
            normalizer,
            previous: ActiveSets::default(),
            recorder,
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Toggles recording; returns the finished recording when it stopped
    pub fn toggle_recording(&mut self) -> Option<FinishedRecording> {
        self.recorder.toggle()
    }

    /// Stops recording if active
    pub fn finish(&mut self) -> Option<FinishedRecording> {
        self.recorder.finish()
    }

    /// Runs one frame. Read errors are absorbed by the normalizer, so a
    /// step always completes.
    pub fn step(&mut self) {
        self.device.pump();
        let current = self.normalizer.normalize(&self.device);

        if let Some(session) = self.recorder.session_mut() {
            // An input pressed in this very frame belongs to the event, not
            // to the idle gap before it
            session.observe_hold(current.holds_over(&self.previous));

            let transitions = FrameTransitions::detect(&current, &self.previous);
            if !transitions.is_empty() {
                debug!("Frame transitions: {:?}", transitions);
            }
            for name in transitions.presses() {
                session.emit_press(name);
            }
            for name in transitions.releases() {
                if session.is_pressed(name) {
                    session.emit_release(name);
                } else {
                    debug!("Skipping release of {}, held before recording started", name);
                }
            }

            session.end_frame();
        }

        self.previous = current;
    }
}

#[derive(Clone, Debug)]
pub struct FrameLoopSettings {
    pub fps: u32,
    pub stats_interval_secs: i64,
}

impl Default for FrameLoopSettings {
    fn default() -> Self {
        Self {
            fps: 60,
            stats_interval_secs: 30,
        }
    }
}

async fn save_recording(
    store: &MacroStore,
    finished: FinishedRecording,
) -> Result<(), PersistenceError> {
    let opcodes = finished.lines.len();
    info!("Saving recording ({} opcodes)", opcodes);
    match store.save(finished.lines).await {
        Ok(path) => {
            info!("Saved: {}", path.display());
            Ok(())
        }
        Err(e) => {
            error!("Recording with {} opcodes was not saved: {}", opcodes, e);
            Err(e)
        }
    }
}

/// Drives frames at the configured rate until a stop is requested.
///
/// Hotkey events are drained once per tick, before sampling. A stop request
/// or cancellation ends the loop after flushing an active recording. Save
/// failures during the run are logged and the loop keeps going; a failed
/// final save is returned.
pub async fn run_frame_loop<D: InputDevice>(
    mut driver: FrameDriver<D>,
    mut hotkeys: mpsc::UnboundedReceiver<HotkeyEvent>,
    store: MacroStore,
    shutdown: CancellationToken,
    settings: FrameLoopSettings,
) -> Result<(), PersistenceError> {
    let period = Duration::from_secs_f64(1.0 / f64::from(settings.fps.max(1)));
    info!(
        "Starting frame loop at {} fps ({:.2} ms per frame)",
        settings.fps,
        period.as_secs_f64() * 1000.0
    );

    let mut interval_timer = tokio::time::interval(period);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut hotkeys_open = true;
    let mut frames: u64 = 0;
    let mut overruns: u64 = 0;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(settings.stats_interval_secs);
    let overrun_budget = chrono::Duration::from_std(period).unwrap_or(chrono::Duration::MAX);

    'frames: loop {
        tokio::select! {
            _ = interval_timer.tick() => {}
            _ = shutdown.cancelled() => {
                info!("Shutdown requested");
                break 'frames;
            }
        }

        while hotkeys_open {
            match hotkeys.try_recv() {
                Ok(HotkeyEvent::ToggleRecord) => {
                    if let Some(finished) = driver.toggle_recording() {
                        // Error already logged; the next recording can still be saved
                        let _ = save_recording(&store, finished).await;
                    }
                }
                Ok(HotkeyEvent::RequestStop) => {
                    info!("Stop requested");
                    break 'frames;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("Hotkey listener is gone, recording can no longer be toggled");
                    hotkeys_open = false;
                }
            }
        }

        let frame_start = Local::now();
        driver.step();
        frames += 1;
        if Local::now() - frame_start > overrun_budget {
            overruns += 1;
        }

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            info!(
                "Frame loop stats: {} frames, {} overruns in {} seconds",
                frames,
                overruns,
                (now - last_stats_time).num_seconds()
            );
            frames = 0;
            overruns = 0;
            last_stats_time = now;
        }
    }

    match driver.finish() {
        Some(finished) => save_recording(&store, finished).await,
        None => {
            debug!("No active recording at exit");
            Ok(())
        }
    }
}
