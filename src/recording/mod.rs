//! Recording subsystem
//!
//! 1. [`session`] - recording lifecycle and the opcode emitter
//! 2. [`frame_driver`] - per-frame orchestration and the paced loop
//! 3. [`opcode`] - the macro line format
//!
//! # Timing
//!
//! A macro has no timestamps. Time is encoded only as `sleep(n)` lines between
//! press/release lines, with one unit being one frame of the driver. Idle
//! stretches where nothing was held are capped; stretches spent holding an
//! input keep their full length so hold durations replay faithfully.

pub mod frame_driver;
pub mod opcode;
pub mod session;

pub use frame_driver::{run_frame_loop, FrameDriver, FrameLoopSettings};
pub use opcode::Opcode;
pub use session::{FinishedRecording, Recorder, RecordingSession};
