//! Controller input handling
//!
//! Implements a three-stage pipeline, run once per frame:
//!
//! 1. [`device`] - raw button/hat/axis reads from the gamepad
//! 2. [`normalizer`] - raw reads to per-channel sets of active tokens
//! 3. [`transitions`] - press/release edges against the previous frame
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► InputDevice ──► ChannelNormalizer ──► FrameTransitions
//!             (raw reads)     (ActiveSets)          (presses, releases)
//! ```

pub mod device;
pub mod normalizer;
pub mod transitions;

pub use device::{DeviceError, GamepadDevice, InputDevice, ReadError};
pub use normalizer::{ActiveSets, ChannelNormalizer};
pub use transitions::{ChannelTransitions, FrameTransitions};
