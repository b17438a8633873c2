//! # Persistence
//!
//! Saves finished recordings as macro files. Writes happen on a worker task;
//! the frame driver sends the lines and awaits the outcome so a failed save is
//! reported instead of dropped. Existing files are never overwritten.

pub mod macro_writer;

pub use macro_writer::{MacroStore, MacroWriter, PersistenceError, StoreAction};
