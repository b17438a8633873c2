//! Global keyboard hotkeys
//!
//! The rdev listener runs on its own OS thread and works while the process is
//! not focused. It never touches recording state; it only posts
//! [`HotkeyEvent`]s that the frame driver drains once per tick.

use crate::config::HotkeyConfig;
use rdev::{listen, Event, EventType, Key};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    ToggleRecord,
    RequestStop,
}

#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("Unknown key name: {0}")]
    UnknownKey(String),

    #[error("Failed to spawn hotkey listener thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Map a key name from the config file to an rdev key
pub fn parse_key(name: &str) -> Option<Key> {
    let key = match name.trim().to_ascii_lowercase().as_str() {
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "esc" | "escape" => Key::Escape,
        "pause" => Key::Pause,
        "scrolllock" | "scroll_lock" => Key::ScrollLock,
        "printscreen" | "print_screen" => Key::PrintScreen,
        "insert" => Key::Insert,
        "delete" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "page_up" => Key::PageUp,
        "pagedown" | "page_down" => Key::PageDown,
        "space" => Key::Space,
        "tab" => Key::Tab,
        _ => return None,
    };
    Some(key)
}

#[derive(Debug, Clone, Copy)]
pub struct HotkeyBindings {
    toggle_record: Key,
    request_stop: Key,
}

impl HotkeyBindings {
    pub fn from_config(config: &HotkeyConfig) -> Result<Self, HotkeyError> {
        let toggle_record = parse_key(&config.toggle_record)
            .ok_or_else(|| HotkeyError::UnknownKey(config.toggle_record.clone()))?;
        let request_stop = parse_key(&config.request_stop)
            .ok_or_else(|| HotkeyError::UnknownKey(config.request_stop.clone()))?;
        Ok(Self {
            toggle_record,
            request_stop,
        })
    }
}

/// Turns raw key events into edge-triggered hotkey events.
///
/// OS key repeat delivers a stream of presses while a key is held; each
/// binding fires once and re-arms on release.
#[derive(Debug)]
struct HotkeyFilter {
    bindings: HotkeyBindings,
    toggle_held: bool,
    stop_held: bool,
}

impl HotkeyFilter {
    fn new(bindings: HotkeyBindings) -> Self {
        Self {
            bindings,
            toggle_held: false,
            stop_held: false,
        }
    }

    fn handle(&mut self, event: &EventType) -> Option<HotkeyEvent> {
        match *event {
            EventType::KeyPress(key) if key == self.bindings.toggle_record => {
                let fired = !self.toggle_held;
                self.toggle_held = true;
                fired.then_some(HotkeyEvent::ToggleRecord)
            }
            EventType::KeyPress(key) if key == self.bindings.request_stop => {
                let fired = !self.stop_held;
                self.stop_held = true;
                fired.then_some(HotkeyEvent::RequestStop)
            }
            EventType::KeyRelease(key) if key == self.bindings.toggle_record => {
                self.toggle_held = false;
                None
            }
            EventType::KeyRelease(key) if key == self.bindings.request_stop => {
                self.stop_held = false;
                None
            }
            _ => None,
        }
    }
}

/// Spawns the global listener thread.
///
/// The thread lives for the rest of the process; rdev offers no way to stop
/// `listen`. Events sent after the frame driver is gone are dropped.
pub fn spawn_listener(
    bindings: HotkeyBindings,
    sender: mpsc::UnboundedSender<HotkeyEvent>,
) -> Result<JoinHandle<()>, HotkeyError> {
    info!(
        "Starting global hotkey listener (toggle: {:?}, stop: {:?})",
        bindings.toggle_record, bindings.request_stop
    );

    let handle = std::thread::Builder::new()
        .name("hotkey-listener".to_string())
        .spawn(move || {
            let mut filter = HotkeyFilter::new(bindings);
            let callback = move |event: Event| {
                if let Some(hotkey) = filter.handle(&event.event_type) {
                    debug!("Hotkey fired: {:?}", hotkey);
                    if sender.send(hotkey).is_err() {
                        debug!("Frame driver gone, dropping hotkey {:?}", hotkey);
                    }
                }
            };

            if let Err(e) = listen(callback) {
                error!("Global hotkey listener stopped: {:?}", e);
            }
        })?;

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> HotkeyFilter {
        HotkeyFilter::new(HotkeyBindings::from_config(&HotkeyConfig::default()).unwrap())
    }

    #[test]
    fn key_names_are_case_insensitive() {
        assert_eq!(parse_key("F1"), Some(Key::F1));
        assert_eq!(parse_key("esc"), Some(Key::Escape));
        assert_eq!(parse_key("Escape"), Some(Key::Escape));
        assert_eq!(parse_key("hyper"), None);
    }

    #[test]
    fn unknown_binding_is_an_error() {
        let config = HotkeyConfig {
            toggle_record: "nope".to_string(),
            ..HotkeyConfig::default()
        };
        assert!(matches!(
            HotkeyBindings::from_config(&config),
            Err(HotkeyError::UnknownKey(name)) if name == "nope"
        ));
    }

    #[test]
    fn held_key_fires_once() {
        let mut filter = filter();
        assert_eq!(
            filter.handle(&EventType::KeyPress(Key::F1)),
            Some(HotkeyEvent::ToggleRecord)
        );
        // key repeat
        assert_eq!(filter.handle(&EventType::KeyPress(Key::F1)), None);
        assert_eq!(filter.handle(&EventType::KeyPress(Key::F1)), None);
        assert_eq!(filter.handle(&EventType::KeyRelease(Key::F1)), None);
        assert_eq!(
            filter.handle(&EventType::KeyPress(Key::F1)),
            Some(HotkeyEvent::ToggleRecord)
        );
    }

    #[test]
    fn bindings_are_tracked_independently() {
        let mut filter = filter();
        assert_eq!(
            filter.handle(&EventType::KeyPress(Key::F1)),
            Some(HotkeyEvent::ToggleRecord)
        );
        assert_eq!(
            filter.handle(&EventType::KeyPress(Key::Escape)),
            Some(HotkeyEvent::RequestStop)
        );
        assert_eq!(filter.handle(&EventType::KeyPress(Key::KeyA)), None);
    }
}
