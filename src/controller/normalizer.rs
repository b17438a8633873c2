//! Channel normalizer
//!
//! Turns one frame of raw readings into three sets of active tokens: buttons,
//! hat directions and thresholded triggers. Read errors are logged at debug
//! level and count as "not held".

use super::device::InputDevice;
use crate::config::{HatNames, RecorderConfig};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
    Left,
    Right,
}

// (x, y) hat coordinate to directions. Unlisted coordinates map to nothing.
const HAT_TABLE: [((i8, i8), &[Direction]); 9] = [
    ((0, 1), &[Direction::Up]),
    ((0, -1), &[Direction::Down]),
    ((-1, 0), &[Direction::Left]),
    ((1, 0), &[Direction::Right]),
    ((-1, 1), &[Direction::Up, Direction::Left]),
    ((1, 1), &[Direction::Up, Direction::Right]),
    ((-1, -1), &[Direction::Down, Direction::Left]),
    ((1, -1), &[Direction::Down, Direction::Right]),
    ((0, 0), &[]),
];

/// Active tokens of one frame, one set per channel.
///
/// Sets are ordered, so iterating yields tokens lexicographically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSets {
    pub buttons: BTreeSet<String>,
    pub hat: BTreeSet<String>,
    pub triggers: BTreeSet<String>,
}

impl ActiveSets {
    /// Union of all three channels
    pub fn held_names(&self) -> BTreeSet<&str> {
        self.buttons
            .iter()
            .chain(&self.hat)
            .chain(&self.triggers)
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty() && self.hat.is_empty() && self.triggers.is_empty()
    }

    /// True if some token is active both here and in `previous`, i.e. an input
    /// stayed held through this frame rather than being pressed in it.
    pub fn holds_over(&self, previous: &ActiveSets) -> bool {
        !self.held_names().is_disjoint(&previous.held_names())
    }
}

/// Normalized axis value: negative raw values are shifted by +1.0 so a
/// [-1, 1] trigger lands on [0, 1]. Out-of-range values pass through unclamped.
pub fn normalize_axis(raw: f32) -> f32 {
    if raw < 0.0 {
        raw + 1.0
    } else {
        raw
    }
}

#[derive(Debug, Clone)]
pub struct ChannelNormalizer {
    buttons: BTreeMap<u8, Vec<String>>,
    triggers: BTreeMap<String, u8>,
    hat_index: u8,
    hat: HatNames,
    trigger_threshold: f32,
}

impl ChannelNormalizer {
    pub fn new(config: &RecorderConfig) -> Self {
        let mut buttons: BTreeMap<u8, Vec<String>> = BTreeMap::new();
        for (name, index) in &config.buttons {
            buttons.entry(*index).or_default().push(name.clone());
        }

        Self {
            buttons,
            triggers: config.triggers.clone(),
            hat_index: config.hat_index,
            hat: config.hat.clone(),
            trigger_threshold: config.trigger_threshold,
        }
    }

    pub fn normalize<D: InputDevice + ?Sized>(&self, device: &D) -> ActiveSets {
        ActiveSets {
            buttons: self.buttons_held(device),
            hat: self.hat_directions(device),
            triggers: self.triggers_held(device),
        }
    }

    fn buttons_held<D: InputDevice + ?Sized>(&self, device: &D) -> BTreeSet<String> {
        let mut held = BTreeSet::new();
        for (index, names) in &self.buttons {
            match device.button(*index) {
                Ok(true) => held.extend(names.iter().cloned()),
                Ok(false) => {}
                Err(e) => debug!("Button {} read failed: {}", index, e),
            }
        }
        held
    }

    fn hat_directions<D: InputDevice + ?Sized>(&self, device: &D) -> BTreeSet<String> {
        match device.hat(self.hat_index) {
            Ok((x, y)) => self.hat_tokens(x, y),
            Err(e) => {
                debug!("Hat {} read failed: {}", self.hat_index, e);
                BTreeSet::new()
            }
        }
    }

    fn hat_tokens(&self, x: i8, y: i8) -> BTreeSet<String> {
        let Some((_, directions)) = HAT_TABLE.iter().find(|(coord, _)| *coord == (x, y)) else {
            debug!("Unexpected hat coordinate ({}, {})", x, y);
            return BTreeSet::new();
        };

        directions
            .iter()
            .map(|direction| match direction {
                Direction::Up => self.hat.up.clone(),
                Direction::Down => self.hat.down.clone(),
                Direction::Left => self.hat.left.clone(),
                Direction::Right => self.hat.right.clone(),
            })
            .collect()
    }

    fn triggers_held<D: InputDevice + ?Sized>(&self, device: &D) -> BTreeSet<String> {
        let mut held = BTreeSet::new();
        for (name, axis) in &self.triggers {
            let raw = match device.axis(*axis) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("Axis {} read failed: {}", axis, e);
                    continue;
                }
            };
            if normalize_axis(raw) >= self.trigger_threshold {
                held.insert(name.clone());
            }
        }
        held
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::controller::device::ReadError;
    use std::collections::HashMap;

    /// Scripted device state for one frame
    #[derive(Debug, Clone, Default)]
    pub(crate) struct FakeFrame {
        pub buttons: HashMap<u8, Result<bool, ReadError>>,
        pub hat: Option<Result<(i8, i8), ReadError>>,
        pub axes: HashMap<u8, Result<f32, ReadError>>,
    }

    impl FakeFrame {
        pub fn idle() -> Self {
            Self::default()
        }

        pub fn button(mut self, index: u8) -> Self {
            self.buttons.insert(index, Ok(true));
            self
        }

        pub fn hat(mut self, x: i8, y: i8) -> Self {
            self.hat = Some(Ok((x, y)));
            self
        }

        pub fn axis(mut self, index: u8, value: f32) -> Self {
            self.axes.insert(index, Ok(value));
            self
        }
    }

    impl InputDevice for FakeFrame {
        fn pump(&mut self) {}

        fn button(&self, index: u8) -> Result<bool, ReadError> {
            self.buttons.get(&index).copied().unwrap_or(Ok(false))
        }

        fn hat(&self, _index: u8) -> Result<(i8, i8), ReadError> {
            self.hat.unwrap_or(Ok((0, 0)))
        }

        fn axis(&self, index: u8) -> Result<f32, ReadError> {
            self.axes.get(&index).copied().unwrap_or(Ok(-1.0))
        }
    }

    fn normalizer() -> ChannelNormalizer {
        ChannelNormalizer::new(&RecorderConfig::default())
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn idle_frame_has_no_active_inputs() {
        let sets = normalizer().normalize(&FakeFrame::idle());
        assert!(sets.is_empty());
        assert!(sets.held_names().is_empty());
    }

    #[test]
    fn mapped_buttons_are_reported() {
        let frame = FakeFrame::idle().button(0).button(4).button(6);
        let sets = normalizer().normalize(&frame);
        // index 6 has no token
        assert_eq!(sets.buttons, set(&["L1", "LK()"]));
    }

    #[test]
    fn button_read_error_does_not_hide_other_buttons() {
        let mut frame = FakeFrame::idle().button(1).button(3);
        frame.buttons.insert(2, Err(ReadError::Unavailable(2)));
        let sets = normalizer().normalize(&frame);
        assert_eq!(sets.buttons, set(&["MK()", "MP()"]));
    }

    #[test]
    fn hat_table_matches_directions() {
        let n = normalizer();
        assert!(n.hat_tokens(0, 0).is_empty());
        assert_eq!(n.hat_tokens(0, 1), set(&["UP()"]));
        assert_eq!(n.hat_tokens(0, -1), set(&["DOWN()"]));
        assert_eq!(n.hat_tokens(-1, 0), set(&["LEFT()"]));
        assert_eq!(n.hat_tokens(1, 0), set(&["RIGHT()"]));
        assert_eq!(n.hat_tokens(1, 1), set(&["RIGHT()", "UP()"]));
        assert_eq!(n.hat_tokens(-1, -1), set(&["DOWN()", "LEFT()"]));
        assert_eq!(n.hat_tokens(-1, 1), set(&["LEFT()", "UP()"]));
        assert_eq!(n.hat_tokens(1, -1), set(&["DOWN()", "RIGHT()"]));
    }

    #[test]
    fn unknown_hat_coordinate_is_empty() {
        let n = normalizer();
        assert!(n.hat_tokens(2, 0).is_empty());
        assert!(n.hat_tokens(-1, 5).is_empty());
    }

    #[test]
    fn hat_read_error_is_empty() {
        let mut frame = FakeFrame::idle();
        frame.hat = Some(Err(ReadError::Disconnected));
        assert!(normalizer().normalize(&frame).hat.is_empty());
    }

    #[test]
    fn axis_normalization_shifts_negative_values_only() {
        assert_eq!(normalize_axis(-1.0), 0.0);
        assert_eq!(normalize_axis(-0.5), 0.5);
        assert_eq!(normalize_axis(0.25), 0.25);
        // no clamping
        assert_eq!(normalize_axis(1.5), 1.5);
        assert_eq!(normalize_axis(-1.5), -0.5);
    }

    #[test]
    fn triggers_use_threshold_after_normalization() {
        let n = normalizer();

        let resting = FakeFrame::idle().axis(4, -1.0).axis(5, 0.0);
        assert!(n.normalize(&resting).triggers.is_empty());

        // -0.5 normalizes to exactly the threshold
        let half = FakeFrame::idle().axis(4, -0.5);
        assert_eq!(n.normalize(&half).triggers, set(&["DRIVE_RUSH()"]));

        let both = FakeFrame::idle().axis(4, 0.9).axis(5, 0.5);
        assert_eq!(n.normalize(&both).triggers, set(&["DRIVE_RUSH()", "HK()"]));

        let below = FakeFrame::idle().axis(5, 0.49);
        assert!(n.normalize(&below).triggers.is_empty());
    }

    #[test]
    fn axis_read_error_is_skipped() {
        let mut frame = FakeFrame::idle().axis(5, 1.0);
        frame.axes.insert(4, Err(ReadError::UnknownIndex(4)));
        assert_eq!(normalizer().normalize(&frame).triggers, set(&["HK()"]));
    }

    #[test]
    fn held_names_spans_all_channels() {
        let frame = FakeFrame::idle().button(4).hat(-1, 0).axis(5, 1.0);
        let sets = normalizer().normalize(&frame);
        let held: Vec<&str> = sets.held_names().into_iter().collect();
        assert_eq!(held, vec!["HK()", "L1", "LEFT()"]);
    }

    #[test]
    fn holds_over_ignores_fresh_presses() {
        let n = normalizer();
        let before = n.normalize(&FakeFrame::idle().button(0));
        let fresh = n.normalize(&FakeFrame::idle().button(1));
        let sustained = n.normalize(&FakeFrame::idle().button(0).button(1));
        assert!(!fresh.holds_over(&before));
        assert!(sustained.holds_over(&before));
    }
}
