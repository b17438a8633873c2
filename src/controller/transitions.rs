//! Edge detection between two frames.
//!
//! Each channel is diffed against its own previous set. Emission order is a
//! stable contract so the same input produces the same macro: presses before
//! releases, buttons before hat before triggers, and tokens within a channel
//! in lexicographic order.

use super::normalizer::ActiveSets;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelTransitions {
    pub presses: Vec<String>,
    pub releases: Vec<String>,
}

impl ChannelTransitions {
    /// `presses = current - previous`, `releases = previous - current`
    pub fn between(current: &BTreeSet<String>, previous: &BTreeSet<String>) -> Self {
        Self {
            presses: current.difference(previous).cloned().collect(),
            releases: previous.difference(current).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.presses.is_empty() && self.releases.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameTransitions {
    pub buttons: ChannelTransitions,
    pub hat: ChannelTransitions,
    pub triggers: ChannelTransitions,
}

impl FrameTransitions {
    pub fn detect(current: &ActiveSets, previous: &ActiveSets) -> Self {
        Self {
            buttons: ChannelTransitions::between(&current.buttons, &previous.buttons),
            hat: ChannelTransitions::between(&current.hat, &previous.hat),
            triggers: ChannelTransitions::between(&current.triggers, &previous.triggers),
        }
    }

    pub fn presses(&self) -> impl Iterator<Item = &str> {
        self.buttons
            .presses
            .iter()
            .chain(&self.hat.presses)
            .chain(&self.triggers.presses)
            .map(String::as_str)
    }

    pub fn releases(&self) -> impl Iterator<Item = &str> {
        self.buttons
            .releases
            .iter()
            .chain(&self.hat.releases)
            .chain(&self.triggers.releases)
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty() && self.hat.is_empty() && self.triggers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn sets(buttons: &[&str], hat: &[&str], triggers: &[&str]) -> ActiveSets {
        ActiveSets {
            buttons: set(buttons),
            hat: set(hat),
            triggers: set(triggers),
        }
    }

    #[test]
    fn unchanged_frame_has_no_transitions() {
        let frame = sets(&["L1"], &["UP()"], &["HK()"]);
        assert!(FrameTransitions::detect(&frame, &frame).is_empty());
    }

    #[test]
    fn channel_diff_is_set_difference() {
        let diff = ChannelTransitions::between(&set(&["a", "b"]), &set(&["b", "c"]));
        assert_eq!(diff.presses, vec!["a"]);
        assert_eq!(diff.releases, vec!["c"]);
    }

    #[test]
    fn tokens_within_a_channel_are_sorted() {
        let diff = ChannelTransitions::between(&set(&["UP()", "RIGHT()"]), &set(&[]));
        assert_eq!(diff.presses, vec!["RIGHT()", "UP()"]);
    }

    #[test]
    fn presses_precede_releases_in_channel_order() {
        let previous = sets(&["MK()"], &["DOWN()"], &["HK()"]);
        let current = sets(&["LK()"], &["UP()"], &["DRIVE_RUSH()"]);
        let transitions = FrameTransitions::detect(&current, &previous);

        let presses: Vec<&str> = transitions.presses().collect();
        let releases: Vec<&str> = transitions.releases().collect();
        assert_eq!(presses, vec!["LK()", "UP()", "DRIVE_RUSH()"]);
        assert_eq!(releases, vec!["MK()", "DOWN()", "HK()"]);
    }

    #[test]
    fn diagonal_to_cardinal_releases_one_direction() {
        let previous = sets(&[], &["RIGHT()", "UP()"], &[]);
        let current = sets(&[], &["UP()"], &[]);
        let transitions = FrameTransitions::detect(&current, &previous);
        assert_eq!(transitions.presses().count(), 0);
        assert_eq!(transitions.releases().collect::<Vec<_>>(), vec!["RIGHT()"]);
    }
}
