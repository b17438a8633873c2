use gilrs::{Axis, Button, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use tracing::{debug, error, info, warn};

/// Per-read failure. Always absorbed by the caller as "not held".
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("No input with index {0} on this controller layout")]
    UnknownIndex(u8),

    #[error("Controller reports no data for index {0}")]
    Unavailable(u8),

    #[error("Controller disconnected")]
    Disconnected,
}

/// One frame's worth of raw controller readings.
///
/// `pump` brings the device up to date; the three reads then describe the
/// same instant and can be queried in any order.
pub trait InputDevice {
    fn pump(&mut self);

    fn button(&self, index: u8) -> Result<bool, ReadError>;

    /// Hat coordinate, each component in {-1, 0, 1}. Up and right are positive.
    fn hat(&self, index: u8) -> Result<(i8, i8), ReadError>;

    fn axis(&self, index: u8) -> Result<f32, ReadError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to initialize gamepad backend: {0}")]
    InitializationError(String),

    #[error("No gamepad connected")]
    NoGamepad,
}

// Raw button indices as a DS4 reports them through DirectInput/SDL joystick.
// Index 13 is the touchpad click, which gilrs does not expose.
const BUTTON_LAYOUT: [Option<Button>; 14] = [
    Some(Button::West),
    Some(Button::South),
    Some(Button::East),
    Some(Button::North),
    Some(Button::LeftTrigger),
    Some(Button::RightTrigger),
    Some(Button::LeftTrigger2),
    Some(Button::RightTrigger2),
    Some(Button::Select),
    Some(Button::Start),
    Some(Button::LeftThumb),
    Some(Button::RightThumb),
    Some(Button::Mode),
    None,
];

const AXIS_LAYOUT: [Axis; 6] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::LeftZ,
    Axis::RightZ,
];

// gilrs mappings often report analog triggers as button values instead of Z axes
const TRIGGER_FALLBACK: [(u8, Button); 2] = [(4, Button::LeftTrigger2), (5, Button::RightTrigger2)];

#[state]
#[derive(Debug, Clone)]
pub enum DeviceState {
    Initializing,
    Polling,
}

#[machine]
#[derive(Debug)]
pub struct GamepadDevice<S: DeviceState> {
    gilrs: Gilrs,

    // Only this gamepad is sampled
    active_gamepad: Option<GamepadId>,

    name: String,
}

impl GamepadDevice<Initializing> {
    pub fn create() -> Result<Self, DeviceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(DeviceError::InitializationError(e.to_string()));
            }
        };

        Ok(Self::new(gilrs, None, String::new()))
    }

    /// Selects the first connected gamepad and starts polling it
    pub fn initialize(mut self) -> Result<GamepadDevice<Polling>, DeviceError> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            error!("No gamepad connected");
            return Err(DeviceError::NoGamepad);
        }

        info!("Found {} gamepads:", gamepads.len());
        for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
            info!(
                "  [{}] ID: {}, Name: {}, UUID: {:?}",
                idx,
                id,
                gamepad.name(),
                gamepad.uuid()
            );
        }

        let (id, gamepad) = &gamepads[0];
        let id = *id;
        let name = gamepad.name().to_string();
        drop(gamepads);

        info!("Using controller: {} ({})", name, id);
        self.active_gamepad = Some(id);
        self.name = name;
        Ok(self.transition())
    }
}

impl GamepadDevice<Polling> {
    fn gamepad(&self) -> Result<Gamepad<'_>, ReadError> {
        self.active_gamepad
            .and_then(|id| self.gilrs.connected_gamepad(id))
            .ok_or(ReadError::Disconnected)
    }
}

impl InputDevice for GamepadDevice<Polling> {
    fn pump(&mut self) {
        // gilrs only updates its cached state while events are drained
        while let Some(event) = self.gilrs.next_event() {
            if Some(event.id) != self.active_gamepad {
                continue;
            }
            match event.event {
                EventType::Disconnected => warn!("Controller {} disconnected", self.name),
                EventType::Connected => info!("Controller {} reconnected", self.name),
                other => debug!("Raw controller event: {:?}", other),
            }
        }
    }

    fn button(&self, index: u8) -> Result<bool, ReadError> {
        let button = BUTTON_LAYOUT
            .get(usize::from(index))
            .copied()
            .flatten()
            .ok_or(ReadError::UnknownIndex(index))?;
        let gamepad = self.gamepad()?;
        gamepad
            .button_data(button)
            .map(|data| data.is_pressed())
            .ok_or(ReadError::Unavailable(index))
    }

    fn hat(&self, index: u8) -> Result<(i8, i8), ReadError> {
        if index != 0 {
            return Err(ReadError::UnknownIndex(index));
        }
        let gamepad = self.gamepad()?;
        let pressed = |button| i8::from(gamepad.is_pressed(button));
        let x = pressed(Button::DPadRight) - pressed(Button::DPadLeft);
        let y = pressed(Button::DPadUp) - pressed(Button::DPadDown);
        Ok((x, y))
    }

    fn axis(&self, index: u8) -> Result<f32, ReadError> {
        let axis = *AXIS_LAYOUT
            .get(usize::from(index))
            .ok_or(ReadError::UnknownIndex(index))?;
        let gamepad = self.gamepad()?;

        if let Some(data) = gamepad.axis_data(axis) {
            return Ok(data.value());
        }

        TRIGGER_FALLBACK
            .iter()
            .find(|(axis_index, _)| *axis_index == index)
            .and_then(|(_, button)| gamepad.button_data(*button))
            .map(|data| data.value())
            .ok_or(ReadError::Unavailable(index))
    }
}
