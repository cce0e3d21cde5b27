// Keycape Event Handling
// Observed input events and the RECORD wire decoder

pub mod record;

pub use record::{decode_device_events, RecordCategory, EVENT_SIZE};

use std::fmt;

use crate::{Action, KeyCode};

/// Core protocol event type codes for device events
pub const KEY_PRESS: u8 = 2;
pub const KEY_RELEASE: u8 = 3;
pub const BUTTON_PRESS: u8 = 4;
pub const BUTTON_RELEASE: u8 = 5;

/// Kind of an observed device event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyPress,
    KeyRelease,
    ButtonPress,
    ButtonRelease,
}

impl EventKind {
    /// Map a core protocol event type (with the "sent" bit stripped)
    pub fn from_type_code(code: u8) -> Option<Self> {
        match code & 0x7f {
            KEY_PRESS => Some(EventKind::KeyPress),
            KEY_RELEASE => Some(EventKind::KeyRelease),
            BUTTON_PRESS => Some(EventKind::ButtonPress),
            BUTTON_RELEASE => Some(EventKind::ButtonRelease),
            _ => None,
        }
    }

    /// Press or release, regardless of device
    pub fn action(self) -> Action {
        match self {
            EventKind::KeyPress | EventKind::ButtonPress => Action::Press,
            EventKind::KeyRelease | EventKind::ButtonRelease => Action::Release,
        }
    }

    pub fn is_key(self) -> bool {
        matches!(self, EventKind::KeyPress | EventKind::KeyRelease)
    }

    pub fn is_button(self) -> bool {
        matches!(self, EventKind::ButtonPress | EventKind::ButtonRelease)
    }

    /// True for key and button presses
    pub fn is_press(self) -> bool {
        self.action().is_pressed()
    }
}

/// One observed input event: a kind and a detail code.
///
/// For key events `code` is the hardware keycode; for button events it is
/// the pointer button number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputEvent {
    pub kind: EventKind,
    pub code: u8,
}

impl InputEvent {
    pub fn new(kind: EventKind, code: u8) -> Self {
        Self { kind, code }
    }

    pub fn key_press(code: KeyCode) -> Self {
        Self::new(EventKind::KeyPress, code.code())
    }

    pub fn key_release(code: KeyCode) -> Self {
        Self::new(EventKind::KeyRelease, code.code())
    }

    pub fn button_press(button: u8) -> Self {
        Self::new(EventKind::ButtonPress, button)
    }

    pub fn button_release(button: u8) -> Self {
        Self::new(EventKind::ButtonRelease, button)
    }

    /// The keycode, for key events only
    pub fn keycode(&self) -> Option<KeyCode> {
        self.kind.is_key().then_some(KeyCode(self.code))
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let device = if self.kind.is_key() { "key" } else { "button" };
        write!(f, "{} {} {}", device, self.kind.action(), self.code)
    }
}
