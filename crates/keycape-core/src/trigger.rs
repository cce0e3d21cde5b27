use std::fmt;

use crate::{KeyCode, Keysym};

/// The input a tap rule watches for.
///
/// A trigger is resolved once while the mapping is loaded: either kept
/// symbolic (matched through the keyboard mapping at event time) or pinned
/// to a raw hardware keycode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Matches any keycode whose group 0, level 0 keysym is this one
    Keysym(Keysym),
    /// Matches exactly this hardware keycode
    Keycode(KeyCode),
}

impl Trigger {
    /// Check an observed keycode against this trigger.
    ///
    /// `keysym_of` performs the layout lookup; it is only consulted for
    /// symbolic triggers.
    pub fn matches(&self, code: KeyCode, keysym_of: impl FnOnce(KeyCode) -> Keysym) -> bool {
        match self {
            Trigger::Keysym(keysym) => keysym_of(code) == *keysym,
            Trigger::Keycode(expected) => *expected == code,
        }
    }

    pub fn is_keycode(&self) -> bool {
        matches!(self, Trigger::Keycode(_))
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Keysym(keysym) => write!(f, "{}", keysym),
            Trigger::Keycode(code) => write!(f, "#{}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keycode_trigger_ignores_layout() {
        let trigger = Trigger::Keycode(KeyCode(66));
        assert!(trigger.matches(KeyCode(66), |_| panic!("no lookup for keycode triggers")));
        assert!(!trigger.matches(KeyCode(67), |_| Keysym::NO_SYMBOL));
    }

    #[test]
    fn test_keysym_trigger_uses_lookup() {
        let trigger = Trigger::Keysym(Keysym(0xffe3));
        assert!(trigger.matches(KeyCode(37), |code| {
            assert_eq!(code, KeyCode(37));
            Keysym(0xffe3)
        }));
        assert!(!trigger.matches(KeyCode(38), |_| Keysym(0x61)));
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(Trigger::Keysym(Keysym(0xffe3)).to_string(), "Control_L");
        assert_eq!(Trigger::Keycode(KeyCode(66)).to_string(), "#66");
    }
}
