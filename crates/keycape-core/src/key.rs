// Keycape Key Types
// Hardware keycodes and symbolic keysyms as seen by the X server

use std::fmt;
use std::str::FromStr;

use crate::keysym::{keysym_from_name, keysym_name};

/// Represents a single X hardware keycode.
///
/// X keycodes are 8-bit; the server only hands out 8..=255, but the full
/// range is representable so parsed values can be validated later against
/// the keyboard mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct KeyCode(pub u8);

impl KeyCode {
    /// Get the raw numeric code value
    pub fn code(self) -> u8 {
        self.0
    }
}

impl From<u8> for KeyCode {
    fn from(code: u8) -> Self {
        KeyCode(code)
    }
}

impl From<KeyCode> for u8 {
    fn from(key: KeyCode) -> Self {
        key.0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents an X keysym: the symbolic meaning a keycode produces under
/// the current layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Keysym(pub u32);

impl Keysym {
    /// `NoSymbol` in X terms
    pub const NO_SYMBOL: Keysym = Keysym(0);

    /// Get the raw keysym value
    pub fn raw(self) -> u32 {
        self.0
    }

    /// True for `NoSymbol`
    pub fn is_none(self) -> bool {
        self == Self::NO_SYMBOL
    }

    /// Resolve a keysym from its X name (`Escape`, `Control_L`, `a`),
    /// a `0x`-prefixed hex value or a `U`-prefixed Unicode code point.
    pub fn from_name(name: &str) -> Option<Self> {
        keysym_from_name(name).map(Keysym)
    }

    /// The X name of this keysym, if it is in the built-in table
    pub fn name(self) -> Option<&'static str> {
        keysym_name(self.0)
    }
}

impl From<u32> for Keysym {
    fn from(raw: u32) -> Self {
        Keysym(raw)
    }
}

impl fmt::Display for Keysym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None if self.is_none() => write!(f, "NoSymbol"),
            None => write!(f, "0x{:x}", self.0),
        }
    }
}

impl FromStr for Keysym {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Keysym::from_name(s).ok_or_else(|| format!("Unknown keysym: {}", s))
    }
}
