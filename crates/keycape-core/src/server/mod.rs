// Keycape Server Boundary
//
// This module defines the interface to the display server: synthetic
// injection, keycode/keysym lookups and the XKB layout group.

mod keyboard;
mod memory;

#[cfg(feature = "x11-backend")]
pub mod x11;

pub use keyboard::KeyboardMapping;
pub use memory::{MemoryServer, ServerCall};

#[cfg(feature = "x11-backend")]
pub use x11::{RecordStream, X11Server};

use crate::{Action, KeyCode, Keysym};

/// Error type for display server operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    /// Could not open the display
    #[error("Unable to connect to X11 display: {0}. Is $DISPLAY set?")]
    Connect(String),

    /// A required extension is not available on the server
    #[error("{0} extension missing")]
    MissingExtension(&'static str),

    /// The connection broke while sending or receiving
    #[error("X11 connection error: {0}")]
    Connection(String),

    /// The server answered a request with an error
    #[error("X11 request failed: {0}")]
    Request(String),

    /// No more resource ids could be allocated
    #[error("Failed to allocate resource id: {0}")]
    IdsExhausted(String),

    /// Setting up or enabling the RECORD context failed
    #[error("Failed to set up xrecord context: {0}")]
    RecordContext(String),
}

/// Layout-dependent lookups used while loading the mapping and for
/// matching symbolic triggers.
pub trait KeyResolver {
    /// The group 0, level 0 keysym of `code` (`NoSymbol` if unmapped)
    fn keysym_for_keycode(&self, code: KeyCode) -> Keysym;

    /// The first keycode producing `keysym` at any level
    fn keycode_for_keysym(&self, keysym: Keysym) -> Option<KeyCode>;
}

/// Everything the tap engine needs from the display server.
///
/// Implementations are driven from inside the session lock, so none of
/// these methods need to be thread-safe on their own.
pub trait InputServer: KeyResolver {
    /// Synthesize one hardware key event as if it came from a keyboard
    fn inject(&mut self, code: KeyCode, action: Action) -> Result<(), ServerError>;

    /// Push queued requests to the server
    fn flush(&mut self) -> Result<(), ServerError>;

    /// Read the active keyboard layout group
    fn layout_group(&mut self) -> Result<u8, ServerError>;

    /// Lock the active keyboard layout group
    fn lock_layout_group(&mut self, group: u8) -> Result<(), ServerError>;

    /// Pick up keyboard mapping changes made since the last call.
    ///
    /// Returns true if the mapping snapshot was reloaded.
    fn refresh_mapping(&mut self) -> Result<bool, ServerError>;

    /// Ask the server to stop delivering intercepted events.
    ///
    /// Must be idempotent.
    fn stop(&mut self) -> Result<(), ServerError>;
}
