// Keycape In-Memory Server
// Offline stand-in for the display server used to replay event sequences

use super::{InputServer, KeyResolver, KeyboardMapping, ServerError};
use crate::{Action, KeyCode, Keysym};

/// One request issued against a [`MemoryServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCall {
    Inject(KeyCode, Action),
    Flush,
    LockGroup(u8),
    Stop,
}

/// Display server that keeps everything in memory.
///
/// It records every request in order so the exact injected sequence and
/// the flush points can be inspected, and lets the caller switch the
/// layout group behind the engine's back to mimic a user change.
#[derive(Debug, Clone)]
pub struct MemoryServer {
    mapping: KeyboardMapping,
    calls: Vec<ServerCall>,
    group: u8,
    group_on_inject: Option<u8>,
    pending_mapping: Option<KeyboardMapping>,
    stopped: bool,
    stop_requests: usize,
}

impl MemoryServer {
    /// Create a server around a keyboard mapping, layout group 0
    pub fn new(mapping: KeyboardMapping) -> Self {
        Self {
            mapping,
            calls: Vec::new(),
            group: 0,
            group_on_inject: None,
            pending_mapping: None,
            stopped: false,
            stop_requests: 0,
        }
    }

    /// A small US layout with evdev keycodes
    pub fn us_layout() -> Self {
        Self::new(us_layout_mapping())
    }

    /// Start in a different layout group
    pub fn with_group(mut self, group: u8) -> Self {
        self.group = group;
        self
    }

    /// Change the active group without going through the engine
    pub fn set_group(&mut self, group: u8) {
        self.group = group;
    }

    /// Make every injected key event switch the layout group to `group`,
    /// the way a layout-switching keysym would on a real server
    pub fn switch_group_on_inject(mut self, group: u8) -> Self {
        self.group_on_inject = Some(group);
        self
    }

    /// Requests issued so far, oldest first
    pub fn calls(&self) -> &[ServerCall] {
        &self.calls
    }

    /// Only the injected key events, in order
    pub fn injected(&self) -> Vec<(KeyCode, Action)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                ServerCall::Inject(code, action) => Some((*code, *action)),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded requests
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// How many times stop was requested
    pub fn stop_requests(&self) -> usize {
        self.stop_requests
    }

    /// Replace the keyboard mapping at the next refresh, as a
    /// `setxkbmap` would on a real server
    pub fn queue_mapping(&mut self, mapping: KeyboardMapping) {
        self.pending_mapping = Some(mapping);
    }
}

impl KeyResolver for MemoryServer {
    fn keysym_for_keycode(&self, code: KeyCode) -> Keysym {
        self.mapping.keysym_for_keycode(code)
    }

    fn keycode_for_keysym(&self, keysym: Keysym) -> Option<KeyCode> {
        self.mapping.keycode_for_keysym(keysym)
    }
}

impl InputServer for MemoryServer {
    fn inject(&mut self, code: KeyCode, action: Action) -> Result<(), ServerError> {
        self.calls.push(ServerCall::Inject(code, action));
        if let Some(group) = self.group_on_inject {
            self.group = group;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ServerError> {
        self.calls.push(ServerCall::Flush);
        Ok(())
    }

    fn layout_group(&mut self) -> Result<u8, ServerError> {
        Ok(self.group)
    }

    fn lock_layout_group(&mut self, group: u8) -> Result<(), ServerError> {
        self.calls.push(ServerCall::LockGroup(group));
        self.group = group;
        Ok(())
    }

    fn refresh_mapping(&mut self) -> Result<bool, ServerError> {
        match self.pending_mapping.take() {
            Some(mapping) => {
                self.mapping = mapping;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn stop(&mut self) -> Result<(), ServerError> {
        self.stop_requests += 1;
        if !self.stopped {
            self.calls.push(ServerCall::Stop);
            self.stopped = true;
        }
        Ok(())
    }
}

fn us_layout_mapping() -> KeyboardMapping {
    KeyboardMapping::from_entries(&[
        (9, &[0xff1b]),          // Escape
        (10, &[0x31, 0x21]),     // 1 exclam
        (18, &[0x39, 0x28]),     // 9 parenleft
        (19, &[0x30, 0x29]),     // 0 parenright
        (23, &[0xff09, 0xfe20]), // Tab ISO_Left_Tab
        (36, &[0xff0d]),         // Return
        (37, &[0xffe3]),         // Control_L
        (38, &[0x61, 0x41]),     // a A
        (50, &[0xffe1]),         // Shift_L
        (62, &[0xffe2]),         // Shift_R
        (64, &[0xffe9, 0xffe7]), // Alt_L Meta_L
        (65, &[0x20]),           // space
        (66, &[0xffe5]),         // Caps_Lock
        (105, &[0xffe4]),        // Control_R
        (108, &[0xffea]),        // Alt_R
        (133, &[0xffeb]),        // Super_L
        (134, &[0xffec]),        // Super_R
    ])
}
