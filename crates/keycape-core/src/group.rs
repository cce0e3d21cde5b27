// Keycape Keyboard-Group Tracker
// Keeps the XKB layout group where the user put it

use crate::server::{InputServer, ServerError};

/// Tracks the layout group the user wants and re-asserts it after every
/// event, so synthetic injection cannot leave the server in another group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupTracker {
    intended_group: u8,
    previous_group: u8,
    enabled: bool,
}

impl GroupTracker {
    /// Start tracking from the server's current group
    pub fn new(initial_group: u8) -> Self {
        Self {
            intended_group: initial_group,
            previous_group: initial_group,
            enabled: true,
        }
    }

    /// A tracker that never talks to the server
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(0)
        }
    }

    /// Read the initial group from `server`
    pub fn from_server<S: InputServer + ?Sized>(server: &mut S) -> Result<Self, ServerError> {
        Ok(Self::new(server.layout_group()?))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The group the user last chose
    pub fn intended_group(&self) -> u8 {
        self.intended_group
    }

    /// The group seen at the end of the previous event
    pub fn previous_group(&self) -> u8 {
        self.previous_group
    }

    /// Read the group at the start of an event, before any injection.
    ///
    /// Returns `None` when tracking is disabled.
    pub fn sample<S: InputServer + ?Sized>(
        &self,
        server: &mut S,
    ) -> Result<Option<u8>, ServerError> {
        if !self.enabled {
            return Ok(None);
        }
        server.layout_group().map(Some)
    }

    /// Finish an event whose starting group was `sampled`.
    ///
    /// A group that differs from the one left behind last time is a user
    /// switch and becomes the intended group; changes made while the event
    /// was being processed are not. The intended group is then locked
    /// unconditionally and the result remembered.
    pub fn observe<S: InputServer + ?Sized>(
        &mut self,
        server: &mut S,
        sampled: Option<u8>,
    ) -> Result<(), ServerError> {
        let Some(current) = sampled else {
            return Ok(());
        };

        if current != self.previous_group {
            self.intended_group = current;
            log::debug!("Changed group to {}", current);
        }

        server.lock_layout_group(self.intended_group)?;
        self.previous_group = server.layout_group()?;
        Ok(())
    }

    /// [`sample`](Self::sample) and [`observe`](Self::observe) in one go,
    /// for events that inject nothing
    pub fn track<S: InputServer + ?Sized>(&mut self, server: &mut S) -> Result<(), ServerError> {
        let sampled = self.sample(server)?;
        self.observe(server, sampled)
    }
}
