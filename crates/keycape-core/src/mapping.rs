// Keycape Mapping Structures
// TapRule and the MappingTable that owns them

use std::fmt;
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::{KeyCode, Trigger};

/// Substitution sequences are almost always one or two keys
pub type Substitutes = SmallVec<[KeyCode; 4]>;

/// Derived tap/hold state of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapState {
    /// Trigger is up
    Idle,
    /// Trigger is down and nothing has disqualified a tap yet
    PressedClean,
    /// Trigger is down but other input happened; releasing emits nothing
    PressedUsed,
}

/// Mutable per-rule runtime state
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleState {
    pub pressed: bool,
    pub used: bool,
    pub pressed_at: Option<Instant>,
}

/// One trigger -> substitution rule (tap vs. hold)
#[derive(Debug, Clone)]
pub struct TapRule {
    trigger: Trigger,
    substitutes: Substitutes,
    state: RuleState,
}

impl TapRule {
    /// Create a new idle rule
    pub fn new(trigger: Trigger, substitutes: impl IntoIterator<Item = KeyCode>) -> Self {
        Self {
            trigger,
            substitutes: substitutes.into_iter().collect(),
            state: RuleState::default(),
        }
    }

    /// Get the trigger
    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Get the substitution sequence, in emission order
    pub fn substitutes(&self) -> &[KeyCode] {
        &self.substitutes
    }

    /// Get the raw runtime state
    pub fn state(&self) -> &RuleState {
        &self.state
    }

    /// Current position in the tap/hold state machine
    pub fn tap_state(&self) -> TapState {
        match (self.state.pressed, self.state.used) {
            (false, _) => TapState::Idle,
            (true, false) => TapState::PressedClean,
            (true, true) => TapState::PressedUsed,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.state.pressed
    }

    /// The trigger went down at `now`.
    ///
    /// Holding a mouse button while pressing the trigger is never a tap.
    /// Auto-repeat presses while already down keep the original press time.
    pub fn press(&mut self, now: Instant, mouse_pressed: bool) {
        if self.state.pressed {
            return;
        }
        self.state.pressed = true;
        self.state.pressed_at = Some(now);
        if mouse_pressed {
            self.state.used = true;
        }
    }

    /// Some other key or button went down while this rule is pressed
    pub fn mark_used(&mut self) {
        if self.state.pressed {
            self.state.used = true;
        }
    }

    /// The trigger went up at `now`; returns true on a confirmed tap.
    ///
    /// A tap needs a clean press and an elapsed time strictly below
    /// `timeout`. The rule is back to idle afterwards either way.
    pub fn release(&mut self, now: Instant, timeout: Duration) -> bool {
        let is_tap = match (self.tap_state(), self.state.pressed_at) {
            (TapState::PressedClean, Some(pressed_at)) => {
                now.saturating_duration_since(pressed_at) < timeout
            }
            _ => false,
        };
        self.reset();
        is_tap
    }

    /// Drop any in-flight press
    pub fn reset(&mut self) {
        self.state = RuleState::default();
    }
}

impl fmt::Display for TapRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} =", self.trigger)?;
        for (i, code) in self.substitutes.iter().enumerate() {
            let sep = if i == 0 { " " } else { " | " };
            write!(f, "{}#{}", sep, code)?;
        }
        Ok(())
    }
}

/// Ordered collection of tap rules, built once at startup.
///
/// Rule order is preserved from the configuration and is the order in
/// which rules see each event.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    rules: Vec<TapRule>,
}

impl MappingTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule
    pub fn push(&mut self, rule: TapRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Get the rules
    pub fn rules(&self) -> &[TapRule] {
        &self.rules
    }

    /// Get the rules for state updates
    pub fn rules_mut(&mut self) -> &mut [TapRule] {
        &mut self.rules
    }

    /// True if any rule is mid-press
    pub fn any_pressed(&self) -> bool {
        self.rules.iter().any(TapRule::is_pressed)
    }

    /// Abandon every in-flight press (e.g. at shutdown)
    pub fn reset_all(&mut self) {
        self.rules.iter_mut().for_each(TapRule::reset);
    }
}

impl FromIterator<TapRule> for MappingTable {
    fn from_iter<I: IntoIterator<Item = TapRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}
