use std::fmt;

/// Direction of a key or button transition.
///
/// X core input has no separate repeat event; auto-repeat arrives as extra
/// presses, so only the two states exist here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Release,
    Press,
}

impl Action {
    /// Returns true if this is a PRESS event
    pub fn is_pressed(self) -> bool {
        matches!(self, Action::Press)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Release => write!(f, "release"),
            Action::Press => write!(f, "press"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_properties() {
        assert!(Action::Press.is_pressed());
        assert!(!Action::Release.is_pressed());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Release.to_string(), "release");
        assert_eq!(Action::Press.to_string(), "press");
    }
}
