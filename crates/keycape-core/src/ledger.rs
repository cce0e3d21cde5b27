// Keycape Generated-Event Ledger
// Keycodes we injected ourselves and expect to see echoed back

use std::collections::VecDeque;

use crate::KeyCode;

/// Insertion-ordered multiset of injected keycodes.
///
/// Every synthetic press and release adds one entry; each observed echo
/// removes the oldest entry with the same code. Duplicates are never
/// coalesced.
#[derive(Debug, Clone, Default)]
pub struct GeneratedLedger {
    pending: VecDeque<KeyCode>,
}

impl GeneratedLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `code` was just injected
    pub fn record(&mut self, code: KeyCode) {
        self.pending.push_back(code);
    }

    /// Match an observed keycode against the oldest pending entry.
    ///
    /// Returns true (and forgets the entry) if the event is our own echo.
    pub fn consume(&mut self, code: KeyCode) -> bool {
        match self.pending.iter().position(|pending| *pending == code) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of echoes still outstanding
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.pending.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_unknown_code() {
        let mut ledger = GeneratedLedger::new();
        assert!(!ledger.consume(KeyCode(9)));

        ledger.record(KeyCode(9));
        assert!(!ledger.consume(KeyCode(10)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_duplicates_are_matched_one_for_one() {
        let mut ledger = GeneratedLedger::new();
        ledger.record(KeyCode(9));
        ledger.record(KeyCode(9));
        assert_eq!(ledger.len(), 2);

        assert!(ledger.consume(KeyCode(9)));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.consume(KeyCode(9)));
        assert!(!ledger.consume(KeyCode(9)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_consume_removes_first_match_only() {
        let mut ledger = GeneratedLedger::new();
        for code in [37, 9, 37, 9] {
            ledger.record(KeyCode(code));
        }

        assert!(ledger.consume(KeyCode(9)));
        let remaining: Vec<_> = ledger.iter().collect();
        assert_eq!(remaining, vec![KeyCode(37), KeyCode(37), KeyCode(9)]);
    }
}
