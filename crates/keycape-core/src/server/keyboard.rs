// Keycape Keyboard Mapping
// Snapshot of the core keyboard mapping (GetKeyboardMapping)

use super::KeyResolver;
use crate::{KeyCode, Keysym};

/// The server's keycode -> keysym table.
///
/// Laid out exactly as the core protocol returns it: one row of
/// `keysyms_per_keycode` entries for each keycode starting at
/// `min_keycode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardMapping {
    min_keycode: u8,
    keysyms_per_keycode: u8,
    keysyms: Vec<u32>,
}

impl KeyboardMapping {
    /// Build from a raw GetKeyboardMapping reply body
    pub fn new(min_keycode: u8, keysyms_per_keycode: u8, keysyms: Vec<u32>) -> Self {
        Self {
            min_keycode,
            keysyms_per_keycode,
            keysyms,
        }
    }

    /// Build from sparse `(keycode, levels)` rows; gaps are left unmapped.
    pub fn from_entries(entries: &[(u8, &[u32])]) -> Self {
        let Some(min) = entries.iter().map(|(code, _)| *code).min() else {
            return Self::new(8, 1, Vec::new());
        };
        let max = entries.iter().map(|(code, _)| *code).max().unwrap_or(min);
        let per = entries
            .iter()
            .map(|(_, levels)| levels.len())
            .max()
            .unwrap_or(1)
            .max(1);

        let rows = usize::from(max - min) + 1;
        let mut keysyms = vec![0u32; rows * per];
        for (code, levels) in entries {
            let start = usize::from(code - min) * per;
            keysyms[start..start + levels.len()].copy_from_slice(levels);
        }

        Self::new(min, per as u8, keysyms)
    }

    pub fn min_keycode(&self) -> u8 {
        self.min_keycode
    }

    /// Highest keycode covered by the snapshot
    pub fn max_keycode(&self) -> u8 {
        let per = usize::from(self.keysyms_per_keycode.max(1));
        let rows = self.keysyms.len() / per;
        if rows == 0 {
            return self.min_keycode;
        }
        let max = usize::from(self.min_keycode) + rows - 1;
        u8::try_from(max).unwrap_or(u8::MAX)
    }

    pub fn keysyms_per_keycode(&self) -> u8 {
        self.keysyms_per_keycode
    }

    /// Keysym at `level` of `code`, `NoSymbol` outside the table
    pub fn keysym(&self, code: KeyCode, level: u8) -> Keysym {
        if code.code() < self.min_keycode || level >= self.keysyms_per_keycode {
            return Keysym::NO_SYMBOL;
        }
        let index = usize::from(code.code() - self.min_keycode)
            * usize::from(self.keysyms_per_keycode)
            + usize::from(level);
        self.keysyms
            .get(index)
            .copied()
            .map(Keysym)
            .unwrap_or(Keysym::NO_SYMBOL)
    }
}

impl KeyResolver for KeyboardMapping {
    fn keysym_for_keycode(&self, code: KeyCode) -> Keysym {
        self.keysym(code, 0)
    }

    /// Scans level by level, then keycode by keycode, the same search
    /// order Xlib uses, so the lowest-level binding wins.
    fn keycode_for_keysym(&self, keysym: Keysym) -> Option<KeyCode> {
        if keysym.is_none() || self.keysyms.is_empty() {
            return None;
        }
        for level in 0..self.keysyms_per_keycode {
            for code in self.min_keycode..=self.max_keycode() {
                if self.keysym(KeyCode(code), level) == keysym {
                    return Some(KeyCode(code));
                }
            }
        }
        None
    }
}
