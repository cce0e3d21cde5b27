// Keycape Keysym Names
// X11 keysym names (keysymdef.h, XF86keysym.h) <-> value lookups

use std::collections::HashMap;
use std::sync::OnceLock;

// KEYSYM_TABLE: every name from keysymdef.h and XF86keysym.h, generated by
// build.rs from data/keysyms.txt. Where X defines aliases
// (`Prior`/`Page_Up`) the canonical name comes first.
include!(concat!(env!("OUT_DIR"), "/keysym_table.rs"));

fn names_to_values() -> &'static HashMap<&'static str, u32> {
    static NAMES: OnceLock<HashMap<&'static str, u32>> = OnceLock::new();
    NAMES.get_or_init(|| KEYSYM_TABLE.iter().copied().collect())
}

fn values_to_names() -> &'static HashMap<u32, &'static str> {
    static VALUES: OnceLock<HashMap<u32, &'static str>> = OnceLock::new();
    VALUES.get_or_init(|| {
        let mut map = HashMap::new();
        for (name, value) in KEYSYM_TABLE {
            map.entry(*value).or_insert(*name);
        }
        map
    })
}

/// Look up the keysym value for a name, as `XStringToKeysym` would.
///
/// Accepts every name in the keysym table, `0x`-prefixed raw values and
/// `U`-prefixed Unicode code points (`U20AC`).
pub fn keysym_from_name(name: &str) -> Option<u32> {
    if let Some(value) = names_to_values().get(name) {
        return Some(*value);
    }

    if let Some(hex) = name.strip_prefix("0x") {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return u32::from_str_radix(hex, 16).ok().filter(|v| *v != 0);
    }

    if let Some(hex) = name.strip_prefix('U') {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let cp = u32::from_str_radix(hex, 16).ok()?;
        return match cp {
            0 => None,
            0x20..=0x7e | 0xa0..=0xff => Some(cp),
            0x1..=0x10_ffff => Some(0x0100_0000 | cp),
            _ => None,
        };
    }

    None
}

/// Reverse lookup of [`keysym_from_name`] for diagnostics
pub fn keysym_name(value: u32) -> Option<&'static str> {
    values_to_names().get(&value).copied()
}
