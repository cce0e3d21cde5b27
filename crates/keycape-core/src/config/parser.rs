// Keycape Mapping Parser
// Parses "trigger=sub[|sub...];..." expressions into a MappingTable

use crate::mapping::{MappingTable, TapRule};
use crate::server::KeyResolver;
use crate::{KeyCode, Keysym, Trigger};

/// Mapping used when none is configured
pub const DEFAULT_MAPPING: &str = "Control_L=Escape";

/// Configuration errors that stop startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid timeout: {0} (must be a positive number of milliseconds)")]
    InvalidTimeout(u64),

    #[error("Failed to parse mapping: no usable entries in '{0}'")]
    EmptyMapping(String),
}

/// Problems with a single mapping entry; the entry is skipped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseEntryError {
    #[error("Mapping without = has no effect: '{0}'")]
    MissingEquals(String),

    #[error("Mapping has no trigger: '{0}'")]
    EmptyTrigger(String),

    #[error("Mapping has no substitute keys: '{0}'")]
    NoSubstitutes(String),

    #[error("Invalid keycode: {0}")]
    InvalidKeycode(String),

    #[error("Invalid key: {0}")]
    UnknownKeysym(String),

    #[error("No keycode found for keysym {keysym} in mapping {entry}. Ignoring this mapping.")]
    NoKeycodeForKeysym { keysym: String, entry: String },
}

/// A key as written in the mapping language
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    /// Keysym name, e.g. `Escape`
    Name(String),
    /// `#`-prefixed hardware keycode, e.g. `#66`, `#0102`, `#0x42`
    Code(KeyCode),
}

/// One syntactically valid entry, not yet resolved against a keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub trigger: KeySpec,
    pub substitutes: Vec<KeySpec>,
    /// The entry text as written, for diagnostics
    pub source: String,
}

/// Split a mapping expression into entries and check their syntax.
///
/// Blank entries (such as the one after a trailing `;`) are dropped
/// without a diagnostic.
pub fn parse_entries(mapping: &str) -> Vec<Result<MappingEntry, ParseEntryError>> {
    mapping
        .split(';')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(parse_entry)
        .collect()
}

fn parse_entry(token: &str) -> Result<MappingEntry, ParseEntryError> {
    let (from, to) = token
        .split_once('=')
        .ok_or_else(|| ParseEntryError::MissingEquals(token.to_string()))?;

    let from = from.trim();
    if from.is_empty() {
        return Err(ParseEntryError::EmptyTrigger(token.to_string()));
    }
    if to.trim().is_empty() {
        return Err(ParseEntryError::NoSubstitutes(token.to_string()));
    }

    let trigger = parse_key_spec(from)?;
    let substitutes = to
        .split('|')
        .map(|key| parse_key_spec(key.trim()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MappingEntry {
        trigger,
        substitutes,
        source: token.to_string(),
    })
}

fn parse_key_spec(token: &str) -> Result<KeySpec, ParseEntryError> {
    match token.strip_prefix('#') {
        Some(number) => parse_keycode(number)
            .map(KeySpec::Code)
            .ok_or_else(|| ParseEntryError::InvalidKeycode(number.to_string())),
        None if token.is_empty() => Err(ParseEntryError::UnknownKeysym(token.to_string())),
        None => Ok(KeySpec::Name(token.to_string())),
    }
}

/// Parse a keycode the way C's `strtoul(s, NULL, 0)` picks a base:
/// `0x` hex, leading `0` octal, otherwise decimal. Unlike `strtoul`,
/// trailing garbage is an error.
pub fn parse_keycode(number: &str) -> Option<KeyCode> {
    let (digits, radix) = if let Some(hex) = number
        .strip_prefix("0x")
        .or_else(|| number.strip_prefix("0X"))
    {
        (hex, 16)
    } else if number.len() > 1 && number.starts_with('0') {
        (&number[1..], 8)
    } else {
        (number, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(|value| u8::try_from(value).ok())
        .map(KeyCode)
}

/// Resolve one parsed entry into a rule
pub fn resolve_entry<R: KeyResolver + ?Sized>(
    entry: &MappingEntry,
    resolver: &R,
) -> Result<TapRule, ParseEntryError> {
    let trigger = match &entry.trigger {
        KeySpec::Name(name) => Trigger::Keysym(
            Keysym::from_name(name).ok_or_else(|| ParseEntryError::UnknownKeysym(name.clone()))?,
        ),
        KeySpec::Code(code) => Trigger::Keycode(checked_keycode(*code, resolver)?),
    };

    let substitutes = entry
        .substitutes
        .iter()
        .map(|spec| match spec {
            KeySpec::Code(code) => checked_keycode(*code, resolver),
            KeySpec::Name(name) => {
                let keysym = Keysym::from_name(name)
                    .ok_or_else(|| ParseEntryError::UnknownKeysym(name.clone()))?;
                resolver.keycode_for_keysym(keysym).ok_or_else(|| {
                    ParseEntryError::NoKeycodeForKeysym {
                        keysym: format!("{} (0x{:x})", name, keysym.raw()),
                        entry: entry.source.clone(),
                    }
                })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TapRule::new(trigger, substitutes))
}

/// A `#` keycode is only usable if the layout maps it to something
fn checked_keycode<R: KeyResolver + ?Sized>(
    code: KeyCode,
    resolver: &R,
) -> Result<KeyCode, ParseEntryError> {
    if resolver.keysym_for_keycode(code).is_none() {
        return Err(ParseEntryError::InvalidKeycode(code.to_string()));
    }
    Ok(code)
}

/// Parse and resolve a whole mapping expression.
///
/// Bad entries are logged and skipped; it is only an error if nothing
/// usable is left.
pub fn parse_mapping<R: KeyResolver + ?Sized>(
    mapping: &str,
    resolver: &R,
) -> Result<MappingTable, ConfigError> {
    log::debug!("mapping = {}", mapping);

    let mut table = MappingTable::new();
    for parsed in parse_entries(mapping) {
        let rule = parsed.and_then(|entry| resolve_entry(&entry, resolver));
        match rule {
            Ok(rule) => {
                log_rule(&rule, resolver);
                table.push(rule);
            }
            Err(e) => log::warn!("{}", e),
        }
    }

    if table.is_empty() {
        return Err(ConfigError::EmptyMapping(mapping.to_string()));
    }
    Ok(table)
}

fn log_rule<R: KeyResolver + ?Sized>(rule: &TapRule, resolver: &R) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    let (keysym, code) = match rule.trigger() {
        Trigger::Keysym(keysym) => (keysym, resolver.keycode_for_keysym(keysym)),
        Trigger::Keycode(code) => (resolver.keysym_for_keycode(code), Some(code)),
    };
    let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
    log::debug!(
        "Assigned mapping from \"{}\" (keysym 0x{:x}, key code {})",
        keysym,
        keysym.raw(),
        code
    );
    for &sub in rule.substitutes() {
        let keysym = resolver.keysym_for_keycode(sub);
        log::debug!(
            "to \"{}\" (keysym 0x{:x}, key code {})",
            keysym,
            keysym.raw(),
            sub
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{KeyboardMapping, MemoryServer};

    #[test]
    fn test_parse_single_entry() {
        let entries = parse_entries("Control_L=Escape");
        assert_eq!(
            entries,
            vec![Ok(MappingEntry {
                trigger: KeySpec::Name("Control_L".to_string()),
                substitutes: vec![KeySpec::Name("Escape".to_string())],
                source: "Control_L=Escape".to_string(),
            })]
        );
    }

    #[test]
    fn test_parse_multiple_substitutes() {
        let entries = parse_entries("Shift_L=Shift_L|9");
        let entry = entries[0].as_ref().unwrap();
        assert_eq!(
            entry.substitutes,
            vec![
                KeySpec::Name("Shift_L".to_string()),
                KeySpec::Name("9".to_string())
            ]
        );
    }

    #[test]
    fn test_missing_equals_is_reported_per_entry() {
        let entries = parse_entries("Control_L=Escape;foo;Shift_R=Return");
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_ok());
        assert_eq!(
            entries[1],
            Err(ParseEntryError::MissingEquals("foo".to_string()))
        );
        assert!(entries[2].is_ok());
    }

    #[test]
    fn test_blank_entries_are_skipped() {
        let entries = parse_entries("Control_L=Escape; ;");
        assert_eq!(entries.len(), 1);
        assert!(parse_entries("").is_empty());
    }

    #[test]
    fn test_empty_sides() {
        assert_eq!(
            parse_entries("=Escape")[0],
            Err(ParseEntryError::EmptyTrigger("=Escape".to_string()))
        );
        assert_eq!(
            parse_entries("Control_L=")[0],
            Err(ParseEntryError::NoSubstitutes("Control_L=".to_string()))
        );
        assert_eq!(
            parse_entries("Control_L=Escape|")[0],
            Err(ParseEntryError::UnknownKeysym(String::new()))
        );
    }

    #[test]
    fn test_parse_keycode_bases() {
        assert_eq!(parse_keycode("66"), Some(KeyCode(66)));
        assert_eq!(parse_keycode("0102"), Some(KeyCode(66)));
        assert_eq!(parse_keycode("0x42"), Some(KeyCode(66)));
        assert_eq!(parse_keycode("0X42"), Some(KeyCode(66)));
        assert_eq!(parse_keycode("0"), Some(KeyCode(0)));
        assert_eq!(parse_keycode("255"), Some(KeyCode(255)));
    }

    #[test]
    fn test_parse_keycode_rejects_bad_input() {
        assert_eq!(parse_keycode("256"), None);
        assert_eq!(parse_keycode(""), None);
        assert_eq!(parse_keycode("0x"), None);
        assert_eq!(parse_keycode("09"), None);
        assert_eq!(parse_keycode("66abc"), None);
        assert_eq!(parse_keycode("+66"), None);
        assert_eq!(parse_keycode("-1"), None);
    }

    #[test]
    fn test_hash_prefix_yields_keycode() {
        let entries = parse_entries("#66=#0x09");
        let entry = entries[0].as_ref().unwrap();
        assert_eq!(entry.trigger, KeySpec::Code(KeyCode(66)));
        assert_eq!(entry.substitutes, vec![KeySpec::Code(KeyCode(9))]);
        assert_eq!(
            parse_entries("#abc=Escape")[0],
            Err(ParseEntryError::InvalidKeycode("abc".to_string()))
        );
    }

    #[test]
    fn test_resolve_symbolic_trigger_stays_symbolic() {
        let server = MemoryServer::us_layout();
        let entry = parse_entries("Control_L=Escape").remove(0).unwrap();
        let rule = resolve_entry(&entry, &server).unwrap();
        assert_eq!(rule.trigger(), Trigger::Keysym(Keysym(0xffe3)));
        assert_eq!(rule.substitutes(), &[KeyCode(9)]);
    }

    #[test]
    fn test_resolve_keycode_trigger() {
        let server = MemoryServer::us_layout();
        let entry = parse_entries("#66=Escape").remove(0).unwrap();
        let rule = resolve_entry(&entry, &server).unwrap();
        assert_eq!(rule.trigger(), Trigger::Keycode(KeyCode(66)));
    }

    #[test]
    fn test_resolve_errors() {
        let server = MemoryServer::us_layout();

        let unknown = parse_entries("Bogus=Escape").remove(0).unwrap();
        assert_eq!(
            resolve_entry(&unknown, &server).unwrap_err(),
            ParseEntryError::UnknownKeysym("Bogus".to_string())
        );

        // Keycode 200 is not mapped in the test layout
        let unmapped = parse_entries("#200=Escape").remove(0).unwrap();
        assert_eq!(
            resolve_entry(&unmapped, &server).unwrap_err(),
            ParseEntryError::InvalidKeycode("200".to_string())
        );

        // Hyper_L is a valid keysym but no key produces it
        let no_key = parse_entries("Control_L=Hyper_L").remove(0).unwrap();
        assert!(matches!(
            resolve_entry(&no_key, &server).unwrap_err(),
            ParseEntryError::NoKeycodeForKeysym { .. }
        ));
    }

    #[test]
    fn test_parse_mapping_skips_bad_entries() {
        let server = MemoryServer::us_layout();
        let table = parse_mapping("Control_L=Escape;foo;Super_L=Control_L|Escape", &server).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rules()[1].substitutes(), &[KeyCode(37), KeyCode(9)]);
    }

    #[test]
    fn test_parse_mapping_requires_one_rule() {
        let server = MemoryServer::us_layout();
        let err = parse_mapping("foo;Bogus=Escape", &server).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyMapping(_)));
    }

    #[test]
    fn test_parse_mapping_accepts_any_x_keysym_name() {
        let server = MemoryServer::new(KeyboardMapping::from_entries(&[
            (9, &[0xff1b]),
            (37, &[0xffe3]),
            (47, &[0xf6, 0xd6]),
            (108, &[0xff20]),
        ]));
        let table = parse_mapping(
            "Control_L=Escape;Control_L=Multi_key;Escape=odiaeresis",
            &server,
        )
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rules()[1].substitutes(), &[KeyCode(108)]);
        assert_eq!(table.rules()[2].substitutes(), &[KeyCode(47)]);
    }

    #[test]
    fn test_default_mapping_parses() {
        let server = MemoryServer::us_layout();
        let table = parse_mapping(DEFAULT_MAPPING, &server).unwrap();
        assert_eq!(table.len(), 1);
    }
}
