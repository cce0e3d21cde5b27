// Keycape Config API
// Mapping-language parsing and TOML settings

pub mod parser;
pub mod settings;

pub use parser::{
    parse_entries, parse_keycode, parse_mapping, resolve_entry, ConfigError, KeySpec,
    MappingEntry, ParseEntryError, DEFAULT_MAPPING,
};
pub use settings::{CliOverrides, Settings};
