// Keycape Core Library
// Tap/hold key substitution: data model, decision engine, server boundary

pub mod action;
pub mod config;
pub mod engine;
pub mod event;
pub mod group;
pub mod key;
pub mod keysym;
pub mod ledger;
pub mod mapping;
pub mod server;
pub mod session;
pub mod trigger;

pub use action::Action;
pub use config::{
    parse_entries, parse_mapping, CliOverrides, ConfigError, KeySpec, MappingEntry,
    ParseEntryError, Settings, DEFAULT_MAPPING,
};
pub use engine::{Outcome, TapEngine, DEFAULT_TIMEOUT};
pub use event::{EventKind, InputEvent};
pub use group::GroupTracker;
pub use key::{KeyCode, Keysym};
pub use ledger::GeneratedLedger;
pub use mapping::{MappingTable, RuleState, TapRule, TapState};
pub use server::{InputServer, KeyResolver, KeyboardMapping, MemoryServer, ServerCall, ServerError};
pub use session::{Session, SharedSession};
pub use trigger::Trigger;

#[cfg(feature = "x11-backend")]
pub use server::{RecordStream, X11Server};
