// Keycape RECORD Data Decoding
// Turns intercepted wire data into InputEvents

use super::{EventKind, InputEvent};

/// Size of one core protocol event on the wire
pub const EVENT_SIZE: usize = 32;

/// Category of an intercepted RECORD reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCategory {
    FromServer,
    FromClient,
    ClientStarted,
    ClientDied,
    StartOfData,
    EndOfData,
    Unknown(u8),
}

impl From<u8> for RecordCategory {
    fn from(value: u8) -> Self {
        match value {
            0 => RecordCategory::FromServer,
            1 => RecordCategory::FromClient,
            2 => RecordCategory::ClientStarted,
            3 => RecordCategory::ClientDied,
            4 => RecordCategory::StartOfData,
            5 => RecordCategory::EndOfData,
            other => RecordCategory::Unknown(other),
        }
    }
}

/// Decode the device events carried by a `FromServer` reply.
///
/// The payload is a run of 32-byte core events; byte 0 is the event type
/// and byte 1 the detail (keycode or button). Anything that is not a key
/// or button transition is skipped, as is a trailing partial event.
pub fn decode_device_events(data: &[u8]) -> Vec<InputEvent> {
    data.chunks_exact(EVENT_SIZE)
        .filter_map(|raw| {
            EventKind::from_type_code(raw[0]).map(|kind| InputEvent::new(kind, raw[1]))
        })
        .collect()
}
