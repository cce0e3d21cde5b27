//! X11 display server backend
//!
//! Interception uses the RECORD extension on a dedicated data connection;
//! injection (XTEST), layout groups (XKB) and RECORD context management go
//! through the control connection owned by [`X11Server`].

use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::record::{self, ConnectionExt as _};
use x11rb::protocol::xkb::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{self, ConnectionExt as _};
use x11rb::protocol::xtest::{self, ConnectionExt as _};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use super::{InputServer, KeyResolver, KeyboardMapping, ServerError};
use crate::event::{decode_device_events, InputEvent, RecordCategory};
use crate::{Action, KeyCode, Keysym};

impl From<ConnectError> for ServerError {
    fn from(e: ConnectError) -> Self {
        ServerError::Connect(e.to_string())
    }
}

impl From<ConnectionError> for ServerError {
    fn from(e: ConnectionError) -> Self {
        ServerError::Connection(e.to_string())
    }
}

impl From<ReplyError> for ServerError {
    fn from(e: ReplyError) -> Self {
        match e {
            ReplyError::ConnectionError(e) => e.into(),
            ReplyError::X11Error(e) => ServerError::Request(format!("{:?}", e)),
        }
    }
}

impl From<ReplyOrIdError> for ServerError {
    fn from(e: ReplyOrIdError) -> Self {
        match e {
            ReplyOrIdError::IdsExhausted => {
                ServerError::IdsExhausted("X11 resource ids exhausted".to_string())
            }
            ReplyOrIdError::ConnectionError(e) => e.into(),
            ReplyOrIdError::X11Error(e) => ServerError::Request(format!("{:?}", e)),
        }
    }
}

const XKB_DEVICE: xkb::ID = xkb::ID::USE_CORE_KBD;

/// Control connection to the X server.
pub struct X11Server {
    conn: RustConnection,
    root: xproto::Window,
    mapping: KeyboardMapping,
    record_context: Option<record::Context>,
    stopped: bool,
}

impl X11Server {
    /// Connect to `$DISPLAY` and verify XTEST, RECORD and XKB.
    pub fn connect() -> Result<Self, ServerError> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| ServerError::Connect(format!("no screen {}", screen_num)))?;

        require_extension(&conn, xtest::X11_EXTENSION_NAME, "Xtest")?;
        require_extension(&conn, record::X11_EXTENSION_NAME, "RECORD")?;
        require_extension(&conn, xkb::X11_EXTENSION_NAME, "Xkb")?;

        let xtest_version = conn.xtest_get_version(2, 2)?.reply()?;
        let record_version = conn.record_query_version(1, 13)?.reply()?;
        let xkb = conn.xkb_use_extension(1, 0)?.reply()?;
        if !xkb.supported {
            return Err(ServerError::MissingExtension("Xkb"));
        }
        log::debug!(
            "XTEST {}.{}, RECORD {}.{}, XKB {}.{}",
            xtest_version.major_version,
            xtest_version.minor_version,
            record_version.major_version,
            record_version.minor_version,
            xkb.server_major,
            xkb.server_minor
        );

        let mapping = fetch_keyboard_mapping(&conn)?;

        Ok(Self {
            conn,
            root,
            mapping,
            record_context: None,
            stopped: false,
        })
    }

    /// Create the RECORD context that intercepts key and button events
    /// from all clients.
    pub fn create_record_context(&mut self) -> Result<record::Context, ServerError> {
        if let Some(context) = self.record_context {
            return Ok(context);
        }

        let context = self.conn.generate_id()?;
        let empty = record::Range8 { first: 0, last: 0 };
        let empty_ext = record::ExtRange {
            major: empty,
            minor: record::Range16 { first: 0, last: 0 },
        };
        let range = record::Range {
            core_requests: empty,
            core_replies: empty,
            ext_requests: empty_ext,
            ext_replies: empty_ext,
            delivered_events: empty,
            device_events: record::Range8 {
                first: xproto::KEY_PRESS_EVENT,
                last: xproto::BUTTON_RELEASE_EVENT,
            },
            errors: empty,
            client_started: false,
            client_died: false,
        };

        self.conn
            .record_create_context(
                context,
                0,
                &[u32::from(record::CS::ALL_CLIENTS)],
                &[range],
            )
            .map_err(|e| ServerError::RecordContext(e.to_string()))?
            .check()
            .map_err(|e| ServerError::RecordContext(e.to_string()))?;
        self.sync()?;

        self.record_context = Some(context);
        Ok(context)
    }

    /// Release the RECORD context, if one was created
    pub fn free_record_context(&mut self) -> Result<(), ServerError> {
        if let Some(context) = self.record_context.take() {
            self.conn.record_free_context(context)?.check()?;
        }
        Ok(())
    }

    /// Round trip so every queued request has been processed
    fn sync(&self) -> Result<(), ServerError> {
        self.conn.get_input_focus()?.reply()?;
        Ok(())
    }
}

impl KeyResolver for X11Server {
    fn keysym_for_keycode(&self, code: KeyCode) -> Keysym {
        self.mapping.keysym_for_keycode(code)
    }

    fn keycode_for_keysym(&self, keysym: Keysym) -> Option<KeyCode> {
        self.mapping.keycode_for_keysym(keysym)
    }
}

impl InputServer for X11Server {
    fn inject(&mut self, code: KeyCode, action: Action) -> Result<(), ServerError> {
        let event_type = match action {
            Action::Press => xproto::KEY_PRESS_EVENT,
            Action::Release => xproto::KEY_RELEASE_EVENT,
        };
        self.conn.xtest_fake_input(
            event_type,
            code.code(),
            x11rb::CURRENT_TIME,
            self.root,
            0,
            0,
            0,
        )?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ServerError> {
        self.conn.flush()?;
        Ok(())
    }

    fn layout_group(&mut self) -> Result<u8, ServerError> {
        let state = self.conn.xkb_get_state(u16::from(XKB_DEVICE))?.reply()?;
        Ok(u8::from(state.group))
    }

    fn lock_layout_group(&mut self, group: u8) -> Result<(), ServerError> {
        let no_mods = xproto::ModMask::from(0u16);
        self.conn.xkb_latch_lock_state(
            u16::from(XKB_DEVICE),
            no_mods,
            no_mods,
            true,
            xkb::Group::from(group),
            no_mods,
            false,
            0,
        )?;
        Ok(())
    }

    /// The control connection never selects events, but the server sends
    /// MappingNotify to every client; drain them without blocking.
    fn refresh_mapping(&mut self) -> Result<bool, ServerError> {
        let mut changed = false;
        while let Some(event) = self.conn.poll_for_event()? {
            if let Event::MappingNotify(notify) = event {
                changed |= notify.request == xproto::Mapping::KEYBOARD;
            }
        }
        if changed {
            self.mapping = fetch_keyboard_mapping(&self.conn)?;
        }
        Ok(changed)
    }

    fn stop(&mut self) -> Result<(), ServerError> {
        if self.stopped {
            return Ok(());
        }
        if let Some(context) = self.record_context {
            self.conn
                .record_disable_context(context)
                .map_err(|e| ServerError::RecordContext(e.to_string()))?;
            self.sync()?;
        }
        self.stopped = true;
        Ok(())
    }
}

/// Data connection delivering intercepted events.
///
/// Enabling a RECORD context blocks the connection it is enabled on for
/// as long as the context is active, so it gets a connection of its own.
pub struct RecordStream {
    conn: RustConnection,
    context: record::Context,
}

impl RecordStream {
    /// Open the data connection for `context`
    pub fn connect(context: record::Context) -> Result<Self, ServerError> {
        let (conn, _) = x11rb::connect(None)?;
        Ok(Self { conn, context })
    }

    /// Enable the context and hand every intercepted device event to
    /// `on_event` until the context is disabled.
    ///
    /// `on_start` runs once, when the server confirms recording is live;
    /// disabling the context before that point has no effect.
    pub fn run<S, F>(&self, on_start: S, mut on_event: F) -> Result<(), ServerError>
    where
        S: FnOnce(),
        F: FnMut(InputEvent) -> Result<(), ServerError>,
    {
        let mut on_start = Some(on_start);
        let replies = self
            .conn
            .record_enable_context(self.context)
            .map_err(|e| ServerError::RecordContext(e.to_string()))?;

        for reply in replies {
            let reply = reply?;
            match RecordCategory::from(reply.category) {
                RecordCategory::FromServer => {
                    for event in decode_device_events(&reply.data) {
                        on_event(event)?;
                    }
                }
                RecordCategory::StartOfData => {
                    log::debug!("Recording started");
                    if let Some(on_start) = on_start.take() {
                        on_start();
                    }
                }
                RecordCategory::EndOfData => break,
                _ => {}
            }
        }

        log::debug!("Recording stopped");
        Ok(())
    }
}

fn require_extension(
    conn: &RustConnection,
    name: &'static str,
    label: &'static str,
) -> Result<(), ServerError> {
    match conn.extension_information(name)? {
        Some(_) => Ok(()),
        None => Err(ServerError::MissingExtension(label)),
    }
}

fn fetch_keyboard_mapping(conn: &RustConnection) -> Result<KeyboardMapping, ServerError> {
    let setup = conn.setup();
    let min = setup.min_keycode;
    let count = setup.max_keycode - min + 1;
    let reply = conn.get_keyboard_mapping(min, count)?.reply()?;
    Ok(KeyboardMapping::new(
        min,
        reply.keysyms_per_keycode,
        reply.keysyms,
    ))
}
