// Keycape Session
// The one shared context: engine state plus the control connection

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::engine::{Outcome, TapEngine};
use crate::event::InputEvent;
use crate::server::{InputServer, ServerError};

/// Engine and control connection behind the single session lock.
///
/// The event task holds the lock for the whole of one event; the
/// shutdown task holds it while asking the server to stop. Nothing else
/// touches either.
#[derive(Debug)]
pub struct Session<S> {
    engine: TapEngine,
    server: S,
    stopped: bool,
}

/// Session shared between the event task and the shutdown task
pub type SharedSession<S> = Arc<Mutex<Session<S>>>;

impl<S: InputServer> Session<S> {
    pub fn new(engine: TapEngine, server: S) -> Self {
        Self {
            engine,
            server,
            stopped: false,
        }
    }

    /// Wrap into the shared form
    pub fn shared(self) -> SharedSession<S> {
        Arc::new(Mutex::new(self))
    }

    /// Process one intercepted event at the current time
    pub fn handle(&mut self, event: InputEvent) -> Result<Outcome, ServerError> {
        self.handle_at(event, Instant::now())
    }

    /// Process one intercepted event at `now`
    pub fn handle_at(&mut self, event: InputEvent, now: Instant) -> Result<Outcome, ServerError> {
        self.engine.process_event(event, now, &mut self.server)
    }

    /// Ask the server to stop delivering events.
    ///
    /// Safe to call more than once; only the first call reaches the
    /// server. Any tap still pending is abandoned.
    pub fn stop(&mut self) -> Result<(), ServerError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.engine.reset();
        self.server.stop()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn engine(&self) -> &TapEngine {
        &self.engine
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut S {
        &mut self.server
    }

    /// Tear down, returning the server for final cleanup
    pub fn into_server(self) -> S {
        self.server
    }
}
