// Keycape Tap Engine
// Interception pipeline: echo filtering, tap/hold decisions, group tracking
//
// Every observed event runs through the same steps, in this order:
// 1. The generated-event ledger swallows echoes of our own injections
// 2. A changed keyboard mapping is reloaded and the layout group sampled
// 3. Mouse button state is updated
// 4. Each rule sees the event (trigger press/release, or disqualification)
// 5. The layout group is re-asserted

use std::time::{Duration, Instant};

use crate::event::{EventKind, InputEvent};
use crate::group::GroupTracker;
use crate::ledger::GeneratedLedger;
use crate::mapping::{MappingTable, TapRule};
use crate::server::{InputServer, ServerError};
use crate::{Action, KeyCode, Keysym};

/// Default tap timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// What happened to one observed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event was our own injection coming back; nothing else ran
    Echo,
    /// The event went through the rules; `taps` substitutions were emitted
    Processed { taps: usize },
}

/// Tap/hold decision engine and the per-event state it needs.
#[derive(Debug)]
pub struct TapEngine {
    table: MappingTable,
    ledger: GeneratedLedger,
    groups: GroupTracker,
    mouse_pressed: bool,
    timeout: Duration,
}

impl TapEngine {
    /// Create an engine over `table` with group tracking disabled
    pub fn new(table: MappingTable, timeout: Duration) -> Self {
        Self {
            table,
            ledger: GeneratedLedger::new(),
            groups: GroupTracker::disabled(),
            mouse_pressed: false,
            timeout,
        }
    }

    /// Use `groups` for layout group restoration
    pub fn with_group_tracker(mut self, groups: GroupTracker) -> Self {
        self.groups = groups;
        self
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn ledger(&self) -> &GeneratedLedger {
        &self.ledger
    }

    pub fn groups(&self) -> &GroupTracker {
        &self.groups
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn mouse_pressed(&self) -> bool {
        self.mouse_pressed
    }

    /// Run one observed event through the pipeline.
    ///
    /// `now` is the time the event is handled at; trigger press and
    /// release times are both taken from it.
    pub fn process_event<S: InputServer + ?Sized>(
        &mut self,
        event: InputEvent,
        now: Instant,
        server: &mut S,
    ) -> Result<Outcome, ServerError> {
        if let Some(code) = event.keycode() {
            if self.ledger.consume(code) {
                log::debug!("Ignoring generated event.");
                return Ok(Outcome::Echo);
            }
        }

        log::debug!("Intercepted {}", event);
        if server.refresh_mapping()? {
            log::debug!("Keyboard mapping changed, reloaded");
        }
        let sampled_group = self.groups.sample(server)?;

        match event.kind {
            EventKind::ButtonPress => self.mouse_pressed = true,
            EventKind::ButtonRelease => self.mouse_pressed = false,
            EventKind::KeyPress | EventKind::KeyRelease => {}
        }

        let taps = self.apply_rules(event, now, server)?;

        self.groups.observe(server, sampled_group)?;
        Ok(Outcome::Processed { taps })
    }

    /// Abandon every pending tap
    pub fn reset(&mut self) {
        self.table.reset_all();
        self.mouse_pressed = false;
    }

    fn apply_rules<S: InputServer + ?Sized>(
        &mut self,
        event: InputEvent,
        now: Instant,
        server: &mut S,
    ) -> Result<usize, ServerError> {
        let keysym = event
            .keycode()
            .filter(|_| self.table.rules().iter().any(|r| !r.trigger().is_keycode()))
            .map(|code| server.keysym_for_keycode(code))
            .unwrap_or(Keysym::NO_SYMBOL);

        let mut taps = 0;
        let Self {
            table,
            ledger,
            mouse_pressed,
            timeout,
            ..
        } = self;

        for rule in table.rules_mut() {
            let is_trigger = event
                .keycode()
                .is_some_and(|code| rule.trigger().matches(code, |_| keysym));

            if is_trigger {
                match event.kind.action() {
                    Action::Press => {
                        log::debug!("Key pressed!");
                        rule.press(now, *mouse_pressed);
                    }
                    Action::Release => {
                        log::debug!("Key released!");
                        if rule.release(now, *timeout) {
                            emit_substitutes(rule, ledger, server)?;
                            taps += 1;
                        }
                    }
                }
            } else if event.kind.is_press() {
                rule.mark_used();
            }
        }

        Ok(taps)
    }
}

/// Press every substitute in order, flush, then release them in the same
/// order and flush again, so multi-key sequences come out as a chord.
fn emit_substitutes<S: InputServer + ?Sized>(
    rule: &TapRule,
    ledger: &mut GeneratedLedger,
    server: &mut S,
) -> Result<(), ServerError> {
    for action in [Action::Press, Action::Release] {
        for &code in rule.substitutes() {
            if action.is_pressed() {
                log::debug!("Generating {}!", describe(code, &*server));
            }
            ledger.record(code);
            server.inject(code, action)?;
        }
        server.flush()?;
    }
    Ok(())
}

fn describe<S: InputServer + ?Sized>(code: KeyCode, server: &S) -> String {
    let keysym = server.keysym_for_keycode(code);
    format!("{} (key code {})", keysym, code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{KeyboardMapping, MemoryServer, ServerCall};
    use crate::Trigger;

    const CONTROL_L: KeyCode = KeyCode(37);
    const ESCAPE: KeyCode = KeyCode(9);
    const KEY_A: KeyCode = KeyCode(38);

    fn ctrl_to_escape() -> TapEngine {
        let table: MappingTable = [TapRule::new(Trigger::Keysym(Keysym(0xffe3)), [ESCAPE])]
            .into_iter()
            .collect();
        TapEngine::new(table, DEFAULT_TIMEOUT)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_tap_emits_press_then_release() {
        let mut engine = ctrl_to_escape();
        let mut server = MemoryServer::us_layout();
        let t0 = Instant::now();

        engine
            .process_event(InputEvent::key_press(CONTROL_L), t0, &mut server)
            .unwrap();
        let outcome = engine
            .process_event(InputEvent::key_release(CONTROL_L), t0 + ms(100), &mut server)
            .unwrap();

        assert_eq!(outcome, Outcome::Processed { taps: 1 });
        assert_eq!(
            server.calls(),
            &[
                ServerCall::Inject(ESCAPE, Action::Press),
                ServerCall::Flush,
                ServerCall::Inject(ESCAPE, Action::Release),
                ServerCall::Flush,
            ]
        );
        assert_eq!(engine.ledger().len(), 2);
    }

    #[test]
    fn test_intervening_key_press_disqualifies() {
        let mut engine = ctrl_to_escape();
        let mut server = MemoryServer::us_layout();
        let t0 = Instant::now();

        engine
            .process_event(InputEvent::key_press(CONTROL_L), t0, &mut server)
            .unwrap();
        engine
            .process_event(InputEvent::key_press(KEY_A), t0 + ms(50), &mut server)
            .unwrap();
        engine
            .process_event(InputEvent::key_release(CONTROL_L), t0 + ms(100), &mut server)
            .unwrap();

        assert!(server.injected().is_empty());
    }

    #[test]
    fn test_releases_do_not_disqualify() {
        let mut engine = ctrl_to_escape();
        let mut server = MemoryServer::us_layout();
        let t0 = Instant::now();

        engine
            .process_event(InputEvent::key_press(CONTROL_L), t0, &mut server)
            .unwrap();
        // A key that was already down when the trigger went down
        engine
            .process_event(InputEvent::key_release(KEY_A), t0 + ms(20), &mut server)
            .unwrap();
        engine
            .process_event(InputEvent::key_release(CONTROL_L), t0 + ms(40), &mut server)
            .unwrap();

        assert_eq!(server.injected().len(), 2);
    }

    #[test]
    fn test_mouse_state_tracking() {
        let mut engine = ctrl_to_escape();
        let mut server = MemoryServer::us_layout();
        let t0 = Instant::now();

        engine
            .process_event(InputEvent::button_press(1), t0, &mut server)
            .unwrap();
        assert!(engine.mouse_pressed());
        engine
            .process_event(InputEvent::button_release(1), t0, &mut server)
            .unwrap();
        assert!(!engine.mouse_pressed());
    }

    #[test]
    fn test_echo_skips_rules() {
        let mut engine = ctrl_to_escape();
        let mut server = MemoryServer::us_layout();
        let t0 = Instant::now();

        engine
            .process_event(InputEvent::key_press(CONTROL_L), t0, &mut server)
            .unwrap();
        engine
            .process_event(InputEvent::key_release(CONTROL_L), t0 + ms(10), &mut server)
            .unwrap();

        let echo = engine
            .process_event(InputEvent::key_press(ESCAPE), t0 + ms(11), &mut server)
            .unwrap();
        assert_eq!(echo, Outcome::Echo);
        assert_eq!(engine.ledger().len(), 1);
    }

    #[test]
    fn test_symbolic_trigger_follows_mapping_change() {
        let mut engine = ctrl_to_escape();
        let mut server = MemoryServer::us_layout();
        let t0 = Instant::now();

        // Control_L moved from keycode 37 to 66
        server.queue_mapping(KeyboardMapping::from_entries(&[
            (9, &[0xff1b]),
            (37, &[0xffe5]),
            (66, &[0xffe3]),
        ]));
        engine
            .process_event(InputEvent::key_press(KeyCode(66)), t0, &mut server)
            .unwrap();
        engine
            .process_event(InputEvent::key_release(KeyCode(66)), t0 + ms(50), &mut server)
            .unwrap();

        assert_eq!(
            server.injected(),
            vec![(ESCAPE, Action::Press), (ESCAPE, Action::Release)]
        );
    }

    #[test]
    fn test_reset_abandons_pending_tap() {
        let mut engine = ctrl_to_escape();
        let mut server = MemoryServer::us_layout();
        let t0 = Instant::now();

        engine
            .process_event(InputEvent::key_press(CONTROL_L), t0, &mut server)
            .unwrap();
        engine.reset();
        engine
            .process_event(InputEvent::key_release(CONTROL_L), t0 + ms(10), &mut server)
            .unwrap();

        assert!(server.injected().is_empty());
    }
}
