// Keycape CLI
// Daemon that makes modifier keys send other keys when tapped on X11

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use keycape_core::config::parse_mapping;
use keycape_core::{
    CliOverrides, GroupTracker, InputServer, KeyResolver, MappingTable, RecordStream, Session,
    Settings, SharedSession, TapEngine, Trigger, X11Server,
};

/// Tap/hold key substitution for X11
#[derive(Parser, Debug)]
#[command(name = "keycape")]
#[command(version)]
#[command(about = "Make modifier keys generate other keys when tapped", long_about = None)]
struct Args {
    /// Debug mode: log every decision and stay in the foreground
    #[arg(short, long)]
    debug: bool,

    /// Stay in the foreground instead of detaching
    #[arg(short, long)]
    foreground: bool,

    /// Mapping expression, e.g. 'Control_L=Escape;Shift_L=Shift_L|9'
    #[arg(short = 'e', long, value_name = "MAPPING")]
    expression: Option<String>,

    /// Tap timeout in milliseconds (default 500)
    #[arg(short, long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// TOML settings file (default: ~/.config/keycape/config.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Do not re-assert the keyboard layout group after each event
    #[arg(long)]
    no_group_tracking: bool,

    /// Print the resolved mapping and exit
    #[arg(long)]
    check_config: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            mapping: self.expression.clone(),
            timeout_ms: self.timeout,
            no_group_tracking: self.no_group_tracking,
        }
    }

    fn foreground(&self) -> bool {
        self.foreground || self.debug || self.check_config
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn print_rules(table: &MappingTable, server: &X11Server) {
    println!("{} mapping(s):", table.len());
    for rule in table.rules() {
        let trigger = match rule.trigger() {
            Trigger::Keysym(keysym) => keysym.to_string(),
            Trigger::Keycode(code) => {
                format!("{} ({})", rule.trigger(), server.keysym_for_keycode(code))
            }
        };
        let substitutes: Vec<String> = rule
            .substitutes()
            .iter()
            .map(|&code| format!("{} (#{})", server.keysym_for_keycode(code), code))
            .collect();
        println!("  {} = {}", trigger, substitutes.join(" | "));
    }
}

/// Detach from the terminal
fn daemonize() -> Result<(), std::io::Error> {
    // SAFETY: no other threads exist yet, and the child keeps every open
    // descriptor, including the X connections.
    if unsafe { libc::daemon(0, 0) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Stop `session` on the first signal delivered to `signals`
fn spawn_signal_waiter<S>(mut signals: Signals, session: SharedSession<S>) -> JoinHandle<()>
where
    S: InputServer + Send + 'static,
{
    thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            log::debug!("Caught signal {}!", signal);
            if let Err(e) = session.lock().stop() {
                log::error!("Failed to stop recording: {}", e);
            }
        }
    })
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(args.config.as_deref())?.merge_cli(&args.overrides())?;
    if let Some(path) = settings.source_path() {
        log::debug!("Settings loaded from {}", path.display());
    }

    let mut server = X11Server::connect()?;
    let table = parse_mapping(settings.mapping(), &server)?;

    if args.check_config {
        print_rules(&table, &server);
        return Ok(());
    }

    if !args.foreground() {
        daemonize()?;
    }

    let context = server.create_record_context()?;
    let groups = if settings.group_tracking() {
        GroupTracker::from_server(&mut server)?
    } else {
        GroupTracker::disabled()
    };
    let engine = TapEngine::new(table, settings.timeout()).with_group_tracker(groups);
    let session = Session::new(engine, server).shared();

    // Signals are queued from here on, but the waiter only starts once
    // recording is live so a stop cannot arrive before there is anything
    // to stop.
    let signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();
    let mut waiter = None;

    let stream = RecordStream::connect(context)?;
    let result = stream.run(
        || waiter = Some(spawn_signal_waiter(signals, Arc::clone(&session))),
        |event| session.lock().handle(event).map(|_| ()),
    );

    signals_handle.close();
    if let Some(waiter) = waiter {
        if waiter.join().is_err() {
            log::error!("Signal thread panicked");
        }
    }

    match Arc::try_unwrap(session) {
        Ok(session) => session.into_inner().into_server().free_record_context()?,
        Err(_) => log::warn!("Session still shared at exit; leaving context to the server"),
    }

    result?;
    log::debug!("Exiting");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
