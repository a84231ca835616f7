//! Thin command API over the recorder and the playback engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, LevelFilter};
use regex::Regex;
use signal_hook::consts::{SIGINT, SIGTERM};

use crate::bus::NodeOptions;
use crate::playback::Playback;
use crate::record::Recorder;

/// Exit codes of the command surface.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Success = 0,
    FailedToOpen = 1,
    BadRegex = 2,
    InvalidVersion = 3,
}

impl From<CommandCode> for i32 {
    fn from(code: CommandCode) -> Self {
        code as i32
    }
}

/// Sets the global log threshold. Levels 0 through 4 map onto off, error,
/// warn, info, and debug.
pub fn verbosity(level: i32) -> CommandCode {
    let filter = match level {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => {
            eprintln!("invalid verbosity level");
            return CommandCode::InvalidVersion;
        }
    };
    log::set_max_level(filter);
    CommandCode::Success
}

/// Records topics whose names match `pattern` into `file` until the process
/// receives SIGINT or SIGTERM.
pub fn record_topics(file: &str, pattern: &str) -> CommandCode {
    let Ok(pattern) = Regex::new(pattern) else {
        error!("regex pattern is invalid");
        return CommandCode::BadRegex;
    };

    let recorder = Recorder::new(NodeOptions::default());
    if let Err(err) = recorder.add_topics_matching(&pattern) {
        error!("{err}");
    }
    if recorder.start(file).is_err() {
        return CommandCode::FailedToOpen;
    }

    wait_for_shutdown();
    debug!("shutting down");
    recorder.stop();
    CommandCode::Success
}

/// Replays `file`, limited to topics whose names match `pattern`, and
/// blocks until the replay finishes.
pub fn playback_topics(file: &str, pattern: &str) -> CommandCode {
    let Ok(pattern) = Regex::new(pattern) else {
        error!("regex pattern is invalid");
        return CommandCode::BadRegex;
    };

    let mut player = Playback::new(file, NodeOptions::default());
    if let Err(err) = player.add_topics_matching(&pattern) {
        error!("{err}");
    }
    let handle = match player.start(Duration::from_secs(1)) {
        Ok(handle) => handle,
        Err(_) => return CommandCode::FailedToOpen,
    };

    handle.wait_until_finished();
    debug!("shutting down");
    CommandCode::Success
}

fn wait_for_shutdown() {
    let term = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&term)) {
            error!("failed to register signal handler: {err}");
            return;
        }
    }
    while !term.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }
}
