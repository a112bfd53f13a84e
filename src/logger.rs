//! Session log for fill activity.
//!
//! One file per run in the platform data directory (`FlowFill/flowfill.log`),
//! truncated by [`init`]. Lines look like
//!
//! ```text
//! [14:02:11.337] [WARN] [fill #3] Fill #ff0000ff at (4, 9) timed out after 50 ms
//! ```
//!
//! The `fill #N` scope is the session ticket of the request, so every line of
//! one accepted fill can be grepped out of an interleaved log. Until `init()`
//! runs (library use, tests) lines only reach stderr, and only with echo on.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

struct LogSink {
    file: Option<File>,
    path: Option<PathBuf>,
    /// Mirror lines to stderr (`--verbose`).
    echo: bool,
}

static SINK: Mutex<LogSink> = Mutex::new(LogSink {
    file: None,
    path: None,
    echo: false,
});

fn sink() -> std::sync::MutexGuard<'static, LogSink> {
    SINK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Path of the open session log, if `init()` succeeded.
pub fn log_path() -> Option<PathBuf> {
    sink().path.clone()
}

pub fn set_echo(enabled: bool) {
    sink().echo = enabled;
}

/// Log one message, optionally scoped to a fill ticket. Prefer the macros.
pub fn write(level: Level, ticket: Option<u64>, msg: &str) {
    let line = format_line(&timestamp(), level, ticket, msg);
    emit(&line);
}

fn emit(line: &str) {
    let mut sink = sink();
    if sink.echo {
        eprintln!("{}", line);
    }
    if let Some(file) = sink.file.as_mut() {
        let _ = writeln!(file, "{}", line);
    }
}

fn format_line(ts: &str, level: Level, ticket: Option<u64>, msg: &str) -> String {
    match ticket {
        Some(t) => format!("[{}] [{}] [fill #{}] {}", ts, level.tag(), t, msg),
        None => format!("[{}] [{}] {}", ts, level.tag(), msg),
    }
}

/// `log_info!("...")` or, inside a fill, `log_info!(fill = ticket; "...")`.
#[macro_export]
macro_rules! log_info {
    (fill = $ticket:expr; $($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, Some($ticket), &format!($($arg)*))
    };
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, None, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    (fill = $ticket:expr; $($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, Some($ticket), &format!($($arg)*))
    };
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, None, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    (fill = $ticket:expr; $($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, Some($ticket), &format!($($arg)*))
    };
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, None, &format!($($arg)*))
    };
}

/// Open (truncating) the session log and hook panics into it.
///
/// Worker panics are caught by the session and logged with their ticket; the
/// hook covers everything else, tagged with the panicking thread's name.
pub fn init() {
    let path = data_dir().join("FlowFill").join("flowfill.log");
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(file) => {
            let mut sink = sink();
            sink.file = Some(file);
            sink.path = Some(path.clone());
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    }

    let started = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    emit(&format!("=== FlowFill {} run started (unix {}) ===", env!("CARGO_PKG_VERSION"), started));

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let msg = format!("thread '{}': {}", thread.name().unwrap_or("<unnamed>"), info);
        write(Level::Panic, None, &msg);
        prev(info);
    }));
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// HH:MM:SS.mmm within the current UTC day.
fn timestamp() -> String {
    let Ok(d) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return "??:??:??.???".to_string();
    };
    let secs = d.as_secs() % 86_400;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60,
        d.subsec_millis()
    )
}
