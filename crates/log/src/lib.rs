//! Leveled logging for the ledger crates.
//!
//! Records go to stderr as text or JSON lines and, when enabled, into a
//! bounded in-memory ring that tests and status reporting can read back.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Error,
            2 => Self::Warn,
            4 => Self::Debug,
            5 => Self::Trace,
            _ => Self::Info,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Text = 0,
    Json = 1,
}

impl Format {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LogConfig {
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Text,
            timestamps: true,
        }
    }
}

/// A record retained by the capture ring.
#[derive(Clone, Debug)]
pub struct CapturedLog {
    pub ts_ms: u64,
    pub level: Level,
    pub target: &'static str,
    pub msg: String,
}

static LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static JSON_OUTPUT: AtomicBool = AtomicBool::new(false);
static TIMESTAMPS: AtomicBool = AtomicBool::new(true);
static STDERR_ENABLED: AtomicBool = AtomicBool::new(true);

static CAPTURE_ENABLED: AtomicBool = AtomicBool::new(false);
static CAPTURE_CAPACITY: AtomicUsize = AtomicUsize::new(0);
static CAPTURE: OnceLock<Mutex<VecDeque<CapturedLog>>> = OnceLock::new();

pub fn init(config: LogConfig) {
    LEVEL.store(config.level as u8, Ordering::Relaxed);
    JSON_OUTPUT.store(config.format == Format::Json, Ordering::Relaxed);
    TIMESTAMPS.store(config.timestamps, Ordering::Relaxed);
}

pub fn max_level() -> Level {
    Level::from_u8(LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: Level) -> bool {
    level as u8 <= LEVEL.load(Ordering::Relaxed)
}

pub fn set_stderr_enabled(enabled: bool) {
    STDERR_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn enable_capture(capacity: usize) {
    if capacity == 0 {
        disable_capture();
        return;
    }
    CAPTURE_CAPACITY.store(capacity, Ordering::Relaxed);
    CAPTURE.get_or_init(|| Mutex::new(VecDeque::with_capacity(capacity.min(1024))));
    CAPTURE_ENABLED.store(true, Ordering::Relaxed);
}

pub fn disable_capture() {
    CAPTURE_ENABLED.store(false, Ordering::Relaxed);
}

pub fn clear_captured_logs() {
    if let Some(ring) = CAPTURE.get() {
        if let Ok(mut guard) = ring.lock() {
            guard.clear();
        }
    }
}

/// Returns up to `limit` of the most recent captured records, oldest first.
pub fn capture_snapshot(limit: usize) -> Vec<CapturedLog> {
    let Some(ring) = CAPTURE.get() else {
        return Vec::new();
    };
    let Ok(guard) = ring.lock() else {
        return Vec::new();
    };
    let skip = guard.len().saturating_sub(limit);
    guard.iter().skip(skip).cloned().collect()
}

pub fn log(
    level: Level,
    target: &'static str,
    file: &'static str,
    line: u32,
    args: fmt::Arguments<'_>,
) {
    if !enabled(level) {
        return;
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let ts_ms = u64::try_from(now.as_millis()).unwrap_or(u64::MAX);
    let msg = args.to_string();

    if STDERR_ENABLED.load(Ordering::Relaxed) {
        let mut out = io::stderr().lock();
        if JSON_OUTPUT.load(Ordering::Relaxed) {
            let record = json!({
                "ts_ms": ts_ms,
                "level": level.as_str(),
                "target": target,
                "file": file,
                "line": line,
                "msg": msg,
            });
            let _ = writeln!(out, "{record}");
        } else if TIMESTAMPS.load(Ordering::Relaxed) {
            let stamp = UtcStamp::from_millis(ts_ms);
            let _ = writeln!(out, "{stamp} {} {target}: {msg}", level.as_str());
        } else {
            let _ = writeln!(out, "{} {target}: {msg}", level.as_str());
        }
    }

    if CAPTURE_ENABLED.load(Ordering::Relaxed) {
        push_captured(CapturedLog {
            ts_ms,
            level,
            target,
            msg,
        });
    }
}

fn push_captured(record: CapturedLog) {
    let Some(ring) = CAPTURE.get() else {
        return;
    };
    let Ok(mut guard) = ring.lock() else {
        return;
    };
    let capacity = CAPTURE_CAPACITY.load(Ordering::Relaxed);
    guard.push_back(record);
    while guard.len() > capacity {
        guard.pop_front();
    }
}

#[macro_export]
macro_rules! log_at {
    ($level:expr, $($arg:tt)*) => {{
        if $crate::enabled($level) {
            $crate::log($level, module_path!(), file!(), line!(), format_args!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Error, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Warn, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Info, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Debug, $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        $crate::log_at!($crate::Level::Trace, $($arg)*);
    }};
}

/// UTC wall-clock rendering without pulling in a calendar crate.
struct UtcStamp {
    year: i64,
    month: u32,
    day: u32,
    secs_of_day: u64,
    millis: u64,
}

impl UtcStamp {
    fn from_millis(ts_ms: u64) -> Self {
        let secs = ts_ms / 1_000;
        let days = (secs / 86_400) as i64;
        // Proleptic Gregorian conversion over 400-year eras.
        let shifted = days + 719_468;
        let era = shifted.div_euclid(146_097);
        let day_of_era = shifted.rem_euclid(146_097);
        let year_of_era =
            (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
        let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
        let month_index = (5 * day_of_year + 2) / 153;
        let day = (day_of_year - (153 * month_index + 2) / 5 + 1) as u32;
        let month = if month_index < 10 {
            month_index + 3
        } else {
            month_index - 9
        } as u32;
        let year = year_of_era + era * 400 + i64::from(month <= 2);
        Self {
            year,
            month,
            day,
            secs_of_day: secs % 86_400,
            millis: ts_ms % 1_000,
        }
    }
}

impl fmt::Display for UtcStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            self.year,
            self.month,
            self.day,
            self.secs_of_day / 3_600,
            (self.secs_of_day % 3_600) / 60,
            self.secs_of_day % 60,
            self.millis
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_and_format() {
        assert_eq!(Level::parse("warning"), Some(Level::Warn));
        assert_eq!(Level::parse("TRACE"), Some(Level::Trace));
        assert_eq!(Level::parse("loud"), None);
        assert_eq!(Format::parse("Json"), Some(Format::Json));
        assert_eq!(Format::parse("yaml"), None);
    }

    #[test]
    fn renders_utc_stamp() {
        assert_eq!(
            UtcStamp::from_millis(0).to_string(),
            "1970-01-01T00:00:00.000Z"
        );
        assert_eq!(
            UtcStamp::from_millis(1_700_000_000_123).to_string(),
            "2023-11-14T22:13:20.123Z"
        );
    }

    #[test]
    fn capture_ring_keeps_latest_records() {
        set_stderr_enabled(false);
        enable_capture(2);
        clear_captured_logs();
        log_warn!("first");
        log_warn!("second");
        log_warn!("third");
        let records = capture_snapshot(10);
        let messages: Vec<&str> = records.iter().map(|r| r.msg.as_str()).collect();
        assert_eq!(messages, vec!["second", "third"]);
        disable_capture();
    }
}
