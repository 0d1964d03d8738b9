//! Level-filtered logging to a monthly log file and the terminal
//!
//! Logging is best-effort: a broken pipe or an unwritable log file must never affect the bot, so
//! every write failure is discarded.

use crate::config;
use chrono::{DateTime, Utc};
use serenity::all::Http;
use std::borrow::Cow;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, OnceLock};

const DEFAULT: &str = "\x1b[0m";
const FG_CYAN: &str = "\x1b[36m";
const FG_GRAY: &str = "\x1b[90m";
const FG_MAGENTA: &str = "\x1b[35m";
const FG_RED: &str = "\x1b[31m";
const FG_YELLOW: &str = "\x1b[33m";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Fatal = 0,
    Critical = 1,
    Error = 2,
    Warn = 3,
    Info = 4,
    Debug = 5,
}

impl Level {
    /// Minimum configured verbosity at which this level is written.
    pub fn verbosity(self) -> u8 {
        self as u8
    }

    pub fn letter(self) -> char {
        match self {
            Level::Fatal => 'F',
            Level::Critical => 'C',
            Level::Error => 'E',
            Level::Warn => 'W',
            Level::Info => 'I',
            Level::Debug => 'D',
        }
    }

    fn color(self) -> &'static str {
        match self {
            Level::Fatal | Level::Critical => FG_MAGENTA,
            Level::Error => FG_RED,
            Level::Warn => FG_YELLOW,
            Level::Info => FG_CYAN,
            Level::Debug => FG_GRAY,
        }
    }
}

/// Which sinks a log call wrote to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub file: bool,
    pub console: bool,
}

pub struct Logger {
    settings: config::Logging,
}

impl Logger {
    pub fn new(settings: config::Logging) -> Self {
        Self { settings }
    }

    /// Log files rotate by month: `<directory>/<YYYY>-<MM>-<file_name>`.
    pub fn file_path(&self, now: DateTime<Utc>) -> PathBuf {
        self.settings.directory.join(format!(
            "{}{}",
            now.format("%Y-%m-"),
            self.settings.file_name
        ))
    }

    pub fn format_line(now: DateTime<Utc>, level: Level, message: &str) -> String {
        format!(
            "[{}] [{}] {}",
            now.format("%Y-%m-%d %H:%M:%S%.6f"),
            level.letter(),
            message
        )
    }

    /// Whether a line at `level` would reach either sink
    pub fn enabled(&self, level: Level) -> bool {
        self.settings.file_level.max(self.settings.console_level) >= level.verbosity()
    }

    pub fn log(&self, level: Level, message: &str) -> Delivery {
        let now = Utc::now();
        let mut delivery = Delivery::default();

        if self.settings.file_level >= level.verbosity() {
            delivery.file = self
                .append_to_file(now, &Self::format_line(now, level, message))
                .is_ok();
        }

        if self.settings.console_level >= level.verbosity() {
            delivery.console = self.write_to_console(now, level, message).is_ok();
        }

        delivery
    }

    fn append_to_file(&self, now: DateTime<Utc>, line: &str) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path(now))?;
        writeln!(file, "{}", line)
    }

    fn write_to_console(
        &self,
        now: DateTime<Utc>,
        level: Level,
        message: &str,
    ) -> std::io::Result<()> {
        // Only print colors when printing to a terminal
        //
        // This won't change during the program's execution, so we can cache it.
        static STDOUT_IS_TERMINAL: LazyLock<bool> =
            LazyLock::new(|| std::io::stdout().is_terminal());

        let line = if *STDOUT_IS_TERMINAL {
            format!(
                "[{}] [{}{}{}] {}",
                now.format("%Y-%m-%d %H:%M:%S%.6f"),
                level.color(),
                level.letter(),
                DEFAULT,
                message
            )
        } else {
            Self::format_line(now, level, message)
        };

        if self.settings.errors_to_stderr && level <= Level::Warn {
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "{}", line)?;
            stderr.flush()
        } else {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", line)?;
            stdout.flush()
        }
    }
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Install the process-wide logger.  Only the first call has any effect.
pub fn init(settings: config::Logging) {
    if let Err(e) = std::fs::create_dir_all(&settings.directory) {
        eprintln!(
            "Could not create log directory `{}`: {}",
            settings.directory.to_string_lossy(),
            e
        );
    }
    let _ = LOGGER.set(Logger::new(settings));
}

fn logger() -> &'static Logger {
    LOGGER.get_or_init(|| Logger::new(config::Logging::default()))
}

/// Whether the global logger writes `level` anywhere
pub fn enabled(level: Level) -> bool {
    logger().enabled(level)
}

/// Used by the `log_*!` macros.  Falls back to default settings if `init` was never called.
pub fn emit(level: Level, message: &str) {
    logger().log(level, message);
}

#[macro_export]
macro_rules! log_at {
    ($level:expr, $($args:tt)+) => {{
        $crate::logging::emit($level, &format!($($args)+))
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($args:tt)+) => { $crate::log_at!($crate::logging::Level::Debug, $($args)+) };
}

#[macro_export]
macro_rules! log_info {
    ($($args:tt)+) => { $crate::log_at!($crate::logging::Level::Info, $($args)+) };
}

#[macro_export]
macro_rules! log_warn {
    ($($args:tt)+) => { $crate::log_at!($crate::logging::Level::Warn, $($args)+) };
}

#[macro_export]
macro_rules! log_error {
    ($($args:tt)+) => { $crate::log_at!($crate::logging::Level::Error, $($args)+) };
}

#[macro_export]
macro_rules! log_critical {
    ($($args:tt)+) => { $crate::log_at!($crate::logging::Level::Critical, $($args)+) };
}

#[macro_export]
macro_rules! log_fatal {
    ($($args:tt)+) => { $crate::log_at!($crate::logging::Level::Fatal, $($args)+) };
}

/// Human-readable names of Discord entities for log lines
#[serenity::async_trait]
pub trait LogName {
    async fn log_name(&self, http: &Arc<Http>) -> String;
}

#[serenity::async_trait]
impl LogName for serenity::all::UserId {
    async fn log_name(&self, http: &Arc<Http>) -> String {
        match self.to_user(http).await {
            Ok(user) => user.name,
            Err(_) => "<unknown-user>".to_owned(),
        }
    }
}

#[serenity::async_trait]
impl LogName for serenity::all::ChannelId {
    async fn log_name(&self, http: &Arc<Http>) -> String {
        match self.name(http).await {
            Ok(name) => name,
            Err(_) => "<unknown-channel>".to_owned(),
        }
    }
}

#[serenity::async_trait]
impl LogName for Option<serenity::all::ChannelId> {
    async fn log_name(&self, http: &Arc<Http>) -> String {
        match self {
            Some(channel_id) => channel_id.log_name(http).await,
            None => "<unknown-channel>".to_owned(),
        }
    }
}

#[serenity::async_trait]
impl LogName for Option<serenity::all::GuildId> {
    async fn log_name(&self, http: &Arc<Http>) -> String {
        let name = match self {
            Some(guild_id) => match guild_id.to_partial_guild(http).await {
                Ok(guild) => Cow::Owned(guild.name),
                Err(_) => Cow::Borrowed("<unknown-guild>"),
            },
            None => Cow::Borrowed("<direct-message>"),
        };

        name.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn logger_in(dir: &std::path::Path, file_level: u8, console_level: u8) -> Logger {
        Logger::new(config::Logging {
            directory: dir.to_path_buf(),
            file_name: "test.log".to_owned(),
            file_level,
            console_level,
            errors_to_stderr: false,
        })
    }

    #[test]
    fn line_format_carries_timestamp_and_level_letter() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 4, 5, 6).unwrap();
        assert_eq!(
            Logger::format_line(now, Level::Warn, "careful"),
            "[2024-03-09 04:05:06.000000] [W] careful"
        );
    }

    #[test]
    fn file_name_rotates_by_month() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger_in(dir.path(), 5, 0);
        let now = Utc.with_ymd_and_hms(2024, 11, 30, 23, 59, 59).unwrap();

        assert_eq!(logger.file_path(now), dir.path().join("2024-11-test.log"));
    }

    #[test]
    fn warning_below_file_threshold_skips_file_but_not_console() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger_in(dir.path(), 2, 5);

        let delivery = logger.log(Level::Warn, "volume parse failed");

        assert_eq!(
            delivery,
            Delivery {
                file: false,
                console: true
            }
        );
        assert!(!logger.file_path(Utc::now()).exists());
    }

    #[test]
    fn error_at_file_threshold_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger_in(dir.path(), 2, 0);

        let first = logger.log(Level::Error, "first");
        logger.log(Level::Fatal, "second");

        assert!(first.file);
        assert!(!first.console);
        let contents = std::fs::read_to_string(logger.file_path(Utc::now())).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[E] first"));
        assert!(lines[1].ends_with("[F] second"));
    }

    #[test]
    fn debug_is_enabled_when_either_sink_wants_it() {
        let dir = tempfile::tempdir().unwrap();

        assert!(!logger_in(dir.path(), 4, 4).enabled(Level::Debug));
        assert!(logger_in(dir.path(), 4, 4).enabled(Level::Info));
        assert!(logger_in(dir.path(), 5, 0).enabled(Level::Debug));
        assert!(logger_in(dir.path(), 0, 5).enabled(Level::Debug));
    }

    #[test]
    fn unwritable_log_file_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let logger = logger_in(&dir.path().join("missing").join("nested"), 5, 0);

        let delivery = logger.log(Level::Info, "nowhere to go");

        assert_eq!(delivery, Delivery::default());
    }
}
