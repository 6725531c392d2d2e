//! A logging implementation
//!
//! The core has no console of its own, so the boot entry supplies one: a [`Logger`] is built in
//! static memory around the console driver's write function and installed with [`init_logger`].
//!
//! ```
//! use globalos_core::logger::{self, Logger};
//!
//! fn console_write(args: core::fmt::Arguments<'_>) {
//!     std::println!("{args}");
//! }
//!
//! static LOGGER: Logger = Logger::new(console_write);
//!
//! logger::init_logger(&LOGGER, log::LevelFilter::Info);
//! log::info!("console online");
//! ```

use core::fmt;

/// A function which writes a single, already formatted, log line to the console.
pub type ConsoleWrite = fn(fmt::Arguments<'_>);

/// Initialize the logger.
///
/// This function should only be called once. Later calls leave the first logger in place.
pub fn init_logger(logger: &'static Logger, level: log::LevelFilter) {
    match log::set_logger(logger) {
        Ok(()) => (),
        Err(e) => {
            log::error!("Error initializing logger: {e}");
            return;
        }
    }
    log::set_max_level(level);
}

/// A logger which forwards every record to a console.
pub struct Logger {
    /// Where formatted lines go.
    write: ConsoleWrite,
}

impl Logger {
    /// Construct a logger around the given console write function.
    #[must_use]
    pub const fn new(write: ConsoleWrite) -> Self {
        Self { write }
    }
}

impl log::Log for Logger {
    fn log(&self, record: &log::Record) {
        (self.write)(format_args!(
            "{level:>8} - {source} - {args}",
            level = record.level(),
            source = SourceLogWriter {
                file: record.file(),
                line: record.line()
            },
            args = record.args(),
        ));
    }

    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn flush(&self) {
        // The console writes everything out immediately.
    }
}

struct SourceLogWriter<'a> {
    file: Option<&'a str>,
    line: Option<u32>,
}
impl fmt::Display for SourceLogWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self {
                file,
                line: Some(line),
            } => write!(f, "{}:{line}", file.unwrap_or("<unknown>")),
            Self {
                file: Some(file),
                line: None,
            } => f.write_str(file),
            Self {
                file: None,
                line: None,
            } => f.write_str("<unknown loc>"),
        }
    }
}
