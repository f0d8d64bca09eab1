// =============================================================================
// A53 Boot - Console Logger
// =============================================================================
// `log` backend that prints records on the serial console.
// =============================================================================

use log::{LevelFilter, Log, Metadata, Record};

use crate::println;

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{:5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the console logger. The UART must already be initialized.
pub fn init(level: LevelFilter) {
    // Already installed: keep the existing logger
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
