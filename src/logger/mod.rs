/// Operator-facing line on stdout, stamped like the log lines
macro_rules! println_with_time {
    () => { println!(); };
    ($($arg:tt)*) => {
        println!("{} ~ {}", chrono::Local::now().format("%H:%M:%S"), format!($($arg)*))
    }
}

use std::fmt;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

/// Prefixes every line with the local wall-clock time, `13:45:02 ~`
struct ClockTime;

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{} ~", chrono::Local::now().format("%H:%M:%S"))
    }
}

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. Logs go to stderr so that commands
/// printing payloads on stdout can be piped. `RUST_LOG` wins over `-v`.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    // try_init: a subscriber may already be installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(ClockTime)
        .with_writer(std::io::stderr)
        .try_init();
}
