//! File-based logging.
//!
//! The TUI owns the terminal, so logs go to `debate-timer.log` under the platform's local
//! data directory (`~/.local/share/debate-timer` on Linux). Set `DEBUG_LOGGING=1` for debug
//! output from this crate; `RUST_LOG` replaces the filter entirely.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "debate-timer.log";

/// Initialize logging. The returned guard must be held until exit so buffered lines are
/// flushed; `None` means logging is disabled.
pub fn init() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let debug_logging = std::env::var("DEBUG_LOGGING").is_ok();

    let Some(log_dir) = dirs::data_local_dir().map(|d| d.join("debate-timer")) else {
        eprintln!("No data directory available; logging disabled");
        return None;
    };
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        // Can't use tracing yet since subscriber not initialized
        eprintln!(
            "Failed to create log directory {:?}: {}, logging disabled",
            log_dir, e
        );
        return None;
    }

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug_logging {
            "info,debate_timer=debug"
        } else {
            "info"
        })
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(filter)
        .init();

    tracing::info!(
        log_file = ?log_dir.join(LOG_FILE),
        debug_logging,
        version = env!("CARGO_PKG_VERSION"),
        "logging initialized"
    );

    Some(guard)
}
