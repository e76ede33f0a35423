//! File-based logging for the bridge.
//!
//! The bridge usually runs behind a pipe from the upstream source, so logs
//! go to daily-rotated files under `~/.tally/logs` instead of stderr. The
//! returned guard must stay alive for the process lifetime or buffered
//! lines are lost.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use tally_core::StorageConfig;

pub fn init() -> Option<WorkerGuard> {
    let logs_dir = StorageConfig::default().logs_dir();
    if fs_err::create_dir_all(&logs_dir).is_err() {
        // No log directory; fall back to stderr rather than staying silent.
        tracing_subscriber::fmt()
            .with_env_filter(default_filter())
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(logs_dir, "bridge.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
}
