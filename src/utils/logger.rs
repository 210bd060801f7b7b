use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE: &str = "sin.log";

fn filter(debug: bool) -> EnvFilter {
    let default = if debug { "sin=debug,info" } else { "sin=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// JSON lines are always appended to `<log_dir>/sin.log`; `debug` adds a
/// compact console layer on stderr.
pub fn init_cli_logger(debug: bool, log_dir: &Path) {
    let file_layer = std::fs::create_dir_all(log_dir)
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_dir.join(LOG_FILE))
        })
        .map_err(|e| eprintln!("⚠️  Cannot open log file in {}: {}", log_dir.display(), e))
        .ok()
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
        });

    let console_layer = debug.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter(debug))
        .with(file_layer)
        .with(console_layer)
        .init();
}
