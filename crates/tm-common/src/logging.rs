//! Tracing setup shared by the `tm-api` server and the `tm-runner` CLI.

use std::{panic, path::PathBuf, sync::OnceLock};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt::writer::BoxMakeWriter};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Route panics through `tracing` so they land in the same sink as the rest of the logs.
///
/// The default hook (stderr + backtrace) still runs when `TM_LOG_INCLUDE_BACKTRACE` is set.
/// Installed at most once per process.
pub fn install_tracing_panic_hook(app_name: &'static str) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let previous = panic::take_hook();
        let forward_to_default = env_flag("TM_LOG_INCLUDE_BACKTRACE");

        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()))
                .unwrap_or_else(|| "unknown".into());
            let payload = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".into());

            tracing::error!(
                application = app_name,
                thread = std::thread::current().name().unwrap_or("unnamed"),
                %location,
                panic_message = %payload,
                "panic captured"
            );

            if forward_to_default {
                previous(info);
            }
        }));
    });
}

fn daily_file_writer(app_name: &'static str) -> Option<BoxMakeWriter> {
    let dir = PathBuf::from(std::env::var_os("TM_LOG_DIR")?);
    if let Err(err) = std::fs::create_dir_all(&dir) {
        eprintln!("TM_LOG_DIR {} is not writable ({err}); logging to the console", dir.display());
        return None;
    }

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, format!("{app_name}.log")));
    let _ = FILE_GUARD.set(guard);
    Some(BoxMakeWriter::new(writer))
}

/// Where log lines go when `TM_LOG_DIR` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    /// Keeps stdout free for command output.
    Stderr,
}

impl ConsoleTarget {
    fn make_writer(self) -> BoxMakeWriter {
        match self {
            ConsoleTarget::Stdout => BoxMakeWriter::new(std::io::stdout),
            ConsoleTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

/// Install the global subscriber, logging to stdout unless `TM_LOG_DIR` is set.
pub fn init_tracing_subscriber(app_name: &'static str) {
    init_tracing_subscriber_to(app_name, ConsoleTarget::Stdout);
}

/// Install the global subscriber.
///
/// Filtering follows `RUST_LOG` (default `info`). With `TM_LOG_DIR` set, output goes to
/// `<TM_LOG_DIR>/<app>.log` rotated daily; otherwise to `console`. Calling twice is a no-op.
pub fn init_tracing_subscriber_to(app_name: &'static str, console: ConsoleTarget) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match daily_file_writer(app_name) {
        Some(writer) => {
            let _ = builder.with_writer(writer).with_ansi(false).try_init();
        }
        None => {
            let _ = builder.with_writer(console.make_writer()).try_init();
        }
    }
}
