use crate::settings::LoggingSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`. Console output goes to stderr
/// so that tables and `--json` output on stdout stay clean. When a log directory
/// is configured the returned guard must be held for the lifetime of the program,
/// otherwise buffered file output is lost.
pub fn init_tracing(settings: &LoggingSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let registry = tracing_subscriber::registry().with(filter).with(console);

    match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "richacle.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_ansi(false).with_writer(writer);
            if registry.with(file).try_init().is_err() {
                tracing::debug!("Tracing subscriber already installed.");
            }
            Some(guard)
        }
        None => {
            if registry.try_init().is_err() {
                tracing::debug!("Tracing subscriber already installed.");
            }
            None
        }
    }
}
