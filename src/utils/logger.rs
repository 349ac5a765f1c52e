use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initialize logging.
///
/// Console logging honors `RUST_LOG`. When `MEDIAVAULT_DEBUG` is set, logs
/// are additionally written to a daily-rolled file under the app data dir.
pub fn init_logging() -> Option<WorkerGuard> {
    if std::env::var("MEDIAVAULT_DEBUG").is_ok() {
        let log_dir = dirs::data_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("mediavault");

        let _ = std::fs::create_dir_all(&log_dir);

        let file_appender = tracing_appender::rolling::daily(&log_dir, "mediavault.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .init();

        tracing::info!("mediavault file logging initialized");
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("mediavault=info")),
            )
            .with_writer(std::io::stderr)
            .init();
        None
    }
}
