use tracing_subscriber::EnvFilter;

/// Installs the stderr log subscriber. `RUST_LOG`, when set, wins over the
/// configured filter. Calling it again is a no-op.
pub fn init(configured_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
