use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Filter comes from `RUST_LOG`, default `info`.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
/// Calling this twice is harmless: the second install is ignored.
pub fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
