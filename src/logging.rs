use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber on stderr.
///
/// `RUST_LOG` wins when set; otherwise `debug` with `verbose`, `warn` without.
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init();
}
