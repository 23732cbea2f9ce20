use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the default level.
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
