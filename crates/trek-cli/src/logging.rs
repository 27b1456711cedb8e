use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor the config names one.
fn default_directive(verbose: bool) -> &'static str {
    if verbose { "trek=debug" } else { "trek=info" }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`, which wins
/// over the verbosity default.
pub fn init(verbose: bool, json: bool, level: Option<&str>) {
    let fallback = match level {
        Some(level) if !verbose => level.to_string(),
        _ => default_directive(verbose).to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // A subscriber may already be set (e.g. by a test harness); keep it.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
