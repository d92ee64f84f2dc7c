use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// Honors `RUST_LOG` if set, otherwise defaults to `info` for this crate
/// family and `warn` for third-party deps to keep startup logs readable.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sentinel=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .ok();
}

/// Redact a secret-bearing string for log output. Call sites that format a
/// credential, API key, or webhook URL into a log line must route it
/// through this helper first.
pub fn redact(value: &str) -> String {
    if value.len() <= 8 {
        "***".to_string()
    } else {
        format!("{}***{}", &value[..4], &value[value.len() - 4..])
    }
}
