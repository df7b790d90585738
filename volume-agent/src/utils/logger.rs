//! Logging configuration using tracing.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the specified level.
///
/// `RUST_LOG` takes precedence over `level` when it is set.
pub fn init(level: &str, format: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()?,
        "text" => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        other => anyhow::bail!("unknown log format {other:?}, expected text or compact"),
    }

    Ok(())
}
