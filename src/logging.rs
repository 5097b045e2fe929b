use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "THEMESYNC_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global fmt subscriber. Later calls are no-ops.
pub fn init() {
    let result = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
    if result.is_ok() {
        tracing::debug!("logging initialised");
    }
}

fn env_filter() -> EnvFilter {
    [LOG_ENV, "RUST_LOG"]
        .into_iter()
        .find_map(|var| {
            let directive = std::env::var(var).ok()?;
            EnvFilter::try_new(directive).ok()
        })
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}
