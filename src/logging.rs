use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` filter (default `info`); JSON lines when `BEELINK_LOG_JSON=1`.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json_requested() {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .pretty()
            .with_writer(std::io::stderr)
            .try_init();
    }
}

fn json_requested() -> bool {
    std::env::var("BEELINK_LOG_JSON").map(|value| value == "1").unwrap_or(false)
}
