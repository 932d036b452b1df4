// src/logging.rs
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise a build-dependent default is used.
/// `LOG_FORMAT=json` switches to JSON lines for log aggregation.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| default_directives().to_string());

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(cfg!(debug_assertions))
            .with_line_number(cfg!(debug_assertions))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!("🎬 video_repost {} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Log level: {}", log_level);

    Ok(())
}

fn default_directives() -> &'static str {
    if cfg!(debug_assertions) {
        "info,video_repost=debug,sqlx=warn,reqwest=warn,hyper=warn"
    } else {
        "info,video_repost=info,sqlx=warn,reqwest=warn,hyper=warn"
    }
}
