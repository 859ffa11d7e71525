//! Logging setup for the CLI
//!
//! `RUST_LOG` takes precedence. Otherwise the filter comes from the
//! `[logging]` table of `.grove.toml`, and `--verbose` raises every grove
//! crate to `debug`.

use grove_core::config::LoggingSettings;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const GROVE_TARGETS: [&str; 6] = ["grove", "grove_core", "grove_index", "grove_cache", "grove_layout", "grove_server"];

/// Filter directive for the given settings and verbosity.
pub fn directive(settings: &LoggingSettings, verbose: bool) -> String {
    let mut directive = settings.filter_directive();
    if verbose {
        for target in GROVE_TARGETS {
            directive.push_str(&format!(",{target}=debug"));
        }
    }
    directive
}

pub fn init(settings: &LoggingSettings, verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(directive(settings, verbose))
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}
