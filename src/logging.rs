//! Structured logging for the CLI and the HTTP server.
//!
//! Lines are compact and timestamped, filtered per target:
//!
//! ```toml
//! [logging]
//! default = "info"
//!
//! [logging.modules]
//! store = "debug"    # commit and search details
//! loader = "warn"
//! ```
//!
//! `RUST_LOG` takes precedence over the settings file:
//! ```bash
//! RUST_LOG=debug docseek serve
//! RUST_LOG=http=debug,store=trace docseek serve
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build the filter directive string from settings.
///
/// Unknown level names are passed through; `EnvFilter` ignores what it cannot parse.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.default.to_lowercase();
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    for (target, level) in modules {
        directives.push_str(&format!(",{target}={}", level.to_lowercase()));
    }
    directives
}

/// Initialize logging with configuration.
///
/// Only the first call takes effect. Output goes to stderr so that
/// JSON printed by CLI commands stays machine readable.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Log an event with handler context.
///
/// # Examples
/// ```ignore
/// log_event!("http", "listening", "{bind}");
/// log_event!("store", "reset");
/// ```
#[macro_export]
macro_rules! log_event {
    ($handler:expr, $event:expr) => {
        tracing::info!(target: $handler, "[{}] {}", $handler, $event)
    };
    ($handler:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!(target: $handler, "[{}] {}: {}", $handler, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
#[macro_export]
macro_rules! debug_event {
    ($handler:expr, $event:expr) => {
        tracing::debug!(target: $handler, "[{}] {}", $handler, $event)
    };
    ($handler:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!(target: $handler, "[{}] {}: {}", $handler, $event, format!($($arg)*))
    };
}
