//! Serve command - HTTP API.

use crate::config::Settings;

/// Run the serve command.
pub async fn run(config: Settings, bind: Option<String>) {
    if let Err(e) = crate::http::serve_http(config, bind).await {
        eprintln!("HTTP server error: {e}");
        std::process::exit(1);
    }
}
