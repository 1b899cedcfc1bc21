//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod documents;
pub mod index;
pub mod init;
pub mod search;
pub mod serve;

use crate::config::Settings;
use crate::store::DocumentIndex;

/// Open the configured index or exit with an error.
pub(crate) fn open_index(config: &Settings) -> DocumentIndex {
    match DocumentIndex::open_from_settings(config) {
        Ok(index) => index,
        Err(e) => {
            eprintln!(
                "Error: failed to open index at {}: {e}",
                config.collection_path().display()
            );
            std::process::exit(1);
        }
    }
}
