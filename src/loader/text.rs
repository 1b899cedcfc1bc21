use std::path::Path;

use super::types::{LoadError, LoadResult};

const UTF8_BOM: &str = "\u{feff}";

/// Read a plain-text file, falling back to Latin-1 for non-UTF-8 bytes.
pub fn load_txt(path: &Path) -> LoadResult<String> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
    Ok(decode_text(&bytes, path))
}

pub(crate) fn decode_text(bytes: &[u8], path: &Path) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.strip_prefix(UTF8_BOM).unwrap_or(text).to_string(),
        Err(e) => {
            tracing::warn!(
                target: "loader",
                "[loader] {} is not valid UTF-8 ({e}), decoding as Latin-1",
                path.display()
            );
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}
