use std::path::Path;

use super::types::{LoadError, LoadResult};
use crate::utils::truncate_chars;

/// Extracted PDF text and whether it was cut at the character limit.
#[derive(Debug)]
pub struct PdfText {
    pub text: String,
    pub truncated: bool,
}

/// Extract the text of every page.
pub fn load_pdf(path: &Path, max_chars: usize) -> LoadResult<PdfText> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
    let text = extract_pdf_text(&bytes)?;
    Ok(limit_text(text, max_chars))
}

fn extract_pdf_text(bytes: &[u8]) -> LoadResult<String> {
    // pdf-extract panics on some malformed inputs
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(LoadError::Pdf(e.to_string())),
        Err(_) => Err(LoadError::Pdf("decoder panicked on malformed input".to_string())),
    }
}

pub(crate) fn limit_text(text: String, max_chars: usize) -> PdfText {
    let cut = truncate_chars(&text, max_chars).len();
    if cut < text.len() {
        let mut text = text;
        text.truncate(cut);
        PdfText {
            text,
            truncated: true,
        }
    } else {
        PdfText {
            text,
            truncated: false,
        }
    }
}
