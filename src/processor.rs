//! File and directory ingestion.
//!
//! Loads files, stamps file metadata and commits them to a [`DocumentIndex`].
//! Nothing here panics or propagates: every file ends as a [`ProcessOutcome`].

use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::identity::DocId;
use crate::loader::{Document, LoadError, LoaderOptions, load_file_with};
use crate::store::DocumentIndex;
use crate::{debug_event, log_event};

/// Extensions indexed when a directory walk names none.
pub const DEFAULT_EXTENSIONS: [&str; 6] = [".txt", ".pdf", ".docx", ".xlsx", ".xls", ".pptx"];

/// Result of processing one file.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessOutcome {
    Success { doc_id: DocId, document: Document },
    Error { file_path: String, error: String },
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Success { .. })
    }

    fn error(file_path: &str, error: impl ToString) -> Self {
        ProcessOutcome::Error {
            file_path: file_path.to_string(),
            error: error.to_string(),
        }
    }
}

pub struct DocumentProcessor<'a> {
    index: &'a mut DocumentIndex,
    options: LoaderOptions,
    batch_size: usize,
    threads: usize,
}

impl<'a> DocumentProcessor<'a> {
    pub fn new(index: &'a mut DocumentIndex) -> Self {
        Self {
            index,
            options: LoaderOptions::default(),
            batch_size: 64,
            threads: num_cpus::get(),
        }
    }

    pub fn from_settings(index: &'a mut DocumentIndex, settings: &Settings) -> Self {
        Self {
            index,
            options: LoaderOptions::from(&settings.loader),
            batch_size: settings.indexing.batch_size.max(1),
            threads: settings.indexing.parallel_threads.max(1),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Load, stamp and commit one file.
    pub fn process_file(&mut self, path: &Path) -> ProcessOutcome {
        let label = path.display().to_string();
        self.process_named_file(path, &label)
    }

    /// Like [`process_file`](Self::process_file), recording `file_name` as
    /// the document's `file_path` (used for uploads stored under a temp name).
    pub fn process_named_file(&mut self, path: &Path, file_name: &str) -> ProcessOutcome {
        let document = match prepare(path, file_name, &self.options) {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(target: "processor", "[processor] {file_name}: {e}");
                return ProcessOutcome::error(file_name, e);
            }
        };

        match self.index.add_document(document.clone(), None) {
            Ok(doc_id) => {
                log_event!("processor", "indexed", "{file_name} as {doc_id}");
                ProcessOutcome::Success { doc_id, document }
            }
            Err(e) => {
                tracing::error!(target: "processor", "[processor] failed to index {file_name}: {e}");
                ProcessOutcome::error(file_name, e)
            }
        }
    }

    /// Index every matching file below `dir`.
    pub fn process_directory(
        &mut self,
        dir: &Path,
        extensions: Option<&[String]>,
    ) -> Vec<ProcessOutcome> {
        self.process_directory_with_progress(dir, extensions, |_, _| {})
    }

    /// Index a directory, reporting `(done, total)` after every batch.
    ///
    /// Files load in parallel; each batch commits in one transaction and
    /// outcomes come back in path order.
    pub fn process_directory_with_progress<F>(
        &mut self,
        dir: &Path,
        extensions: Option<&[String]>,
        mut on_progress: F,
    ) -> Vec<ProcessOutcome>
    where
        F: FnMut(usize, usize),
    {
        let extensions = normalize_extensions(extensions);
        let files = collect_files(dir, &extensions);
        let total = files.len();
        log_event!("processor", "directory", "{}: {total} files", dir.display());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| tracing::warn!(target: "processor", "[processor] using global pool: {e}"))
            .ok();

        let mut outcomes = Vec::with_capacity(total);
        for batch in files.chunks(self.batch_size) {
            let options = &self.options;
            let load = || -> Vec<(String, Result<Document, LoadError>)> {
                batch
                    .par_iter()
                    .map(|path| {
                        let label = path.display().to_string();
                        let loaded = prepare(path, &label, options);
                        (label, loaded)
                    })
                    .collect()
            };
            let loaded = match &pool {
                Some(pool) => pool.install(load),
                None => load(),
            };

            outcomes.extend(self.commit_batch(loaded));
            on_progress(outcomes.len(), total);
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        log_event!(
            "processor",
            "directory done",
            "{} processed, {failed} failed",
            outcomes.len()
        );
        outcomes
    }

    fn commit_batch(
        &mut self,
        loaded: Vec<(String, Result<Document, LoadError>)>,
    ) -> Vec<ProcessOutcome> {
        let mut txn = self.index.begin();
        // Position in `loaded` of each staged document
        let mut staged = Vec::new();
        let mut outcomes: Vec<Option<ProcessOutcome>> = Vec::with_capacity(loaded.len());

        for (label, result) in &loaded {
            match result {
                Ok(document) => match txn.stage(document.clone(), None) {
                    Ok(_) => {
                        staged.push(outcomes.len());
                        outcomes.push(None);
                    }
                    Err(e) => outcomes.push(Some(ProcessOutcome::error(label, e))),
                },
                Err(e) => {
                    tracing::error!(target: "processor", "[processor] {label}: {e}");
                    outcomes.push(Some(ProcessOutcome::error(label, e)));
                }
            }
        }

        match self.index.commit(txn) {
            Ok(summary) => {
                for (position, doc_id) in staged.iter().zip(summary.ids) {
                    if let (label, Ok(document)) = &loaded[*position] {
                        debug_event!("processor", "indexed", "{label} as {doc_id}");
                        outcomes[*position] = Some(ProcessOutcome::Success {
                            doc_id,
                            document: document.clone(),
                        });
                    }
                }
            }
            Err(e) => {
                tracing::error!(target: "processor", "[processor] batch commit failed: {e}");
                for position in &staged {
                    outcomes[*position] = Some(ProcessOutcome::error(&loaded[*position].0, &e));
                }
            }
        }

        outcomes
            .into_iter()
            .zip(loaded)
            .map(|(outcome, (label, _))| {
                outcome.unwrap_or_else(|| ProcessOutcome::error(&label, "document was not committed"))
            })
            .collect()
    }

    pub fn document_count(&self) -> usize {
        self.index.count()
    }
}

/// Load a file and add `file_path` and `file_size` metadata.
fn prepare(path: &Path, file_name: &str, options: &LoaderOptions) -> Result<Document, LoadError> {
    let mut document = load_file_with(path, options)?;
    let size = std::fs::metadata(path)
        .map_err(|e| LoadError::io(path, e))?
        .len();
    document.set_meta("file_path", file_name);
    document.set_meta("file_size", size);
    Ok(document)
}

/// Lower-cased extensions without the leading dot.
fn normalize_extensions(extensions: Option<&[String]>) -> Vec<String> {
    match extensions {
        Some(exts) if !exts.is_empty() => exts
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect(),
        _ => DEFAULT_EXTENSIONS
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect(),
    }
}

/// Files below `dir` with a matching extension, sorted by path.
fn collect_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(target: "processor", "[processor] skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extensions() {
        let given = vec![".PDF".to_string(), "txt".to_string(), " ".to_string()];
        assert_eq!(normalize_extensions(Some(given.as_slice())), vec!["pdf", "txt"]);
        assert_eq!(normalize_extensions(None).len(), 6);
        assert_eq!(normalize_extensions(Some(&[][..])).len(), 6);
    }

    #[test]
    fn test_collect_files_is_sorted_and_filtered() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.TXT"), "a").unwrap();
        std::fs::write(dir.path().join("sub/c.txt"), "c").unwrap();
        std::fs::write(dir.path().join("skip.md"), "m").unwrap();

        let files = collect_files(dir.path(), &["txt".to_string()]);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.TXT", "b.txt", "sub/c.txt"]);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ProcessOutcome::error("x.png", "Unsupported file type: x.png");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["file_path"], "x.png");
    }
}
