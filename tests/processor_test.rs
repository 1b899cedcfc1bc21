use docseek::processor::{DocumentProcessor, ProcessOutcome};
use docseek::store::{DocumentIndex, SearchRequest};
use docseek::vector::{EmbeddingGenerator, HashingEmbedder, VectorDimension, VectorError};
use std::fs;
use tempfile::TempDir;

fn open(dir: &std::path::Path) -> DocumentIndex {
    DocumentIndex::open(dir, Box::new(HashingEmbedder::default())).unwrap()
}

#[test]
fn test_process_file_stamps_file_metadata() {
    let index_dir = TempDir::new().unwrap();
    let docs_dir = TempDir::new().unwrap();
    let path = docs_dir.path().join("memo.txt");
    fs::write(&path, "Office closes early on Friday").unwrap();

    let mut index = open(index_dir.path());
    let mut processor = DocumentProcessor::new(&mut index);

    match processor.process_file(&path) {
        ProcessOutcome::Success { doc_id, document } => {
            assert_eq!(doc_id.as_str().len(), 64);
            assert_eq!(
                document.metadata["file_path"].as_str(),
                Some(path.display().to_string().as_str())
            );
            assert_eq!(document.metadata["file_size"].as_f64(), Some(29.0));
        }
        ProcessOutcome::Error { error, .. } => panic!("unexpected failure: {error}"),
    }
    assert_eq!(processor.document_count(), 1);
}

#[test]
fn test_process_named_file_records_given_name() {
    let index_dir = TempDir::new().unwrap();
    let docs_dir = TempDir::new().unwrap();
    let path = docs_dir.path().join("tmp123.txt");
    fs::write(&path, "uploaded content").unwrap();

    let mut index = open(index_dir.path());
    let mut processor = DocumentProcessor::new(&mut index);
    let outcome = processor.process_named_file(&path, "original.txt");

    let ProcessOutcome::Success { doc_id, .. } = outcome else {
        panic!("expected success");
    };
    let stored = index.get(doc_id.as_str()).unwrap().unwrap();
    assert_eq!(stored.metadata["file_path"].as_str(), Some("original.txt"));
}

#[test]
fn test_failures_become_error_outcomes() {
    let index_dir = TempDir::new().unwrap();
    let docs_dir = TempDir::new().unwrap();
    let image = docs_dir.path().join("scan.png");
    fs::write(&image, [1u8, 2, 3]).unwrap();

    let mut index = open(index_dir.path());
    let mut processor = DocumentProcessor::new(&mut index);

    let outcome = processor.process_file(&image);
    assert!(!outcome.is_success());
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "error");
    assert!(json["error"].as_str().unwrap().contains("scan.png"));

    let missing = processor.process_file(&docs_dir.path().join("missing.txt"));
    assert!(!missing.is_success());
    assert_eq!(processor.document_count(), 0);
}

#[test]
fn test_process_directory_in_path_order() {
    let index_dir = TempDir::new().unwrap();
    let docs_dir = TempDir::new().unwrap();
    fs::create_dir_all(docs_dir.path().join("nested")).unwrap();
    fs::write(docs_dir.path().join("b.txt"), "travel policy for contractors").unwrap();
    fs::write(docs_dir.path().join("a.txt"), "expense report guidelines").unwrap();
    fs::write(docs_dir.path().join("nested/c.TXT"), "security training schedule").unwrap();
    fs::write(docs_dir.path().join("empty.txt"), "   ").unwrap();
    fs::write(docs_dir.path().join("readme.md"), "not indexed").unwrap();

    let mut index = open(index_dir.path());
    let mut processor = DocumentProcessor::new(&mut index).with_batch_size(2);

    let mut progress = Vec::new();
    let outcomes = processor.process_directory_with_progress(docs_dir.path(), None, |done, total| {
        progress.push((done, total))
    });

    let labels: Vec<String> = outcomes
        .iter()
        .map(|outcome| match outcome {
            ProcessOutcome::Success { document, .. } => document.metadata["file_path"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            ProcessOutcome::Error { file_path, .. } => file_path.clone(),
        })
        .map(|label| {
            std::path::Path::new(&label)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    assert_eq!(labels, vec!["a.txt", "b.txt", "empty.txt", "c.TXT"]);
    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 3);
    assert!(!outcomes[2].is_success());
    assert_eq!(progress, vec![(2, 4), (4, 4)]);
    assert_eq!(processor.document_count(), 3);

    let hits = index.search(&SearchRequest::new("expense report", 1)).unwrap();
    assert!(hits[0].content.contains("expense"));
}

#[test]
fn test_process_directory_extension_filter() {
    let index_dir = TempDir::new().unwrap();
    let docs_dir = TempDir::new().unwrap();
    fs::write(docs_dir.path().join("keep.txt"), "kept document").unwrap();
    fs::write(docs_dir.path().join("skip.pdf"), "not really a pdf").unwrap();

    let mut index = open(index_dir.path());
    let mut processor = DocumentProcessor::new(&mut index);
    let extensions = vec!["TXT".to_string()];
    let outcomes = processor.process_directory(docs_dir.path(), Some(extensions.as_slice()));

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_success());
}

#[test]
fn test_reindexing_same_directory_is_idempotent() {
    let index_dir = TempDir::new().unwrap();
    let docs_dir = TempDir::new().unwrap();
    fs::write(docs_dir.path().join("one.txt"), "first file").unwrap();
    fs::write(docs_dir.path().join("two.txt"), "second file").unwrap();

    let mut index = open(index_dir.path());
    let mut processor = DocumentProcessor::new(&mut index);
    processor.process_directory(docs_dir.path(), None);
    processor.process_directory(docs_dir.path(), None);
    assert_eq!(processor.document_count(), 2);
    assert_eq!(index.vector_slots(), 2);
}

/// Embeds like [`HashingEmbedder`] but fails on any text containing "FAIL".
struct FlakyEmbedder(HashingEmbedder);

impl EmbeddingGenerator for FlakyEmbedder {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.iter().any(|t| t.contains("FAIL")) {
            return Err(VectorError::EmbeddingFailed("refused".to_string()));
        }
        self.0.generate_embeddings(texts)
    }

    fn dimension(&self) -> VectorDimension {
        self.0.dimension()
    }

    fn model_name(&self) -> &str {
        self.0.model_name()
    }
}

#[test]
fn test_failed_batch_commit_marks_every_staged_file() {
    let index_dir = TempDir::new().unwrap();
    let docs_dir = TempDir::new().unwrap();
    fs::write(docs_dir.path().join("a.txt"), "harmless notes").unwrap();
    fs::write(docs_dir.path().join("b.txt"), "this one will FAIL").unwrap();
    fs::write(docs_dir.path().join("c.txt"), "   ").unwrap();
    fs::write(docs_dir.path().join("d.txt"), "next batch commits").unwrap();

    let mut index = DocumentIndex::open(
        index_dir.path(),
        Box::new(FlakyEmbedder(HashingEmbedder::default())),
    )
    .unwrap();
    let mut processor = DocumentProcessor::new(&mut index).with_batch_size(3);
    let outcomes = processor.process_directory(docs_dir.path(), None);

    let errors: Vec<String> = outcomes
        .iter()
        .map(|outcome| match outcome {
            ProcessOutcome::Error { error, .. } => error.clone(),
            ProcessOutcome::Success { .. } => String::new(),
        })
        .collect();
    assert_eq!(outcomes.len(), 4);
    assert!(errors[0].contains("refused"), "a.txt: {}", errors[0]);
    assert!(errors[1].contains("refused"), "b.txt: {}", errors[1]);
    assert!(!errors[2].is_empty() && !errors[2].contains("refused"));
    assert!(outcomes[3].is_success());
    assert_eq!(processor.document_count(), 1);
}
