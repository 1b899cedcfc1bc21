//! Retrieval-augmented answers.
//!
//! Retrieves the closest documents for a question and renders them into a
//! prompt. No language model is called: [`StubAnswerGenerator`] returns a
//! fixed notice in place of a generated answer.

use serde::Serialize;

use crate::identity::DocId;
use crate::loader::Metadata;
use crate::store::{DocumentIndex, IndexResult, SearchHit, SearchRequest};
use crate::utils::truncate_chars;

/// Answer returned when retrieval finds nothing.
pub const NO_DOCUMENTS_ANSWER: &str = "Sorry, no documents relevant to the query were found.";

/// Default per-document context length in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

/// Produces an answer from a rendered prompt.
pub trait AnswerGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> String;
}

/// Stand-in generator used while no model is connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubAnswerGenerator;

impl AnswerGenerator for StubAnswerGenerator {
    fn generate(&self, _prompt: &str) -> String {
        "Based on the retrieved documents, the answer is:\n\n\
         No language model is connected, so this is a placeholder answer. \
         A deployment with a local model would generate the answer here."
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceDocument {
    pub id: DocId,
    pub content: String,
    pub metadata: Metadata,
    pub score: f32,
}

impl From<SearchHit> for SourceDocument {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            content: hit.content,
            metadata: hit.metadata,
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub source_documents: Vec<SourceDocument>,
    /// Prompt the answer was generated from; empty when nothing was retrieved.
    pub prompt: String,
}

/// Render the question and retrieved documents into a prompt.
pub fn build_prompt(question: &str, hits: &[SearchHit], max_context_chars: usize) -> String {
    let mut prompt =
        format!("Question: {question}\n\nAnswer using the following documents:\n\n");
    for (i, hit) in hits.iter().enumerate() {
        let content = truncate_chars(&hit.content, max_context_chars);
        prompt.push_str(&format!("Document {}:\n{content}\n\n", i + 1));
    }
    prompt
}

/// Retrieve up to `request.limit` documents and answer from them.
pub fn retrieve_answer(
    index: &DocumentIndex,
    request: &SearchRequest,
    generator: &dyn AnswerGenerator,
    max_context_chars: usize,
) -> IndexResult<AnswerResponse> {
    let hits = index.search(request)?;
    if hits.is_empty() {
        crate::debug_event!("store", "answer", "no documents for '{}'", request.query);
        return Ok(AnswerResponse {
            answer: NO_DOCUMENTS_ANSWER.to_string(),
            source_documents: Vec::new(),
            prompt: String::new(),
        });
    }

    let prompt = build_prompt(&request.query, &hits, max_context_chars);
    let answer = generator.generate(&prompt);
    Ok(AnswerResponse {
        answer,
        source_documents: hits.into_iter().map(SourceDocument::from).collect(),
        prompt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Document, DocumentKind};
    use crate::vector::HashingEmbedder;
    use tempfile::TempDir;

    fn hit(content: &str) -> SearchHit {
        SearchHit {
            id: DocId::from_content(content),
            content: content.to_string(),
            metadata: Metadata::new(),
            distance: 0.2,
            score: 0.8,
        }
    }

    #[test]
    fn test_build_prompt_layout() {
        let prompt = build_prompt("What is due?", &[hit("Invoice due May"), hit("Memo")], 100);
        assert_eq!(
            prompt,
            "Question: What is due?\n\nAnswer using the following documents:\n\n\
             Document 1:\nInvoice due May\n\nDocument 2:\nMemo\n\n"
        );
    }

    #[test]
    fn test_build_prompt_truncates_content() {
        let prompt = build_prompt("q", &[hit("abcdefgh")], 3);
        assert!(prompt.contains("Document 1:\nabc\n\n"));
        assert!(!prompt.contains("abcd"));
    }

    #[test]
    fn test_retrieve_answer_empty_index() {
        let temp_dir = TempDir::new().unwrap();
        let index = DocumentIndex::open(temp_dir.path(), Box::new(HashingEmbedder::default()))
            .unwrap();

        let response = retrieve_answer(
            &index,
            &SearchRequest::new("anything", 3),
            &StubAnswerGenerator,
            DEFAULT_MAX_CONTEXT_CHARS,
        )
        .unwrap();
        assert_eq!(response.answer, NO_DOCUMENTS_ANSWER);
        assert!(response.source_documents.is_empty());
        assert!(response.prompt.is_empty());
    }

    #[test]
    fn test_retrieve_answer_with_sources() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = DocumentIndex::open(temp_dir.path(), Box::new(HashingEmbedder::default()))
            .unwrap();
        let doc = Document::new(
            "quarterly revenue grew in the north region".to_string(),
            DocumentKind::Txt,
            Metadata::new(),
        );
        let id = index.add_document(doc, None).unwrap();

        let response = retrieve_answer(
            &index,
            &SearchRequest::new("quarterly revenue", 3),
            &StubAnswerGenerator,
            DEFAULT_MAX_CONTEXT_CHARS,
        )
        .unwrap();
        assert_eq!(response.source_documents.len(), 1);
        assert_eq!(response.source_documents[0].id, id);
        assert!(response.prompt.starts_with("Question: quarterly revenue"));
        assert!(response.prompt.contains("north region"));
        assert_eq!(response.answer, StubAnswerGenerator.generate(""));
    }
}
