//! Staging area for atomic index updates.
//!
//! Documents are staged on an [`IndexTransaction`] and written together by
//! [`DocumentIndex::commit`](super::DocumentIndex::commit): either every
//! staged document becomes visible or none does.

use serde::Serialize;

use super::error::IndexResult;
use crate::identity::DocId;
use crate::loader::Document;

/// A batch of documents waiting to be committed.
#[derive(Debug, Default)]
pub struct IndexTransaction {
    staged: Vec<(DocId, Document)>,
    completed: bool,
}

impl IndexTransaction {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stage a document, returning the id it will be stored under.
    pub fn stage(&mut self, document: Document, external_id: Option<&str>) -> IndexResult<DocId> {
        let id = DocId::resolve(&document.content, external_id)?;
        self.staged.push((id.clone(), document));
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Ids in staging order, duplicates included.
    pub fn ids(&self) -> Vec<DocId> {
        self.staged.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Hand the staged documents to the committer, one per id.
    ///
    /// A later document with the same id replaces the earlier one but keeps
    /// its position.
    pub(crate) fn take_unique(&mut self) -> Vec<(DocId, Document)> {
        self.completed = true;
        let mut unique: Vec<(DocId, Document)> = Vec::with_capacity(self.staged.len());
        for (id, document) in self.staged.drain(..) {
            match unique.iter_mut().find(|(existing, _)| *existing == id) {
                Some(slot) => slot.1 = document,
                None => unique.push((id, document)),
            }
        }
        unique
    }
}

impl Drop for IndexTransaction {
    fn drop(&mut self) {
        if !self.completed && !self.staged.is_empty() {
            tracing::warn!(
                target: "store",
                "[store] transaction dropped with {} staged documents; nothing was written",
                self.staged.len()
            );
        }
    }
}

/// Outcome of a commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommitSummary {
    /// One id per staged document, in staging order.
    pub ids: Vec<DocId>,
    /// Ids that were not in the index before.
    pub inserted: usize,
    /// Ids whose previous record was replaced.
    pub replaced: usize,
}
