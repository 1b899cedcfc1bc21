//! Content-addressed document index.
//!
//! Records live in tantivy, embeddings in an append-only mmap file. Each
//! record points at its vector through a slot number, and tantivy decides
//! which slots are live: a vector whose record was replaced or deleted is
//! never read again. Orphaned slots are reclaimed by [`DocumentIndex::compact`].
//!
//! Directory layout:
//! ```text
//! <collection>/
//!   manifest.json   embedding model and dimension
//!   tantivy/        record store
//!   vectors.bin     embeddings (vectors-<n>.bin after compaction)
//! ```
//!
//! Every tantivy commit carries the name of the vector file its slots refer
//! to as the commit payload.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{
    Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, Searcher, TantivyDocument,
    Term,
};

use super::error::{IndexError, IndexResult};
use super::filter::Filter;
use super::schema::DocumentSchema;
use super::transaction::{CommitSummary, IndexTransaction};
use crate::config::Settings;
use crate::identity::DocId;
use crate::loader::{Document, DocumentKind, Metadata};
use crate::utils::get_utc_timestamp;
use crate::vector::{
    EmbeddingGenerator, MmapVectorStorage, VectorError, cosine_similarity, embedder_from_settings,
};
use crate::{debug_event, log_event};

/// Default batch size for embedding generation.
/// Smaller batches reduce memory pressure.
pub const EMBEDDING_BATCH_SIZE: usize = 64;

const MANIFEST_FILE: &str = "manifest.json";
const VECTOR_FILE: &str = "vectors.bin";
const TANTIVY_DIR: &str = "tantivy";
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IndexManifest {
    version: u32,
    embedding_model: String,
    dimension: usize,
    created_at: u64,
}

/// Parameters of a similarity search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Text to embed and match.
    pub query: String,
    /// Maximum hits to return.
    pub limit: usize,
    /// Metadata constraint applied to candidates.
    pub filter: Option<Filter>,
    /// Hits scoring below this are dropped.
    pub min_score: f32,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            filter: None,
            min_score: 0.0,
        }
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: DocId,
    pub content: String,
    pub metadata: Metadata,
    /// Cosine distance, `1 - cosine similarity`.
    pub distance: f32,
    /// `max(0, 1 - distance)`.
    pub score: f32,
}

/// A record as stored in the index.
#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub id: DocId,
    #[serde(rename = "type")]
    pub kind: Option<DocumentKind>,
    pub content: String,
    pub metadata: Metadata,
    pub indexed_at: u64,
}

pub struct DocumentIndex {
    /// Collection directory.
    path: PathBuf,

    index: Index,

    /// Index reader for queries.
    reader: IndexReader,

    schema: DocumentSchema,

    /// Index writer (lazily created).
    writer: Mutex<Option<IndexWriter<TantivyDocument>>>,

    vectors: MmapVectorStorage,

    /// File name of `vectors` inside `path`.
    vector_file: String,

    embedder: Box<dyn EmbeddingGenerator>,

    /// Live document id to vector slot.
    live: HashMap<DocId, u32>,

    /// Tantivy heap size in bytes.
    heap_size: usize,

    #[cfg(test)]
    faults: Faults,
}

/// One-shot failures injected by unit tests.
#[cfg(test)]
#[derive(Debug, Default)]
struct Faults {
    write: AtomicBool,
    reload: AtomicBool,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("path", &self.path)
            .field("embedding_model", &self.embedder.model_name())
            .field("documents", &self.live.len())
            .field("vector_file", &self.vector_file)
            .field("vector_slots", &self.vectors.len())
            .finish()
    }
}

impl DocumentIndex {
    /// Open the collection named in the settings with the configured embedder.
    pub fn open_from_settings(settings: &Settings) -> IndexResult<Self> {
        let embedder = embedder_from_settings(&settings.semantic_search)?;
        Self::open(settings.collection_path(), embedder)
    }

    /// Create or open an index directory.
    ///
    /// Fails with [`IndexError::DimensionMismatch`] when the directory was
    /// built with an embedder of a different dimension.
    pub fn open(path: impl AsRef<Path>, embedder: Box<dyn EmbeddingGenerator>) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        Self::check_manifest(&path, embedder.as_ref())?;

        let tantivy_path = path.join(TANTIVY_DIR);
        std::fs::create_dir_all(&tantivy_path)?;

        let (tantivy_schema, schema) = DocumentSchema::build();
        let existing = tantivy_path.join("meta.json").exists();
        let index = if existing {
            Index::open_in_dir(&tantivy_path)?
        } else {
            let dir = MmapDirectory::open(&tantivy_path)?;
            Index::create(dir, tantivy_schema, IndexSettings::default())?
        };

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        if existing {
            reader.reload()?;
        }

        let vector_file = index
            .load_metas()?
            .payload
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| VECTOR_FILE.to_string());
        let vectors =
            MmapVectorStorage::open_or_create(path.join(&vector_file), embedder.dimension())?;

        let mut index = Self {
            path,
            index,
            reader,
            schema,
            writer: Mutex::new(None),
            vectors,
            vector_file,
            embedder,
            live: HashMap::new(),
            heap_size: 50_000_000, // 50MB default
            #[cfg(test)]
            faults: Faults::default(),
        };
        index.load_live_slots()?;

        // Orphans outnumber live slots
        if index.vectors.len() > 2 * index.live.len() {
            if let Err(e) = index.compact() {
                tracing::warn!(
                    target: "store",
                    "[store] compaction of {} failed: {e}",
                    index.path.display()
                );
            }
        }

        log_event!(
            "store",
            "opened",
            "{} ({} documents, model {})",
            index.path.display(),
            index.live.len(),
            index.embedder.model_name()
        );
        Ok(index)
    }

    fn check_manifest(path: &Path, embedder: &dyn EmbeddingGenerator) -> IndexResult<()> {
        let manifest_path = path.join(MANIFEST_FILE);
        if manifest_path.exists() {
            let manifest: IndexManifest =
                serde_json::from_str(&std::fs::read_to_string(&manifest_path)?)?;
            if manifest.dimension != embedder.dimension().get() {
                return Err(IndexError::DimensionMismatch {
                    path: path.display().to_string(),
                    index_model: manifest.embedding_model,
                    index_dimension: manifest.dimension,
                    dimension: embedder.dimension().get(),
                });
            }
            if manifest.embedding_model != embedder.model_name() {
                tracing::warn!(
                    target: "store",
                    "[store] index built with {} is opened with {}; scores may be meaningless",
                    manifest.embedding_model,
                    embedder.model_name()
                );
            }
            return Ok(());
        }

        let manifest = IndexManifest {
            version: MANIFEST_VERSION,
            embedding_model: embedder.model_name().to_string(),
            dimension: embedder.dimension().get(),
            created_at: get_utc_timestamp(),
        };
        std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
        Ok(())
    }

    fn load_live_slots(&mut self) -> IndexResult<()> {
        let searcher = self.reader.searcher();
        let addresses = searcher.search(&AllQuery, &DocSetCollector)?;
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            let id = doc.get_first(self.schema.doc_id).and_then(|v| v.as_str());
            let slot = doc.get_first(self.schema.slot).and_then(|v| v.as_u64());
            match (id, slot) {
                (Some(id), Some(slot)) if (slot as usize) < self.vectors.len() => {
                    self.live.insert(DocId::external(id)?, slot as u32);
                }
                _ => tracing::warn!(
                    target: "store",
                    "[store] skipping record without a valid vector slot in {}",
                    self.path.display()
                ),
            }
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of slots in the vector file, orphans included.
    pub fn vector_slots(&self) -> usize {
        self.vectors.len()
    }

    /// Start a transaction. Stage documents on it, then [`commit`](Self::commit).
    pub fn begin(&self) -> IndexTransaction {
        IndexTransaction::new()
    }

    /// Index one document in its own transaction.
    pub fn add_document(&mut self, document: Document, external_id: Option<&str>) -> IndexResult<DocId> {
        let mut txn = self.begin();
        let id = txn.stage(document, external_id)?;
        self.commit(txn)?;
        Ok(id)
    }

    /// Index documents in one transaction, ids in input order.
    pub fn add_documents(&mut self, documents: Vec<Document>) -> IndexResult<Vec<DocId>> {
        let mut txn = self.begin();
        for document in documents {
            txn.stage(document, None)?;
        }
        Ok(self.commit(txn)?.ids)
    }

    /// Write every staged document or none.
    ///
    /// Embeddings are computed before anything is written. A content-addressed
    /// document that is already live keeps its slot, since the same text
    /// embeds to the same vector. New vectors are appended and synced next;
    /// the tantivy commit then makes the records visible, replacing any
    /// record with the same id. If that commit fails the writer is rolled
    /// back and the vector file truncated.
    pub fn commit(&mut self, mut txn: IndexTransaction) -> IndexResult<CommitSummary> {
        let ids = txn.ids();
        let staged = txn.take_unique();
        if staged.is_empty() {
            return Ok(CommitSummary::default());
        }

        let mut slots: Vec<Option<u32>> = staged
            .iter()
            .map(|(id, doc)| match self.live.get(id) {
                Some(slot) if *id == DocId::from_content(&doc.content) => Some(*slot),
                _ => None,
            })
            .collect();
        let pending: Vec<usize> = (0..staged.len()).filter(|&i| slots[i].is_none()).collect();

        let mut embeddings = Vec::with_capacity(pending.len());
        for batch in pending.chunks(EMBEDDING_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|&i| staged[i].1.content.as_str()).collect();
            let batch_embeddings = self.embedder.generate_embeddings(&texts)?;
            if batch_embeddings.len() != texts.len() {
                return Err(VectorError::EmbeddingFailed(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    batch_embeddings.len()
                ))
                .into());
            }
            embeddings.extend(batch_embeddings);
        }

        let slots_before = self.vectors.len();
        if !embeddings.is_empty() {
            let appended = self.vectors.append_batch(&embeddings)?;
            for (&i, slot) in pending.iter().zip(appended) {
                slots[i] = Some(slot);
            }
        }

        let records: Vec<(&DocId, &Document, u32)> = staged
            .iter()
            .zip(slots)
            .filter_map(|((id, doc), slot)| slot.map(|slot| (id, doc, slot)))
            .collect();

        if let Err(e) = self.write_records(&records) {
            self.rollback_writer();
            if let Err(truncate_err) = self.vectors.truncate_to(slots_before) {
                tracing::error!(
                    target: "store",
                    "[store] failed to roll back vector file: {truncate_err}"
                );
            }
            return Err(e);
        }

        // The tantivy commit is durable from here on
        let mut inserted = 0;
        let mut replaced = 0;
        for (id, _, slot) in records {
            if self.live.insert(id.clone(), slot).is_some() {
                replaced += 1;
            } else {
                inserted += 1;
            }
        }
        self.refresh_reader();

        log_event!(
            "store",
            "commit",
            "{} documents ({inserted} new, {replaced} replaced, {} embedded)",
            ids.len(),
            pending.len()
        );
        Ok(CommitSummary {
            ids,
            inserted,
            replaced,
        })
    }

    fn write_records(&self, records: &[(&DocId, &Document, u32)]) -> IndexResult<()> {
        let mut writer_guard = self.writer.lock();
        let writer = self.ensure_writer(&mut writer_guard)?;
        let indexed_at = get_utc_timestamp();

        for (id, document, slot) in records {
            writer.delete_term(Term::from_field_text(self.schema.doc_id, id.as_str()));
            writer.add_document(self.record(
                id.as_str(),
                document.kind.as_str(),
                &document.content,
                &document.metadata,
                *slot,
                indexed_at,
            )?)?;
        }

        #[cfg(test)]
        if self.faults.write.swap(false, Ordering::SeqCst) {
            return Err(IndexError::Corrupt("injected write failure".to_string()));
        }

        self.commit_writer(writer, &self.vector_file)
    }

    fn record(
        &self,
        id: &str,
        kind: &str,
        content: &str,
        metadata: &Metadata,
        slot: u32,
        indexed_at: u64,
    ) -> IndexResult<TantivyDocument> {
        let mut doc = TantivyDocument::new();
        doc.add_text(self.schema.doc_id, id);
        doc.add_u64(self.schema.slot, u64::from(slot));
        doc.add_text(self.schema.kind, kind);
        doc.add_text(self.schema.content, content);
        doc.add_text(self.schema.metadata_json, serde_json::to_string(metadata)?);
        doc.add_u64(self.schema.indexed_at, indexed_at);
        Ok(doc)
    }

    /// Commit pending writer operations, naming the vector file they refer to.
    fn commit_writer(
        &self,
        writer: &mut IndexWriter<TantivyDocument>,
        vector_file: &str,
    ) -> IndexResult<()> {
        let mut prepared = writer.prepare_commit()?;
        prepared.set_payload(vector_file);
        prepared.commit()?;
        Ok(())
    }

    /// Reload the searcher after a commit.
    ///
    /// A failed reload leaves the previous searcher in place; the next commit
    /// retries it.
    fn refresh_reader(&self) {
        #[cfg(test)]
        if self.faults.reload.swap(false, Ordering::SeqCst) {
            tracing::warn!(target: "store", "[store] reader reload failed: injected");
            return;
        }
        if let Err(e) = self.reader.reload() {
            tracing::warn!(target: "store", "[store] reader reload failed: {e}");
        }
    }

    fn rollback_writer(&self) {
        let mut writer_guard = self.writer.lock();
        if let Some(writer) = writer_guard.as_mut() {
            if let Err(e) = writer.rollback() {
                tracing::error!(target: "store", "[store] writer rollback failed: {e}");
            }
        }
    }

    fn ensure_writer<'a>(
        &self,
        writer_guard: &'a mut Option<IndexWriter<TantivyDocument>>,
    ) -> IndexResult<&'a mut IndexWriter<TantivyDocument>> {
        let writer = match writer_guard.take() {
            Some(writer) => writer,
            None => self.index.writer(self.heap_size)?,
        };
        Ok(writer_guard.insert(writer))
    }

    /// Number of live documents.
    pub fn count(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }

    pub fn contains(&self, id: &DocId) -> bool {
        self.live.contains_key(id)
    }

    /// Fetch a stored document by id.
    pub fn get(&self, id: &str) -> IndexResult<Option<StoredDocument>> {
        let searcher = self.reader.searcher();
        self.fetch(&searcher, id)
    }

    fn fetch(&self, searcher: &Searcher, id: &str) -> IndexResult<Option<StoredDocument>> {
        let term = Term::from_field_text(self.schema.doc_id, id);
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;

        let Some((_score, address)) = top_docs.first() else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(*address)?;
        self.to_stored(&doc).map(Some)
    }

    fn to_stored(&self, doc: &TantivyDocument) -> IndexResult<StoredDocument> {
        let id = doc
            .get_first(self.schema.doc_id)
            .and_then(|v| v.as_str())
            .ok_or_else(|| IndexError::Corrupt("record without doc_id".to_string()))?;
        let content = doc
            .get_first(self.schema.content)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let metadata_json = doc
            .get_first(self.schema.metadata_json)
            .and_then(|v| v.as_str())
            .unwrap_or("{}");
        let kind = doc
            .get_first(self.schema.kind)
            .and_then(|v| v.as_str())
            .and_then(DocumentKind::from_extension);
        let indexed_at = doc
            .get_first(self.schema.indexed_at)
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Ok(StoredDocument {
            id: DocId::external(id)?,
            kind,
            content,
            metadata: serde_json::from_str(metadata_json)?,
            indexed_at,
        })
    }

    /// Remove a document. Returns whether it existed.
    pub fn delete(&mut self, id: &str) -> IndexResult<bool> {
        let Ok(doc_id) = DocId::external(id) else {
            return Ok(false);
        };
        if !self.live.contains_key(&doc_id) {
            return Ok(false);
        }

        {
            let mut writer_guard = self.writer.lock();
            let writer = self.ensure_writer(&mut writer_guard)?;
            writer.delete_term(Term::from_field_text(self.schema.doc_id, id));
            self.commit_writer(writer, &self.vector_file)?;
        }
        self.live.remove(&doc_id);
        self.refresh_reader();

        log_event!("store", "deleted", "{id}");
        Ok(true)
    }

    /// Remove every record and vector.
    pub fn reset(&mut self) -> IndexResult<()> {
        {
            let mut writer_guard = self.writer.lock();
            let writer = self.ensure_writer(&mut writer_guard)?;
            writer.delete_all_documents()?;
            self.commit_writer(writer, &self.vector_file)?;
        }
        self.live.clear();
        self.refresh_reader();
        self.vectors.clear()?;

        log_event!("store", "reset", "{}", self.path.display());
        Ok(())
    }

    /// Rewrite the vectors of live documents into a fresh file and drop the
    /// orphaned slots. Returns the number of slots reclaimed.
    ///
    /// The new file gets the next generation name, and the tantivy commit
    /// that repoints every record also names it, so an interrupted
    /// compaction leaves the previous generation in use.
    pub fn compact(&mut self) -> IndexResult<usize> {
        let orphans = self.vectors.len().saturating_sub(self.live.len());
        if orphans == 0 {
            return Ok(0);
        }

        let mut entries: Vec<(DocId, u32)> = self
            .live
            .iter()
            .map(|(id, slot)| (id.clone(), *slot))
            .collect();
        entries.sort_by_key(|(_, slot)| *slot);

        let searcher = self.reader.searcher();
        let mut vectors = Vec::with_capacity(entries.len());
        let mut stored = Vec::with_capacity(entries.len());
        for (id, slot) in &entries {
            let vector = self.vectors.read_vector(*slot).ok_or_else(|| {
                IndexError::Corrupt(format!("no vector in slot {slot} for {id}"))
            })?;
            let record = self
                .fetch(&searcher, id.as_str())?
                .ok_or_else(|| IndexError::Corrupt(format!("live document {id} has no record")))?;
            vectors.push(vector);
            stored.push(record);
        }

        let next_file = next_vector_file(&self.vector_file);
        let next_path = self.path.join(&next_file);
        let mut compacted = MmapVectorStorage::open_or_create(&next_path, self.embedder.dimension())?;
        compacted.clear()?;
        let slots: Vec<u32> = if vectors.is_empty() {
            Vec::new()
        } else {
            compacted.append_batch(&vectors)?.collect()
        };

        let written = self.repoint_records(&stored, &slots, &next_file);
        if let Err(e) = written {
            self.rollback_writer();
            drop(compacted);
            if let Err(remove_err) = std::fs::remove_file(&next_path) {
                tracing::warn!(
                    target: "store",
                    "[store] could not remove {}: {remove_err}",
                    next_path.display()
                );
            }
            return Err(e);
        }

        let previous = std::mem::replace(&mut self.vectors, compacted);
        let previous_path = previous.path().to_path_buf();
        drop(previous);
        self.vector_file = next_file;
        self.live = entries.into_iter().map(|(id, _)| id).zip(slots).collect();
        self.refresh_reader();

        if let Err(e) = std::fs::remove_file(&previous_path) {
            tracing::warn!(
                target: "store",
                "[store] could not remove {}: {e}",
                previous_path.display()
            );
        }

        log_event!(
            "store",
            "compacted",
            "{} ({orphans} slots reclaimed, {} live)",
            self.vector_file,
            self.live.len()
        );
        Ok(orphans)
    }

    fn repoint_records(
        &self,
        stored: &[StoredDocument],
        slots: &[u32],
        vector_file: &str,
    ) -> IndexResult<()> {
        let mut writer_guard = self.writer.lock();
        let writer = self.ensure_writer(&mut writer_guard)?;
        for (record, slot) in stored.iter().zip(slots) {
            writer.delete_term(Term::from_field_text(self.schema.doc_id, record.id.as_str()));
            writer.add_document(self.record(
                record.id.as_str(),
                record.kind.map_or("", |kind| kind.as_str()),
                &record.content,
                &record.metadata,
                *slot,
                record.indexed_at,
            )?)?;
        }
        self.commit_writer(writer, vector_file)
    }

    /// Rank live documents by cosine similarity to the query.
    ///
    /// Candidates are walked best first; the filter and score threshold
    /// apply before the limit. Equal scores are ordered by id.
    pub fn search(&self, request: &SearchRequest) -> IndexResult<Vec<SearchHit>> {
        if request.query.trim().is_empty() {
            return Err(IndexError::EmptyQuery);
        }
        if request.limit == 0 || self.live.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .generate_embeddings(&[request.query.as_str()])?
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::EmbeddingFailed("no query embedding".to_string()))?;

        let mut scored: Vec<(f32, &DocId)> = self
            .live
            .iter()
            .filter_map(|(id, slot)| {
                self.vectors
                    .read_vector(*slot)
                    .map(|vector| (cosine_similarity(&query_vec, &vector), id))
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let searcher = self.reader.searcher();
        let mut hits = Vec::with_capacity(request.limit.min(scored.len()));
        for (similarity, id) in scored {
            let distance = 1.0 - similarity;
            let score = (1.0 - distance).max(0.0);
            if score < request.min_score {
                break;
            }

            let Some(record) = self.fetch(&searcher, id.as_str())? else {
                continue;
            };
            if let Some(filter) = &request.filter {
                if !filter.matches(&record.metadata) {
                    continue;
                }
            }

            hits.push(SearchHit {
                id: record.id,
                content: record.content,
                metadata: record.metadata,
                distance,
                score,
            });
            if hits.len() >= request.limit {
                break;
            }
        }

        debug_event!(
            "store",
            "search",
            "'{}' -> {} hits (limit {})",
            request.query,
            hits.len(),
            request.limit
        );
        Ok(hits)
    }
}

/// Name of the vector file generation after `current`.
fn next_vector_file(current: &str) -> String {
    let generation = current
        .strip_prefix("vectors-")
        .and_then(|rest| rest.strip_suffix(".bin"))
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("vectors-{}.bin", generation + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{HashingEmbedder, VectorDimension};
    use tempfile::TempDir;

    fn open(dir: &Path) -> DocumentIndex {
        DocumentIndex::open(dir, Box::new(HashingEmbedder::default())).unwrap()
    }

    fn txt(content: &str) -> Document {
        Document::new(content.to_string(), DocumentKind::Txt, Metadata::new())
    }

    #[test]
    fn test_add_get_and_count() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path());
        assert_eq!(index.count(), 0);

        let id = index.add_document(txt("Budget planning for 2025"), None).unwrap();
        assert_eq!(id, DocId::from_content("Budget planning for 2025"));
        assert_eq!(index.count(), 1);

        let stored = index.get(id.as_str()).unwrap().unwrap();
        assert_eq!(stored.content, "Budget planning for 2025");
        assert_eq!(stored.kind, Some(DocumentKind::Txt));
        assert_eq!(stored.metadata["type"].as_str(), Some("txt"));
        assert!(index.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_same_content_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path());

        let first = index.add_document(txt("identical text"), None).unwrap();
        let second = index.add_document(txt("identical text"), None).unwrap();
        assert_eq!(first, second);
        assert_eq!(index.count(), 1);
    }

    #[test]
    fn test_commit_summary_counts_replacements() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path());
        index.add_document(txt("old version"), Some("report")).unwrap();

        let mut txn = index.begin();
        txn.stage(txt("new version"), Some("report")).unwrap();
        txn.stage(txt("fresh doc"), None).unwrap();
        let summary = index.commit(txn).unwrap();

        assert_eq!(summary.ids.len(), 2);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.replaced, 1);
        assert_eq!(index.count(), 2);
        assert_eq!(index.get("report").unwrap().unwrap().content, "new version");
    }

    #[test]
    fn test_search_ranks_and_limits() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path());
        index
            .add_documents(vec![
                txt("invoice payment terms and due dates"),
                txt("hiking trails in the mountains"),
                txt("payment schedule for the invoice"),
            ])
            .unwrap();

        let hits = index.search(&SearchRequest::new("invoice payment", 2)).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| h.content.contains("invoice")));
        for hit in &hits {
            assert!((hit.score - (1.0 - hit.distance).max(0.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_search_edge_cases() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path());
        assert!(index.search(&SearchRequest::new("anything", 3)).unwrap().is_empty());

        index.add_document(txt("some text"), None).unwrap();
        assert!(index.search(&SearchRequest::new("some", 0)).unwrap().is_empty());
        assert!(matches!(
            index.search(&SearchRequest::new("   ", 3)),
            Err(IndexError::EmptyQuery)
        ));
    }

    #[test]
    fn test_delete_and_reset() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path());
        let id = index.add_document(txt("to be removed"), None).unwrap();
        index.add_document(txt("to be kept"), None).unwrap();

        assert!(index.delete(id.as_str()).unwrap());
        assert!(!index.delete(id.as_str()).unwrap());
        assert_eq!(index.count(), 1);
        let hits = index.search(&SearchRequest::new("removed", 5)).unwrap();
        assert!(hits.iter().all(|h| h.id != id));

        index.reset().unwrap();
        assert_eq!(index.count(), 0);
        assert!(index.search(&SearchRequest::new("kept", 5)).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_restores_live_documents() {
        let temp_dir = TempDir::new().unwrap();
        let id = {
            let mut index = open(temp_dir.path());
            index.add_document(txt("persistent record"), None).unwrap()
        };

        let index = open(temp_dir.path());
        assert_eq!(index.count(), 1);
        assert!(index.contains(&id));
        let hits = index.search(&SearchRequest::new("persistent", 1)).unwrap();
        assert_eq!(hits[0].id, id);
    }

    #[test]
    fn test_dimension_mismatch_on_reopen() {
        let temp_dir = TempDir::new().unwrap();
        drop(open(temp_dir.path()));

        let small = HashingEmbedder::new(VectorDimension::new(16).unwrap());
        let result = DocumentIndex::open(temp_dir.path(), Box::new(small));
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_reindexing_same_content_reuses_vector_slot() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path());
        let vector_path = temp_dir.path().join(VECTOR_FILE);

        index.add_document(txt("unchanged file"), None).unwrap();
        let size = std::fs::metadata(&vector_path).unwrap().len();
        for _ in 0..4 {
            let summary = {
                let mut txn = index.begin();
                txn.stage(txt("unchanged file"), None).unwrap();
                index.commit(txn).unwrap()
            };
            assert_eq!(summary.replaced, 1);
        }

        assert_eq!(index.count(), 1);
        assert_eq!(index.vector_slots(), 1);
        assert_eq!(std::fs::metadata(&vector_path).unwrap().len(), size);
    }

    #[test]
    fn test_failed_write_rolls_back_vectors() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path());
        index.add_document(txt("already indexed"), None).unwrap();
        let slots_before = index.vector_slots();

        index.faults.write.store(true, Ordering::SeqCst);
        let mut txn = index.begin();
        let lost = txn.stage(txt("never written"), None).unwrap();
        txn.stage(txt("also never written"), None).unwrap();
        assert!(index.commit(txn).is_err());

        assert_eq!(index.vector_slots(), slots_before);
        assert_eq!(index.count(), 1);
        assert!(!index.contains(&lost));

        index.add_document(txt("written later"), None).unwrap();
        assert_eq!(index.count(), 2);
        assert_eq!(index.vector_slots(), slots_before + 1);
        assert!(index.get(lost.as_str()).unwrap().is_none());
    }

    #[test]
    fn test_reload_failure_keeps_commit_live() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = open(temp_dir.path());

        index.faults.reload.store(true, Ordering::SeqCst);
        let first = index.add_document(txt("committed before reload failed"), None).unwrap();
        assert!(index.contains(&first));

        index.add_document(txt("next commit reloads"), None).unwrap();
        assert_eq!(index.count(), 2);
        let hits = index
            .search(&SearchRequest::new("committed before reload failed", 2))
            .unwrap();
        assert!(hits.iter().any(|h| h.id == first));
    }

    #[test]
    fn test_compact_reclaims_orphan_slots() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut index = open(temp_dir.path());
            index.add_document(txt("draft one"), Some("report")).unwrap();
            index.add_document(txt("draft two"), Some("report")).unwrap();
            index.add_document(txt("final report"), Some("report")).unwrap();
            let other = index.add_document(txt("appendix tables"), None).unwrap();
            assert_eq!(index.vector_slots(), 4);

            assert_eq!(index.compact().unwrap(), 2);
            assert_eq!(index.compact().unwrap(), 0);
            assert_eq!(index.vector_slots(), 2);
            assert!(index.contains(&other));
            assert_eq!(index.get("report").unwrap().unwrap().content, "final report");
            let hits = index.search(&SearchRequest::new("final report", 1)).unwrap();
            assert_eq!(hits[0].id.as_str(), "report");
        }

        assert!(!temp_dir.path().join(VECTOR_FILE).exists());
        assert!(temp_dir.path().join("vectors-1.bin").exists());

        let mut index = open(temp_dir.path());
        assert_eq!(index.count(), 2);
        assert_eq!(index.vector_slots(), 2);
        index.add_document(txt("after compaction"), None).unwrap();
        let hits = index.search(&SearchRequest::new("after compaction", 1)).unwrap();
        assert_eq!(hits[0].content, "after compaction");
    }

    #[test]
    fn test_open_compacts_when_orphans_dominate() {
        let temp_dir = TempDir::new().unwrap();
        let kept = {
            let mut index = open(temp_dir.path());
            let ids = index
                .add_documents(vec![txt("alpha"), txt("beta"), txt("gamma")])
                .unwrap();
            index.delete(ids[0].as_str()).unwrap();
            index.delete(ids[1].as_str()).unwrap();
            ids[2].clone()
        };

        let index = open(temp_dir.path());
        assert_eq!(index.vector_slots(), 1);
        assert!(index.contains(&kept));
        let hits = index.search(&SearchRequest::new("gamma", 1)).unwrap();
        assert_eq!(hits[0].id, kept);
    }

    #[test]
    fn test_next_vector_file() {
        assert_eq!(next_vector_file("vectors.bin"), "vectors-1.bin");
        assert_eq!(next_vector_file("vectors-1.bin"), "vectors-2.bin");
        assert_eq!(next_vector_file("vectors-41.bin"), "vectors-42.bin");
    }
}
