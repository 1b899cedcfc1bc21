//! Tantivy schema for document records.

use tantivy::schema::{FAST, Field, STORED, STRING, Schema, SchemaBuilder};

/// Schema fields for document storage.
#[derive(Debug)]
pub struct DocumentSchema {
    /// Document id (content hash or external id), exact match.
    pub doc_id: Field,

    /// Slot of the document's vector in the current vector file.
    pub slot: Field,

    /// Source format ("pdf", "docx", ...).
    pub kind: Field,

    /// Full extracted text.
    pub content: Field,

    /// Metadata map serialized as JSON.
    pub metadata_json: Field,

    /// Timestamp when indexed (UTC seconds).
    pub indexed_at: Field,
}

impl DocumentSchema {
    pub fn build() -> (Schema, Self) {
        let mut builder = SchemaBuilder::default();

        let doc_id = builder.add_text_field("doc_id", STRING | STORED);
        let slot = builder.add_u64_field("slot", STORED);
        let kind = builder.add_text_field("kind", STRING | STORED);

        // Ranking is by vector only, so the text is stored but not indexed
        let content = builder.add_text_field("content", STORED);
        let metadata_json = builder.add_text_field("metadata_json", STORED);
        let indexed_at = builder.add_u64_field("indexed_at", STORED | FAST);

        let schema = builder.build();
        (
            schema,
            Self {
                doc_id,
                slot,
                kind,
                content,
                metadata_json,
                indexed_at,
            },
        )
    }
}
