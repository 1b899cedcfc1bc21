use std::path::Path;

use super::ooxml::{self, CoreProperties, XmlElement};
use super::types::{LoadResult, Metadata};

const DOCUMENT_PART: &str = "word/document.xml";

/// Load a Word document: numbered body paragraphs, then tables.
pub fn load_docx(path: &Path) -> LoadResult<(String, Metadata)> {
    let mut package = ooxml::open_package(path)?;
    let xml = ooxml::read_part(&mut package, path, DOCUMENT_PART)?;
    let props = CoreProperties::read(&mut package, path)?;

    let body = render_body(&xml)?;

    let mut metadata = Metadata::new();
    props.insert_into(&mut metadata, true);
    metadata.insert("num_paragraphs".into(), body.paragraphs.into());
    metadata.insert("num_tables".into(), body.tables.into());
    Ok((body.content, metadata))
}

pub(crate) struct RenderedBody {
    pub content: String,
    pub paragraphs: usize,
    pub tables: usize,
}

pub(crate) fn render_body(xml: &str) -> LoadResult<RenderedBody> {
    let root = ooxml::parse_xml(xml)?;
    let Some(body) = root.child("body") else {
        return Ok(RenderedBody {
            content: String::new(),
            paragraphs: 0,
            tables: 0,
        });
    };

    let mut blocks = Vec::new();

    // Empty paragraphs keep their position in the numbering
    let paragraphs: Vec<&XmlElement> = body.children_named("p").collect();
    for (i, paragraph) in paragraphs.iter().enumerate() {
        let text = ooxml::paragraph_text(paragraph);
        if !text.trim().is_empty() {
            blocks.push(format!("[Paragraph {}] {text}", i + 1));
        }
    }

    let tables: Vec<&XmlElement> = body.children_named("tbl").collect();
    for (i, table) in tables.iter().enumerate() {
        let rows: Vec<String> = table
            .children_named("tr")
            .map(|row| {
                row.children_named("tc")
                    .map(cell_text)
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect();
        blocks.push(format!("[Table {}]\n{}", i + 1, rows.join("\n")));
    }

    Ok(RenderedBody {
        content: blocks.join("\n\n"),
        paragraphs: paragraphs.len(),
        tables: tables.len(),
    })
}

fn cell_text(cell: &XmlElement) -> String {
    cell.children_named("p")
        .map(ooxml::paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}
