use std::collections::HashMap;
use std::path::Path;

use super::ooxml::{self, CoreProperties, Package, XmlElement};
use super::types::{LoadResult, Metadata};

const SLIDE_PREFIX: &str = "ppt/slides/slide";
const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

/// Load a PowerPoint deck: per slide its title, body paragraphs and tables.
pub fn load_pptx(path: &Path) -> LoadResult<(String, Metadata)> {
    let mut package = ooxml::open_package(path)?;
    let props = CoreProperties::read(&mut package, path)?;

    let slide_parts = match listed_slide_parts(&mut package, path)? {
        Some(parts) => parts,
        None => slide_part_names(package.file_names()),
    };
    let mut slides = Vec::with_capacity(slide_parts.len());
    for (i, part) in slide_parts.iter().enumerate() {
        let xml = ooxml::read_part(&mut package, path, part)?;
        slides.push(render_slide(i + 1, &xml)?);
    }

    let mut metadata = Metadata::new();
    props.insert_into(&mut metadata, false);
    metadata.insert("num_slides".into(), slides.len().into());
    Ok((slides.join("\n\n\n"), metadata))
}

/// Slide parts in presentation order, `None` when the package has no
/// `presentation.xml` or no relationships for it.
fn listed_slide_parts(package: &mut Package, path: &Path) -> LoadResult<Option<Vec<String>>> {
    let Some(presentation) = ooxml::read_optional_part(package, path, PRESENTATION_PART)? else {
        return Ok(None);
    };
    let Some(rels) = ooxml::read_optional_part(package, path, PRESENTATION_RELS)? else {
        return Ok(None);
    };
    presentation_slide_order(&presentation, &rels).map(Some)
}

/// Resolve `p:sldIdLst` through the presentation relationships.
///
/// Slide parts the list does not reference are hidden from the deck and
/// left out.
pub(crate) fn presentation_slide_order(presentation: &str, rels: &str) -> LoadResult<Vec<String>> {
    let rels = ooxml::parse_xml(rels)?;
    let targets: HashMap<&str, &str> = rels
        .children_named("Relationship")
        .filter_map(|rel| Some((rel.attr("Id")?, rel.attr("Target")?)))
        .collect();

    let root = ooxml::parse_xml(presentation)?;
    let Some(list) = root.child("sldIdLst") else {
        return Ok(Vec::new());
    };
    Ok(list
        .children_named("sldId")
        .filter_map(|slide| slide.prefixed_attr("id"))
        .filter_map(|rel_id| targets.get(rel_id))
        .map(|target| part_name(target))
        .collect())
}

/// Package part name for a relationship target of `presentation.xml`.
fn part_name(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{target}"),
    }
}

/// Slide part names ordered by slide number.
pub(crate) fn slide_part_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut numbered: Vec<(u32, String)> = names
        .filter_map(|name| {
            let number = name.strip_prefix(SLIDE_PREFIX)?.strip_suffix(".xml")?;
            number.parse().ok().map(|n| (n, name.to_string()))
        })
        .collect();
    numbered.sort();
    numbered.into_iter().map(|(_, name)| name).collect()
}

pub(crate) fn render_slide(number: usize, xml: &str) -> LoadResult<String> {
    let root = ooxml::parse_xml(xml)?;
    let mut lines = vec![format!("[Slide {number}]")];

    let shapes = root.find_all("sp");
    let (titles, bodies): (Vec<&XmlElement>, Vec<&XmlElement>) =
        shapes.into_iter().partition(|shape| is_title(shape));

    if let Some(title) = titles.first() {
        lines.push(format!("Title: {}", text_frame_paragraphs(title).join("\n")));
    }

    for shape in bodies {
        lines.extend(
            text_frame_paragraphs(shape)
                .into_iter()
                .filter(|p| !p.trim().is_empty()),
        );
    }

    for table in root.find_all("tbl") {
        let rows: Vec<String> = table
            .children_named("tr")
            .enumerate()
            .map(|(i, row)| {
                let cells: Vec<String> = row
                    .children_named("tc")
                    .map(|cell| text_frame_paragraphs(cell).join("\n"))
                    .collect();
                format!("Row {}: {}", i + 1, cells.join("\t"))
            })
            .collect();
        lines.push(format!("[Table]\n{}", rows.join("\n")));
    }

    Ok(lines.join("\n"))
}

fn is_title(shape: &XmlElement) -> bool {
    shape
        .path(&["nvSpPr", "nvPr", "ph"])
        .and_then(|ph| ph.attr("type"))
        .is_some_and(|kind| kind == "title" || kind == "ctrTitle")
}

fn text_frame_paragraphs(container: &XmlElement) -> Vec<String> {
    container
        .child("txBody")
        .map(|body| body.children_named("p").map(ooxml::paragraph_text).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_order_is_numeric() {
        let names = [
            "ppt/slides/slide10.xml",
            "ppt/slides/_rels/slide1.xml.rels",
            "ppt/slides/slide2.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/slides/slide1.xml",
        ];
        assert_eq!(
            slide_part_names(names.into_iter()),
            vec![
                "ppt/slides/slide1.xml",
                "ppt/slides/slide2.xml",
                "ppt/slides/slide10.xml"
            ]
        );
    }

    #[test]
    fn test_presentation_order_follows_slide_list() {
        let presentation = r#"<p:presentation xmlns:p="urn:p" xmlns:r="urn:r">
            <p:sldIdLst>
                <p:sldId id="257" r:id="rId3"/>
                <p:sldId id="256" r:id="rId2"/>
            </p:sldIdLst>
        </p:presentation>"#;
        let rels = r#"<Relationships xmlns="urn:rels">
            <Relationship Id="rId1" Type="urn:slideMaster" Target="slideMasters/slideMaster1.xml"/>
            <Relationship Id="rId2" Type="urn:slide" Target="slides/slide1.xml"/>
            <Relationship Id="rId3" Type="urn:slide" Target="/ppt/slides/slide2.xml"/>
            <Relationship Id="rId4" Type="urn:slide" Target="slides/slide3.xml"/>
        </Relationships>"#;

        assert_eq!(
            presentation_slide_order(presentation, rels).unwrap(),
            vec!["ppt/slides/slide2.xml", "ppt/slides/slide1.xml"]
        );
    }

    #[test]
    fn test_presentation_without_slide_list_is_empty() {
        let presentation = r#"<p:presentation xmlns:p="urn:p"/>"#;
        let rels = r#"<Relationships xmlns="urn:rels"/>"#;
        assert!(presentation_slide_order(presentation, rels).unwrap().is_empty());
    }

    #[test]
    fn test_render_slide() {
        let xml = r#"<p:sld xmlns:p="urn:p" xmlns:a="urn:a"><p:cSld><p:spTree>
            <p:sp>
                <p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr>
                <p:txBody><a:p><a:r><a:t>Roadmap</a:t></a:r></a:p></p:txBody>
            </p:sp>
            <p:sp>
                <p:nvSpPr><p:cNvPr id="3" name="Body"/><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr>
                <p:txBody>
                    <a:p><a:r><a:t>Ship </a:t></a:r><a:r><a:t>v2</a:t></a:r></a:p>
                    <a:p/>
                    <a:p><a:r><a:t>Hire</a:t></a:r></a:p>
                </p:txBody>
            </p:sp>
            <p:graphicFrame><a:graphic><a:graphicData><a:tbl>
                <a:tr><a:tc><a:txBody><a:p><a:r><a:t>Q1</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:p><a:r><a:t>Q2</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
                <a:tr><a:tc><a:txBody><a:p><a:r><a:t>5</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:p><a:r><a:t>8</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
            </a:tbl></a:graphicData></a:graphic></p:graphicFrame>
        </p:spTree></p:cSld></p:sld>"#;

        assert_eq!(
            render_slide(3, xml).unwrap(),
            "[Slide 3]\nTitle: Roadmap\nShip v2\nHire\n[Table]\nRow 1: Q1\tQ2\nRow 2: 5\t8"
        );
    }
}
