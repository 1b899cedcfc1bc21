use calamine::{Data, Reader, open_workbook_auto};
use std::path::Path;

use super::types::{LoadError, LoadResult, Metadata};

/// Load every sheet of an xlsx/xls workbook as a tab-separated table.
///
/// A sheet that fails to decode is reported inline and does not fail the
/// workbook.
pub fn load_excel(path: &Path, max_rows: usize) -> LoadResult<(String, Metadata)> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| LoadError::Spreadsheet(e.to_string()))?;
    let sheet_names = workbook.sheet_names();

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in &sheet_names {
        let rendered = match workbook.worksheet_range(name) {
            Ok(range) => {
                let grid: Vec<Vec<Option<String>>> = range
                    .rows()
                    .take(max_rows.saturating_add(1))
                    .map(|row| row.iter().map(format_cell).collect())
                    .collect();
                render_sheet(name, &grid)
            }
            Err(e) => {
                tracing::error!(
                    target: "loader",
                    "[loader] failed to parse sheet '{name}' in {}: {e}",
                    path.display()
                );
                format!("[Sheet '{name}']\nParse error: {e}")
            }
        };
        sheets.push(rendered);
    }

    let mut metadata = Metadata::new();
    metadata.insert("sheet_names".into(), sheet_names.join(", ").into());
    metadata.insert("num_sheets".into(), sheet_names.len().into());
    Ok((sheets.join("\n\n\n"), metadata))
}

/// Cell text; `None` for empty cells.
fn format_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) if f.fract() == 0.0 => Some(format!("{f:.0}")),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Render one sheet from its cell grid. The first row is the header.
pub(crate) fn render_sheet(name: &str, grid: &[Vec<Option<String>>]) -> String {
    let Some((header, rows)) = grid.split_first() else {
        return format!("[Sheet '{name}']\nEmpty sheet");
    };
    if rows.is_empty() {
        return format!("[Sheet '{name}']\nEmpty sheet");
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let columns: Vec<String> = (0..width)
        .map(|i| match header.get(i) {
            Some(Some(label)) => label.clone(),
            _ => format!("Unnamed: {i}"),
        })
        .collect();

    let mut table = Vec::with_capacity(rows.len() + 1);
    table.push(format!("\t{}", columns.join("\t")));
    for (idx, row) in rows.iter().enumerate() {
        let cells: Vec<&str> = (0..width)
            .map(|i| match row.get(i) {
                Some(Some(value)) => value.as_str(),
                _ => "nan",
            })
            .collect();
        table.push(format!("{idx}\t{}", cells.join("\t")));
    }

    format!(
        "[Sheet '{name}']\nRows: {}\nColumns: {}\n\n{}",
        rows.len(),
        columns.join(", "),
        table.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_sheet_table() {
        let grid = vec![
            cells(&["Name", "Age", ""]),
            cells(&["Alice", "30", "x"]),
            cells(&["Bob", "", ""]),
        ];
        assert_eq!(
            render_sheet("People", &grid),
            "[Sheet 'People']\nRows: 2\nColumns: Name, Age, Unnamed: 2\n\n\
             \tName\tAge\tUnnamed: 2\n\
             0\tAlice\t30\tx\n\
             1\tBob\tnan\tnan"
        );
    }

    #[test]
    fn test_render_empty_sheets() {
        assert_eq!(render_sheet("Blank", &[]), "[Sheet 'Blank']\nEmpty sheet");
        let header_only = vec![cells(&["A", "B"])];
        assert_eq!(
            render_sheet("Header", &header_only),
            "[Sheet 'Header']\nEmpty sheet"
        );
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(&Data::Float(3.0)), Some("3".to_string()));
        assert_eq!(format_cell(&Data::Float(2.5)), Some("2.5".to_string()));
        assert_eq!(format_cell(&Data::Empty), None);
        assert_eq!(format_cell(&Data::Bool(true)), Some("true".to_string()));
    }

    #[test]
    fn test_invalid_workbook_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();
        assert!(matches!(
            load_excel(&path, 10),
            Err(LoadError::Spreadsheet(_))
        ));
    }
}
