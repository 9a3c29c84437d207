//! Naive CSV reader and writer.
//!
//! Lines are split on `\n` and fields on `,`. Quoted fields containing
//! commas or newlines are not supported.

use crate::error::{EnrichmentError, Result};
use crate::types::{Dataset, Row};
use tracing::debug;

/// Quote characters removed from every parsed field.
const QUOTE_CHARS: [char; 2] = ['"', '\''];

fn clean_field(raw: &str) -> String {
    raw.trim().replace(QUOTE_CHARS, "")
}

fn split_fields(line: &str) -> Vec<String> {
    line.split(',').map(clean_field).collect()
}

/// Parse CSV text into headers and rows.
///
/// Blank lines are discarded. The first remaining line is the header set.
/// Each following line is zipped against the headers: missing trailing
/// fields become `""`, surplus fields are dropped.
///
/// # Errors
///
/// Returns [`EnrichmentError::EmptyInput`] when no non-blank line remains.
pub fn parse(text: &str) -> Result<Dataset> {
    let mut lines = text.split('\n').filter(|line| !line.trim().is_empty());

    let header_line = lines.next().ok_or(EnrichmentError::EmptyInput)?;
    let headers = split_fields(header_line);

    let rows: Vec<Row> = lines
        .map(|line| {
            let mut values = split_fields(line).into_iter();
            headers
                .iter()
                .map(|header| (header.clone(), values.next().unwrap_or_default()))
                .collect()
        })
        .collect();

    debug!("Parsed CSV: {} columns, {} rows", headers.len(), rows.len());
    Ok(Dataset::new(headers, rows))
}

/// Serialize a dataset back to CSV text.
///
/// The header line is written as-is; every cell is wrapped in double quotes,
/// absent cells become `""`. Lines are joined with `\n`.
pub fn serialize(headers: &[String], rows: &[Row]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));

    for row in rows {
        let line = headers
            .iter()
            .map(|header| format!("\"{}\"", row.get(header).map(String::as_str).unwrap_or("")))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }

    lines.join("\n")
}

/// Validate and parse an uploaded file.
///
/// Rejects file names without a `.csv` suffix and header sets that lack
/// `identifier_column`. Nothing is returned on rejection, so callers never
/// observe a partially accepted upload.
pub fn load_upload(file_name: &str, text: &str, identifier_column: &str) -> Result<Dataset> {
    if !file_name.ends_with(".csv") {
        return Err(EnrichmentError::InvalidFileType(file_name.to_string()));
    }

    let dataset = parse(text)?;

    if !dataset.has_header(identifier_column) {
        return Err(EnrichmentError::MissingIdentifierColumn(
            identifier_column.to_string(),
        ));
    }

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header_names(dataset: &Dataset) -> Vec<&str> {
        dataset.headers.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_parse_headers_trimmed_and_unquoted() {
        let dataset = parse(" \"conversation_id\" , 'Alamat',Kecamatan \nc1,x,y").unwrap();
        assert_eq!(header_names(&dataset), vec!["conversation_id", "Alamat", "Kecamatan"]);
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let dataset = parse("\n\nid,alamat\n\n   \n1,Jl. A\n2,Jl. B\n\n").unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.cell(1, "alamat"), "Jl. B");
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(matches!(parse(""), Err(EnrichmentError::EmptyInput)));
        assert!(matches!(parse(" \n\t\n"), Err(EnrichmentError::EmptyInput)));
    }

    #[test]
    fn test_parse_pads_missing_and_drops_extra_fields() {
        let dataset = parse("a,b,c\n1\n1,2,3,4,5").unwrap();
        assert_eq!(dataset.cell(0, "a"), "1");
        assert_eq!(dataset.cell(0, "b"), "");
        assert_eq!(dataset.cell(0, "c"), "");
        assert_eq!(dataset.rows[1].len(), 3);
        assert_eq!(dataset.cell(1, "c"), "3");
    }

    #[test]
    fn test_parse_handles_crlf() {
        let dataset = parse("id,alamat\r\n1,Jl. Merdeka\r\n").unwrap();
        assert_eq!(header_names(&dataset), vec!["id", "alamat"]);
        assert_eq!(dataset.cell(0, "alamat"), "Jl. Merdeka");
    }

    #[test]
    fn test_parse_header_only() {
        let dataset = parse("conversation_id,alamat").unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.headers.len(), 2);
    }

    #[test]
    fn test_serialize_quotes_cells_in_header_order() {
        let dataset = parse("id,alamat,kecamatan\n1,Jl. A,Coblong\n2,Jl. B").unwrap();
        let text = serialize(&dataset.headers, &dataset.rows);
        assert_eq!(
            text,
            "id,alamat,kecamatan\n\"1\",\"Jl. A\",\"Coblong\"\n\"2\",\"Jl. B\",\"\""
        );
    }

    #[test]
    fn test_serialize_absent_cell_is_empty() {
        let headers = vec!["id".to_string(), "extra".to_string()];
        let mut row = Row::new();
        row.insert("id".to_string(), "9".to_string());
        assert_eq!(serialize(&headers, &[row]), "id,extra\n\"9\",\"\"");
    }

    #[test]
    fn test_round_trip_plain_values() {
        let text = "conversation_id,alamat,kecamatan,kelurahan\nc1,Jl. Dago 1,Coblong,Dago\nc2,Jl. Riau 5,,";
        let first = parse(text).unwrap();
        let again = parse(&serialize(&first.headers, &first.rows)).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_load_upload_rejects_non_csv_name() {
        let result = load_upload("data.xlsx", "conversation_id\n1", "conversation_id");
        assert!(matches!(result, Err(EnrichmentError::InvalidFileType(_))));
    }

    #[test]
    fn test_load_upload_requires_identifier() {
        let result = load_upload("data.csv", "id,alamat\n1,Jl. A", "conversation_id");
        assert!(matches!(
            result,
            Err(EnrichmentError::MissingIdentifierColumn(ref col)) if col == "conversation_id"
        ));
    }

    #[test]
    fn test_load_upload_accepts_valid_file() {
        let dataset = load_upload("data.csv", "conversation_id,alamat\n1,Jl. A", "conversation_id")
            .unwrap();
        assert_eq!(dataset.len(), 1);
    }
}
