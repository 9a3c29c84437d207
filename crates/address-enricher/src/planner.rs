//! Batch planning.
//!
//! Rows with a usable address are chunked, in original order, into
//! consecutive batches numbered from 1. Rows with a blank address are left
//! out entirely; they are neither enriched nor reported as failed.

use crate::types::{AddressRecord, Batch, ColumnMapping, Row};

/// True when the row's address cell is present and non-blank.
pub fn has_address(row: &Row, mapping: &ColumnMapping) -> bool {
    row.get(&mapping.address)
        .is_some_and(|address| !address.trim().is_empty())
}

/// Rows eligible for enrichment, in original order.
pub fn eligible_records(
    rows: &[Row],
    mapping: &ColumnMapping,
    identifier_column: &str,
) -> Vec<AddressRecord> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| has_address(row, mapping))
        .map(|(row_index, row)| AddressRecord {
            row_index,
            id: row.get(identifier_column).cloned().unwrap_or_default(),
            address: row.get(&mapping.address).cloned().unwrap_or_default(),
        })
        .collect()
}

/// Partition eligible rows into batches of at most `batch_size`.
///
/// A `batch_size` of zero is treated as one.
pub fn plan(
    rows: &[Row],
    mapping: &ColumnMapping,
    identifier_column: &str,
    batch_size: usize,
) -> Vec<Batch> {
    eligible_records(rows, mapping, identifier_column)
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(i, chunk)| Batch::new(i + 1, chunk.to_vec()))
        .collect()
}

/// Number of batches `eligible` rows produce at `batch_size`.
pub fn batch_count(eligible: usize, batch_size: usize) -> usize {
    eligible.div_ceil(batch_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BatchStatus;
    use pretty_assertions::assert_eq;

    fn mapping() -> ColumnMapping {
        ColumnMapping::new("alamat", "kecamatan", "kelurahan")
    }

    fn row(id: &str, address: &str) -> Row {
        let mut row = Row::new();
        row.insert("conversation_id".to_string(), id.to_string());
        row.insert("alamat".to_string(), address.to_string());
        row
    }

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| row(&format!("c{}", i), &format!("Jl. Nomor {}", i))).collect()
    }

    #[test]
    fn test_twenty_five_rows_make_three_batches() {
        let batches = plan(&rows(25), &mapping(), "conversation_id", 10);
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        let indices: Vec<usize> = batches.iter().map(|b| b.index).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(batches.iter().all(|b| b.status == BatchStatus::Pending));
    }

    #[test]
    fn test_blank_addresses_are_excluded() {
        let mut no_address = Row::new();
        no_address.insert("conversation_id".to_string(), "e".to_string());
        let input = vec![
            row("a", "Jl. A"),
            row("b", "   "),
            row("c", ""),
            row("d", "Jl. D"),
            no_address,
        ];

        let batches = plan(&input, &mapping(), "conversation_id", 10);
        assert_eq!(batches.len(), 1);
        let ids: Vec<&str> = batches[0].records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(batches[0].records[1].row_index, 3);
    }

    #[test]
    fn test_concatenation_preserves_order_without_loss() {
        let mut input = rows(37);
        input[4].insert("alamat".to_string(), " ".to_string());
        input[20].insert("alamat".to_string(), String::new());

        let batches = plan(&input, &mapping(), "conversation_id", 10);
        let flattened: Vec<usize> = batches
            .iter()
            .flat_map(|b| b.records.iter().map(|r| r.row_index))
            .collect();
        let expected: Vec<usize> = (0..37).filter(|i| *i != 4 && *i != 20).collect();

        assert_eq!(flattened, expected);
        assert!(batches.iter().all(|b| b.len() <= 10 && !b.is_empty()));
    }

    #[test]
    fn test_empty_dataset_has_no_batches() {
        assert!(plan(&[], &mapping(), "conversation_id", 10).is_empty());
        assert_eq!(batch_count(0, 10), 0);
    }

    #[test]
    fn test_batch_count() {
        assert_eq!(batch_count(25, 10), 3);
        assert_eq!(batch_count(30, 10), 3);
        assert_eq!(batch_count(31, 10), 4);
    }
}
