use crate::types::{ColumnMapping, Dataset, Row};
use serde::{Deserialize, Serialize};

/// Outcome statistics of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnrichmentSummary {
    /// Number of rows in the working dataset.
    pub total: usize,
    /// Rows with both district and sub-district filled in.
    pub enriched_count: usize,
    /// `round(enriched_count / total * 100)`, 0 for an empty dataset.
    pub success_rate: u32,
}

impl EnrichmentSummary {
    /// Rows left without a district or sub-district.
    pub fn unenriched_count(&self) -> usize {
        self.total - self.enriched_count
    }
}

/// True when both enrichment targets of `row` are non-blank.
pub fn is_enriched(row: &Row, mapping: &ColumnMapping) -> bool {
    let filled = |column: &str| row.get(column).is_some_and(|v| !v.trim().is_empty());
    filled(&mapping.district) && filled(&mapping.subdistrict)
}

/// Compute summary statistics over the final dataset.
pub fn summarize(dataset: &Dataset, mapping: &ColumnMapping) -> EnrichmentSummary {
    let total = dataset.len();
    let enriched_count = dataset
        .rows
        .iter()
        .filter(|row| is_enriched(row, mapping))
        .count();

    let success_rate = if total == 0 {
        0
    } else {
        (enriched_count as f64 / total as f64 * 100.0).round() as u32
    };

    EnrichmentSummary {
        total,
        enriched_count,
        success_rate,
    }
}
