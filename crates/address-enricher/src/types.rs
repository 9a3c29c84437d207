use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// A single CSV record keyed by header name.
pub type Row = HashMap<String, String>;

/// Uploaded CSV content: ordered headers plus rows.
///
/// The header order is fixed at parse time and defines the output column
/// order. Rows are only ever mutated in the district/sub-district columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Cell value, or `""` when the row has no such field.
    pub fn cell(&self, row: usize, header: &str) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(header))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Index of the first row whose `column` equals `value`.
    pub fn position_by(&self, column: &str, value: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(column).is_some_and(|v| v == value))
    }
}

/// The semantic fields a column can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticField {
    Address,
    District,
    Subdistrict,
}

impl SemanticField {
    pub const ALL: [SemanticField; 3] = [Self::Address, Self::District, Self::Subdistrict];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::District => "district",
            Self::Subdistrict => "subdistrict",
        }
    }
}

/// Header names chosen for each semantic field.
///
/// Once a run starts the orchestrator holds its own copy, so the mapping
/// cannot change underneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub address: String,
    pub district: String,
    pub subdistrict: String,
}

impl ColumnMapping {
    pub fn new(
        address: impl Into<String>,
        district: impl Into<String>,
        subdistrict: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            district: district.into(),
            subdistrict: subdistrict.into(),
        }
    }

    pub fn column(&self, field: SemanticField) -> &str {
        match field {
            SemanticField::Address => &self.address,
            SemanticField::District => &self.district,
            SemanticField::Subdistrict => &self.subdistrict,
        }
    }
}

/// One address submitted for extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Position of the source row in the dataset.
    #[serde(skip)]
    pub row_index: usize,
    #[serde(rename = "conversation_id")]
    pub id: String,
    #[serde(rename = "alamat")]
    pub address: String,
}

/// One item of the extraction service's answer.
///
/// Empty district or sub-district means "could not extract".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentItem {
    #[serde(rename = "conversation_id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(
        rename = "kecamatan",
        alias = "district",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub district: String,
    #[serde(
        rename = "kelurahan",
        alias = "subdistrict",
        alias = "desa",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub subdistrict: String,
}

impl EnrichmentItem {
    pub fn new(
        id: impl Into<String>,
        district: impl Into<String>,
        subdistrict: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            district: district.into(),
            subdistrict: subdistrict.into(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, got {}",
            other
        ))),
    }
}

/// Lifecycle of a single batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl BatchStatus {
    /// Completed and errored batches both count towards progress.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// A group of addresses submitted together in one extraction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// 1-based position in submission order.
    pub index: usize,
    pub status: BatchStatus,
    pub records: Vec<AddressRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<EnrichmentItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Batch {
    pub fn new(index: usize, records: Vec<AddressRecord>) -> Self {
        Self {
            index,
            status: BatchStatus::Pending,
            records,
            result: None,
            error: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
