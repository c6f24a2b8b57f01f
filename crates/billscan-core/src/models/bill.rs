//! Bill extraction data models.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::{BillscanError, ErrorKind};

/// Key of the account-number field used by keyed storage.
pub const ACCOUNT_KEY: &str = "ACC_No";

/// Extracted field values in rule-table order.
///
/// Every rule key is present; a rule that found nothing maps to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(&'static str, Option<String>)>,
}

impl FieldMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value (or absence) for a key, replacing any previous entry.
    pub fn insert(&mut self, key: &'static str, value: Option<String>) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Value for `key`, `None` when absent or unknown.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Whether the key is part of the map (with or without a value).
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys that resolved to a value.
    pub fn found_count(&self) -> usize {
        self.entries.iter().filter(|(_, v)| v.is_some()).count()
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Fields and text blocks extracted from one bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillRecord {
    /// One entry per field rule.
    #[serde(flatten)]
    pub fields: FieldMap,

    /// Leading customer/address lines.
    #[serde(rename = "First 5 Customer Rows")]
    pub header_lines: Vec<String>,

    /// Contact block ending at the phone label.
    #[serde(rename = "Footer Block")]
    pub footer_lines: Vec<String>,
}

impl BillRecord {
    /// Account number parsed as the integer storage key.
    ///
    /// Returns `None` when `ACC_No` is absent or not an integer; the caller
    /// decides whether that rejects the record.
    pub fn account_key(&self) -> Option<i64> {
        self.fields.get(ACCOUNT_KEY)?.trim().parse().ok()
    }
}

/// Outcome of one pipeline invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    /// Whether any text could be produced and parsed.
    pub success: bool,

    /// Extracted record, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<BillRecord>,

    /// Failure description, present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Failure class, present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ExtractionResult {
    pub fn success(record: BillRecord) -> Self {
        Self {
            success: true,
            results: Some(record),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            results: None,
            error: Some(message.into()),
            error_kind: Some(kind),
        }
    }

    pub fn from_error(err: &BillscanError) -> Self {
        Self::failure(err.kind(), err.to_string())
    }

    /// Fields of a successful extraction.
    pub fn fields(&self) -> Option<&FieldMap> {
        self.results.as_ref().map(|r| &r.fields)
    }
}

impl From<Result<BillRecord, BillscanError>> for ExtractionResult {
    fn from(result: Result<BillRecord, BillscanError>) -> Self {
        match result {
            Ok(record) => Self::success(record),
            Err(e) => Self::from_error(&e),
        }
    }
}
