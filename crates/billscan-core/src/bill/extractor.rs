//! Field extraction over whitespace-normalized text.

use std::time::Instant;

use tracing::{debug, trace};

use super::rules::{rule_for, CompiledRule, COMPILED_RULES, WHITESPACE_RUN};
use crate::models::bill::FieldMap;

/// Collapse every whitespace run, line breaks included, into one space.
///
/// Leading and trailing runs become a single space rather than being removed.
pub fn normalize_text(raw_text: &str) -> String {
    WHITESPACE_RUN.replace_all(raw_text, " ").into_owned()
}

/// Applies the rule table to recognized text.
///
/// Every rule runs once, independently, over the same normalized text. A rule
/// that finds nothing yields an absent value; that is never an error.
#[derive(Debug, Clone, Copy)]
pub struct BillFieldExtractor {
    rules: &'static [CompiledRule],
}

impl BillFieldExtractor {
    pub fn new() -> Self {
        Self {
            rules: COMPILED_RULES.as_slice(),
        }
    }

    /// Normalize `raw_text` and extract every field.
    pub fn extract(&self, raw_text: &str) -> FieldMap {
        self.extract_normalized(&normalize_text(raw_text))
    }

    /// Extract every field from text that is already normalized.
    pub fn extract_normalized(&self, text: &str) -> FieldMap {
        let start = Instant::now();
        let mut fields = FieldMap::new();

        for rule in self.rules {
            let value = rule.apply(text);
            trace!("{} -> {:?}", rule.key(), value);
            fields.insert(rule.key(), value);
        }

        debug!(
            "Matched {}/{} fields in {}us",
            fields.found_count(),
            fields.len(),
            start.elapsed().as_micros()
        );

        fields
    }

    /// Apply a single rule by key. Returns `None` for unknown keys too.
    pub fn apply_rule(&self, key: &str, text: &str) -> Option<String> {
        rule_for(key)?.apply(text)
    }
}

impl Default for BillFieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}
