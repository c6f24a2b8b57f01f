//! Bill text segmentation and field extraction.

mod extractor;
pub mod layout;
pub mod rules;

pub use extractor::{normalize_text, BillFieldExtractor};
pub use layout::{segment, PageLayout};
pub use rules::{CompiledRule, FieldRule, FIELD_RULES};
