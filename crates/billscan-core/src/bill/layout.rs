//! Header and footer line-block detection.

use serde::Serialize;

use crate::ocr::OcrText;

/// Anchor marking the end of the customer header block.
pub const HEADER_ANCHOR: &str = "Stand No";

/// Anchor marking the last line of the contact footer block.
pub const FOOTER_ANCHOR: &str = "Phone:";

/// Most lines taken as the customer header.
pub const MAX_HEADER_LINES: usize = 5;

/// Lines kept above the footer anchor.
pub const FOOTER_LINES_BEFORE_ANCHOR: usize = 6;

/// Segmented view of recognized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLayout {
    /// All non-empty lines in reading order.
    pub lines: Vec<String>,
    /// Customer/address lines at the top of the bill.
    pub header_lines: Vec<String>,
    /// Contact lines ending at the phone label; empty when there is no label.
    pub footer_lines: Vec<String>,
}

/// Split recognized text into lines and isolate the header and footer blocks.
pub fn segment(raw_text: &str) -> PageLayout {
    let ocr = OcrText::new(raw_text);
    segment_lines(ocr.lines)
}

/// Isolate the header and footer blocks of already-split lines.
pub fn segment_lines(lines: Vec<String>) -> PageLayout {
    let header_lines = header_block(&lines).to_vec();
    let footer_lines = footer_block(&lines).to_vec();
    PageLayout {
        lines,
        header_lines,
        footer_lines,
    }
}

/// Lines before the first `Stand No` line, at most five.
///
/// Without the anchor the first five lines are used.
pub fn header_block(lines: &[String]) -> &[String] {
    let anchor = find_anchor(lines, HEADER_ANCHOR).unwrap_or(lines.len());
    &lines[..anchor.min(MAX_HEADER_LINES)]
}

/// The first `Phone:` line and up to six lines above it.
pub fn footer_block(lines: &[String]) -> &[String] {
    match find_anchor(lines, FOOTER_ANCHOR) {
        Some(anchor) => &lines[anchor.saturating_sub(FOOTER_LINES_BEFORE_ANCHOR)..=anchor],
        None => &[],
    }
}

/// Index of the first line containing `anchor` (case-sensitive).
fn find_anchor(lines: &[String], anchor: &str) -> Option<usize> {
    lines.iter().position(|line| line.contains(anchor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {}", i)).collect()
    }

    #[test]
    fn test_header_stops_at_anchor() {
        let mut lines = lines(8);
        lines[2] = "Stand No 1234".to_string();
        assert_eq!(header_block(&lines), &lines[0..2]);
    }

    #[test]
    fn test_header_without_anchor_takes_five() {
        let lines = lines(8);
        assert_eq!(header_block(&lines), &lines[0..5]);
    }

    #[test]
    fn test_header_capped_at_five_when_anchor_is_late() {
        let mut lines = lines(10);
        lines[7] = "Stand No 1234".to_string();
        assert_eq!(header_block(&lines), &lines[0..5]);
    }

    #[test]
    fn test_header_short_document() {
        let lines = lines(3);
        assert_eq!(header_block(&lines), &lines[..]);
    }

    #[test]
    fn test_header_anchor_is_case_sensitive() {
        let mut lines = lines(8);
        lines[1] = "STAND NO 1234".to_string();
        assert_eq!(header_block(&lines).len(), 5);
    }

    #[test]
    fn test_header_anchor_on_first_line() {
        let mut lines = lines(4);
        lines[0] = "Stand No 1".to_string();
        assert!(header_block(&lines).is_empty());
    }

    #[test]
    fn test_footer_takes_six_lines_above_anchor() {
        let mut lines = lines(12);
        lines[9] = "Phone: 555 0100".to_string();
        assert_eq!(footer_block(&lines), &lines[3..10]);
    }

    #[test]
    fn test_footer_clipped_at_document_start() {
        let mut lines = lines(5);
        lines[2] = "Phone: 555 0100".to_string();
        assert_eq!(footer_block(&lines), &lines[0..3]);
    }

    #[test]
    fn test_footer_uses_first_phone_label() {
        let mut lines = lines(10);
        lines[1] = "Phone: 1".to_string();
        lines[8] = "Phone: 2".to_string();
        assert_eq!(footer_block(&lines), &lines[0..2]);
    }

    #[test]
    fn test_no_phone_label_means_no_footer() {
        let lines = lines(10);
        assert!(footer_block(&lines).is_empty());

        // Label without colon does not count
        let layout = segment("Telephone 555\nPhone 555\n");
        assert!(layout.footer_lines.is_empty());
    }

    #[test]
    fn test_segment_raw_text() {
        let raw = "MUNICIPALITY OF EXAMPLE\n\n  MR J SMITH  \nPO BOX 12\nStand No 4411\n\
                   Acc No 12345678\nEnquiries\nPhone: 555 0100\n\u{0c}";

        let layout = segment(raw);
        assert_eq!(layout.lines.len(), 7);
        assert_eq!(
            layout.header_lines,
            vec!["MUNICIPALITY OF EXAMPLE", "MR J SMITH", "PO BOX 12"]
        );
        assert_eq!(layout.footer_lines, layout.lines[0..7].to_vec());
    }

    #[test]
    fn test_segment_empty_text() {
        let layout = segment("\n \n");
        assert!(layout.lines.is_empty());
        assert!(layout.header_lines.is_empty());
        assert!(layout.footer_lines.is_empty());
    }
}
