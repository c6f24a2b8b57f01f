//! Anchor-regex rule table for utility-bill fields.

use lazy_static::lazy_static;
use regex::Regex;

/// One field of the rule table.
///
/// A rule matches where `anchor` is found and `value` matches the text
/// directly after it. `value` holds the single capture group. When
/// `unless_followed_by` is set, anchor occurrences followed by that pattern
/// are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub key: &'static str,
    pub anchor: &'static str,
    pub value: &'static str,
    pub unless_followed_by: Option<&'static str>,
}

impl FieldRule {
    const fn new(key: &'static str, anchor: &'static str, value: &'static str) -> Self {
        Self {
            key,
            anchor,
            value,
            unless_followed_by: None,
        }
    }

    const fn unless_followed_by(mut self, guard: &'static str) -> Self {
        self.unless_followed_by = Some(guard);
        self
    }

    /// The rule written as a single pattern, for display.
    pub fn pattern(&self) -> String {
        match self.unless_followed_by {
            Some(guard) => format!("{}(?!{}){}", self.anchor, guard, self.value),
            None => format!("{}{}", self.anchor, self.value),
        }
    }
}

// Value shapes
const NUMERIC: &str = r".*?(\d[\d,\.]*)";
const SIGNED: &str = r".*?([-\d,\.]+)";
const UNSIGNED: &str = r".*?([0-9,\.]+)";

/// Every extracted field, in output order.
pub const FIELD_RULES: [FieldRule; 22] = [
    FieldRule::new("Stand_No", r"Stand\s*No", r"[:\s\-]*([A-Za-z0-9\*]+)"),
    FieldRule::new("Street_No", r"Street\s*No", r".*?([A-Za-z0-9,\s]+?)\s{2,}"),
    FieldRule::new("Stand_valuation", r"Valuation", NUMERIC),
    FieldRule::new("ACC_No", r"Acc\s*No", r".*?(\d{6,})"),
    FieldRule::new("Route_No", r"Route\s*No", r".*?([A-Za-z0-9-]+)"),
    FieldRule::new("Deposit", r"Deposit", NUMERIC),
    FieldRule::new("Guarantee", r"Guarantee", NUMERIC),
    FieldRule::new("Acc_Date", r"Acc\s*Date", r".*?([A-Za-z]+\s+\d{4})"),
    FieldRule::new("Improvements", r"Improvements", NUMERIC),
    FieldRule::new("Payments_up_to", r"Payments\s*up to", r".*?([\d/]{6,10})"),
    FieldRule::new("VAT_Reg_No", r"VAT\s*REG", r".*?(\d+)"),
    FieldRule::new("Balance_B_F", r"Balance\s*B/F", SIGNED),
    FieldRule::new("Payments", r"Payments", SIGNED).unless_followed_by(r"\s*up to"),
    FieldRule::new("Sub_total", r"Sub\s*total", SIGNED),
    FieldRule::new("Month_total", r"Month\s*total", SIGNED),
    FieldRule::new("Total_due", r"Total\s*due", SIGNED),
    FieldRule::new("Over_90", r"Over\s*90", UNSIGNED),
    FieldRule::new("Ninety_days", r"90\s*Days", UNSIGNED),
    FieldRule::new("Sixty_days", r"60\s*Days", UNSIGNED),
    FieldRule::new("Thirty_days", r"30\s*Days", UNSIGNED),
    FieldRule::new("Current", r"Current", UNSIGNED),
    FieldRule::new("Due_Date", r"Due\s*Date", r".*?([\d/]+)"),
];

/// A rule with its patterns compiled.
///
/// All patterns are case-insensitive and `.` also matches line breaks.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: FieldRule,
    anchor: Regex,
    value: Regex,
    guard: Option<Regex>,
}

impl CompiledRule {
    pub fn compile(rule: FieldRule) -> Result<Self, regex::Error> {
        let anchor = Regex::new(&format!("(?is){}", rule.anchor))?;
        let value = Regex::new(&format!(r"(?is)\A(?:{})", rule.value))?;
        let guard = rule
            .unless_followed_by
            .map(|guard| Regex::new(&format!(r"(?is)\A(?:{})", guard)))
            .transpose()?;

        Ok(Self {
            rule,
            anchor,
            value,
            guard,
        })
    }

    pub fn key(&self) -> &'static str {
        self.rule.key
    }

    /// Captured value of the leftmost match, trimmed.
    pub fn apply(&self, text: &str) -> Option<String> {
        for anchor in self.anchor.find_iter(text) {
            let rest = &text[anchor.end()..];

            if let Some(ref guard) = self.guard {
                if guard.is_match(rest) {
                    continue;
                }
            }

            if let Some(caps) = self.value.captures(rest) {
                return caps.get(1).map(|m| m.as_str().trim().to_string());
            }
        }

        None
    }
}

lazy_static! {
    /// The rule table, compiled once per process.
    pub static ref COMPILED_RULES: Vec<CompiledRule> = FIELD_RULES
        .iter()
        .map(|rule| CompiledRule::compile(*rule).unwrap())
        .collect();

    pub static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Compiled rule for `key`.
pub fn rule_for(key: &str) -> Option<&'static CompiledRule> {
    COMPILED_RULES.iter().find(|rule| rule.key() == key)
}
