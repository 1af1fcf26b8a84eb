use serde::{Deserialize, Serialize};
use std::fmt;

/// How a single extraction compared against the expected text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Matched,
    TextMismatch,
    /// The selector matched no element at all.
    SelectorAbsent,
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckOutcome::Matched => "matched",
            CheckOutcome::TextMismatch => "text_mismatch",
            CheckOutcome::SelectorAbsent => "selector_absent",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResult {
    pub outcome: CheckOutcome,
    /// Normalized text of the first matching element, `None` when absent.
    pub actual_text: Option<String>,
    pub expected_text: String,
}

impl CheckResult {
    pub fn matched(&self) -> bool {
        self.outcome == CheckOutcome::Matched
    }

    pub fn is_selector_absent(&self) -> bool {
        self.outcome == CheckOutcome::SelectorAbsent
    }

    /// What was observed on the page, for logs and alert text.
    pub fn found_description(&self, selector: &str) -> String {
        describe_found(self.actual_text.as_deref(), selector)
    }
}

pub fn describe_found(actual_text: Option<&str>, selector: &str) -> String {
    match actual_text {
        Some(text) => text.to_string(),
        None => format!("element not found (check selector '{}')", selector),
    }
}
