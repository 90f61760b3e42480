//! Raw feed events.
//!
//! Each feed line is a literal list `[category, payload, timestamp]`. The
//! [`parse_line`] entry point decodes it once, and every processor then works
//! on the same [`RawEvent`].

mod literal;

pub use literal::parse_literal;

use serde_json::Value;

use crate::{DrsError, Result};

/// Event category names as written by the live-timing client.
pub mod category {
    pub const TIMING_DATA: &str = "TimingData";
    pub const TOP_THREE: &str = "TopThree";
    pub const RACE_CONTROL_MESSAGES: &str = "RaceControlMessages";
    pub const SESSION_DATA: &str = "SessionData";
}

/// One decoded feed line.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub category: String,
    pub payload: Value,
    /// ISO-8601 timestamp as written by the producer. Informational only.
    pub timestamp: String,
}

impl RawEvent {
    pub fn is(&self, category: &str) -> bool {
        self.category == category
    }
}

/// Decode one feed line into a [`RawEvent`].
///
/// Fails with [`DrsError::MalformedEvent`] when the line is not a three-element
/// list whose first and last elements are strings.
pub fn parse_line(line: &str) -> Result<RawEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DrsError::malformed(0, "empty line"));
    }

    let items = match parse_literal(line)? {
        Value::Array(items) => items,
        other => {
            return Err(DrsError::malformed(0, format!("expected a list, found {}", kind(&other))));
        }
    };

    let [category, payload, timestamp]: [Value; 3] = items.try_into().map_err(|items: Vec<Value>| {
        DrsError::malformed(0, format!("expected 3 elements, found {}", items.len()))
    })?;

    let category = match category {
        Value::String(s) => s,
        other => return Err(DrsError::malformed(0, format!("category is {}", kind(&other)))),
    };
    let timestamp = match timestamp {
        Value::String(s) => s,
        other => return Err(DrsError::malformed(0, format!("timestamp is {}", kind(&other)))),
    };

    Ok(RawEvent { category, payload, timestamp })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "None",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_race_control_line() {
        let line = "['RaceControlMessages', {'Messages': {'56': {'Utc': '2025-07-05T11:39:56', \
                    'Category': 'Flag', 'Flag': 'YELLOW', 'Scope': 'Sector', 'Sector': 2, \
                    'Message': 'YELLOW IN TRACK SECTOR 2'}}}, '2025-07-05T11:39:56.262Z']\n";

        let event = parse_line(line).unwrap();

        assert!(event.is(category::RACE_CONTROL_MESSAGES));
        assert_eq!(event.timestamp, "2025-07-05T11:39:56.262Z");
        assert_eq!(event.payload["Messages"]["56"]["Sector"], json!(2));
    }

    #[test]
    fn wrong_shapes_are_malformed() {
        for line in [
            "   ",
            "{'a': 1}",
            "['TimingData', {}]",
            "['TimingData', {}, 'ts', 'extra']",
            "[1, {}, 'ts']",
            "['TimingData', {}, None]",
            "['TimingData', {'Lines': ",
        ] {
            assert!(
                matches!(parse_line(line), Err(DrsError::MalformedEvent { .. })),
                "{line:?} should be malformed"
            );
        }
    }
}
