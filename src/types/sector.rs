//! Track sector identifiers used by local yellow flags

use serde_json::Value;
use std::fmt;

/// Sector named by a race control message.
///
/// Messages without a usable sector still count as one yellow zone, keyed as
/// `Sector(None)`, so that its matching `CLEAR` can resolve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Sector(pub Option<u32>);

impl Sector {
    /// Read the `Sector` field of a race control entry.
    pub fn from_value(value: Option<&Value>) -> Self {
        let number = match value {
            Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        Sector(number)
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(n) => write!(f, "{}", n),
            None => f.write_str("track"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_textual_sectors_agree() {
        assert_eq!(Sector::from_value(Some(&json!(2))), Sector(Some(2)));
        assert_eq!(Sector::from_value(Some(&json!("2"))), Sector(Some(2)));
    }

    #[test]
    fn missing_sector_is_its_own_key() {
        assert_eq!(Sector::from_value(None), Sector(None));
        assert_eq!(Sector::from_value(Some(&Value::Null)), Sector(None));
    }
}
