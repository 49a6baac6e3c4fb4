//! Lenient JSON for process replies.
//!
//! The game process serializes its replies with single quotes. We swap every
//! `'` for `"` and hand the result to `serde_json`. Any value that contains an
//! apostrophe is corrupted by the swap; the parse then fails (or, rarely,
//! yields a different structure) and the caller sees `None`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Rewrites single quotes to double quotes.
pub fn normalize_quotes(raw: &str) -> String {
    raw.replace('\'', "\"")
}

/// Parses a single-quoted reply. Returns `None` on any failure.
pub fn parse_lenient(raw: &str) -> Option<Value> {
    match serde_json::from_str(&normalize_quotes(raw)) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, raw, "Failed to parse process reply");
            None
        }
    }
}

/// Parses a single-quoted reply straight into `T`.
pub fn parse_lenient_as<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let value = parse_lenient(raw)?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, raw, "Process reply has unexpected shape");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn single_quoted_object() {
        let v = parse_lenient("{'gameState':'ON-GOING','players':'a,b'}").unwrap();
        assert_eq!(v, json!({"gameState": "ON-GOING", "players": "a,b"}));
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_lenient("Username already taken").is_none());
        assert!(parse_lenient("").is_none());
    }

    #[test]
    fn apostrophe_in_value_breaks_parse() {
        // Known limitation: "O'Brien" turns into an unterminated string.
        assert!(parse_lenient("{'username':'O'Brien'}").is_none());
    }

    #[test]
    fn apostrophes_can_silently_change_structure() {
        // The note was meant to be the single string `a','b':'c`.
        let v = parse_lenient("{'note':'a','b':'c'}").unwrap();
        assert_eq!(v, json!({"note": "a", "b": "c"}));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Cards {
        status: String,
        cards: Vec<u8>,
    }

    #[test]
    fn typed_parse() {
        let cards: Cards = parse_lenient_as("{'status':'success','cards':[1,2,3,4]}").unwrap();
        assert_eq!(cards.cards, vec![1, 2, 3, 4]);
        assert!(parse_lenient_as::<Cards>("{'status':'success'}").is_none());
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 ,:_-]{0,12}".prop_map(Value::String),
        ]
    }

    fn apostrophe_free_value() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-zA-Z_]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn single_quoted_matches_standard_parse(v in apostrophe_free_value()) {
            let standard = serde_json::to_string(&v).unwrap();
            let single = standard.replace('"', "'");
            prop_assert_eq!(parse_lenient(&single), Some(v));
        }
    }
}
