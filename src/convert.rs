//! Extended JSON conversions between step payloads and BSON documents.

use bson::{Bson, Document};
use serde_json::Value;

use crate::error::ParseError;

/// Placeholder that makes the comparison skip a field's value.
pub const IGNORE_DIFF: &str = "<ignore-diff>";

/// Parses a doc string payload, failing when the step carried none.
pub fn parse_documents_payload(payload: Option<&str>) -> Result<Vec<Document>, ParseError> {
    parse_documents(payload.ok_or(ParseError::Missing)?)
}

/// Parses an extended JSON array into an ordered list of documents.
pub fn parse_documents(text: &str) -> Result<Vec<Document>, ParseError> {
    let value: Value = serde_json::from_str(text)?;
    let found = kind(&value);

    match value {
        Value::Array(items) => items.into_iter().map(parse_document).collect(),
        _ => Err(ParseError::Shape {
            expected: "an array of documents",
            found,
        }),
    }
}

/// Parses a query filter. A missing or blank payload matches every document.
pub fn parse_filter(payload: Option<&str>) -> Result<Document, ParseError> {
    match payload {
        Some(text) if !text.trim().is_empty() => parse_document(serde_json::from_str(text)?),
        _ => Ok(Document::new()),
    }
}

fn parse_document(value: Value) -> Result<Document, ParseError> {
    let found = kind(&value);

    match Bson::try_from(value)? {
        Bson::Document(doc) => Ok(doc),
        _ => Err(ParseError::Shape {
            expected: "a document",
            found,
        }),
    }
}

/// Renders documents as a JSON array of canonical extended JSON values.
///
/// An empty set renders as `[]`. Canonical form keeps every BSON type, so an `i32`,
/// an `i64` and a double of the same value render differently. `serde_json` never
/// escapes `<` or `>`, so the ignore-diff placeholder stays literal.
pub fn serialize_documents(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "[]".to_string();
    }

    let values = docs
        .iter()
        .map(|doc| Bson::Document(doc.clone()).into_canonical_extjson())
        .collect();

    Value::Array(values).to_string()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use bson::{DateTime, doc, oid::ObjectId};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_documents_in_order() {
        let docs = parse_documents(r#"[{"name": "John", "age": 30}, {"name": "Jane"}]"#).unwrap();

        assert_eq!(docs, vec![doc! { "name": "John", "age": 30 }, doc! { "name": "Jane" }]);
    }

    #[test]
    fn parses_extended_json_types() {
        let docs = parse_documents(r#"[{"_id": {"$oid": "5f8d0d55b54764421b7156c5"}, "total": {"$numberLong": "7"}}]"#)
            .unwrap();

        let expected_id = ObjectId::parse_str("5f8d0d55b54764421b7156c5").unwrap();
        assert_eq!(docs, vec![doc! { "_id": expected_id, "total": 7_i64 }]);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_documents("malformed").unwrap_err();

        assert!(matches!(err, ParseError::Json(_)));
        assert!(err.to_string().starts_with("error unmarshaling extjson: "));
    }

    #[test]
    fn rejects_non_array_payload() {
        let err = parse_documents(r#"{"name": "John"}"#).unwrap_err();

        assert_eq!(
            err.to_string(),
            "error unmarshaling extjson: expected an array of documents, found an object"
        );
    }

    #[test]
    fn rejects_non_document_elements() {
        let err = parse_documents("[1]").unwrap_err();

        assert_eq!(err.to_string(), "error unmarshaling extjson: expected a document, found a number");
    }

    #[test]
    fn missing_payload_is_an_error() {
        assert!(matches!(parse_documents_payload(None), Err(ParseError::Missing)));
    }

    #[test]
    fn missing_or_blank_filter_matches_everything() {
        assert_eq!(parse_filter(None).unwrap(), Document::new());
        assert_eq!(parse_filter(Some("  \n")).unwrap(), Document::new());
    }

    #[test]
    fn parses_filter_document() {
        let filter = parse_filter(Some(r#"{"name": "John", "age": {"$gt": 20}}"#)).unwrap();

        assert_eq!(filter, doc! { "name": "John", "age": { "$gt": 20 } });
    }

    #[test]
    fn serializes_empty_set_as_empty_array() {
        assert_eq!(serialize_documents(&[]), "[]");
    }

    #[test]
    fn serializes_each_document_in_order() {
        let text = serialize_documents(&[doc! { "name": "John" }, doc! { "age": 20, "name": "Jane" }]);

        assert_eq!(text, r#"[{"name":"John"},{"age":{"$numberInt":"20"},"name":"Jane"}]"#);
    }

    #[test]
    fn serializes_numbers_with_their_type() {
        let text = serialize_documents(&[doc! { "a": 7, "b": 7_i64, "c": 7.5 }]);

        assert_eq!(
            text,
            r#"[{"a":{"$numberInt":"7"},"b":{"$numberLong":"7"},"c":{"$numberDouble":"7.5"}}]"#
        );
    }

    #[test]
    fn keeps_ignore_diff_placeholder_literal() {
        let text = serialize_documents(&[doc! { "_id": IGNORE_DIFF }]);

        assert_eq!(text, r#"[{"_id":"<ignore-diff>"}]"#);
    }

    #[test]
    fn round_trips_documents() {
        let docs = vec![
            doc! {
                "_id": 1_i64,
                "name": "John Doe",
                "age": 30,
                "total": 7_i64,
                "price": 2.0,
                "score": 4.5,
                "active": true,
                "nickname": null,
                "joined": DateTime::from_millis(1_602_000_000_000),
                "address": { "street": "Street 1", "city": "City 1" },
                "tags": ["a", 1_i64, 1.5],
            },
            doc! {
                "_id": ObjectId::parse_str("5f8d0d55b54764421b7156c5").unwrap(),
                "name": "Jane Doe",
            },
        ];

        assert_eq!(parse_documents(&serialize_documents(&docs)).unwrap(), docs);
    }

    #[test]
    fn round_trip_keeps_integer_width() {
        let docs = vec![doc! { "_id": 1_i64, "total": 7_i64 }];

        let parsed = parse_documents(&serialize_documents(&docs)).unwrap();

        assert_eq!(parsed[0].get("_id"), Some(&Bson::Int64(1)));
        assert_eq!(parsed[0].get("total"), Some(&Bson::Int64(7)));
    }
}
