//! Structural JSON comparison with a patch-style failure report.
//!
//! [`assert_json_equal`] compares two JSON texts. Expected values equal to
//! [`IGNORE_DIFF`] take the actual value at the same position, so only the
//! presence of the field is checked. When the values differ, the error carries the
//! expected value rendered line by line. Each line starts with a marker column:
//! `-` for expected-only content, `+` for actual-only content and a space for shared
//! content. Each nesting level adds two spaces.

use serde_json::{Map, Value};

use crate::{convert::IGNORE_DIFF, error::AssertionError};

/// Compares two JSON texts and fails with a rendered diff when they differ.
pub fn assert_json_equal(expected: &str, actual: &str) -> Result<(), AssertionError> {
    let mut expected: Value =
        serde_json::from_str(expected).map_err(|source| AssertionError::InvalidJson { side: "expected", source })?;
    let actual: Value =
        serde_json::from_str(actual).map_err(|source| AssertionError::InvalidJson { side: "actual", source })?;

    if is_ignored(&expected) {
        return Ok(());
    }

    collapse_ignored(&mut expected, &actual);

    match compare_values(&expected, &actual) {
        None => Ok(()),
        Some(change) => Err(AssertionError::NotEqual {
            diff: Renderer::default().render(&expected, &change),
        }),
    }
}

fn is_ignored(value: &Value) -> bool {
    value.as_str() == Some(IGNORE_DIFF)
}

fn collapse_ignored(expected: &mut Value, actual: &Value) {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            for (key, value) in expected.iter_mut() {
                if let Some(other) = actual.get(key) {
                    collapse_value(value, other);
                }
            }
        },
        (Value::Array(expected), Value::Array(actual)) => {
            for (value, other) in expected.iter_mut().zip(actual) {
                collapse_value(value, other);
            }
        },
        _ => {},
    }
}

fn collapse_value(expected: &mut Value, actual: &Value) {
    if is_ignored(expected) {
        *expected = actual.clone();
    } else {
        collapse_ignored(expected, actual);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position<'a> {
    Key(&'a str),
    Index(usize),
}

#[derive(Debug)]
struct Entry<'a> {
    position: Position<'a>,
    change: Change<'a>,
}

#[derive(Debug)]
enum Change<'a> {
    Object(Vec<Entry<'a>>),
    Array(Vec<Entry<'a>>),
    Added(&'a Value),
    Deleted(&'a Value),
    Modified { old: &'a Value, new: &'a Value },
}

fn compare_values<'a>(left: &'a Value, right: &'a Value) -> Option<Change<'a>> {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            let entries = compare_objects(l, r);
            (!entries.is_empty()).then_some(Change::Object(entries))
        },
        (Value::Array(l), Value::Array(r)) => {
            let entries = compare_arrays(l, r);
            (!entries.is_empty()).then_some(Change::Array(entries))
        },
        _ if left == right => None,
        _ => Some(Change::Modified { old: left, new: right }),
    }
}

fn compare_objects<'a>(left: &'a Map<String, Value>, right: &'a Map<String, Value>) -> Vec<Entry<'a>> {
    let mut entries = Vec::new();

    for key in sorted_keys(left) {
        let position = Position::Key(key);
        match right.get(key) {
            None => entries.push(Entry {
                position,
                change: Change::Deleted(&left[key]),
            }),
            Some(other) => {
                if let Some(change) = compare_values(&left[key], other) {
                    entries.push(Entry { position, change });
                }
            },
        }
    }

    for key in sorted_keys(right) {
        if !left.contains_key(key) {
            entries.push(Entry {
                position: Position::Key(key),
                change: Change::Added(&right[key]),
            });
        }
    }

    entries
}

fn compare_arrays<'a>(left: &'a [Value], right: &'a [Value]) -> Vec<Entry<'a>> {
    let common = longest_common_subsequence(left, right);

    let unmatched_left: Vec<usize> = (0..left.len()).filter(|i| !common.iter().any(|(l, _)| l == i)).collect();
    let unmatched_right: Vec<usize> = (0..right.len()).filter(|j| !common.iter().any(|(_, r)| r == j)).collect();

    let mut nested = Vec::new();
    let mut paired_left = Vec::new();
    let mut paired_right = Vec::new();

    // Leftover containers of the same kind are diffed in place rather than replaced.
    for (&i, &j) in unmatched_left.iter().zip(&unmatched_right) {
        let same_kind = matches!(
            (&left[i], &right[j]),
            (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
        );
        if !same_kind {
            continue;
        }
        if let Some(change) = compare_values(&left[i], &right[j]) {
            nested.push(Entry {
                position: Position::Index(i),
                change,
            });
        }
        paired_left.push(i);
        paired_right.push(j);
    }

    let deleted = unmatched_left
        .iter()
        .filter(|i| !paired_left.contains(*i))
        .map(|&i| Entry {
            position: Position::Index(i),
            change: Change::Deleted(&left[i]),
        });
    let added = unmatched_right
        .iter()
        .filter(|j| !paired_right.contains(*j))
        .map(|&j| Entry {
            position: Position::Index(j),
            change: Change::Added(&right[j]),
        });

    nested.into_iter().chain(deleted).chain(added).collect()
}

fn longest_common_subsequence(left: &[Value], right: &[Value]) -> Vec<(usize, usize)> {
    let (n, m) = (left.len(), right.len());
    let mut table = vec![vec![0_usize; m + 1]; n + 1];

    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if left[i] == right[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if left[i] == right[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }

    pairs
}

fn sorted_keys(map: &Map<String, Value>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

const SAME: char = ' ';
const ADDED: char = '+';
const DELETED: char = '-';

struct Frame {
    remaining: isize,
    in_array: bool,
}

#[derive(Default)]
struct Renderer {
    out: String,
    frames: Vec<Frame>,
}

impl Renderer {
    fn render(mut self, left: &Value, change: &Change<'_>) -> String {
        match (left, change) {
            (Value::Object(map), Change::Object(entries)) => {
                self.line(SAME, "{");
                self.push(map.len(), false);
                self.process_object(map, entries);
                self.frames.pop();
                self.line(SAME, "}");
            },
            (Value::Array(items), Change::Array(entries)) => {
                self.line(SAME, "[");
                self.push(items.len(), true);
                self.process_array(items, entries);
                self.frames.pop();
                self.line(SAME, "]");
            },
            (_, Change::Modified { old, new }) => {
                self.print_recursive(None, old, DELETED);
                self.print_recursive(None, new, ADDED);
            },
            _ => self.print_recursive(None, left, SAME),
        }
        self.out
    }

    fn process_object(&mut self, map: &Map<String, Value>, entries: &[Entry<'_>]) {
        for key in sorted_keys(map) {
            self.process_item(Some(key), &Position::Key(key), &map[key], entries);
        }

        for entry in entries {
            if let (Position::Key(key), Change::Added(value)) = (&entry.position, &entry.change) {
                self.print_recursive(Some(*key), value, ADDED);
            }
        }
    }

    fn process_array(&mut self, items: &[Value], entries: &[Entry<'_>]) {
        for (index, value) in items.iter().enumerate() {
            self.process_item(None, &Position::Index(index), value, entries);
        }

        for entry in entries {
            if let (Position::Index(index), Change::Added(value)) = (&entry.position, &entry.change) {
                if *index >= items.len() {
                    self.print_recursive(None, value, ADDED);
                }
            }
        }
    }

    fn process_item(&mut self, name: Option<&str>, position: &Position<'_>, value: &Value, entries: &[Entry<'_>]) {
        let mut matched = entries.iter().filter(|entry| &entry.position == position).peekable();

        if matched.peek().is_none() {
            self.print_recursive(name, value, SAME);
            return;
        }

        for entry in matched {
            match (&entry.change, value) {
                (Change::Object(nested), Value::Object(map)) => {
                    self.open(SAME, name, "{");
                    self.push(map.len(), false);
                    self.process_object(map, nested);
                    self.frames.pop();
                    self.close(SAME, "}");
                },
                (Change::Array(nested), Value::Array(items)) => {
                    self.open(SAME, name, "[");
                    self.push(items.len(), true);
                    self.process_array(items, nested);
                    self.frames.pop();
                    self.close(SAME, "]");
                },
                (Change::Added(added), _) => {
                    self.print_recursive(name, added, ADDED);
                    // Additions do not consume a slot of the expected container.
                    if let Some(frame) = self.frames.last_mut() {
                        frame.remaining += 1;
                    }
                },
                (Change::Modified { old, new }, _) => {
                    let saved = self.frames.last().map(|frame| frame.remaining);
                    self.print_recursive(name, old, DELETED);
                    if let (Some(frame), Some(saved)) = (self.frames.last_mut(), saved) {
                        frame.remaining = saved;
                    }
                    self.print_recursive(name, new, ADDED);
                },
                (Change::Deleted(deleted), _) => self.print_recursive(name, deleted, DELETED),
                _ => self.print_recursive(name, value, SAME),
            }
        }
    }

    fn print_recursive(&mut self, name: Option<&str>, value: &Value, marker: char) {
        match value {
            Value::Object(map) => {
                self.open(marker, name, "{");
                self.push(map.len(), false);
                for key in sorted_keys(map) {
                    self.print_recursive(Some(key), &map[key], marker);
                }
                self.frames.pop();
                self.close(marker, "}");
            },
            Value::Array(items) => {
                self.open(marker, name, "[");
                self.push(items.len(), true);
                for item in items {
                    self.print_recursive(None, item, marker);
                }
                self.frames.pop();
                self.close(marker, "]");
            },
            scalar => {
                self.indent(marker);
                self.print_key(name);
                self.print_value(scalar);
                self.print_comma();
                self.out.push('\n');
            },
        }
    }

    fn push(&mut self, size: usize, in_array: bool) {
        self.frames.push(Frame {
            remaining: isize::try_from(size).unwrap_or(isize::MAX),
            in_array,
        });
    }

    fn line(&mut self, marker: char, text: &str) {
        self.indent(marker);
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self, marker: char, name: Option<&str>, bracket: &str) {
        self.indent(marker);
        self.print_key(name);
        self.out.push_str(bracket);
        self.out.push('\n');
    }

    fn close(&mut self, marker: char, bracket: &str) {
        self.indent(marker);
        self.out.push_str(bracket);
        self.print_comma();
        self.out.push('\n');
    }

    fn indent(&mut self, marker: char) {
        self.out.push(marker);
        for _ in &self.frames {
            self.out.push_str("  ");
        }
    }

    fn print_key(&mut self, name: Option<&str>) {
        let in_array = self.frames.last().is_some_and(|frame| frame.in_array);
        if let (Some(name), false) = (name, in_array) {
            self.out.push_str(&format!("\"{name}\": "));
        }
    }

    fn print_value(&mut self, value: &Value) {
        let text = match value {
            Value::String(s) => format!("\"{s}\""),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            // Containers are expanded by print_recursive.
            other => other.to_string(),
        };
        self.out.push_str(&text);
    }

    fn print_comma(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.remaining -= 1;
            if frame.remaining > 0 {
                self.out.push(',');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    fn diff(expected: &str, actual: &str) -> String {
        match assert_json_equal(expected, actual) {
            Err(AssertionError::NotEqual { diff }) => diff,
            other => panic!("expected a diff, got {other:?}"),
        }
    }

    #[test_case(r#"[]"#, r#"[]"# ; "empty arrays")]
    #[test_case(r#"[{"name": "John"}]"#, r#"[{"name":"John"}]"# ; "whitespace differences")]
    #[test_case(r#"{"b": 1, "a": 2}"#, r#"{"a": 2, "b": 1}"# ; "key order")]
    #[test_case(r#"{"age": {"$numberInt": "30"}}"#, r#"{"age": {"$numberInt": "30"}}"# ; "typed numbers")]
    #[test_case(r#"[{"_id": "<ignore-diff>", "name": "John"}]"#, r#"[{"_id": {"$oid": "5f8d0d55b54764421b7156c5"}, "name": "John"}]"# ; "ignored identifier")]
    #[test_case(r#""<ignore-diff>""#, r#"{"anything": true}"# ; "ignored root")]
    #[test_case(r#"[1, "<ignore-diff>", 3]"#, r#"[1, [2], 3]"# ; "ignored array element")]
    fn equal_documents_pass(expected: &str, actual: &str) {
        assert!(assert_json_equal(expected, actual).is_ok());
    }

    #[test]
    fn reports_modified_field() {
        let err = assert_json_equal(r#"[{"name": "John"}]"#, r#"[{"name": "Jane"}]"#).unwrap_err();

        assert_eq!(
            err.to_string(),
            "not equal:\n [\n   {\n-    \"name\": \"John\"\n+    \"name\": \"Jane\"\n   }\n ]\n"
        );
    }

    #[test]
    fn reports_added_document() {
        assert_eq!(
            diff("[]", r#"[{"name": "Jane"}]"#),
            " [\n+  {\n+    \"name\": \"Jane\"\n+  }\n ]\n"
        );
    }

    #[test]
    fn reports_deleted_document() {
        assert_eq!(
            diff(r#"[{"name": "John"}, {"name": "Jane"}]"#, r#"[{"name": "John"}]"#),
            " [\n   {\n     \"name\": \"John\"\n   },\n-  {\n-    \"name\": \"Jane\"\n-  }\n ]\n"
        );
    }

    #[test]
    fn keeps_commas_between_siblings() {
        assert_eq!(
            diff(r#"{"a": 1, "b": 2, "c": 3}"#, r#"{"a": 1, "b": 5, "c": 3}"#),
            " {\n   \"a\": 1,\n-  \"b\": 2,\n+  \"b\": 5,\n   \"c\": 3\n }\n"
        );
    }

    #[test]
    fn reports_missing_and_extra_keys() {
        assert_eq!(
            diff(r#"{"a": 1, "b": 2}"#, r#"{"a": 1, "c": 3}"#),
            " {\n   \"a\": 1,\n-  \"b\": 2\n+  \"c\": 3\n }\n"
        );
    }

    #[test]
    fn ignored_field_must_still_be_present() {
        assert_eq!(
            diff(r#"{"_id": "<ignore-diff>", "name": "John"}"#, r#"{"name": "John"}"#),
            " {\n-  \"_id\": \"<ignore-diff>\",\n   \"name\": \"John\"\n }\n"
        );
    }

    #[test]
    fn renders_nested_structures() {
        assert_eq!(
            diff(
                r#"[{"address": {"city": "City 1", "tags": [1, 2]}}]"#,
                r#"[{"address": {"city": "City 2", "tags": [1, 2]}}]"#
            ),
            concat!(
                " [\n",
                "   {\n",
                "     \"address\": {\n",
                "-      \"city\": \"City 1\",\n",
                "+      \"city\": \"City 2\",\n",
                "       \"tags\": [\n",
                "         1,\n",
                "         2\n",
                "       ]\n",
                "     }\n",
                "   }\n",
                " ]\n",
            )
        );
    }

    #[test]
    fn numbers_of_different_representation_differ() {
        assert_eq!(diff(r#"{"n": 2.0}"#, r#"{"n": 2}"#), " {\n-  \"n\": 2.0\n+  \"n\": 2\n }\n");
    }

    #[test]
    fn numbers_of_different_bson_type_differ() {
        assert_eq!(
            diff(r#"{"total": {"$numberLong": "7"}}"#, r#"{"total": {"$numberInt": "7"}}"#),
            concat!(
                " {\n",
                "   \"total\": {\n",
                "-    \"$numberLong\": \"7\"\n",
                "+    \"$numberInt\": \"7\"\n",
                "   }\n",
                " }\n",
            )
        );
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = assert_json_equal("[", "[]").unwrap_err();

        assert!(matches!(err, AssertionError::InvalidJson { side: "expected", .. }));
    }
}
