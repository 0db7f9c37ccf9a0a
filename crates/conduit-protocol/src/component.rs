//! Converts text components between their two wire representations: the typed
//! tag tree used by newer protocol versions and the JSON tree used by older
//! ones. This is a payload-level transform; the bytes around it are handled by
//! the codec types in `types`.

use conduit_common::Diagnostics;
use conduit_nbt::Tag;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::error::Error;
use std::fmt;
use uuid::Uuid;

/// A node shape the converter cannot classify. Recovered locally by the
/// callers in this module; never aborts the surrounding packet.
#[derive(Debug)]
pub struct ConversionError {
    /// Rendering of the offending node, for diagnostics.
    pub node: String,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unconvertible component node: {}", self.node)
    }
}

impl Error for ConversionError {}

/// Converts a tag component to its JSON form. A failed conversion is reported
/// and replaced with a `"<error>"` placeholder; a translation layer cannot
/// refuse to forward a packet it does not fully understand.
pub fn tag_to_text(tag: Option<&Tag>, diagnostics: &dyn Diagnostics) -> Option<Value> {
    let tag = tag?;
    match convert_to_text(tag) {
        Ok(value) => Some(value),
        Err(err) => {
            diagnostics.warn(format!("Error converting component: {}", err));
            Some(Value::String("<error>".to_string()))
        }
    }
}

/// Converts a JSON component to its tag form, with the same defensive posture
/// as [`tag_to_text`]. A JSON null converts to an absent tag.
pub fn text_to_tag(component: Option<&Value>, diagnostics: &dyn Diagnostics) -> Option<Tag> {
    let component = match component {
        None | Some(Value::Null) => return None,
        Some(value) => value,
    };
    match convert_to_tag(component) {
        Ok(tag) => Some(tag),
        Err(err) => {
            diagnostics.warn(format!("Error converting component: {}", err));
            Some(Tag::String("<error>".to_string()))
        }
    }
}

fn convert_to_text(tag: &Tag) -> Result<Value, ConversionError> {
    match tag {
        Tag::Compound(entries) => {
            let mut object = Map::new();
            for (key, value) in entries {
                convert_compound_entry(key, value, &mut object)?;
            }
            Ok(Value::Object(object))
        }
        Tag::List(entries) => {
            let mut array = Vec::with_capacity(entries.len());
            for entry in entries {
                array.push(convert_to_text(entry)?);
            }
            Ok(Value::Array(array))
        }
        Tag::String(value) => Ok(Value::String(value.clone())),
        Tag::Byte(value) => Ok(Value::Number((*value).into())),
        Tag::Short(value) => Ok(Value::Number((*value).into())),
        Tag::Int(value) => Ok(Value::Number((*value).into())),
        Tag::Long(value) => Ok(Value::Number((*value).into())),
        Tag::Float(value) => float_to_number(f64::from(*value), tag),
        Tag::Double(value) => float_to_number(*value, tag),
        Tag::ByteArray(values) => Ok(Value::Array(
            values.iter().map(|v| Value::Number((*v).into())).collect(),
        )),
        Tag::IntArray(values) => Ok(Value::Array(
            values.iter().map(|v| Value::Number((*v).into())).collect(),
        )),
        Tag::LongArray(values) => Ok(Value::Array(
            values.iter().map(|v| Value::Number((*v).into())).collect(),
        )),
        Tag::End => Err(unconvertible(tag)),
    }
}

/// Hover-event payloads store entity ids compactly as a 4-int array under
/// `contents`/`value`; the JSON convention is the canonical UUID string.
fn convert_compound_entry(
    key: &str,
    tag: &Tag,
    object: &mut Map<String, Value>,
) -> Result<(), ConversionError> {
    if key == "contents" || key == "value" {
        if let Tag::Compound(entries) = tag {
            if let Some(Tag::IntArray(parts)) = entries.get("id") {
                object.insert(
                    key.to_string(),
                    Value::String(uuid_from_int_array(parts).to_string()),
                );
                return Ok(());
            }
        }
    }

    object.insert(key.to_string(), convert_to_text(tag)?);
    Ok(())
}

fn convert_to_tag(element: &Value) -> Result<Tag, ConversionError> {
    match element {
        Value::Object(entries) => {
            let mut compound = IndexMap::new();
            for (key, value) in entries {
                convert_object_entry(key, value, &mut compound)?;
            }
            Ok(Tag::Compound(compound))
        }
        Value::Array(entries) => {
            let mut list = Vec::with_capacity(entries.len());
            for entry in entries {
                list.push(convert_to_tag(entry)?);
            }
            Ok(Tag::List(list))
        }
        Value::String(value) => Ok(Tag::String(value.clone())),
        Value::Bool(value) => Ok(Tag::Byte(*value as i8)),
        Value::Number(number) => number_to_tag(number, element),
        // A null is only meaningful at the top level, which the public
        // wrappers handle before recursing.
        Value::Null => Err(unconvertible_text(element)),
    }
}

fn convert_object_entry(
    key: &str,
    element: &Value,
    compound: &mut IndexMap<String, Tag>,
) -> Result<(), ConversionError> {
    if key == "contents" || key == "value" {
        // Either the full hover-event object with a string id, or the string
        // form this converter itself emits for the binary direction.
        let id = match element {
            Value::Object(entries) => entries.get("id"),
            Value::String(_) => Some(element),
            _ => None,
        };
        if let Some(Value::String(id)) = id {
            if let Some(uuid) = parse_uuid(id) {
                compound.insert(key.to_string(), Tag::IntArray(uuid_to_int_array(uuid).to_vec()));
                return Ok(());
            }
        }
    }

    compound.insert(key.to_string(), convert_to_tag(element)?);
    Ok(())
}

/// The text side has no fixed-width number kind, so the original width is not
/// recoverable. Integral values become 32-bit ints when they fit and longs
/// otherwise; fractional values become doubles.
fn number_to_tag(number: &Number, element: &Value) -> Result<Tag, ConversionError> {
    if let Some(value) = number.as_i64() {
        if let Ok(value) = i32::try_from(value) {
            return Ok(Tag::Int(value));
        }
        return Ok(Tag::Long(value));
    }
    if let Some(value) = number.as_f64() {
        return Ok(Tag::Double(value));
    }
    Err(unconvertible_text(element))
}

fn float_to_number(value: f64, tag: &Tag) -> Result<Value, ConversionError> {
    // NaN and infinities have no JSON representation.
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| unconvertible(tag))
}

fn unconvertible(tag: &Tag) -> ConversionError {
    ConversionError {
        node: format!("{:?}", tag),
    }
}

fn unconvertible_text(element: &Value) -> ConversionError {
    ConversionError {
        node: element.to_string(),
    }
}

fn parse_uuid(value: &str) -> Option<Uuid> {
    // Canonical hyphenated form only; anything else stays a plain string.
    if value.len() != 36 {
        return None;
    }
    Uuid::try_parse(value).ok()
}

/// Splits a UUID into four big-endian ints, most significant first.
pub fn uuid_to_int_array(uuid: Uuid) -> [i32; 4] {
    let (msb, lsb) = uuid.as_u64_pair();
    [
        (msb >> 32) as i32,
        msb as i32,
        (lsb >> 32) as i32,
        lsb as i32,
    ]
}

/// Rebuilds a UUID from four big-endian ints. Anything but exactly four parts
/// yields the nil UUID, matching the tolerance of the wire producers.
pub fn uuid_from_int_array(parts: &[i32]) -> Uuid {
    if parts.len() != 4 {
        return Uuid::nil();
    }
    let msb = ((parts[0] as u32 as u64) << 32) | parts[1] as u32 as u64;
    let lsb = ((parts[2] as u32 as u64) << 32) | parts[3] as u32 as u64;
    Uuid::from_u64_pair(msb, lsb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingDiagnostics {
        warnings: Mutex<Vec<String>>,
    }

    impl RecordingDiagnostics {
        fn new() -> Self {
            Self {
                warnings: Mutex::new(Vec::new()),
            }
        }
    }

    impl Diagnostics for RecordingDiagnostics {
        fn warn(&self, message: String) {
            self.warnings.lock().unwrap().push(message);
        }

        fn debug(&self, _message: String) {}
    }

    fn compound(entries: Vec<(&str, Tag)>) -> Tag {
        Tag::Compound(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    #[test]
    fn test_simple_component_to_text() {
        let diag = RecordingDiagnostics::new();
        let tag = compound(vec![
            ("text", Tag::String("hello".to_string())),
            ("bold", Tag::Byte(1)),
        ]);

        let text = tag_to_text(Some(&tag), &diag).unwrap();
        assert_eq!(text, json!({"text": "hello", "bold": 1}));
        assert!(diag.warnings.lock().unwrap().is_empty());
    }

    #[test]
    fn test_absent_converts_to_absent() {
        let diag = RecordingDiagnostics::new();
        assert_eq!(tag_to_text(None, &diag), None);
        assert_eq!(text_to_tag(None, &diag), None);
        assert_eq!(text_to_tag(Some(&Value::Null), &diag), None);
    }

    #[test]
    fn test_text_roundtrip_is_stable() {
        let diag = RecordingDiagnostics::new();
        let tag = compound(vec![
            ("text", Tag::String("a".to_string())),
            (
                "extra",
                Tag::List(vec![
                    compound(vec![("text", Tag::String("b".to_string()))]),
                    compound(vec![("color", Tag::String("red".to_string()))]),
                ]),
            ),
            ("depth", Tag::Short(7)),
        ]);

        // Width is lost through the text form, so compare text-side fixpoints.
        let text = tag_to_text(Some(&tag), &diag).unwrap();
        let back = text_to_tag(Some(&text), &diag).unwrap();
        let text_again = tag_to_text(Some(&back), &diag).unwrap();
        assert_eq!(text, text_again);
        assert!(diag.warnings.lock().unwrap().is_empty());
    }

    #[test]
    fn test_key_order_preserved() {
        let diag = RecordingDiagnostics::new();
        let tag = compound(vec![
            ("zebra", Tag::Int(1)),
            ("apple", Tag::Int(2)),
            ("mango", Tag::Int(3)),
        ]);

        let text = tag_to_text(Some(&tag), &diag).unwrap();
        let keys: Vec<&String> = text.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["zebra", "apple", "mango"]);

        let back = text_to_tag(Some(&text), &diag).unwrap();
        let keys: Vec<&String> = back.as_compound().unwrap().keys().collect();
        assert_eq!(keys, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn test_hover_entity_id_becomes_uuid_string() {
        let diag = RecordingDiagnostics::new();
        let uuid = Uuid::new_v3(&Uuid::NAMESPACE_DNS, b"steve");
        let tag = compound(vec![(
            "contents",
            compound(vec![(
                "id",
                Tag::IntArray(uuid_to_int_array(uuid).to_vec()),
            )]),
        )]);

        let text = tag_to_text(Some(&tag), &diag).unwrap();
        assert_eq!(text, json!({"contents": uuid.to_string()}));
    }

    #[test]
    fn test_uuid_string_roundtrips_to_same_int_array() {
        let diag = RecordingDiagnostics::new();
        let uuid = Uuid::new_v3(&Uuid::NAMESPACE_DNS, b"alex");
        let parts = uuid_to_int_array(uuid).to_vec();
        let tag = compound(vec![(
            "contents",
            compound(vec![("id", Tag::IntArray(parts.clone()))]),
        )]);

        let text = tag_to_text(Some(&tag), &diag).unwrap();
        let back = text_to_tag(Some(&text), &diag).unwrap();
        assert_eq!(
            back.as_compound().unwrap().get("contents"),
            Some(&Tag::IntArray(parts))
        );
    }

    #[test]
    fn test_hover_object_with_string_id_becomes_int_array() {
        let diag = RecordingDiagnostics::new();
        let uuid = Uuid::new_v3(&Uuid::NAMESPACE_DNS, b"villager");
        let text = json!({"contents": {"id": uuid.to_string()}});

        let back = text_to_tag(Some(&text), &diag).unwrap();
        assert_eq!(
            back.as_compound().unwrap().get("contents"),
            Some(&Tag::IntArray(uuid_to_int_array(uuid).to_vec()))
        );
    }

    #[test]
    fn test_unparseable_uuid_stays_string() {
        let diag = RecordingDiagnostics::new();
        let text = json!({"contents": {"id": "not-a-uuid"}});

        let back = text_to_tag(Some(&text), &diag).unwrap();
        let contents = back.as_compound().unwrap().get("contents").unwrap();
        assert_eq!(
            contents.as_compound().unwrap().get("id"),
            Some(&Tag::String("not-a-uuid".to_string()))
        );
    }

    #[test]
    fn test_uuid_int_array_of_wrong_length_is_nil() {
        assert_eq!(uuid_from_int_array(&[1, 2, 3]), Uuid::nil());
    }

    #[test]
    fn test_uuid_int_array_roundtrip() {
        let uuid = Uuid::new_v3(&Uuid::NAMESPACE_DNS, b"herobrine");
        assert_eq!(uuid_from_int_array(&uuid_to_int_array(uuid)), uuid);
    }

    #[test]
    fn test_conversion_failure_substitutes_placeholder() {
        let diag = RecordingDiagnostics::new();
        let tag = compound(vec![("speed", Tag::Float(f32::NAN))]);

        let text = tag_to_text(Some(&tag), &diag).unwrap();
        assert_eq!(text, Value::String("<error>".to_string()));
        assert_eq!(diag.warnings.lock().unwrap().len(), 1);
    }
}
