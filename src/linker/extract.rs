use crate::error::LinkerError;
use serde_json::Value;

fn malformed(message: impl Into<String>) -> LinkerError {
    LinkerError::MalformedRecord(message.into())
}

/// Sequence-valued field; absent and `null` both read as empty.
fn sequence<'a>(value: Option<&'a Value>, field: &str) -> Result<&'a [Value], LinkerError> {
    match value {
        None | Some(Value::Null) => Ok(&[] as &[Value]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(malformed(format!(
            "`{field}` should be a list, found {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Bill identifiers referenced by an event's agenda, in agenda order.
///
/// Repeated references are kept. Entity names are trimmed; blank or
/// non-string names are dropped, as are agenda items and entities that are
/// not objects. Only a non-object event or a non-list `agenda` or
/// `related_entities` is malformed.
pub fn extract_bill_ids(event: &Value) -> Result<Vec<String>, LinkerError> {
    let Value::Object(record) = event else {
        return Err(malformed(format!(
            "event should be an object, found {}",
            kind_of(event)
        )));
    };

    let mut out = Vec::new();
    for item in sequence(record.get("agenda"), "agenda")? {
        let Value::Object(item) = item else {
            continue;
        };
        for entity in sequence(item.get("related_entities"), "related_entities")? {
            let Value::Object(entity) = entity else {
                continue;
            };
            if entity.get("entity_type").and_then(Value::as_str) != Some("bill") {
                continue;
            }
            let Some(name) = entity.get("name").and_then(Value::as_str) else {
                continue;
            };
            let clean = name.trim();
            if !clean.is_empty() {
                out.push(clean.to_string());
            }
        }
    }
    Ok(out)
}
