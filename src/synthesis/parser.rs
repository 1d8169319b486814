//! Structured analysis parsing.
//!
//! Model responses are noisy: prose before and after the payload, or no
//! payload at all. The parser extracts the minimal JSON substring and
//! decodes the positional wire format into an [`Analysis`]. Structural
//! errors decode to the empty sentinel; a run never applies a half-parsed
//! payload.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::analysis::{Analysis, Entity, LinkSpec, MergeSpec, UpdateSpec};

/// Field value the model uses to leave a preference untouched.
const UNCHANGED_SENTINEL: &str = "<UNCHANGED>";

/// Parse a raw model response into an [`Analysis`].
///
/// `{}`, an unextractable payload, and structural decode errors all yield
/// the empty sentinel.
pub fn parse_analysis(raw: &str) -> Analysis {
    let json = match extract_object(raw) {
        Some(json) => json,
        None => {
            debug!("analysis response carries no JSON object");
            return Analysis::empty();
        }
    };

    let value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            warn!("analysis response is not valid JSON: {}", e);
            return Analysis::empty();
        }
    };

    match decode_analysis(&value) {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!("analysis payload rejected: {}", e);
            Analysis::empty()
        }
    }
}

/// Parse a categorization response: a JSON array of `{title, folder}` pairs.
///
/// Entries missing either field are skipped. An unextractable or invalid
/// payload is an error; the caller treats it as a failed chunk.
pub fn parse_title_folder_pairs(raw: &str) -> Result<Vec<(String, String)>> {
    let json = extract_array(raw)
        .ok_or_else(|| Error::parse("no JSON array in categorization response"))?;
    let value: Value = serde_json::from_str(json)?;
    let items = value
        .as_array()
        .ok_or_else(|| Error::parse("categorization payload is not an array"))?;

    let mut pairs = Vec::new();
    for item in items {
        let obj = match item.as_object() {
            Some(obj) => obj,
            None => continue,
        };
        let title = obj.get("title").and_then(Value::as_str);
        let folder = obj.get("folder").and_then(Value::as_str);
        if let (Some(title), Some(folder)) = (title, folder) {
            pairs.push((title.to_string(), folder.to_string()));
        }
    }
    Ok(pairs)
}

fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

fn extract_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

fn decode_analysis(value: &Value) -> Result<Analysis> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::parse("top level is not an object"))?;

    let main_problem = match obj.get("main") {
        None | Some(Value::Null) => None,
        Some(value) => Some(decode_entity(value, "main")?),
    };

    let new_entities = decode_list(obj.get("new"), "new", decode_entity)?;
    let links = decode_list(obj.get("links"), "links", decode_link)?;
    let updates = decode_list(obj.get("update"), "update", decode_update)?;
    let merges = decode_list(obj.get("merge"), "merge", decode_merge)?;
    let user_preferences = decode_preferences(obj.get("user"));

    Ok(Analysis {
        main_problem,
        new_entities,
        links,
        updates,
        merges,
        user_preferences,
    })
}

fn decode_list<T>(
    value: Option<&Value>,
    what: &str,
    decode: fn(&Value, &str) -> Result<T>,
) -> Result<Vec<T>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => {
            let items = as_array(value, what)?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| decode(item, &format!("{}[{}]", what, i)))
                .collect()
        }
    }
}

// Entities are positional: [title, content, tags, folderPath?, aliasFor?].
// An explicit null at index 4 means "not an alias".
fn decode_entity(value: &Value, what: &str) -> Result<Entity> {
    let arr = as_array(value, what)?;
    Ok(Entity {
        title: req_str(arr, 0, what, "title")?,
        content: req_str(arr, 1, what, "content")?,
        tags: req_str_list(arr, 2, what, "tags")?,
        folder_path: opt_str(arr, 3, what, "folderPath")?,
        alias_for: opt_str(arr, 4, what, "aliasFor")?,
    })
}

// Links are positional: [sourceTitle, targetTitle, type, description?, weight?].
fn decode_link(value: &Value, what: &str) -> Result<LinkSpec> {
    let arr = as_array(value, what)?;
    Ok(LinkSpec {
        source_title: req_str(arr, 0, what, "sourceTitle")?,
        target_title: req_str(arr, 1, what, "targetTitle")?,
        link_type: req_str(arr, 2, what, "type")?,
        description: opt_str(arr, 3, what, "description")?.unwrap_or_default(),
        weight: opt_f64(arr, 4, what, "weight")?.unwrap_or(1.0),
    })
}

// Updates are positional: [title, newContent, reason, newCredibility?,
// newImportance?]. Explicit null scores leave stored values unchanged.
fn decode_update(value: &Value, what: &str) -> Result<UpdateSpec> {
    let arr = as_array(value, what)?;
    Ok(UpdateSpec {
        title: req_str(arr, 0, what, "title")?,
        new_content: req_str(arr, 1, what, "newContent")?,
        reason: req_str(arr, 2, what, "reason")?,
        new_credibility: opt_f64(arr, 3, what, "newCredibility")?,
        new_importance: opt_f64(arr, 4, what, "newImportance")?,
    })
}

// Merges are the one named-field member of the wire format.
fn decode_merge(value: &Value, what: &str) -> Result<MergeSpec> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::parse(format!("{} must be an object", what)))?;

    let source_titles = match obj.get("source_titles") {
        Some(value) => str_list(value, what, "source_titles")?,
        None => return Err(Error::parse(format!("{} missing source_titles", what))),
    };

    Ok(MergeSpec {
        source_titles,
        new_title: req_field_str(obj, "new_title", what)?,
        new_content: req_field_str(obj, "new_content", what)?,
        new_tags: match obj.get("new_tags") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => str_list(value, what, "new_tags")?,
        },
        folder_path: opt_field_str(obj, "folder_path", what)?.unwrap_or_default(),
        reason: opt_field_str(obj, "reason", what)?.unwrap_or_default(),
    })
}

// Preference decoding is deliberately lenient: a bad field drops that field
// alone, and a bad payload drops only the preferences, never the graph
// content decoded alongside them.
fn decode_preferences(value: Option<&Value>) -> String {
    let obj = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::Object(obj)) => obj,
        Some(other) => {
            warn!("user preference payload is not an object: {}", other);
            return String::new();
        }
    };

    let mut lines = Vec::new();
    for (key, value) in obj {
        match value {
            Value::String(s) if s == UNCHANGED_SENTINEL => {}
            Value::String(s) if s.trim().is_empty() => {}
            Value::String(s) => lines.push(format!("{}: {}", key, s.trim())),
            other => {
                warn!("dropping non-string preference field {}: {}", key, other);
            }
        }
    }
    lines.join("\n")
}

// ==================== Decode Helpers ====================

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::parse(format!("{} must be an array", what)))
}

fn req_str(arr: &[Value], idx: usize, what: &str, field: &str) -> Result<String> {
    match arr.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(Error::parse(format!("{} {} must be a string", what, field))),
    }
}

fn opt_str(arr: &[Value], idx: usize, what: &str, field: &str) -> Result<Option<String>> {
    match arr.get(idx) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::parse(format!(
            "{} {} must be a string or null",
            what, field
        ))),
    }
}

fn opt_f64(arr: &[Value], idx: usize, what: &str, field: &str) -> Result<Option<f64>> {
    match arr.get(idx) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(_) => Err(Error::parse(format!(
            "{} {} must be a number or null",
            what, field
        ))),
    }
}

fn str_list(value: &Value, what: &str, field: &str) -> Result<Vec<String>> {
    let arr = value
        .as_array()
        .ok_or_else(|| Error::parse(format!("{} {} must be an array", what, field)))?;
    arr.iter()
        .map(|v| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                Error::parse(format!("{} {} entries must be strings", what, field))
            })
        })
        .collect()
}

fn req_str_list(arr: &[Value], idx: usize, what: &str, field: &str) -> Result<Vec<String>> {
    match arr.get(idx) {
        Some(value) => str_list(value, what, field),
        None => Err(Error::parse(format!("{} missing {}", what, field))),
    }
}

fn req_field_str(obj: &Map<String, Value>, key: &str, what: &str) -> Result<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(Error::parse(format!("{} {} must be a string", what, key))),
    }
}

fn opt_field_str(obj: &Map<String, Value>, key: &str, what: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::parse(format!(
            "{} {} must be a string or null",
            what, key
        ))),
    }
}
