//! Bidirectional conversion between typed [`Value`]s and their wire-text
//! encoding, plus `guess_type` for the `Any` designator.
//!
//! Mirrors `encode`/`decode`/`guess_type` in the original event catalog:
//! each declared type has one text form, containers recurse using the
//! bracket-aware splitter in [`crate::types`], and `Any` prefixes the
//! guessed type tag ahead of an [`EM`](crate::separators::EM)-separated
//! encoded value.

use chrono::{DateTime, Utc};

use crate::error::ValueError;
use crate::separators::{EM_CHAR, FS_CHAR, GS_CHAR, NAK_CHAR, RS_CHAR, SYN_CHAR, US_CHAR};
use crate::types::{base_keyword_of, bracket_contents_for, split_with_nested};

/// A value that can cross the bus, typed the way the catalog's
/// declared argument types are typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    DateTime(DateTime<Utc>),
    /// Dotted version components, e.g. `1.20.4` -> `[1, 20, 4]`.
    Version(Vec<u64>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    /// A value whose declared type is `Any`; `type_tag` is the guessed
    /// designator stored alongside it on the wire.
    Any(String, Box<Value>),
}

const FORBIDDEN_STRING_BYTES: [char; 7] = [
    FS_CHAR, GS_CHAR, RS_CHAR, US_CHAR, NAK_CHAR, SYN_CHAR, EM_CHAR,
];

/// Encodes `value` as the wire text for declared type `type_str`.
pub fn encode_value(value: &Value, type_str: &str) -> Result<String, ValueError> {
    let t = type_str.trim();
    match (base_keyword_of(t).as_str(), value) {
        ("int", Value::Int(i)) => Ok(i.to_string()),
        ("float", Value::Float(f)) => Ok(format_float(*f)),
        ("str" | "string", Value::Str(s)) => {
            if let Some(bad) = s.chars().find(|c| FORBIDDEN_STRING_BYTES.contains(c)) {
                return Err(ValueError::ForbiddenByte(format!(
                    "{s:?} contains reserved byte {:#04x}",
                    bad as u32
                )));
            }
            Ok(s.clone())
        }
        ("bool", Value::Bool(b)) => Ok(if *b { "t".to_string() } else { "f".to_string() }),
        ("datetime", Value::DateTime(dt)) => Ok(dt.timestamp().to_string()),
        ("version", Value::Version(parts)) => Ok(parts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".")),
        ("list", Value::List(items)) => {
            let inner = bracket_contents_for(t, "list").ok_or_else(|| ValueError::bad_type(t))?;
            let encoded = items
                .iter()
                .map(|v| encode_value(v, &inner))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", encoded.join(&NAK_CHAR.to_string())))
        }
        ("tuple", Value::Tuple(items)) => {
            let inner = bracket_contents_for(t, "tuple").ok_or_else(|| ValueError::bad_type(t))?;
            let item_types = split_with_nested(&inner, ',');
            if item_types.len() != items.len() {
                return Err(ValueError::bad(
                    &format!("{items:?}"),
                    &format!("tuple of {} elements", item_types.len()),
                ));
            }
            let encoded = items
                .iter()
                .zip(item_types.iter())
                .map(|(v, it)| encode_value(v, it.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("({})", encoded.join(&NAK_CHAR.to_string())))
        }
        ("dict", Value::Dict(entries)) => {
            let inner = bracket_contents_for(t, "dict").ok_or_else(|| ValueError::bad_type(t))?;
            let parts = split_with_nested(&inner, ',');
            if parts.len() != 2 {
                return Err(ValueError::bad_type(t));
            }
            let (key_type, value_type) = (parts[0].trim(), parts[1].trim());
            let encoded = entries
                .iter()
                .map(|(k, v)| {
                    let ek = encode_value(k, key_type)?;
                    let ev = encode_value(v, value_type)?;
                    Ok(format!("{ek}{SYN_CHAR}{ev}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("{{{}}}", encoded.join(&NAK_CHAR.to_string())))
        }
        ("any", v) => {
            let guessed = guess_type(v);
            let encoded = encode_value(v, &guessed)?;
            Ok(format!("{guessed}{EM_CHAR}{encoded}"))
        }
        _ => Err(ValueError::bad(&format!("{value:?}"), t)),
    }
}

/// Decodes the wire text `data` as declared type `type_str`.
pub fn decode_value(data: &str, type_str: &str) -> Result<Value, ValueError> {
    let t = type_str.trim();
    if base_keyword_of(t) == "any" {
        let (tag, rest) = data
            .split_once(EM_CHAR)
            .ok_or_else(|| ValueError::Malformed(data.to_string()))?;
        let inner = decode_value(rest, tag)?;
        return Ok(Value::Any(tag.to_string(), Box::new(inner)));
    }
    match base_keyword_of(t).as_str() {
        "int" => data
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ValueError::bad(data, "int")),
        "float" => data
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ValueError::bad(data, "float")),
        "str" | "string" => Ok(Value::Str(data.to_string())),
        "bool" => match data {
            "t" => Ok(Value::Bool(true)),
            "f" => Ok(Value::Bool(false)),
            _ => Err(ValueError::bad(data, "bool")),
        },
        "datetime" => {
            let secs = data
                .parse::<i64>()
                .map_err(|_| ValueError::bad(data, "datetime"))?;
            DateTime::from_timestamp(secs, 0)
                .map(Value::DateTime)
                .ok_or_else(|| ValueError::bad(data, "datetime"))
        }
        "version" => {
            let parts = data
                .split('.')
                .map(|p| p.parse::<u64>().map_err(|_| ValueError::bad(data, "Version")))
                .collect::<Result<Vec<_>, _>>()?;
            if parts.is_empty() {
                return Err(ValueError::bad(data, "Version"));
            }
            Ok(Value::Version(parts))
        }
        "list" => {
            let inner = bracket_contents_for(t, "list").ok_or_else(|| ValueError::bad_type(t))?;
            let body = strip_brackets(data, '[', ']')?;
            let items = if body.is_empty() {
                Vec::new()
            } else {
                split_with_nested(&body, NAK_CHAR)
                    .iter()
                    .map(|s| decode_value(s, &inner))
                    .collect::<Result<Vec<_>, _>>()?
            };
            Ok(Value::List(items))
        }
        "tuple" => {
            let inner = bracket_contents_for(t, "tuple").ok_or_else(|| ValueError::bad_type(t))?;
            let item_types = split_with_nested(&inner, ',');
            let body = strip_brackets(data, '(', ')')?;
            let parts = if body.is_empty() {
                Vec::new()
            } else {
                split_with_nested(&body, NAK_CHAR)
            };
            if parts.len() != item_types.len() {
                return Err(ValueError::bad(
                    data,
                    &format!("tuple of {} elements", item_types.len()),
                ));
            }
            let items = parts
                .iter()
                .zip(item_types.iter())
                .map(|(s, it)| decode_value(s, it.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Tuple(items))
        }
        "dict" => {
            let inner = bracket_contents_for(t, "dict").ok_or_else(|| ValueError::bad_type(t))?;
            let parts = split_with_nested(&inner, ',');
            if parts.len() != 2 {
                return Err(ValueError::bad_type(t));
            }
            let (key_type, value_type) = (parts[0].trim(), parts[1].trim());
            let body = strip_brackets(data, '{', '}')?;
            let entries = if body.is_empty() {
                Vec::new()
            } else {
                split_with_nested(&body, NAK_CHAR)
                    .iter()
                    .map(|entry| {
                        let (k, v) = entry
                            .split_once(SYN_CHAR)
                            .ok_or_else(|| ValueError::Malformed(entry.clone()))?;
                        Ok((decode_value(k, key_type)?, decode_value(v, value_type)?))
                    })
                    .collect::<Result<Vec<_>, ValueError>>()?
            };
            Ok(Value::Dict(entries))
        }
        _ => Err(ValueError::bad_type(t)),
    }
}

fn strip_brackets(s: &str, open: char, close: char) -> Result<String, ValueError> {
    let s = s.trim();
    let mut chars = s.chars();
    if chars.next() != Some(open) || !s.ends_with(close) {
        return Err(ValueError::Malformed(s.to_string()));
    }
    Ok(s[1..s.len() - 1].to_string())
}

fn format_float(f: f64) -> String {
    if f == f.trunc() && f.is_finite() {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// Returns a type designator that round-trips through [`encode_value`]
/// for `value`, the way the original catalog's `guess_type` derives a
/// tag for an `Any`-typed argument.
pub fn guess_type(value: &Value) -> String {
    match value {
        Value::Int(_) => "int".to_string(),
        Value::Float(_) => "float".to_string(),
        Value::Str(_) => "str".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::DateTime(_) => "datetime".to_string(),
        Value::Version(_) => "Version".to_string(),
        Value::Any(tag, _) => tag.clone(),
        Value::List(items) => {
            if items.is_empty() {
                "list".to_string()
            } else {
                format!("list[{}]", union_of(items.iter()))
            }
        }
        Value::Tuple(items) => {
            if items.is_empty() {
                "tuple".to_string()
            } else {
                let inner = items
                    .iter()
                    .map(guess_type)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("tuple[{inner}]")
            }
        }
        Value::Dict(entries) => {
            if entries.is_empty() {
                "dict".to_string()
            } else {
                let key_type = union_of(entries.iter().map(|(k, _)| k));
                let value_type = union_of(entries.iter().map(|(_, v)| v));
                format!("dict[{key_type}, {value_type}]")
            }
        }
    }
}

fn union_of<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    let mut types: Vec<String> = values.map(guess_type).collect();
    types.sort();
    types.dedup();
    types.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars() {
        for (v, t) in [
            (Value::Int(-42), "int"),
            (Value::Float(3.5), "float"),
            (Value::Str("hello".to_string()), "str"),
            (Value::Bool(true), "bool"),
            (Value::Version(vec![1, 20, 4]), "Version"),
        ] {
            let encoded = encode_value(&v, t).unwrap();
            assert_eq!(decode_value(&encoded, t).unwrap(), v);
        }
    }

    #[test]
    fn round_trips_nested_containers() {
        let v = Value::List(vec![
            Value::Tuple(vec![Value::Int(1), Value::Str("a".to_string())]),
            Value::Tuple(vec![Value::Int(2), Value::Str("b".to_string())]),
        ]);
        let t = "list[tuple[int,str]]";
        let encoded = encode_value(&v, t).unwrap();
        assert_eq!(decode_value(&encoded, t).unwrap(), v);
    }

    #[test]
    fn round_trips_dict() {
        let v = Value::Dict(vec![
            (Value::Str("a".to_string()), Value::Int(1)),
            (Value::Str("b".to_string()), Value::Int(2)),
        ]);
        let t = "dict[str,int]";
        let encoded = encode_value(&v, t).unwrap();
        assert_eq!(decode_value(&encoded, t).unwrap(), v);
    }

    #[test]
    fn any_prefixes_guessed_type() {
        let v = Value::Any(String::new(), Box::new(Value::Int(7)));
        let encoded = encode_value(&v, "Any").unwrap();
        assert!(encoded.starts_with("int"));
        let decoded = decode_value(&encoded, "Any").unwrap();
        assert_eq!(decoded, Value::Any("int".to_string(), Box::new(Value::Int(7))));
    }

    #[test]
    fn guess_type_reports_union_for_mixed_list() {
        let v = Value::List(vec![Value::Int(1), Value::Str("x".to_string())]);
        assert_eq!(guess_type(&v), "list[int|str]");
    }

    #[test]
    fn rejects_strings_with_reserved_bytes() {
        let v = Value::Str(format!("bad{GS_CHAR}value"));
        assert!(encode_value(&v, "str").is_err());
    }

    #[test]
    fn allows_strings_with_non_reserved_control_bytes() {
        let v = Value::Str("before\x17\x18after".to_string());
        let encoded = encode_value(&v, "str").unwrap();
        assert_eq!(decode_value(&encoded, "str").unwrap(), v);
    }
}
