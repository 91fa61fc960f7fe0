//! The `json` module, backed by serde_json with order-preserving maps.

use crate::{
    exception::Exception,
    modules::{kwarg, module_value, native_kw, str_arg},
    types::Dict,
    value::{type_name, Value},
};

pub(crate) fn module() -> Value {
    module_value(
        "json",
        vec![
            ("loads", native_kw("loads", |args, _kwargs| {
                let text = str_arg(&args, 0, "loads")?;
                let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                    Exception::value_error(format!("Expecting value: {e}"))
                })?;
                from_json(&parsed)
            })),
            ("dumps", native_kw("dumps", |args, kwargs| {
                let value = args
                    .first()
                    .ok_or_else(|| Exception::type_error("dumps() missing 1 required argument"))?;
                let json = to_json(value)?;
                let indent = match kwarg(&kwargs, "indent") {
                    Some(Value::Int(n)) if n > 0 => Some(n as usize),
                    _ => None,
                };
                let sort_keys = kwarg(&kwargs, "sort_keys").is_some_and(|v| crate::value::truthy(&v));
                let json = if sort_keys { sorted_json(json) } else { json };
                let rendered = match indent {
                    Some(width) => {
                        let indent_bytes = vec![b' '; width];
                        let mut out = Vec::new();
                        let formatter =
                            serde_json::ser::PrettyFormatter::with_indent(&indent_bytes);
                        let mut serializer =
                            serde_json::Serializer::with_formatter(&mut out, formatter);
                        serde::Serialize::serialize(&json, &mut serializer)
                            .map_err(|e| Exception::value_error(e.to_string()))?;
                        String::from_utf8_lossy(&out).into_owned()
                    }
                    None => python_compact(&json),
                };
                Ok(Value::str(rendered))
            })),
        ],
    )
}

/// serde_json value → interpreter value.
pub(crate) fn from_json(v: &serde_json::Value) -> Result<Value, Exception> {
    Ok(match v {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::str(s.clone()),
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(from_json(item)?);
            }
            Value::list(out)
        }
        serde_json::Value::Object(map) => {
            let mut dict = Dict::new();
            for (k, item) in map {
                dict.insert(Value::str(k.clone()), from_json(item)?)?;
            }
            Value::dict(dict)
        }
    })
}

/// Interpreter value → serde_json value; rejects non-serializable kinds.
fn to_json(v: &Value) -> Result<serde_json::Value, Exception> {
    Ok(match v {
        Value::None => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::BigInt(b) => {
            // beyond-i64 ints serialize through their decimal text
            serde_json::from_str(&b.to_string())
                .map_err(|_| Exception::value_error("integer out of JSON range"))?
        }
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Exception::value_error("Out of range float values are not JSON compliant"))?,
        Value::Str(s) => serde_json::Value::String(s.to_string()),
        Value::List(items) => {
            let items = items.borrow();
            let mut out = Vec::with_capacity(items.len());
            for item in items.iter() {
                out.push(to_json(item)?);
            }
            serde_json::Value::Array(out)
        }
        Value::Tuple(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items.iter() {
                out.push(to_json(item)?);
            }
            serde_json::Value::Array(out)
        }
        Value::Dict(dict) => {
            let mut out = serde_json::Map::new();
            for (k, item) in dict.borrow().iter() {
                let key = match k {
                    Value::Str(s) => s.to_string(),
                    Value::Int(i) => i.to_string(),
                    Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
                    Value::Float(f) => crate::value::float_repr(*f),
                    Value::None => "null".to_string(),
                    other => {
                        return Err(Exception::type_error(format!(
                            "keys must be str, int, float, bool or None, not {}",
                            type_name(other)
                        )));
                    }
                };
                out.insert(key, to_json(item)?);
            }
            serde_json::Value::Object(out)
        }
        other => {
            return Err(Exception::type_error(format!(
                "Object of type {} is not JSON serializable",
                type_name(other)
            )));
        }
    })
}

/// Python's compact form uses `", "` and `": "` separators.
fn python_compact(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(python_compact).collect();
            format!("[{}]", inner.join(", "))
        }
        serde_json::Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, val)| {
                    format!(
                        "{}: {}",
                        serde_json::Value::String(k.clone()),
                        python_compact(val)
                    )
                })
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
        other => other.to_string(),
    }
}

fn sorted_json(v: serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(String, serde_json::Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            serde_json::Value::Object(
                entries.into_iter().map(|(k, val)| (k, sorted_json(val))).collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sorted_json).collect())
        }
        other => other,
    }
}
