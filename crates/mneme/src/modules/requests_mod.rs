//! The `requests` module: HTTP verbs gated by the context's network policy,
//! delegated to the host's `HttpClient`.

use crate::{
    exception::Exception,
    modules::{kwarg, module_value, native, native_ctx, str_arg},
    net::HttpRequest,
    types::Dict,
    value::{py_str, type_name, Value},
};

pub(crate) fn module() -> Value {
    module_value(
        "requests",
        vec![
            ("get", verb("get", "GET")),
            ("head", verb("head", "HEAD")),
            ("post", verb("post", "POST")),
            ("put", verb("put", "PUT")),
            ("patch", verb("patch", "PATCH")),
            ("delete", verb("delete", "DELETE")),
        ],
    )
}

fn verb(name: &'static str, method: &'static str) -> Value {
    native_ctx(name, move |args, kwargs, ctx| {
        let mut url = str_arg(&args, 0, name)?;
        if let Some(params) = kwarg(&kwargs, "params") {
            let query = encode_params(&params)?;
            if !query.is_empty() {
                url.push(if url.contains('?') { '&' } else { '?' });
                url.push_str(&query);
            }
        }
        let mut headers = Vec::new();
        if let Some(Value::Dict(dict)) = kwarg(&kwargs, "headers") {
            for (k, v) in dict.borrow().iter() {
                headers.push((py_str(k), py_str(v)));
            }
        }
        let body = match (kwarg(&kwargs, "json"), kwarg(&kwargs, "data")) {
            (Some(json_value), _) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(to_json_text(&json_value)?)
            }
            (None, Some(Value::Str(data))) => Some(data.to_string()),
            (None, Some(data @ Value::Dict(_))) => {
                headers.push((
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ));
                Some(encode_params(&data)?)
            }
            (None, _) => None,
        };
        let request = HttpRequest {
            method: method.to_string(),
            url,
            headers,
            body,
        };
        let response = ctx.http_request(&request)?;
        Ok(response_object(response.status, response.headers, response.body))
    })
}

fn encode_params(params: &Value) -> Result<String, Exception> {
    let Value::Dict(dict) = params else {
        return Err(Exception::type_error(format!(
            "params must be a dict, not {}",
            type_name(params)
        )));
    };
    let pairs: Vec<String> = dict
        .borrow()
        .iter()
        .map(|(k, v)| format!("{}={}", url_encode(&py_str(k)), url_encode(&py_str(v))))
        .collect();
    Ok(pairs.join("&"))
}

fn url_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for b in text.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn to_json_text(value: &Value) -> Result<String, Exception> {
    json_text(value)
}

fn json_text(value: &Value) -> Result<String, Exception> {
    Ok(match value {
        Value::None => "null".to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => crate::value::float_repr(*f),
        Value::Str(s) => serde_json::Value::String(s.to_string()).to_string(),
        Value::List(items) => {
            let inner: Result<Vec<String>, Exception> = items.borrow().iter().map(json_text).collect();
            format!("[{}]", inner?.join(", "))
        }
        Value::Dict(dict) => {
            let mut inner = Vec::new();
            for (k, v) in dict.borrow().iter() {
                inner.push(format!(
                    "{}: {}",
                    serde_json::Value::String(py_str(k)),
                    json_text(v)?
                ));
            }
            format!("{{{}}}", inner.join(", "))
        }
        other => {
            return Err(Exception::type_error(format!(
                "Object of type {} is not JSON serializable",
                type_name(other)
            )));
        }
    })
}

/// The response surface guest code sees.
fn response_object(status: u16, headers: Vec<(String, String)>, body: String) -> Value {
    let mut header_dict = Dict::new();
    for (k, v) in headers {
        let _ = header_dict.insert(Value::str(k), Value::str(v));
    }
    let json_body = body.clone();
    let raise_status = status;
    module_value(
        "requests.Response",
        vec![
            ("status_code", Value::Int(i64::from(status))),
            ("ok", Value::Bool(status < 400)),
            ("text", Value::str(body)),
            ("headers", Value::dict(header_dict)),
            ("json", native("json", move |_args| {
                let parsed: serde_json::Value = serde_json::from_str(&json_body)
                    .map_err(|e| Exception::value_error(format!("Expecting value: {e}")))?;
                crate::modules::json::from_json(&parsed)
            })),
            ("raise_for_status", native("raise_for_status", move |_args| {
                if raise_status >= 400 {
                    return Err(Exception::network_error(format!(
                        "{raise_status} error for request"
                    )));
                }
                Ok(Value::None)
            })),
        ],
    )
}
