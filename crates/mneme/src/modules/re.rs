//! The `re` module.
//!
//! Patterns compile through the fast `regex` engine first and fall back to
//! `fancy-regex` for constructs the fast engine rejects (lookarounds,
//! backreferences). Offsets surfaced to guest code are character offsets.

use std::rc::Rc;

use crate::{
    exception::Exception,
    modules::{int_arg, kwarg, module_value, native, native_kw, str_arg},
    value::Value,
};

// CPython flag values
const FLAG_IGNORECASE: i64 = 2;
const FLAG_MULTILINE: i64 = 8;
const FLAG_DOTALL: i64 = 16;

pub(crate) fn module() -> Value {
    module_value(
        "re",
        vec![
            ("IGNORECASE", Value::Int(FLAG_IGNORECASE)),
            ("I", Value::Int(FLAG_IGNORECASE)),
            ("MULTILINE", Value::Int(FLAG_MULTILINE)),
            ("M", Value::Int(FLAG_MULTILINE)),
            ("DOTALL", Value::Int(FLAG_DOTALL)),
            ("S", Value::Int(FLAG_DOTALL)),
            ("compile", native("compile", |args| {
                let pattern = str_arg(&args, 0, "compile")?;
                let flags = optional_flags(&args, 1)?;
                Ok(pattern_object(Compiled::new(&pattern, flags)?))
            })),
            ("findall", native("findall", |args| {
                let compiled = compiled_arg(&args, "findall")?;
                let text = str_arg(&args, 1, "findall")?;
                findall(&compiled, &text)
            })),
            ("search", native("search", |args| {
                let compiled = compiled_arg(&args, "search")?;
                let text = str_arg(&args, 1, "search")?;
                Ok(match compiled.find_from(&text, 0)? {
                    Some(found) => match_object(&found, &text),
                    None => Value::None,
                })
            })),
            ("match", native("match", |args| {
                let compiled = compiled_arg(&args, "match")?;
                let text = str_arg(&args, 1, "match")?;
                Ok(match compiled.find_from(&text, 0)? {
                    Some(found) if found.full.0 == 0 => match_object(&found, &text),
                    _ => Value::None,
                })
            })),
            ("fullmatch", native("fullmatch", |args| {
                let compiled = compiled_arg(&args, "fullmatch")?;
                let text = str_arg(&args, 1, "fullmatch")?;
                Ok(match compiled.find_from(&text, 0)? {
                    Some(found) if found.full.0 == 0 && found.full.1 == text.len() => {
                        match_object(&found, &text)
                    }
                    _ => Value::None,
                })
            })),
            ("sub", native_kw("sub", |args, kwargs| {
                let compiled = compiled_arg(&args, "sub")?;
                let repl = str_arg(&args, 1, "sub")?;
                let text = str_arg(&args, 2, "sub")?;
                let count = match args.get(3).cloned().or_else(|| kwarg(&kwargs, "count")) {
                    Some(v) => int_arg(&[v], 0, "sub")?,
                    None => 0,
                };
                sub(&compiled, &repl, &text, count)
            })),
            ("split", native_kw("split", |args, kwargs| {
                let compiled = compiled_arg(&args, "split")?;
                let text = str_arg(&args, 1, "split")?;
                let maxsplit = match args.get(2).cloned().or_else(|| kwarg(&kwargs, "maxsplit")) {
                    Some(v) => int_arg(&[v], 0, "split")?,
                    None => 0,
                };
                split(&compiled, &text, maxsplit)
            })),
            ("escape", native("escape", |args| {
                let text = str_arg(&args, 0, "escape")?;
                let mut out = String::with_capacity(text.len());
                for c in text.chars() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        out.push(c);
                    } else {
                        out.push('\\');
                        out.push(c);
                    }
                }
                Ok(Value::str(out))
            })),
        ],
    )
}

/// A compiled pattern, fast engine first.
pub(crate) enum Compiled {
    Fast(regex::Regex),
    Fancy(fancy_regex::Regex),
}

/// One match: full span plus per-group spans, in byte offsets.
pub(crate) struct Found {
    pub full: (usize, usize),
    pub groups: Vec<Option<(usize, usize)>>,
    pub names: Vec<Option<String>>,
}

impl Compiled {
    pub(crate) fn new(pattern: &str, flags: i64) -> Result<Rc<Self>, Exception> {
        let mut prefix = String::new();
        if flags & FLAG_IGNORECASE != 0 {
            prefix.push_str("(?i)");
        }
        if flags & FLAG_MULTILINE != 0 {
            prefix.push_str("(?m)");
        }
        if flags & FLAG_DOTALL != 0 {
            prefix.push_str("(?s)");
        }
        let full_pattern = format!("{prefix}{pattern}");
        match regex::Regex::new(&full_pattern) {
            Ok(fast) => Ok(Rc::new(Self::Fast(fast))),
            Err(_) => match fancy_regex::Regex::new(&full_pattern) {
                Ok(fancy) => Ok(Rc::new(Self::Fancy(fancy))),
                Err(e) => Err(Exception::value_error(format!("bad pattern: {e}"))),
            },
        }
    }

    fn group_names(&self) -> Vec<Option<String>> {
        match self {
            Self::Fast(re) => re
                .capture_names()
                .skip(1)
                .map(|n| n.map(String::from))
                .collect(),
            Self::Fancy(re) => re
                .capture_names()
                .skip(1)
                .map(|n| n.map(String::from))
                .collect(),
        }
    }

    /// First match at or after byte offset `start`.
    pub(crate) fn find_from(&self, text: &str, start: usize) -> Result<Option<Found>, Exception> {
        let names = self.group_names();
        match self {
            Self::Fast(re) => Ok(re.captures_at(text, start).map(|caps| {
                let full = caps
                    .get(0)
                    .map_or((start, start), |m| (m.start(), m.end()));
                let groups = caps
                    .iter()
                    .skip(1)
                    .map(|g| g.map(|m| (m.start(), m.end())))
                    .collect();
                Found { full, groups, names }
            })),
            Self::Fancy(re) => {
                let caps = re
                    .captures_from_pos(text, start)
                    .map_err(|e| Exception::runtime_error(format!("regex error: {e}")))?;
                Ok(caps.map(|caps| {
                    let full = caps
                        .get(0)
                        .map_or((start, start), |m| (m.start(), m.end()));
                    let groups = caps
                        .iter()
                        .skip(1)
                        .map(|g| g.map(|m| (m.start(), m.end())))
                        .collect();
                    Found { full, groups, names }
                }))
            }
        }
    }

    /// All non-overlapping matches.
    pub(crate) fn find_all(&self, text: &str) -> Result<Vec<Found>, Exception> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos <= text.len() {
            let Some(found) = self.find_from(text, pos)? else {
                break;
            };
            let (start, end) = found.full;
            out.push(found);
            // empty matches advance one character to avoid looping
            pos = if end == start {
                match text[end..].chars().next() {
                    Some(c) => end + c.len_utf8(),
                    None => break,
                }
            } else {
                end
            };
        }
        Ok(out)
    }
}

fn optional_flags(args: &[Value], index: usize) -> Result<i64, Exception> {
    match args.get(index) {
        None | Some(Value::None) => Ok(0),
        Some(v) => int_arg(&[v.clone()], 0, "flags"),
    }
}

/// First argument: a pattern string. Compiled pattern objects carry their
/// own method surface; point callers at it rather than re-wrapping.
fn compiled_arg(args: &[Value], fn_name: &str) -> Result<Rc<Compiled>, Exception> {
    match args.first() {
        // flags on the function forms are accepted via re.compile(); the
        // positional flags slot differs per function and is not threaded here
        Some(Value::Str(pattern)) => Compiled::new(pattern, 0),
        Some(Value::Module(_)) => Err(Exception::type_error(format!(
            "use the compiled pattern's .{fn_name}() method instead of re.{fn_name}(pattern, ...)"
        ))),
        _ => Err(Exception::type_error(format!(
            "{fn_name}() first argument must be a string pattern"
        ))),
    }
}

fn byte_to_char(text: &str, byte: usize) -> i64 {
    text[..byte].chars().count() as i64
}

/// `re.findall` group rules: 0 groups → whole matches, 1 group → that
/// group's text, n groups → tuples.
fn findall(compiled: &Compiled, text: &str) -> Result<Value, Exception> {
    let matches = compiled.find_all(text)?;
    let mut out = Vec::with_capacity(matches.len());
    for found in matches {
        let group_text =
            |span: &Option<(usize, usize)>| span.map_or(String::new(), |(s, e)| text[s..e].to_string());
        match found.groups.len() {
            0 => out.push(Value::str(text[found.full.0..found.full.1].to_string())),
            1 => out.push(Value::str(group_text(&found.groups[0]))),
            _ => out.push(Value::tuple(
                found.groups.iter().map(|g| Value::str(group_text(g))).collect(),
            )),
        }
    }
    Ok(Value::list(out))
}

fn sub(compiled: &Compiled, repl: &str, text: &str, count: i64) -> Result<Value, Exception> {
    let matches = compiled.find_all(text)?;
    let limit = if count <= 0 { matches.len() } else { count as usize };
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    for found in matches.iter().take(limit) {
        out.push_str(&text[pos..found.full.0]);
        out.push_str(&expand_template(repl, found, text)?);
        pos = found.full.1;
    }
    out.push_str(&text[pos..]);
    Ok(Value::str(out))
}

/// Expands `\1`, `\g<name>`, and escape sequences in a replacement template.
fn expand_template(repl: &str, found: &Found, text: &str) -> Result<String, Exception> {
    let group_by_index = |i: usize| -> Result<String, Exception> {
        if i == 0 {
            return Ok(text[found.full.0..found.full.1].to_string());
        }
        match found.groups.get(i - 1) {
            Some(span) => Ok(span.map_or(String::new(), |(s, e)| text[s..e].to_string())),
            None => Err(Exception::value_error(format!("invalid group reference {i}"))),
        }
    };
    let mut out = String::with_capacity(repl.len());
    let mut chars = repl.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(d) if d.is_ascii_digit() => {
                let mut number = d.to_string();
                if let Some(d2) = chars.peek().filter(|c| c.is_ascii_digit()) {
                    number.push(*d2);
                    chars.next();
                }
                out.push_str(&group_by_index(number.parse().unwrap_or(0))?);
            }
            Some('g') => {
                if chars.next() != Some('<') {
                    return Err(Exception::value_error("missing <"));
                }
                let mut name = String::new();
                for c in chars.by_ref() {
                    if c == '>' {
                        break;
                    }
                    name.push(c);
                }
                if let Ok(index) = name.parse::<usize>() {
                    out.push_str(&group_by_index(index)?);
                } else {
                    let position = found
                        .names
                        .iter()
                        .position(|n| n.as_deref() == Some(name.as_str()))
                        .ok_or_else(|| {
                            Exception::index_error(format!("unknown group name '{name}'"))
                        })?;
                    out.push_str(&group_by_index(position + 1)?);
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Ok(out)
}

fn split(compiled: &Compiled, text: &str, maxsplit: i64) -> Result<Value, Exception> {
    let matches = compiled.find_all(text)?;
    let limit = if maxsplit <= 0 { matches.len() } else { maxsplit as usize };
    let mut out = Vec::new();
    let mut pos = 0;
    for found in matches.iter().take(limit) {
        out.push(Value::str(text[pos..found.full.0].to_string()));
        // captured groups are interleaved into the result, like CPython
        for span in &found.groups {
            out.push(match span {
                Some((s, e)) => Value::str(text[*s..*e].to_string()),
                None => Value::None,
            });
        }
        pos = found.full.1;
    }
    out.push(Value::str(text[pos..].to_string()));
    Ok(Value::list(out))
}

/// A compiled-pattern object exposing the method surface.
fn pattern_object(compiled: Rc<Compiled>) -> Value {
    let findall_re = compiled.clone();
    let search_re = compiled.clone();
    let match_re = compiled.clone();
    let sub_re = compiled.clone();
    let split_re = compiled;
    module_value(
        "re.Pattern",
        vec![
            ("findall", native("findall", move |args| {
                let text = str_arg(&args, 0, "findall")?;
                findall(&findall_re, &text)
            })),
            ("search", native("search", move |args| {
                let text = str_arg(&args, 0, "search")?;
                Ok(match search_re.find_from(&text, 0)? {
                    Some(found) => match_object(&found, &text),
                    None => Value::None,
                })
            })),
            ("match", native("match", move |args| {
                let text = str_arg(&args, 0, "match")?;
                Ok(match match_re.find_from(&text, 0)? {
                    Some(found) if found.full.0 == 0 => match_object(&found, &text),
                    _ => Value::None,
                })
            })),
            ("sub", native("sub", move |args| {
                let repl = str_arg(&args, 0, "sub")?;
                let text = str_arg(&args, 1, "sub")?;
                sub(&sub_re, &repl, &text, 0)
            })),
            ("split", native("split", move |args| {
                let text = str_arg(&args, 0, "split")?;
                split(&split_re, &text, 0)
            })),
        ],
    )
}

/// A match object: `group`, `groups`, `start`, `end`, `span`.
fn match_object(found: &Found, text: &str) -> Value {
    let full_text = text[found.full.0..found.full.1].to_string();
    let group_texts: Vec<Option<String>> = found
        .groups
        .iter()
        .map(|span| span.map(|(s, e)| text[s..e].to_string()))
        .collect();
    let names = found.names.clone();
    let spans: Vec<(i64, i64)> = std::iter::once(found.full)
        .chain(found.groups.iter().map(|g| g.unwrap_or(found.full)))
        .map(|(s, e)| (byte_to_char(text, s), byte_to_char(text, e)))
        .collect();

    let group_full = full_text.clone();
    let group_texts_for_group = group_texts.clone();
    let names_for_group = names;
    let groups_texts = group_texts;
    let spans_start = spans.clone();
    let spans_end = spans.clone();
    let spans_span = spans;

    module_value(
        "re.Match",
        vec![
            ("group", native("group", move |args| {
                let index = match args.first() {
                    None => 0,
                    Some(Value::Int(i)) => *i as usize,
                    Some(Value::Str(name)) => {
                        match names_for_group
                            .iter()
                            .position(|n| n.as_deref() == Some(&**name))
                        {
                            Some(position) => position + 1,
                            None => {
                                return Err(Exception::index_error(format!(
                                    "no such group: '{name}'"
                                )));
                            }
                        }
                    }
                    Some(_) => return Err(Exception::index_error("no such group")),
                };
                if index == 0 {
                    return Ok(Value::str(group_full.clone()));
                }
                match group_texts_for_group.get(index - 1) {
                    Some(Some(text)) => Ok(Value::str(text.clone())),
                    Some(None) => Ok(Value::None),
                    None => Err(Exception::index_error("no such group")),
                }
            })),
            ("groups", native("groups", move |_args| {
                Ok(Value::tuple(
                    groups_texts
                        .iter()
                        .map(|g| g.as_ref().map_or(Value::None, |t| Value::str(t.clone())))
                        .collect(),
                ))
            })),
            ("start", native("start", move |args| {
                let index = group_index(&args)?;
                spans_start
                    .get(index)
                    .map(|(s, _)| Value::Int(*s))
                    .ok_or_else(|| Exception::index_error("no such group"))
            })),
            ("end", native("end", move |args| {
                let index = group_index(&args)?;
                spans_end
                    .get(index)
                    .map(|(_, e)| Value::Int(*e))
                    .ok_or_else(|| Exception::index_error("no such group"))
            })),
            ("span", native("span", move |args| {
                let index = group_index(&args)?;
                spans_span
                    .get(index)
                    .map(|(s, e)| Value::tuple(vec![Value::Int(*s), Value::Int(*e)]))
                    .ok_or_else(|| Exception::index_error("no such group"))
            })),
        ],
    )
}

fn group_index(args: &[Value]) -> Result<usize, Exception> {
    match args.first() {
        None => Ok(0),
        Some(Value::Int(i)) if *i >= 0 => Ok(*i as usize),
        _ => Err(Exception::index_error("no such group")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::py_repr;

    #[test]
    fn findall_digits() {
        let compiled = Compiled::new(r"\d+", 0).unwrap();
        let out = findall(&compiled, "a1b22c333").unwrap();
        assert_eq!(py_repr(&out), "['1', '22', '333']");
    }

    #[test]
    fn findall_single_group_returns_group() {
        let compiled = Compiled::new(r"(\w)=\d", 0).unwrap();
        let out = findall(&compiled, "a=1 b=2").unwrap();
        assert_eq!(py_repr(&out), "['a', 'b']");
    }

    #[test]
    fn sub_with_group_refs() {
        let compiled = Compiled::new(r"(\w+)@(\w+)", 0).unwrap();
        let out = sub(&compiled, r"\2.\1", "user@host", 0).unwrap();
        assert_eq!(py_repr(&out), "'host.user'");
    }

    #[test]
    fn fancy_fallback_for_lookahead() {
        let compiled = Compiled::new(r"\d+(?= dollars)", 0).unwrap();
        assert!(matches!(*compiled, Compiled::Fancy(_)));
        let out = findall(&compiled, "100 dollars and 50 cents").unwrap();
        assert_eq!(py_repr(&out), "['100']");
    }

    #[test]
    fn split_keeps_groups() {
        let compiled = Compiled::new(r"[,;]", 0).unwrap();
        let out = split(&compiled, "a,b;c", 0).unwrap();
        assert_eq!(py_repr(&out), "['a', 'b', 'c']");
    }
}
