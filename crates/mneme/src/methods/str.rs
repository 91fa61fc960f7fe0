//! String methods.

use crate::{
    builtins::{as_int, as_str, CallArgs, Outcome},
    context::Ctx,
    exception::Exception,
    format::str_format,
    methods::StrMethod,
    value::{type_name, Value},
};

use unicode_casefold::UnicodeCaseFold;

pub(crate) fn call(
    method: StrMethod,
    recv: &Value,
    mut call_args: CallArgs,
    ctx: &mut Ctx,
) -> Result<Outcome, Exception> {
    let Value::Str(s) = recv else {
        return Err(Exception::type_error("str method on non-str receiver"));
    };
    let s: &str = s;
    let args = &call_args.args;
    match method {
        StrMethod::Upper => ok_str(s.to_uppercase()),
        StrMethod::Lower => ok_str(s.to_lowercase()),
        StrMethod::Casefold => ok_str(s.chars().case_fold().collect::<String>()),
        StrMethod::Capitalize => {
            let mut chars = s.chars();
            ok_str(match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            })
        }
        StrMethod::Title => ok_str(title_case(s)),
        StrMethod::Swapcase => ok_str(
            s.chars()
                .flat_map(|c| {
                    if c.is_uppercase() {
                        c.to_lowercase().collect::<Vec<_>>()
                    } else {
                        c.to_uppercase().collect::<Vec<_>>()
                    }
                })
                .collect::<String>(),
        ),
        StrMethod::Strip | StrMethod::Lstrip | StrMethod::Rstrip => {
            let chars: Option<Vec<char>> = match args.first() {
                None | Some(Value::None) => None,
                Some(v) => Some(as_str(v, "strip arg")?.chars().collect()),
            };
            let pred = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            ok_str(match method {
                StrMethod::Strip => s.trim_matches(pred).to_string(),
                StrMethod::Lstrip => s.trim_start_matches(pred).to_string(),
                _ => s.trim_end_matches(pred).to_string(),
            })
        }
        StrMethod::Split | StrMethod::Rsplit => {
            let sep = match args.first() {
                None | Some(Value::None) => None,
                Some(v) => Some(as_str(v, "sep")?),
            };
            let maxsplit = match args.get(1) {
                None | Some(Value::None) => -1,
                Some(v) => as_int(v, "maxsplit")?,
            };
            let parts = split(s, sep.as_deref(), maxsplit, method == StrMethod::Rsplit)?;
            Ok(Value::list(parts.into_iter().map(Value::str).collect()).into())
        }
        StrMethod::Splitlines => {
            let keepends = args.first().is_some_and(crate::value::truthy);
            Ok(Value::list(splitlines(s, keepends).into_iter().map(Value::str).collect()).into())
        }
        StrMethod::Join => {
            let iterable = args
                .first()
                .cloned()
                .ok_or_else(|| Exception::type_error("join() takes exactly one argument (0 given)"))?;
            let Some(items) = crate::eval::iter::concrete_values(&iterable, ctx)? else {
                return Err(Exception::type_error("can only join an iterable"));
            };
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::Str(part) => parts.push(part.to_string()),
                    other => {
                        return Err(Exception::type_error(format!(
                            "sequence item {i}: expected str instance, {} found",
                            type_name(other)
                        )));
                    }
                }
            }
            ok_str(parts.join(s))
        }
        StrMethod::Replace => {
            let old = as_str(args.first().unwrap_or(&Value::None), "replace")?;
            let new = as_str(args.get(1).unwrap_or(&Value::None), "replace")?;
            let count = match args.get(2) {
                None | Some(Value::None) => -1,
                Some(v) => as_int(v, "count")?,
            };
            ok_str(if count < 0 {
                s.replace(&old, &new)
            } else {
                s.replacen(&old, &new, count.max(0) as usize)
            })
        }
        StrMethod::Startswith | StrMethod::Endswith => {
            let (start, end) = start_end(s, args.get(1), args.get(2))?;
            let hay = &char_slice(s, start, end);
            let check = |prefix: &str| {
                if method == StrMethod::Startswith {
                    hay.starts_with(prefix)
                } else {
                    hay.ends_with(prefix)
                }
            };
            let result = match args.first() {
                Some(Value::Str(p)) => check(p),
                Some(Value::Tuple(options)) => {
                    let mut hit = false;
                    for option in options.iter() {
                        let p = as_str(option, "prefix")?;
                        if check(&p) {
                            hit = true;
                            break;
                        }
                    }
                    hit
                }
                _ => {
                    return Err(Exception::type_error(
                        "startswith first arg must be str or a tuple of str",
                    ));
                }
            };
            Ok(Value::Bool(result).into())
        }
        StrMethod::Find | StrMethod::Rfind | StrMethod::Index | StrMethod::Rindex => {
            let needle = as_str(args.first().unwrap_or(&Value::None), "substring")?;
            let (start, end) = start_end(s, args.get(1), args.get(2))?;
            let hay = char_slice(s, start, end);
            let reverse = matches!(method, StrMethod::Rfind | StrMethod::Rindex);
            let found = if reverse { hay.rfind(&needle) } else { hay.find(&needle) };
            match found {
                Some(byte_pos) => {
                    let char_pos = hay[..byte_pos].chars().count() as i64 + start;
                    Ok(Value::Int(char_pos).into())
                }
                None if matches!(method, StrMethod::Find | StrMethod::Rfind) => Ok(Value::Int(-1).into()),
                None => Err(Exception::value_error("substring not found")),
            }
        }
        StrMethod::Partition | StrMethod::Rpartition => {
            let sep = as_str(args.first().unwrap_or(&Value::None), "sep")?;
            if sep.is_empty() {
                return Err(Exception::value_error("empty separator"));
            }
            let found = if method == StrMethod::Partition {
                s.split_once(&sep)
            } else {
                s.rsplit_once(&sep)
            };
            let (a, b, c) = match found {
                Some((before, after)) => (before.to_string(), sep, after.to_string()),
                None if method == StrMethod::Partition => (s.to_string(), String::new(), String::new()),
                None => (String::new(), String::new(), s.to_string()),
            };
            Ok(Value::tuple(vec![Value::str(a), Value::str(b), Value::str(c)]).into())
        }
        StrMethod::Count => {
            let needle = as_str(args.first().unwrap_or(&Value::None), "substring")?;
            let (start, end) = start_end(s, args.get(1), args.get(2))?;
            let hay = char_slice(s, start, end);
            let count = if needle.is_empty() {
                hay.chars().count() as i64 + 1
            } else {
                hay.matches(&needle).count() as i64
            };
            Ok(Value::Int(count).into())
        }
        StrMethod::Format => {
            let kwargs = std::mem::take(&mut call_args.kwargs);
            str_format(s, &call_args.args, &kwargs).map(|out| Value::str(out).into())
        }
        StrMethod::Isdigit => ok_is(s, |c| c.is_ascii_digit() || c.is_numeric() && !c.is_alphabetic()),
        StrMethod::Isnumeric => ok_is(s, char::is_numeric),
        StrMethod::Isalpha => ok_is(s, char::is_alphabetic),
        StrMethod::Isalnum => ok_is(s, char::is_alphanumeric),
        StrMethod::Isspace => ok_is(s, char::is_whitespace),
        StrMethod::Isupper => Ok(Value::Bool(
            s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase),
        )
        .into()),
        StrMethod::Islower => Ok(Value::Bool(
            s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase),
        )
        .into()),
        StrMethod::Istitle => Ok(Value::Bool(!s.is_empty() && title_case(s) == s).into()),
        StrMethod::Isidentifier => {
            let mut chars = s.chars();
            let head_ok = chars
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_');
            Ok(Value::Bool(head_ok && chars.all(|c| c.is_alphanumeric() || c == '_')).into())
        }
        StrMethod::Zfill => {
            let width = as_int(args.first().unwrap_or(&Value::None), "width")? as usize;
            let len = s.chars().count();
            if len >= width {
                return ok_str(s.to_string());
            }
            let fill = "0".repeat(width - len);
            ok_str(match s.strip_prefix(['-', '+']) {
                Some(rest) => format!("{}{fill}{rest}", &s[..1]),
                None => format!("{fill}{s}"),
            })
        }
        StrMethod::Center | StrMethod::Ljust | StrMethod::Rjust => {
            let width = as_int(args.first().unwrap_or(&Value::None), "width")?.max(0) as usize;
            let fill = match args.get(1) {
                Some(v) => {
                    let f = as_str(v, "fillchar")?;
                    f.chars()
                        .next()
                        .filter(|_| f.chars().count() == 1)
                        .ok_or_else(|| {
                            Exception::type_error("the fill character must be exactly one character long")
                        })?
                }
                None => ' ',
            };
            let len = s.chars().count();
            if len >= width {
                return ok_str(s.to_string());
            }
            let pad = width - len;
            ok_str(match method {
                StrMethod::Ljust => format!("{s}{}", fill.to_string().repeat(pad)),
                StrMethod::Rjust => format!("{}{s}", fill.to_string().repeat(pad)),
                _ => {
                    let left = pad / 2;
                    format!(
                        "{}{s}{}",
                        fill.to_string().repeat(left),
                        fill.to_string().repeat(pad - left)
                    )
                }
            })
        }
        StrMethod::Expandtabs => {
            let tabsize = match args.first() {
                Some(v) => as_int(v, "tabsize")?.max(0) as usize,
                None => 8,
            };
            let mut out = String::with_capacity(s.len());
            let mut col = 0usize;
            for c in s.chars() {
                match c {
                    '\t' => {
                        let pad = if tabsize == 0 { 0 } else { tabsize - col % tabsize };
                        out.push_str(&" ".repeat(pad));
                        col += pad;
                    }
                    '\n' | '\r' => {
                        out.push(c);
                        col = 0;
                    }
                    c => {
                        out.push(c);
                        col += 1;
                    }
                }
            }
            ok_str(out)
        }
        // bytes are not part of this interpreter's value model; encode is
        // accepted for source compatibility and yields the text unchanged
        StrMethod::Encode => ok_str(s.to_string()),
        StrMethod::Removeprefix => {
            let prefix = as_str(args.first().unwrap_or(&Value::None), "prefix")?;
            ok_str(s.strip_prefix(&prefix).unwrap_or(s).to_string())
        }
        StrMethod::Removesuffix => {
            let suffix = as_str(args.first().unwrap_or(&Value::None), "suffix")?;
            ok_str(s.strip_suffix(&suffix).unwrap_or(s).to_string())
        }
    }
}

fn ok_str(s: String) -> Result<Outcome, Exception> {
    Ok(Value::str(s).into())
}

fn ok_is(s: &str, pred: impl Fn(char) -> bool) -> Result<Outcome, Exception> {
    Ok(Value::Bool(!s.is_empty() && s.chars().all(pred)).into())
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Resolves optional start/end char indices Python-style (clamped, negatives
/// from the end).
fn start_end(s: &str, start: Option<&Value>, end: Option<&Value>) -> Result<(i64, i64), Exception> {
    let len = s.chars().count() as i64;
    let resolve = |v: Option<&Value>, default: i64| -> Result<i64, Exception> {
        match v {
            None | Some(Value::None) => Ok(default),
            Some(v) => {
                let mut i = as_int(v, "index")?;
                if i < 0 {
                    i += len;
                }
                Ok(i.clamp(0, len))
            }
        }
    };
    let start = resolve(start, 0)?;
    let end = resolve(end, len)?;
    Ok((start, end.max(start)))
}

/// Substring by char positions.
fn char_slice(s: &str, start: i64, end: i64) -> String {
    s.chars()
        .skip(start.max(0) as usize)
        .take((end - start).max(0) as usize)
        .collect()
}

fn split(s: &str, sep: Option<&str>, maxsplit: i64, from_right: bool) -> Result<Vec<String>, Exception> {
    if let Some(sep) = sep {
        if sep.is_empty() {
            return Err(Exception::value_error("empty separator"));
        }
        let unlimited: Vec<String> = s.split(sep).map(String::from).collect();
        if maxsplit < 0 || unlimited.len() as i64 <= maxsplit + 1 {
            return Ok(unlimited);
        }
        let cut = maxsplit as usize;
        if from_right {
            let keep = unlimited.len() - cut;
            let head = unlimited[..keep].join(sep);
            let mut out = vec![head];
            out.extend(unlimited[keep..].iter().cloned());
            Ok(out)
        } else {
            let mut out: Vec<String> = unlimited[..cut].to_vec();
            out.push(unlimited[cut..].join(sep));
            Ok(out)
        }
    } else {
        // whitespace splitting ignores leading/trailing runs
        let words: Vec<String> = s.split_whitespace().map(String::from).collect();
        if maxsplit < 0 || words.len() as i64 <= maxsplit + 1 {
            return Ok(words);
        }
        // re-split preserving the tail beyond maxsplit
        let mut out = Vec::new();
        let mut rest = s.trim_start();
        let mut splits = 0;
        while splits < maxsplit {
            match rest.find(char::is_whitespace) {
                Some(pos) => {
                    out.push(rest[..pos].to_string());
                    rest = rest[pos..].trim_start();
                    splits += 1;
                }
                None => break,
            }
        }
        if !rest.is_empty() {
            let trimmed = if from_right { rest } else { rest.trim_end() };
            out.push(trimmed.to_string());
        }
        Ok(out)
    }
}

fn splitlines(s: &str, keepends: bool) -> Vec<String> {
    let mut out = Vec::new();
    let mut line = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                if keepends {
                    line.push('\n');
                }
                out.push(std::mem::take(&mut line));
            }
            '\r' => {
                if keepends {
                    line.push('\r');
                }
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    if keepends {
                        line.push('\n');
                    }
                }
                out.push(std::mem::take(&mut line));
            }
            c => line.push(c),
        }
    }
    if !line.is_empty() {
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::py_str;

    fn call_str(method: StrMethod, recv: &str, args: Vec<Value>) -> Value {
        let mut ctx = Ctx::default();
        match call(method, &Value::str(recv), CallArgs::positional(args), &mut ctx).unwrap() {
            Outcome::Value(v) => v,
            Outcome::Request(_) => panic!("unexpected request"),
        }
    }

    #[test]
    fn split_maxsplit_and_rsplit() {
        let v = call_str(
            StrMethod::Split,
            "a,b,c,d",
            vec![Value::str(","), Value::Int(2)],
        );
        assert_eq!(py_str(&v), "['a', 'b', 'c,d']");
        let v = call_str(
            StrMethod::Rsplit,
            "a,b,c,d",
            vec![Value::str(","), Value::Int(2)],
        );
        assert_eq!(py_str(&v), "['a,b', 'c', 'd']");
    }

    #[test]
    fn whitespace_split_collapses_runs() {
        let v = call_str(StrMethod::Split, "  a \t b  ", vec![]);
        assert_eq!(py_str(&v), "['a', 'b']");
    }

    #[test]
    fn find_honors_char_indices() {
        let v = call_str(StrMethod::Find, "héllo", vec![Value::str("llo")]);
        assert!(matches!(v, Value::Int(2)));
        let v = call_str(StrMethod::Find, "abc", vec![Value::str("z")]);
        assert!(matches!(v, Value::Int(-1)));
    }

    #[test]
    fn partition_variants() {
        let v = call_str(StrMethod::Partition, "k=v=w", vec![Value::str("=")]);
        assert_eq!(py_str(&v), "('k', '=', 'v=w')");
        let v = call_str(StrMethod::Rpartition, "k=v=w", vec![Value::str("=")]);
        assert_eq!(py_str(&v), "('k=v', '=', 'w')");
        let v = call_str(StrMethod::Partition, "plain", vec![Value::str("=")]);
        assert_eq!(py_str(&v), "('plain', '', '')");
    }

    #[test]
    fn zfill_keeps_sign() {
        let v = call_str(StrMethod::Zfill, "-42", vec![Value::Int(6)]);
        assert_eq!(py_str(&v), "-00042");
    }

    #[test]
    fn title_and_istitle() {
        let v = call_str(StrMethod::Title, "hello world", vec![]);
        assert_eq!(py_str(&v), "Hello World");
        let v = call_str(StrMethod::Istitle, "Hello World", vec![]);
        assert!(matches!(v, Value::Bool(true)));
    }
}
