//! String formatting: the format-spec mini-language (f-strings, `format()`,
//! `str.format`) and printf-style `%` formatting.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use crate::{
    exception::Exception,
    value::{float_repr, py_repr, py_str, type_name, Value},
};

/// A parsed format spec: `[[fill]align][sign][#][0][width][,_][.prec][type]`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Spec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    ty: Option<char>,
}

pub(crate) fn parse_spec(spec: &str) -> Result<Spec, Exception> {
    let invalid = || Exception::value_error(format!("Invalid format specifier '{spec}'"));
    let chars: Vec<char> = spec.chars().collect();
    let mut out = Spec::default();
    let mut i = 0;

    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^' | '=') {
        out.fill = Some(chars[0]);
        out.align = Some(chars[1]);
        i = 2;
    } else if !chars.is_empty() && matches!(chars[0], '<' | '>' | '^' | '=') {
        out.align = Some(chars[0]);
        i = 1;
    }
    if i < chars.len() && matches!(chars[i], '+' | '-' | ' ') {
        out.sign = Some(chars[i]);
        i += 1;
    }
    if i < chars.len() && chars[i] == '#' {
        out.alternate = true;
        i += 1;
    }
    if i < chars.len() && chars[i] == '0' {
        out.zero = true;
        i += 1;
    }
    let width_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i > width_start {
        out.width = chars[width_start..i]
            .iter()
            .collect::<String>()
            .parse()
            .map_err(|_| invalid())?;
    }
    if i < chars.len() && matches!(chars[i], ',' | '_') {
        out.grouping = Some(chars[i]);
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        let prec_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == prec_start {
            return Err(invalid());
        }
        out.precision = Some(
            chars[prec_start..i]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| invalid())?,
        );
    }
    if i < chars.len() {
        out.ty = Some(chars[i]);
        i += 1;
    }
    if i != chars.len() {
        return Err(invalid());
    }
    Ok(out)
}

/// Formats one value against a format spec string.
pub(crate) fn format_value(value: &Value, spec: &str) -> Result<String, Exception> {
    let spec = parse_spec(spec)?;
    let body = match spec.ty {
        // default formatting: ints render as 'd', floats as their repr
        // (precision switches them to 'g'), everything else as str()
        None if matches!(value, Value::Int(_) | Value::BigInt(_) | Value::Bool(_)) => {
            return Ok(pad(format_int(value, &spec, 'd')?, &spec, true));
        }
        None if matches!(value, Value::Float(_)) => {
            if spec.precision.is_some() {
                return format_float_like(value, &spec, 'g');
            }
            let Value::Float(f) = value else { unreachable!() };
            let sign = sign_str(f.is_sign_negative() && !f.is_nan(), &spec);
            let body = float_repr(f.abs());
            let body = match spec.grouping {
                Some(sep) => group_float(&body, sep),
                None => body,
            };
            return Ok(pad(format!("{sign}{body}"), &spec, true));
        }
        None | Some('s') => {
            if matches!(spec.ty, Some('s')) && !matches!(value, Value::Str(_)) {
                return Err(Exception::type_error(format!(
                    "unsupported format string passed to {}.__format__",
                    type_name(value)
                )));
            }
            let mut s = py_str(value);
            if let Some(prec) = spec.precision {
                s = s.chars().take(prec).collect();
            }
            s
        }
        Some(t @ ('d' | 'n' | 'x' | 'X' | 'o' | 'b' | 'c')) => {
            return Ok(pad(format_int(value, &spec, t)?, &spec, t != 'c'));
        }
        Some(t @ ('f' | 'F' | 'e' | 'E' | 'g' | 'G' | '%')) => {
            return format_float_like(value, &spec, t);
        }
        Some(other) => {
            return Err(Exception::value_error(format!(
                "Unknown format code '{other}' for object of type '{}'",
                type_name(value)
            )));
        }
    };
    Ok(pad(body, &spec, false))
}

fn int_of(value: &Value, what: char) -> Result<BigInt, Exception> {
    match value {
        Value::Int(i) => Ok(BigInt::from(*i)),
        Value::BigInt(b) => Ok((**b).clone()),
        Value::Bool(b) => Ok(BigInt::from(i64::from(*b))),
        other => Err(Exception::value_error(format!(
            "Unknown format code '{what}' for object of type '{}'",
            type_name(other)
        ))),
    }
}

fn format_int(value: &Value, spec: &Spec, ty: char) -> Result<String, Exception> {
    let n = int_of(value, ty)?;
    if ty == 'c' {
        let code = n
            .to_u32()
            .and_then(char::from_u32)
            .ok_or_else(|| Exception::overflow_error("%c arg not in range(0x110000)"))?;
        return Ok(code.to_string());
    }
    let magnitude = n.abs();
    let digits = match ty {
        'x' => magnitude.to_str_radix(16),
        'X' => magnitude.to_str_radix(16).to_uppercase(),
        'o' => magnitude.to_str_radix(8),
        'b' => magnitude.to_str_radix(2),
        _ => magnitude.to_str_radix(10),
    };
    let digits = match spec.grouping {
        Some(sep) if matches!(ty, 'd' | 'n') => group_digits(&digits, sep, 3),
        Some(sep) => group_digits(&digits, sep, 4),
        None => digits,
    };
    let prefix = if spec.alternate {
        match ty {
            'x' => "0x",
            'X' => "0X",
            'o' => "0o",
            'b' => "0b",
            _ => "",
        }
    } else {
        ""
    };
    let sign = sign_str(n.is_negative(), spec);
    Ok(format!("{sign}{prefix}{digits}"))
}

fn format_float_like(value: &Value, spec: &Spec, ty: char) -> Result<String, Exception> {
    let f = match value {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        Value::Bool(b) => f64::from(i8::from(*b)),
        Value::BigInt(b) => b.to_f64().unwrap_or(f64::INFINITY),
        other => {
            return Err(Exception::value_error(format!(
                "Unknown format code '{ty}' for object of type '{}'",
                type_name(other)
            )));
        }
    };
    let (f, suffix) = if ty == '%' { (f * 100.0, "%") } else { (f, "") };
    let magnitude = f.abs();
    let body = if magnitude.is_nan() {
        "nan".to_string()
    } else if magnitude.is_infinite() {
        "inf".to_string()
    } else {
        let prec = spec.precision.unwrap_or(6);
        match ty {
            'f' | 'F' | '%' => {
                let s = format!("{magnitude:.prec$}");
                match spec.grouping {
                    Some(sep) => group_float(&s, sep),
                    None => s,
                }
            }
            'e' => exp_format(magnitude, prec, false),
            'E' => exp_format(magnitude, prec, true),
            'g' | 'G' => {
                let s = general_format(magnitude, prec.max(1));
                if ty == 'G' { s.to_uppercase() } else { s }
            }
            _ => float_repr(magnitude),
        }
    };
    let body = if ty == 'F' { body.to_uppercase() } else { body };
    let sign = sign_str(f.is_sign_negative() && !f.is_nan(), spec);
    Ok(pad(format!("{sign}{body}{suffix}"), spec, true))
}

fn exp_format(magnitude: f64, prec: usize, upper: bool) -> String {
    let s = format!("{magnitude:.prec$e}");
    // normalize Rust's `1.5e7` exponent into Python's `1.5e+07`
    let (mantissa, exp) = s.split_once('e').unwrap_or((s.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{}{:02}", if exp < 0 { '-' } else { '+' }, exp.abs())
}

fn general_format(magnitude: f64, prec: usize) -> String {
    if magnitude == 0.0 {
        return "0".to_string();
    }
    let exp = magnitude.abs().log10().floor() as i32;
    if exp < -4 || exp >= prec as i32 {
        let formatted = exp_format(magnitude, prec.saturating_sub(1), false);
        // strip trailing zeros in the mantissa
        match formatted.split_once('e') {
            Some((mantissa, exp_part)) => {
                let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
                format!("{mantissa}e{exp_part}")
            }
            None => formatted,
        }
    } else {
        let decimals = (prec as i32 - 1 - exp).max(0) as usize;
        let s = format!("{magnitude:.decimals$}");
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    }
}

fn sign_str(negative: bool, spec: &Spec) -> &'static str {
    if negative {
        "-"
    } else {
        match spec.sign {
            Some('+') => "+",
            Some(' ') => " ",
            _ => "",
        }
    }
}

fn group_digits(digits: &str, sep: char, every: usize) -> String {
    let mut out = String::new();
    let chars: Vec<char> = digits.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % every == 0 {
            out.push(sep);
        }
        out.push(*c);
    }
    out
}

fn group_float(s: &str, sep: char) -> String {
    match s.split_once('.') {
        Some((int_part, frac)) => format!("{}.{frac}", group_digits(int_part, sep, 3)),
        None => group_digits(s, sep, 3),
    }
}

fn pad(body: String, spec: &Spec, numeric: bool) -> String {
    let len = body.chars().count();
    if len >= spec.width {
        return body;
    }
    let total_pad = spec.width - len;
    let align = spec.align.unwrap_or(if spec.zero && numeric {
        '='
    } else if numeric {
        '>'
    } else {
        '<'
    });
    let fill = spec.fill.unwrap_or(if spec.zero && align == '=' { '0' } else { ' ' });
    let fill_str = |n: usize| fill.to_string().repeat(n);
    match align {
        '>' => format!("{}{body}", fill_str(total_pad)),
        '^' => {
            let left = total_pad / 2;
            format!("{}{body}{}", fill_str(left), fill_str(total_pad - left))
        }
        '=' => {
            // pad between sign and digits
            let split = body
                .find(|c: char| c != '+' && c != '-' && c != ' ')
                .unwrap_or(0);
            format!("{}{}{}", &body[..split], fill_str(total_pad), &body[split..])
        }
        _ => format!("{body}{}", fill_str(total_pad)),
    }
}

// --- str.format -------------------------------------------------------------

/// `template.format(*args, **kwargs)` with auto/explicit numbering, named
/// fields, `!s`/`!r` conversions and format specs. Attribute and index paths
/// inside replacement fields are not part of this surface.
pub(crate) fn str_format(
    template: &str,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> Result<String, Exception> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto_index = 0usize;
    let mut saw_auto = false;
    let mut saw_explicit = false;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(Exception::value_error("Single '}' encountered in format string"));
            }
            '{' => {
                let mut field = String::new();
                let mut depth = 1;
                for c in chars.by_ref() {
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    field.push(c);
                }
                if depth != 0 {
                    return Err(Exception::value_error("Single '{' encountered in format string"));
                }
                let (name_conv, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let (name, conversion) = match name_conv.split_once('!') {
                    Some((n, conv)) => (n, Some(conv)),
                    None => (name_conv, None),
                };
                let value = if name.is_empty() {
                    if saw_explicit {
                        return Err(Exception::value_error(
                            "cannot switch from manual field specification to automatic field numbering",
                        ));
                    }
                    saw_auto = true;
                    let v = args.get(auto_index).ok_or_else(|| {
                        Exception::index_error("Replacement index out of range for positional args tuple")
                    })?;
                    auto_index += 1;
                    v.clone()
                } else if let Ok(index) = name.parse::<usize>() {
                    if saw_auto {
                        return Err(Exception::value_error(
                            "cannot switch from automatic field numbering to manual field specification",
                        ));
                    }
                    saw_explicit = true;
                    args.get(index)
                        .ok_or_else(|| {
                            Exception::index_error("Replacement index out of range for positional args tuple")
                        })?
                        .clone()
                } else {
                    kwargs
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| Exception::key_error(format!("'{name}'")))?
                };
                let value = match conversion {
                    Some("r") => Value::str(py_repr(&value)),
                    Some("s" | "a") => Value::str(py_str(&value)),
                    Some(other) => {
                        return Err(Exception::value_error(format!(
                            "Unknown conversion specifier {other}"
                        )));
                    }
                    None => value,
                };
                out.push_str(&format_value(&value, spec)?);
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

// --- % formatting -----------------------------------------------------------

/// `fmt % values` with `%s %r %d %i %f %e %E %g %G %x %o %c %%`, flags
/// `- + 0 space #`, width and precision.
pub(crate) fn percent_format(fmt: &str, values: &Value) -> Result<String, Exception> {
    let items: Vec<Value> = match values {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    let mut next = 0usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        // flags
        let mut spec = Spec::default();
        let mut left_align = false;
        loop {
            match chars.peek() {
                Some('-') => {
                    left_align = true;
                    chars.next();
                }
                Some('+') => {
                    spec.sign = Some('+');
                    chars.next();
                }
                Some(' ') => {
                    if spec.sign.is_none() {
                        spec.sign = Some(' ');
                    }
                    chars.next();
                }
                Some('0') => {
                    spec.zero = true;
                    chars.next();
                }
                Some('#') => {
                    spec.alternate = true;
                    chars.next();
                }
                _ => break,
            }
        }
        // width
        let mut width = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_digit() {
                width.push(*c);
                chars.next();
            } else {
                break;
            }
        }
        spec.width = width.parse().unwrap_or(0);
        // precision
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut prec = String::new();
            while let Some(c) = chars.peek() {
                if c.is_ascii_digit() {
                    prec.push(*c);
                    chars.next();
                } else {
                    break;
                }
            }
            spec.precision = Some(prec.parse().unwrap_or(0));
        }
        if left_align {
            spec.align = Some('<');
            spec.zero = false;
        }
        let conv = chars
            .next()
            .ok_or_else(|| Exception::value_error("incomplete format"))?;
        let arg = items.get(next).ok_or_else(|| {
            Exception::type_error("not enough arguments for format string")
        })?;
        next += 1;
        let piece = match conv {
            's' => pad(clip_precision(py_str(arg), spec.precision), &spec, false),
            'r' => pad(clip_precision(py_repr(arg), spec.precision), &spec, false),
            'd' | 'i' => {
                let body = format_int(arg, &Spec { alternate: false, ..spec.clone() }, 'd')?;
                pad(body, &spec, true)
            }
            'x' | 'X' | 'o' => {
                let body = format_int(arg, &spec, conv)?;
                pad(body, &spec, true)
            }
            'c' => pad(format_int(arg, &spec, 'c')?, &spec, false),
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' => format_float_like(arg, &spec, conv)?,
            other => {
                return Err(Exception::value_error(format!(
                    "unsupported format character '{other}'"
                )));
            }
        };
        out.push_str(&piece);
    }
    if next < items.len() && matches!(values, Value::Tuple(_)) {
        return Err(Exception::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

fn clip_precision(s: String, precision: Option<usize>) -> String {
    match precision {
        Some(p) => s.chars().take(p).collect(),
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_padding_and_sign() {
        assert_eq!(format_value(&Value::Int(42), ">8").unwrap(), "      42");
        assert_eq!(format_value(&Value::Int(42), "08").unwrap(), "00000042");
        assert_eq!(format_value(&Value::Int(-42), "08").unwrap(), "-0000042");
        assert_eq!(format_value(&Value::Int(42), "+d").unwrap(), "+42");
        assert_eq!(format_value(&Value::str("hi"), "*^6").unwrap(), "**hi**");
    }

    #[test]
    fn spec_float_types() {
        assert_eq!(format_value(&Value::Float(3.14159), ".2f").unwrap(), "3.14");
        assert_eq!(format_value(&Value::Float(1234.5), ",.1f").unwrap(), "1,234.5");
        assert_eq!(format_value(&Value::Float(0.25), ".0%").unwrap(), "25%");
        assert_eq!(format_value(&Value::Float(15000.0), ".2e").unwrap(), "1.50e+04");
    }

    #[test]
    fn spec_int_bases() {
        assert_eq!(format_value(&Value::Int(255), "x").unwrap(), "ff");
        assert_eq!(format_value(&Value::Int(255), "#X").unwrap(), "0XFF");
        assert_eq!(format_value(&Value::Int(5), "03b").unwrap(), "101");
        assert_eq!(format_value(&Value::Int(1234567), ",d").unwrap(), "1,234,567");
    }

    #[test]
    fn str_format_fields() {
        assert_eq!(
            str_format("{} and {}", &[Value::Int(1), Value::Int(2)], &[]).unwrap(),
            "1 and 2"
        );
        assert_eq!(
            str_format("{1}-{0}", &[Value::str("a"), Value::str("b")], &[]).unwrap(),
            "b-a"
        );
        assert_eq!(
            str_format("{name!r}", &[], &[("name".to_string(), Value::str("x"))]).unwrap(),
            "'x'"
        );
        assert_eq!(
            str_format("{{literal}}", &[], &[]).unwrap(),
            "{literal}"
        );
    }

    #[test]
    fn percent_basics() {
        let args = Value::tuple(vec![Value::str("x"), Value::Int(7)]);
        assert_eq!(percent_format("%s=%03d", &args).unwrap(), "x=007");
        assert_eq!(
            percent_format("%.2f", &Value::Float(2.718)).unwrap(),
            "2.72"
        );
        assert_eq!(percent_format("%x", &Value::Int(255)).unwrap(), "ff");
        assert_eq!(percent_format("100%%", &Value::tuple(vec![])).unwrap(), "100%");
        assert_eq!(
            percent_format("%r", &Value::str("q")).unwrap(),
            "'q'"
        );
    }

    #[test]
    fn percent_arity_errors() {
        let err = percent_format("%s %s", &Value::str("only")).unwrap_err();
        assert_eq!(err.kind, crate::exception::ExcType::TypeError);
        let extra = Value::tuple(vec![Value::Int(1), Value::Int(2)]);
        let err = percent_format("%s", &extra).unwrap_err();
        assert!(err.message.contains("not all arguments converted"));
    }
}
