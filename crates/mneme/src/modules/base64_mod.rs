//! The `base64` module (standard and URL-safe alphabets, string in/out).

use crate::{
    exception::Exception,
    modules::{module_value, native, str_arg},
    value::Value,
};

const STD: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const URL: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

pub(crate) fn module() -> Value {
    module_value(
        "base64",
        vec![
            ("b64encode", codec_encode("b64encode", STD)),
            ("b64decode", codec_decode("b64decode", STD)),
            ("urlsafe_b64encode", codec_encode("urlsafe_b64encode", URL)),
            ("urlsafe_b64decode", codec_decode("urlsafe_b64decode", URL)),
        ],
    )
}

fn codec_encode(name: &'static str, alphabet: &'static [u8; 64]) -> Value {
    native(name, move |args| {
        let data = str_arg(&args, 0, name)?;
        Ok(Value::str(encode(data.as_bytes(), alphabet)))
    })
}

fn codec_decode(name: &'static str, alphabet: &'static [u8; 64]) -> Value {
    native(name, move |args| {
        let data = str_arg(&args, 0, name)?;
        let bytes = decode(&data, alphabet)?;
        String::from_utf8(bytes)
            .map(Value::str)
            .map_err(|_| Exception::value_error("decoded data is not valid UTF-8"))
    })
}

pub(crate) fn encode(data: &[u8], alphabet: &[u8; 64]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b = [
            chunk[0],
            chunk.get(1).copied().unwrap_or(0),
            chunk.get(2).copied().unwrap_or(0),
        ];
        let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        out.push(alphabet[(n >> 18) as usize & 63] as char);
        out.push(alphabet[(n >> 12) as usize & 63] as char);
        out.push(if chunk.len() > 1 { alphabet[(n >> 6) as usize & 63] as char } else { '=' });
        out.push(if chunk.len() > 2 { alphabet[n as usize & 63] as char } else { '=' });
    }
    out
}

pub(crate) fn decode(text: &str, alphabet: &[u8; 64]) -> Result<Vec<u8>, Exception> {
    let invalid = || Exception::value_error("Invalid base64-encoded string");
    let cleaned: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if cleaned.len() % 4 != 0 {
        return Err(invalid());
    }
    let value_of = |c: u8| -> Result<u32, Exception> {
        alphabet
            .iter()
            .position(|a| *a == c)
            .map(|p| p as u32)
            .ok_or_else(invalid)
    };
    let mut out = Vec::with_capacity(cleaned.len() / 4 * 3);
    for chunk in cleaned.chunks(4) {
        let pad = chunk.iter().rev().take_while(|b| **b == b'=').count();
        if pad > 2 {
            return Err(invalid());
        }
        let mut n = 0u32;
        for (i, c) in chunk.iter().enumerate() {
            let part = if *c == b'=' { 0 } else { value_of(*c)? };
            n |= part << (18 - 6 * i as u32);
        }
        out.push((n >> 16) as u8);
        if pad < 2 {
            out.push((n >> 8) as u8);
        }
        if pad < 1 {
            out.push(n as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        assert_eq!(encode(b"hello world", STD), "aGVsbG8gd29ybGQ=");
        assert_eq!(decode("aGVsbG8gd29ybGQ=", STD).unwrap(), b"hello world");
        assert_eq!(encode(b"a", STD), "YQ==");
        assert_eq!(decode("YQ==", STD).unwrap(), b"a");
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("not base64!", STD).is_err());
        assert!(decode("abc", STD).is_err());
    }
}
