//! The `string` module constants.

use crate::{
    modules::{module_value, native, str_arg},
    value::Value,
};

pub(crate) fn module() -> Value {
    module_value(
        "string",
        vec![
            ("ascii_lowercase", Value::str("abcdefghijklmnopqrstuvwxyz")),
            ("ascii_uppercase", Value::str("ABCDEFGHIJKLMNOPQRSTUVWXYZ")),
            (
                "ascii_letters",
                Value::str("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ"),
            ),
            ("digits", Value::str("0123456789")),
            ("hexdigits", Value::str("0123456789abcdefABCDEF")),
            ("octdigits", Value::str("01234567")),
            ("punctuation", Value::str("!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~")),
            ("whitespace", Value::str(" \t\n\r\x0b\x0c")),
            ("capwords", native("capwords", |args| {
                let text = str_arg(&args, 0, "capwords")?;
                let words: Vec<String> = text
                    .split_whitespace()
                    .map(|w| {
                        let mut chars = w.chars();
                        match chars.next() {
                            Some(first) => {
                                first.to_uppercase().collect::<String>()
                                    + &chars.as_str().to_lowercase()
                            }
                            None => String::new(),
                        }
                    })
                    .collect();
                Ok(Value::str(words.join(" ")))
            })),
        ],
    )
}
