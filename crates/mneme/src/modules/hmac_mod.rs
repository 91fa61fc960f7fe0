//! The `hmac` module.

use std::cell::RefCell;
use std::rc::Rc;

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::{
    exception::Exception,
    import::module_attr,
    modules::{hashlib::{hex, Algo}, module_value, native, str_arg},
    value::{type_name, Value},
};

pub(crate) fn module() -> Value {
    module_value(
        "hmac",
        vec![
            ("new", native("new", |args| {
                let key = str_arg(&args, 0, "new")?;
                let message = match args.get(1) {
                    None | Some(Value::None) => String::new(),
                    Some(Value::Str(s)) => s.to_string(),
                    Some(other) => {
                        return Err(Exception::type_error(format!(
                            "new() argument 2 must be str or None, not {}",
                            type_name(other)
                        )));
                    }
                };
                let algo = digestmod(args.get(2))?;
                Ok(hmac_object(algo, key.into_bytes(), message.into_bytes()))
            })),
            ("compare_digest", native("compare_digest", |args| {
                let a = str_arg(&args, 0, "compare_digest")?;
                let b = str_arg(&args, 1, "compare_digest")?;
                // constant-time over the shorter input
                let mut diff = u32::from(a.len() != b.len());
                for (x, y) in a.bytes().zip(b.bytes()) {
                    diff |= u32::from(x ^ y);
                }
                Ok(Value::Bool(diff == 0))
            })),
        ],
    )
}

/// Accepts a hashlib constructor, a digest name, or a hashlib module object.
fn digestmod(v: Option<&Value>) -> Result<Algo, Exception> {
    let name = match v {
        Some(Value::Str(s)) => s.to_string(),
        Some(Value::Native(native)) => native.name.clone(),
        Some(module @ Value::Module(_)) => match module_attr(module, "name") {
            Some(Value::Str(s)) => s.to_string(),
            _ => return Err(Exception::type_error("unsupported digestmod")),
        },
        _ => {
            return Err(Exception::type_error(
                "new() missing required argument: digestmod",
            ));
        }
    };
    Algo::from_name(&name).ok_or_else(|| Exception::value_error(format!("unsupported hash type {name}")))
}

pub(crate) fn hmac_digest(algo: Algo, key: &[u8], message: &[u8]) -> Vec<u8> {
    fn mac<M: Mac + hmac::digest::KeyInit>(key: &[u8], message: &[u8]) -> Vec<u8> {
        let mut mac = <M as Mac>::new_from_slice(key).unwrap_or_else(|_| {
            unreachable!("HMAC accepts keys of any length")
        });
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }
    match algo {
        Algo::Md5 => mac::<Hmac<Md5>>(key, message),
        Algo::Sha1 => mac::<Hmac<Sha1>>(key, message),
        Algo::Sha256 => mac::<Hmac<Sha256>>(key, message),
        Algo::Sha512 => mac::<Hmac<Sha512>>(key, message),
    }
}

fn hmac_object(algo: Algo, key: Vec<u8>, message: Vec<u8>) -> Value {
    let state = Rc::new(RefCell::new(message));
    let key = Rc::new(key);
    let update_state = state.clone();
    let hexdigest_state = state.clone();
    let digest_state = state;
    let hexdigest_key = key.clone();
    let digest_key = key;
    module_value(
        "hmac.HMAC",
        vec![
            ("update", native("update", move |args| {
                let data = str_arg(&args, 0, "update")?;
                update_state.borrow_mut().extend_from_slice(data.as_bytes());
                Ok(Value::None)
            })),
            ("hexdigest", native("hexdigest", move |_args| {
                Ok(Value::str(hex(&hmac_digest(
                    algo,
                    &hexdigest_key,
                    &hexdigest_state.borrow(),
                ))))
            })),
            ("digest", native("digest", move |_args| {
                Ok(Value::str(hex(&hmac_digest(algo, &digest_key, &digest_state.borrow()))))
            })),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 4231 test case 2.
    #[test]
    fn hmac_sha256_known_vector() {
        let digest = hmac_digest(Algo::Sha256, b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex(&digest),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
