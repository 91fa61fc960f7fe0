//! The `hashlib` module: md5, sha1, sha256, sha512.
//!
//! Digest objects buffer their input and compute on demand. Because the
//! value model has no bytes type, inputs are strings (hashed as UTF-8) and
//! `digest()` returns the hex form like `hexdigest()`.

use std::cell::RefCell;
use std::rc::Rc;

use md5::{Digest as _, Md5};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::{
    exception::Exception,
    modules::{module_value, native, str_arg},
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Algo {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl Algo {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "md5" => Some(Self::Md5),
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    pub(crate) fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Md5 => Md5::digest(data).to_vec(),
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

pub(crate) fn module() -> Value {
    module_value(
        "hashlib",
        vec![
            ("md5", constructor(Algo::Md5)),
            ("sha1", constructor(Algo::Sha1)),
            ("sha256", constructor(Algo::Sha256)),
            ("sha512", constructor(Algo::Sha512)),
            ("new", native("new", |args| {
                let name = str_arg(&args, 0, "new")?;
                let algo = Algo::from_name(&name).ok_or_else(|| {
                    Exception::value_error(format!("unsupported hash type {name}"))
                })?;
                let initial = match args.get(1) {
                    Some(Value::Str(s)) => s.as_bytes().to_vec(),
                    _ => Vec::new(),
                };
                Ok(hash_object(algo, initial))
            })),
        ],
    )
}

fn constructor(algo: Algo) -> Value {
    native(algo.name(), move |args| {
        let initial = match args.first() {
            Some(Value::Str(s)) => s.as_bytes().to_vec(),
            None => Vec::new(),
            Some(other) => {
                return Err(Exception::type_error(format!(
                    "{}() argument must be str, not {}",
                    algo.name(),
                    crate::value::type_name(other)
                )));
            }
        };
        Ok(hash_object(algo, initial))
    })
}

/// A digest object: buffered input plus `update`/`hexdigest`/`digest`/`copy`.
fn hash_object(algo: Algo, initial: Vec<u8>) -> Value {
    let buffer = Rc::new(RefCell::new(initial));
    let update_buffer = buffer.clone();
    let hexdigest_buffer = buffer.clone();
    let digest_buffer = buffer.clone();
    let copy_buffer = buffer;
    module_value(
        "hashlib.hash",
        vec![
            ("name", Value::str(algo.name())),
            ("update", native("update", move |args| {
                let data = str_arg(&args, 0, "update")?;
                update_buffer.borrow_mut().extend_from_slice(data.as_bytes());
                Ok(Value::None)
            })),
            ("hexdigest", native("hexdigest", move |_args| {
                Ok(Value::str(hex(&algo.digest(&hexdigest_buffer.borrow()))))
            })),
            ("digest", native("digest", move |_args| {
                Ok(Value::str(hex(&algo.digest(&digest_buffer.borrow()))))
            })),
            ("copy", native("copy", move |_args| {
                Ok(hash_object(algo, copy_buffer.borrow().clone()))
            })),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            hex(&Algo::Sha256.digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn md5_known_vector() {
        assert_eq!(hex(&Algo::Md5.digest(b"")), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
