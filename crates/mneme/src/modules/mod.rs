//! Built-in stdlib module implementations.
//!
//! Each module is a plug-in conforming to the module protocol: a name →
//! value mapping built fresh per import request. The registry itself (this
//! match) is process-lifetime.

use crate::{
    builtins::Outcome,
    context::Ctx,
    eval::Interp,
    exception::Exception,
    value::{ModuleValue, NativeFn, Value},
};

pub(crate) mod base64_mod;
pub(crate) mod collections;
pub(crate) mod datetime_mod;
pub(crate) mod hashlib;
pub(crate) mod hmac_mod;
pub(crate) mod json;
pub(crate) mod math;
pub(crate) mod os;
pub(crate) mod random_mod;
pub(crate) mod re;
pub(crate) mod requests_mod;
pub(crate) mod string_mod;
pub(crate) mod time_mod;

/// Resolves a stdlib module by name.
pub(crate) fn resolve(interp: &mut Interp, name: &str) -> Option<Value> {
    Some(match name {
        "math" => math::module(),
        "json" => json::module(),
        "re" => re::module(),
        "collections" => collections::module(),
        "hashlib" => hashlib::module(),
        "hmac" => hmac_mod::module(),
        "base64" => base64_mod::module(),
        "os" => os::module(interp.ctx),
        "time" => time_mod::module(),
        "random" => random_mod::module(),
        "datetime" => datetime_mod::module(),
        "string" => string_mod::module(),
        "requests" => requests_mod::module(),
        _ => return None,
    })
}

/// Builds a module value from `(name, value)` pairs.
pub(crate) fn module_value(name: &str, entries: Vec<(&str, Value)>) -> Value {
    Value::Module(ModuleValue::new(
        name,
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    ))
}

/// Wraps a positional-only callback as a native function value.
pub(crate) fn native(
    name: &'static str,
    f: impl Fn(Vec<Value>) -> Result<Value, Exception> + 'static,
) -> Value {
    Value::Native(NativeFn::new(name, move |args, _kwargs, _ctx| {
        f(args).map(Outcome::Value)
    }))
}

/// Wraps a keyword-capable callback.
pub(crate) fn native_kw(
    name: &'static str,
    f: impl Fn(Vec<Value>, Vec<(String, Value)>) -> Result<Value, Exception> + 'static,
) -> Value {
    Value::Native(NativeFn::new(name, move |args, kwargs, _ctx| {
        f(args, kwargs).map(Outcome::Value)
    }))
}

/// Wraps a context-using callback (`ctx_call`-style: the callback receives
/// the execution context).
pub(crate) fn native_ctx(
    name: &'static str,
    f: impl Fn(Vec<Value>, Vec<(String, Value)>, &mut Ctx) -> Result<Value, Exception> + 'static,
) -> Value {
    Value::Native(NativeFn::new(name, move |args, kwargs, ctx| {
        f(args, kwargs, ctx).map(Outcome::Value)
    }))
}

/// Fetches a keyword argument by name.
pub(crate) fn kwarg(kwargs: &[(String, Value)], name: &str) -> Option<Value> {
    kwargs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

/// One required string argument.
pub(crate) fn str_arg(args: &[Value], index: usize, fn_name: &str) -> Result<String, Exception> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.to_string()),
        Some(other) => Err(Exception::type_error(format!(
            "{fn_name}() argument {index} must be str, not {}",
            crate::value::type_name(other)
        ))),
        None => Err(Exception::type_error(format!(
            "{fn_name}() missing required argument {index}"
        ))),
    }
}

/// One required float-able argument.
pub(crate) fn float_arg(args: &[Value], index: usize, fn_name: &str) -> Result<f64, Exception> {
    match args.get(index) {
        Some(Value::Float(f)) => Ok(*f),
        Some(Value::Int(i)) => Ok(*i as f64),
        Some(Value::Bool(b)) => Ok(f64::from(i8::from(*b))),
        Some(Value::BigInt(b)) => num_traits::ToPrimitive::to_f64(&**b)
            .ok_or_else(|| Exception::overflow_error("int too large to convert to float")),
        Some(other) => Err(Exception::type_error(format!(
            "{fn_name}() argument must be a real number, not '{}'",
            crate::value::type_name(other)
        ))),
        None => Err(Exception::type_error(format!(
            "{fn_name}() missing required argument {index}"
        ))),
    }
}

/// One required int argument.
pub(crate) fn int_arg(args: &[Value], index: usize, fn_name: &str) -> Result<i64, Exception> {
    match args.get(index) {
        Some(Value::Int(i)) => Ok(*i),
        Some(Value::Bool(b)) => Ok(i64::from(*b)),
        Some(other) => Err(Exception::type_error(format!(
            "{fn_name}() argument must be an integer, not '{}'",
            crate::value::type_name(other)
        ))),
        None => Err(Exception::type_error(format!(
            "{fn_name}() missing required argument {index}"
        ))),
    }
}
