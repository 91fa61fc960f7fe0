//! The `math` module.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, Zero};

use crate::{
    exception::Exception,
    modules::{float_arg, int_arg, kwarg, module_value, native, native_kw},
    value::Value,
};

pub(crate) fn module() -> Value {
    module_value(
        "math",
        vec![
            ("pi", Value::Float(std::f64::consts::PI)),
            ("e", Value::Float(std::f64::consts::E)),
            ("tau", Value::Float(std::f64::consts::TAU)),
            ("inf", Value::Float(f64::INFINITY)),
            ("nan", Value::Float(f64::NAN)),
            ("sqrt", unary("sqrt", |x| {
                if x < 0.0 {
                    Err(Exception::value_error("math domain error"))
                } else {
                    Ok(x.sqrt())
                }
            })),
            ("exp", unary("exp", |x| Ok(x.exp()))),
            ("log", native("log", |args| {
                let x = float_arg(&args, 0, "log")?;
                if x <= 0.0 {
                    return Err(Exception::value_error("math domain error"));
                }
                let result = match args.get(1) {
                    Some(base) => x.log(crate::modules::float_arg(&[base.clone()], 0, "log")?),
                    None => x.ln(),
                };
                Ok(Value::Float(result))
            })),
            ("log2", unary("log2", |x| domain_positive(x).map(f64::log2))),
            ("log10", unary("log10", |x| domain_positive(x).map(f64::log10))),
            ("sin", unary("sin", |x| Ok(x.sin()))),
            ("cos", unary("cos", |x| Ok(x.cos()))),
            ("tan", unary("tan", |x| Ok(x.tan()))),
            ("asin", unary("asin", |x| Ok(x.asin()))),
            ("acos", unary("acos", |x| Ok(x.acos()))),
            ("atan", unary("atan", |x| Ok(x.atan()))),
            ("atan2", native("atan2", |args| {
                let y = float_arg(&args, 0, "atan2")?;
                let x = float_arg(&args, 1, "atan2")?;
                Ok(Value::Float(y.atan2(x)))
            })),
            ("degrees", unary("degrees", |x| Ok(x.to_degrees()))),
            ("radians", unary("radians", |x| Ok(x.to_radians()))),
            ("hypot", native("hypot", |args| {
                let mut total = 0.0;
                for (i, _) in args.iter().enumerate() {
                    let side = float_arg(&args, i, "hypot")?;
                    total += side * side;
                }
                Ok(Value::Float(total.sqrt()))
            })),
            ("floor", int_rounder("floor", f64::floor)),
            ("ceil", int_rounder("ceil", f64::ceil)),
            ("trunc", int_rounder("trunc", f64::trunc)),
            ("fabs", unary("fabs", |x| Ok(x.abs()))),
            ("fmod", native("fmod", |args| {
                let x = float_arg(&args, 0, "fmod")?;
                let y = float_arg(&args, 1, "fmod")?;
                if y == 0.0 {
                    return Err(Exception::value_error("math domain error"));
                }
                Ok(Value::Float(x % y))
            })),
            ("pow", native("pow", |args| {
                let x = float_arg(&args, 0, "pow")?;
                let y = float_arg(&args, 1, "pow")?;
                Ok(Value::Float(x.powf(y)))
            })),
            ("gcd", native("gcd", |args| {
                let mut acc = BigInt::zero();
                for (i, _) in args.iter().enumerate() {
                    let n = BigInt::from(int_arg(&args, i, "gcd")?);
                    acc = acc.gcd(&n.abs());
                }
                Ok(Value::from_bigint(acc))
            })),
            ("factorial", native("factorial", |args| {
                let n = int_arg(&args, 0, "factorial")?;
                if n < 0 {
                    return Err(Exception::value_error(
                        "factorial() not defined for negative values",
                    ));
                }
                let mut acc = BigInt::from(1);
                for i in 2..=n {
                    acc *= i;
                }
                Ok(Value::from_bigint(acc))
            })),
            ("isnan", predicate("isnan", f64::is_nan)),
            ("isinf", predicate("isinf", f64::is_infinite)),
            ("isfinite", predicate("isfinite", f64::is_finite)),
            ("isclose", native_kw("isclose", |args, kwargs| {
                let a = float_arg(&args, 0, "isclose")?;
                let b = float_arg(&args, 1, "isclose")?;
                let rel_tol = match kwarg(&kwargs, "rel_tol") {
                    Some(v) => float_arg(&[v], 0, "isclose")?,
                    None => 1e-09,
                };
                let abs_tol = match kwarg(&kwargs, "abs_tol") {
                    Some(v) => float_arg(&[v], 0, "isclose")?,
                    None => 0.0,
                };
                let close = (a - b).abs() <= (rel_tol * a.abs().max(b.abs())).max(abs_tol);
                Ok(Value::Bool(close))
            })),
        ],
    )
}

fn unary(name: &'static str, f: impl Fn(f64) -> Result<f64, Exception> + 'static) -> Value {
    native(name, move |args| {
        let x = float_arg(&args, 0, name)?;
        f(x).map(Value::Float)
    })
}

fn predicate(name: &'static str, f: impl Fn(f64) -> bool + 'static) -> Value {
    native(name, move |args| {
        let x = float_arg(&args, 0, name)?;
        Ok(Value::Bool(f(x)))
    })
}

fn int_rounder(name: &'static str, f: impl Fn(f64) -> f64 + 'static) -> Value {
    native(name, move |args| match args.first() {
        Some(Value::Int(i)) => Ok(Value::Int(*i)),
        Some(Value::BigInt(b)) => Ok(Value::BigInt(b.clone())),
        _ => {
            let x = float_arg(&args, 0, name)?;
            let rounded = f(x);
            if rounded.is_nan() || rounded.is_infinite() {
                return Err(Exception::value_error(format!("cannot convert {rounded} to integer")));
            }
            Ok(Value::Int(rounded as i64))
        }
    })
}

fn domain_positive(x: f64) -> Result<f64, Exception> {
    if x <= 0.0 {
        Err(Exception::value_error("math domain error"))
    } else {
        Ok(x)
    }
}
