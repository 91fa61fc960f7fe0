//! Binary and unary operator semantics for builtin values.
//!
//! Instance operands are handled a level up (the evaluator dispatches
//! `__add__`-style dunders before falling through to these).

use std::rc::Rc;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};

use crate::{
    ast::BinOp,
    exception::Exception,
    format::percent_format,
    types::Dict,
    value::{py_eq, range_len, type_name, Value},
};

/// Applies a binary operator to two non-instance operands.
pub(crate) fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, Exception> {
    match op {
        BinOp::Add => add(left, right),
        BinOp::Sub => arith(op, left, right),
        BinOp::Mul => mul(left, right),
        BinOp::Div => div(left, right),
        BinOp::FloorDiv => floordiv(left, right),
        BinOp::Mod => modulo(left, right),
        BinOp::Pow => pow_values(left, right),
        BinOp::LShift | BinOp::RShift | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
            bitwise(op, left, right)
        }
        BinOp::MatMul => Err(unsupported(op, left, right)),
    }
}

fn unsupported(op: BinOp, left: &Value, right: &Value) -> Exception {
    Exception::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        type_name(left),
        type_name(right)
    ))
}

/// Numeric tower for arithmetic: i64 fast path, BigInt promotion, floats.
enum Num {
    Int(i64),
    Big(BigInt),
    Float(f64),
}

fn as_num(v: &Value) -> Option<Num> {
    match v {
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::BigInt(b) => Some(Num::Big((**b).clone())),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn to_f64(n: &Num) -> f64 {
    match n {
        Num::Int(i) => *i as f64,
        Num::Big(b) => b.to_f64().unwrap_or(f64::INFINITY),
        Num::Float(f) => *f,
    }
}

fn big(n: Num) -> BigInt {
    match n {
        Num::Int(i) => BigInt::from(i),
        Num::Big(b) => b,
        Num::Float(_) => BigInt::zero(),
    }
}

fn add(left: &Value, right: &Value) -> Result<Value, Exception> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(Value::str(out))
        }
        (Value::List(a), Value::List(b)) => {
            let mut out = a.borrow().clone();
            out.extend(b.borrow().iter().cloned());
            Ok(Value::list(out))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            let mut out = a.to_vec();
            out.extend(b.iter().cloned());
            Ok(Value::tuple(out))
        }
        _ => arith(BinOp::Add, left, right),
    }
}

fn arith(op: BinOp, left: &Value, right: &Value) -> Result<Value, Exception> {
    let (Some(a), Some(b)) = (as_num(left), as_num(right)) else {
        return Err(unsupported(op, left, right));
    };
    if matches!(a, Num::Float(_)) || matches!(b, Num::Float(_)) {
        let (x, y) = (to_f64(&a), to_f64(&b));
        return Ok(Value::Float(match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            _ => unreachable!("arith only handles add/sub"),
        }));
    }
    if let (Num::Int(x), Num::Int(y)) = (&a, &b) {
        let fast = match op {
            BinOp::Add => x.checked_add(*y),
            _ => x.checked_sub(*y),
        };
        if let Some(v) = fast {
            return Ok(Value::Int(v));
        }
    }
    let (x, y) = (big(a), big(b));
    Ok(Value::from_bigint(match op {
        BinOp::Add => x + y,
        _ => x - y,
    }))
}

fn mul(left: &Value, right: &Value) -> Result<Value, Exception> {
    // sequence repetition: s * n and n * s
    let repeat_count = |v: &Value| match v {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    match (left, right) {
        (Value::Str(s), n) | (n, Value::Str(s)) if repeat_count(n).is_some() => {
            let count = repeat_count(n).unwrap_or(0).max(0) as usize;
            return Ok(Value::str(s.repeat(count)));
        }
        (Value::List(items), n) | (n, Value::List(items)) if repeat_count(n).is_some() => {
            let count = repeat_count(n).unwrap_or(0).max(0) as usize;
            let items = items.borrow();
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            return Ok(Value::list(out));
        }
        (Value::Tuple(items), n) | (n, Value::Tuple(items)) if repeat_count(n).is_some() => {
            let count = repeat_count(n).unwrap_or(0).max(0) as usize;
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            return Ok(Value::tuple(out));
        }
        _ => {}
    }
    let (Some(a), Some(b)) = (as_num(left), as_num(right)) else {
        return Err(unsupported(BinOp::Mul, left, right));
    };
    if matches!(a, Num::Float(_)) || matches!(b, Num::Float(_)) {
        return Ok(Value::Float(to_f64(&a) * to_f64(&b)));
    }
    if let (Num::Int(x), Num::Int(y)) = (&a, &b) {
        if let Some(v) = x.checked_mul(*y) {
            return Ok(Value::Int(v));
        }
    }
    Ok(Value::from_bigint(big(a) * big(b)))
}

fn div(left: &Value, right: &Value) -> Result<Value, Exception> {
    let (Some(a), Some(b)) = (as_num(left), as_num(right)) else {
        return Err(unsupported(BinOp::Div, left, right));
    };
    let y = to_f64(&b);
    if y == 0.0 {
        return Err(match b {
            Num::Float(_) => Exception::zero_division("float division by zero"),
            _ => Exception::zero_division("division by zero"),
        });
    }
    Ok(Value::Float(to_f64(&a) / y))
}

fn floordiv(left: &Value, right: &Value) -> Result<Value, Exception> {
    let (Some(a), Some(b)) = (as_num(left), as_num(right)) else {
        return Err(unsupported(BinOp::FloorDiv, left, right));
    };
    match (&a, &b) {
        (Num::Float(_), _) | (_, Num::Float(_)) => {
            let y = to_f64(&b);
            if y == 0.0 {
                return Err(Exception::zero_division("float floor division by zero"));
            }
            Ok(Value::Float((to_f64(&a) / y).floor()))
        }
        _ => {
            let (x, y) = (big(a), big(b));
            if y.is_zero() {
                return Err(Exception::zero_division("integer division or modulo by zero"));
            }
            Ok(Value::from_bigint(x.div_floor(&y)))
        }
    }
}

fn modulo(left: &Value, right: &Value) -> Result<Value, Exception> {
    // printf-style string formatting
    if let Value::Str(fmt) = left {
        return percent_format(fmt, right).map(Value::str);
    }
    let (Some(a), Some(b)) = (as_num(left), as_num(right)) else {
        return Err(unsupported(BinOp::Mod, left, right));
    };
    match (&a, &b) {
        (Num::Float(_), _) | (_, Num::Float(_)) => {
            let (x, y) = (to_f64(&a), to_f64(&b));
            if y == 0.0 {
                return Err(Exception::zero_division("float modulo"));
            }
            // Python: result carries the divisor's sign
            let r = x - (x / y).floor() * y;
            Ok(Value::Float(r))
        }
        _ => {
            let (x, y) = (big(a), big(b));
            if y.is_zero() {
                return Err(Exception::zero_division("integer division or modulo by zero"));
            }
            Ok(Value::from_bigint(x.mod_floor(&y)))
        }
    }
}

/// `x ** y`, shared with the `pow` builtin.
pub(crate) fn pow_values(left: &Value, right: &Value) -> Result<Value, Exception> {
    let (Some(a), Some(b)) = (as_num(left), as_num(right)) else {
        return Err(unsupported(BinOp::Pow, left, right));
    };
    match (&a, &b) {
        (Num::Float(_), _) | (_, Num::Float(_)) => Ok(Value::Float(to_f64(&a).powf(to_f64(&b)))),
        (_, Num::Int(e)) if *e < 0 => {
            let base = to_f64(&a);
            if base == 0.0 {
                return Err(Exception::zero_division("0.0 cannot be raised to a negative power"));
            }
            Ok(Value::Float(base.powi(i32::try_from(*e).unwrap_or(i32::MIN))))
        }
        _ => {
            let x = big(a);
            let e = match b {
                Num::Int(e) => usize::try_from(e)
                    .map_err(|_| Exception::overflow_error("exponent too large"))?,
                Num::Big(_) => {
                    return Err(Exception::overflow_error("exponent too large"));
                }
                Num::Float(_) => unreachable!("float handled above"),
            };
            if e > 1_000_000 {
                return Err(Exception::overflow_error("exponent too large"));
            }
            Ok(Value::from_bigint(num_traits::pow(x, e)))
        }
    }
}

fn bitwise(op: BinOp, left: &Value, right: &Value) -> Result<Value, Exception> {
    // set algebra reuses the bitwise operators
    if let (Value::Set(a), Value::Set(b)) = (left, right) {
        let (a, b) = (a.borrow(), b.borrow());
        let out = match op {
            BinOp::BitOr => a.union_with(&b),
            BinOp::BitAnd => a.intersection_with(&b),
            BinOp::BitXor => a.symmetric_difference_with(&b),
            _ => return Err(unsupported(op, left, right)),
        };
        return Ok(Value::set(out));
    }
    if let (Value::Dict(a), Value::Dict(b)) = (left, right) {
        if op == BinOp::BitOr {
            let mut out: Dict = a.borrow().clone();
            let b = b.borrow().clone();
            for (k, v) in b.iter() {
                out.insert(k.clone(), v.clone())?;
            }
            return Ok(Value::dict(out));
        }
    }
    let int_of = |v: &Value| match v {
        Value::Int(i) => Some(BigInt::from(*i)),
        Value::Bool(b) => Some(BigInt::from(i64::from(*b))),
        Value::BigInt(b) => Some((**b).clone()),
        _ => None,
    };
    let (Some(x), Some(y)) = (int_of(left), int_of(right)) else {
        return Err(unsupported(op, left, right));
    };
    let result = match op {
        BinOp::BitAnd => x & y,
        BinOp::BitOr => x | y,
        BinOp::BitXor => x ^ y,
        BinOp::LShift | BinOp::RShift => {
            let shift = y
                .to_u64()
                .ok_or_else(|| Exception::value_error("negative shift count"))?;
            let shift = usize::try_from(shift)
                .map_err(|_| Exception::overflow_error("shift count too large"))?;
            if shift > 100_000 {
                return Err(Exception::overflow_error("shift count too large"));
            }
            if op == BinOp::LShift { x << shift } else { x >> shift }
        }
        _ => unreachable!("caller matched bitwise ops"),
    };
    Ok(Value::from_bigint(result))
}

/// Unary minus with overflow promotion.
pub(crate) fn negate(v: &Value) -> Result<Value, Exception> {
    match v {
        Value::Int(i) => Ok(match i.checked_neg() {
            Some(n) => Value::Int(n),
            None => Value::from_bigint(-BigInt::from(*i)),
        }),
        Value::BigInt(b) => Ok(Value::from_bigint(-(**b).clone())),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
        other => Err(Exception::type_error(format!(
            "bad operand type for unary -: '{}'",
            type_name(other)
        ))),
    }
}

pub(crate) fn unary_plus(v: &Value) -> Result<Value, Exception> {
    match v {
        Value::Int(_) | Value::BigInt(_) | Value::Float(_) => Ok(v.clone()),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        other => Err(Exception::type_error(format!(
            "bad operand type for unary +: '{}'",
            type_name(other)
        ))),
    }
}

pub(crate) fn invert(v: &Value) -> Result<Value, Exception> {
    match v {
        Value::Int(i) => Ok(Value::Int(!i)),
        Value::Bool(b) => Ok(Value::Int(!i64::from(*b))),
        Value::BigInt(b) => Ok(Value::from_bigint(!(**b).clone())),
        other => Err(Exception::type_error(format!(
            "bad operand type for unary ~: '{}'",
            type_name(other)
        ))),
    }
}

/// Membership (`in`) over builtin containers; instances dispatch a level up.
pub(crate) fn contains(container: &Value, item: &Value) -> Result<bool, Exception> {
    match container {
        Value::Str(hay) => match item {
            Value::Str(needle) => Ok(hay.contains(&**needle)),
            other => Err(Exception::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                type_name(other)
            ))),
        },
        Value::List(items) => Ok(items.borrow().iter().any(|x| py_eq(x, item))),
        Value::Tuple(items) => Ok(items.iter().any(|x| py_eq(x, item))),
        Value::Deque(items) => Ok(items.borrow().iter().any(|x| py_eq(x, item))),
        Value::Dict(d) => d.borrow().contains(item),
        Value::Set(s) => s.borrow().contains(item),
        Value::FrozenSet(s) => s.contains(item),
        Value::Range { start, stop, step } => match item {
            Value::Int(i) => {
                let len = range_len(*start, *stop, *step);
                if len == 0 {
                    return Ok(false);
                }
                let offset = i - start;
                Ok(offset % step == 0 && (0..len).contains(&(offset / step)))
            }
            _ => Ok(false),
        },
        Value::Generator(g) => Ok(g.items.iter().any(|x| py_eq(x, item))),
        other => Err(Exception::type_error(format!(
            "argument of type '{}' is not iterable",
            type_name(other)
        ))),
    }
}

/// `is` identity: shared containers by pointer, small scalars by value.
pub(crate) fn is_identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        // small-int interning approximated: equal ints are identical
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => Rc::ptr_eq(x, y) || x == y,
        (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
        (Value::Dict(x), Value::Dict(y)) => Rc::ptr_eq(x, y),
        (Value::Set(x), Value::Set(y)) => Rc::ptr_eq(x, y),
        (Value::FrozenSet(x), Value::FrozenSet(y)) => Rc::ptr_eq(x, y),
        (Value::Tuple(x), Value::Tuple(y)) => Rc::ptr_eq(x, y),
        (Value::Deque(x), Value::Deque(y)) => Rc::ptr_eq(x, y),
        (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
        (Value::Class(x), Value::Class(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Module(x), Value::Module(y)) => Rc::ptr_eq(x, y),
        (Value::Exc(x), Value::Exc(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        (Value::Iterator(x), Value::Iterator(y)) => x == y,
        (Value::File(x), Value::File(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::py_repr;

    #[test]
    fn int_overflow_promotes() {
        let v = binary(BinOp::Mul, &Value::Int(i64::MAX), &Value::Int(2)).unwrap();
        assert!(matches!(v, Value::BigInt(_)));
        assert_eq!(py_repr(&v), "18446744073709551614");
    }

    #[test]
    fn division_always_floats() {
        let v = binary(BinOp::Div, &Value::Int(7), &Value::Int(2)).unwrap();
        assert!(matches!(v, Value::Float(f) if f == 3.5));
        assert!(binary(BinOp::Div, &Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn floor_and_mod_follow_python_signs() {
        assert!(matches!(
            binary(BinOp::FloorDiv, &Value::Int(-7), &Value::Int(2)).unwrap(),
            Value::Int(-4)
        ));
        assert!(matches!(
            binary(BinOp::Mod, &Value::Int(-7), &Value::Int(2)).unwrap(),
            Value::Int(1)
        ));
        let v = binary(BinOp::Mod, &Value::Float(-7.0), &Value::Int(2)).unwrap();
        assert!(matches!(v, Value::Float(f) if f == 1.0));
    }

    #[test]
    fn sequence_operators() {
        let v = binary(BinOp::Add, &Value::str("ab"), &Value::str("cd")).unwrap();
        assert_eq!(py_repr(&v), "'abcd'");
        let v = binary(BinOp::Mul, &Value::str("ab"), &Value::Int(3)).unwrap();
        assert_eq!(py_repr(&v), "'ababab'");
        let v = binary(
            BinOp::Add,
            &Value::list(vec![Value::Int(1)]),
            &Value::list(vec![Value::Int(2)]),
        )
        .unwrap();
        assert_eq!(py_repr(&v), "[1, 2]");
    }

    #[test]
    fn mixed_type_add_is_type_error() {
        let err = binary(BinOp::Add, &Value::Int(1), &Value::str("x")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'"
        );
    }

    #[test]
    fn range_membership() {
        let range = Value::Range { start: 0, stop: 10, step: 2 };
        assert!(contains(&range, &Value::Int(4)).unwrap());
        assert!(!contains(&range, &Value::Int(5)).unwrap());
        assert!(!contains(&range, &Value::Int(10)).unwrap());
    }
}
