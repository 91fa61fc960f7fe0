//! Set and frozenset methods.

use std::rc::Rc;

use crate::{
    builtins::{CallArgs, Outcome},
    context::Ctx,
    exception::Exception,
    methods::SetMethod,
    types::Set,
    value::{py_repr, type_name, Value},
};

pub(crate) fn call(
    method: SetMethod,
    recv: &Value,
    call_args: CallArgs,
    ctx: &mut Ctx,
) -> Result<Outcome, Exception> {
    let args = &call_args.args;
    // mutators are only reachable on Value::Set (lookup filters frozenset)
    match method {
        SetMethod::Add => {
            let Value::Set(set) = recv else {
                return Err(Exception::type_error("set method on non-set receiver"));
            };
            set.borrow_mut().insert(one_arg(args, "add")?)?;
            Ok(Value::None.into())
        }
        SetMethod::Remove => {
            let Value::Set(set) = recv else {
                return Err(Exception::type_error("set method on non-set receiver"));
            };
            let target = one_arg(args, "remove")?;
            if set.borrow_mut().remove(&target)? {
                Ok(Value::None.into())
            } else {
                Err(Exception::key_error(py_repr(&target)))
            }
        }
        SetMethod::Discard => {
            let Value::Set(set) = recv else {
                return Err(Exception::type_error("set method on non-set receiver"));
            };
            set.borrow_mut().remove(&one_arg(args, "discard")?)?;
            Ok(Value::None.into())
        }
        SetMethod::Pop => {
            let Value::Set(set) = recv else {
                return Err(Exception::type_error("set method on non-set receiver"));
            };
            set.borrow_mut()
                .pop_first()
                .map(Outcome::Value)
                .ok_or_else(|| Exception::key_error("'pop from an empty set'"))
        }
        SetMethod::Clear => {
            let Value::Set(set) = recv else {
                return Err(Exception::type_error("set method on non-set receiver"));
            };
            set.borrow_mut().clear();
            Ok(Value::None.into())
        }
        SetMethod::Update => {
            let Value::Set(set) = recv else {
                return Err(Exception::type_error("set method on non-set receiver"));
            };
            for other in args {
                let items = iterable_elements(other, ctx)?;
                let mut s = set.borrow_mut();
                for item in items {
                    s.insert(item)?;
                }
            }
            Ok(Value::None.into())
        }
        SetMethod::Copy => Ok(match recv {
            Value::Set(set) => Value::set(set.borrow().clone()),
            Value::FrozenSet(set) => Value::FrozenSet(set.clone()),
            _ => return Err(Exception::type_error("set method on non-set receiver")),
        }
        .into()),
        SetMethod::Union | SetMethod::Intersection | SetMethod::Difference => {
            let mut result = storage(recv)?;
            for other in args {
                let other = as_set(other, ctx)?;
                result = match method {
                    SetMethod::Union => result.union_with(&other),
                    SetMethod::Intersection => result.intersection_with(&other),
                    _ => result.difference_with(&other),
                };
            }
            Ok(wrap_like(recv, result).into())
        }
        SetMethod::SymmetricDifference => {
            let other = as_set(&one_arg(args, "symmetric_difference")?, ctx)?;
            Ok(wrap_like(recv, storage(recv)?.symmetric_difference_with(&other)).into())
        }
        SetMethod::Issubset => {
            let other = as_set(&one_arg(args, "issubset")?, ctx)?;
            Ok(Value::Bool(storage(recv)?.is_subset(&other)).into())
        }
        SetMethod::Issuperset => {
            let other = as_set(&one_arg(args, "issuperset")?, ctx)?;
            Ok(Value::Bool(other.is_subset(&storage(recv)?)).into())
        }
        SetMethod::Isdisjoint => {
            let other = as_set(&one_arg(args, "isdisjoint")?, ctx)?;
            Ok(Value::Bool(storage(recv)?.intersection_with(&other).is_empty()).into())
        }
    }
}

fn one_arg(args: &[Value], name: &str) -> Result<Value, Exception> {
    match args {
        [v] => Ok(v.clone()),
        other => Err(Exception::type_error(format!(
            "{name}() takes exactly one argument ({} given)",
            other.len()
        ))),
    }
}

fn storage(recv: &Value) -> Result<Set, Exception> {
    match recv {
        Value::Set(set) => Ok(set.borrow().clone()),
        Value::FrozenSet(set) => Ok((**set).clone()),
        other => Err(Exception::type_error(format!(
            "set method on '{}' receiver",
            type_name(other)
        ))),
    }
}

/// Result sets keep the receiver's frozenness.
fn wrap_like(recv: &Value, set: Set) -> Value {
    match recv {
        Value::FrozenSet(_) => Value::FrozenSet(Rc::new(set)),
        _ => Value::set(set),
    }
}

fn iterable_elements(v: &Value, ctx: &mut Ctx) -> Result<Vec<Value>, Exception> {
    crate::eval::iter::concrete_values(v, ctx)?.ok_or_else(|| {
        Exception::type_error(format!("'{}' object is not iterable", type_name(v)))
    })
}

fn as_set(v: &Value, ctx: &mut Ctx) -> Result<Set, Exception> {
    match v {
        Value::Set(set) => Ok(set.borrow().clone()),
        Value::FrozenSet(set) => Ok((**set).clone()),
        other => {
            let mut out = Set::new();
            for item in iterable_elements(other, ctx)? {
                out.insert(item)?;
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(values: &[i64]) -> Value {
        let mut s = Set::new();
        for v in values {
            s.insert(Value::Int(*v)).unwrap();
        }
        Value::set(s)
    }

    #[test]
    fn union_accepts_lists() {
        let s = set_of(&[1, 2]);
        let mut ctx = Ctx::default();
        let out = call(
            SetMethod::Union,
            &s,
            CallArgs::positional(vec![Value::list(vec![Value::Int(2), Value::Int(3)])]),
            &mut ctx,
        )
        .unwrap();
        let Outcome::Value(v) = out else { panic!("expected value") };
        assert_eq!(py_repr(&v), "{1, 2, 3}");
    }

    #[test]
    fn remove_missing_is_key_error() {
        let s = set_of(&[1]);
        let mut ctx = Ctx::default();
        let err = call(
            SetMethod::Remove,
            &s,
            CallArgs::positional(vec![Value::Int(9)]),
            &mut ctx,
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::exception::ExcType::KeyError);
    }

    #[test]
    fn frozenset_results_stay_frozen() {
        let frozen = Value::FrozenSet(Rc::new({
            let mut s = Set::new();
            s.insert(Value::Int(1)).unwrap();
            s
        }));
        let mut ctx = Ctx::default();
        let out = call(
            SetMethod::Union,
            &frozen,
            CallArgs::positional(vec![set_of(&[2])]),
            &mut ctx,
        )
        .unwrap();
        let Outcome::Value(v) = out else { panic!("expected value") };
        assert!(matches!(v, Value::FrozenSet(_)));
    }
}
