//! Dict methods, plus the Counter extensions layered on dict storage.

use crate::{
    builtins::{as_int, CallArgs, Outcome},
    context::Ctx,
    exception::Exception,
    methods::{CounterMethod, DictMethod},
    types::Dict,
    value::{py_cmp, py_repr, type_name, Value},
};

pub(crate) fn call(
    method: DictMethod,
    recv: &Value,
    call_args: CallArgs,
    ctx: &mut Ctx,
) -> Result<Outcome, Exception> {
    let Value::Dict(dict) = recv else {
        return Err(Exception::type_error("dict method on non-dict receiver"));
    };
    let args = &call_args.args;
    match method {
        DictMethod::Get => {
            let key = args
                .first()
                .ok_or_else(|| Exception::type_error("get expected at least 1 argument, got 0"))?;
            let default = args.get(1).cloned().unwrap_or(Value::None);
            Ok(dict.borrow().get(key)?.cloned().unwrap_or(default).into())
        }
        DictMethod::Keys => Ok(Value::list(dict.borrow().keys().cloned().collect()).into()),
        DictMethod::Values => Ok(Value::list(dict.borrow().values().cloned().collect()).into()),
        DictMethod::Items => {
            let items = dict
                .borrow()
                .iter()
                .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                .collect();
            Ok(Value::list(items).into())
        }
        DictMethod::Pop => {
            let key = args
                .first()
                .ok_or_else(|| Exception::type_error("pop expected at least 1 argument, got 0"))?;
            match dict.borrow_mut().remove(key)? {
                Some(v) => Ok(v.into()),
                None => match args.get(1) {
                    Some(default) => Ok(default.clone().into()),
                    None => Err(Exception::key_error(py_repr(key))),
                },
            }
        }
        DictMethod::Popitem => match dict.borrow_mut().pop_last() {
            Some((k, v)) => Ok(Value::tuple(vec![k, v]).into()),
            None => Err(Exception::key_error("'popitem(): dictionary is empty'")),
        },
        DictMethod::Update => {
            // snapshot first: the source may alias the receiver
            let pairs = match args.first() {
                Some(source) => source_pairs(source, ctx)?,
                None => Vec::new(),
            };
            let mut d = dict.borrow_mut();
            for (k, v) in pairs {
                d.insert(k, v)?;
            }
            for (k, v) in call_args.kwargs {
                d.insert(Value::str(k), v)?;
            }
            Ok(Value::None.into())
        }
        DictMethod::Setdefault => {
            let key = args
                .first()
                .ok_or_else(|| Exception::type_error("setdefault expected at least 1 argument, got 0"))?;
            let default = args.get(1).cloned().unwrap_or(Value::None);
            let mut d = dict.borrow_mut();
            if let Some(existing) = d.get(key)? {
                return Ok(existing.clone().into());
            }
            d.insert(key.clone(), default.clone())?;
            Ok(default.into())
        }
        DictMethod::Clear => {
            dict.borrow_mut().clear();
            Ok(Value::None.into())
        }
        DictMethod::Copy => Ok(Value::dict(dict.borrow().clone()).into()),
    }
}

/// Snapshot of a mapping or an iterable of key/value pairs, taken before
/// any write borrow so self-referential updates cannot conflict.
pub(crate) fn source_pairs(source: &Value, ctx: &mut Ctx) -> Result<Vec<(Value, Value)>, Exception> {
    match source {
        Value::Dict(other) => Ok(other
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        other => {
            let Some(pairs) = crate::eval::iter::concrete_values(other, ctx)? else {
                return Err(Exception::type_error(format!(
                    "'{}' object is not iterable",
                    type_name(other)
                )));
            };
            let mut out = Vec::with_capacity(pairs.len());
            for (i, pair) in pairs.iter().enumerate() {
                let Some(items) = crate::eval::iter::concrete_values(pair, ctx)? else {
                    return Err(Exception::type_error(format!(
                        "cannot convert dictionary update sequence element #{i} to a sequence"
                    )));
                };
                let [k, v] = items.as_slice() else {
                    return Err(Exception::value_error(format!(
                        "dictionary update sequence element #{i} has length {}; 2 is required",
                        items.len()
                    )));
                };
                out.push((k.clone(), v.clone()));
            }
            Ok(out)
        }
    }
}

pub(crate) fn call_counter(
    method: CounterMethod,
    recv: &Value,
    call_args: CallArgs,
    ctx: &mut Ctx,
) -> Result<Outcome, Exception> {
    let Value::Dict(dict) = recv else {
        return Err(Exception::type_error("Counter method on non-Counter receiver"));
    };
    let args = &call_args.args;
    match method {
        CounterMethod::MostCommon => {
            let mut pairs: Vec<(Value, i64)> = dict
                .borrow()
                .iter()
                .map(|(k, v)| {
                    let count = match v {
                        Value::Int(i) => *i,
                        Value::Bool(b) => i64::from(*b),
                        _ => 0,
                    };
                    (k.clone(), count)
                })
                .collect();
            // stable: ties keep insertion order
            pairs.sort_by(|a, b| b.1.cmp(&a.1));
            let n = match args.first() {
                None | Some(Value::None) => pairs.len(),
                Some(v) => as_int(v, "most_common")?.max(0) as usize,
            };
            let out = pairs
                .into_iter()
                .take(n)
                .map(|(k, c)| Value::tuple(vec![k, Value::Int(c)]))
                .collect();
            Ok(Value::list(out).into())
        }
        CounterMethod::Elements => {
            let mut out = Vec::new();
            for (k, v) in dict.borrow().iter() {
                let count = match v {
                    Value::Int(i) => *i,
                    Value::Bool(b) => i64::from(*b),
                    _ => 0,
                };
                for _ in 0..count.max(0) {
                    out.push(k.clone());
                }
            }
            Ok(Value::list(out).into())
        }
        CounterMethod::Total => {
            let mut total = 0i64;
            for v in dict.borrow().values() {
                if let Value::Int(i) = v {
                    total += i;
                }
            }
            Ok(Value::Int(total).into())
        }
        CounterMethod::Update | CounterMethod::Subtract => {
            let Some(source) = args.first() else {
                return Ok(Value::None.into());
            };
            let sign = if method == CounterMethod::Subtract { -1 } else { 1 };
            // snapshot first: the source may alias the receiver
            match source {
                Value::Dict(other) => {
                    let pairs: Vec<(Value, Value)> = other
                        .borrow()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    let mut d = dict.borrow_mut();
                    for (k, v) in pairs {
                        let delta = as_int(&v, "count")?;
                        bump(&mut d, &k, sign * delta)?;
                    }
                }
                other => {
                    let Some(items) = crate::eval::iter::concrete_values(other, ctx)? else {
                        return Err(Exception::type_error(format!(
                            "'{}' object is not iterable",
                            type_name(other)
                        )));
                    };
                    let mut d = dict.borrow_mut();
                    for item in items {
                        bump(&mut d, &item, sign)?;
                    }
                }
            }
            Ok(Value::None.into())
        }
    }
}

/// Counts occurrences of every element of `items` into a fresh Counter dict.
pub(crate) fn count_into(dict: &mut Dict, items: &[Value]) -> Result<(), Exception> {
    for item in items {
        bump(dict, item, 1)?;
    }
    Ok(())
}

fn bump(dict: &mut Dict, key: &Value, delta: i64) -> Result<(), Exception> {
    let current = match dict.get(key)? {
        Some(Value::Int(i)) => *i,
        Some(Value::Bool(b)) => i64::from(*b),
        _ => 0,
    };
    dict.insert(key.clone(), Value::Int(current + delta))
}

/// Sort helper for Counter reprs and most_common ties (kept here so the
/// comparison stays consistent with value ordering).
#[allow(dead_code)]
pub(crate) fn value_sort(values: &mut [Value]) -> Result<(), Exception> {
    let mut failed = None;
    values.sort_by(|a, b| match py_cmp(a, b) {
        Ok(ord) => ord,
        Err(e) => {
            failed.get_or_insert(e);
            std::cmp::Ordering::Equal
        }
    });
    match failed {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DictFlavor;

    fn counter_of(s: &str) -> Value {
        let mut d = Dict::with_flavor(DictFlavor::Counter);
        let items: Vec<Value> = s.chars().map(|c| Value::str(c.to_string())).collect();
        count_into(&mut d, &items).unwrap();
        Value::dict(d)
    }

    #[test]
    fn most_common_orders_by_count() {
        let counter = counter_of("abracadabra");
        let mut ctx = Ctx::default();
        let out = call_counter(
            CounterMethod::MostCommon,
            &counter,
            CallArgs::positional(vec![Value::Int(1)]),
            &mut ctx,
        )
        .unwrap();
        let Outcome::Value(v) = out else { panic!("expected value") };
        assert_eq!(py_repr(&v), "[('a', 5)]");
    }

    #[test]
    fn subtract_goes_negative() {
        let counter = counter_of("aab");
        let other = counter_of("abb");
        let mut ctx = Ctx::default();
        call_counter(
            CounterMethod::Subtract,
            &counter,
            CallArgs::positional(vec![other]),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(py_repr(&counter), "Counter({'a': 1, 'b': -1})");
    }
}
