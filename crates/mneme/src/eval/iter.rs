//! The iterable protocol: concrete collection, for-loop cursors, iterator
//! handles, and `iter()`/`next()` semantics.

use crate::{
    context::{Ctx, IterNext},
    env::Env,
    eval::{Flow, Interp},
    exception::{ExcType, Exception, Signal},
    value::{range_len, type_name, Value},
};

/// Largest range `list(range(...))`-style materialization will produce.
const MAX_MATERIALIZED_RANGE: i64 = 10_000_000;

/// Collects an iterable's values without evaluator help, or `None` when the
/// iterable is instance-driven and needs `__iter__`/`__next__` dispatch.
///
/// Strings yield one-character strings; dicts yield keys; iterator handles
/// are drained (they are consumed, matching Python iterator semantics).
pub(crate) fn concrete_values(v: &Value, ctx: &mut Ctx) -> Result<Option<Vec<Value>>, Exception> {
    let values = match v {
        Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
        Value::List(items) => items.borrow().clone(),
        Value::Tuple(items) => items.to_vec(),
        Value::Set(s) => s.borrow().values().cloned().collect(),
        Value::FrozenSet(s) => s.values().cloned().collect(),
        Value::Dict(d) => d.borrow().keys().cloned().collect(),
        Value::Deque(d) => d.borrow().iter().cloned().collect(),
        Value::Range { start, stop, step } => {
            let len = range_len(*start, *stop, *step);
            if len > MAX_MATERIALIZED_RANGE {
                return Err(Exception::new(
                    ExcType::MemoryError,
                    "range too large to materialize",
                ));
            }
            let mut out = Vec::with_capacity(len.max(0) as usize);
            let mut cur = *start;
            for _ in 0..len {
                out.push(Value::Int(cur));
                cur += step;
            }
            out
        }
        Value::Generator(generator) => {
            if let Some(err) = &generator.error {
                return Err(err.clone());
            }
            generator.items.clone()
        }
        Value::Iterator(id) => match ctx.iter_drain(*id) {
            Some(result) => result?,
            None => return Ok(None),
        },
        _ => return Ok(None),
    };
    Ok(Some(values))
}

/// A for-loop's iteration state. Ranges iterate lazily so large ranges never
/// materialize; handles cover generators, `iter()` results, and instances.
pub(crate) enum Cursor {
    Values {
        items: std::vec::IntoIter<Value>,
        tail_error: Option<Exception>,
    },
    Range {
        cur: i64,
        stop: i64,
        step: i64,
    },
    Handle(u32),
}

impl Interp<'_> {
    /// Starts iteration over any iterable.
    pub(crate) fn cursor(&mut self, iterable: &Value, env: &mut Env) -> Flow<Cursor> {
        match iterable {
            Value::Range { start, stop, step } => Ok(Cursor::Range {
                cur: *start,
                stop: *stop,
                step: *step,
            }),
            Value::Generator(generator) => Ok(Cursor::Values {
                items: generator.items.clone().into_iter(),
                tail_error: generator.error.clone(),
            }),
            Value::Iterator(id) => Ok(Cursor::Handle(*id)),
            Value::Instance(_) => {
                let iterator = self.instance_iterator(iterable, env)?;
                match iterator {
                    Value::Iterator(id) => Ok(Cursor::Handle(id)),
                    other => self.cursor(&other, env),
                }
            }
            other => match concrete_values(other, self.ctx).map_err(Signal::from)? {
                Some(items) => Ok(Cursor::Values {
                    items: items.into_iter(),
                    tail_error: None,
                }),
                None => Err(Signal::from(Exception::type_error(format!(
                    "'{}' object is not iterable",
                    type_name(other)
                )))),
            },
        }
    }

    pub(crate) fn cursor_next(&mut self, cursor: &mut Cursor, env: &mut Env) -> Flow<Option<Value>> {
        match cursor {
            Cursor::Values { items, tail_error } => match items.next() {
                Some(v) => Ok(Some(v)),
                None => match tail_error.take() {
                    Some(err) => Err(Signal::from(err)),
                    None => Ok(None),
                },
            },
            Cursor::Range { cur, stop, step } => {
                let exhausted = if *step > 0 { *cur >= *stop } else { *cur <= *stop };
                if exhausted {
                    return Ok(None);
                }
                let v = *cur;
                *cur += *step;
                Ok(Some(Value::Int(v)))
            }
            Cursor::Handle(id) => self.handle_next(*id, env),
        }
    }

    /// Advances an iterator handle, driving `__next__` for instance-backed
    /// handles and translating `StopIteration` into exhaustion.
    fn handle_next(&mut self, id: u32, env: &mut Env) -> Flow<Option<Value>> {
        match self.ctx.iter_next(id).map_err(Signal::from)? {
            IterNext::Value(v) => Ok(Some(v)),
            IterNext::Done => Ok(None),
            IterNext::Instance(inst) => match self.call_dunder(&inst, "__next__", vec![], env) {
                Ok(v) => Ok(Some(v)),
                Err(Signal::Raise(exc)) if exc.kind == ExcType::StopIteration => Ok(None),
                Err(other) => Err(other),
            },
        }
    }

    /// Exhausts any iterable into a vector (the `iter_to_list` family).
    pub(crate) fn iter_all_values(&mut self, iterable: &Value, env: &mut Env) -> Flow<Vec<Value>> {
        let mut cursor = self.cursor(iterable, env)?;
        let mut out = Vec::new();
        while let Some(item) = self.cursor_next(&mut cursor, env)? {
            self.ctx.check_deadline().map_err(Signal::from)?;
            out.push(item);
        }
        Ok(out)
    }

    /// Unpacking (`a, b = v`): like iteration but `None` for non-iterables
    /// so the caller can raise the unpack-specific error.
    pub(crate) fn iter_values_for_unpack(&mut self, v: &Value, env: &mut Env) -> Flow<Option<Vec<Value>>> {
        match v {
            Value::Instance(_) | Value::Iterator(_) | Value::Generator(_) => {
                Ok(Some(self.iter_all_values(v, env)?))
            }
            other => concrete_values(other, self.ctx).map_err(Signal::from),
        }
    }

    /// `iter(x)`: produces an iterator handle.
    pub(crate) fn make_iterator(&mut self, iterable: &Value, env: &mut Env) -> Flow<Value> {
        match iterable {
            Value::Iterator(_) => Ok(iterable.clone()),
            Value::Generator(generator) => {
                let id = self
                    .ctx
                    .make_iter_with_error(generator.items.clone(), generator.error.clone());
                Ok(Value::Iterator(id))
            }
            Value::Instance(_) => self.instance_iterator(iterable, env),
            other => match concrete_values(other, self.ctx).map_err(Signal::from)? {
                Some(items) => Ok(Value::Iterator(self.ctx.make_iter(items))),
                None => Err(Signal::from(Exception::type_error(format!(
                    "'{}' object is not iterable",
                    type_name(other)
                )))),
            },
        }
    }

    /// Drives `__iter__` on an instance and wraps the produced iterator
    /// object into a handle.
    fn instance_iterator(&mut self, instance: &Value, env: &mut Env) -> Flow<Value> {
        let Value::Instance(inst) = instance else {
            return Err(Signal::from(Exception::type_error("expected an instance")));
        };
        let class = inst.borrow().class.clone();
        if crate::value::class_lookup(&class, "__iter__").is_none() {
            return Err(Signal::from(Exception::type_error(format!(
                "'{}' object is not iterable",
                class.name
            ))));
        }
        let produced = self.call_dunder(instance, "__iter__", vec![], env)?;
        match produced {
            Value::Instance(ref produced_inst) => {
                let produced_class = produced_inst.borrow().class.clone();
                if crate::value::class_lookup(&produced_class, "__next__").is_none() {
                    return Err(Signal::from(Exception::type_error(format!(
                        "iter() returned non-iterator of type '{}'",
                        produced_class.name
                    ))));
                }
                Ok(Value::Iterator(self.ctx.make_instance_iter(produced)))
            }
            other => self.make_iterator(&other, env),
        }
    }

    /// `next(x[, default])`.
    pub(crate) fn iterator_next_value(
        &mut self,
        iterator: &Value,
        default: Option<Value>,
        env: &mut Env,
    ) -> Flow<Value> {
        let next = match iterator {
            Value::Iterator(id) => self.handle_next(*id, env)?,
            Value::Generator(_) => {
                return Err(Signal::from(Exception::type_error(
                    "generators must be wrapped with iter() before calling next()",
                )));
            }
            Value::Instance(inst) => {
                let class = inst.borrow().class.clone();
                if crate::value::class_lookup(&class, "__next__").is_none() {
                    return Err(Signal::from(Exception::type_error(format!(
                        "'{}' object is not an iterator",
                        class.name
                    ))));
                }
                match self.call_dunder(iterator, "__next__", vec![], env) {
                    Ok(v) => Some(v),
                    Err(Signal::Raise(exc)) if exc.kind == ExcType::StopIteration => None,
                    Err(other) => return Err(other),
                }
            }
            other => {
                return Err(Signal::from(Exception::type_error(format!(
                    "'{}' object is not an iterator",
                    type_name(other)
                ))));
            }
        };
        match next {
            Some(v) => Ok(v),
            None => match default {
                Some(d) => Ok(d),
                None => Err(Signal::from(Exception::stop_iteration(""))),
            },
        }
    }
}
