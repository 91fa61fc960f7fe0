//! Tuple, deque and file-handle methods.

use crate::{
    builtins::{as_str, CallArgs, Outcome},
    context::Ctx,
    exception::Exception,
    methods::{DequeMethod, FileMethod, TupleMethod},
    value::{py_eq, py_repr, type_name, Value},
};

pub(crate) fn call_tuple(
    method: TupleMethod,
    recv: &Value,
    call_args: CallArgs,
) -> Result<Outcome, Exception> {
    let Value::Tuple(items) = recv else {
        return Err(Exception::type_error("tuple method on non-tuple receiver"));
    };
    let target = call_args
        .args
        .first()
        .ok_or_else(|| Exception::type_error("expected 1 argument, got 0"))?;
    match method {
        TupleMethod::Count => {
            let count = items.iter().filter(|x| py_eq(x, target)).count();
            Ok(Value::Int(count as i64).into())
        }
        TupleMethod::Index => match items.iter().position(|x| py_eq(x, target)) {
            Some(pos) => Ok(Value::Int(pos as i64).into()),
            None => Err(Exception::value_error(format!(
                "tuple.index(x): {} not in tuple",
                py_repr(target)
            ))),
        },
    }
}

pub(crate) fn call_deque(
    method: DequeMethod,
    recv: &Value,
    call_args: CallArgs,
    ctx: &mut Ctx,
) -> Result<Outcome, Exception> {
    let Value::Deque(deque) = recv else {
        return Err(Exception::type_error("deque method on non-deque receiver"));
    };
    let args = &call_args.args;
    match method {
        DequeMethod::Append => {
            deque.borrow_mut().push_back(one_arg(args, "append")?);
            Ok(Value::None.into())
        }
        DequeMethod::Appendleft => {
            deque.borrow_mut().push_front(one_arg(args, "appendleft")?);
            Ok(Value::None.into())
        }
        DequeMethod::Pop => deque
            .borrow_mut()
            .pop_back()
            .map(Outcome::Value)
            .ok_or_else(|| Exception::index_error("pop from an empty deque")),
        DequeMethod::Popleft => deque
            .borrow_mut()
            .pop_front()
            .map(Outcome::Value)
            .ok_or_else(|| Exception::index_error("pop from an empty deque")),
        DequeMethod::Extend | DequeMethod::Extendleft => {
            let iterable = one_arg(args, "extend")?;
            let Some(items) = crate::eval::iter::concrete_values(&iterable, ctx)? else {
                return Err(Exception::type_error(format!(
                    "'{}' object is not iterable",
                    type_name(&iterable)
                )));
            };
            let mut d = deque.borrow_mut();
            for item in items {
                if method == DequeMethod::Extend {
                    d.push_back(item);
                } else {
                    d.push_front(item);
                }
            }
            Ok(Value::None.into())
        }
        DequeMethod::Clear => {
            deque.borrow_mut().clear();
            Ok(Value::None.into())
        }
    }
}

pub(crate) fn call_file(
    method: FileMethod,
    recv: &Value,
    call_args: CallArgs,
    ctx: &mut Ctx,
) -> Result<Outcome, Exception> {
    let Value::File(id) = recv else {
        return Err(Exception::type_error("file method on non-file receiver"));
    };
    let id = *id;
    let args = &call_args.args;
    match method {
        FileMethod::Read => Ok(Value::str(ctx.file_read(id)?).into()),
        FileMethod::Readline => Ok(Value::str(ctx.file_readline(id)?).into()),
        FileMethod::Readlines => {
            let content = ctx.file_read(id)?;
            let mut lines = Vec::new();
            let mut rest = content.as_str();
            while !rest.is_empty() {
                match rest.find('\n') {
                    Some(pos) => {
                        lines.push(Value::str(&rest[..=pos]));
                        rest = &rest[pos + 1..];
                    }
                    None => {
                        lines.push(Value::str(rest));
                        break;
                    }
                }
            }
            Ok(Value::list(lines).into())
        }
        FileMethod::Write => {
            let text = as_str(args.first().unwrap_or(&Value::None), "write() argument")?;
            Ok(Value::Int(ctx.file_write(id, &text)? as i64).into())
        }
        FileMethod::Writelines => {
            let iterable = args
                .first()
                .cloned()
                .ok_or_else(|| Exception::type_error("writelines expected 1 argument, got 0"))?;
            let Some(lines) = crate::eval::iter::concrete_values(&iterable, ctx)? else {
                return Err(Exception::type_error(format!(
                    "'{}' object is not iterable",
                    type_name(&iterable)
                )));
            };
            for line in lines {
                let text = as_str(&line, "writelines() argument")?;
                ctx.file_write(id, &text)?;
            }
            Ok(Value::None.into())
        }
        FileMethod::Close => {
            ctx.file_close(id)?;
            Ok(Value::None.into())
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
