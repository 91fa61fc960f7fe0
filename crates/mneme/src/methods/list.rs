//! List methods.

use crate::{
    builtins::{as_int, CallArgs, Outcome, Request},
    context::Ctx,
    exception::Exception,
    methods::ListMethod,
    value::{py_eq, py_repr, truthy, Value},
};

pub(crate) fn call(
    method: ListMethod,
    recv: &Value,
    call_args: CallArgs,
    ctx: &mut Ctx,
) -> Result<Outcome, Exception> {
    let Value::List(list) = recv else {
        return Err(Exception::type_error("list method on non-list receiver"));
    };
    let args = &call_args.args;
    match method {
        ListMethod::Append => {
            let item = one_arg(args, "append")?;
            list.borrow_mut().push(item);
            Ok(Value::None.into())
        }
        ListMethod::Extend => {
            let iterable = one_arg(args, "extend")?;
            match crate::eval::iter::concrete_values(&iterable, ctx)? {
                Some(items) => {
                    list.borrow_mut().extend(items);
                    Ok(Value::None.into())
                }
                // instance-driven: the evaluator exhausts it, then extends
                None => Ok(Outcome::Request(Request::ExtendList {
                    target: recv.clone(),
                    iterable,
                })),
            }
        }
        ListMethod::Insert => {
            let index = as_int(args.first().unwrap_or(&Value::None), "insert")?;
            let item = args
                .get(1)
                .cloned()
                .ok_or_else(|| Exception::type_error("insert expected 2 arguments, got 1"))?;
            let mut items = list.borrow_mut();
            let len = items.len() as i64;
            let pos = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(pos as usize, item);
            Ok(Value::None.into())
        }
        ListMethod::Remove => {
            let target = one_arg(args, "remove")?;
            let mut items = list.borrow_mut();
            match items.iter().position(|x| py_eq(x, &target)) {
                Some(pos) => {
                    items.remove(pos);
                    Ok(Value::None.into())
                }
                None => Err(Exception::value_error("list.remove(x): x not in list")),
            }
        }
        ListMethod::Pop => {
            let index = match args.first() {
                Some(v) => as_int(v, "pop")?,
                None => -1,
            };
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(Exception::index_error("pop from empty list"));
            }
            let len = items.len() as i64;
            let pos = if index < 0 { index + len } else { index };
            if !(0..len).contains(&pos) {
                return Err(Exception::index_error("pop index out of range"));
            }
            Ok(items.remove(pos as usize).into())
        }
        ListMethod::Index => {
            let target = one_arg(args, "index")?;
            let items = list.borrow();
            match items.iter().position(|x| py_eq(x, &target)) {
                Some(pos) => Ok(Value::Int(pos as i64).into()),
                None => Err(Exception::value_error(format!(
                    "{} is not in list",
                    py_repr(&target)
                ))),
            }
        }
        ListMethod::Count => {
            let target = one_arg(args, "count")?;
            let count = list.borrow().iter().filter(|x| py_eq(x, &target)).count();
            Ok(Value::Int(count as i64).into())
        }
        ListMethod::Sort => Ok(Outcome::Request(Request::Sort {
            items: recv.clone(),
            key: call_args
                .kwargs
                .iter()
                .find(|(k, _)| k == "key")
                .map(|(_, v)| v.clone())
                .filter(|v| !matches!(v, Value::None)),
            reverse: call_args
                .kwargs
                .iter()
                .find(|(k, _)| k == "reverse")
                .is_some_and(|(_, v)| truthy(v)),
            in_place: true,
        })),
        ListMethod::Reverse => {
            list.borrow_mut().reverse();
            Ok(Value::None.into())
        }
        ListMethod::Clear => {
            list.borrow_mut().clear();
            Ok(Value::None.into())
        }
        ListMethod::Copy => Ok(Value::list(list.borrow().clone()).into()),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn run(method: ListMethod, recv: &Value, args: Vec<Value>) -> Result<Value, Exception> {
        let mut ctx = Ctx::default();
        match call(method, recv, CallArgs::positional(args), &mut ctx)? {
            Outcome::Value(v) => Ok(v),
            Outcome::Request(_) => panic!("unexpected request"),
        }
    }

    #[test]
    fn append_mutates_through_alias() {
        let list = Value::list(vec![Value::Int(1)]);
        let alias = list.clone();
        run(ListMethod::Append, &list, vec![Value::Int(2)]).unwrap();
        assert_eq!(py_repr(&alias), "[1, 2]");
    }

    #[test]
    fn pop_and_bounds() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let popped = run(ListMethod::Pop, &list, vec![]).unwrap();
        assert!(matches!(popped, Value::Int(2)));
        run(ListMethod::Pop, &list, vec![]).unwrap();
        let err = run(ListMethod::Pop, &list, vec![]).unwrap_err();
        assert_eq!(err.to_string(), "IndexError: pop from empty list");
    }

    #[test]
    fn remove_missing_is_value_error() {
        let list = Value::list(vec![Value::Int(1)]);
        let err = run(ListMethod::Remove, &list, vec![Value::Int(9)]).unwrap_err();
        assert_eq!(err.kind, crate::exception::ExcType::ValueError);
    }

    #[test]
    fn insert_clamps_like_python() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        run(ListMethod::Insert, &list, vec![Value::Int(100), Value::Int(3)]).unwrap();
        run(ListMethod::Insert, &list, vec![Value::Int(-100), Value::Int(0)]).unwrap();
        assert_eq!(py_repr(&list), "[0, 1, 2, 3]");
    }
}
