//! The `collections` module: Counter, defaultdict, OrderedDict, deque.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::{
    eval::iter::concrete_values,
    exception::Exception,
    methods::dict::count_into,
    modules::{module_value, native_ctx},
    types::{Dict, DictFlavor},
    value::{type_name, Value},
};

pub(crate) fn module() -> Value {
    module_value(
        "collections",
        vec![
            ("Counter", native_ctx("Counter", |args, kwargs, ctx| {
                let mut counter = Dict::with_flavor(DictFlavor::Counter);
                match args.first() {
                    None => {}
                    Some(Value::Dict(source)) => {
                        let source = source.borrow().clone();
                        for (k, v) in source.iter() {
                            counter.insert(k.clone(), v.clone())?;
                        }
                    }
                    Some(iterable) => {
                        let Some(items) = concrete_values(iterable, ctx)? else {
                            return Err(Exception::type_error(format!(
                                "'{}' object is not iterable",
                                type_name(iterable)
                            )));
                        };
                        count_into(&mut counter, &items)?;
                    }
                }
                for (k, v) in kwargs {
                    counter.insert(Value::str(k), v)?;
                }
                Ok(Value::dict(counter))
            })),
            ("defaultdict", native_ctx("defaultdict", |args, _kwargs, _ctx| {
                let mut dict = Dict::with_flavor(DictFlavor::DefaultDict);
                match args.first() {
                    None | Some(Value::None) => {}
                    Some(factory) if factory.is_callable() => {
                        dict.default_factory = Some(factory.clone());
                    }
                    Some(other) => {
                        return Err(Exception::type_error(format!(
                            "first argument must be callable or None, not '{}'",
                            type_name(other)
                        )));
                    }
                }
                Ok(Value::dict(dict))
            })),
            ("OrderedDict", native_ctx("OrderedDict", |args, kwargs, ctx| {
                let mut dict = Dict::with_flavor(DictFlavor::OrderedDict);
                match args.first() {
                    None => {}
                    Some(Value::Dict(source)) => {
                        let source = source.borrow().clone();
                        for (k, v) in source.iter() {
                            dict.insert(k.clone(), v.clone())?;
                        }
                    }
                    Some(pairs) => {
                        let Some(items) = concrete_values(pairs, ctx)? else {
                            return Err(Exception::type_error(format!(
                                "'{}' object is not iterable",
                                type_name(pairs)
                            )));
                        };
                        for (i, pair) in items.iter().enumerate() {
                            let Some(kv) = concrete_values(pair, ctx)? else {
                                return Err(Exception::type_error(format!(
                                    "cannot convert dictionary update sequence element #{i} to a sequence"
                                )));
                            };
                            let [k, v] = kv.as_slice() else {
                                return Err(Exception::value_error(format!(
                                    "dictionary update sequence element #{i} has length {}; 2 is required",
                                    kv.len()
                                )));
                            };
                            dict.insert(k.clone(), v.clone())?;
                        }
                    }
                }
                for (k, v) in kwargs {
                    dict.insert(Value::str(k), v)?;
                }
                Ok(Value::dict(dict))
            })),
            ("deque", native_ctx("deque", |args, _kwargs, ctx| {
                let mut out = VecDeque::new();
                if let Some(iterable) = args.first() {
                    let Some(items) = concrete_values(iterable, ctx)? else {
                        return Err(Exception::type_error(format!(
                            "'{}' object is not iterable",
                            type_name(iterable)
                        )));
                    };
                    out.extend(items);
                }
                Ok(Value::Deque(Rc::new(RefCell::new(out))))
            })),
        ],
    )
}
