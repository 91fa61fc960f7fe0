//! The universal call boundary.
//!
//! `call_value` dispatches on the callable's tag; builtin and method
//! callbacks come back as either values or post-dispatch requests, and
//! `handle_request` services the requests that must re-enter the evaluator.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    ast::ExprNode,
    builtins::{self, CallArgs, MinMaxKind, Outcome, Request},
    env::Env,
    eval::{iter::concrete_values, Flow, Interp},
    event::{EventKind, EventPayload},
    exception::{ExcType, Exception, Signal},
    format::format_value,
    methods,
    types::{Dict, Set},
    value::{
        class_exc_base, class_lookup_with_origin, py_cmp, type_name, ClassObj, GeneratorState,
        Instance, PyFunc, Value,
    },
};

impl Interp<'_> {
    /// Evaluates a call expression: callee, positional args (with `*`
    /// unpacking), keyword args (with `**` unpacking), then dispatch.
    pub(crate) fn eval_call(
        &mut self,
        func: &ExprNode,
        args: &[ExprNode],
        kwargs: &[(Option<String>, ExprNode)],
        env: &mut Env,
    ) -> Flow<Value> {
        let callee = self.eval(func, env)?;
        let mut positional = Vec::with_capacity(args.len());
        for arg in args {
            if let crate::ast::ExprKind::Starred(inner) = &arg.kind {
                let iterable = self.eval(inner, env)?;
                positional.extend(self.iter_all_values(&iterable, env)?);
            } else {
                positional.push(self.eval(arg, env)?);
            }
        }
        let mut keyword = Vec::with_capacity(kwargs.len());
        for (name, value_expr) in kwargs {
            match name {
                Some(name) => keyword.push((name.clone(), self.eval(value_expr, env)?)),
                None => {
                    let mapping = self.eval(value_expr, env)?;
                    let Value::Dict(dict) = &mapping else {
                        return Err(Signal::from(Exception::type_error(format!(
                            "argument after ** must be a mapping, not {}",
                            type_name(&mapping)
                        ))));
                    };
                    for (k, v) in dict.borrow().iter() {
                        let Value::Str(key) = k else {
                            return Err(Signal::from(Exception::type_error("keywords must be strings")));
                        };
                        keyword.push((key.to_string(), v.clone()));
                    }
                }
            }
        }
        self.call_value(&callee, positional, keyword, env)
    }

    /// The universal call entry point.
    pub(crate) fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        env: &mut Env,
    ) -> Flow<Value> {
        match callee {
            Value::Function(f) => self.call_pyfunc(f, None, args, kwargs, None),
            Value::BoundMethod { recv, func, def_class } => {
                self.call_pyfunc(func, Some((**recv).clone()), args, kwargs, def_class.clone())
            }
            Value::Method { recv, method } => {
                let outcome =
                    methods::call(*method, (**recv).clone(), CallArgs { args, kwargs }, self.ctx)
                        .map_err(Signal::from)?;
                self.service(outcome, env)
            }
            Value::Builtin(builtin) => {
                let outcome = builtins::call(*builtin, CallArgs { args, kwargs }, self.ctx)
                    .map_err(Signal::from)?;
                self.service(outcome, env)
            }
            Value::Native(native) => {
                if let Some(capability) = &native.capability {
                    if !self.ctx.has_capability(capability) {
                        return Err(Signal::from(Exception::permission_error(format!(
                            "'{}' requires capability '{capability}'",
                            native.name
                        ))));
                    }
                }
                let outcome = (native.f)(args, kwargs, self.ctx).map_err(Signal::from)?;
                self.service(outcome, env)
            }
            Value::Class(class) => self.instantiate(class, args, kwargs, env),
            Value::Instance(inst) => {
                let class = inst.borrow().class.clone();
                match class_lookup_with_origin(&class, "__call__") {
                    Some((Value::Function(f), origin)) => {
                        self.call_pyfunc(&f, Some(callee.clone()), args, kwargs, Some(origin))
                    }
                    _ => Err(Signal::from(Exception::type_error(format!(
                        "'{}' object is not callable",
                        class.name
                    )))),
                }
            }
            other => Err(Signal::from(Exception::type_error(format!(
                "'{}' object is not callable",
                type_name(other)
            )))),
        }
    }

    /// Calls a user-defined function: binds parameters, runs the body in a
    /// fresh scope pushed onto the captured closure chain, and unwinds the
    /// `return` signal. Generator bodies are materialized eagerly.
    pub(crate) fn call_pyfunc(
        &mut self,
        f: &Rc<PyFunc>,
        bound: Option<Value>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        def_class: Option<Rc<ClassObj>>,
    ) -> Flow<Value> {
        self.ctx.check_deadline().map_err(Signal::from)?;
        self.ctx.enter_call(&f.def_.name).map_err(Signal::from)?;
        let mut call_env = Env::from_closure(&f.closure);
        let effective_args: Vec<Value> = bound.clone().into_iter().chain(args).collect();
        if let Err(exc) = bind_params(f, effective_args, kwargs, &mut call_env) {
            self.ctx.exit_call(&f.def_.name);
            return Err(Signal::from(exc));
        }
        self.push_frame(def_class, bound);

        let result = if f.def_.is_generator {
            self.push_sink();
            let run = self.exec_block(&f.def_.body, &mut call_env);
            let items = self.pop_sink();
            match run {
                Ok(()) | Err(Signal::Return(_)) => Ok(Value::Generator(Rc::new(GeneratorState {
                    items,
                    error: None,
                }))),
                Err(Signal::Raise(exc)) => Ok(Value::Generator(Rc::new(GeneratorState {
                    items,
                    error: Some(exc),
                }))),
                Err(other) => Err(other),
            }
        } else {
            match self.exec_block(&f.def_.body, &mut call_env) {
                Ok(()) => Ok(Value::None),
                Err(Signal::Return(value)) => Ok(value),
                Err(other) => Err(other),
            }
        };

        self.pop_frame();
        self.ctx.exit_call(&f.def_.name);
        result
    }

    /// Looks up `name` through the receiver's class and calls it.
    pub(crate) fn call_dunder(
        &mut self,
        recv: &Value,
        name: &str,
        args: Vec<Value>,
        env: &mut Env,
    ) -> Flow<Value> {
        let Value::Instance(inst) = recv else {
            return Err(Signal::from(Exception::attribute_error(format!(
                "'{}' object has no attribute '{name}'",
                type_name(recv)
            ))));
        };
        let class = inst.borrow().class.clone();
        match class_lookup_with_origin(&class, name) {
            Some((Value::Function(f), origin)) => {
                self.call_pyfunc(&f, Some(recv.clone()), args, vec![], Some(origin))
            }
            Some((other, _)) => self.call_value(&other, args, vec![], env),
            None => Err(Signal::from(Exception::attribute_error(format!(
                "'{}' object has no attribute '{name}'",
                class.name
            )))),
        }
    }

    /// Builds an instance: fresh attribute map, then `__init__` through the
    /// DFS MRO.
    fn instantiate(
        &mut self,
        class: &Rc<ClassObj>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        env: &mut Env,
    ) -> Flow<Value> {
        let _ = env;
        let instance = Value::Instance(Rc::new(RefCell::new(Instance {
            class: class.clone(),
            attrs: IndexMap::new(),
        })));
        match class_lookup_with_origin(class, "__init__") {
            Some((Value::Function(f), origin)) => {
                let result = self.call_pyfunc(&f, Some(instance.clone()), args, kwargs, Some(origin))?;
                if !matches!(result, Value::None) {
                    return Err(Signal::from(Exception::type_error(format!(
                        "__init__() should return None, not '{}'",
                        type_name(&result)
                    ))));
                }
            }
            _ => {
                if class_exc_base(class).is_some() {
                    // exception instances keep their constructor args
                    if let Value::Instance(inst) = &instance {
                        inst.borrow_mut()
                            .attrs
                            .insert("args".to_string(), Value::tuple(args));
                    }
                } else if !args.is_empty() || !kwargs.is_empty() {
                    return Err(Signal::from(Exception::type_error(format!(
                        "{}() takes no arguments",
                        class.name
                    ))));
                }
            }
        }
        Ok(instance)
    }

    // --- post-dispatch requests ---------------------------------------------

    pub(crate) fn service(&mut self, outcome: Outcome, env: &mut Env) -> Flow<Value> {
        match outcome {
            Outcome::Value(v) => Ok(v),
            Outcome::Request(request) => self.handle_request(request, env),
        }
    }

    fn handle_request(&mut self, request: Request, env: &mut Env) -> Flow<Value> {
        match request {
            Request::DunderCall { recv, name, args } => self.call_dunder(&recv, name, args, env),
            Request::IterToList(v) => Ok(Value::list(self.iter_all_values(&v, env)?)),
            Request::ExtendList { target, iterable } => {
                let values = self.iter_all_values(&iterable, env)?;
                if let Value::List(list) = &target {
                    list.borrow_mut().extend(values);
                }
                Ok(Value::None)
            }
            Request::IterToTuple(v) => Ok(Value::tuple(self.iter_all_values(&v, env)?)),
            Request::IterToSet(v) => {
                let mut set = Set::new();
                for item in self.iter_all_values(&v, env)? {
                    set.insert(item).map_err(Signal::from)?;
                }
                Ok(Value::set(set))
            }
            Request::IterToFrozenSet(v) => {
                let mut set = Set::new();
                for item in self.iter_all_values(&v, env)? {
                    set.insert(item).map_err(Signal::from)?;
                }
                Ok(Value::FrozenSet(Rc::new(set)))
            }
            Request::IterToDict(v) => {
                if let Value::Dict(source) = &v {
                    return Ok(Value::dict(source.borrow().clone()));
                }
                let mut dict = Dict::new();
                let pairs = self.iter_all_values(&v, env)?;
                for (i, pair) in pairs.iter().enumerate() {
                    let Some(kv) = self.iter_values_for_unpack(pair, env)? else {
                        return Err(Signal::from(Exception::type_error(format!(
                            "cannot convert dictionary update sequence element #{i} to a sequence"
                        ))));
                    };
                    let [k, val] = kv.as_slice() else {
                        return Err(Signal::from(Exception::value_error(format!(
                            "dictionary update sequence element #{i} has length {}; 2 is required",
                            kv.len()
                        ))));
                    };
                    dict.insert(k.clone(), val.clone()).map_err(Signal::from)?;
                }
                Ok(Value::dict(dict))
            }
            Request::IterSum { iterable, start } => {
                let mut total = start;
                for item in self.iter_all_values(&iterable, env)? {
                    total = self.binary_op(crate::ast::BinOp::Add, &total, &item, env)?;
                }
                Ok(total)
            }
            Request::IterAll(v) => {
                let mut cursor = self.cursor(&v, env)?;
                while let Some(item) = self.cursor_next(&mut cursor, env)? {
                    if !self.truthy_value(&item, env)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Request::IterAny(v) => {
                let mut cursor = self.cursor(&v, env)?;
                while let Some(item) = self.cursor_next(&mut cursor, env)? {
                    if self.truthy_value(&item, env)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Request::Sort {
                items,
                key,
                reverse,
                in_place,
            } => {
                if in_place {
                    let Value::List(list) = &items else {
                        return Err(Signal::from(Exception::type_error("sort() expects a list")));
                    };
                    let snapshot = list.borrow().clone();
                    let sorted = self.sort_values(snapshot, key, reverse, env)?;
                    *list.borrow_mut() = sorted;
                    Ok(Value::None)
                } else {
                    let values = self.iter_all_values(&items, env)?;
                    let sorted = self.sort_values(values, key, reverse, env)?;
                    Ok(Value::list(sorted))
                }
            }
            Request::MinMax {
                which,
                args,
                key,
                default,
            } => self.min_max(which, args, key, default, env),
            Request::Map { func, iterables } => {
                let mut columns = Vec::with_capacity(iterables.len());
                for iterable in &iterables {
                    columns.push(self.iter_all_values(iterable, env)?);
                }
                let shortest = columns.iter().map(Vec::len).min().unwrap_or(0);
                let mut out = Vec::with_capacity(shortest);
                for i in 0..shortest {
                    let row: Vec<Value> = columns.iter().map(|c| c[i].clone()).collect();
                    out.push(self.call_value(&func, row, vec![], env)?);
                }
                Ok(Value::Iterator(self.ctx.make_iter(out)))
            }
            Request::Filter { func, iterable } => {
                let values = self.iter_all_values(&iterable, env)?;
                let mut out = Vec::new();
                for item in values {
                    let keep = match &func {
                        Value::None => self.truthy_value(&item, env)?,
                        f => {
                            let result = self.call_value(f, vec![item.clone()], vec![], env)?;
                            self.truthy_value(&result, env)?
                        }
                    };
                    if keep {
                        out.push(item);
                    }
                }
                Ok(Value::Iterator(self.ctx.make_iter(out)))
            }
            Request::Enumerate { iterable, start } => {
                let values = self.iter_all_values(&iterable, env)?;
                let out: Vec<Value> = values
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| Value::tuple(vec![Value::Int(start + i as i64), v]))
                    .collect();
                Ok(Value::Iterator(self.ctx.make_iter(out)))
            }
            Request::Zip(iterables) => {
                let mut columns = Vec::with_capacity(iterables.len());
                for iterable in &iterables {
                    columns.push(self.iter_all_values(iterable, env)?);
                }
                let shortest = columns.iter().map(Vec::len).min().unwrap_or(0);
                let mut out = Vec::with_capacity(shortest);
                for i in 0..shortest {
                    out.push(Value::tuple(columns.iter().map(|c| c[i].clone()).collect()));
                }
                Ok(Value::Iterator(self.ctx.make_iter(out)))
            }
            Request::Reversed(v) => {
                let Some(mut values) = concrete_values(&v, self.ctx).map_err(Signal::from)? else {
                    return Err(Signal::from(Exception::type_error(format!(
                        "argument to reversed() must be a sequence, not '{}'",
                        type_name(&v)
                    ))));
                };
                values.reverse();
                Ok(Value::Iterator(self.ctx.make_iter(values)))
            }
            Request::MakeIter(v) => self.make_iterator(&v, env),
            Request::IterNext { iterator, default } => self.iterator_next_value(&iterator, default, env),
            Request::Print { args, sep, end } => {
                let mut pieces = Vec::with_capacity(args.len());
                for arg in &args {
                    pieces.push(self.str_value(arg, env)?);
                }
                let mut text = pieces.join(&sep);
                text.push_str(&end);
                self.ctx.emit_output(&text);
                Ok(Value::None)
            }
            Request::Str(v) => Ok(Value::str(self.str_value(&v, env)?)),
            Request::Repr(v) => Ok(Value::str(self.repr_value(&v, env)?)),
            Request::Format { value, spec } => {
                if let Value::Instance(_) = value {
                    let rendered = self.str_value(&value, env)?;
                    return format_value(&Value::str(rendered), &spec)
                        .map(Value::str)
                        .map_err(Signal::from);
                }
                format_value(&value, &spec).map(Value::str).map_err(Signal::from)
            }
            Request::Truthy(v) => Ok(Value::Bool(self.truthy_value(&v, env)?)),
            Request::GetAttr { obj, name, default } => match self.get_attr(&obj, &name, env) {
                Ok(v) => Ok(v),
                Err(Signal::Raise(exc)) if exc.kind == ExcType::AttributeError => match default {
                    Some(d) => Ok(d),
                    None => Err(Signal::Raise(exc)),
                },
                Err(other) => Err(other),
            },
            Request::SetAttr { obj, name, value } => {
                self.set_attr(&obj, &name, value)?;
                Ok(Value::None)
            }
            Request::DelAttr { obj, name } => {
                self.del_attr(&obj, &name)?;
                Ok(Value::None)
            }
            Request::HasAttr { obj, name } => match self.get_attr(&obj, &name, env) {
                Ok(_) => Ok(Value::Bool(true)),
                Err(Signal::Raise(exc)) if exc.kind == ExcType::AttributeError => Ok(Value::Bool(false)),
                Err(other) => Err(other),
            },
            Request::SuperCall { args } => self.build_super(args),
            Request::Suspend => {
                // in replay the recorded suspension is consumed and the run
                // continues live past it; otherwise control returns to the host
                let replayed = self
                    .ctx
                    .record(EventKind::Suspend, EventPayload::Empty)
                    .is_some();
                if replayed {
                    Ok(Value::None)
                } else {
                    Err(Signal::Suspend)
                }
            }
        }
    }

    fn sort_values(
        &mut self,
        items: Vec<Value>,
        key: Option<Value>,
        reverse: bool,
        env: &mut Env,
    ) -> Flow<Vec<Value>> {
        let keys: Vec<Value> = match &key {
            Some(key_fn) => {
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    out.push(self.call_value(key_fn, vec![item.clone()], vec![], env)?);
                }
                out
            }
            None => items.clone(),
        };
        let mut order: Vec<usize> = (0..items.len()).collect();
        let mut failure: Option<Exception> = None;
        order.sort_by(|&a, &b| {
            let ord = match py_cmp(&keys[a], &keys[b]) {
                Ok(ord) => ord,
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                    Ordering::Equal
                }
            };
            if reverse { ord.reverse() } else { ord }
        });
        if let Some(exc) = failure {
            return Err(Signal::from(exc));
        }
        Ok(order.into_iter().map(|i| items[i].clone()).collect())
    }

    fn min_max(
        &mut self,
        which: MinMaxKind,
        args: Vec<Value>,
        key: Option<Value>,
        default: Option<Value>,
        env: &mut Env,
    ) -> Flow<Value> {
        let name = if which == MinMaxKind::Max { "max" } else { "min" };
        let values = if args.len() == 1 {
            self.iter_all_values(&args[0], env)?
        } else {
            args
        };
        if values.is_empty() {
            return match default {
                Some(d) => Ok(d),
                None => Err(Signal::from(Exception::value_error(format!(
                    "{name}() arg is an empty sequence"
                )))),
            };
        }
        let mut best = values[0].clone();
        let mut best_key = match &key {
            Some(key_fn) => self.call_value(key_fn, vec![best.clone()], vec![], env)?,
            None => best.clone(),
        };
        for candidate in &values[1..] {
            let candidate_key = match &key {
                Some(key_fn) => self.call_value(key_fn, vec![candidate.clone()], vec![], env)?,
                None => candidate.clone(),
            };
            let ord = py_cmp(&candidate_key, &best_key).map_err(Signal::from)?;
            let better = match which {
                MinMaxKind::Max => ord.is_gt(),
                MinMaxKind::Min => ord.is_lt(),
            };
            if better {
                best = candidate.clone();
                best_key = candidate_key;
            }
        }
        Ok(best)
    }

    fn build_super(&mut self, args: Vec<Value>) -> Flow<Value> {
        match args.len() {
            0 => {
                let Some((class, receiver)) = self.current_super_anchor() else {
                    return Err(Signal::from(Exception::runtime_error("super(): no arguments")));
                };
                let Value::Instance(instance) = receiver else {
                    return Err(Signal::from(Exception::runtime_error(
                        "super(): __class__ cell not found",
                    )));
                };
                Ok(Value::Super { class, instance })
            }
            2 => {
                let (Value::Class(class), Value::Instance(instance)) = (&args[0], &args[1]) else {
                    return Err(Signal::from(Exception::type_error(
                        "super() argument 1 must be a type and argument 2 an instance",
                    )));
                };
                Ok(Value::Super {
                    class: class.clone(),
                    instance: instance.clone(),
                })
            }
            n => Err(Signal::from(Exception::type_error(format!(
                "super() takes 0 or 2 arguments ({n} given)"
            )))),
        }
    }
}

/// Binds call arguments to parameter names in the fresh call scope.
fn bind_params(
    f: &Rc<PyFunc>,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    call_env: &mut Env,
) -> Result<(), Exception> {
    let def = &f.def_;
    let name = &def.name;
    let positional_params: Vec<&str> = def
        .params
        .posonly
        .iter()
        .chain(&def.params.args)
        .map(|p| p.name.as_str())
        .collect();
    let posonly_count = def.params.posonly.len();
    let mut bound: IndexMap<&str, Value> = IndexMap::new();

    // positional
    let mut extra_positional = Vec::new();
    for (i, value) in args.into_iter().enumerate() {
        match positional_params.get(i) {
            Some(param) => {
                bound.insert(*param, value);
            }
            None => extra_positional.push(value),
        }
    }
    if !extra_positional.is_empty() && def.params.vararg.is_none() {
        let expected = positional_params.len();
        let got = expected + extra_positional.len();
        return Err(Exception::type_error(format!(
            "{name}() takes {expected} positional argument{} but {got} {} given",
            if expected == 1 { "" } else { "s" },
            if got == 1 { "was" } else { "were" },
        )));
    }

    // keyword
    let mut kwarg_spill: Vec<(String, Value)> = Vec::new();
    for (key, value) in kwargs {
        let is_positional_kw = positional_params
            .iter()
            .skip(posonly_count)
            .any(|p| *p == key);
        let is_kwonly = def.params.kwonly.iter().any(|p| p.name == key);
        if is_positional_kw || is_kwonly {
            if bound.contains_key(key.as_str()) {
                return Err(Exception::type_error(format!(
                    "{name}() got multiple values for argument '{key}'"
                )));
            }
            let slot = positional_params
                .iter()
                .find(|p| **p == key)
                .copied()
                .or_else(|| def.params.kwonly.iter().find(|p| p.name == key).map(|p| p.name.as_str()));
            if let Some(slot) = slot {
                bound.insert(slot, value);
            }
        } else if def.params.kwarg.is_some() {
            kwarg_spill.push((key, value));
        } else {
            return Err(Exception::type_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            )));
        }
    }

    // defaults and missing-argument checks
    let mut missing = Vec::new();
    for (i, param) in def.params.posonly.iter().chain(&def.params.args).enumerate() {
        if !bound.contains_key(param.name.as_str()) {
            match &f.pos_defaults[i] {
                Some(default) => {
                    bound.insert(param.name.as_str(), default.clone());
                }
                None => missing.push(param.name.clone()),
            }
        }
    }
    if !missing.is_empty() {
        let listed: Vec<String> = missing.iter().map(|m| format!("'{m}'")).collect();
        return Err(Exception::type_error(format!(
            "{name}() missing {} required positional argument{}: {}",
            missing.len(),
            if missing.len() == 1 { "" } else { "s" },
            listed.join(" and ")
        )));
    }
    for (i, param) in def.params.kwonly.iter().enumerate() {
        if !bound.contains_key(param.name.as_str()) {
            match &f.kw_defaults[i] {
                Some(default) => {
                    bound.insert(param.name.as_str(), default.clone());
                }
                None => {
                    return Err(Exception::type_error(format!(
                        "{name}() missing 1 required keyword-only argument: '{}'",
                        param.name
                    )));
                }
            }
        }
    }

    for (param, value) in bound {
        call_env.put(param, value);
    }
    if let Some(vararg) = &def.params.vararg {
        call_env.put(vararg, Value::tuple(extra_positional));
    }
    if let Some(kwarg) = &def.params.kwarg {
        let mut spill = Dict::new();
        for (k, v) in kwarg_spill {
            spill.insert(Value::str(k), v)?;
        }
        call_env.put(kwarg, Value::dict(spill));
    }
    Ok(())
}
