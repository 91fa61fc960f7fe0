//! Expression evaluation.

use std::rc::Rc;

use crate::{
    ast::{
        BinOp, BoolOp, CmpOp, Comprehension, Conversion, DictItem, ExprKind, ExprNode, FStringPart,
        FormatSpecAst, FuncDef, Literal, Params, StmtKind, UnaryOp,
    },
    builtins::Builtin,
    env::Env,
    eval::{binop, Flow, Interp},
    event::{EventKind, EventPayload},
    exception::{Exception, Signal},
    format::format_value,
    types::{Dict, Set},
    value::{py_eq, py_repr, type_name, GeneratorState, Value},
};

/// Index operand: a plain value or an evaluated slice.
pub(crate) enum IndexValue {
    Value(Value),
    Slice {
        lower: Option<Value>,
        upper: Option<Value>,
        step: Option<Value>,
    },
}

impl Interp<'_> {
    pub(crate) fn eval(&mut self, expr: &ExprNode, env: &mut Env) -> Flow<Value> {
        self.eval_inner(expr, env).map_err(|sig| match sig {
            Signal::Raise(exc) => Signal::Raise(exc.at_line(expr.line)),
            other => other,
        })
    }

    fn eval_inner(&mut self, expr: &ExprNode, env: &mut Env) -> Flow<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::FString(parts) => {
                let text = self.eval_fstring_parts(parts, env)?;
                Ok(Value::str(text))
            }
            ExprKind::Name(name) => self.lookup_name(name, env),
            ExprKind::List(items) => Ok(Value::list(self.eval_display_items(items, env)?)),
            ExprKind::Tuple(items) => Ok(Value::tuple(self.eval_display_items(items, env)?)),
            ExprKind::Set(items) => {
                let mut set = Set::new();
                for item in self.eval_display_items(items, env)? {
                    set.insert(item).map_err(Signal::from)?;
                }
                Ok(Value::set(set))
            }
            ExprKind::Dict(items) => {
                let mut dict = Dict::new();
                for item in items {
                    match item {
                        DictItem::Pair { key, value } => {
                            let key = self.eval(key, env)?;
                            let value = self.eval(value, env)?;
                            dict.insert(key, value).map_err(Signal::from)?;
                        }
                        DictItem::Unpack(mapping) => {
                            let mapping = self.eval(mapping, env)?;
                            match &mapping {
                                Value::Dict(other) => {
                                    let other = other.borrow().clone();
                                    for (k, v) in other.iter() {
                                        dict.insert(k.clone(), v.clone()).map_err(Signal::from)?;
                                    }
                                }
                                other => {
                                    return Err(Signal::from(Exception::type_error(format!(
                                        "argument after ** must be a mapping, not {}",
                                        type_name(other)
                                    ))));
                                }
                            }
                        }
                    }
                }
                Ok(Value::dict(dict))
            }
            ExprKind::Starred(_) => Err(Signal::from(Exception::syntax_error(
                "starred expression is only allowed in calls and sequence displays",
            ))),
            ExprKind::Unary { op, operand } => {
                let operand_value = self.eval(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!self.truthy_value(&operand_value, env)?)),
                    UnaryOp::Neg => {
                        if let Value::Instance(_) = operand_value {
                            return self.call_dunder(&operand_value, "__neg__", vec![], env);
                        }
                        binop::negate(&operand_value).map_err(Signal::from)
                    }
                    UnaryOp::Pos => binop::unary_plus(&operand_value).map_err(Signal::from),
                    UnaryOp::Invert => binop::invert(&operand_value).map_err(Signal::from),
                }
            }
            ExprKind::Binary { left, op, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                self.binary_op(*op, &left, &right, env)
            }
            ExprKind::Bool { op, values } => {
                let mut last = Value::None;
                for (i, value_expr) in values.iter().enumerate() {
                    last = self.eval(value_expr, env)?;
                    if i + 1 == values.len() {
                        break;
                    }
                    let is_truthy = self.truthy_value(&last, env)?;
                    match op {
                        BoolOp::And if !is_truthy => break,
                        BoolOp::Or if is_truthy => break,
                        _ => {}
                    }
                }
                Ok(last)
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut lhs = self.eval(left, env)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    let rhs = self.eval(comparator, env)?;
                    if !self.compare(*op, &lhs, &rhs, env)? {
                        return Ok(Value::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::Ternary { test, body, orelse } => {
                let test_value = self.eval(test, env)?;
                if self.truthy_value(&test_value, env)? {
                    self.eval(body, env)
                } else {
                    self.eval(orelse, env)
                }
            }
            ExprKind::Named { name, value } => {
                let value = self.eval(value, env)?;
                self.ctx.record(
                    EventKind::Assign,
                    EventPayload::Assign {
                        name: name.clone(),
                        repr: crate::event::clip(py_repr(&value)),
                    },
                );
                env.put(name, value.clone());
                Ok(value)
            }
            ExprKind::Call { func, args, kwargs } => self.eval_call(func, args, kwargs, env),
            ExprKind::Attr { object, attr } => {
                let object = self.eval(object, env)?;
                self.get_attr(&object, attr, env)
            }
            ExprKind::Subscript { object, index } => {
                let object = self.eval(object, env)?;
                let index = self.eval_index(index, env)?;
                self.subscript_get(&object, index, env)
            }
            ExprKind::Slice { .. } => Err(Signal::from(Exception::syntax_error(
                "slice is only allowed inside a subscript",
            ))),
            ExprKind::Lambda { params, body } => self.make_lambda(params, body, env),
            ExprKind::ListComp { elt, generators } => {
                env.push_scope();
                let mut out = Vec::new();
                let result = self.comp_list(generators, 0, elt, &mut out, env);
                env.pop_scope();
                result?;
                Ok(Value::list(out))
            }
            ExprKind::SetComp { elt, generators } => {
                env.push_scope();
                let mut out = Vec::new();
                let result = self.comp_list(generators, 0, elt, &mut out, env);
                env.pop_scope();
                result?;
                let mut set = Set::new();
                for item in out {
                    set.insert(item).map_err(Signal::from)?;
                }
                Ok(Value::set(set))
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                env.push_scope();
                let mut out = Vec::new();
                let result = self.comp_pairs(generators, 0, key, value, &mut out, env);
                env.pop_scope();
                result?;
                let mut dict = Dict::new();
                for (k, v) in out {
                    dict.insert(k, v).map_err(Signal::from)?;
                }
                Ok(Value::dict(dict))
            }
            ExprKind::GeneratorExp { elt, generators } => {
                // generator expressions are materialized eagerly
                env.push_scope();
                let mut out = Vec::new();
                let result = self.comp_list(generators, 0, elt, &mut out, env);
                env.pop_scope();
                match result {
                    Ok(()) => Ok(Value::Generator(Rc::new(GeneratorState {
                        items: out,
                        error: None,
                    }))),
                    Err(Signal::Raise(exc)) => Ok(Value::Generator(Rc::new(GeneratorState {
                        items: out,
                        error: Some(exc),
                    }))),
                    Err(other) => Err(other),
                }
            }
            ExprKind::Yield(value) => {
                let value = match value {
                    Some(v) => self.eval(v, env)?,
                    None => Value::None,
                };
                self.yield_value(value)?;
                Ok(Value::None)
            }
            ExprKind::YieldFrom(iterable) => {
                let iterable = self.eval(iterable, env)?;
                let values = self.iter_all_values(&iterable, env)?;
                for value in values {
                    self.yield_value(value)?;
                }
                Ok(Value::None)
            }
        }
    }

    fn lookup_name(&mut self, name: &str, env: &mut Env) -> Flow<Value> {
        if let Some(v) = env.get(name) {
            return Ok(v);
        }
        if let Some(builtin) = Builtin::from_name(name) {
            return Ok(Value::Builtin(builtin));
        }
        Err(Signal::from(Exception::name_error(format!(
            "name '{name}' is not defined"
        ))))
    }

    /// Display items with `*iterable` unpacking.
    fn eval_display_items(&mut self, items: &[ExprNode], env: &mut Env) -> Flow<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if let ExprKind::Starred(inner) = &item.kind {
                let iterable = self.eval(inner, env)?;
                out.extend(self.iter_all_values(&iterable, env)?);
            } else {
                out.push(self.eval(item, env)?);
            }
        }
        Ok(out)
    }

    fn make_lambda(&mut self, params: &Params, body: &ExprNode, env: &mut Env) -> Flow<Value> {
        let def = Rc::new(FuncDef {
            name: "<lambda>".to_string(),
            params: params.clone(),
            body: vec![crate::ast::Stmt {
                line: body.line,
                kind: StmtKind::Return(Some(body.clone())),
            }],
            decorators: vec![],
            is_generator: false,
            line: body.line,
        });
        self.make_function(&def, env)
    }

    // --- operators ----------------------------------------------------------

    pub(crate) fn binary_op(&mut self, op: BinOp, left: &Value, right: &Value, env: &mut Env) -> Flow<Value> {
        if let Value::Instance(_) = left {
            return self.call_dunder(left, binop_dunder(op), vec![right.clone()], env);
        }
        if let Value::Instance(_) = right {
            if let Some(reflected) = binop_reflected(op) {
                return self.call_dunder(right, reflected, vec![left.clone()], env);
            }
        }
        binop::binary(op, left, right).map_err(Signal::from)
    }

    pub(crate) fn compare(&mut self, op: CmpOp, left: &Value, right: &Value, env: &mut Env) -> Flow<bool> {
        match op {
            CmpOp::Is => Ok(binop::is_identical(left, right)),
            CmpOp::IsNot => Ok(!binop::is_identical(left, right)),
            CmpOp::In | CmpOp::NotIn => {
                let contained = match right {
                    Value::Instance(inst) => {
                        let class = inst.borrow().class.clone();
                        if crate::value::class_lookup(&class, "__contains__").is_some() {
                            let result =
                                self.call_dunder(right, "__contains__", vec![left.clone()], env)?;
                            self.truthy_value(&result, env)?
                        } else {
                            let values = self.iter_all_values(right, env)?;
                            values.iter().any(|x| py_eq(x, left))
                        }
                    }
                    _ => binop::contains(right, left).map_err(Signal::from)?,
                };
                Ok(if op == CmpOp::In { contained } else { !contained })
            }
            CmpOp::Eq | CmpOp::NotEq => {
                let equal = self.values_equal(left, right, env)?;
                Ok(if op == CmpOp::Eq { equal } else { !equal })
            }
            CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
                if let Value::Instance(_) = left {
                    let result = self.call_dunder(left, cmp_dunder(op), vec![right.clone()], env)?;
                    return self.truthy_value(&result, env);
                }
                let ordering = crate::value::py_cmp(left, right).map_err(Signal::from)?;
                Ok(match op {
                    CmpOp::Lt => ordering.is_lt(),
                    CmpOp::LtE => ordering.is_le(),
                    CmpOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                })
            }
        }
    }

    pub(crate) fn values_equal(&mut self, left: &Value, right: &Value, env: &mut Env) -> Flow<bool> {
        if let Value::Instance(inst) = left {
            let class = inst.borrow().class.clone();
            if crate::value::class_lookup(&class, "__eq__").is_some() {
                let result = self.call_dunder(left, "__eq__", vec![right.clone()], env)?;
                return self.truthy_value(&result, env);
            }
        }
        if let Value::Instance(inst) = right {
            let class = inst.borrow().class.clone();
            if crate::value::class_lookup(&class, "__eq__").is_some() {
                let result = self.call_dunder(right, "__eq__", vec![left.clone()], env)?;
                return self.truthy_value(&result, env);
            }
        }
        Ok(py_eq(left, right))
    }

    // --- subscripts ---------------------------------------------------------

    pub(crate) fn eval_index(&mut self, index: &ExprNode, env: &mut Env) -> Flow<IndexValue> {
        if let ExprKind::Slice { lower, upper, step } = &index.kind {
            let eval_part = |interp: &mut Self, part: &Option<Box<ExprNode>>, env: &mut Env| match part {
                Some(e) => interp.eval(e, env).map(Some),
                None => Ok(None),
            };
            let lower = eval_part(self, lower, env)?;
            let upper = eval_part(self, upper, env)?;
            let step = eval_part(self, step, env)?;
            return Ok(IndexValue::Slice { lower, upper, step });
        }
        Ok(IndexValue::Value(self.eval(index, env)?))
    }

    pub(crate) fn subscript_get(&mut self, obj: &Value, index: IndexValue, env: &mut Env) -> Flow<Value> {
        match index {
            IndexValue::Value(index) => self.get_subscript(obj, &index, env),
            IndexValue::Slice { lower, upper, step } => self.slice_get(obj, &lower, &upper, &step),
        }
    }

    pub(crate) fn get_subscript(&mut self, obj: &Value, index: &Value, env: &mut Env) -> Flow<Value> {
        match obj {
            Value::List(items) => {
                let items = items.borrow();
                let i = normalize_index(index, items.len(), "list")?;
                Ok(items[i].clone())
            }
            Value::Tuple(items) => {
                let i = normalize_index(index, items.len(), "tuple")?;
                Ok(items[i].clone())
            }
            Value::Str(s) => {
                let len = s.chars().count();
                let i = normalize_index(index, len, "string")?;
                let c = s.chars().nth(i).unwrap_or('\0');
                Ok(Value::str(c.to_string()))
            }
            Value::Deque(items) => {
                let items = items.borrow();
                let i = normalize_index(index, items.len(), "deque")?;
                Ok(items[i].clone())
            }
            Value::Dict(dict) => {
                if let Some(v) = dict.borrow().get(index).map_err(Signal::from)? {
                    return Ok(v.clone());
                }
                // defaultdict: a missing key invokes the factory and stores
                let factory = dict.borrow().default_factory.clone();
                match factory {
                    Some(factory) => {
                        let default = self.call_value(&factory, vec![], vec![], env)?;
                        dict.borrow_mut()
                            .insert(index.clone(), default.clone())
                            .map_err(Signal::from)?;
                        Ok(default)
                    }
                    None => Err(Signal::from(Exception::key_error(py_repr(index)))),
                }
            }
            Value::Range { start, stop, step } => {
                let len = crate::value::range_len(*start, *stop, *step);
                let i = match index {
                    Value::Int(i) => *i,
                    Value::Bool(b) => i64::from(*b),
                    other => {
                        return Err(Signal::from(Exception::type_error(format!(
                            "range indices must be integers or slices, not {}",
                            type_name(other)
                        ))));
                    }
                };
                let i = if i < 0 { i + len } else { i };
                if !(0..len).contains(&i) {
                    return Err(Signal::from(Exception::index_error("range object index out of range")));
                }
                Ok(Value::Int(start + i * step))
            }
            Value::Instance(_) => self.call_dunder(obj, "__getitem__", vec![index.clone()], env),
            other => Err(Signal::from(Exception::type_error(format!(
                "'{}' object is not subscriptable",
                type_name(other)
            )))),
        }
    }

    fn slice_get(
        &mut self,
        obj: &Value,
        lower: &Option<Value>,
        upper: &Option<Value>,
        step: &Option<Value>,
    ) -> Flow<Value> {
        let step = slice_step(step)?;
        match obj {
            Value::List(items) => {
                let items = items.borrow();
                let picked = slice_pick(items.len(), lower, upper, step)?;
                Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
            }
            Value::Tuple(items) => {
                let picked = slice_pick(items.len(), lower, upper, step)?;
                Ok(Value::tuple(picked.into_iter().map(|i| items[i].clone()).collect()))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let picked = slice_pick(chars.len(), lower, upper, step)?;
                Ok(Value::str(picked.into_iter().map(|i| chars[i]).collect::<String>()))
            }
            other => Err(Signal::from(Exception::type_error(format!(
                "'{}' object is not subscriptable",
                type_name(other)
            )))),
        }
    }

    pub(crate) fn set_subscript(&mut self, obj: &Value, index: Value, value: Value, env: &mut Env) -> Flow<()> {
        match obj {
            Value::List(items) => {
                let len = items.borrow().len();
                let i = normalize_index_err(&index, len, "list assignment index out of range")?;
                items.borrow_mut()[i] = value;
                Ok(())
            }
            Value::Dict(dict) => {
                dict.borrow_mut().insert(index, value).map_err(Signal::from)?;
                Ok(())
            }
            Value::Deque(items) => {
                let len = items.borrow().len();
                let i = normalize_index_err(&index, len, "deque assignment index out of range")?;
                items.borrow_mut()[i] = value;
                Ok(())
            }
            Value::Instance(_) => {
                self.call_dunder(obj, "__setitem__", vec![index, value], env)?;
                Ok(())
            }
            other => Err(Signal::from(Exception::type_error(format!(
                "'{}' object does not support item assignment",
                type_name(other)
            )))),
        }
    }

    /// Assignment through a slice target: `l[1:3] = iterable`.
    pub(crate) fn set_slice(
        &mut self,
        obj: &Value,
        lower: &Option<Value>,
        upper: &Option<Value>,
        step: &Option<Value>,
        value: Value,
        env: &mut Env,
    ) -> Flow<()> {
        let Value::List(items) = obj else {
            return Err(Signal::from(Exception::type_error(format!(
                "'{}' object does not support slice assignment",
                type_name(obj)
            ))));
        };
        let new_items = self.iter_all_values(&value, env)?;
        let step = slice_step(step)?;
        let len = items.borrow().len();
        let picked = slice_pick(len, lower, upper, step)?;
        if step == 1 {
            let start = picked.first().copied().unwrap_or_else(|| {
                // empty selection: insertion point from the lower bound
                slice_bound(lower, len, 0)
            });
            let end = picked.last().map_or(start, |last| last + 1);
            items.borrow_mut().splice(start..end, new_items);
            Ok(())
        } else {
            if picked.len() != new_items.len() {
                return Err(Signal::from(Exception::value_error(format!(
                    "attempt to assign sequence of size {} to extended slice of size {}",
                    new_items.len(),
                    picked.len()
                ))));
            }
            let mut items = items.borrow_mut();
            for (slot, item) in picked.into_iter().zip(new_items) {
                items[slot] = item;
            }
            Ok(())
        }
    }

    pub(crate) fn del_subscript(&mut self, obj: &Value, index: &Value, env: &mut Env) -> Flow<()> {
        match obj {
            Value::List(items) => {
                let len = items.borrow().len();
                let i = normalize_index_err(index, len, "list assignment index out of range")?;
                items.borrow_mut().remove(i);
                Ok(())
            }
            Value::Dict(dict) => match dict.borrow_mut().remove(index).map_err(Signal::from)? {
                Some(_) => Ok(()),
                None => Err(Signal::from(Exception::key_error(py_repr(index)))),
            },
            Value::Instance(_) => {
                self.call_dunder(obj, "__delitem__", vec![index.clone()], env)?;
                Ok(())
            }
            other => Err(Signal::from(Exception::type_error(format!(
                "'{}' object doesn't support item deletion",
                type_name(other)
            )))),
        }
    }

    // --- comprehensions -----------------------------------------------------

    fn comp_list(
        &mut self,
        generators: &[Comprehension],
        depth: usize,
        elt: &ExprNode,
        out: &mut Vec<Value>,
        env: &mut Env,
    ) -> Flow<()> {
        if depth == generators.len() {
            let value = self.eval(elt, env)?;
            out.push(value);
            return Ok(());
        }
        let generator = &generators[depth];
        let iterable = self.eval(&generator.iter, env)?;
        let mut cursor = self.cursor(&iterable, env)?;
        'items: while let Some(item) = self.cursor_next(&mut cursor, env)? {
            self.ctx.check_deadline().map_err(Signal::from)?;
            self.assign_target(&generator.target, item, env)?;
            for cond in &generator.ifs {
                let cond_value = self.eval(cond, env)?;
                if !self.truthy_value(&cond_value, env)? {
                    continue 'items;
                }
            }
            self.comp_list(generators, depth + 1, elt, out, env)?;
        }
        Ok(())
    }

    fn comp_pairs(
        &mut self,
        generators: &[Comprehension],
        depth: usize,
        key: &ExprNode,
        value: &ExprNode,
        out: &mut Vec<(Value, Value)>,
        env: &mut Env,
    ) -> Flow<()> {
        if depth == generators.len() {
            let k = self.eval(key, env)?;
            let v = self.eval(value, env)?;
            out.push((k, v));
            return Ok(());
        }
        let generator = &generators[depth];
        let iterable = self.eval(&generator.iter, env)?;
        let mut cursor = self.cursor(&iterable, env)?;
        'items: while let Some(item) = self.cursor_next(&mut cursor, env)? {
            self.ctx.check_deadline().map_err(Signal::from)?;
            self.assign_target(&generator.target, item, env)?;
            for cond in &generator.ifs {
                let cond_value = self.eval(cond, env)?;
                if !self.truthy_value(&cond_value, env)? {
                    continue 'items;
                }
            }
            self.comp_pairs(generators, depth + 1, key, value, out, env)?;
        }
        Ok(())
    }

    // --- f-strings ----------------------------------------------------------

    pub(crate) fn eval_fstring_parts(&mut self, parts: &[FStringPart], env: &mut Env) -> Flow<String> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(text) => out.push_str(text),
                FStringPart::Interpolation {
                    expr,
                    conversion,
                    spec,
                } => {
                    let value = self.eval(expr, env)?;
                    let value = match conversion {
                        Conversion::Repr | Conversion::Ascii => Value::str(self.repr_value(&value, env)?),
                        Conversion::Str => Value::str(self.str_value(&value, env)?),
                        Conversion::None => value,
                    };
                    let spec_text = match spec {
                        None => String::new(),
                        Some(FormatSpecAst::Static(s)) => s.to_string(),
                        Some(FormatSpecAst::Dynamic(parts)) => self.eval_fstring_parts(parts, env)?,
                    };
                    if spec_text.is_empty() {
                        out.push_str(&self.str_value(&value, env)?);
                    } else if let Value::Instance(_) = value {
                        let rendered = self.str_value(&value, env)?;
                        out.push_str(&format_value(&Value::str(rendered), &spec_text).map_err(Signal::from)?);
                    } else {
                        out.push_str(&format_value(&value, &spec_text).map_err(Signal::from)?);
                    }
                }
            }
        }
        Ok(out)
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::BigInt(b) => Value::BigInt(Rc::new(b.clone())),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn binop_dunder(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "__add__",
        BinOp::Sub => "__sub__",
        BinOp::Mul => "__mul__",
        BinOp::Div => "__truediv__",
        BinOp::FloorDiv => "__floordiv__",
        BinOp::Mod => "__mod__",
        BinOp::Pow => "__pow__",
        BinOp::LShift => "__lshift__",
        BinOp::RShift => "__rshift__",
        BinOp::BitOr => "__or__",
        BinOp::BitXor => "__xor__",
        BinOp::BitAnd => "__and__",
        BinOp::MatMul => "__matmul__",
    }
}

fn binop_reflected(op: BinOp) -> Option<&'static str> {
    Some(match op {
        BinOp::Add => "__radd__",
        BinOp::Sub => "__rsub__",
        BinOp::Mul => "__rmul__",
        BinOp::Div => "__rtruediv__",
        BinOp::FloorDiv => "__rfloordiv__",
        BinOp::Mod => "__rmod__",
        BinOp::Pow => "__rpow__",
        _ => return None,
    })
}

fn cmp_dunder(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Lt => "__lt__",
        CmpOp::LtE => "__le__",
        CmpOp::Gt => "__gt__",
        CmpOp::GtE => "__ge__",
        _ => "__eq__",
    }
}

/// Python index normalization for sequences: negatives from the end,
/// `IndexError` out of range, `TypeError` for non-ints.
fn normalize_index(index: &Value, len: usize, what: &str) -> Result<usize, Signal> {
    let i = match index {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        other => {
            return Err(Signal::from(Exception::type_error(format!(
                "{what} indices must be integers or slices, not {}",
                type_name(other)
            ))));
        }
    };
    let len = len as i64;
    let i = if i < 0 { i + len } else { i };
    if (0..len).contains(&i) {
        Ok(i as usize)
    } else {
        Err(Signal::from(Exception::index_error(format!(
            "{what} index out of range"
        ))))
    }
}

fn normalize_index_err(index: &Value, len: usize, message: &str) -> Result<usize, Signal> {
    normalize_index(index, len, "list").map_err(|sig| match sig {
        Signal::Raise(exc) if exc.kind == crate::exception::ExcType::IndexError => {
            Signal::from(Exception::index_error(message))
        }
        other => other,
    })
}

fn slice_step(step: &Option<Value>) -> Result<i64, Signal> {
    match step {
        None | Some(Value::None) => Ok(1),
        Some(Value::Int(0)) => Err(Signal::from(Exception::value_error("slice step cannot be zero"))),
        Some(Value::Int(i)) => Ok(*i),
        Some(other) => Err(Signal::from(Exception::type_error(format!(
            "slice indices must be integers or None, not {}",
            type_name(other)
        )))),
    }
}

fn slice_bound(bound: &Option<Value>, len: usize, default: usize) -> usize {
    match bound {
        Some(Value::Int(i)) => {
            let len = len as i64;
            let i = if *i < 0 { i + len } else { *i };
            i.clamp(0, len) as usize
        }
        _ => default,
    }
}

/// The element indices a slice selects, in selection order.
fn slice_pick(
    len: usize,
    lower: &Option<Value>,
    upper: &Option<Value>,
    step: i64,
) -> Result<Vec<usize>, Signal> {
    let bound = |v: &Option<Value>, default: i64| -> Result<i64, Signal> {
        match v {
            None | Some(Value::None) => Ok(default),
            Some(Value::Int(i)) => Ok(*i),
            Some(Value::Bool(b)) => Ok(i64::from(*b)),
            Some(other) => Err(Signal::from(Exception::type_error(format!(
                "slice indices must be integers or None, not {}",
                type_name(other)
            )))),
        }
    };
    let ilen = len as i64;
    let adjust = |i: i64, low_clamp: i64, high_clamp: i64| -> i64 {
        let i = if i < 0 { i + ilen } else { i };
        i.clamp(low_clamp, high_clamp)
    };
    let mut out = Vec::new();
    if step > 0 {
        let start = adjust(bound(lower, 0)?, 0, ilen);
        let stop = adjust(bound(upper, ilen)?, 0, ilen);
        let mut i = start;
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        let start = adjust(bound(lower, ilen - 1)?, -1, ilen - 1);
        let stop = adjust(bound(upper, -ilen - 1)?, -1, ilen - 1);
        // negative upper bound sentinel: `x[::-1]` runs to the front
        let stop = match bound(upper, i64::MIN)? {
            i64::MIN => -1,
            _ => stop,
        };
        let mut i = start;
        while i > stop {
            if (0..ilen).contains(&i) {
                out.push(i as usize);
            }
            i += step;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picked(len: usize, lower: Option<i64>, upper: Option<i64>, step: i64) -> Vec<usize> {
        slice_pick(
            len,
            &lower.map(Value::Int),
            &upper.map(Value::Int),
            step,
        )
        .unwrap()
    }

    #[test]
    fn forward_slices() {
        assert_eq!(picked(5, None, None, 1), vec![0, 1, 2, 3, 4]);
        assert_eq!(picked(5, Some(1), Some(4), 1), vec![1, 2, 3]);
        assert_eq!(picked(5, Some(-3), None, 1), vec![2, 3, 4]);
        assert_eq!(picked(5, None, Some(-1), 2), vec![0, 2]);
        assert_eq!(picked(5, Some(10), None, 1), Vec::<usize>::new());
    }

    #[test]
    fn reverse_slices() {
        assert_eq!(picked(5, None, None, -1), vec![4, 3, 2, 1, 0]);
        assert_eq!(picked(5, Some(3), Some(0), -1), vec![3, 2, 1]);
        assert_eq!(picked(5, None, None, -2), vec![4, 2, 0]);
    }
}
