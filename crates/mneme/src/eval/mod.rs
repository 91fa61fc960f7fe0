//! The tree-walking evaluator.
//!
//! Mutually-recursive functions over `(node, env, ctx)`; every function
//! returns `Result<_, Signal>` and `?` threads signals to the construct
//! that handles them. The context is carried in the `Interp` struct and
//! records events, gates I/O, and bounds compute time along the way.

pub(crate) mod binop;
pub(crate) mod call;
pub(crate) mod class;
pub(crate) mod expr;
pub(crate) mod iter;
pub(crate) mod pattern;

use std::rc::Rc;

use crate::{
    ast::{Ast, ExceptHandler, ExprNode, FuncDef, Param, Stmt, StmtKind, Target},
    builtins::{isinstance, Builtin},
    context::Ctx,
    env::Env,
    event::{clip, EventKind, EventPayload},
    exception::{ExcType, Exception, Signal},
    value::{class_exc_base, py_repr, py_str, ClassObj, ExcValue, PyFunc, Value},
};

/// Signal-threaded result used by every evaluation function.
pub(crate) type Flow<T> = Result<T, Signal>;

/// Generators are materialized eagerly, so unbounded producers (a
/// `while True: yield ...` loop) are cut off after this many values and
/// behave like a generator that returned.
const GENERATOR_MATERIALIZATION_LIMIT: usize = 10_000;

/// One call frame's `super()` anchor: the class that defined the executing
/// method and the receiver it was called on.
struct Frame {
    class: Option<Rc<ClassObj>>,
    receiver: Option<Value>,
}

/// The evaluator. Holds the context for the duration of one run; the
/// environment is threaded through as a parameter.
pub(crate) struct Interp<'c> {
    pub ctx: &'c mut Ctx,
    frames: Vec<Frame>,
    /// Yield sinks for generator-body materialization, innermost last.
    sinks: Vec<Vec<Value>>,
    /// Exceptions currently being handled, for bare `raise`.
    handling: Vec<Exception>,
}

impl<'c> Interp<'c> {
    pub fn new(ctx: &'c mut Ctx) -> Self {
        Self {
            ctx,
            frames: Vec::new(),
            sinks: Vec::new(),
            handling: Vec::new(),
        }
    }

    /// Runs a module body; the result is the value of the final top-level
    /// expression statement, or `None`.
    pub fn run_module(&mut self, ast: &Ast, env: &mut Env) -> Flow<Value> {
        let mut last = Value::None;
        for stmt in &ast.body {
            if let Some(value) = self.exec_stmt(stmt, env)? {
                last = value;
            }
        }
        Ok(last)
    }

    pub fn exec_block(&mut self, body: &[Stmt], env: &mut Env) -> Flow<()> {
        for stmt in body {
            self.exec_stmt(stmt, env)?;
        }
        Ok(())
    }

    /// Executes one statement; expression statements report their value so
    /// the module body can surface the last one.
    fn exec_stmt(&mut self, stmt: &Stmt, env: &mut Env) -> Flow<Option<Value>> {
        self.ctx.profile_hit(stmt.line);
        self.exec_stmt_inner(stmt, env).map_err(|sig| match sig {
            Signal::Raise(exc) => Signal::Raise(exc.at_line(stmt.line)),
            other => other,
        })
    }

    fn exec_stmt_inner(&mut self, stmt: &Stmt, env: &mut Env) -> Flow<Option<Value>> {
        match &stmt.kind {
            StmtKind::Expr(e) => return Ok(Some(self.eval(e, env)?)),
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value, env)?;
                for target in targets {
                    self.assign_target(target, value.clone(), env)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                let rhs = self.eval(value, env)?;
                let current = self.read_target(target, env)?;
                // `list += iterable` extends the aliased list in place
                if *op == crate::ast::BinOp::Add {
                    if let Value::List(items) = &current {
                        let Some(extra) = iter::concrete_values(&rhs, self.ctx).map_err(Signal::from)? else {
                            return Err(Signal::from(Exception::type_error(format!(
                                "'{}' object is not iterable",
                                crate::value::type_name(&rhs)
                            ))));
                        };
                        items.borrow_mut().extend(extra);
                        return Ok(None);
                    }
                }
                let result = self.binary_op(*op, &current, &rhs, env)?;
                self.rebind_target(target, result, env)?;
            }
            StmtKind::AnnAssign { target, value } => {
                if let Some(value) = value {
                    let value = self.eval(value, env)?;
                    self.assign_target(target, value, env)?;
                }
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(v) => self.eval(v, env)?,
                    None => Value::None,
                };
                return Err(Signal::Return(value));
            }
            StmtKind::Raise { exc, cause } => {
                if let Some(cause) = cause {
                    // evaluated for effect; exception chaining is not modeled
                    self.eval(cause, env)?;
                }
                let exception = match exc {
                    None => match self.handling.last() {
                        Some(active) => active.clone(),
                        None => Exception::runtime_error("No active exception to re-raise"),
                    },
                    Some(e) => {
                        let value = self.eval(e, env)?;
                        self.exception_from_value(value, env)?
                    }
                };
                self.ctx.record(
                    EventKind::Exception,
                    EventPayload::Raised {
                        kind: exception.kind.to_string(),
                        message: exception.message.clone(),
                    },
                );
                return Err(Signal::Raise(exception));
            }
            StmtKind::If { test, body, orelse } => {
                let test_value = self.eval(test, env)?;
                let mut taken = self.truthy_value(&test_value, env)?;
                if let Some(EventPayload::Branch { taken: recorded }) = self
                    .ctx
                    .record(EventKind::Branch, EventPayload::Branch { taken })
                {
                    taken = recorded;
                }
                if taken {
                    self.exec_block(body, env)?;
                } else {
                    self.exec_block(orelse, env)?;
                }
            }
            StmtKind::While { test, body, orelse } => {
                let mut index = 0u64;
                loop {
                    self.ctx.check_deadline().map_err(Signal::from)?;
                    let test_value = self.eval(test, env)?;
                    if !self.truthy_value(&test_value, env)? {
                        self.exec_block(orelse, env)?;
                        break;
                    }
                    self.ctx
                        .record(EventKind::LoopIter, EventPayload::LoopIter { index });
                    index += 1;
                    match self.exec_block(body, env) {
                        Ok(()) => {}
                        Err(Signal::Break) => break,
                        Err(Signal::Continue) => {}
                        Err(other) => return Err(other),
                    }
                }
            }
            StmtKind::For {
                target,
                iter: iterable,
                body,
                orelse,
            } => {
                let iterable = self.eval(iterable, env)?;
                let mut cursor = self.cursor(&iterable, env)?;
                let mut index = 0u64;
                loop {
                    self.ctx.check_deadline().map_err(Signal::from)?;
                    let Some(item) = self.cursor_next(&mut cursor, env)? else {
                        self.exec_block(orelse, env)?;
                        break;
                    };
                    self.ctx
                        .record(EventKind::LoopIter, EventPayload::LoopIter { index });
                    index += 1;
                    self.assign_target(target, item, env)?;
                    match self.exec_block(body, env) {
                        Ok(()) => {}
                        Err(Signal::Break) => break,
                        Err(Signal::Continue) => {}
                        Err(other) => return Err(other),
                    }
                }
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finally,
            } => {
                let result = match self.exec_block(body, env) {
                    Ok(()) => self.exec_block(orelse, env),
                    Err(Signal::Raise(exc)) => self.run_handlers(exc, handlers, env),
                    Err(other) => Err(other),
                };
                // finally runs on every exit path; its own signal wins
                self.exec_block(finally, env)?;
                result?;
            }
            StmtKind::With { context, target, body } => {
                let manager = self.eval(context, env)?;
                let entered = self.enter_context(&manager, env)?;
                if let Some(target) = target {
                    self.assign_target(target, entered, env)?;
                }
                let result = self.exec_block(body, env);
                match result {
                    Err(Signal::Raise(exc)) => {
                        let suppress = self.exit_context(&manager, Some(&exc), env)?;
                        if !suppress {
                            return Err(Signal::Raise(exc));
                        }
                    }
                    other => {
                        self.exit_context(&manager, None, env)?;
                        other?;
                    }
                }
            }
            StmtKind::FunctionDef(def) => {
                let function = self.make_function(def, env)?;
                let function = self.apply_decorators(&def.decorators, function, env)?;
                env.put(&def.name, function);
            }
            StmtKind::ClassDef {
                name,
                bases,
                body,
                decorators,
            } => {
                let class = self.make_class(name, bases, body, env)?;
                let class = self.apply_decorators(decorators, class, env)?;
                env.put(name, class);
            }
            StmtKind::Import { module, binding } => {
                let resolved = crate::import::resolve_module(self, module, env)?;
                let root = module.split('.').next().unwrap_or(module.as_str());
                let bound = if module.contains('.') && binding.as_str() == root {
                    // `import a.b` binds the root package
                    crate::import::resolve_module(self, binding, env)?
                } else {
                    resolved
                };
                env.put(binding, bound);
            }
            StmtKind::FromImport { module, names } => {
                let module_value = crate::import::resolve_module(self, module, env)?;
                for (export, binding) in names {
                    let value = crate::import::module_attr(&module_value, export).ok_or_else(|| {
                        Signal::from(Exception::import_error(format!(
                            "cannot import name '{export}' from '{module}'"
                        )))
                    })?;
                    env.put(binding, value);
                }
            }
            StmtKind::Global(names) => env.declare_global(names),
            StmtKind::Nonlocal(names) => env.declare_nonlocal(names).map_err(Signal::from)?,
            StmtKind::Del(targets) => {
                for target in targets {
                    self.delete_target(target, env)?;
                }
            }
            StmtKind::Assert { test, msg } => {
                let test_value = self.eval(test, env)?;
                if !self.truthy_value(&test_value, env)? {
                    let message = match msg {
                        Some(m) => {
                            let v = self.eval(m, env)?;
                            self.str_value(&v, env)?
                        }
                        None => String::new(),
                    };
                    return Err(Signal::from(Exception::new(ExcType::AssertionError, message)));
                }
            }
            StmtKind::Match { subject, cases } => {
                let subject = self.eval(subject, env)?;
                for case in cases {
                    if !self.match_pattern(&case.pattern, &subject, env)? {
                        continue;
                    }
                    if let Some(guard) = &case.guard {
                        let guard_value = self.eval(guard, env)?;
                        if !self.truthy_value(&guard_value, env)? {
                            continue;
                        }
                    }
                    self.exec_block(&case.body, env)?;
                    break;
                }
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Err(Signal::Break),
            StmtKind::Continue => return Err(Signal::Continue),
        }
        Ok(None)
    }

    fn run_handlers(&mut self, exc: Exception, handlers: &[ExceptHandler], env: &mut Env) -> Flow<()> {
        for handler in handlers {
            let matches = match &handler.exc_type {
                None => true,
                Some(type_expr) => {
                    let handler_type = self.eval(type_expr, env)?;
                    exception_matches(&exc, &handler_type)?
                }
            };
            if !matches {
                continue;
            }
            if let Some(name) = &handler.name {
                env.put(name, self.exception_value(&exc));
            }
            self.handling.push(exc);
            let result = self.exec_block(&handler.body, env);
            self.handling.pop();
            if let Some(name) = &handler.name {
                // the handler target is unbound when the block exits
                let _ = env.delete(name);
            }
            return result;
        }
        Err(Signal::Raise(exc))
    }

    /// The instance bound by `except ... as e`.
    fn exception_value(&self, exc: &Exception) -> Value {
        match &exc.value {
            Some(v) => v.clone(),
            None => Value::Exc(Rc::new(ExcValue {
                kind: exc.kind,
                args: if exc.message.is_empty() {
                    vec![]
                } else {
                    vec![Value::str(exc.message.clone())]
                },
            })),
        }
    }

    /// Converts the operand of `raise` into an exception signal.
    fn exception_from_value(&mut self, value: Value, env: &mut Env) -> Flow<Exception> {
        match value {
            Value::Exc(exc) => Ok(Exception::with_value(
                exc.kind,
                exc.message(),
                Value::Exc(exc.clone()),
            )),
            Value::Builtin(Builtin::Exc(kind)) => Ok(Exception::new(kind, "")),
            Value::Class(ref class) => match class_exc_base(class) {
                Some(_) => {
                    let instance = self.call_value(&value, vec![], vec![], env)?;
                    self.exception_from_value(instance, env)
                }
                None => Err(Signal::from(Exception::type_error(
                    "exceptions must derive from BaseException",
                ))),
            },
            Value::Instance(ref inst) => {
                let class = inst.borrow().class.clone();
                match class_exc_base(&class) {
                    Some(kind) => {
                        let message = self.str_value(&value, env)?;
                        Ok(Exception::with_value(kind, message, value))
                    }
                    None => Err(Signal::from(Exception::type_error(
                        "exceptions must derive from BaseException",
                    ))),
                }
            }
            other => Err(Signal::from(Exception::type_error(format!(
                "exceptions must derive from BaseException, not '{}'",
                crate::value::type_name(&other)
            )))),
        }
    }

    // --- assignment targets -------------------------------------------------

    pub(crate) fn assign_target(&mut self, target: &Target, value: Value, env: &mut Env) -> Flow<()> {
        match target {
            Target::Name(name) => {
                self.ctx.record(
                    EventKind::Assign,
                    EventPayload::Assign {
                        name: name.clone(),
                        repr: clip(py_repr(&value)),
                    },
                );
                env.put(name, value);
                Ok(())
            }
            Target::Attr { object, attr } => {
                let object = self.eval(object, env)?;
                self.set_attr(&object, attr, value)
            }
            Target::Subscript { object, index } => {
                let object = self.eval(object, env)?;
                match self.eval_index(index, env)? {
                    expr::IndexValue::Value(index) => self.set_subscript(&object, index, value, env),
                    expr::IndexValue::Slice { lower, upper, step } => {
                        self.set_slice(&object, &lower, &upper, &step, value, env)
                    }
                }
            }
            Target::Tuple(targets) => self.destructure(targets, value, env),
            Target::Starred(_) => Err(Signal::from(Exception::syntax_error(
                "starred assignment target must be in a list or tuple",
            ))),
        }
    }

    fn destructure(&mut self, targets: &[Target], value: Value, env: &mut Env) -> Flow<()> {
        let Some(items) = self.iter_values_for_unpack(&value, env)? else {
            return Err(Signal::from(Exception::type_error(format!(
                "cannot unpack non-iterable {} object",
                crate::value::type_name(&value)
            ))));
        };
        let star_pos = targets.iter().position(|t| matches!(t, Target::Starred(_)));
        match star_pos {
            None => {
                if items.len() != targets.len() {
                    return Err(Signal::from(unpack_arity_error(items.len(), targets.len())));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign_target(target, item, env)?;
                }
            }
            Some(star) => {
                let min_len = targets.len() - 1;
                if items.len() < min_len {
                    return Err(Signal::from(Exception::value_error(format!(
                        "not enough values to unpack (expected at least {min_len}, got {})",
                        items.len()
                    ))));
                }
                let tail_count = targets.len() - star - 1;
                let mut items = items;
                let tail: Vec<Value> = items.split_off(items.len() - tail_count);
                let middle: Vec<Value> = items.split_off(star);
                for (target, item) in targets[..star].iter().zip(items) {
                    self.assign_target(target, item, env)?;
                }
                let Target::Starred(inner) = &targets[star] else {
                    unreachable!("position found a starred target");
                };
                self.assign_target(inner, Value::list(middle), env)?;
                for (target, item) in targets[star + 1..].iter().zip(tail) {
                    self.assign_target(target, item, env)?;
                }
            }
        }
        Ok(())
    }

    /// Reads the current value of an augmented-assignment target.
    fn read_target(&mut self, target: &Target, env: &mut Env) -> Flow<Value> {
        match target {
            Target::Name(name) => env.get(name).ok_or_else(|| {
                Signal::from(Exception::name_error(format!("name '{name}' is not defined")))
            }),
            Target::Attr { object, attr } => {
                let object = self.eval(object, env)?;
                self.get_attr(&object, attr, env)
            }
            Target::Subscript { object, index } => {
                let object = self.eval(object, env)?;
                let index = self.eval_index(index, env)?;
                self.subscript_get(&object, index, env)
            }
            _ => Err(Signal::from(Exception::syntax_error(
                "illegal expression for augmented assignment",
            ))),
        }
    }

    /// Writes an augmented-assignment result through the scope that bound
    /// the name (`put_at_source`), or the attribute/subscript site.
    fn rebind_target(&mut self, target: &Target, value: Value, env: &mut Env) -> Flow<()> {
        match target {
            Target::Name(name) => {
                self.ctx.record(
                    EventKind::Assign,
                    EventPayload::Assign {
                        name: name.clone(),
                        repr: clip(py_repr(&value)),
                    },
                );
                env.put_at_source(name, value);
                Ok(())
            }
            other => self.assign_target(other, value, env),
        }
    }

    fn delete_target(&mut self, target: &Target, env: &mut Env) -> Flow<()> {
        match target {
            Target::Name(name) => env.delete(name).map_err(Signal::from),
            Target::Subscript { object, index } => {
                let object = self.eval(object, env)?;
                match self.eval_index(index, env)? {
                    expr::IndexValue::Value(index) => self.del_subscript(&object, &index, env),
                    // `del l[a:b]` is an empty-slice assignment
                    expr::IndexValue::Slice { lower, upper, step } => {
                        self.set_slice(&object, &lower, &upper, &step, Value::list(vec![]), env)
                    }
                }
            }
            Target::Attr { object, attr } => {
                let object = self.eval(object, env)?;
                self.del_attr(&object, attr)
            }
            Target::Tuple(targets) => {
                for target in targets {
                    self.delete_target(target, env)?;
                }
                Ok(())
            }
            Target::Starred(_) => Err(Signal::from(Exception::syntax_error("cannot delete starred"))),
        }
    }

    // --- functions ----------------------------------------------------------

    /// Builds a function value: captures the scope chain and evaluates
    /// parameter defaults once, at definition time.
    pub(crate) fn make_function(&mut self, def: &Rc<FuncDef>, env: &mut Env) -> Flow<Value> {
        let mut pos_defaults = Vec::new();
        for param in def.params.posonly.iter().chain(&def.params.args) {
            pos_defaults.push(self.eval_default(param, env)?);
        }
        let mut kw_defaults = Vec::new();
        for param in &def.params.kwonly {
            kw_defaults.push(self.eval_default(param, env)?);
        }
        Ok(Value::Function(Rc::new(PyFunc {
            def_: def.clone(),
            closure: env.capture(),
            pos_defaults,
            kw_defaults,
        })))
    }

    fn eval_default(&mut self, param: &Param, env: &mut Env) -> Flow<Option<Value>> {
        match &param.default {
            Some(expr) => Ok(Some(self.eval(expr, env)?)),
            None => Ok(None),
        }
    }

    fn apply_decorators(&mut self, decorators: &[ExprNode], mut value: Value, env: &mut Env) -> Flow<Value> {
        for decorator in decorators.iter().rev() {
            let decorator = self.eval(decorator, env)?;
            value = self.call_value(&decorator, vec![value], vec![], env)?;
        }
        Ok(value)
    }

    // --- context managers ---------------------------------------------------

    fn enter_context(&mut self, manager: &Value, env: &mut Env) -> Flow<Value> {
        match manager {
            Value::File(_) => Ok(manager.clone()),
            Value::Instance(_) => self.call_dunder(manager, "__enter__", vec![], env),
            other => Err(Signal::from(Exception::type_error(format!(
                "'{}' object does not support the context manager protocol",
                crate::value::type_name(other)
            )))),
        }
    }

    /// Calls `__exit__`; a truthy return suppresses the active exception.
    fn exit_context(&mut self, manager: &Value, exc: Option<&Exception>, env: &mut Env) -> Flow<bool> {
        match manager {
            Value::File(id) => {
                self.ctx.file_close(*id).map_err(Signal::from)?;
                Ok(false)
            }
            Value::Instance(_) => {
                let args = match exc {
                    Some(exc) => vec![
                        Value::Builtin(Builtin::Exc(exc.kind)),
                        self.exception_value(exc),
                        Value::None,
                    ],
                    None => vec![Value::None, Value::None, Value::None],
                };
                let result = self.call_dunder(manager, "__exit__", args, env)?;
                self.truthy_value(&result, env)
            }
            _ => Ok(false),
        }
    }

    // --- frames (super support) --------------------------------------------

    pub(crate) fn push_frame(&mut self, class: Option<Rc<ClassObj>>, receiver: Option<Value>) {
        self.frames.push(Frame { class, receiver });
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// The `super()` anchor of the innermost method frame.
    pub(crate) fn current_super_anchor(&self) -> Option<(Rc<ClassObj>, Value)> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| match (&f.class, &f.receiver) {
                (Some(class), Some(receiver)) => Some((class.clone(), receiver.clone())),
                _ => None,
            })
    }

    // --- generator sinks ----------------------------------------------------

    pub(crate) fn push_sink(&mut self) {
        self.sinks.push(Vec::new());
    }

    pub(crate) fn pop_sink(&mut self) -> Vec<Value> {
        self.sinks.pop().unwrap_or_default()
    }

    pub(crate) fn yield_value(&mut self, value: Value) -> Flow<()> {
        match self.sinks.last_mut() {
            Some(sink) => {
                sink.push(value);
                if sink.len() >= GENERATOR_MATERIALIZATION_LIMIT {
                    // stop the producing body as if it returned
                    return Err(Signal::Return(Value::None));
                }
                Ok(())
            }
            None => Err(Signal::from(Exception::syntax_error("'yield' outside function"))),
        }
    }

    // --- shared helpers -----------------------------------------------------

    /// Truthiness with `__bool__`/`__len__` dispatch for instances.
    pub(crate) fn truthy_value(&mut self, v: &Value, env: &mut Env) -> Flow<bool> {
        if let Value::Instance(inst) = v {
            let class = inst.borrow().class.clone();
            if crate::value::class_lookup(&class, "__bool__").is_some() {
                let result = self.call_dunder(v, "__bool__", vec![], env)?;
                return match result {
                    Value::Bool(b) => Ok(b),
                    other => Err(Signal::from(Exception::type_error(format!(
                        "__bool__ should return bool, returned {}",
                        crate::value::type_name(&other)
                    )))),
                };
            }
            if crate::value::class_lookup(&class, "__len__").is_some() {
                let result = self.call_dunder(v, "__len__", vec![], env)?;
                return Ok(!matches!(result, Value::Int(0)));
            }
        }
        Ok(crate::value::truthy(v))
    }

    /// `str()` with `__str__`/`__repr__` dispatch. Exception-class instances
    /// without either dunder render their constructor args, like CPython.
    pub(crate) fn str_value(&mut self, v: &Value, env: &mut Env) -> Flow<String> {
        if let Value::Instance(inst) = v {
            let class = inst.borrow().class.clone();
            for dunder in ["__str__", "__repr__"] {
                if crate::value::class_lookup(&class, dunder).is_some() {
                    let result = self.call_dunder(v, dunder, vec![], env)?;
                    return Ok(py_str(&result));
                }
            }
            if class_exc_base(&class).is_some() {
                if let Some(Value::Tuple(args)) = inst.borrow().attrs.get("args") {
                    return Ok(match args.len() {
                        0 => String::new(),
                        1 => py_str(&args[0]),
                        _ => {
                            let parts: Vec<String> = args.iter().map(py_repr).collect();
                            format!("({})", parts.join(", "))
                        }
                    });
                }
            }
        }
        Ok(py_str(v))
    }

    /// `repr()` with `__repr__` dispatch.
    pub(crate) fn repr_value(&mut self, v: &Value, env: &mut Env) -> Flow<String> {
        if let Value::Instance(inst) = v {
            let class = inst.borrow().class.clone();
            if crate::value::class_lookup(&class, "__repr__").is_some() {
                let result = self.call_dunder(v, "__repr__", vec![], env)?;
                return Ok(py_str(&result));
            }
        }
        Ok(py_repr(v))
    }
}

/// Does `exc` match an `except` handler's type expression value?
fn exception_matches(exc: &Exception, handler_type: &Value) -> Flow<bool> {
    match handler_type {
        Value::Tuple(options) => {
            for option in options.iter() {
                if exception_matches(exc, option)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Builtin(b) => match b.as_exc_type() {
            Some(kind) => Ok(exc.kind.is_subclass_of(kind)),
            None => Err(Signal::from(Exception::type_error(
                "catching classes that do not inherit from BaseException is not allowed",
            ))),
        },
        Value::Class(_) => match &exc.value {
            Some(value) => isinstance(value, handler_type).map_err(Signal::from),
            // a builtin-kind exception never matches a user class handler
            None => Ok(false),
        },
        _ => Err(Signal::from(Exception::type_error(
            "catching classes that do not inherit from BaseException is not allowed",
        ))),
    }
}

fn unpack_arity_error(got: usize, expected: usize) -> Exception {
    if got > expected {
        Exception::value_error(format!("too many values to unpack (expected {expected})"))
    } else {
        Exception::value_error(format!(
            "not enough values to unpack (expected {expected}, got {got})"
        ))
    }
}
