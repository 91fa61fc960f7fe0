//! The runtime value model.
//!
//! `Value` is the single tagged union every evaluation produces and consumes.
//! Scalars are stored inline; containers use `Rc<RefCell<..>>` so that
//! binding a container to a second name creates an alias and mutations are
//! visible through every alias, matching Python.

use std::{
    borrow::Cow,
    cell::RefCell,
    cmp::Ordering,
    collections::VecDeque,
    fmt,
    rc::Rc,
};

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::{
    ast::FuncDef,
    builtins::{Builtin, Outcome},
    context::Ctx,
    env::Scope,
    exception::{ExcType, Exception},
    methods::Method,
    types::{Dict, DictFlavor, Set},
};

/// Maximum data-structure nesting rendered by `py_repr` before truncating.
/// Prevents host stack overflow on deeply nested (non-circular) values.
const MAX_REPR_DEPTH: usize = 50;

/// Primary value type representing Python objects at runtime.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// Integers outside the i64 range. Normalized: a `BigInt` value never
    /// fits in i64 (arithmetic demotes results that fit).
    BigInt(Rc<BigInt>),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Dict(Rc<RefCell<Dict>>),
    Set(Rc<RefCell<Set>>),
    FrozenSet(Rc<Set>),
    Deque(Rc<RefCell<VecDeque<Value>>>),
    /// Lazily-iterated `range(start, stop, step)`.
    Range {
        start: i64,
        stop: i64,
        step: i64,
    },
    /// A user-defined function or lambda with its captured environment.
    Function(Rc<PyFunc>),
    /// A free builtin (`len`, `range`, ...), a type constructor, or an
    /// exception constructor.
    Builtin(Builtin),
    /// A method bound to a builtin value, e.g. `"x".upper`.
    Method {
        recv: Box<Value>,
        method: Method,
    },
    /// A user function bound to an instance, remembering the class that
    /// defined it so `super()` can resume the MRO walk past it.
    BoundMethod {
        recv: Box<Value>,
        func: Rc<PyFunc>,
        def_class: Option<Rc<ClassObj>>,
    },
    /// A host- or module-supplied callback, optionally capability-gated.
    Native(Rc<NativeFn>),
    Class(Rc<ClassObj>),
    Instance(Rc<RefCell<Instance>>),
    /// Proxy produced by `super()`: attribute lookup skips `class` in the
    /// MRO walk and binds hits to `instance`.
    Super {
        class: Rc<ClassObj>,
        instance: Rc<RefCell<Instance>>,
    },
    /// A materialized generator: the produced values, plus the error the
    /// production run ended with, if any.
    Generator(Rc<GeneratorState>),
    /// Opaque handle into the context's iterator table.
    Iterator(u32),
    /// Opaque handle into the context's file table.
    File(u32),
    Module(Rc<ModuleValue>),
    /// A builtin exception instance (`ValueError('boom')`).
    Exc(Rc<ExcValue>),
}

/// A user-defined function: shared definition, captured scope chain, and
/// defaults evaluated at definition time.
pub struct PyFunc {
    pub def_: Rc<FuncDef>,
    pub closure: Vec<Rc<RefCell<Scope>>>,
    /// Aligned with `posonly ++ args`.
    pub pos_defaults: Vec<Option<Value>>,
    /// Aligned with `kwonly`.
    pub kw_defaults: Vec<Option<Value>>,
}

impl fmt::Debug for PyFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PyFunc").field("name", &self.def_.name).finish_non_exhaustive()
    }
}

/// Host/module callback signature. Callbacks never receive the evaluator;
/// anything that must re-enter it is returned as a post-dispatch request.
pub(crate) type NativeImpl =
    Box<dyn Fn(Vec<Value>, Vec<(String, Value)>, &mut Ctx) -> Result<Outcome, Exception>>;

/// A native callback value with an optional capability gate.
///
/// When `capability` is set and absent from the context's capability set,
/// the evaluator fails the call with `PermissionError` without invoking `f`.
pub struct NativeFn {
    pub(crate) name: String,
    pub(crate) capability: Option<String>,
    pub(crate) f: NativeImpl,
}

impl NativeFn {
    pub(crate) fn new(
        name: impl Into<String>,
        f: impl Fn(Vec<Value>, Vec<(String, Value)>, &mut Ctx) -> Result<Outcome, Exception> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            capability: None,
            f: Box::new(f),
        })
    }

    pub(crate) fn gated(
        name: impl Into<String>,
        capability: impl Into<String>,
        f: impl Fn(Vec<Value>, Vec<(String, Value)>, &mut Ctx) -> Result<Outcome, Exception> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            capability: Some(capability.into()),
            f: Box::new(f),
        })
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// A class object: name, base classes (left-to-right), attribute map.
#[derive(Debug)]
pub struct ClassObj {
    pub(crate) name: String,
    pub(crate) bases: Vec<Value>,
    pub(crate) attrs: RefCell<IndexMap<String, Value>>,
}

/// An instance: class reference plus its own attribute map.
#[derive(Debug)]
pub struct Instance {
    pub(crate) class: Rc<ClassObj>,
    pub(crate) attrs: IndexMap<String, Value>,
}

/// A module value: a name → value mapping, possibly nested for dotted
/// sub-modules.
#[derive(Debug)]
pub struct ModuleValue {
    pub(crate) name: String,
    pub(crate) attrs: RefCell<IndexMap<String, Value>>,
}

impl ModuleValue {
    pub(crate) fn new(name: impl Into<String>, attrs: IndexMap<String, Value>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            attrs: RefCell::new(attrs),
        })
    }
}

/// The produced values of a materialized generator run.
#[derive(Debug)]
pub struct GeneratorState {
    pub(crate) items: Vec<Value>,
    /// Error raised while producing, surfaced when iteration reaches it.
    pub(crate) error: Option<Exception>,
}

/// A builtin exception instance with its constructor arguments.
#[derive(Debug)]
pub struct ExcValue {
    pub(crate) kind: ExcType,
    pub(crate) args: Vec<Value>,
}

impl ExcValue {
    /// The message `str(exc)` shows: single argument rendered bare, multiple
    /// arguments rendered as the args tuple.
    pub(crate) fn message(&self) -> String {
        match self.args.len() {
            0 => String::new(),
            1 => py_str(&self.args[0]),
            _ => {
                let tuple: Vec<String> = self.args.iter().map(py_repr).collect();
                format!("({})", tuple.join(", "))
            }
        }
    }
}

impl Value {
    /// A callable the host injects into a module. The callback runs with the
    /// compute clock paused (it is external work); errors become guest
    /// `RuntimeError`s.
    pub fn host_fn(
        name: impl Into<String>,
        f: impl Fn(Vec<Self>) -> Result<Self, String> + 'static,
    ) -> Self {
        let name = name.into();
        let error_name = name.clone();
        Self::Native(NativeFn::new(name, move |args, _kwargs, ctx| {
            ctx.pause_compute();
            let result = f(args);
            ctx.resume_compute();
            result.map(Outcome::Value).map_err(|message| {
                Exception::runtime_error(format!("{error_name}: {message}"))
            })
        }))
    }

    /// Like [`Value::host_fn`] but gated on a capability tag: when the tag is
    /// absent from the context, the call fails with `PermissionError` and the
    /// callback is never invoked.
    pub fn gated_host_fn(
        name: impl Into<String>,
        capability: impl Into<String>,
        f: impl Fn(Vec<Self>) -> Result<Self, String> + 'static,
    ) -> Self {
        let name = name.into();
        let error_name = name.clone();
        Self::Native(NativeFn::gated(name, capability, move |args, _kwargs, ctx| {
            ctx.pause_compute();
            let result = f(args);
            ctx.resume_compute();
            result.map(Outcome::Value).map_err(|message| {
                Exception::runtime_error(format!("{error_name}: {message}"))
            })
        }))
    }

    /// Builds a module value from `(name, value)` pairs — the plain-mapping
    /// side of the module protocol.
    #[must_use]
    pub fn module(name: impl Into<String>, entries: Vec<(String, Self)>) -> Self {
        Self::Module(ModuleValue::new(name, entries.into_iter().collect()))
    }

    /// A string value.
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    /// A list value.
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// A tuple value.
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(Rc::from(items))
    }

    pub(crate) fn dict(d: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(d)))
    }

    pub(crate) fn set(s: Set) -> Self {
        Self::Set(Rc::new(RefCell::new(s)))
    }

    /// Normalizes a big integer back to `Int` when it fits.
    pub(crate) fn from_bigint(b: BigInt) -> Self {
        match b.to_i64() {
            Some(i) => Self::Int(i),
            None => Self::BigInt(Rc::new(b)),
        }
    }

    /// True when the value can appear to the left of a call.
    pub(crate) fn is_callable(&self) -> bool {
        matches!(
            self,
            Self::Function(_)
                | Self::Builtin(_)
                | Self::Method { .. }
                | Self::BoundMethod { .. }
                | Self::Native(_)
                | Self::Class(_)
        ) || matches!(self, Self::Instance(inst) if class_lookup(&inst.borrow().class, "__call__").is_some())
    }
}

/// The Python type name of a value, as `type()` and error messages show it.
pub fn type_name(v: &Value) -> Cow<'static, str> {
    match v {
        Value::None => "NoneType".into(),
        Value::Bool(_) => "bool".into(),
        Value::Int(_) | Value::BigInt(_) => "int".into(),
        Value::Float(_) => "float".into(),
        Value::Str(_) => "str".into(),
        Value::List(_) => "list".into(),
        Value::Tuple(_) => "tuple".into(),
        Value::Dict(d) => match d.borrow().flavor() {
            DictFlavor::Plain => "dict".into(),
            DictFlavor::DefaultDict => "defaultdict".into(),
            DictFlavor::Counter => "Counter".into(),
            DictFlavor::OrderedDict => "OrderedDict".into(),
        },
        Value::Set(_) => "set".into(),
        Value::FrozenSet(_) => "frozenset".into(),
        Value::Deque(_) => "deque".into(),
        Value::Range { .. } => "range".into(),
        Value::Function(_) | Value::BoundMethod { .. } => "function".into(),
        Value::Builtin(_) | Value::Native(_) => "builtin_function_or_method".into(),
        Value::Method { .. } => "builtin_function_or_method".into(),
        Value::Class(_) => "type".into(),
        Value::Instance(inst) => inst.borrow().class.name.clone().into(),
        Value::Super { .. } => "super".into(),
        Value::Generator(_) => "generator".into(),
        Value::Iterator(_) => "iterator".into(),
        Value::File(_) => "file".into(),
        Value::Module(_) => "module".into(),
        Value::Exc(exc) => exc.kind.to_string().into(),
    }
}

/// Python truthiness for every value that does not need evaluator dispatch.
///
/// Instances default to `True` here; the evaluator checks `__bool__` and
/// `__len__` before falling back to this.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::None => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::BigInt(b) => !b.is_zero(),
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::List(l) => !l.borrow().is_empty(),
        Value::Tuple(t) => !t.is_empty(),
        Value::Dict(d) => !d.borrow().is_empty(),
        Value::Set(s) => !s.borrow().is_empty(),
        Value::FrozenSet(s) => !s.is_empty(),
        Value::Deque(d) => !d.borrow().is_empty(),
        Value::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
        _ => true,
    }
}

/// Number of elements a range yields.
pub(crate) fn range_len(start: i64, stop: i64, step: i64) -> i64 {
    if step > 0 {
        if stop > start { (stop - start + step - 1) / step } else { 0 }
    } else if step < 0 {
        if start > stop { (start - stop - step - 1) / -step } else { 0 }
    } else {
        0
    }
}

/// `str(v)`.
pub fn py_str(v: &Value) -> String {
    match v {
        Value::Str(s) => s.to_string(),
        Value::Exc(exc) => exc.message(),
        _ => repr_depth(v, 0),
    }
}

/// `repr(v)`.
pub fn py_repr(v: &Value) -> String {
    repr_depth(v, 0)
}

fn repr_depth(v: &Value, depth: usize) -> String {
    if depth > MAX_REPR_DEPTH {
        return "...".to_string();
    }
    match v {
        Value::None => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::BigInt(b) => b.to_string(),
        Value::Float(f) => float_repr(*f),
        Value::Str(s) => str_repr(s),
        Value::List(items) => {
            let inner: Vec<String> = items.borrow().iter().map(|x| repr_depth(x, depth + 1)).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Tuple(items) => {
            let inner: Vec<String> = items.iter().map(|x| repr_depth(x, depth + 1)).collect();
            if inner.len() == 1 {
                format!("({},)", inner[0])
            } else {
                format!("({})", inner.join(", "))
            }
        }
        Value::Dict(d) => dict_repr(&d.borrow(), depth),
        Value::Set(s) => set_repr(&s.borrow(), depth, false),
        Value::FrozenSet(s) => set_repr(s, depth, true),
        Value::Deque(d) => {
            let inner: Vec<String> = d.borrow().iter().map(|x| repr_depth(x, depth + 1)).collect();
            format!("deque([{}])", inner.join(", "))
        }
        Value::Range { start, stop, step } => {
            if *step == 1 {
                format!("range({start}, {stop})")
            } else {
                format!("range({start}, {stop}, {step})")
            }
        }
        Value::Function(f) => format!("<function {}>", f.def_.name),
        Value::Builtin(b) => b.repr(),
        Value::Method { recv, method } => {
            format!("<built-in method {} of {} object>", method.name(), type_name(recv))
        }
        Value::BoundMethod { recv, func, .. } => {
            format!("<bound method {} of {}>", func.def_.name, repr_depth(recv, depth + 1))
        }
        Value::Native(n) => format!("<built-in function {}>", n.name),
        Value::Class(c) => format!("<class '{}'>", c.name),
        Value::Instance(inst) => format!("<{} object>", inst.borrow().class.name),
        Value::Super { class, .. } => format!("<super: <class '{}'>>", class.name),
        Value::Generator(_) => "<generator object>".to_string(),
        Value::Iterator(_) => "<iterator object>".to_string(),
        Value::File(_) => "<file object>".to_string(),
        Value::Module(m) => format!("<module '{}'>", m.name),
        Value::Exc(exc) => {
            let args: Vec<String> = exc.args.iter().map(|a| repr_depth(a, depth + 1)).collect();
            format!("{}({})", exc.kind, args.join(", "))
        }
    }
}

fn dict_repr(d: &Dict, depth: usize) -> String {
    let inner: Vec<String> = d
        .iter()
        .map(|(k, v)| format!("{}: {}", repr_depth(k, depth + 1), repr_depth(v, depth + 1)))
        .collect();
    let body = format!("{{{}}}", inner.join(", "));
    match d.flavor() {
        DictFlavor::Plain => body,
        DictFlavor::Counter => format!("Counter({body})"),
        DictFlavor::OrderedDict => format!("OrderedDict({body})"),
        DictFlavor::DefaultDict => {
            let factory = d
                .default_factory
                .as_ref()
                .map_or_else(|| "None".to_string(), |f| repr_depth(f, depth + 1));
            format!("defaultdict({factory}, {body})")
        }
    }
}

fn set_repr(s: &Set, depth: usize, frozen: bool) -> String {
    if s.is_empty() {
        return if frozen { "frozenset()".to_string() } else { "set()".to_string() };
    }
    let inner: Vec<String> = s.values().map(|x| repr_depth(x, depth + 1)).collect();
    if frozen {
        format!("frozenset({{{}}})", inner.join(", "))
    } else {
        format!("{{{}}}", inner.join(", "))
    }
}

/// Python string repr: single-quoted, or double-quoted when the content
/// contains a single quote but no double quote.
pub(crate) fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python float formatting: shortest round-tripping digits (via ryu), with
/// CPython's positional/scientific switchover and exponent style.
pub(crate) fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let mut buf = ryu::Buffer::new();
    let shortest = buf.format(f);

    // Split into sign, digit string, and decimal exponent.
    let (sign, rest) = shortest.strip_prefix('-').map_or(("", shortest), |r| ("-", r));
    let (mantissa, exp) = match rest.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (rest, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut digits: String = int_part.chars().chain(frac_part.chars()).collect();
    // exponent of the first digit: value = 0.digits * 10^point_exp
    let mut point_exp = exp + int_part.len() as i32;
    // strip leading zeros (0.5 -> digits "05")
    while digits.len() > 1 && digits.starts_with('0') {
        digits.remove(0);
        point_exp -= 1;
    }
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }
    if digits == "0" {
        return format!("{sign}0.0");
    }

    // CPython: scientific when exponent < -3 or >= 17 (of the leading digit).
    if point_exp <= -4 || point_exp > 16 {
        let e = point_exp - 1;
        let mant = if digits.len() == 1 {
            digits.clone()
        } else {
            format!("{}.{}", &digits[..1], &digits[1..])
        };
        format!("{sign}{mant}e{}{:02}", if e < 0 { '-' } else { '+' }, e.abs())
    } else if point_exp <= 0 {
        let zeros = "0".repeat(point_exp.unsigned_abs() as usize);
        format!("{sign}0.{zeros}{digits}")
    } else if (point_exp as usize) >= digits.len() {
        let zeros = "0".repeat(point_exp as usize - digits.len());
        format!("{sign}{digits}{zeros}.0")
    } else {
        format!("{sign}{}.{}", &digits[..point_exp as usize], &digits[point_exp as usize..])
    }
}

/// Structural equality with Python semantics (no instance `__eq__` dispatch;
/// the evaluator layers that on top for instances).
pub fn py_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| py_eq(l, r))
        }
        (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| py_eq(l, r))
        }
        (Value::Deque(x), Value::Deque(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| py_eq(l, r))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().all(|(k, v)| match y.get(k) {
                    Ok(Some(other)) => py_eq(v, other),
                    _ => false,
                })
        }
        (Value::Set(x), Value::Set(y)) => x.borrow().set_eq(&y.borrow()),
        (Value::FrozenSet(x), Value::FrozenSet(y)) => x.set_eq(y),
        (Value::Set(x), Value::FrozenSet(y)) | (Value::FrozenSet(y), Value::Set(x)) => {
            x.borrow().set_eq(y)
        }
        (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
        (Value::Class(x), Value::Class(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => x == y,
        (Value::Module(x), Value::Module(y)) => Rc::ptr_eq(x, y),
        (Value::Exc(x), Value::Exc(y)) => Rc::ptr_eq(x, y),
        (
            Value::Range { start, stop, step },
            Value::Range {
                start: s2,
                stop: e2,
                step: st2,
            },
        ) => {
            let (la, lb) = (range_len(*start, *stop, *step), range_len(*s2, *e2, *st2));
            la == lb && (la == 0 || (start == s2 && step == st2))
        }
        _ => numeric_eq(a, b).unwrap_or(false),
    }
}

/// Cross-type numeric equality; `None` when either side is not a number.
fn numeric_eq(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::BigInt(x), Value::BigInt(y)) => Some(x == y),
        (Value::BigInt(x), Value::Float(y)) | (Value::Float(y), Value::BigInt(x)) => {
            Some(x.to_f64().is_some_and(|x| x == *y))
        }
        _ => {
            let x = small_numeric(a)?;
            let y = small_numeric(b)?;
            // BigInt never equals an i64-range value (normalized), so a
            // mixed BigInt/Int pair is always unequal and handled above.
            match (a, b) {
                (Value::BigInt(_), _) | (_, Value::BigInt(_)) => Some(false),
                _ => Some(x == y),
            }
        }
    }
}

fn small_numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Bool(b) => Some(f64::from(i8::from(*b))),
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::BigInt(b) => b.to_f64(),
        _ => None,
    }
}

/// Ordering comparison for `<`/`<=`/`>`/`>=`, `sorted`, `min`/`max`.
///
/// Numbers compare across types; strings, lists and tuples compare
/// lexicographically. Everything else is a `TypeError`.
pub(crate) fn py_cmp(a: &Value, b: &Value) -> Result<Ordering, Exception> {
    let incomparable = || {
        Exception::type_error(format!(
            "'<' not supported between instances of '{}' and '{}'",
            type_name(a),
            type_name(b)
        ))
    };
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            seq_cmp(&x, &y)
        }
        (Value::Tuple(x), Value::Tuple(y)) => seq_cmp(x, y),
        (Value::BigInt(x), Value::BigInt(y)) => Ok(x.cmp(y)),
        (Value::BigInt(x), _) => {
            let y = small_numeric(b).ok_or_else(incomparable)?;
            Ok(bigint_cmp_f64(x, y))
        }
        (_, Value::BigInt(y)) => {
            let x = small_numeric(a).ok_or_else(incomparable)?;
            Ok(bigint_cmp_f64(y, x).reverse())
        }
        _ => {
            let x = small_numeric(a).ok_or_else(incomparable)?;
            let y = small_numeric(b).ok_or_else(incomparable)?;
            x.partial_cmp(&y).ok_or_else(|| {
                Exception::value_error("comparison with nan is unordered")
            })
        }
    }
}

fn bigint_cmp_f64(x: &BigInt, y: f64) -> Ordering {
    // a normalized BigInt is outside i64 range, so its sign decides
    // against any finite f64 that fits in i64; otherwise fall back to f64.
    match x.to_f64() {
        Some(xf) => xf.partial_cmp(&y).unwrap_or(Ordering::Greater),
        None => {
            if x.is_negative() {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
    }
}

fn seq_cmp(x: &[Value], y: &[Value]) -> Result<Ordering, Exception> {
    for (l, r) in x.iter().zip(y.iter()) {
        if !py_eq(l, r) {
            return py_cmp(l, r);
        }
    }
    Ok(x.len().cmp(&y.len()))
}

/// Walks a class and its bases depth-first, left to right, returning the
/// first binding of `name`. This is the documented MRO rule (no C3).
pub(crate) fn class_lookup(class: &Rc<ClassObj>, name: &str) -> Option<Value> {
    if let Some(v) = class.attrs.borrow().get(name) {
        return Some(v.clone());
    }
    for base in &class.bases {
        if let Value::Class(base) = base {
            if let Some(v) = class_lookup(base, name) {
                return Some(v);
            }
        }
    }
    None
}

/// `class_lookup` that also reports which class in the DFS order supplied
/// the binding (needed to anchor `super()` inside the found method).
pub(crate) fn class_lookup_with_origin(class: &Rc<ClassObj>, name: &str) -> Option<(Value, Rc<ClassObj>)> {
    if let Some(v) = class.attrs.borrow().get(name) {
        return Some((v.clone(), class.clone()));
    }
    for base in &class.bases {
        if let Value::Class(base) = base {
            if let Some(found) = class_lookup_with_origin(base, name) {
                return Some(found);
            }
        }
    }
    None
}

/// Like `class_lookup` but skipping `skip` and everything before it in the
/// DFS order — the `super()` walk. Also reports the supplying class.
pub(crate) fn class_lookup_after(
    class: &Rc<ClassObj>,
    skip: &Rc<ClassObj>,
    name: &str,
) -> Option<(Value, Rc<ClassObj>)> {
    let mut order = Vec::new();
    mro_dfs(class, &mut order);
    let skip_pos = order.iter().position(|c| Rc::ptr_eq(c, skip))?;
    for c in &order[skip_pos + 1..] {
        if let Some(v) = c.attrs.borrow().get(name) {
            return Some((v.clone(), c.clone()));
        }
    }
    None
}

fn mro_dfs(class: &Rc<ClassObj>, out: &mut Vec<Rc<ClassObj>>) {
    if out.iter().any(|c| Rc::ptr_eq(c, class)) {
        return;
    }
    out.push(class.clone());
    for base in &class.bases {
        if let Value::Class(base) = base {
            mro_dfs(base, out);
        }
    }
}

/// True when `class` is `target` or inherits from it (DFS).
pub(crate) fn class_is_subclass(class: &Rc<ClassObj>, target: &Rc<ClassObj>) -> bool {
    if Rc::ptr_eq(class, target) {
        return true;
    }
    class.bases.iter().any(|base| match base {
        Value::Class(base) => class_is_subclass(base, target),
        _ => false,
    })
}

/// Exception kinds a user class inherits from, if any (DFS through builtin
/// exception bases).
pub(crate) fn class_exc_base(class: &Rc<ClassObj>) -> Option<ExcType> {
    for base in &class.bases {
        match base {
            Value::Builtin(b) => {
                if let Some(exc) = b.as_exc_type() {
                    return Some(exc);
                }
            }
            Value::Class(base) => {
                if let Some(exc) = class_exc_base(base) {
                    return Some(exc);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_repr_matches_python() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(-0.5), "-0.5");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1e15), "1000000000000000.0");
        assert_eq!(float_repr(1e-4), "0.0001");
        assert_eq!(float_repr(1e-5), "1e-05");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(f64::INFINITY), "inf");
        assert_eq!(float_repr(f64::NEG_INFINITY), "-inf");
        assert_eq!(float_repr(f64::NAN), "nan");
        assert_eq!(float_repr(0.0), "0.0");
    }

    #[test]
    fn str_repr_quoting() {
        assert_eq!(str_repr("abc"), "'abc'");
        assert_eq!(str_repr("it's"), "\"it's\"");
        assert_eq!(str_repr("both ' and \""), "'both \\' and \"'");
        assert_eq!(str_repr("line\n"), "'line\\n'");
    }

    #[test]
    fn tuple_repr_trailing_comma() {
        let v = Value::tuple(vec![Value::Int(1)]);
        assert_eq!(py_repr(&v), "(1,)");
        let v = Value::tuple(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(py_repr(&v), "(1, 2)");
    }

    #[test]
    fn truthiness() {
        assert!(!truthy(&Value::None));
        assert!(!truthy(&Value::Int(0)));
        assert!(!truthy(&Value::Float(0.0)));
        assert!(!truthy(&Value::str("")));
        assert!(!truthy(&Value::list(vec![])));
        assert!(!truthy(&Value::Range { start: 0, stop: 0, step: 1 }));
        assert!(truthy(&Value::Range { start: 0, stop: 3, step: 1 }));
        assert!(truthy(&Value::str("x")));
        assert!(truthy(&Value::Float(f64::NAN)));
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert!(py_eq(&Value::Int(1), &Value::Float(1.0)));
        assert!(py_eq(&Value::Bool(true), &Value::Int(1)));
        assert!(!py_eq(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
        assert!(!py_eq(&Value::Int(1), &Value::str("1")));
    }
}
