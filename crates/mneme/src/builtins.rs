//! Free builtins and the post-dispatch request protocol.
//!
//! Builtin callbacks never receive the evaluator. A callback either computes
//! its result directly (possibly using the context for handles and I/O) or
//! returns a [`Request`] asking the evaluator to perform the part that must
//! re-enter guest code — calling a key function, driving an instance's
//! `__next__`, dispatching a dunder. The evaluator recognizes and services
//! every request at the call boundary.

use std::rc::Rc;
use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::{
    context::Ctx,
    exception::{ExcType, Exception},
    value::{range_len, truthy, type_name, ExcValue, Value},
};

/// What a builtin callback produced: a finished value, or a request for the
/// evaluator.
#[derive(Debug)]
pub(crate) enum Outcome {
    Value(Value),
    Request(Request),
}

impl From<Value> for Outcome {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

/// The requests a callback may return. Each corresponds to an operation only
/// the evaluator can perform because it involves guest code or evaluator
/// state.
#[derive(Debug)]
pub(crate) enum Request {
    /// Look `name` up on the receiver's class and call it with `args`.
    DunderCall {
        recv: Value,
        name: &'static str,
        args: Vec<Value>,
    },
    /// Exhaust any iterable (including instance-driven) into a list.
    IterToList(Value),
    /// Exhaust an iterable and append its values to an existing list
    /// (`list.extend` with an instance-driven iterable).
    ExtendList { target: Value, iterable: Value },
    IterToTuple(Value),
    IterToSet(Value),
    IterToFrozenSet(Value),
    /// Exhaust an iterable of key/value pairs into a dict.
    IterToDict(Value),
    /// Sum an iterable starting from `start`.
    IterSum { iterable: Value, start: Value },
    /// `all()` / `any()` with evaluator-driven truthiness.
    IterAll(Value),
    IterAny(Value),
    /// Sort `items` (a list value) with an optional guest key function.
    /// `in_place` distinguishes `list.sort()` from `sorted()`.
    Sort {
        items: Value,
        key: Option<Value>,
        reverse: bool,
        in_place: bool,
    },
    MinMax {
        which: MinMaxKind,
        args: Vec<Value>,
        key: Option<Value>,
        default: Option<Value>,
    },
    Map { func: Value, iterables: Vec<Value> },
    Filter { func: Value, iterable: Value },
    Enumerate { iterable: Value, start: i64 },
    Zip(Vec<Value>),
    Reversed(Value),
    /// Produce an iterator handle for any iterable.
    MakeIter(Value),
    /// Advance an iterator, honoring `StopIteration`/default semantics.
    IterNext {
        iterator: Value,
        default: Option<Value>,
    },
    /// Format and emit output through the event log.
    Print {
        args: Vec<Value>,
        sep: String,
        end: String,
    },
    /// Evaluator-side `str()` / `repr()` / `format()` with dunder dispatch.
    Str(Value),
    Repr(Value),
    Format { value: Value, spec: String },
    /// Evaluator-side truthiness (`__bool__`/`__len__` on instances).
    Truthy(Value),
    /// Attribute protocol against arbitrary objects.
    GetAttr {
        obj: Value,
        name: String,
        default: Option<Value>,
    },
    SetAttr { obj: Value, name: String, value: Value },
    DelAttr { obj: Value, name: String },
    HasAttr { obj: Value, name: String },
    /// Build a super-proxy for the current frame.
    SuperCall { args: Vec<Value> },
    /// Propagate cooperative suspension to the host boundary.
    Suspend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MinMaxKind {
    Min,
    Max,
}

macro_rules! builtins {
    ($($name:literal => $variant:ident),* $(,)?) => {
        /// A free builtin, a builtin type constructor, or an exception
        /// constructor. Resolved by name after environment lookup misses.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Builtin {
            $($variant,)*
            /// An exception type used as a constructor or handler pattern.
            Exc(ExcType),
        }

        impl Builtin {
            /// The surface name, as `repr` and error messages show it.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                    Self::Exc(exc) => exc.into(),
                }
            }

            /// Resolves a name to a builtin, trying exception kinds last.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)*
                    _ => ExcType::from_str(name).ok().map(Self::Exc),
                }
            }
        }
    };
}

builtins! {
    "abs" => Abs,
    "all" => All,
    "any" => Any,
    "bin" => Bin,
    "bool" => Bool,
    "callable" => Callable,
    "chr" => Chr,
    "delattr" => DelAttr,
    "dict" => Dict,
    "divmod" => DivMod,
    "enumerate" => Enumerate,
    "filter" => Filter,
    "float" => Float,
    "format" => Format,
    "frozenset" => FrozenSet,
    "getattr" => GetAttr,
    "hasattr" => HasAttr,
    "hash" => Hash,
    "hex" => Hex,
    "int" => Int,
    "isinstance" => IsInstance,
    "issubclass" => IsSubclass,
    "iter" => Iter,
    "len" => Len,
    "list" => List,
    "map" => Map,
    "max" => Max,
    "min" => Min,
    "next" => Next,
    "object" => Object,
    "oct" => Oct,
    "open" => Open,
    "ord" => Ord,
    "pow" => Pow,
    "print" => Print,
    "range" => Range,
    "repr" => Repr,
    "reversed" => Reversed,
    "round" => Round,
    "set" => Set,
    "setattr" => SetAttr,
    "sorted" => Sorted,
    "str" => Str,
    "sum" => Sum,
    "super" => Super,
    "suspend" => Suspend,
    "tuple" => Tuple,
    "type" => Type,
    "zip" => Zip,
}

impl Builtin {
    /// True for the values `type()` returns: type constructors and
    /// exception classes.
    #[must_use]
    pub(crate) fn is_type(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Int
                | Self::Float
                | Self::Str
                | Self::List
                | Self::Tuple
                | Self::Dict
                | Self::Set
                | Self::FrozenSet
                | Self::Range
                | Self::Object
                | Self::Type
                | Self::Exc(_)
        )
    }

    pub(crate) fn as_exc_type(self) -> Option<ExcType> {
        match self {
            Self::Exc(exc) => Some(exc),
            _ => None,
        }
    }

    pub(crate) fn repr(self) -> String {
        if self.is_type() {
            format!("<class '{}'>", self.name())
        } else {
            format!("<built-in function {}>", self.name())
        }
    }
}

/// Positional/keyword arguments as the call site assembled them.
pub(crate) struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn positional(args: Vec<Value>) -> Self {
        Self { args, kwargs: Vec::new() }
    }

    fn arity(&self, name: &str, min: usize, max: usize) -> Result<(), Exception> {
        if !self.kwargs.is_empty() {
            return Err(Exception::type_error(format!(
                "{name}() takes no keyword arguments"
            )));
        }
        self.arity_pos(name, min, max)
    }

    fn arity_pos(&self, name: &str, min: usize, max: usize) -> Result<(), Exception> {
        let n = self.args.len();
        if n < min || n > max {
            let expected = if min == max {
                format!("exactly {min}")
            } else {
                format!("from {min} to {max}")
            };
            return Err(Exception::type_error(format!(
                "{name}() takes {expected} arguments ({n} given)"
            )));
        }
        Ok(())
    }

    fn kwarg(&self, name: &str) -> Option<Value> {
        self.kwargs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }
}

/// The builtin registry's single entry point.
pub(crate) fn call(builtin: Builtin, mut call_args: CallArgs, ctx: &mut Ctx) -> Result<Outcome, Exception> {
    match builtin {
        Builtin::Abs => {
            call_args.arity("abs", 1, 1)?;
            abs(&call_args.args[0]).map(Outcome::Value)
        }
        Builtin::All => {
            call_args.arity("all", 1, 1)?;
            Ok(Outcome::Request(Request::IterAll(call_args.args.remove(0))))
        }
        Builtin::Any => {
            call_args.arity("any", 1, 1)?;
            Ok(Outcome::Request(Request::IterAny(call_args.args.remove(0))))
        }
        Builtin::Bin => {
            call_args.arity("bin", 1, 1)?;
            int_to_base(&call_args.args[0], 2, "0b")
        }
        Builtin::Oct => {
            call_args.arity("oct", 1, 1)?;
            int_to_base(&call_args.args[0], 8, "0o")
        }
        Builtin::Hex => {
            call_args.arity("hex", 1, 1)?;
            int_to_base(&call_args.args[0], 16, "0x")
        }
        Builtin::Bool => {
            call_args.arity("bool", 0, 1)?;
            match call_args.args.pop() {
                None => Ok(Value::Bool(false).into()),
                Some(v @ Value::Instance(_)) => Ok(Outcome::Request(Request::Truthy(v))),
                Some(v) => Ok(Value::Bool(truthy(&v)).into()),
            }
        }
        Builtin::Callable => {
            call_args.arity("callable", 1, 1)?;
            Ok(Value::Bool(call_args.args[0].is_callable()).into())
        }
        Builtin::Chr => {
            call_args.arity("chr", 1, 1)?;
            let code = as_int(&call_args.args[0], "chr")?;
            let c = u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Exception::value_error("chr() arg not in range(0x110000)"))?;
            Ok(Value::str(c.to_string()).into())
        }
        Builtin::Ord => {
            call_args.arity("ord", 1, 1)?;
            match &call_args.args[0] {
                Value::Str(s) if s.chars().count() == 1 => {
                    Ok(Value::Int(i64::from(s.chars().next().unwrap_or('\0') as u32)).into())
                }
                Value::Str(s) => Err(Exception::type_error(format!(
                    "ord() expected a character, but string of length {} found",
                    s.chars().count()
                ))),
                other => Err(Exception::type_error(format!(
                    "ord() expected string of length 1, but {} found",
                    type_name(other)
                ))),
            }
        }
        Builtin::DelAttr => {
            call_args.arity("delattr", 2, 2)?;
            let name = as_str(&call_args.args[1], "attribute name")?;
            Ok(Outcome::Request(Request::DelAttr {
                obj: call_args.args.swap_remove(0),
                name,
            }))
        }
        Builtin::Dict => {
            if call_args.args.is_empty() {
                let mut d = crate::types::Dict::new();
                for (k, v) in call_args.kwargs {
                    d.insert(Value::str(k), v)?;
                }
                return Ok(Value::dict(d).into());
            }
            call_args.arity_pos("dict", 0, 1)?;
            let source = call_args.args.remove(0);
            if !call_args.kwargs.is_empty() {
                return Err(Exception::type_error(
                    "dict() with both a positional argument and keyword arguments is not supported",
                ));
            }
            Ok(Outcome::Request(Request::IterToDict(source)))
        }
        Builtin::DivMod => {
            call_args.arity("divmod", 2, 2)?;
            divmod(&call_args.args[0], &call_args.args[1])
        }
        Builtin::Enumerate => {
            call_args.arity_pos("enumerate", 1, 2)?;
            let start = match call_args.args.get(1).cloned().or_else(|| call_args.kwarg("start")) {
                Some(v) => as_int(&v, "enumerate")?,
                None => 0,
            };
            Ok(Outcome::Request(Request::Enumerate {
                iterable: call_args.args.remove(0),
                start,
            }))
        }
        Builtin::Filter => {
            call_args.arity("filter", 2, 2)?;
            let iterable = call_args.args.pop().unwrap_or(Value::None);
            let func = call_args.args.pop().unwrap_or(Value::None);
            Ok(Outcome::Request(Request::Filter { func, iterable }))
        }
        Builtin::Float => {
            call_args.arity("float", 0, 1)?;
            match call_args.args.pop() {
                None => Ok(Value::Float(0.0).into()),
                Some(v) => to_float(&v).map(|f| Value::Float(f).into()),
            }
        }
        Builtin::Format => {
            call_args.arity("format", 1, 2)?;
            let spec = match call_args.args.get(1) {
                Some(v) => as_str(v, "format spec")?,
                None => String::new(),
            };
            Ok(Outcome::Request(Request::Format {
                value: call_args.args.swap_remove(0),
                spec,
            }))
        }
        Builtin::FrozenSet => {
            call_args.arity("frozenset", 0, 1)?;
            match call_args.args.pop() {
                None => Ok(Value::FrozenSet(Rc::new(crate::types::Set::new())).into()),
                Some(v) => Ok(Outcome::Request(Request::IterToFrozenSet(v))),
            }
        }
        Builtin::GetAttr => {
            call_args.arity("getattr", 2, 3)?;
            let default = call_args.args.get(2).cloned();
            let name = as_str(&call_args.args[1], "attribute name")?;
            Ok(Outcome::Request(Request::GetAttr {
                obj: call_args.args.swap_remove(0),
                name,
                default,
            }))
        }
        Builtin::HasAttr => {
            call_args.arity("hasattr", 2, 2)?;
            let name = as_str(&call_args.args[1], "attribute name")?;
            Ok(Outcome::Request(Request::HasAttr {
                obj: call_args.args.swap_remove(0),
                name,
            }))
        }
        Builtin::Hash => {
            call_args.arity("hash", 1, 1)?;
            let key = crate::types::Key::new(call_args.args.remove(0))?;
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            std::hash::Hash::hash(&key, &mut hasher);
            Ok(Value::Int(std::hash::Hasher::finish(&hasher) as i64).into())
        }
        Builtin::Int => int_constructor(call_args),
        Builtin::IsInstance => {
            call_args.arity("isinstance", 2, 2)?;
            isinstance(&call_args.args[0], &call_args.args[1]).map(|b| Value::Bool(b).into())
        }
        Builtin::IsSubclass => {
            call_args.arity("issubclass", 2, 2)?;
            issubclass(&call_args.args[0], &call_args.args[1]).map(|b| Value::Bool(b).into())
        }
        Builtin::Iter => {
            call_args.arity("iter", 1, 1)?;
            Ok(Outcome::Request(Request::MakeIter(call_args.args.remove(0))))
        }
        Builtin::Len => {
            call_args.arity("len", 1, 1)?;
            match pure_len(&call_args.args[0]) {
                Some(n) => Ok(Value::Int(n).into()),
                None => match &call_args.args[0] {
                    Value::Instance(_) => Ok(Outcome::Request(Request::DunderCall {
                        recv: call_args.args.remove(0),
                        name: "__len__",
                        args: vec![],
                    })),
                    other => Err(Exception::type_error(format!(
                        "object of type '{}' has no len()",
                        type_name(other)
                    ))),
                },
            }
        }
        Builtin::List => {
            call_args.arity("list", 0, 1)?;
            match call_args.args.pop() {
                None => Ok(Value::list(vec![]).into()),
                Some(v) => Ok(Outcome::Request(Request::IterToList(v))),
            }
        }
        Builtin::Map => {
            call_args.arity_pos("map", 2, usize::MAX)?;
            let func = call_args.args.remove(0);
            Ok(Outcome::Request(Request::Map {
                func,
                iterables: call_args.args,
            }))
        }
        Builtin::Max | Builtin::Min => {
            let which = if builtin == Builtin::Max { MinMaxKind::Max } else { MinMaxKind::Min };
            let name = if which == MinMaxKind::Max { "max" } else { "min" };
            call_args.arity_pos(name, 1, usize::MAX)?;
            Ok(Outcome::Request(Request::MinMax {
                which,
                key: call_args.kwarg("key"),
                default: call_args.kwarg("default"),
                args: call_args.args,
            }))
        }
        Builtin::Next => {
            call_args.arity("next", 1, 2)?;
            let default = call_args.args.get(1).cloned();
            Ok(Outcome::Request(Request::IterNext {
                iterator: call_args.args.swap_remove(0),
                default,
            }))
        }
        Builtin::Object => {
            call_args.arity("object", 0, 0)?;
            Ok(Value::None.into())
        }
        Builtin::Open => {
            call_args.arity_pos("open", 1, 2)?;
            let path = as_str(&call_args.args[0], "open")?;
            let mode = match call_args.args.get(1).cloned().or_else(|| call_args.kwarg("mode")) {
                Some(v) => as_str(&v, "open")?,
                None => "r".to_string(),
            };
            let id = ctx.open_file(&path, &mode)?;
            Ok(Value::File(id).into())
        }
        Builtin::Pow => {
            call_args.arity("pow", 2, 3)?;
            let modulus = call_args.args.get(2).cloned();
            pow(&call_args.args[0], &call_args.args[1], modulus.as_ref())
        }
        Builtin::Print => {
            let sep = match call_args.kwarg("sep") {
                Some(Value::None) | None => " ".to_string(),
                Some(v) => as_str(&v, "sep")?,
            };
            let end = match call_args.kwarg("end") {
                Some(Value::None) | None => "\n".to_string(),
                Some(v) => as_str(&v, "end")?,
            };
            Ok(Outcome::Request(Request::Print {
                args: call_args.args,
                sep,
                end,
            }))
        }
        Builtin::Range => {
            call_args.arity("range", 1, 3)?;
            range(&call_args.args)
        }
        Builtin::Repr => {
            call_args.arity("repr", 1, 1)?;
            Ok(Outcome::Request(Request::Repr(call_args.args.remove(0))))
        }
        Builtin::Reversed => {
            call_args.arity("reversed", 1, 1)?;
            Ok(Outcome::Request(Request::Reversed(call_args.args.remove(0))))
        }
        Builtin::Round => {
            call_args.arity("round", 1, 2)?;
            let ndigits = match call_args.args.get(1) {
                Some(Value::None) | None => None,
                Some(v) => Some(as_int(v, "round")?),
            };
            round(&call_args.args[0], ndigits)
        }
        Builtin::Set => {
            call_args.arity("set", 0, 1)?;
            match call_args.args.pop() {
                None => Ok(Value::set(crate::types::Set::new()).into()),
                Some(v) => Ok(Outcome::Request(Request::IterToSet(v))),
            }
        }
        Builtin::SetAttr => {
            call_args.arity("setattr", 3, 3)?;
            let name = as_str(&call_args.args[1], "attribute name")?;
            let value = call_args.args.pop().unwrap_or(Value::None);
            Ok(Outcome::Request(Request::SetAttr {
                obj: call_args.args.swap_remove(0),
                name,
                value,
            }))
        }
        Builtin::Sorted => {
            call_args.arity_pos("sorted", 1, 1)?;
            Ok(Outcome::Request(Request::Sort {
                items: call_args.args.remove(0),
                key: call_args.kwarg("key").filter(|v| !matches!(v, Value::None)),
                reverse: call_args.kwarg("reverse").is_some_and(|v| truthy(&v)),
                in_place: false,
            }))
        }
        Builtin::Str => {
            call_args.arity("str", 0, 1)?;
            match call_args.args.pop() {
                None => Ok(Value::str("").into()),
                Some(v) => Ok(Outcome::Request(Request::Str(v))),
            }
        }
        Builtin::Sum => {
            call_args.arity_pos("sum", 1, 2)?;
            let start = call_args
                .args
                .get(1)
                .cloned()
                .or_else(|| call_args.kwarg("start"))
                .unwrap_or(Value::Int(0));
            Ok(Outcome::Request(Request::IterSum {
                iterable: call_args.args.remove(0),
                start,
            }))
        }
        Builtin::Super => {
            call_args.arity("super", 0, 2)?;
            Ok(Outcome::Request(Request::SuperCall { args: call_args.args }))
        }
        Builtin::Suspend => {
            call_args.arity("suspend", 0, 0)?;
            Ok(Outcome::Request(Request::Suspend))
        }
        Builtin::Tuple => {
            call_args.arity("tuple", 0, 1)?;
            match call_args.args.pop() {
                None => Ok(Value::tuple(vec![]).into()),
                Some(v) => Ok(Outcome::Request(Request::IterToTuple(v))),
            }
        }
        Builtin::Type => {
            call_args.arity("type", 1, 1)?;
            Ok(type_of(&call_args.args[0]).into())
        }
        Builtin::Zip => {
            call_args.arity("zip", 0, usize::MAX)?;
            Ok(Outcome::Request(Request::Zip(call_args.args)))
        }
        Builtin::Exc(kind) => {
            let exc = ExcValue {
                kind,
                args: call_args.args,
            };
            Ok(Value::Exc(Rc::new(exc)).into())
        }
    }
}

// --- helpers ---------------------------------------------------------------

pub(crate) fn as_str(v: &Value, what: &str) -> Result<String, Exception> {
    match v {
        Value::Str(s) => Ok(s.to_string()),
        other => Err(Exception::type_error(format!(
            "{what} must be str, not {}",
            type_name(other)
        ))),
    }
}

pub(crate) fn as_int(v: &Value, what: &str) -> Result<i64, Exception> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::BigInt(_) => Err(Exception::overflow_error(format!(
            "{what}: integer out of supported range"
        ))),
        other => Err(Exception::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            type_name(other)
        ))),
    }
}

fn abs(v: &Value) -> Result<Value, Exception> {
    match v {
        Value::Int(i) => Ok(match i.checked_abs() {
            Some(a) => Value::Int(a),
            None => Value::from_bigint(-BigInt::from(*i)),
        }),
        Value::BigInt(b) => Ok(Value::from_bigint(b.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        other => Err(Exception::type_error(format!(
            "bad operand type for abs(): '{}'",
            type_name(other)
        ))),
    }
}

fn int_to_base(v: &Value, base: u32, prefix: &str) -> Result<Outcome, Exception> {
    let render = |b: &BigInt| {
        let (sign, digits) = if b.is_negative() { ("-", -b) } else { ("", b.clone()) };
        format!("{sign}{prefix}{}", digits.to_str_radix(base))
    };
    match v {
        Value::Int(i) => Ok(Value::str(render(&BigInt::from(*i))).into()),
        Value::Bool(b) => Ok(Value::str(render(&BigInt::from(i64::from(*b)))).into()),
        Value::BigInt(b) => Ok(Value::str(render(b)).into()),
        other => Err(Exception::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            type_name(other)
        ))),
    }
}

fn to_float(v: &Value) -> Result<f64, Exception> {
    match v {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        Value::Bool(b) => Ok(f64::from(i8::from(*b))),
        Value::BigInt(b) => b
            .to_f64()
            .ok_or_else(|| Exception::overflow_error("int too large to convert to float")),
        Value::Str(s) => {
            let trimmed = s.trim();
            let normalized = trimmed.to_ascii_lowercase();
            match normalized.as_str() {
                "inf" | "+inf" | "infinity" | "+infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                "nan" | "+nan" | "-nan" => Ok(f64::NAN),
                _ => trimmed.parse::<f64>().map_err(|_| {
                    Exception::value_error(format!(
                        "could not convert string to float: {}",
                        crate::value::str_repr(s)
                    ))
                }),
            }
        }
        other => Err(Exception::type_error(format!(
            "float() argument must be a string or a real number, not '{}'",
            type_name(other)
        ))),
    }
}

fn int_constructor(mut call_args: CallArgs) -> Result<Outcome, Exception> {
    call_args.arity_pos("int", 0, 2)?;
    let base = match call_args.args.get(1).cloned().or_else(|| call_args.kwarg("base")) {
        Some(v) => Some(as_int(&v, "int")?),
        None => None,
    };
    let Some(v) = call_args.args.first() else {
        return Ok(Value::Int(0).into());
    };
    match (v, base) {
        (Value::Str(s), base) => {
            let base = base.unwrap_or(10);
            if !(2..=36).contains(&base) && base != 0 {
                return Err(Exception::value_error("int() base must be >= 2 and <= 36, or 0"));
            }
            parse_int_str(s, u32::try_from(base).unwrap_or(10)).map(Outcome::Value)
        }
        (_, Some(_)) => Err(Exception::type_error(
            "int() can't convert non-string with explicit base",
        )),
        (Value::Int(i), None) => Ok(Value::Int(*i).into()),
        (Value::BigInt(b), None) => Ok(Value::BigInt(b.clone()).into()),
        (Value::Bool(b), None) => Ok(Value::Int(i64::from(*b)).into()),
        (Value::Float(f), None) => {
            if f.is_nan() {
                Err(Exception::value_error("cannot convert float NaN to integer"))
            } else if f.is_infinite() {
                Err(Exception::overflow_error("cannot convert float infinity to integer"))
            } else if f.abs() < 2f64.powi(63) {
                Ok(Value::Int(f.trunc() as i64).into())
            } else {
                Ok(Value::from_bigint(
                    bigint_from_f64(f.trunc())
                ).into())
            }
        }
        (other, None) => Err(Exception::type_error(format!(
            "int() argument must be a string, a bytes-like object or a real number, not '{}'",
            type_name(other)
        ))),
    }
}

fn bigint_from_f64(f: f64) -> BigInt {
    num_traits::FromPrimitive::from_f64(f).unwrap_or_else(BigInt::zero)
}

/// Parses an integer literal string with optional sign, underscores and a
/// radix prefix when `base` permits it.
pub(crate) fn parse_int_str(s: &str, base: u32) -> Result<Value, Exception> {
    let invalid = || {
        Exception::value_error(format!(
            "invalid literal for int() with base {base}: {}",
            crate::value::str_repr(s)
        ))
    };
    let trimmed = s.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let lower = digits.to_ascii_lowercase();
    let (base, digits) = match (base, lower.as_str()) {
        (16 | 0, d) if d.starts_with("0x") => (16, &digits[2..]),
        (8 | 0, d) if d.starts_with("0o") => (8, &digits[2..]),
        (2 | 0, d) if d.starts_with("0b") => (2, &digits[2..]),
        (0, _) => (10, digits),
        (b, _) => (b, digits),
    };
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err(invalid());
    }
    let parsed = BigInt::parse_bytes(cleaned.as_bytes(), base).ok_or_else(invalid)?;
    Ok(Value::from_bigint(if negative { -parsed } else { parsed }))
}

fn divmod(a: &Value, b: &Value) -> Result<Outcome, Exception> {
    use num_integer::Integer;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            if *y == 0 {
                return Err(Exception::zero_division("integer division or modulo by zero"));
            }
            let (q, r) = x.div_mod_floor(y);
            Ok(Value::tuple(vec![Value::Int(q), Value::Int(r)]).into())
        }
        _ => {
            let x = to_float(a)?;
            let y = to_float(b)?;
            if y == 0.0 {
                return Err(Exception::zero_division("float divmod()"));
            }
            let q = (x / y).floor();
            let r = x - q * y;
            Ok(Value::tuple(vec![Value::Float(q), Value::Float(r)]).into())
        }
    }
}

fn pow(base: &Value, exp: &Value, modulus: Option<&Value>) -> Result<Outcome, Exception> {
    if let Some(m) = modulus {
        let (b, e, m) = (as_int(base, "pow")?, as_int(exp, "pow")?, as_int(m, "pow")?);
        if e < 0 {
            return Err(Exception::value_error(
                "pow() 2nd argument cannot be negative when 3rd argument specified",
            ));
        }
        if m == 0 {
            return Err(Exception::value_error("pow() 3rd argument cannot be 0"));
        }
        let result = BigInt::from(b).modpow(&BigInt::from(e), &BigInt::from(m));
        return Ok(Value::from_bigint(result).into());
    }
    crate::eval::binop::pow_values(base, exp).map(Outcome::Value)
}

fn round(v: &Value, ndigits: Option<i64>) -> Result<Outcome, Exception> {
    match (v, ndigits) {
        (Value::Int(i), None | Some(_)) => Ok(Value::Int(*i).into()),
        (Value::BigInt(b), _) => Ok(Value::BigInt(b.clone()).into()),
        (Value::Bool(b), _) => Ok(Value::Int(i64::from(*b)).into()),
        (Value::Float(f), None) => {
            let rounded = f.round();
            if rounded.abs() < 2f64.powi(63) {
                Ok(Value::Int(rounded as i64).into())
            } else {
                Ok(Value::from_bigint(bigint_from_f64(rounded)).into())
            }
        }
        (Value::Float(f), Some(n)) => {
            let factor = 10f64.powi(i32::try_from(n).unwrap_or(i32::MAX));
            Ok(Value::Float((f * factor).round() / factor).into())
        }
        (other, _) => Err(Exception::type_error(format!(
            "type {} doesn't define __round__ method",
            type_name(other)
        ))),
    }
}

fn range(args: &[Value]) -> Result<Outcome, Exception> {
    let ints: Vec<i64> = args
        .iter()
        .map(|v| as_int(v, "range"))
        .collect::<Result<_, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!("arity checked by caller"),
    };
    if step == 0 {
        return Err(Exception::value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Range { start, stop, step }.into())
}

/// `type(x)`: the class for instances, the type constructor for builtins.
pub(crate) fn type_of(v: &Value) -> Value {
    match v {
        Value::Instance(inst) => Value::Class(inst.borrow().class.clone()),
        Value::Exc(exc) => Value::Builtin(Builtin::Exc(exc.kind)),
        Value::None => Value::Builtin(Builtin::Object),
        Value::Bool(_) => Value::Builtin(Builtin::Bool),
        Value::Int(_) | Value::BigInt(_) => Value::Builtin(Builtin::Int),
        Value::Float(_) => Value::Builtin(Builtin::Float),
        Value::Str(_) => Value::Builtin(Builtin::Str),
        Value::List(_) => Value::Builtin(Builtin::List),
        Value::Tuple(_) => Value::Builtin(Builtin::Tuple),
        Value::Dict(_) => Value::Builtin(Builtin::Dict),
        Value::Set(_) => Value::Builtin(Builtin::Set),
        Value::FrozenSet(_) => Value::Builtin(Builtin::FrozenSet),
        Value::Range { .. } => Value::Builtin(Builtin::Range),
        Value::Class(_) => Value::Builtin(Builtin::Type),
        _ => Value::Builtin(Builtin::Object),
    }
}

/// `isinstance`, including tuple-of-types and bool-is-int.
pub(crate) fn isinstance(v: &Value, class: &Value) -> Result<bool, Exception> {
    match class {
        Value::Tuple(classes) => {
            for c in classes.iter() {
                if isinstance(v, c)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Builtin(b) => Ok(builtin_isinstance(v, *b)),
        Value::Class(target) => match v {
            Value::Instance(inst) => Ok(crate::value::class_is_subclass(&inst.borrow().class, target)),
            _ => Ok(false),
        },
        other => Err(Exception::type_error(format!(
            "isinstance() arg 2 must be a type or tuple of types, not {}",
            type_name(other)
        ))),
    }
}

fn builtin_isinstance(v: &Value, b: Builtin) -> bool {
    match b {
        Builtin::Bool => matches!(v, Value::Bool(_)),
        // bool is a subtype of int
        Builtin::Int => matches!(v, Value::Int(_) | Value::BigInt(_) | Value::Bool(_)),
        Builtin::Float => matches!(v, Value::Float(_)),
        Builtin::Str => matches!(v, Value::Str(_)),
        Builtin::List => matches!(v, Value::List(_)),
        Builtin::Tuple => matches!(v, Value::Tuple(_)),
        Builtin::Dict => matches!(v, Value::Dict(_)),
        Builtin::Set => matches!(v, Value::Set(_)),
        Builtin::FrozenSet => matches!(v, Value::FrozenSet(_)),
        Builtin::Range => matches!(v, Value::Range { .. }),
        Builtin::Type => matches!(v, Value::Class(_)) || matches!(v, Value::Builtin(b) if b.is_type()),
        Builtin::Object => true,
        Builtin::Exc(target) => match v {
            Value::Exc(exc) => exc.kind.is_subclass_of(target),
            Value::Instance(inst) => {
                crate::value::class_exc_base(&inst.borrow().class).is_some_and(|k| k.is_subclass_of(target))
            }
            _ => false,
        },
        _ => false,
    }
}

pub(crate) fn issubclass(class: &Value, target: &Value) -> Result<bool, Exception> {
    match (class, target) {
        (_, Value::Tuple(targets)) => {
            for t in targets.iter() {
                if issubclass(class, t)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Value::Class(c), Value::Class(t)) => Ok(crate::value::class_is_subclass(c, t)),
        (Value::Class(c), Value::Builtin(b)) => match b.as_exc_type() {
            Some(kind) => Ok(crate::value::class_exc_base(c).is_some_and(|k| k.is_subclass_of(kind))),
            None => Ok(matches!(b, Builtin::Object)),
        },
        (Value::Builtin(x), Value::Builtin(y)) => match (x.as_exc_type(), y.as_exc_type()) {
            (Some(a), Some(b)) => Ok(a.is_subclass_of(b)),
            _ => Ok(x == y || matches!(y, Builtin::Object) || (matches!(x, Builtin::Bool) && matches!(y, Builtin::Int))),
        },
        (other, _) if !matches!(other, Value::Class(_) | Value::Builtin(_)) => {
            Err(Exception::type_error("issubclass() arg 1 must be a class"))
        }
        _ => Err(Exception::type_error(
            "issubclass() arg 2 must be a class or tuple of classes",
        )),
    }
}

/// Length of any value that knows it without evaluator help.
pub(crate) fn pure_len(v: &Value) -> Option<i64> {
    let n = match v {
        Value::Str(s) => s.chars().count(),
        Value::List(l) => l.borrow().len(),
        Value::Tuple(t) => t.len(),
        Value::Dict(d) => d.borrow().len(),
        Value::Set(s) => s.borrow().len(),
        Value::FrozenSet(s) => s.len(),
        Value::Deque(d) => d.borrow().len(),
        Value::Range { start, stop, step } => return Some(range_len(*start, *stop, *step)),
        Value::Generator(g) => g.items.len(),
        _ => return None,
    };
    Some(n as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_round_trip() {
        assert_eq!(Builtin::from_name("len"), Some(Builtin::Len));
        assert_eq!(Builtin::Len.name(), "len");
        assert_eq!(Builtin::from_name("ValueError"), Some(Builtin::Exc(ExcType::ValueError)));
        assert_eq!(Builtin::from_name("no_such_builtin"), None);
    }

    #[test]
    fn int_parsing() {
        assert!(matches!(parse_int_str("42", 10), Ok(Value::Int(42))));
        assert!(matches!(parse_int_str(" -7 ", 10), Ok(Value::Int(-7))));
        assert!(matches!(parse_int_str("0xff", 16), Ok(Value::Int(255))));
        assert!(matches!(parse_int_str("0b101", 0), Ok(Value::Int(5))));
        assert!(matches!(parse_int_str("1_000", 10), Ok(Value::Int(1000))));
        assert!(parse_int_str("12a", 10).is_err());
        assert!(matches!(
            parse_int_str("123456789012345678901234567890", 10),
            Ok(Value::BigInt(_))
        ));
    }

    #[test]
    fn isinstance_bool_is_int() {
        assert!(isinstance(&Value::Bool(true), &Value::Builtin(Builtin::Int)).unwrap());
        assert!(isinstance(&Value::Bool(true), &Value::Builtin(Builtin::Bool)).unwrap());
        assert!(!isinstance(&Value::Int(1), &Value::Builtin(Builtin::Bool)).unwrap());
    }

    #[test]
    fn type_of_returns_constructor() {
        assert!(matches!(type_of(&Value::Int(3)), Value::Builtin(Builtin::Int)));
        assert!(matches!(type_of(&Value::str("x")), Value::Builtin(Builtin::Str)));
    }
}
