//! Method dispatch on builtin values.
//!
//! A flat two-level lookup: the receiver's type tag picks a method enum,
//! `strum`'s `EnumString` resolves the name, and `call` dispatches. Unknown
//! names fall through to the evaluator's "has no attribute" error.

pub(crate) mod dict;
pub(crate) mod list;
pub(crate) mod misc;
pub(crate) mod set;
pub(crate) mod str;

use strum::{EnumString, IntoStaticStr};

use crate::{
    builtins::{CallArgs, Outcome},
    context::Ctx,
    exception::Exception,
    types::DictFlavor,
    value::Value,
};

/// A resolved method tag carried by bound-method values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Str(StrMethod),
    List(ListMethod),
    Dict(DictMethod),
    Counter(CounterMethod),
    Set(SetMethod),
    Tuple(TupleMethod),
    Deque(DequeMethod),
    File(FileMethod),
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Self::Str(m) => m.into(),
            Self::List(m) => m.into(),
            Self::Dict(m) => m.into(),
            Self::Counter(m) => m.into(),
            Self::Set(m) => m.into(),
            Self::Tuple(m) => m.into(),
            Self::Deque(m) => m.into(),
            Self::File(m) => m.into(),
        }
    }
}

/// Resolves a method name against a receiver's type.
pub(crate) fn lookup(recv: &Value, name: &str) -> Option<Method> {
    match recv {
        Value::Str(_) => name.parse().ok().map(Method::Str),
        Value::List(_) => name.parse().ok().map(Method::List),
        Value::Dict(d) => {
            if d.borrow().flavor() == DictFlavor::Counter {
                if let Ok(m) = name.parse() {
                    return Some(Method::Counter(m));
                }
            }
            name.parse().ok().map(Method::Dict)
        }
        Value::Set(_) => name.parse().ok().map(Method::Set),
        Value::FrozenSet(_) => {
            let method: SetMethod = name.parse().ok()?;
            // frozensets expose only the non-mutating surface
            (!method.mutates()).then_some(Method::Set(method))
        }
        Value::Tuple(_) => name.parse().ok().map(Method::Tuple),
        Value::Deque(_) => name.parse().ok().map(Method::Deque),
        Value::File(_) => name.parse().ok().map(Method::File),
        _ => None,
    }
}

/// Invokes a bound method. Same contract as the builtin registry: returns a
/// value or a post-dispatch request.
pub(crate) fn call(
    method: Method,
    recv: Value,
    call_args: CallArgs,
    ctx: &mut Ctx,
) -> Result<Outcome, Exception> {
    match method {
        Method::Str(m) => self::str::call(m, &recv, call_args, ctx),
        Method::List(m) => self::list::call(m, &recv, call_args, ctx),
        Method::Dict(m) => self::dict::call(m, &recv, call_args, ctx),
        Method::Counter(m) => self::dict::call_counter(m, &recv, call_args, ctx),
        Method::Set(m) => self::set::call(m, &recv, call_args, ctx),
        Method::Tuple(m) => self::misc::call_tuple(m, &recv, call_args),
        Method::Deque(m) => self::misc::call_deque(m, &recv, call_args, ctx),
        Method::File(m) => self::misc::call_file(m, &recv, call_args, ctx),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StrMethod {
    Upper,
    Lower,
    Casefold,
    Strip,
    Lstrip,
    Rstrip,
    Split,
    Rsplit,
    Splitlines,
    Join,
    Replace,
    Startswith,
    Endswith,
    Find,
    Index,
    Rfind,
    Rindex,
    Partition,
    Rpartition,
    Count,
    Format,
    Isdigit,
    Isalpha,
    Isalnum,
    Isspace,
    Isupper,
    Islower,
    Istitle,
    Isnumeric,
    Isidentifier,
    Title,
    Capitalize,
    Zfill,
    Center,
    Ljust,
    Rjust,
    Swapcase,
    Expandtabs,
    Encode,
    Removeprefix,
    Removesuffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ListMethod {
    Append,
    Extend,
    Insert,
    Remove,
    Pop,
    Index,
    Count,
    Sort,
    Reverse,
    Clear,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DictMethod {
    Get,
    Keys,
    Values,
    Items,
    Pop,
    Popitem,
    Update,
    Setdefault,
    Clear,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CounterMethod {
    MostCommon,
    Elements,
    Subtract,
    Total,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SetMethod {
    Add,
    Remove,
    Discard,
    Pop,
    Clear,
    Copy,
    Update,
    Union,
    Intersection,
    Difference,
    SymmetricDifference,
    Issubset,
    Issuperset,
    Isdisjoint,
}

impl SetMethod {
    fn mutates(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Remove | Self::Discard | Self::Pop | Self::Clear | Self::Update
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TupleMethod {
    Count,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DequeMethod {
    Append,
    Appendleft,
    Pop,
    Popleft,
    Extend,
    Extendleft,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FileMethod {
    Read,
    Readline,
    Readlines,
    Write,
    Writelines,
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_resolution() {
        assert!(matches!(
            lookup(&Value::str("x"), "startswith"),
            Some(Method::Str(StrMethod::Startswith))
        ));
        assert!(matches!(
            lookup(&Value::list(vec![]), "append"),
            Some(Method::List(ListMethod::Append))
        ));
        assert!(lookup(&Value::str("x"), "no_such_method").is_none());
    }

    #[test]
    fn frozenset_hides_mutators() {
        let frozen = Value::FrozenSet(std::rc::Rc::new(crate::types::Set::new()));
        assert!(lookup(&frozen, "add").is_none());
        assert!(matches!(
            lookup(&frozen, "union"),
            Some(Method::Set(SetMethod::Union))
        ));
    }

    #[test]
    fn counter_methods_resolve_on_counter_only() {
        let counter = Value::dict(crate::types::Dict::with_flavor(DictFlavor::Counter));
        assert!(matches!(
            lookup(&counter, "most_common"),
            Some(Method::Counter(CounterMethod::MostCommon))
        ));
        let plain = Value::dict(crate::types::Dict::new());
        assert!(lookup(&plain, "most_common").is_none());
    }
}
