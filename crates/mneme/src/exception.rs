use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

/// Python exception kinds surfaced by the interpreter.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>`
/// implementations. The string form matches the variant name exactly
/// (e.g. `ValueError` -> "ValueError"). The kind name is the stable contract
/// with hosts; message text outside pinned tests is advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// Primary exception class - matches any standard exception in isinstance checks.
    Exception,
    /// Base of the whole hierarchy.
    BaseException,

    // --- ArithmeticError hierarchy ---
    ArithmeticError,
    /// Subclass of ArithmeticError.
    OverflowError,
    /// Subclass of ArithmeticError.
    ZeroDivisionError,

    // --- LookupError hierarchy ---
    LookupError,
    /// Subclass of LookupError.
    IndexError,
    /// Subclass of LookupError.
    KeyError,

    // --- RuntimeError hierarchy ---
    RuntimeError,
    /// Subclass of RuntimeError.
    NotImplementedError,
    /// Subclass of RuntimeError.
    RecursionError,

    AttributeError,

    // --- NameError hierarchy ---
    NameError,
    /// Subclass of NameError - local variable referenced before assignment.
    UnboundLocalError,

    ValueError,

    // --- ImportError hierarchy ---
    ImportError,
    /// Subclass of ImportError - module cannot be located.
    ModuleNotFoundError,

    // --- OSError hierarchy ---
    /// OS-related errors. `IOError` is the guest-facing alias CPython kept.
    #[strum(serialize = "IOError")]
    IOError,
    /// Subclass of IOError - file or directory missing.
    FileNotFoundError,
    /// Subclass of IOError - operation lacks a granted capability.
    PermissionError,
    /// Network requests denied by policy or transport failures.
    ///
    /// Not a CPython builtin; it is this sandbox's stable kind for every
    /// outbound-network denial and failure.
    NetworkError,

    // --- Standalone kinds ---
    AssertionError,
    MemoryError,
    StopIteration,
    SyntaxError,
    TimeoutError,
    TypeError,
}

impl ExcType {
    /// Checks if this exception kind would be caught by `except handler:`.
    ///
    /// Implements the subset of Python's exception hierarchy this interpreter
    /// exposes: `Exception` catches everything except `BaseException`,
    /// `LookupError` catches `KeyError`/`IndexError`, and so on.
    #[must_use]
    pub fn is_subclass_of(self, handler: Self) -> bool {
        if self == handler {
            return true;
        }
        match handler {
            Self::BaseException => true,
            Self::Exception => self != Self::BaseException,
            Self::LookupError => matches!(self, Self::KeyError | Self::IndexError),
            Self::ArithmeticError => matches!(self, Self::ZeroDivisionError | Self::OverflowError),
            Self::RuntimeError => matches!(self, Self::RecursionError | Self::NotImplementedError),
            Self::NameError => matches!(self, Self::UnboundLocalError),
            Self::ImportError => matches!(self, Self::ModuleNotFoundError),
            Self::IOError => matches!(
                self,
                Self::FileNotFoundError | Self::PermissionError | Self::NetworkError
            ),
            _ => false,
        }
    }
}

/// A guest-level exception travelling through the evaluator as a signal.
///
/// `value` carries the raised instance when one exists (a user-defined
/// exception class instance, or a builtin exception object with `args`), so
/// `except ... as e` can bind it. `line` is filled in by the evaluator at the
/// closest statement when the exception is created without one.
#[derive(Debug, Clone)]
pub struct Exception {
    pub kind: ExcType,
    pub message: String,
    pub value: Option<Value>,
    pub line: Option<u32>,
}

impl Exception {
    pub(crate) fn new(kind: ExcType, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            value: None,
            line: None,
        }
    }

    pub(crate) fn with_value(kind: ExcType, message: impl Into<String>, value: Value) -> Self {
        Self {
            kind,
            message: message.into(),
            value: Some(value),
            line: None,
        }
    }

    /// Attaches a source line if none is recorded yet.
    pub(crate) fn at_line(mut self, line: u32) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// In-band control-flow signal used in place of host exceptions.
///
/// Every sub-evaluation returns `Result<T, Signal>`; `?` propagates the signal
/// unchanged and the construct responsible for it (function-call boundary,
/// loop, `try` statement, top-level run) peels it off.
#[derive(Debug, Clone)]
pub(crate) enum Signal {
    /// `return` travelling to the nearest function-call boundary.
    Return(Value),
    /// `break` travelling to the nearest enclosing loop.
    Break,
    /// `continue` travelling to the nearest enclosing loop.
    Continue,
    /// A Python exception unwinding toward a matching handler or the root.
    Raise(Exception),
    /// Cooperative suspension requested by `suspend()`.
    Suspend,
}

impl From<Exception> for Signal {
    fn from(exc: Exception) -> Self {
        Self::Raise(exc)
    }
}

/// Host-facing error returned by `compile` / `run`.
///
/// `kind` is the stable exception-kind prefix (`"TypeError"`, `"NetworkError"`,
/// ...); `message` is the full guest-facing text including the kind prefix and
/// a trailing ` (line N)` when the evaluator knows the source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    pub kind: String,
    pub message: String,
}

impl Error {
    pub(crate) fn from_exception(exc: &Exception) -> Self {
        let mut message = exc.to_string();
        if let Some(line) = exc.line {
            message.push_str(&format!(" (line {line})"));
        }
        Self {
            kind: exc.kind.to_string(),
            message,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}

/// Shorthand constructors used throughout the crate.
macro_rules! exc_constructors {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        impl Exception {
            $(
                pub(crate) fn $fn_name(message: impl Into<String>) -> Self {
                    Self::new(ExcType::$variant, message)
                }
            )*
        }
    };
}

exc_constructors! {
    type_error => TypeError,
    value_error => ValueError,
    name_error => NameError,
    attribute_error => AttributeError,
    key_error => KeyError,
    index_error => IndexError,
    zero_division => ZeroDivisionError,
    overflow_error => OverflowError,
    import_error => ImportError,
    module_not_found => ModuleNotFoundError,
    runtime_error => RuntimeError,
    stop_iteration => StopIteration,
    io_error => IOError,
    permission_error => PermissionError,
    network_error => NetworkError,
    syntax_error => SyntaxError,
    not_implemented => NotImplementedError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_matches_handlers() {
        assert!(ExcType::KeyError.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::KeyError.is_subclass_of(ExcType::Exception));
        assert!(ExcType::UnboundLocalError.is_subclass_of(ExcType::NameError));
        assert!(ExcType::NetworkError.is_subclass_of(ExcType::IOError));
        assert!(!ExcType::LookupError.is_subclass_of(ExcType::KeyError));
        assert!(!ExcType::BaseException.is_subclass_of(ExcType::Exception));
    }

    #[test]
    fn display_uses_kind_prefix() {
        let exc = Exception::type_error("bad operand");
        assert_eq!(exc.to_string(), "TypeError: bad operand");
        let err = Error::from_exception(&exc.at_line(3));
        assert_eq!(err.kind, "TypeError");
        assert_eq!(err.message, "TypeError: bad operand (line 3)");
    }
}
