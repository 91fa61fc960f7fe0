#![doc = include_str!("../../../README.md")]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
#![allow(clippy::unnecessary_wraps, clippy::needless_pass_by_value)]
#![allow(clippy::module_name_repetitions, clippy::return_self_not_must_use)]

mod ast;
mod builtins;
mod context;
mod env;
mod eval;
mod event;
mod exception;
mod format;
mod fsys;
mod import;
mod methods;
mod modules;
mod net;
mod parse;
mod types;
mod value;

pub use crate::{
    ast::Ast,
    builtins::Builtin,
    context::{Ctx, CtxOptions, HostModule, ModuleProvider, DEFAULT_MAX_CALL_DEPTH},
    event::{decode as decode_events, encode as encode_events, Event, EventKind, EventPayload, FileOp},
    exception::{Error, ExcType},
    fsys::{FileSystem, MemFs, WriteMode},
    net::{HttpClient, HttpRequest, HttpResponse, NetworkPolicy},
    value::{py_repr, py_str, truthy, type_name, NativeFn, Value},
};

use crate::{
    env::Env,
    eval::Interp,
    event::{EventKind as EvKind, EventPayload as EvPayload},
    exception::{Exception, Signal},
};

/// How a run left the interpreter: a final value, or a cooperative
/// suspension requested by the guest's `suspend()` call. A suspended run is
/// re-entered by running the same source against `ctx.for_resume()`.
#[derive(Debug)]
pub enum RunOutcome {
    Complete(Value),
    Suspended,
}

impl RunOutcome {
    /// The completed value; `None` when the run suspended.
    #[must_use]
    pub fn value(self) -> Option<Value> {
        match self {
            Self::Complete(v) => Some(v),
            Self::Suspended => None,
        }
    }
}

/// Parses source without evaluating it.
pub fn compile(source: &str) -> Result<Ast, Error> {
    parse::parse(source).map_err(|exc| Error::from_exception(&exc))
}

/// Parses and evaluates source against the context. The result is the value
/// of the final top-level expression statement (`None` otherwise); the
/// context keeps the event log, print output, and compute-time accounting
/// for the host to inspect.
pub fn run(source: &str, ctx: &mut Ctx) -> Result<RunOutcome, Error> {
    let ast = compile(source)?;
    run_ast(&ast, ctx)
}

/// Evaluates an already-compiled AST against the context.
pub fn run_ast(ast: &Ast, ctx: &mut Ctx) -> Result<RunOutcome, Error> {
    ctx.resume_compute();
    let mut env = Env::new_module();
    let result = {
        let mut interp = Interp::new(ctx);
        interp.run_module(ast, &mut env)
    };
    ctx.pause_compute();
    match result {
        Ok(value) => Ok(RunOutcome::Complete(value)),
        Err(Signal::Suspend) => Ok(RunOutcome::Suspended),
        Err(Signal::Raise(exc)) => {
            ctx.record(
                EvKind::Exception,
                EvPayload::Raised {
                    kind: exc.kind.to_string(),
                    message: exc.message.clone(),
                },
            );
            Err(Error::from_exception(&exc))
        }
        Err(Signal::Return(_)) => Err(Error::from_exception(&Exception::syntax_error(
            "'return' outside function",
        ))),
        Err(Signal::Break) => Err(Error::from_exception(&Exception::syntax_error(
            "'break' outside loop",
        ))),
        Err(Signal::Continue) => Err(Error::from_exception(&Exception::syntax_error(
            "'continue' not properly in loop",
        ))),
    }
}
