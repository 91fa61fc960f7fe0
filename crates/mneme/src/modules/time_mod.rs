//! The `time` module. Wall-clock reads are non-deterministic, so each one is
//! recorded as a side-effect event and replayed from the log.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    event::{EventKind, EventPayload},
    modules::{module_value, native_ctx},
    value::Value,
};

pub(crate) fn module() -> Value {
    module_value(
        "time",
        vec![
            ("time", native_ctx("time", |_args, _kwargs, ctx| {
                if let Some(EventPayload::SideEffect { data, .. }) = ctx.record(
                    EventKind::SideEffect,
                    EventPayload::SideEffect {
                        tag: "time".into(),
                        data: String::new(),
                    },
                ) {
                    return Ok(Value::Float(data.parse().unwrap_or(0.0)));
                }
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0.0, |d| d.as_secs_f64());
                ctx.amend_last_side_effect(&format!("{now}"));
                Ok(Value::Float(now))
            })),
            ("monotonic", native_ctx("monotonic", |_args, _kwargs, ctx| {
                // compute time doubles as the monotonic clock; it only moves
                // while guest code runs, which keeps replays aligned
                Ok(Value::Float(ctx.compute_time().as_secs_f64()))
            })),
            ("sleep", native_ctx("sleep", |_args, _kwargs, _ctx| {
                // sleeping is a no-op in the sandbox; the budget is compute time
                Ok(Value::None)
            })),
        ],
    )
}
