//! A compact `datetime` module backed by chrono.
//!
//! Datetime values expose their fields as attributes plus `isoformat`,
//! `strftime` and `timestamp`; `now`/`today` are non-deterministic and
//! recorded as side-effect events for replay.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::{
    context::Ctx,
    event::{EventKind, EventPayload},
    exception::Exception,
    modules::{kwarg, module_value, native, native_ctx},
    value::Value,
};

pub(crate) fn module() -> Value {
    module_value(
        "datetime",
        vec![
            ("datetime", module_value(
                "datetime.datetime",
                vec![
                    ("now", native_ctx("now", |_args, _kwargs, ctx| {
                        Ok(datetime_object(recorded_now(ctx)))
                    })),
                    ("utcnow", native_ctx("utcnow", |_args, _kwargs, ctx| {
                        Ok(datetime_object(recorded_now(ctx)))
                    })),
                    ("fromtimestamp", native("fromtimestamp", |args| {
                        let ts = crate::modules::float_arg(&args, 0, "fromtimestamp")?;
                        let dt = Utc
                            .timestamp_opt(ts.trunc() as i64, (ts.fract() * 1e9).max(0.0) as u32)
                            .single()
                            .ok_or_else(|| Exception::value_error("timestamp out of range"))?;
                        Ok(datetime_object(dt.naive_utc()))
                    })),
                    ("fromisoformat", native("fromisoformat", |args| {
                        let text = crate::modules::str_arg(&args, 0, "fromisoformat")?;
                        let parsed = NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S")
                            .or_else(|_| NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S"))
                            .or_else(|_| {
                                NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
                            })
                            .map_err(|_| {
                                Exception::value_error(format!("Invalid isoformat string: '{text}'"))
                            })?;
                        Ok(datetime_object(parsed))
                    })),
                ],
            )),
            ("date", module_value(
                "datetime.date",
                vec![("today", native_ctx("today", |_args, _kwargs, ctx| {
                    let now = recorded_now(ctx);
                    Ok(date_object(now.date()))
                }))],
            )),
            ("timedelta", native_ctx("timedelta", |args, kwargs, _ctx| {
                let days = match kwarg(&kwargs, "days") {
                    Some(v) => crate::modules::float_arg(&[v], 0, "timedelta")?,
                    None => args
                        .first()
                        .map_or(Ok(0.0), |v| crate::modules::float_arg(&[v.clone()], 0, "timedelta"))?,
                };
                let seconds = match kwarg(&kwargs, "seconds") {
                    Some(v) => crate::modules::float_arg(&[v], 0, "timedelta")?,
                    None => 0.0,
                };
                let hours = match kwarg(&kwargs, "hours") {
                    Some(v) => crate::modules::float_arg(&[v], 0, "timedelta")?,
                    None => 0.0,
                };
                let minutes = match kwarg(&kwargs, "minutes") {
                    Some(v) => crate::modules::float_arg(&[v], 0, "timedelta")?,
                    None => 0.0,
                };
                let total = days * 86_400.0 + hours * 3_600.0 + minutes * 60.0 + seconds;
                Ok(timedelta_object(total))
            })),
        ],
    )
}

/// Wall-clock read, recorded for replay.
fn recorded_now(ctx: &mut Ctx) -> NaiveDateTime {
    if let Some(EventPayload::SideEffect { data, .. }) = ctx.record(
        EventKind::SideEffect,
        EventPayload::SideEffect {
            tag: "datetime.now".into(),
            data: String::new(),
        },
    ) {
        let micros = data.parse::<i64>().unwrap_or(0);
        return chrono::DateTime::from_timestamp_micros(micros)
            .map(|dt| dt.naive_utc())
            .unwrap_or_default();
    }
    let now = Utc::now().naive_utc();
    ctx.amend_last_side_effect(&now.and_utc().timestamp_micros().to_string());
    now
}

fn datetime_object(dt: NaiveDateTime) -> Value {
    let iso = dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
    let strftime_dt = dt;
    module_value(
        "datetime.datetime",
        vec![
            ("year", Value::Int(i64::from(dt.year()))),
            ("month", Value::Int(i64::from(dt.month()))),
            ("day", Value::Int(i64::from(dt.day()))),
            ("hour", Value::Int(i64::from(dt.hour()))),
            ("minute", Value::Int(i64::from(dt.minute()))),
            ("second", Value::Int(i64::from(dt.second()))),
            ("microsecond", Value::Int(i64::from(dt.and_utc().timestamp_subsec_micros()))),
            ("isoformat", native("isoformat", move |_args| {
                Ok(Value::str(iso.clone()))
            })),
            ("strftime", native("strftime", move |args| {
                let fmt = crate::modules::str_arg(&args, 0, "strftime")?;
                Ok(Value::str(strftime_dt.format(&fmt).to_string()))
            })),
            ("timestamp", native("timestamp", move |_args| {
                Ok(Value::Float(dt.and_utc().timestamp_micros() as f64 / 1e6))
            })),
            ("weekday", native("weekday", move |_args| {
                Ok(Value::Int(i64::from(dt.weekday().num_days_from_monday())))
            })),
        ],
    )
}

fn date_object(date: NaiveDate) -> Value {
    let iso = date.format("%Y-%m-%d").to_string();
    module_value(
        "datetime.date",
        vec![
            ("year", Value::Int(i64::from(date.year()))),
            ("month", Value::Int(i64::from(date.month()))),
            ("day", Value::Int(i64::from(date.day()))),
            ("isoformat", native("isoformat", move |_args| {
                Ok(Value::str(iso.clone()))
            })),
        ],
    )
}

fn timedelta_object(total_seconds: f64) -> Value {
    module_value(
        "datetime.timedelta",
        vec![
            ("days", Value::Int((total_seconds / 86_400.0).trunc() as i64)),
            ("seconds", Value::Int((total_seconds % 86_400.0).trunc() as i64)),
            ("total_seconds", native("total_seconds", move |_args| {
                Ok(Value::Float(total_seconds))
            })),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::module_attr;

    #[test]
    fn fromtimestamp_fields() {
        let module = module();
        let datetime_class = module_attr(&module, "datetime").expect("datetime class");
        let from_ts = module_attr(&datetime_class, "fromtimestamp").expect("fromtimestamp");
        let Value::Native(f) = from_ts else { panic!("expected native") };
        let mut ctx = Ctx::default();
        let result = (f.f)(vec![Value::Float(1_699_900_000.0)], vec![], &mut ctx).unwrap();
        let crate::builtins::Outcome::Value(dt) = result else { panic!("expected value") };
        assert!(matches!(module_attr(&dt, "year"), Some(Value::Int(2023))));
        assert!(matches!(module_attr(&dt, "month"), Some(Value::Int(11))));
    }
}
