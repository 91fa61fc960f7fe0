//! The `random` module, driven by the context's seeded ChaCha RNG. Draws
//! are deterministic per seed, so no replay events are needed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{
    eval::iter::concrete_values,
    exception::Exception,
    modules::{float_arg, int_arg, module_value, native_ctx},
    value::{type_name, Value},
};

pub(crate) fn module() -> Value {
    module_value(
        "random",
        vec![
            ("random", native_ctx("random", |_args, _kwargs, ctx| {
                Ok(Value::Float(ctx.rng.r#gen::<f64>()))
            })),
            ("seed", native_ctx("seed", |args, _kwargs, ctx| {
                let seed = match args.first() {
                    Some(Value::Int(i)) => *i as u64,
                    Some(Value::Bool(b)) => u64::from(*b),
                    _ => 0,
                };
                ctx.rng = ChaCha20Rng::seed_from_u64(seed);
                Ok(Value::None)
            })),
            ("randint", native_ctx("randint", |args, _kwargs, ctx| {
                let a = int_arg(&args, 0, "randint")?;
                let b = int_arg(&args, 1, "randint")?;
                if a > b {
                    return Err(Exception::value_error("empty range for randrange()"));
                }
                Ok(Value::Int(ctx.rng.gen_range(a..=b)))
            })),
            ("randrange", native_ctx("randrange", |args, _kwargs, ctx| {
                let (start, stop) = match args.len() {
                    1 => (0, int_arg(&args, 0, "randrange")?),
                    _ => (int_arg(&args, 0, "randrange")?, int_arg(&args, 1, "randrange")?),
                };
                if start >= stop {
                    return Err(Exception::value_error("empty range for randrange()"));
                }
                Ok(Value::Int(ctx.rng.gen_range(start..stop)))
            })),
            ("uniform", native_ctx("uniform", |args, _kwargs, ctx| {
                let a = float_arg(&args, 0, "uniform")?;
                let b = float_arg(&args, 1, "uniform")?;
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                Ok(Value::Float(lo + ctx.rng.r#gen::<f64>() * (hi - lo)))
            })),
            ("choice", native_ctx("choice", |args, _kwargs, ctx| {
                let seq = args
                    .first()
                    .ok_or_else(|| Exception::type_error("choice() missing 1 required argument"))?;
                let Some(items) = concrete_values(seq, ctx)? else {
                    return Err(Exception::type_error(format!(
                        "'{}' object is not iterable",
                        type_name(seq)
                    )));
                };
                if items.is_empty() {
                    return Err(Exception::index_error("Cannot choose from an empty sequence"));
                }
                let pick = ctx.rng.gen_range(0..items.len());
                Ok(items[pick].clone())
            })),
            ("shuffle", native_ctx("shuffle", |args, _kwargs, ctx| {
                let Some(Value::List(items)) = args.first() else {
                    return Err(Exception::type_error("shuffle() argument must be a list"));
                };
                let mut items = items.borrow_mut();
                // Fisher-Yates with the context RNG
                for i in (1..items.len()).rev() {
                    let j = ctx.rng.gen_range(0..=i);
                    items.swap(i, j);
                }
                Ok(Value::None)
            })),
        ],
    )
}
