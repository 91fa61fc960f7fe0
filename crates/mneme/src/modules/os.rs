//! The `os` module, synthesized from the context: only the sandboxed
//! surface (environ, getenv, path helpers, listdir) exists.

use crate::{
    context::Ctx,
    exception::Exception,
    modules::{module_value, native, native_ctx, str_arg},
    types::Dict,
    value::Value,
};

pub(crate) fn module(ctx: &Ctx) -> Value {
    let mut environ = Dict::new();
    for (k, v) in &ctx.environ {
        // context construction guarantees string keys, so this cannot fail
        let _ = environ.insert(Value::str(k.clone()), Value::str(v.clone()));
    }
    let environ_value = Value::dict(environ);
    let getenv_environ = environ_value.clone();

    module_value(
        "os",
        vec![
            ("environ", environ_value),
            ("getenv", native("getenv", move |args| {
                let name = str_arg(&args, 0, "getenv")?;
                let default = args.get(1).cloned().unwrap_or(Value::None);
                let Value::Dict(environ) = &getenv_environ else {
                    return Ok(default);
                };
                Ok(environ
                    .borrow()
                    .get(&Value::str(name))?
                    .cloned()
                    .unwrap_or(default))
            })),
            ("listdir", native_ctx("listdir", |args, _kwargs, ctx| {
                let path = match args.first() {
                    Some(Value::Str(s)) => s.to_string(),
                    _ => ".".to_string(),
                };
                let names = ctx.list_dir(&path)?;
                Ok(Value::list(names.into_iter().map(Value::str).collect()))
            })),
            ("getcwd", native("getcwd", |_args| Ok(Value::str("/")))),
            ("path", module_value(
                "os.path",
                vec![
                    ("join", native("join", |args| {
                        let mut out = String::new();
                        for i in 0..args.len() {
                            let part = str_arg(&args, i, "join")?;
                            if part.starts_with('/') {
                                out = part;
                            } else {
                                if !out.is_empty() && !out.ends_with('/') {
                                    out.push('/');
                                }
                                out.push_str(&part);
                            }
                        }
                        Ok(Value::str(out))
                    })),
                    ("basename", native("basename", |args| {
                        let path = str_arg(&args, 0, "basename")?;
                        Ok(Value::str(path.rsplit('/').next().unwrap_or("").to_string()))
                    })),
                    ("dirname", native("dirname", |args| {
                        let path = str_arg(&args, 0, "dirname")?;
                        Ok(Value::str(path.rsplit_once('/').map_or("", |(d, _)| d).to_string()))
                    })),
                    ("splitext", native("splitext", |args| {
                        let path = str_arg(&args, 0, "splitext")?;
                        let base = path.rsplit('/').next().unwrap_or(&path);
                        let (stem, ext) = match base.rfind('.') {
                            Some(pos) if pos > 0 => {
                                let split = path.len() - (base.len() - pos);
                                (path[..split].to_string(), path[split..].to_string())
                            }
                            _ => (path.clone(), String::new()),
                        };
                        Ok(Value::tuple(vec![Value::str(stem), Value::str(ext)]))
                    })),
                    ("exists", native_ctx("exists", |args, _kwargs, ctx| {
                        let path = match args.first() {
                            Some(Value::Str(s)) => s.to_string(),
                            _ => return Err(Exception::type_error("exists() argument must be str")),
                        };
                        let found = ctx.fs_read(&path).is_ok();
                        Ok(Value::Bool(found))
                    })),
                ],
            )),
        ],
    )
}
