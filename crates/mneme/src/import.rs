//! Module resolution.
//!
//! Resolution order for the root segment: host-supplied modules, the stdlib
//! registry, then the context's filesystem (`name.py`, compiled and executed
//! as a module, cached for the run). Dotted names walk nested mapping
//! values after the root resolves.

use indexmap::IndexMap;

use crate::{
    context::HostModule,
    env::Env,
    eval::{Flow, Interp},
    exception::{ExcType, Exception, Signal},
    value::{ModuleValue, Value},
};

pub(crate) fn resolve_module(interp: &mut Interp, name: &str, env: &mut Env) -> Flow<Value> {
    let _ = env;
    let mut segments = name.split('.');
    let root = segments.next().unwrap_or(name);
    let mut value = resolve_root(interp, root)?;
    let mut walked = root.to_string();
    for segment in segments {
        walked.push('.');
        walked.push_str(segment);
        value = match module_attr(&value, segment) {
            Some(next) if is_mapping(&next) => next,
            _ => {
                return Err(Signal::from(Exception::module_not_found(format!(
                    "No module named '{walked}'"
                ))));
            }
        };
    }
    Ok(value)
}

/// Attribute lookup against a module-protocol mapping.
pub(crate) fn module_attr(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::Module(module) => module.attrs.borrow().get(name).cloned(),
        Value::Dict(dict) => dict.borrow().get(&Value::str(name)).ok().flatten().cloned(),
        _ => None,
    }
}

fn is_mapping(value: &Value) -> bool {
    matches!(value, Value::Module(_) | Value::Dict(_))
}

fn resolve_root(interp: &mut Interp, root: &str) -> Flow<Value> {
    // (a) host-supplied modules win over everything
    if let Some(host_module) = interp.ctx.host_modules.get(root) {
        return Ok(match host_module {
            HostModule::Value(v) => v.clone(),
            HostModule::Provider(provider) => provider.module_value(),
        });
    }
    // (b) the stdlib registry
    if let Some(module) = crate::modules::resolve(interp, root) {
        return Ok(module);
    }
    // (c) filesystem modules, cached per run
    if let Some(cached) = interp.ctx.imported_modules.get(root) {
        return Ok(cached.clone());
    }
    let path = format!("{root}.py");
    match interp.ctx.fs_read(&path) {
        Ok(source) => {
            let module = execute_module_source(interp, root, &source)?;
            interp
                .ctx
                .imported_modules
                .insert(root.to_string(), module.clone());
            Ok(module)
        }
        Err(_) => Err(Signal::from(Exception::module_not_found(not_found_message(root)))),
    }
}

/// Compiles and evaluates a filesystem module in a fresh scope seeded only
/// by the builtins; its non-dunder bindings become the module value.
fn execute_module_source(interp: &mut Interp, name: &str, source: &str) -> Flow<Value> {
    let ast = crate::parse::parse(source).map_err(|exc| {
        Signal::from(Exception::new(
            ExcType::SyntaxError,
            format!("error in '{name}': {}", exc.message),
        ))
    })?;
    let mut module_env = Env::new_module();
    match interp.run_module(&ast, &mut module_env) {
        Ok(_) => {}
        Err(Signal::Raise(exc)) => {
            return Err(Signal::from(Exception::import_error(format!(
                "error in '{name}': {exc}"
            ))));
        }
        Err(other) => return Err(other),
    }
    let attrs: IndexMap<String, Value> = module_env
        .all_bindings()
        .into_iter()
        .filter(|(binding, _)| !binding.starts_with("__"))
        .collect();
    Ok(Value::Module(ModuleValue::new(name, attrs)))
}

/// `ModuleNotFoundError` text, with redirect hints for modules this sandbox
/// intentionally replaces.
fn not_found_message(name: &str) -> String {
    match name {
        "urllib" | "urllib3" | "http" | "httplib" => {
            format!("No module named '{name}'; use 'requests' for HTTP")
        }
        "sys" => "No module named 'sys'; environment access is available via 'os'".to_string(),
        "subprocess" | "socket" | "ctypes" => {
            format!("No module named '{name}'; it is not available in this sandbox")
        }
        _ => format!("No module named '{name}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_redirect_known_modules() {
        assert!(not_found_message("urllib").contains("requests"));
        assert!(not_found_message("sys").contains("os"));
        assert_eq!(not_found_message("numpy"), "No module named 'numpy'");
    }
}
