//! Classes, instances and the attribute protocol.

use std::rc::Rc;

use crate::{
    ast::{ExprNode, Stmt},
    builtins::Builtin,
    env::Env,
    eval::{Flow, Interp},
    exception::{Exception, Signal},
    methods,
    types::DictFlavor,
    value::{class_lookup_after, class_lookup_with_origin, type_name, ClassObj, Value},
};

impl Interp<'_> {
    /// `class Name(bases...):` — evaluates the body against a fresh scope to
    /// collect class attributes, then builds the class object.
    pub(crate) fn make_class(
        &mut self,
        name: &str,
        bases: &[ExprNode],
        body: &[Stmt],
        env: &mut Env,
    ) -> Flow<Value> {
        let mut base_values = Vec::with_capacity(bases.len());
        for base in bases {
            let base_value = self.eval(base, env)?;
            match &base_value {
                Value::Class(_) => {}
                Value::Builtin(b) if b.is_type() => {}
                other => {
                    return Err(Signal::from(Exception::type_error(format!(
                        "class base must be a class, not '{}'",
                        type_name(other)
                    ))));
                }
            }
            base_values.push(base_value);
        }
        env.push_scope();
        let body_result = self.exec_block(body, env);
        let attrs = env.top_bindings();
        env.pop_scope();
        body_result?;
        Ok(Value::Class(Rc::new(ClassObj {
            name: name.to_string(),
            bases: base_values,
            attrs: std::cell::RefCell::new(attrs),
        })))
    }

    /// Attribute read on any value.
    pub(crate) fn get_attr(&mut self, obj: &Value, name: &str, env: &mut Env) -> Flow<Value> {
        let _ = env;
        match obj {
            Value::Instance(inst) => {
                if name == "__class__" {
                    return Ok(Value::Class(inst.borrow().class.clone()));
                }
                if let Some(v) = inst.borrow().attrs.get(name) {
                    return Ok(v.clone());
                }
                let class = inst.borrow().class.clone();
                match class_lookup_with_origin(&class, name) {
                    Some((Value::Function(func), origin)) => Ok(Value::BoundMethod {
                        recv: Box::new(obj.clone()),
                        func,
                        def_class: Some(origin),
                    }),
                    Some((other, _)) => Ok(other),
                    None => Err(Signal::from(Exception::attribute_error(format!(
                        "'{}' object has no attribute '{name}'",
                        class.name
                    )))),
                }
            }
            Value::Class(class) => {
                if name == "__name__" {
                    return Ok(Value::str(class.name.clone()));
                }
                match class_lookup_with_origin(class, name) {
                    Some((v, _)) => Ok(v),
                    None => Err(Signal::from(Exception::attribute_error(format!(
                        "type object '{}' has no attribute '{name}'",
                        class.name
                    )))),
                }
            }
            Value::Super { class, instance } => {
                let start = instance.borrow().class.clone();
                match class_lookup_after(&start, class, name) {
                    Some((Value::Function(func), origin)) => Ok(Value::BoundMethod {
                        recv: Box::new(Value::Instance(instance.clone())),
                        func,
                        def_class: Some(origin),
                    }),
                    Some((other, _)) => Ok(other),
                    // exception bases are builtin kinds outside the class MRO;
                    // their __init__ stores the constructor args
                    None if name == "__init__" && crate::value::class_exc_base(&start).is_some() => {
                        let target = instance.clone();
                        Ok(Value::Native(crate::value::NativeFn::new(
                            "__init__",
                            move |args, _kwargs, _ctx| {
                                target
                                    .borrow_mut()
                                    .attrs
                                    .insert("args".to_string(), Value::tuple(args));
                                Ok(crate::builtins::Outcome::Value(Value::None))
                            },
                        )))
                    }
                    None => Err(Signal::from(Exception::attribute_error(format!(
                        "'super' object has no attribute '{name}'"
                    )))),
                }
            }
            Value::Module(module) => {
                if name == "__name__" {
                    return Ok(Value::str(module.name.clone()));
                }
                module.attrs.borrow().get(name).cloned().ok_or_else(|| {
                    Signal::from(Exception::attribute_error(format!(
                        "module '{}' has no attribute '{name}'",
                        module.name
                    )))
                })
            }
            Value::Exc(exc) => match name {
                "args" => Ok(Value::tuple(exc.args.clone())),
                _ => Err(Signal::from(Exception::attribute_error(format!(
                    "'{}' object has no attribute '{name}'",
                    exc.kind
                )))),
            },
            Value::Dict(dict) if name == "default_factory" && dict.borrow().flavor() == DictFlavor::DefaultDict => {
                Ok(dict.borrow().default_factory.clone().unwrap_or(Value::None))
            }
            Value::Builtin(Builtin::Exc(_)) => Err(Signal::from(Exception::attribute_error(format!(
                "type object '{}' has no attribute '{name}'",
                match obj {
                    Value::Builtin(b) => b.name(),
                    _ => "?",
                }
            )))),
            other => match methods::lookup(other, name) {
                Some(method) => Ok(Value::Method {
                    recv: Box::new(other.clone()),
                    method,
                }),
                None => Err(Signal::from(Exception::attribute_error(format!(
                    "'{}' object has no attribute '{name}'",
                    type_name(other)
                )))),
            },
        }
    }

    /// Attribute write.
    pub(crate) fn set_attr(&mut self, obj: &Value, name: &str, value: Value) -> Flow<()> {
        match obj {
            Value::Instance(inst) => {
                inst.borrow_mut().attrs.insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(class) => {
                class.attrs.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Module(module) => {
                module.attrs.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            other => Err(Signal::from(Exception::attribute_error(format!(
                "'{}' object has no attribute '{name}'",
                type_name(other)
            )))),
        }
    }

    /// Attribute deletion.
    pub(crate) fn del_attr(&mut self, obj: &Value, name: &str) -> Flow<()> {
        match obj {
            Value::Instance(inst) => {
                if inst.borrow_mut().attrs.shift_remove(name).is_some() {
                    Ok(())
                } else {
                    let class = inst.borrow().class.name.clone();
                    Err(Signal::from(Exception::attribute_error(format!(
                        "'{class}' object has no attribute '{name}'"
                    ))))
                }
            }
            Value::Class(class) => {
                if class.attrs.borrow_mut().shift_remove(name).is_some() {
                    Ok(())
                } else {
                    Err(Signal::from(Exception::attribute_error(format!(
                        "type object '{}' has no attribute '{name}'",
                        class.name
                    ))))
                }
            }
            other => Err(Signal::from(Exception::attribute_error(format!(
                "'{}' object has no attribute '{name}'",
                type_name(other)
            )))),
        }
    }
}
