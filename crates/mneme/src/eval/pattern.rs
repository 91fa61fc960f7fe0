//! Structural pattern matching for `match`/`case`.
//!
//! Patterns bind their captures into the surrounding scope as they match,
//! like CPython (bindings from a partially-matched case may persist).

use crate::{
    ast::{Pattern, Singleton},
    builtins::isinstance,
    env::Env,
    eval::{binop::is_identical, Flow, Interp},
    exception::{Exception, Signal},
    types::Dict,
    value::Value,
};

impl Interp<'_> {
    pub(crate) fn match_pattern(&mut self, pattern: &Pattern, subject: &Value, env: &mut Env) -> Flow<bool> {
        match pattern {
            Pattern::Wildcard => Ok(true),
            Pattern::Capture { name, pattern } => {
                if let Some(inner) = pattern {
                    if !self.match_pattern(inner, subject, env)? {
                        return Ok(false);
                    }
                }
                env.put(name, subject.clone());
                Ok(true)
            }
            Pattern::Value(expr) => {
                let expected = self.eval(expr, env)?;
                self.values_equal(subject, &expected, env)
            }
            Pattern::Singleton(singleton) => {
                let expected = match singleton {
                    Singleton::None => Value::None,
                    Singleton::True => Value::Bool(true),
                    Singleton::False => Value::Bool(false),
                };
                Ok(is_identical(subject, &expected))
            }
            Pattern::Sequence(patterns) => self.match_sequence(patterns, subject, env),
            Pattern::Star(_) => Err(Signal::from(Exception::syntax_error(
                "starred pattern outside a sequence pattern",
            ))),
            Pattern::Mapping { keys, patterns, rest } => {
                let Value::Dict(dict) = subject else {
                    return Ok(false);
                };
                let mut matched_keys = Vec::with_capacity(keys.len());
                for (key_expr, sub_pattern) in keys.iter().zip(patterns) {
                    let key = self.eval(key_expr, env)?;
                    let found = dict.borrow().get(&key).map_err(Signal::from)?.cloned();
                    let Some(value) = found else {
                        return Ok(false);
                    };
                    if !self.match_pattern(sub_pattern, &value, env)? {
                        return Ok(false);
                    }
                    matched_keys.push(key);
                }
                if let Some(rest_name) = rest {
                    let mut remaining = Dict::new();
                    let snapshot = dict.borrow().clone();
                    for (k, v) in snapshot.iter() {
                        let consumed = matched_keys.iter().any(|mk| {
                            crate::value::py_eq(mk, k)
                        });
                        if !consumed {
                            remaining.insert(k.clone(), v.clone()).map_err(Signal::from)?;
                        }
                    }
                    env.put(rest_name, Value::dict(remaining));
                }
                Ok(true)
            }
            Pattern::Class {
                cls,
                positional,
                keyword,
            } => self.match_class(cls, positional, keyword, subject, env),
            Pattern::Or(patterns) => {
                for alternative in patterns {
                    if self.match_pattern(alternative, subject, env)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn match_sequence(&mut self, patterns: &[Pattern], subject: &Value, env: &mut Env) -> Flow<bool> {
        // strings are sequences but are excluded from sequence patterns
        let items: Vec<Value> = match subject {
            Value::List(items) => items.borrow().clone(),
            Value::Tuple(items) => items.to_vec(),
            _ => return Ok(false),
        };
        let star_pos = patterns.iter().position(|p| matches!(p, Pattern::Star(_)));
        match star_pos {
            None => {
                if items.len() != patterns.len() {
                    return Ok(false);
                }
                for (sub_pattern, item) in patterns.iter().zip(&items) {
                    if !self.match_pattern(sub_pattern, item, env)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Some(star) => {
                let fixed = patterns.len() - 1;
                if items.len() < fixed {
                    return Ok(false);
                }
                let tail_count = patterns.len() - star - 1;
                let middle_end = items.len() - tail_count;
                for (sub_pattern, item) in patterns[..star].iter().zip(&items[..star]) {
                    if !self.match_pattern(sub_pattern, item, env)? {
                        return Ok(false);
                    }
                }
                if let Pattern::Star(Some(name)) = &patterns[star] {
                    env.put(name, Value::list(items[star..middle_end].to_vec()));
                }
                for (sub_pattern, item) in patterns[star + 1..].iter().zip(&items[middle_end..]) {
                    if !self.match_pattern(sub_pattern, item, env)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn match_class(
        &mut self,
        cls: &crate::ast::ExprNode,
        positional: &[Pattern],
        keyword: &[(String, Pattern)],
        subject: &Value,
        env: &mut Env,
    ) -> Flow<bool> {
        let class_value = self.eval(cls, env)?;
        if !isinstance(subject, &class_value).map_err(Signal::from)? {
            return Ok(false);
        }
        if !positional.is_empty() {
            match &class_value {
                // builtin type patterns like `int(x)` match the subject itself
                Value::Builtin(_) => {
                    if positional.len() > 1 {
                        return Err(Signal::from(Exception::type_error(
                            "builtin type patterns accept at most 1 positional sub-pattern",
                        )));
                    }
                    if !self.match_pattern(&positional[0], subject, env)? {
                        return Ok(false);
                    }
                }
                Value::Class(class) => {
                    let match_args = crate::value::class_lookup(class, "__match_args__");
                    let Some(Value::Tuple(attr_names)) = match_args else {
                        return Err(Signal::from(Exception::type_error(format!(
                            "{}() accepts 0 positional sub-patterns",
                            class.name
                        ))));
                    };
                    if positional.len() > attr_names.len() {
                        return Err(Signal::from(Exception::type_error(format!(
                            "{}() accepts {} positional sub-patterns ({} given)",
                            class.name,
                            attr_names.len(),
                            positional.len()
                        ))));
                    }
                    for (sub_pattern, attr_name) in positional.iter().zip(attr_names.iter()) {
                        let Value::Str(attr_name) = attr_name else {
                            return Err(Signal::from(Exception::type_error(
                                "__match_args__ elements must be strings",
                            )));
                        };
                        let attr_value = self.get_attr(subject, attr_name, env)?;
                        if !self.match_pattern(sub_pattern, &attr_value, env)? {
                            return Ok(false);
                        }
                    }
                }
                _ => {
                    return Err(Signal::from(Exception::type_error(
                        "called match pattern must be a type",
                    )));
                }
            }
        }
        for (attr_name, sub_pattern) in keyword {
            let attr_value = self.get_attr(subject, attr_name, env)?;
            if !self.match_pattern(sub_pattern, &attr_value, env)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
