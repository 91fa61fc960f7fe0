//! Conversion from the external parser's AST to the interpreter's own.
//!
//! The external parser (ruff) is the boundary: everything the evaluator sees
//! comes out of this module. Conversion also rejects the source forms this
//! interpreter does not execute (async, template strings, star-imports) with
//! `SyntaxError`s carrying source lines.

use std::rc::Rc;

use ruff_python_ast::{
    self as ast, BoolOp as AstBoolOp, CmpOp as AstCmpOp, ConversionFlag as RuffConversionFlag,
    ElifElseClause, Expr as AstExpr, InterpolatedStringElement, Keyword, Number,
    Operator as AstOperator, ParameterWithDefault, Stmt as AstStmt, UnaryOp as AstUnaryOp,
};
use ruff_python_parser::parse_module;
use ruff_text_size::{Ranged, TextRange};

use crate::{
    ast::{
        Ast, BinOp, BoolOp, CmpOp, Comprehension, Conversion, DictItem, ExceptHandler, ExprKind,
        ExprNode, FStringPart, FormatSpecAst, FuncDef, Literal, MatchCase, Param, Params, Pattern,
        Singleton, Stmt, StmtKind, Target, UnaryOp,
    },
    builtins::parse_int_str,
    exception::Exception,
    value::Value,
};

/// Maximum nesting depth for AST structures during conversion, preventing
/// host stack overflow on pathological inputs like `((((…))))`.
const MAX_NESTING_DEPTH: u16 = 200;

/// Parses source text into the interpreter's AST.
pub(crate) fn parse(source: &str) -> Result<Ast, Exception> {
    let mut parser = Parser::new(source);
    let parsed = parse_module(source).map_err(|e| {
        let line = parser.line_of(e.range());
        Exception::syntax_error(e.to_string()).at_line(line)
    })?;
    let module = parsed.into_syntax();
    let body = parser.parse_statements(module.body.to_vec())?;
    Ok(Ast { body })
}

struct Parser<'a> {
    code: &'a str,
    /// Byte offset of the start of each line.
    line_starts: Vec<usize>,
    depth_remaining: u16,
}

impl<'a> Parser<'a> {
    fn new(code: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in code.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            code,
            line_starts,
            depth_remaining: MAX_NESTING_DEPTH,
        }
    }

    /// 1-based source line of a range's start.
    fn line_of(&self, range: TextRange) -> u32 {
        let offset = usize::from(range.start());
        let line = self.line_starts.partition_point(|start| *start <= offset);
        line as u32
    }

    fn syntax_err(&self, message: impl Into<String>, range: TextRange) -> Exception {
        Exception::syntax_error(message).at_line(self.line_of(range))
    }

    fn descend(&mut self, range: TextRange) -> Result<(), Exception> {
        match self.depth_remaining.checked_sub(1) {
            Some(left) => {
                self.depth_remaining = left;
                Ok(())
            }
            None => Err(self.syntax_err("too many nested expressions", range)),
        }
    }

    fn parse_statements(&mut self, statements: Vec<AstStmt>) -> Result<Vec<Stmt>, Exception> {
        statements.into_iter().map(|s| self.parse_statement(s)).collect()
    }

    fn parse_statement(&mut self, statement: AstStmt) -> Result<Stmt, Exception> {
        self.descend(statement.range())?;
        let result = self.parse_statement_impl(statement);
        self.depth_remaining += 1;
        result
    }

    fn parse_statement_impl(&mut self, statement: AstStmt) -> Result<Stmt, Exception> {
        let line = self.line_of(statement.range());
        let kind = match statement {
            AstStmt::FunctionDef(function) => {
                if function.is_async {
                    return Err(self.syntax_err("async functions are not supported", function.range));
                }
                let params = self.parse_parameters(&function.parameters)?;
                let decorators = function
                    .decorator_list
                    .into_iter()
                    .map(|d| self.parse_expression(d.expression))
                    .collect::<Result<Vec<_>, _>>()?;
                let body = self.parse_statements(function.body.to_vec())?;
                let is_generator = body_has_yield(&body);
                StmtKind::FunctionDef(Rc::new(FuncDef {
                    name: function.name.id.to_string(),
                    params,
                    body,
                    decorators,
                    is_generator,
                    line,
                }))
            }
            AstStmt::ClassDef(class) => {
                let bases = match &class.arguments {
                    Some(arguments) => arguments
                        .args
                        .iter()
                        .map(|arg| self.parse_expression(arg.clone()))
                        .collect::<Result<Vec<_>, _>>()?,
                    None => Vec::new(),
                };
                let decorators = class
                    .decorator_list
                    .into_iter()
                    .map(|d| self.parse_expression(d.expression))
                    .collect::<Result<Vec<_>, _>>()?;
                let body = self.parse_statements(class.body.to_vec())?;
                StmtKind::ClassDef {
                    name: class.name.id.to_string(),
                    bases,
                    body,
                    decorators,
                }
            }
            AstStmt::Return(ast::StmtReturn { value, .. }) => StmtKind::Return(match value {
                Some(value) => Some(self.parse_expression(*value)?),
                None => None,
            }),
            AstStmt::Delete(ast::StmtDelete { targets, .. }) => {
                let targets = targets
                    .into_iter()
                    .map(|t| self.parse_target(t))
                    .collect::<Result<Vec<_>, _>>()?;
                StmtKind::Del(targets)
            }
            AstStmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                let targets = targets
                    .into_iter()
                    .map(|t| self.parse_target(t))
                    .collect::<Result<Vec<_>, _>>()?;
                StmtKind::Assign {
                    targets,
                    value: self.parse_expression(*value)?,
                }
            }
            AstStmt::AugAssign(ast::StmtAugAssign { target, op, value, .. }) => StmtKind::AugAssign {
                target: self.parse_target(*target)?,
                op: convert_op(op),
                value: self.parse_expression(*value)?,
            },
            AstStmt::AnnAssign(ast::StmtAnnAssign { target, value, .. }) => StmtKind::AnnAssign {
                target: self.parse_target(*target)?,
                value: match value {
                    Some(v) => Some(self.parse_expression(*v)?),
                    None => None,
                },
            },
            AstStmt::For(ast::StmtFor {
                is_async,
                target,
                iter,
                body,
                orelse,
                range,
                ..
            }) => {
                if is_async {
                    return Err(self.syntax_err("async for is not supported", range));
                }
                StmtKind::For {
                    target: self.parse_target(*target)?,
                    iter: self.parse_expression(*iter)?,
                    body: self.parse_statements(body.to_vec())?,
                    orelse: self.parse_statements(orelse.to_vec())?,
                }
            }
            AstStmt::While(ast::StmtWhile { test, body, orelse, .. }) => StmtKind::While {
                test: self.parse_expression(*test)?,
                body: self.parse_statements(body.to_vec())?,
                orelse: self.parse_statements(orelse.to_vec())?,
            },
            AstStmt::If(ast::StmtIf {
                test,
                body,
                elif_else_clauses,
                ..
            }) => {
                let test = self.parse_expression(*test)?;
                let body = self.parse_statements(body.to_vec())?;
                let orelse = self.parse_elif_else_clauses(elif_else_clauses)?;
                StmtKind::If { test, body, orelse }
            }
            AstStmt::With(ast::StmtWith {
                is_async,
                items,
                body,
                range,
                ..
            }) => {
                if is_async {
                    return Err(self.syntax_err("async with is not supported", range));
                }
                // multiple items nest inward: `with a, b:` == `with a: with b:`
                let mut body = self.parse_statements(body.to_vec())?;
                let mut items: Vec<_> = items.into_iter().collect();
                while items.len() > 1 {
                    let item = items.pop().unwrap_or_else(|| unreachable!("len checked"));
                    let context = self.parse_expression(item.context_expr)?;
                    let target = match item.optional_vars {
                        Some(var) => Some(self.parse_target(*var)?),
                        None => None,
                    };
                    body = vec![Stmt {
                        line,
                        kind: StmtKind::With { context, target, body },
                    }];
                }
                let item = items
                    .pop()
                    .ok_or_else(|| self.syntax_err("with statement with no items", range))?;
                StmtKind::With {
                    context: self.parse_expression(item.context_expr)?,
                    target: match item.optional_vars {
                        Some(var) => Some(self.parse_target(*var)?),
                        None => None,
                    },
                    body,
                }
            }
            AstStmt::Match(m) => {
                let subject = self.parse_expression(*m.subject)?;
                let cases = m
                    .cases
                    .into_iter()
                    .map(|case| {
                        Ok(MatchCase {
                            pattern: self.parse_pattern(case.pattern)?,
                            guard: match case.guard {
                                Some(g) => Some(self.parse_expression(*g)?),
                                None => None,
                            },
                            body: self.parse_statements(case.body.to_vec())?,
                        })
                    })
                    .collect::<Result<Vec<_>, Exception>>()?;
                StmtKind::Match { subject, cases }
            }
            AstStmt::Raise(ast::StmtRaise { exc, cause, .. }) => StmtKind::Raise {
                exc: match exc {
                    Some(e) => Some(self.parse_expression(*e)?),
                    None => None,
                },
                cause: match cause {
                    Some(c) => Some(self.parse_expression(*c)?),
                    None => None,
                },
            },
            AstStmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                is_star,
                range,
                ..
            }) => {
                if is_star {
                    return Err(self.syntax_err("except* is not supported", range));
                }
                let body = self.parse_statements(body.to_vec())?;
                let handlers = handlers
                    .into_iter()
                    .map(|h| self.parse_except_handler(h))
                    .collect::<Result<Vec<_>, _>>()?;
                StmtKind::Try {
                    body,
                    handlers,
                    orelse: self.parse_statements(orelse.to_vec())?,
                    finally: self.parse_statements(finalbody.to_vec())?,
                }
            }
            AstStmt::Assert(ast::StmtAssert { test, msg, .. }) => StmtKind::Assert {
                test: self.parse_expression(*test)?,
                msg: match msg {
                    Some(m) => Some(self.parse_expression(*m)?),
                    None => None,
                },
            },
            AstStmt::Import(ast::StmtImport { names, range, .. }) => {
                if names.len() != 1 {
                    return Err(self.syntax_err(
                        "multi-module import statements are not supported; use one import per line",
                        range,
                    ));
                }
                let alias = &names[0];
                let module = alias.name.as_str().to_string();
                // `import pkg.mod` binds `pkg`; an alias binds the alias
                let binding = match &alias.asname {
                    Some(asname) => asname.id.to_string(),
                    None => module.split('.').next().unwrap_or(&module).to_string(),
                };
                StmtKind::Import { module, binding }
            }
            AstStmt::ImportFrom(ast::StmtImportFrom {
                module,
                names,
                level,
                range,
                ..
            }) => {
                if level != 0 {
                    return Err(self.syntax_err(
                        "attempted relative import with no known parent package",
                        range,
                    ));
                }
                let Some(module) = module else {
                    return Err(self.syntax_err(
                        "attempted relative import with no known parent package",
                        range,
                    ));
                };
                let names = names
                    .iter()
                    .map(|alias| {
                        if alias.name.as_str() == "*" {
                            return Err(self.syntax_err(
                                "wildcard imports (`from ... import *`) are not supported",
                                range,
                            ));
                        }
                        let export = alias.name.as_str().to_string();
                        let binding = alias
                            .asname
                            .as_ref()
                            .map_or_else(|| export.clone(), |a| a.id.to_string());
                        Ok((export, binding))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                StmtKind::FromImport {
                    module: module.as_str().to_string(),
                    names,
                }
            }
            AstStmt::Global(ast::StmtGlobal { names, .. }) => {
                StmtKind::Global(names.iter().map(|n| n.id.to_string()).collect())
            }
            AstStmt::Nonlocal(ast::StmtNonlocal { names, .. }) => {
                StmtKind::Nonlocal(names.iter().map(|n| n.id.to_string()).collect())
            }
            AstStmt::Expr(ast::StmtExpr { value, .. }) => StmtKind::Expr(self.parse_expression(*value)?),
            AstStmt::Pass(_) => StmtKind::Pass,
            AstStmt::Break(_) => StmtKind::Break,
            AstStmt::Continue(_) => StmtKind::Continue,
            AstStmt::TypeAlias(t) => {
                return Err(self.syntax_err("type alias statements are not supported", t.range));
            }
            AstStmt::IpyEscapeCommand(i) => {
                return Err(self.syntax_err("IPython escape commands are not supported", i.range));
            }
        };
        Ok(Stmt { line, kind })
    }

    fn parse_elif_else_clauses(&mut self, clauses: Vec<ElifElseClause>) -> Result<Vec<Stmt>, Exception> {
        let mut tail: Vec<Stmt> = Vec::new();
        for clause in clauses.into_iter().rev() {
            let line = self.line_of(clause.range);
            match clause.test {
                Some(test) => {
                    let test = self.parse_expression(test)?;
                    let body = self.parse_statements(clause.body.to_vec())?;
                    tail = vec![Stmt {
                        line,
                        kind: StmtKind::If { test, body, orelse: tail },
                    }];
                }
                None => {
                    tail = self.parse_statements(clause.body.to_vec())?;
                }
            }
        }
        Ok(tail)
    }

    fn parse_except_handler(&mut self, handler: ast::ExceptHandler) -> Result<ExceptHandler, Exception> {
        let ast::ExceptHandler::ExceptHandler(h) = handler;
        Ok(ExceptHandler {
            exc_type: match h.type_ {
                Some(expr) => Some(self.parse_expression(*expr)?),
                None => None,
            },
            name: h.name.map(|n| n.id.to_string()),
            body: self.parse_statements(h.body.to_vec())?,
        })
    }

    fn parse_parameters(&mut self, params: &ast::Parameters) -> Result<Params, Exception> {
        Ok(Params {
            posonly: self.parse_params_with_defaults(&params.posonlyargs)?,
            args: self.parse_params_with_defaults(&params.args)?,
            vararg: params.vararg.as_ref().map(|p| p.name.id.to_string()),
            kwonly: self.parse_params_with_defaults(&params.kwonlyargs)?,
            kwarg: params.kwarg.as_ref().map(|p| p.name.id.to_string()),
        })
    }

    fn parse_params_with_defaults(&mut self, params: &[ParameterWithDefault]) -> Result<Vec<Param>, Exception> {
        params
            .iter()
            .map(|p| {
                Ok(Param {
                    name: p.parameter.name.id.to_string(),
                    default: match &p.default {
                        Some(expr) => Some(self.parse_expression((**expr).clone())?),
                        None => None,
                    },
                })
            })
            .collect()
    }

    fn parse_target(&mut self, expr: AstExpr) -> Result<Target, Exception> {
        match expr {
            AstExpr::Name(ast::ExprName { id, .. }) => Ok(Target::Name(id.to_string())),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Ok(Target::Attr {
                object: self.parse_expression(*value)?,
                attr: attr.id().to_string(),
            }),
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => Ok(Target::Subscript {
                object: self.parse_expression(*value)?,
                index: self.parse_expression(*slice)?,
            }),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) | AstExpr::List(ast::ExprList { elts, .. }) => {
                let targets = elts
                    .into_iter()
                    .map(|e| self.parse_target(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Target::Tuple(targets))
            }
            AstExpr::Starred(ast::ExprStarred { value, .. }) => {
                Ok(Target::Starred(Box::new(self.parse_target(*value)?)))
            }
            other => Err(self.syntax_err(
                format!("invalid assignment target: {}", expr_kind_name(&other)),
                other.range(),
            )),
        }
    }

    fn parse_expressions(&mut self, exprs: Vec<AstExpr>) -> Result<Vec<ExprNode>, Exception> {
        exprs.into_iter().map(|e| self.parse_expression(e)).collect()
    }

    fn parse_expression(&mut self, expression: AstExpr) -> Result<ExprNode, Exception> {
        self.descend(expression.range())?;
        let result = self.parse_expression_impl(expression);
        self.depth_remaining += 1;
        result
    }

    fn parse_expression_impl(&mut self, expression: AstExpr) -> Result<ExprNode, Exception> {
        let line = self.line_of(expression.range());
        let kind = match expression {
            AstExpr::BoolOp(ast::ExprBoolOp { op, values, .. }) => ExprKind::Bool {
                op: match op {
                    AstBoolOp::And => BoolOp::And,
                    AstBoolOp::Or => BoolOp::Or,
                },
                values: self.parse_expressions(values)?,
            },
            AstExpr::Named(ast::ExprNamed { target, value, range, .. }) => {
                let AstExpr::Name(ast::ExprName { id, .. }) = *target else {
                    return Err(self.syntax_err("invalid walrus target", range));
                };
                ExprKind::Named {
                    name: id.to_string(),
                    value: Box::new(self.parse_expression(*value)?),
                }
            }
            AstExpr::BinOp(ast::ExprBinOp { left, op, right, .. }) => ExprKind::Binary {
                left: Box::new(self.parse_expression(*left)?),
                op: convert_op(op),
                right: Box::new(self.parse_expression(*right)?),
            },
            AstExpr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => ExprKind::Unary {
                op: match op {
                    AstUnaryOp::Not => UnaryOp::Not,
                    AstUnaryOp::USub => UnaryOp::Neg,
                    AstUnaryOp::UAdd => UnaryOp::Pos,
                    AstUnaryOp::Invert => UnaryOp::Invert,
                },
                operand: Box::new(self.parse_expression(*operand)?),
            },
            AstExpr::Lambda(ast::ExprLambda { parameters, body, .. }) => {
                let params = match parameters {
                    Some(p) => self.parse_parameters(&p)?,
                    None => Params::default(),
                };
                ExprKind::Lambda {
                    params,
                    body: Box::new(self.parse_expression(*body)?),
                }
            }
            AstExpr::If(ast::ExprIf { test, body, orelse, .. }) => ExprKind::Ternary {
                test: Box::new(self.parse_expression(*test)?),
                body: Box::new(self.parse_expression(*body)?),
                orelse: Box::new(self.parse_expression(*orelse)?),
            },
            AstExpr::Dict(ast::ExprDict { items, .. }) => {
                let items = items
                    .into_iter()
                    .map(|item| match item.key {
                        Some(key) => Ok(DictItem::Pair {
                            key: self.parse_expression(key)?,
                            value: self.parse_expression(item.value)?,
                        }),
                        None => Ok(DictItem::Unpack(self.parse_expression(item.value)?)),
                    })
                    .collect::<Result<Vec<_>, Exception>>()?;
                ExprKind::Dict(items)
            }
            AstExpr::Set(ast::ExprSet { elts, .. }) => ExprKind::Set(self.parse_expressions(elts)?),
            AstExpr::List(ast::ExprList { elts, .. }) => ExprKind::List(self.parse_expressions(elts)?),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) => ExprKind::Tuple(self.parse_expressions(elts)?),
            AstExpr::Starred(ast::ExprStarred { value, .. }) => {
                ExprKind::Starred(Box::new(self.parse_expression(*value)?))
            }
            AstExpr::ListComp(ast::ExprListComp { elt, generators, .. }) => ExprKind::ListComp {
                elt: Box::new(self.parse_expression(*elt)?),
                generators: self.parse_comprehensions(generators)?,
            },
            AstExpr::SetComp(ast::ExprSetComp { elt, generators, .. }) => ExprKind::SetComp {
                elt: Box::new(self.parse_expression(*elt)?),
                generators: self.parse_comprehensions(generators)?,
            },
            AstExpr::DictComp(ast::ExprDictComp {
                key, value, generators, range, ..
            }) => ExprKind::DictComp {
                key: Box::new(self.parse_expression(
                    *key.ok_or_else(|| self.syntax_err("dict comprehension with no key", range))?,
                )?),
                value: Box::new(self.parse_expression(*value)?),
                generators: self.parse_comprehensions(generators)?,
            },
            AstExpr::Generator(ast::ExprGenerator { elt, generators, .. }) => ExprKind::GeneratorExp {
                elt: Box::new(self.parse_expression(*elt)?),
                generators: self.parse_comprehensions(generators)?,
            },
            AstExpr::Yield(y) => ExprKind::Yield(match y.value {
                Some(v) => Some(Box::new(self.parse_expression(*v)?)),
                None => None,
            }),
            AstExpr::YieldFrom(y) => ExprKind::YieldFrom(Box::new(self.parse_expression(*y.value)?)),
            AstExpr::Await(a) => {
                return Err(self.syntax_err("await expressions are not supported", a.range));
            }
            AstExpr::Compare(ast::ExprCompare {
                left, ops, comparators, ..
            }) => ExprKind::Compare {
                left: Box::new(self.parse_expression(*left)?),
                ops: ops.iter().map(|op| convert_cmp_op(*op)).collect(),
                comparators: self.parse_expressions(comparators.into_vec())?,
            },
            AstExpr::Call(ast::ExprCall { func, arguments, .. }) => {
                let ast::Arguments { args, keywords, .. } = arguments;
                let args = self.parse_expressions(args.into_vec())?;
                let kwargs = self.parse_keywords(keywords.to_vec())?;
                ExprKind::Call {
                    func: Box::new(self.parse_expression(*func)?),
                    args,
                    kwargs,
                }
            }
            AstExpr::FString(ast::ExprFString { value, .. }) => self.parse_fstring(&value)?,
            AstExpr::TString(t) => {
                return Err(self.syntax_err("template strings (t-strings) are not supported", t.range));
            }
            AstExpr::StringLiteral(ast::ExprStringLiteral { value, .. }) => {
                ExprKind::Literal(Literal::Str(Rc::from(value.to_string())))
            }
            AstExpr::BytesLiteral(b) => {
                return Err(self.syntax_err("bytes literals are not supported", b.range));
            }
            AstExpr::NumberLiteral(ast::ExprNumberLiteral { value, range, .. }) => match value {
                Number::Int(i) => match i.as_i64() {
                    Some(i) => ExprKind::Literal(Literal::Int(i)),
                    None => match parse_int_str(&i.to_string(), 0) {
                        Ok(Value::BigInt(b)) => ExprKind::Literal(Literal::BigInt((*b).clone())),
                        Ok(Value::Int(i)) => ExprKind::Literal(Literal::Int(i)),
                        _ => {
                            return Err(self.syntax_err(format!("invalid integer literal: {i}"), range));
                        }
                    },
                },
                Number::Float(f) => ExprKind::Literal(Literal::Float(f)),
                Number::Complex { .. } => {
                    return Err(self.syntax_err("complex literals are not supported", range));
                }
            },
            AstExpr::BooleanLiteral(ast::ExprBooleanLiteral { value, .. }) => {
                ExprKind::Literal(Literal::Bool(value))
            }
            AstExpr::NoneLiteral(_) => ExprKind::Literal(Literal::None),
            // `...` appears as a do-nothing statement body; it evaluates to None
            AstExpr::EllipsisLiteral(_) => ExprKind::Literal(Literal::None),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => ExprKind::Attr {
                object: Box::new(self.parse_expression(*value)?),
                attr: attr.id().to_string(),
            },
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => ExprKind::Subscript {
                object: Box::new(self.parse_expression(*value)?),
                index: Box::new(self.parse_expression(*slice)?),
            },
            AstExpr::Slice(ast::ExprSlice { lower, upper, step, .. }) => ExprKind::Slice {
                lower: match lower {
                    Some(e) => Some(Box::new(self.parse_expression(*e)?)),
                    None => None,
                },
                upper: match upper {
                    Some(e) => Some(Box::new(self.parse_expression(*e)?)),
                    None => None,
                },
                step: match step {
                    Some(e) => Some(Box::new(self.parse_expression(*e)?)),
                    None => None,
                },
            },
            AstExpr::Name(ast::ExprName { id, .. }) => ExprKind::Name(id.to_string()),
            AstExpr::IpyEscapeCommand(i) => {
                return Err(self.syntax_err("IPython escape commands are not supported", i.range));
            }
        };
        Ok(ExprNode { line, kind })
    }

    fn parse_keywords(&mut self, keywords: Vec<Keyword>) -> Result<Vec<(Option<String>, ExprNode)>, Exception> {
        keywords
            .into_iter()
            .map(|kw| {
                let name = kw.arg.map(|a| a.id.to_string());
                Ok((name, self.parse_expression(kw.value)?))
            })
            .collect()
    }

    fn parse_comprehensions(&mut self, generators: Vec<ast::Comprehension>) -> Result<Vec<Comprehension>, Exception> {
        generators
            .into_iter()
            .map(|comp| {
                if comp.is_async {
                    return Err(self.syntax_err("async comprehensions are not supported", comp.range));
                }
                Ok(Comprehension {
                    target: self.parse_target(comp.target)?,
                    iter: self.parse_expression(comp.iter)?,
                    ifs: self.parse_expressions(comp.ifs)?,
                })
            })
            .collect()
    }

    fn parse_pattern(&mut self, pattern: ast::Pattern) -> Result<Pattern, Exception> {
        match pattern {
            ast::Pattern::MatchValue(value_pat) => {
                Ok(Pattern::Value(self.parse_expression(*value_pat.value)?))
            }
            ast::Pattern::MatchSingleton(singleton_pat) => Ok(Pattern::Singleton(match singleton_pat.value {
                ast::Singleton::None => Singleton::None,
                ast::Singleton::True => Singleton::True,
                ast::Singleton::False => Singleton::False,
            })),
            ast::Pattern::MatchAs(as_pat) => {
                let inner = match as_pat.pattern {
                    Some(p) => Some(Box::new(self.parse_pattern(*p)?)),
                    None => None,
                };
                match as_pat.name {
                    Some(name) if name.id.as_str() != "_" => Ok(Pattern::Capture {
                        name: name.id.to_string(),
                        pattern: inner,
                    }),
                    _ => Ok(inner.map_or(Pattern::Wildcard, |p| *p)),
                }
            }
            ast::Pattern::MatchSequence(seq_pat) => {
                let patterns = seq_pat
                    .patterns
                    .into_iter()
                    .map(|p| self.parse_pattern(p))
                    .collect::<Result<Vec<_>, _>>()?;
                let stars = patterns.iter().filter(|p| matches!(p, Pattern::Star(_))).count();
                if stars > 1 {
                    return Err(self.syntax_err(
                        "multiple starred names in sequence pattern",
                        seq_pat.range,
                    ));
                }
                Ok(Pattern::Sequence(patterns))
            }
            ast::Pattern::MatchStar(star_pat) => Ok(Pattern::Star(
                star_pat
                    .name
                    .as_ref()
                    .filter(|n| n.id.as_str() != "_")
                    .map(|n| n.id.to_string()),
            )),
            ast::Pattern::MatchMapping(map_pat) => {
                let keys = map_pat
                    .keys
                    .into_iter()
                    .map(|k| self.parse_expression(k))
                    .collect::<Result<Vec<_>, _>>()?;
                let patterns = map_pat
                    .patterns
                    .into_iter()
                    .map(|p| self.parse_pattern(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Pattern::Mapping {
                    keys,
                    patterns,
                    rest: map_pat.rest.map(|r| r.id.to_string()),
                })
            }
            ast::Pattern::MatchClass(class_pat) => {
                let cls = self.parse_expression(*class_pat.cls)?;
                let positional = class_pat
                    .arguments
                    .patterns
                    .into_iter()
                    .map(|p| self.parse_pattern(p))
                    .collect::<Result<Vec<_>, _>>()?;
                let keyword = class_pat
                    .arguments
                    .keywords
                    .into_iter()
                    .map(|kw| Ok((kw.attr.id.to_string(), self.parse_pattern(kw.pattern)?)))
                    .collect::<Result<Vec<_>, Exception>>()?;
                Ok(Pattern::Class {
                    cls,
                    positional,
                    keyword,
                })
            }
            ast::Pattern::MatchOr(or_pat) => {
                let patterns = or_pat
                    .patterns
                    .into_iter()
                    .map(|p| self.parse_pattern(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Pattern::Or(patterns))
            }
        }
    }

    fn parse_fstring(&mut self, value: &ast::FStringValue) -> Result<ExprKind, Exception> {
        let mut parts = Vec::new();
        for fstring_part in value {
            match fstring_part {
                ast::FStringPart::Literal(lit) => {
                    let text = lit.value.to_string();
                    if !text.is_empty() {
                        parts.push(FStringPart::Literal(Rc::from(text)));
                    }
                }
                ast::FStringPart::FString(fstring) => {
                    for element in &fstring.elements {
                        self.parse_fstring_element(element, &mut parts)?;
                    }
                }
            }
        }
        // a pure-literal f-string collapses to a plain string literal
        if parts.len() == 1 {
            if let FStringPart::Literal(text) = &parts[0] {
                return Ok(ExprKind::Literal(Literal::Str(text.clone())));
            }
        }
        Ok(ExprKind::FString(parts))
    }

    fn parse_fstring_element(
        &mut self,
        element: &InterpolatedStringElement,
        parts: &mut Vec<FStringPart>,
    ) -> Result<(), Exception> {
        match element {
            InterpolatedStringElement::Literal(lit) => {
                parts.push(FStringPart::Literal(Rc::from(lit.value.to_string())));
            }
            InterpolatedStringElement::Interpolation(interp) => {
                let expr = Box::new(self.parse_expression((*interp.expression).clone())?);
                let mut conversion = match interp.conversion {
                    RuffConversionFlag::None => Conversion::None,
                    RuffConversionFlag::Str => Conversion::Str,
                    RuffConversionFlag::Repr => Conversion::Repr,
                    RuffConversionFlag::Ascii => Conversion::Ascii,
                };
                // f'{x=}' renders "x=" then the value, repr by default
                if let Some(debug) = &interp.debug_text {
                    let expr_text = &self.code[interp.expression.range()];
                    parts.push(FStringPart::Literal(Rc::from(format!(
                        "{}{expr_text}{}",
                        debug.leading(), debug.trailing()
                    ))));
                    if conversion == Conversion::None && interp.format_spec.is_none() {
                        conversion = Conversion::Repr;
                    }
                }
                let spec = match &interp.format_spec {
                    Some(spec) => Some(self.parse_format_spec(spec)?),
                    None => None,
                };
                parts.push(FStringPart::Interpolation {
                    expr,
                    conversion,
                    spec,
                });
            }
        }
        Ok(())
    }

    fn parse_format_spec(&mut self, spec: &ast::InterpolatedStringFormatSpec) -> Result<FormatSpecAst, Exception> {
        let mut parts = Vec::new();
        let mut dynamic = false;
        for element in &spec.elements {
            match element {
                InterpolatedStringElement::Literal(lit) => {
                    parts.push(FStringPart::Literal(Rc::from(lit.value.to_string())));
                }
                InterpolatedStringElement::Interpolation(interp) => {
                    dynamic = true;
                    let expr = Box::new(self.parse_expression((*interp.expression).clone())?);
                    parts.push(FStringPart::Interpolation {
                        expr,
                        conversion: Conversion::None,
                        spec: None,
                    });
                }
            }
        }
        if dynamic {
            Ok(FormatSpecAst::Dynamic(parts))
        } else {
            let text: String = parts
                .iter()
                .filter_map(|p| match p {
                    FStringPart::Literal(s) => Some(s.to_string()),
                    FStringPart::Interpolation { .. } => None,
                })
                .collect();
            Ok(FormatSpecAst::Static(Rc::from(text)))
        }
    }
}

/// True when a function body yields at its own nesting level (nested
/// functions do not make the outer one a generator).
fn body_has_yield(body: &[Stmt]) -> bool {
    body.iter().any(stmt_has_yield)
}

fn stmt_has_yield(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Expr(e) => expr_has_yield(e),
        StmtKind::Assign { value, .. } | StmtKind::AugAssign { value, .. } => expr_has_yield(value),
        StmtKind::AnnAssign { value, .. } => value.as_ref().is_some_and(expr_has_yield),
        StmtKind::Return(v) => v.as_ref().is_some_and(expr_has_yield),
        StmtKind::If { test, body, orelse } => {
            expr_has_yield(test) || body_has_yield(body) || body_has_yield(orelse)
        }
        StmtKind::While { test, body, orelse } => {
            expr_has_yield(test) || body_has_yield(body) || body_has_yield(orelse)
        }
        StmtKind::For { iter, body, orelse, .. } => {
            expr_has_yield(iter) || body_has_yield(body) || body_has_yield(orelse)
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finally,
        } => {
            body_has_yield(body)
                || handlers.iter().any(|h| body_has_yield(&h.body))
                || body_has_yield(orelse)
                || body_has_yield(finally)
        }
        StmtKind::With { context, body, .. } => expr_has_yield(context) || body_has_yield(body),
        StmtKind::Match { subject, cases } => {
            expr_has_yield(subject) || cases.iter().any(|c| body_has_yield(&c.body))
        }
        _ => false,
    }
}

fn expr_has_yield(expr: &ExprNode) -> bool {
    match &expr.kind {
        ExprKind::Yield(_) | ExprKind::YieldFrom(_) => true,
        ExprKind::Unary { operand, .. } => expr_has_yield(operand),
        ExprKind::Binary { left, right, .. } => expr_has_yield(left) || expr_has_yield(right),
        ExprKind::Bool { values, .. } => values.iter().any(expr_has_yield),
        ExprKind::Compare { left, comparators, .. } => {
            expr_has_yield(left) || comparators.iter().any(expr_has_yield)
        }
        ExprKind::Ternary { test, body, orelse } => {
            expr_has_yield(test) || expr_has_yield(body) || expr_has_yield(orelse)
        }
        ExprKind::Named { value, .. } | ExprKind::Starred(value) => expr_has_yield(value),
        ExprKind::Call { func, args, kwargs } => {
            expr_has_yield(func)
                || args.iter().any(expr_has_yield)
                || kwargs.iter().any(|(_, v)| expr_has_yield(v))
        }
        ExprKind::Attr { object, .. } => expr_has_yield(object),
        ExprKind::Subscript { object, index } => expr_has_yield(object) || expr_has_yield(index),
        ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => {
            items.iter().any(expr_has_yield)
        }
        ExprKind::Dict(items) => items.iter().any(|item| match item {
            DictItem::Pair { key, value } => expr_has_yield(key) || expr_has_yield(value),
            DictItem::Unpack(e) => expr_has_yield(e),
        }),
        ExprKind::FString(parts) => parts.iter().any(|p| match p {
            FStringPart::Interpolation { expr, .. } => expr_has_yield(expr),
            FStringPart::Literal(_) => false,
        }),
        _ => false,
    }
}

fn convert_op(op: AstOperator) -> BinOp {
    match op {
        AstOperator::Add => BinOp::Add,
        AstOperator::Sub => BinOp::Sub,
        AstOperator::Mult => BinOp::Mul,
        AstOperator::MatMult => BinOp::MatMul,
        AstOperator::Div => BinOp::Div,
        AstOperator::Mod => BinOp::Mod,
        AstOperator::Pow => BinOp::Pow,
        AstOperator::LShift => BinOp::LShift,
        AstOperator::RShift => BinOp::RShift,
        AstOperator::BitOr => BinOp::BitOr,
        AstOperator::BitXor => BinOp::BitXor,
        AstOperator::BitAnd => BinOp::BitAnd,
        AstOperator::FloorDiv => BinOp::FloorDiv,
    }
}

fn convert_cmp_op(op: AstCmpOp) -> CmpOp {
    match op {
        AstCmpOp::Eq => CmpOp::Eq,
        AstCmpOp::NotEq => CmpOp::NotEq,
        AstCmpOp::Lt => CmpOp::Lt,
        AstCmpOp::LtE => CmpOp::LtE,
        AstCmpOp::Gt => CmpOp::Gt,
        AstCmpOp::GtE => CmpOp::GtE,
        AstCmpOp::Is => CmpOp::Is,
        AstCmpOp::IsNot => CmpOp::IsNot,
        AstCmpOp::In => CmpOp::In,
        AstCmpOp::NotIn => CmpOp::NotIn,
    }
}

fn expr_kind_name(expr: &AstExpr) -> &'static str {
    match expr {
        AstExpr::Call(_) => "function call",
        AstExpr::NumberLiteral(_) | AstExpr::StringLiteral(_) | AstExpr::BooleanLiteral(_) => "literal",
        AstExpr::Compare(_) => "comparison",
        _ => "expression",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_one_based() {
        let ast = parse("x = 1\ny = 2\n").unwrap();
        assert_eq!(ast.body[0].line, 1);
        assert_eq!(ast.body[1].line, 2);
    }

    #[test]
    fn syntax_error_carries_line() {
        let err = parse("x = 1\ndef f(:\n").unwrap_err();
        assert_eq!(err.kind, crate::exception::ExcType::SyntaxError);
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn generator_detection_ignores_nested_defs() {
        let ast = parse("def f():\n    def g():\n        yield 1\n    return g\n").unwrap();
        let StmtKind::FunctionDef(f) = &ast.body[0].kind else {
            panic!("expected function def");
        };
        assert!(!f.is_generator);
        let StmtKind::FunctionDef(g) = &f.body[0].kind else {
            panic!("expected nested def");
        };
        assert!(g.is_generator);
    }

    #[test]
    fn rejects_unsupported_forms() {
        assert!(parse("async def f(): pass").is_err());
        assert!(parse("from . import x").is_err());
        assert!(parse("b'bytes'").is_err());
        assert!(parse("1 + 2j").is_err());
    }

    #[test]
    fn match_patterns_parse() {
        let src = "
match point:
    case (0, 0):
        pass
    case {'x': x, **rest}:
        pass
    case Point(0, y=1):
        pass
    case [first, *rest2]:
        pass
    case 1 | 2 as n:
        pass
    case _:
        pass
";
        let ast = parse(src).unwrap();
        let StmtKind::Match { cases, .. } = &ast.body[0].kind else {
            panic!("expected match");
        };
        assert_eq!(cases.len(), 6);
        assert!(matches!(cases[5].pattern, Pattern::Wildcard));
        assert!(matches!(cases[1].pattern, Pattern::Mapping { .. }));
        assert!(matches!(cases[2].pattern, Pattern::Class { .. }));
    }
}
