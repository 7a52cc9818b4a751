//! Call and member resolution.
//!
//! Rewrites an admitted [`Program`] so that every call names what it invokes
//! and every `Item.X`/`Entity.X`/`Ground.X` is a constant. Library names
//! become suspending primitive calls, `print` becomes its internal alias, and
//! the remaining allow-listed names become pure builtins.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{AdmissionKind, ScriptError};
use crate::game::{Entity, Ground, Item, Primitive};
use crate::script::Allowlist;
use crate::script::ast::{Callee, Const, Expr, FunctionDef, Param, Program, Stmt, StmtKind, Target};
use crate::script::builtins::{Builtin, check_arity};

/// Resolve every call and qualified name in `program`.
///
/// # Errors
///
/// [`AdmissionKind::Unresolved`] when an allow-listed name has no
/// implementation, a qualified member does not exist, or a primitive is
/// called with the wrong number of arguments.
pub fn transform(source: &str, program: Program, allowlist: &Allowlist) -> Result<Program, ScriptError> {
    let defined: BTreeSet<Arc<str>> = program.defined_functions().into_iter().collect();
    let resolver = Resolver {
        source,
        allowlist,
        defined: &defined,
    };
    Ok(Program {
        body: resolver.block(program.body)?,
    })
}

struct Resolver<'a> {
    source: &'a str,
    allowlist: &'a Allowlist,
    defined: &'a BTreeSet<Arc<str>>,
}

impl Resolver<'_> {
    fn error(&self, line: usize, column: usize, reason: String) -> ScriptError {
        ScriptError::new(AdmissionKind::Unresolved, self.source, line, column, reason)
    }

    fn block(&self, body: Vec<Stmt>) -> Result<Vec<Stmt>, ScriptError> {
        body.into_iter().map(|stmt| self.stmt(stmt)).collect()
    }

    fn stmt(&self, stmt: Stmt) -> Result<Stmt, ScriptError> {
        let line = stmt.line;
        let kind = match stmt.kind {
            StmtKind::Expr(e) => StmtKind::Expr(self.expr(e, line)?),
            StmtKind::Assign { targets, value } => StmtKind::Assign {
                targets: targets
                    .into_iter()
                    .map(|t| self.target(t, line))
                    .collect::<Result<_, _>>()?,
                value: self.expr(value, line)?,
            },
            StmtKind::AugAssign { target, op, value } => StmtKind::AugAssign {
                target: self.target(target, line)?,
                op,
                value: self.expr(value, line)?,
            },
            StmtKind::If { branches, orelse } => StmtKind::If {
                branches: branches
                    .into_iter()
                    .map(|(test, body)| Ok((self.expr(test, line)?, self.block(body)?)))
                    .collect::<Result<_, ScriptError>>()?,
                orelse: self.block(orelse)?,
            },
            StmtKind::While { test, body } => StmtKind::While {
                test: self.expr(test, line)?,
                body: self.block(body)?,
            },
            StmtKind::For { target, iter, body } => StmtKind::For {
                target: self.target(target, line)?,
                iter: self.expr(iter, line)?,
                body: self.block(body)?,
            },
            StmtKind::Def(def) => {
                let def = Arc::unwrap_or_clone(def);
                let params = def
                    .params
                    .into_iter()
                    .map(|p| {
                        Ok(Param {
                            name: p.name,
                            default: p.default.map(|d| self.expr(d, line)).transpose()?,
                        })
                    })
                    .collect::<Result<_, ScriptError>>()?;
                StmtKind::Def(Arc::new(FunctionDef {
                    name: def.name,
                    params,
                    body: self.block(def.body)?,
                    line: def.line,
                }))
            }
            StmtKind::Return(value) => StmtKind::Return(value.map(|v| self.expr(v, line)).transpose()?),
            kind @ (StmtKind::Break | StmtKind::Continue | StmtKind::Pass) => kind,
        };
        Ok(Stmt { line, kind })
    }

    fn target(&self, target: Target, line: usize) -> Result<Target, ScriptError> {
        Ok(match target {
            Target::Name(n) => Target::Name(n),
            Target::Index { value, index } => Target::Index {
                value: self.expr(value, line)?,
                index: self.expr(index, line)?,
            },
            Target::Tuple(items) => Target::Tuple(
                items
                    .into_iter()
                    .map(|t| self.target(t, line))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn boxed(&self, e: Box<Expr>, line: usize) -> Result<Box<Expr>, ScriptError> {
        Ok(Box::new(self.expr(*e, line)?))
    }

    fn exprs(&self, items: Vec<Expr>, line: usize) -> Result<Vec<Expr>, ScriptError> {
        items.into_iter().map(|e| self.expr(e, line)).collect()
    }

    fn expr(&self, expr: Expr, line: usize) -> Result<Expr, ScriptError> {
        Ok(match expr {
            Expr::Member {
                qualifier,
                member,
                column,
            } => Expr::Const(self.member(&qualifier, &member, line, column)?),
            Expr::Call { callee, args, column } => {
                let args = self.exprs(args, line)?;
                let callee = self.callee(callee, args.len(), line, column)?;
                Expr::Call { callee, args, column }
            }
            Expr::List(items) => Expr::List(self.exprs(items, line)?),
            Expr::Tuple(items) => Expr::Tuple(self.exprs(items, line)?),
            Expr::Set(items) => Expr::Set(self.exprs(items, line)?),
            Expr::Dict(entries) => Expr::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((self.expr(k, line)?, self.expr(v, line)?)))
                    .collect::<Result<_, ScriptError>>()?,
            ),
            Expr::Unary { op, operand } => Expr::Unary {
                op,
                operand: self.boxed(operand, line)?,
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op,
                left: self.boxed(left, line)?,
                right: self.boxed(right, line)?,
            },
            Expr::Compare { left, rest } => Expr::Compare {
                left: self.boxed(left, line)?,
                rest: rest
                    .into_iter()
                    .map(|(op, e)| Ok((op, self.expr(e, line)?)))
                    .collect::<Result<_, ScriptError>>()?,
            },
            Expr::Logical { op, left, right } => Expr::Logical {
                op,
                left: self.boxed(left, line)?,
                right: self.boxed(right, line)?,
            },
            Expr::Conditional { test, body, orelse } => Expr::Conditional {
                test: self.boxed(test, line)?,
                body: self.boxed(body, line)?,
                orelse: self.boxed(orelse, line)?,
            },
            Expr::Index { value, index } => Expr::Index {
                value: self.boxed(value, line)?,
                index: self.boxed(index, line)?,
            },
            Expr::Slice { value, lower, upper } => Expr::Slice {
                value: self.boxed(value, line)?,
                lower: lower.map(|e| self.boxed(e, line)).transpose()?,
                upper: upper.map(|e| self.boxed(e, line)).transpose()?,
            },
            e @ (Expr::Const(_) | Expr::Name(_)) => e,
        })
    }

    fn member(&self, qualifier: &str, member: &str, line: usize, column: usize) -> Result<Const, ScriptError> {
        let resolved = match qualifier {
            "Item" => Item::from_identifier(member).map(Const::Item),
            "Entity" => Entity::from_identifier(member).map(Const::Entity),
            "Ground" => Ground::from_identifier(member).map(Const::Ground),
            _ => None,
        };
        resolved.ok_or_else(|| self.error(line, column, format!("{qualifier} has no member {member}")))
    }

    fn callee(&self, callee: Callee, argc: usize, line: usize, column: usize) -> Result<Callee, ScriptError> {
        let Callee::Unresolved(name) = callee else {
            return Ok(callee);
        };
        let allowlist = self.allowlist;
        if allowlist.standard.contains(&*name) {
            return if &*name == "print" {
                Ok(Callee::Print)
            } else {
                Err(self.error(line, column, format!("Function {name} is not mapped")))
            };
        }
        if allowlist.library.contains(&*name) {
            let primitive = Primitive::from_name(&name)
                .ok_or_else(|| self.error(line, column, format!("Function {name} is not mapped in the game logic")))?;
            check_arity(primitive.name(), primitive.arity(), argc)
                .map_err(|e| self.error(line, column, e.message))?;
            return Ok(Callee::Primitive(primitive));
        }
        if allowlist.builtins.contains(&*name) {
            let builtin = Builtin::from_name(&name)
                .ok_or_else(|| self.error(line, column, format!("Function {name} is not available")))?;
            return Ok(Callee::Builtin(builtin));
        }
        if self.defined.contains(&name) {
            return Ok(Callee::User(name));
        }
        Err(ScriptError::new(
            AdmissionKind::DisallowedCall,
            self.source,
            line,
            column,
            format!("Function {name} is not allowed"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::validate::validate;

    fn compile_with(source: &str, allowlist: &Allowlist) -> Result<Program, ScriptError> {
        let program = validate(source, allowlist)?;
        transform(source, program, allowlist)
    }

    fn compile(source: &str) -> Result<Program, ScriptError> {
        compile_with(source, &Allowlist::default())
    }

    fn first_call(program: &Program) -> (&Callee, &[Expr]) {
        match &program.body[0].kind {
            StmtKind::Expr(Expr::Call { callee, args, .. }) => (callee, args),
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn test_library_calls_become_primitives() {
        let program = compile("plant(Entity.CARROT)\n").unwrap();
        let (callee, args) = first_call(&program);
        assert_eq!(*callee, Callee::Primitive(Primitive::Plant));
        assert_eq!(args[0], Expr::Const(Const::Entity(Entity::Carrot)));
    }

    #[test]
    fn test_print_is_aliased() {
        let program = compile("print(1, 2)\n").unwrap();
        assert_eq!(*first_call(&program).0, Callee::Print);
    }

    #[test]
    fn test_builtins_and_user_functions() {
        let program = compile("len([1])\ndef f():\n    return abs(-1)\nf()\n").unwrap();
        assert_eq!(*first_call(&program).0, Callee::Builtin(Builtin::Len));
        let StmtKind::Expr(Expr::Call { callee, .. }) = &program.body[2].kind else {
            panic!("expected call");
        };
        assert_eq!(*callee, Callee::User(Arc::from("f")));
        let StmtKind::Def(def) = &program.body[1].kind else {
            panic!("expected def");
        };
        let StmtKind::Return(Some(Expr::Call { callee, .. })) = &def.body[0].kind else {
            panic!("expected return of a call");
        };
        assert_eq!(*callee, Callee::Builtin(Builtin::Abs));
    }

    #[test]
    fn test_unknown_member() {
        let err = compile("x = 1\nplant(Entity.MELON)\n").unwrap_err();
        assert_eq!(err.kind, AdmissionKind::Unresolved);
        assert_eq!((err.line, err.column), (2, 6));
        assert_eq!(err.reason, "Entity has no member MELON");
    }

    #[test]
    fn test_primitive_arity_checked() {
        let err = compile("move()\n").unwrap_err();
        assert_eq!(err.kind, AdmissionKind::Unresolved);
        assert_eq!(err.reason, "move() takes exactly 1 argument (0 given)");
        assert!(compile("measure()\nmeasure(North)\n").is_ok());
    }

    #[test]
    fn test_unmapped_library_name() {
        let mut allowlist = Allowlist::default();
        allowlist.library.insert("fly".to_string());
        let err = compile_with("fly()\n", &allowlist).unwrap_err();
        assert_eq!(err.kind, AdmissionKind::Unresolved);
        assert_eq!(err.reason, "Function fly is not mapped in the game logic");
    }

    #[test]
    fn test_defaults_are_resolved() {
        let program = compile("def go(d=Item.HAY):\n    return d\n").unwrap();
        let StmtKind::Def(def) = &program.body[0].kind else {
            panic!("expected def");
        };
        assert_eq!(def.params[0].default, Some(Expr::Const(Const::Item(Item::Hay))));
    }
}
