//! Type checking: a single top-down pass that annotates every AST node.
//!
//! The checker carries a stack of lexical scopes, the enclosing function's
//! declared return type, and a stack of loop frames used to give `break`
//! values a consistent type. On success every `Expr::ty` slot is filled;
//! later stages treat a missing slot as an internal error.

use std::collections::HashMap;

use crate::error::{CompileError, CompileResult};
use crate::parser::{BinaryOp, Expr, ExprKind, FunDef, Module, UnaryOp};
use crate::tokenizer::SourceLocation;
use crate::ty::Type;

/// One lexical loop. `break_ty` starts unknown; the first `break` fixes it
/// and every later `break` in the same loop must agree.
struct LoopFrame {
  break_ty: Option<Type>,
}

struct Checker {
  scopes: Vec<HashMap<String, Type>>,
  return_type: Option<Type>,
  returns_seen: usize,
  loops: Vec<LoopFrame>,
}

/// Pre-populated signatures of the runtime built-ins.
fn global_scope() -> HashMap<String, Type> {
  HashMap::from([
    ("print_int".to_string(), Type::function(vec![Type::Int], Type::Unit)),
    ("print_bool".to_string(), Type::function(vec![Type::Bool], Type::Unit)),
    ("read_int".to_string(), Type::function(vec![], Type::Int)),
  ])
}

/// Check a whole module in place. Function signatures are registered before
/// any body is checked, so functions may call each other freely.
pub fn typecheck_module(module: &mut Module) -> CompileResult<()> {
  let mut checker = Checker {
    scopes: vec![global_scope()],
    return_type: None,
    returns_seen: 0,
    loops: Vec::new(),
  };

  for fun in &module.functions {
    if fun.name == "main" {
      return Err(CompileError::type_error(
        fun.loc,
        "function name \"main\" is reserved for the program entry point",
      ));
    }
    let signature = Type::function(
      fun.params.iter().map(|p| p.ty.clone()).collect(),
      fun.return_type.clone(),
    );
    checker.declare(&fun.name, signature, fun.loc)?;
  }

  for fun in &mut module.functions {
    checker.check_function(fun)?;
  }

  if let Some(top_level) = &mut module.top_level {
    checker.check_expr(top_level)?;
  }

  Ok(())
}

impl Checker {
  fn declare(&mut self, name: &str, ty: Type, loc: SourceLocation) -> CompileResult<()> {
    let scope = self.scopes.last_mut().expect("scope stack is never empty");
    if scope.contains_key(name) {
      return Err(CompileError::type_error(
        loc,
        format!("\"{name}\" is already defined in this scope"),
      ));
    }
    scope.insert(name.to_string(), ty);
    Ok(())
  }

  fn lookup(&self, name: &str) -> Option<Type> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(name).cloned())
  }

  fn check_function(&mut self, fun: &mut FunDef) -> CompileResult<()> {
    self.scopes.push(HashMap::new());
    for param in &fun.params {
      self.declare(&param.name, param.ty.clone(), param.loc)?;
    }
    self.return_type = Some(fun.return_type.clone());
    self.returns_seen = 0;

    let body_ty = self.check_expr(&mut fun.body)?;

    // A body that routes its result through `return` statements is exempt
    // from the trailing-expression check; each `return` was already checked
    // against the declared type.
    if body_ty != fun.return_type && self.returns_seen == 0 {
      return Err(CompileError::type_error(
        fun.loc,
        format!(
          "function \"{}\" declares return type {}, but its body has type {}",
          fun.name, fun.return_type, body_ty
        ),
      ));
    }

    self.return_type = None;
    self.scopes.pop();
    Ok(())
  }

  fn check_expr(&mut self, expr: &mut Expr) -> CompileResult<Type> {
    let loc = expr.loc;
    let ty = match &mut expr.kind {
      ExprKind::IntLit(_) => Type::Int,
      ExprKind::BoolLit(_) => Type::Bool,

      ExprKind::Ident(name) => self.lookup(name).ok_or_else(|| {
        CompileError::type_error(loc, format!("unbound identifier \"{name}\""))
      })?,

      ExprKind::Unary { op, operand } => {
        let operand_ty = self.check_expr(operand)?;
        let (required, result) = match op {
          UnaryOp::Neg => (Type::Int, Type::Int),
          UnaryOp::Not => (Type::Bool, Type::Bool),
        };
        if operand_ty != required {
          return Err(CompileError::type_error(
            loc,
            format!(
              "unary \"{}\" requires a {required} operand, got {operand_ty}",
              op.symbol()
            ),
          ));
        }
        result
      }

      ExprKind::Binary { op, lhs, rhs } => {
        let lhs_ty = self.check_expr(lhs)?;
        let rhs_ty = self.check_expr(rhs)?;
        self.check_binary(*op, &lhs_ty, &rhs_ty, loc)?
      }

      ExprKind::If {
        cond,
        then_branch,
        else_branch,
      } => {
        let cond_ty = self.check_expr(cond)?;
        if cond_ty != Type::Bool {
          return Err(CompileError::type_error(
            cond.loc,
            format!("if condition must be Bool, got {cond_ty}"),
          ));
        }
        let then_ty = self.check_expr(then_branch)?;
        match else_branch {
          Some(else_branch) => {
            let else_ty = self.check_expr(else_branch)?;
            if then_ty != else_ty {
              return Err(CompileError::type_error(
                loc,
                format!("branches of if have different types: {then_ty} and {else_ty}"),
              ));
            }
            then_ty
          }
          None => {
            if then_ty != Type::Unit {
              return Err(CompileError::type_error(
                loc,
                format!("an if without else must have a Unit branch, got {then_ty}"),
              ));
            }
            Type::Unit
          }
        }
      }

      ExprKind::While { cond, body } => {
        let cond_ty = self.check_expr(cond)?;
        if cond_ty != Type::Bool {
          return Err(CompileError::type_error(
            cond.loc,
            format!("while condition must be Bool, got {cond_ty}"),
          ));
        }
        self.loops.push(LoopFrame { break_ty: None });
        self.check_expr(body)?;
        let frame = self.loops.pop().expect("frame pushed above");
        // The loop's value is whatever its breaks carry; Unit otherwise.
        frame.break_ty.unwrap_or(Type::Unit)
      }

      ExprKind::Break { value } => {
        if self.loops.is_empty() {
          return Err(CompileError::type_error(loc, "break outside of a loop"));
        }
        let value_ty = match value {
          Some(value) => self.check_expr(value)?,
          None => Type::Unit,
        };
        let frame = self.loops.last_mut().expect("checked non-empty above");
        match &frame.break_ty {
          None => frame.break_ty = Some(value_ty),
          Some(prev) if *prev == value_ty => {}
          Some(prev) => {
            return Err(CompileError::type_error(
              loc,
              format!(
                "break value has type {value_ty}, but an earlier break in this loop had type {prev}"
              ),
            ));
          }
        }
        Type::Unit
      }

      ExprKind::Continue => {
        if self.loops.is_empty() {
          return Err(CompileError::type_error(loc, "continue outside of a loop"));
        }
        Type::Unit
      }

      ExprKind::VarDecl {
        name,
        declared_ty,
        init,
      } => {
        let init_ty = self.check_expr(init)?;
        if let Some(declared) = declared_ty
          && *declared != init_ty
        {
          return Err(CompileError::type_error(
            loc,
            format!("declared type {declared}, but initializer has type {init_ty}"),
          ));
        }
        let name = name.clone();
        self.declare(&name, init_ty.clone(), loc)?;
        init_ty
      }

      ExprKind::Assign { target, value } => {
        let value_ty = self.check_expr(value)?;
        let target_ty = self.check_expr(target)?;
        if target_ty != value_ty {
          let ExprKind::Ident(name) = &target.kind else {
            unreachable!("parser only assigns to identifiers");
          };
          return Err(CompileError::type_error(
            loc,
            format!("cannot assign {value_ty} to \"{name}\" of type {target_ty}"),
          ));
        }
        target_ty
      }

      ExprKind::Block { statements, result } => {
        self.scopes.push(HashMap::new());
        for statement in statements.iter_mut() {
          self.check_expr(statement)?;
        }
        let block_ty = match result {
          Some(result) => self.check_expr(result)?,
          None => Type::Unit,
        };
        self.scopes.pop();
        block_ty
      }

      ExprKind::Call { callee, args } => {
        let callee = callee.clone();
        let callee_ty = self.lookup(&callee).ok_or_else(|| {
          CompileError::type_error(loc, format!("unbound identifier \"{callee}\""))
        })?;
        let Type::Function { params, result } = callee_ty else {
          return Err(CompileError::type_error(
            loc,
            format!("\"{callee}\" is not a function"),
          ));
        };
        if params.len() != args.len() {
          return Err(CompileError::type_error(
            loc,
            format!(
              "\"{callee}\" expects {} argument(s), got {}",
              params.len(),
              args.len()
            ),
          ));
        }
        for (i, (arg, expected)) in args.iter_mut().zip(&params).enumerate() {
          let arg_ty = self.check_expr(arg)?;
          if arg_ty != *expected {
            return Err(CompileError::type_error(
              arg.loc,
              format!(
                "argument {} to \"{callee}\" has type {arg_ty}, expected {expected}",
                i + 1
              ),
            ));
          }
        }
        *result
      }

      ExprKind::Return { value } => {
        let Some(expected) = self.return_type.clone() else {
          return Err(CompileError::type_error(loc, "return outside of a function"));
        };
        let value_ty = match value {
          Some(value) => self.check_expr(value)?,
          None => Type::Unit,
        };
        if value_ty != expected {
          return Err(CompileError::type_error(
            loc,
            format!("returning {value_ty}, but the function declares {expected}"),
          ));
        }
        self.returns_seen += 1;
        Type::Unit
      }
    };

    expr.ty = Some(ty.clone());
    Ok(ty)
  }

  fn check_binary(
    &self,
    op: BinaryOp,
    lhs_ty: &Type,
    rhs_ty: &Type,
    loc: SourceLocation,
  ) -> CompileResult<Type> {
    use BinaryOp::*;
    match op {
      Add | Sub | Mul | Div | Rem => {
        if *lhs_ty != Type::Int || *rhs_ty != Type::Int {
          return Err(CompileError::type_error(
            loc,
            format!(
              "operator \"{}\" requires Int operands, got {lhs_ty} and {rhs_ty}",
              op.symbol()
            ),
          ));
        }
        Ok(Type::Int)
      }
      Lt | Le | Gt | Ge => {
        if *lhs_ty != Type::Int || *rhs_ty != Type::Int {
          return Err(CompileError::type_error(
            loc,
            format!(
              "operator \"{}\" requires Int operands, got {lhs_ty} and {rhs_ty}",
              op.symbol()
            ),
          ));
        }
        Ok(Type::Bool)
      }
      And | Or => {
        if *lhs_ty != Type::Bool || *rhs_ty != Type::Bool {
          return Err(CompileError::type_error(
            loc,
            format!(
              "operator \"{}\" requires Bool operands, got {lhs_ty} and {rhs_ty}",
              op.symbol()
            ),
          ));
        }
        Ok(Type::Bool)
      }
      // Equality is overloaded over Int and Bool, same type on both sides.
      Eq | Ne => {
        let comparable = matches!(lhs_ty, Type::Int | Type::Bool);
        if !comparable || lhs_ty != rhs_ty {
          return Err(CompileError::type_error(
            loc,
            format!(
              "operator \"{}\" requires two Ints or two Bools, got {lhs_ty} and {rhs_ty}",
              op.symbol()
            ),
          ));
        }
        Ok(Type::Bool)
      }
    }
  }
}
