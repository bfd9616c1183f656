//! IR generation: lowers the typed AST into flat per-function instruction
//! lists.
//!
//! Two pieces of context thread through the recursion: a scope stack mapping
//! source names to IR variables, and a loop stack whose frames carry the
//! start/end labels that `continue` and `break` jump to. `and`/`or` lower to
//! conditional jumps so the right operand only runs when it matters.

use std::collections::HashMap;

use crate::error::{CompileError, CompileResult};
use crate::ir::{Instruction, IrFunction, IrProgram, IrVar};
use crate::parser::{BinaryOp, Expr, ExprKind, FunDef, Module, UnaryOp};
use crate::ty::Type;

/// Lower a type-checked module. User functions come first, the synthesized
/// `main` (top-level code plus `return 0`) last.
pub fn generate_ir(module: &Module) -> CompileResult<IrProgram> {
  let mut functions = Vec::new();
  for fun in &module.functions {
    functions.push(generate_function(fun)?);
  }
  functions.push(generate_main(module.top_level.as_ref())?);
  Ok(IrProgram { functions })
}

fn generate_function(fun: &FunDef) -> CompileResult<IrFunction> {
  let mut gen_ir = FunctionGen::new();
  gen_ir.emit(Instruction::Label {
    name: "entry".to_string(),
  });

  let mut params = Vec::new();
  for param in &fun.params {
    let var = gen_ir.new_var(param.ty.clone());
    gen_ir.declare(&param.name, var.clone());
    params.push(var);
  }

  let body_var = gen_ir.visit(&fun.body)?;

  if !matches!(gen_ir.instructions.last(), Some(Instruction::Return { .. })) {
    let source = if fun.return_type == Type::Unit {
      None
    } else {
      Some(body_var)
    };
    gen_ir.emit(Instruction::Return { source });
  }

  Ok(gen_ir.finish(&fun.name, params))
}

fn generate_main(top_level: Option<&Expr>) -> CompileResult<IrFunction> {
  let mut gen_ir = FunctionGen::new();
  gen_ir.emit(Instruction::Label {
    name: "entry".to_string(),
  });

  if let Some(expr) = top_level {
    gen_ir.visit(expr)?;
  }

  // The program's exit status is always 0.
  let zero = gen_ir.new_var(Type::Int);
  gen_ir.emit(Instruction::LoadIntConst {
    value: 0,
    dest: zero.clone(),
  });
  gen_ir.emit(Instruction::Return { source: Some(zero) });

  Ok(gen_ir.finish("main", Vec::new()))
}

struct LoopCtx {
  start_label: String,
  end_label: String,
  /// Carries the loop's value; allocated at the first `break` with a value.
  result: Option<IrVar>,
}

struct FunctionGen {
  instructions: Vec<Instruction>,
  var_types: HashMap<IrVar, Type>,
  var_counter: u32,
  label_counter: u32,
  scopes: Vec<HashMap<String, IrVar>>,
  loops: Vec<LoopCtx>,
  unit: IrVar,
}

impl FunctionGen {
  fn new() -> Self {
    let unit = IrVar::new("unit");
    let mut var_types = HashMap::new();
    var_types.insert(unit.clone(), Type::Unit);
    Self {
      instructions: Vec::new(),
      var_types,
      var_counter: 0,
      label_counter: 0,
      scopes: vec![HashMap::new()],
      loops: Vec::new(),
      unit,
    }
  }

  fn finish(self, name: &str, params: Vec<IrVar>) -> IrFunction {
    IrFunction {
      name: name.to_string(),
      params,
      instructions: self.instructions,
      var_types: self.var_types,
    }
  }

  fn emit(&mut self, insn: Instruction) {
    self.instructions.push(insn);
  }

  fn new_var(&mut self, ty: Type) -> IrVar {
    self.var_counter += 1;
    let var = IrVar::new(format!("x{}", self.var_counter));
    self.var_types.insert(var.clone(), ty);
    var
  }

  fn new_label(&mut self) -> String {
    self.label_counter += 1;
    format!("L{}", self.label_counter)
  }

  fn declare(&mut self, name: &str, var: IrVar) {
    self
      .scopes
      .last_mut()
      .expect("scope stack is never empty")
      .insert(name.to_string(), var);
  }

  fn lookup(&self, name: &str) -> CompileResult<IrVar> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(name).cloned())
      .ok_or_else(|| CompileError::internal(format!("unbound name \"{name}\" reached IR generation")))
  }

  /// The type the checker attached to this node.
  fn ty_of(expr: &Expr) -> CompileResult<Type> {
    expr
      .ty
      .clone()
      .ok_or_else(|| CompileError::internal(format!("untyped AST node at {}", expr.loc)))
  }

  /// Lower one expression, returning the variable that holds its value.
  /// `Unit`-valued expressions return the shared `unit` variable.
  fn visit(&mut self, expr: &Expr) -> CompileResult<IrVar> {
    match &expr.kind {
      ExprKind::IntLit(value) => {
        let dest = self.new_var(Type::Int);
        self.emit(Instruction::LoadIntConst {
          value: *value,
          dest: dest.clone(),
        });
        Ok(dest)
      }

      ExprKind::BoolLit(value) => {
        let dest = self.new_var(Type::Bool);
        self.emit(Instruction::LoadBoolConst {
          value: *value,
          dest: dest.clone(),
        });
        Ok(dest)
      }

      ExprKind::Ident(name) => self.lookup(name),

      ExprKind::Unary { op, operand } => {
        let operand_var = self.visit(operand)?;
        let dest = self.new_var(Self::ty_of(expr)?);
        let fun = match op {
          UnaryOp::Neg => "unary_-",
          UnaryOp::Not => "not",
        };
        self.emit(Instruction::Call {
          fun: IrVar::new(fun),
          args: vec![operand_var],
          dest: dest.clone(),
        });
        Ok(dest)
      }

      ExprKind::Binary { op, lhs, rhs } => match op {
        BinaryOp::And | BinaryOp::Or => self.visit_short_circuit(*op, lhs, rhs),
        _ => {
          let lhs_var = self.visit(lhs)?;
          let rhs_var = self.visit(rhs)?;
          let dest = self.new_var(Self::ty_of(expr)?);
          self.emit(Instruction::Call {
            fun: IrVar::new(op.symbol()),
            args: vec![lhs_var, rhs_var],
            dest: dest.clone(),
          });
          Ok(dest)
        }
      },

      ExprKind::If {
        cond,
        then_branch,
        else_branch,
      } => self.visit_if(Self::ty_of(expr)?, cond, then_branch, else_branch.as_deref()),

      ExprKind::While { cond, body } => {
        let start_label = self.new_label();
        let body_label = self.new_label();
        let end_label = self.new_label();
        self.loops.push(LoopCtx {
          start_label: start_label.clone(),
          end_label: end_label.clone(),
          result: None,
        });

        self.emit(Instruction::Label {
          name: start_label.clone(),
        });
        let cond_var = self.visit(cond)?;
        self.emit(Instruction::CondJump {
          cond: cond_var,
          then_label: body_label.clone(),
          else_label: end_label.clone(),
        });
        self.emit(Instruction::Label { name: body_label });
        self.visit(body)?;
        self.emit(Instruction::Jump { label: start_label });
        self.emit(Instruction::Label { name: end_label });

        let ctx = self.loops.pop().expect("frame pushed above");
        Ok(ctx.result.unwrap_or_else(|| self.unit.clone()))
      }

      ExprKind::Break { value } => {
        if self.loops.is_empty() {
          return Err(CompileError::internal("break outside of a loop reached IR generation"));
        }
        if let Some(value) = value {
          let value_var = self.visit(value)?;
          let frame = self.loops.len() - 1;
          let dest = match self.loops[frame].result.clone() {
            Some(dest) => dest,
            None => {
              let dest = self.new_var(Self::ty_of(value)?);
              self.loops[frame].result = Some(dest.clone());
              dest
            }
          };
          self.emit(Instruction::Copy {
            source: value_var,
            dest,
          });
        }
        let end_label = self.loops.last().expect("checked above").end_label.clone();
        self.emit(Instruction::Jump { label: end_label });
        Ok(self.unit.clone())
      }

      ExprKind::Continue => {
        let Some(frame) = self.loops.last() else {
          return Err(CompileError::internal("continue outside of a loop reached IR generation"));
        };
        let start_label = frame.start_label.clone();
        self.emit(Instruction::Jump { label: start_label });
        Ok(self.unit.clone())
      }

      ExprKind::VarDecl { name, init, .. } => {
        let init_var = self.visit(init)?;
        let dest = self.new_var(Self::ty_of(init)?);
        self.declare(name, dest.clone());
        self.emit(Instruction::Copy {
          source: init_var,
          dest: dest.clone(),
        });
        Ok(dest)
      }

      ExprKind::Assign { target, value } => {
        let value_var = self.visit(value)?;
        let ExprKind::Ident(name) = &target.kind else {
          return Err(CompileError::internal("assignment to a non-identifier reached IR generation"));
        };
        let target_var = self.lookup(name)?;
        self.emit(Instruction::Copy {
          source: value_var,
          dest: target_var.clone(),
        });
        Ok(target_var)
      }

      ExprKind::Block { statements, result } => {
        self.scopes.push(HashMap::new());
        for statement in statements {
          self.visit(statement)?;
        }
        let block_var = match result {
          Some(result) => self.visit(result)?,
          None => self.unit.clone(),
        };
        self.scopes.pop();
        Ok(block_var)
      }

      ExprKind::Call { callee, args } => {
        let mut arg_vars = Vec::with_capacity(args.len());
        for arg in args {
          arg_vars.push(self.visit(arg)?);
        }
        let dest = self.new_var(Self::ty_of(expr)?);
        self.emit(Instruction::Call {
          fun: IrVar::new(callee.as_str()),
          args: arg_vars,
          dest: dest.clone(),
        });
        Ok(dest)
      }

      ExprKind::Return { value } => {
        let source = match value {
          Some(value) => Some(self.visit(value)?),
          None => None,
        };
        self.emit(Instruction::Return { source });
        Ok(self.unit.clone())
      }
    }
  }

  /// `and` evaluates its right operand only when the left is true, `or`
  /// only when the left is false; both carry the answer through a shared
  /// result variable.
  fn visit_short_circuit(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> CompileResult<IrVar> {
    let lhs_var = self.visit(lhs)?;
    let result = self.new_var(Type::Bool);
    self.emit(Instruction::Copy {
      source: lhs_var.clone(),
      dest: result.clone(),
    });

    let eval_rhs_label = self.new_label();
    let end_label = self.new_label();
    let (then_label, else_label) = match op {
      BinaryOp::And => (eval_rhs_label.clone(), end_label.clone()),
      BinaryOp::Or => (end_label.clone(), eval_rhs_label.clone()),
      _ => unreachable!("only and/or are short-circuiting"),
    };
    self.emit(Instruction::CondJump {
      cond: lhs_var,
      then_label,
      else_label,
    });

    self.emit(Instruction::Label {
      name: eval_rhs_label,
    });
    let rhs_var = self.visit(rhs)?;
    self.emit(Instruction::Copy {
      source: rhs_var,
      dest: result.clone(),
    });
    self.emit(Instruction::Label { name: end_label });
    Ok(result)
  }

  fn visit_if(
    &mut self,
    ty: Type,
    cond: &Expr,
    then_branch: &Expr,
    else_branch: Option<&Expr>,
  ) -> CompileResult<IrVar> {
    let cond_var = self.visit(cond)?;

    let Some(else_branch) = else_branch else {
      // No else: the value is unit, so no merge variable is needed.
      let then_label = self.new_label();
      let end_label = self.new_label();
      self.emit(Instruction::CondJump {
        cond: cond_var,
        then_label: then_label.clone(),
        else_label: end_label.clone(),
      });
      self.emit(Instruction::Label { name: then_label });
      self.visit(then_branch)?;
      self.emit(Instruction::Label { name: end_label });
      return Ok(self.unit.clone());
    };

    let then_label = self.new_label();
    let else_label = self.new_label();
    let end_label = self.new_label();
    let dest = (ty != Type::Unit).then(|| self.new_var(ty));

    self.emit(Instruction::CondJump {
      cond: cond_var,
      then_label: then_label.clone(),
      else_label: else_label.clone(),
    });

    self.emit(Instruction::Label { name: then_label });
    let then_var = self.visit(then_branch)?;
    if let Some(dest) = &dest {
      self.emit(Instruction::Copy {
        source: then_var,
        dest: dest.clone(),
      });
    }
    self.emit(Instruction::Jump {
      label: end_label.clone(),
    });

    self.emit(Instruction::Label { name: else_label });
    let else_var = self.visit(else_branch)?;
    if let Some(dest) = &dest {
      self.emit(Instruction::Copy {
        source: else_var,
        dest: dest.clone(),
      });
    }
    self.emit(Instruction::Label { name: end_label });

    Ok(dest.unwrap_or_else(|| self.unit.clone()))
  }
}
