//! The intermediate representation: flat three-address instruction lists.
//!
//! Each function owns a list of instructions, its parameter variables and a
//! side table mapping every IR variable to its type. Variables (`x1`, `x2`,
//! …) and labels (`L1`, `L2`, …) are unique within their function. The
//! `Display` impls render the dump format the IR tests assert against.

use std::collections::HashMap;

use crate::ty::Type;

/// The name of a memory location, parameter or callee.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrVar(String);

impl IrVar {
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  pub fn name(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for IrVar {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone)]
pub enum Instruction {
  LoadIntConst {
    value: i64,
    dest: IrVar,
  },
  LoadBoolConst {
    value: bool,
    dest: IrVar,
  },
  Copy {
    source: IrVar,
    dest: IrVar,
  },
  /// Covers user functions, runtime built-ins and lowered operators; the
  /// callee name decides whether codegen emits an intrinsic sequence or a
  /// real `call`.
  Call {
    fun: IrVar,
    args: Vec<IrVar>,
    dest: IrVar,
  },
  Jump {
    label: String,
  },
  CondJump {
    cond: IrVar,
    then_label: String,
    else_label: String,
  },
  Label {
    name: String,
  },
  Return {
    source: Option<IrVar>,
  },
}

impl std::fmt::Display for Instruction {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Instruction::LoadIntConst { value, dest } => write!(f, "LoadIntConst({value}, {dest})"),
      Instruction::LoadBoolConst { value, dest } => write!(f, "LoadBoolConst({value}, {dest})"),
      Instruction::Copy { source, dest } => write!(f, "Copy({source}, {dest})"),
      Instruction::Call { fun, args, dest } => {
        let args: Vec<&str> = args.iter().map(|a| a.name()).collect();
        write!(f, "Call({fun}, [{}], {dest})", args.join(", "))
      }
      Instruction::Jump { label } => write!(f, "Jump({label})"),
      Instruction::CondJump {
        cond,
        then_label,
        else_label,
      } => write!(f, "CondJump({cond}, {then_label}, {else_label})"),
      Instruction::Label { name } => write!(f, "Label({name})"),
      Instruction::Return { source } => match source {
        Some(source) => write!(f, "Return({source})"),
        None => write!(f, "Return()"),
      },
    }
  }
}

#[derive(Debug, Clone)]
pub struct IrFunction {
  pub name: String,
  pub params: Vec<IrVar>,
  pub instructions: Vec<Instruction>,
  /// Side table giving every IR variable its type.
  pub var_types: HashMap<IrVar, Type>,
}

impl IrFunction {
  pub fn var_type(&self, var: &IrVar) -> Option<&Type> {
    self.var_types.get(var)
  }
}

impl std::fmt::Display for IrFunction {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let params: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
    writeln!(f, "fun {}({}):", self.name, params.join(", "))?;
    for insn in &self.instructions {
      writeln!(f, "  {insn}")?;
    }
    Ok(())
  }
}

/// All functions of a compiled module; user functions first, the
/// synthesized `main` last.
#[derive(Debug, Clone)]
pub struct IrProgram {
  pub functions: Vec<IrFunction>,
}

impl std::fmt::Display for IrProgram {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    for fun in &self.functions {
      write!(f, "{fun}")?;
    }
    Ok(())
  }
}
