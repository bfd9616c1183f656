//! Code generation: lower the IR into AT&T x86-64 assembly.
//!
//! Allocation is deliberately naive: every IR variable gets its own 8-byte
//! frame slot and every instruction works through `%rax`. Operator calls
//! whose names match an intrinsic expand to inline sequences; everything
//! else becomes a real `call` following the System V convention.

use std::collections::{HashMap, HashSet};

use crate::ir::{Instruction, IrFunction, IrProgram, IrVar};

const ARG_REGISTERS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

/// Emit assembly for a whole program.
pub fn generate(program: &IrProgram) -> String {
  let mut asm = String::new();
  emit(&mut asm, ".extern print_int");
  emit(&mut asm, ".extern print_bool");
  emit(&mut asm, ".extern read_int");
  emit(&mut asm, ".global main");
  emit(&mut asm, ".type main, @function");
  asm.push('\n');
  emit(&mut asm, ".section .text");

  for fun in &program.functions {
    asm.push('\n');
    generate_function(fun, &mut asm);
  }

  asm
}

fn emit(asm: &mut String, line: &str) {
  asm.push_str("    ");
  asm.push_str(line);
  asm.push('\n');
}

/// Labels are unique per function; prefixing with the function name makes
/// them unique per file, and `.L` keeps them out of the symbol table.
fn local_label(fun_name: &str, label: &str) -> String {
  format!(".L_{fun_name}_{label}")
}

/// Knows the frame slot of every IR variable in one function.
struct Locals {
  slots: HashMap<IrVar, i64>,
  stack_used: i64,
}

impl Locals {
  fn new(variables: &[IrVar]) -> Self {
    let mut slots = HashMap::new();
    let mut offset = 8;
    for var in variables {
      slots.insert(var.clone(), offset);
      offset += 8;
    }
    // Keep the frame a multiple of 16 so call sites stay aligned.
    let mut stack_used = offset - 8;
    if stack_used % 16 != 0 {
      stack_used += 8;
    }
    Self { slots, stack_used }
  }

  /// An assembly reference like `-24(%rbp)` for the slot holding `var`.
  fn reference(&self, var: &IrVar) -> String {
    format!("-{}(%rbp)", self.slots[var])
  }
}

/// Every variable read or written by the function, in order of first
/// appearance (parameters first) so slot assignment is deterministic.
fn collect_variables(fun: &IrFunction) -> Vec<IrVar> {
  let mut seen = HashSet::new();
  let mut variables = Vec::new();

  fn add(var: &IrVar, seen: &mut HashSet<IrVar>, out: &mut Vec<IrVar>) {
    if seen.insert(var.clone()) {
      out.push(var.clone());
    }
  }

  for param in &fun.params {
    add(param, &mut seen, &mut variables);
  }
  for insn in &fun.instructions {
    match insn {
      Instruction::LoadIntConst { dest, .. } | Instruction::LoadBoolConst { dest, .. } => {
        add(dest, &mut seen, &mut variables);
      }
      Instruction::Copy { source, dest } => {
        add(source, &mut seen, &mut variables);
        add(dest, &mut seen, &mut variables);
      }
      Instruction::Call { args, dest, .. } => {
        for arg in args {
          add(arg, &mut seen, &mut variables);
        }
        add(dest, &mut seen, &mut variables);
      }
      Instruction::CondJump { cond, .. } => add(cond, &mut seen, &mut variables),
      Instruction::Return { source: Some(source) } => add(source, &mut seen, &mut variables),
      Instruction::Return { source: None }
      | Instruction::Jump { .. }
      | Instruction::Label { .. } => {}
    }
  }

  variables
}

fn generate_function(fun: &IrFunction, asm: &mut String) {
  let locals = Locals::new(&collect_variables(fun));

  asm.push_str(&fun.name);
  asm.push_str(":\n");
  emit(asm, "pushq %rbp");
  emit(asm, "movq %rsp, %rbp");
  if locals.stack_used > 0 {
    emit(asm, &format!("subq ${}, %rsp", locals.stack_used));
  }

  // The first six incoming arguments land in registers; the rest sit above
  // the return address, starting at 16(%rbp). Copy them all to their slots.
  for (i, param) in fun.params.iter().enumerate() {
    if i < ARG_REGISTERS.len() {
      emit(
        asm,
        &format!("movq {}, {}", ARG_REGISTERS[i], locals.reference(param)),
      );
    } else {
      let offset = 16 + 8 * (i - ARG_REGISTERS.len());
      emit(asm, &format!("movq {offset}(%rbp), %rax"));
      emit(asm, &format!("movq %rax, {}", locals.reference(param)));
    }
  }

  for insn in &fun.instructions {
    emit(asm, &format!("# {insn}"));
    match insn {
      Instruction::Label { name } => {
        asm.push('\n');
        asm.push_str(&local_label(&fun.name, name));
        asm.push_str(":\n");
      }

      Instruction::LoadIntConst { value, dest } => {
        if i32::try_from(*value).is_ok() {
          emit(asm, &format!("movq ${value}, {}", locals.reference(dest)));
        } else {
          // Immediates wider than 32 bits need a register round trip.
          emit(asm, &format!("movabsq ${value}, %rax"));
          emit(asm, &format!("movq %rax, {}", locals.reference(dest)));
        }
      }

      Instruction::LoadBoolConst { value, dest } => {
        let value = if *value { 1 } else { 0 };
        emit(asm, &format!("movq ${value}, {}", locals.reference(dest)));
      }

      Instruction::Copy { source, dest } => {
        emit(asm, &format!("movq {}, %rax", locals.reference(source)));
        emit(asm, &format!("movq %rax, {}", locals.reference(dest)));
      }

      Instruction::Jump { label } => {
        emit(asm, &format!("jmp {}", local_label(&fun.name, label)));
      }

      Instruction::CondJump {
        cond,
        then_label,
        else_label,
      } => {
        emit(asm, &format!("movq {}, %rax", locals.reference(cond)));
        emit(asm, "cmpq $0, %rax");
        emit(asm, &format!("jne {}", local_label(&fun.name, then_label)));
        emit(asm, &format!("jmp {}", local_label(&fun.name, else_label)));
      }

      Instruction::Call { fun: callee, args, dest } => {
        let arg_refs: Vec<String> = args.iter().map(|a| locals.reference(a)).collect();
        if emit_intrinsic(asm, callee.name(), &arg_refs) {
          emit(asm, &format!("movq %rax, {}", locals.reference(dest)));
        } else {
          // Arguments beyond the six register slots go on the stack,
          // pushed right-to-left so the seventh ends up at (%rsp). An
          // 8-byte pad keeps the call boundary 16-byte aligned when an
          // odd number of words is pushed.
          let register_count = arg_refs.len().min(ARG_REGISTERS.len());
          let stack_refs = &arg_refs[register_count..];
          let padded = stack_refs.len() % 2 == 1;
          if padded {
            emit(asm, "subq $8, %rsp");
          }
          for arg_ref in stack_refs.iter().rev() {
            emit(asm, &format!("pushq {arg_ref}"));
          }
          for (i, arg_ref) in arg_refs[..register_count].iter().enumerate() {
            emit(asm, &format!("movq {arg_ref}, {}", ARG_REGISTERS[i]));
          }
          emit(asm, &format!("callq {}", callee.name()));
          let cleanup = 8 * (stack_refs.len() + usize::from(padded));
          if cleanup > 0 {
            emit(asm, &format!("addq ${cleanup}, %rsp"));
          }
          emit(asm, &format!("movq %rax, {}", locals.reference(dest)));
        }
      }

      Instruction::Return { source } => {
        if let Some(source) = source {
          emit(asm, &format!("movq {}, %rax", locals.reference(source)));
        }
        emit(asm, "movq %rbp, %rsp");
        emit(asm, "popq %rbp");
        emit(asm, "ret");
      }
    }
  }
}

/// Expand an operator call in place, leaving the result in `%rax`. Returns
/// false when the callee is not an intrinsic.
fn emit_intrinsic(asm: &mut String, name: &str, args: &[String]) -> bool {
  match name {
    "+" => emit_arithmetic(asm, "addq", args),
    "-" => emit_arithmetic(asm, "subq", args),
    "*" => emit_arithmetic(asm, "imulq", args),
    "/" => {
      emit_division(asm, args);
    }
    "%" => {
      emit_division(asm, args);
      emit(asm, "movq %rdx, %rax");
    }
    "==" => emit_comparison(asm, "sete", args),
    "!=" => emit_comparison(asm, "setne", args),
    "<" => emit_comparison(asm, "setl", args),
    "<=" => emit_comparison(asm, "setle", args),
    ">" => emit_comparison(asm, "setg", args),
    ">=" => emit_comparison(asm, "setge", args),
    "unary_-" => {
      emit(asm, &format!("movq {}, %rax", args[0]));
      emit(asm, "negq %rax");
    }
    // Booleans are 0 or 1, so logical negation is a single bit flip.
    "not" => {
      emit(asm, &format!("movq {}, %rax", args[0]));
      emit(asm, "xorq $1, %rax");
    }
    _ => return false,
  }
  true
}

fn emit_arithmetic(asm: &mut String, op: &str, args: &[String]) {
  emit(asm, &format!("movq {}, %rax", args[0]));
  emit(asm, &format!("{op} {}, %rax", args[1]));
}

/// `idivq` divides `%rdx:%rax`; quotient lands in `%rax`, remainder in
/// `%rdx`.
fn emit_division(asm: &mut String, args: &[String]) {
  emit(asm, &format!("movq {}, %rax", args[0]));
  emit(asm, "cqto");
  emit(asm, &format!("idivq {}", args[1]));
}

fn emit_comparison(asm: &mut String, set: &str, args: &[String]) {
  emit(asm, &format!("movq {}, %rax", args[0]));
  emit(asm, &format!("cmpq {}, %rax", args[1]));
  emit(asm, &format!("{set} %al"));
  emit(asm, "movzbq %al, %rax");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::irgen::generate_ir;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;
  use crate::typecheck::typecheck_module;

  fn compile(input: &str) -> String {
    let mut module = parse(&tokenize(input).unwrap()).unwrap();
    typecheck_module(&mut module).unwrap();
    generate(&generate_ir(&module).unwrap())
  }

  #[test]
  fn header_declares_externs_and_main() {
    let asm = compile("print_int(1);");
    assert!(asm.contains(".extern print_int"), "{asm}");
    assert!(asm.contains(".extern print_bool"), "{asm}");
    assert!(asm.contains(".extern read_int"), "{asm}");
    assert!(asm.contains(".global main"), "{asm}");
    assert!(asm.contains("\nmain:\n"), "{asm}");
  }

  #[test]
  fn prologue_reserves_an_aligned_frame() {
    // x1 (the literal), x2 (the variable) and x3 (main's zero) need 24
    // bytes, rounded up to 32.
    let asm = compile("var x = 1;");
    assert!(asm.contains("pushq %rbp"), "{asm}");
    assert!(asm.contains("movq %rsp, %rbp"), "{asm}");
    assert!(asm.contains("subq $32, %rsp"), "{asm}");
  }

  #[test]
  fn epilogue_restores_the_frame() {
    let asm = compile("print_int(1);");
    assert!(asm.contains("movq %rbp, %rsp"), "{asm}");
    assert!(asm.contains("popq %rbp"), "{asm}");
    assert!(asm.trim_end().ends_with("ret"), "{asm}");
  }

  #[test]
  fn arithmetic_intrinsics_expand_inline() {
    let asm = compile("print_int(1 + 2 * 3);");
    assert!(asm.contains("addq"), "{asm}");
    assert!(asm.contains("imulq"), "{asm}");
    assert!(!asm.contains("callq +"), "{asm}");
  }

  #[test]
  fn division_uses_sign_extension() {
    let asm = compile("print_int(7 / 2);");
    assert!(asm.contains("cqto"), "{asm}");
    assert!(asm.contains("idivq"), "{asm}");
  }

  #[test]
  fn remainder_reads_rdx() {
    let asm = compile("print_int(7 % 2);");
    assert!(asm.contains("movq %rdx, %rax"), "{asm}");
  }

  #[test]
  fn comparisons_use_setcc() {
    let asm = compile("print_bool(1 < 2);");
    assert!(asm.contains("cmpq"), "{asm}");
    assert!(asm.contains("setl %al"), "{asm}");
    assert!(asm.contains("movzbq %al, %rax"), "{asm}");
  }

  #[test]
  fn logical_not_flips_the_low_bit() {
    let asm = compile("print_bool(not true);");
    assert!(asm.contains("xorq $1, %rax"), "{asm}");
    assert!(!asm.contains("notq"), "{asm}");
  }

  #[test]
  fn builtin_calls_pass_the_argument_in_rdi() {
    let asm = compile("print_int(42);");
    assert!(asm.contains("movq -8(%rbp), %rdi"), "{asm}");
    assert!(asm.contains("callq print_int"), "{asm}");
  }

  #[test]
  fn user_functions_spill_parameters_and_get_called() {
    let asm = compile("fun add(a: Int, b: Int): Int { a + b } print_int(add(1, 2));");
    assert!(asm.contains("\nadd:\n"), "{asm}");
    // Parameter spills at the top of `add`.
    assert!(asm.contains("movq %rdi, -8(%rbp)"), "{asm}");
    assert!(asm.contains("movq %rsi, -16(%rbp)"), "{asm}");
    assert!(asm.contains("callq add"), "{asm}");
  }

  #[test]
  fn arguments_beyond_six_are_passed_on_the_stack() {
    let asm = compile(
      "fun sum8(a: Int, b: Int, c: Int, d: Int, e: Int, f: Int, g: Int, h: Int): Int { a + h }\n\
       print_int(sum8(1, 2, 3, 4, 5, 6, 7, 8));",
    );
    // Caller: the seventh and eighth arguments are pushed right-to-left
    // (eighth first) and popped again after the call.
    let eighth = asm.find("pushq -64(%rbp)").expect("eighth argument pushed");
    let seventh = asm.find("pushq -56(%rbp)").expect("seventh argument pushed");
    assert!(eighth < seventh, "{asm}");
    assert!(asm.contains("callq sum8"), "{asm}");
    assert!(asm.contains("addq $16, %rsp"), "{asm}");
    // Callee: stack parameters sit above the return address.
    assert!(asm.contains("movq 16(%rbp), %rax"), "{asm}");
    assert!(asm.contains("movq 24(%rbp), %rax"), "{asm}");
  }

  #[test]
  fn odd_stack_argument_counts_keep_the_call_aligned() {
    let asm = compile(
      "fun sum7(a: Int, b: Int, c: Int, d: Int, e: Int, f: Int, g: Int): Int { g }\n\
       print_int(sum7(1, 2, 3, 4, 5, 6, 7));",
    );
    // One pushed word needs an 8-byte pad; both come off together.
    assert!(asm.contains("subq $8, %rsp"), "{asm}");
    assert!(asm.contains("pushq -56(%rbp)"), "{asm}");
    assert!(asm.contains("addq $16, %rsp"), "{asm}");
  }

  #[test]
  fn labels_are_mangled_per_function() {
    let asm = compile("if true then print_int(1) else print_int(2);");
    assert!(asm.contains(".L_main_L1:"), "{asm}");
    assert!(asm.contains("jne .L_main_L1"), "{asm}");
    assert!(asm.contains("jmp .L_main_L2"), "{asm}");
  }

  #[test]
  fn big_constants_go_through_movabsq() {
    let asm = compile("print_int(4294967296);");
    assert!(asm.contains("movabsq $4294967296, %rax"), "{asm}");
    let asm = compile("print_int(1);");
    assert!(!asm.contains("movabsq"), "{asm}");
  }

  #[test]
  fn every_instruction_is_commented() {
    let asm = compile("print_int(1 + 2);");
    assert!(asm.contains("# LoadIntConst(1, x1)"), "{asm}");
    assert!(asm.contains("# Call(+, [x1, x2], x3)"), "{asm}");
  }
}
