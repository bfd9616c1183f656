// End-to-end pipeline tests: source text in, assembly text out.

#[cfg(test)]
mod integration {
  use crate::compile_to_assembly;

  #[test]
  fn arithmetic_program_compiles() {
    let asm = compile_to_assembly("print_int(1 + 2 * 3);").unwrap();
    assert!(asm.contains(".global main"), "{asm}");
    assert!(asm.contains("imulq"), "{asm}");
    assert!(asm.contains("addq"), "{asm}");
    assert!(asm.contains("callq print_int"), "{asm}");
  }

  #[test]
  fn read_and_square_compiles() {
    let asm = compile_to_assembly("var x: Int = read_int(); print_int(x * x);").unwrap();
    assert!(asm.contains("callq read_int"), "{asm}");
    assert!(asm.contains("callq print_int"), "{asm}");
  }

  #[test]
  fn counting_loop_compiles() {
    let asm =
      compile_to_assembly("var i: Int = 0; while (i < 3) { print_int(i); i = i + 1; }").unwrap();
    assert!(asm.contains(".L_main_L1:"), "{asm}");
    assert!(asm.contains("jmp .L_main_L1"), "{asm}");
    assert!(asm.contains("setl %al"), "{asm}");
  }

  #[test]
  fn conditional_print_compiles() {
    let asm = compile_to_assembly("if (true) then print_int(1) else print_int(2);").unwrap();
    assert_eq!(asm.matches("callq print_int").count(), 2, "{asm}");
  }

  #[test]
  fn function_call_program_compiles() {
    let asm =
      compile_to_assembly("fun sq(x: Int): Int { return x*x; } print_int(sq(3) + sq(4));")
        .unwrap();
    assert!(asm.contains("\nsq:\n"), "{asm}");
    assert_eq!(asm.matches("callq sq").count(), 2, "{asm}");
    // The function label comes before main, which is emitted last.
    assert!(asm.find("\nsq:\n").unwrap() < asm.find("\nmain:\n").unwrap(), "{asm}");
  }

  #[test]
  fn loop_with_break_compiles() {
    let asm = compile_to_assembly(
      "var i: Int = 0; while (true) { if (i == 3) { break; } print_int(i); i = i + 1; }",
    )
    .unwrap();
    assert!(asm.contains("sete %al"), "{asm}");
    assert!(asm.contains("jmp .L_main_L3"), "{asm}");
  }

  #[test]
  fn logic_program_compiles() {
    let asm = compile_to_assembly("print_bool(1 == 1 and not (2 < 1));").unwrap();
    assert!(asm.contains("callq print_bool"), "{asm}");
    assert!(asm.contains("xorq $1, %rax"), "{asm}");
    // `and` short-circuits; there is no callable named "and".
    assert!(!asm.contains("callq and"), "{asm}");
  }

  #[test]
  fn many_argument_calls_compile_with_stack_spills() {
    let asm = compile_to_assembly(
      "fun sum8(a: Int, b: Int, c: Int, d: Int, e: Int, f: Int, g: Int, h: Int): Int {\n\
         a + b + c + d + e + f + g + h\n\
       }\n\
       print_int(sum8(1, 2, 3, 4, 5, 6, 7, 8));",
    )
    .unwrap();
    assert!(asm.contains("callq sum8"), "{asm}");
    assert!(asm.contains("pushq"), "{asm}");
    assert!(asm.contains("movq 16(%rbp), %rax"), "{asm}");
  }

  #[test]
  fn empty_program_still_produces_a_main() {
    let asm = compile_to_assembly("").unwrap();
    assert!(asm.contains(".global main"), "{asm}");
    assert!(asm.contains("\nmain:\n"), "{asm}");
    assert!(asm.contains("ret"), "{asm}");
  }

  #[test]
  fn lexical_errors_surface_with_location() {
    let err = compile_to_assembly("print_int(1 @ 2);").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("lexical error"), "{rendered}");
    assert!(rendered.contains("1:13"), "{rendered}");
  }

  #[test]
  fn syntax_errors_surface_with_location() {
    let err = compile_to_assembly("print_int(1;").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("syntax error"), "{rendered}");
  }

  #[test]
  fn type_errors_surface_with_location() {
    let err = compile_to_assembly("print_int(true);").unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("type error"), "{rendered}");
    assert!(rendered.contains("argument 1"), "{rendered}");
  }

  #[test]
  fn inconsistent_break_values_are_rejected() {
    let err = compile_to_assembly(
      "while true do { if 1 < 2 then { break 1 } else { break true } }",
    )
    .unwrap_err();
    assert!(err.to_string().contains("earlier break"), "{err}");
  }
}
