//! Final stage: prepend the runtime, then hand the assembly to the system
//! toolchain.
//!
//! The runtime is a short piece of assembly carrying `_start` and the three
//! I/O built-ins on raw Linux syscalls, so the produced binaries need no
//! libc. The `.s` file is written next to the output and kept for
//! inspection; the `.o` is removed after linking.

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::error::{CompileError, CompileResult};

/// Program entry point and I/O helpers. `print_int`/`print_bool` append a
/// newline; `read_int` parses one optionally-signed decimal integer from
/// stdin and returns 0 on end of input.
const RUNTIME: &str = r#"# Lumo runtime: entry point and I/O built-ins via Linux syscalls.

    .section .text
    .global _start

_start:
    callq main
    movq %rax, %rdi
    movq $60, %rax              # exit(status)
    syscall

# print_int(value in %rdi): decimal digits and a newline on stdout.
print_int:
    pushq %rbp
    movq %rsp, %rbp
    subq $32, %rsp              # conversion buffer, filled from the end
    movq %rdi, %rax
    leaq -1(%rbp), %rsi
    movb $10, (%rsi)            # trailing newline
    movq $1, %r10               # byte count
    movq $0, %r8                # negative flag
    cmpq $0, %rax
    jge .L_rt_pi_digit
    movq $1, %r8
    negq %rax
.L_rt_pi_digit:
    movq $0, %rdx
    movq $10, %rcx
    divq %rcx                   # quotient in %rax, digit in %rdx
    addq $'0', %rdx
    decq %rsi
    movb %dl, (%rsi)
    incq %r10
    cmpq $0, %rax
    jne .L_rt_pi_digit
    cmpq $0, %r8
    je .L_rt_pi_write
    decq %rsi
    movb $'-', (%rsi)
    incq %r10
.L_rt_pi_write:
    movq $1, %rax               # write(stdout, %rsi, %r10)
    movq $1, %rdi
    movq %r10, %rdx
    syscall
    movq %rbp, %rsp
    popq %rbp
    ret

# print_bool(value in %rdi): "true" or "false" and a newline on stdout.
print_bool:
    pushq %rbp
    movq %rsp, %rbp
    cmpq $0, %rdi
    je .L_rt_pb_false
    leaq .L_rt_true(%rip), %rsi
    movq $5, %rdx
    jmp .L_rt_pb_write
.L_rt_pb_false:
    leaq .L_rt_false(%rip), %rsi
    movq $6, %rdx
.L_rt_pb_write:
    movq $1, %rax               # write(stdout, %rsi, %rdx)
    movq $1, %rdi
    syscall
    movq %rbp, %rsp
    popq %rbp
    ret

# read_int(): one decimal integer from stdin, returned in %rax.
read_int:
    pushq %rbp
    movq %rsp, %rbp
    subq $32, %rsp
    movq $0, %rax               # read(stdin, buffer, 32)
    movq $0, %rdi
    leaq -32(%rbp), %rsi
    movq $32, %rdx
    syscall
    cmpq $0, %rax
    jle .L_rt_ri_zero
    movq %rax, %r11             # bytes left
    leaq -32(%rbp), %r10        # cursor
    movq $0, %rax               # result
    movq $1, %r9                # sign
    movzbq (%r10), %rcx
    cmpq $'-', %rcx
    jne .L_rt_ri_digit
    movq $-1, %r9
    incq %r10
    decq %r11
.L_rt_ri_digit:
    cmpq $0, %r11
    jle .L_rt_ri_done
    movzbq (%r10), %rcx
    subq $'0', %rcx
    cmpq $9, %rcx
    ja .L_rt_ri_done            # unsigned compare rejects non-digits
    imulq $10, %rax
    addq %rcx, %rax
    incq %r10
    decq %r11
    jmp .L_rt_ri_digit
.L_rt_ri_done:
    imulq %r9, %rax
    movq %rbp, %rsp
    popq %rbp
    ret
.L_rt_ri_zero:
    movq $0, %rax
    movq %rbp, %rsp
    popq %rbp
    ret

    .section .rodata
.L_rt_true:
    .ascii "true\n"
.L_rt_false:
    .ascii "false\n"
"#;

/// Assemble and link `asm_code` into an executable at `output`.
pub fn assemble(asm_code: &str, output: &Path) -> CompileResult<()> {
  let as_tool =
    which::which("as").map_err(|_| CompileError::toolchain("as", "not found in PATH"))?;
  let ld_tool =
    which::which("ld").map_err(|_| CompileError::toolchain("ld", "not found in PATH"))?;

  let asm_path = output.with_extension("s");
  let obj_path = output.with_extension("o");

  let mut text = String::with_capacity(RUNTIME.len() + asm_code.len() + 1);
  text.push_str(RUNTIME);
  text.push('\n');
  text.push_str(asm_code);
  fs::write(&asm_path, text)
    .map_err(|e| CompileError::io(format!("writing {}", asm_path.display()), e))?;

  run_tool(
    &as_tool,
    &[
      OsStr::new("--64"),
      OsStr::new("-o"),
      obj_path.as_os_str(),
      asm_path.as_os_str(),
    ],
  )?;
  run_tool(
    &ld_tool,
    &[
      OsStr::new("-m"),
      OsStr::new("elf_x86_64"),
      OsStr::new("-o"),
      output.as_os_str(),
      obj_path.as_os_str(),
    ],
  )?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(output)
      .map_err(|e| CompileError::io(format!("reading {}", output.display()), e))?
      .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(output, permissions)
      .map_err(|e| CompileError::io(format!("marking {} executable", output.display()), e))?;
  }

  let _ = fs::remove_file(&obj_path);
  Ok(())
}

fn run_tool(tool: &Path, args: &[&OsStr]) -> CompileResult<()> {
  let name = tool
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| tool.display().to_string());

  let output = Command::new(tool)
    .args(args)
    .output()
    .map_err(|e| CompileError::io(format!("running {name}"), e))?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    return Err(CompileError::toolchain(
      name,
      format!("{} ({})", stderr.trim(), output.status),
    ));
  }
  Ok(())
}
