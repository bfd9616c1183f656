use std::env;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;

fn main() -> anyhow::Result<()> {
  let args: Vec<String> = env::args().collect();
  if args.len() < 2 || args.len() > 3 {
    let program = args.first().map(String::as_str).unwrap_or("lumoc");
    eprintln!("usage: {program} <source-file> [<output-name>]");
    process::exit(1);
  }

  let source_path = PathBuf::from(&args[1]);
  let output = match args.get(2) {
    Some(name) => PathBuf::from(name),
    None => default_output(&source_path),
  };

  let source = std::fs::read_to_string(&source_path)
    .with_context(|| format!("reading {}", source_path.display()))?;

  println!("compiling {}", source_path.display());
  let asm = match lumoc::compile_to_assembly(&source) {
    Ok(asm) => asm,
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  };

  println!("assembling and linking {}", output.display());
  if let Err(err) = lumoc::assembler::assemble(&asm, &output) {
    eprintln!("{err}");
    process::exit(1);
  }

  println!("wrote {}", output.display());
  Ok(())
}

/// Without an explicit output name, `dir/prog.lumo` becomes `dir/prog_out`.
fn default_output(source: &Path) -> PathBuf {
  let stem = source
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "program".to_string());
  source.with_file_name(format!("{stem}_out"))
}
