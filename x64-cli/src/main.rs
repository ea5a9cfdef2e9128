use clap::Parser;
use std::fs;
use std::path::PathBuf;
use x64_codegen::compile_to_x64;

#[derive(Parser)]
#[command(name = "x64-cli")]
#[command(about = "A code generator translating a restricted LLVM IR subset to x86-64 assembly")]
struct Args {
    /// Path to the IR file to translate
    file: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let Some(file_path) = args.file else {
        eprintln!("Usage: x64-cli <IR file>");
        std::process::exit(1);
    };

    let src = fs::read_to_string(&file_path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", file_path.display(), e);
        std::process::exit(1);
    });

    let asm = compile_to_x64(&src).unwrap_or_else(|e| {
        eprintln!("Couldn't parse the IR: {}", e);
        std::process::exit(1);
    });

    print!("{}", asm);
}
