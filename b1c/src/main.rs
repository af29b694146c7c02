//! `b1c` — BASIC compiler CLI.
//!
//! Compiles line-numbered BASIC source to optimized, type-checked IR,
//! lowers it to RV32 assembly text, and (unless `-nc`/`-na`) hands that
//! text to the bundled `a1rv32` pipeline to produce an Intel HEX image.

mod codegen;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rv32asm_core::driver::{self, MemoryMap};
use rv32asm_core::instructions::{build_catalog, Extensions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

/// BASIC compiler: front-end, IR optimizer, type checker, RV32 backend.
#[derive(Parser)]
#[command(name = "b1c")]
#[command(about = "Compile BASIC source to a RISC-V Intel HEX image")]
#[command(version)]
struct Cli {
    /// Source files to compile, concatenated as separate namespaces in order.
    inputs: Vec<PathBuf>,

    /// Print error descriptions alongside codes.
    #[arg(short = 'd')]
    describe: bool,

    /// Heap size in bytes.
    #[arg(long = "hs", value_name = "N")]
    heap_size: Option<u32>,

    /// Library search directory for `<MCU>.cfg`/`<MCU>.io`.
    #[arg(short = 'l', value_name = "DIR")]
    lib_dir: Option<PathBuf>,

    /// List known devices and exit.
    #[arg(long = "ld")]
    list_devices: bool,

    /// List a device's commands and exit.
    #[arg(long = "lc", value_name = "DEV")]
    list_commands: Option<String>,

    /// Target MCU name.
    #[arg(short = 'm', value_name = "MCU")]
    mcu: Option<String>,

    /// Large memory model.
    #[arg(long = "ml")]
    model_large: bool,

    /// Small memory model.
    #[arg(long = "ms")]
    model_small: bool,

    /// Print a memory usage report after assembling.
    #[arg(long = "mu")]
    memory_usage: bool,

    /// Don't run the assembler stage; stop after emitting `.ir`/`.asm`.
    #[arg(long = "na")]
    no_assemble: bool,

    /// Compile only; equivalent to `-na` plus skipping the backend lowering.
    #[arg(long = "nc")]
    compile_only: bool,

    /// Forbid automatic compressed-instruction substitution.
    #[arg(long = "nci")]
    no_auto_compressed: bool,

    /// Disable IR optimization passes.
    #[arg(long = "no")]
    no_optimize: bool,

    /// Output file (default: first input with its extension replaced).
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// RAM base address.
    #[arg(long = "ram_start", value_name = "ADDR")]
    ram_start: Option<String>,

    /// RAM size in bytes.
    #[arg(long = "ram_size", value_name = "N")]
    ram_size: Option<String>,

    /// ROM base address.
    #[arg(long = "rom_start", value_name = "ADDR")]
    rom_start: Option<String>,

    /// ROM size in bytes.
    #[arg(long = "rom_size", value_name = "N")]
    rom_size: Option<String>,

    /// Embed source lines as comments in the emitted IR/assembly text.
    #[arg(short = 's')]
    embed_source: bool,

    /// Stack size in bytes.
    #[arg(long = "ss", value_name = "N")]
    stack_size: Option<u32>,

    /// Target name (default `STM8`; only `RV32` produces a HEX image).
    #[arg(short = 't', default_value = "STM8")]
    target: String,
}

fn parse_addr(text: &str) -> Option<u32> {
    let t = text.trim();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        t.parse().ok()
    }
}

/// `clap` only recognizes `-`/`--`; normalize a legacy `/flag` spelling
/// to `-flag` before parsing, matching the historical compiler's CLI.
fn normalize_argv(args: impl Iterator<Item = String>) -> Vec<String> {
    args.map(|a| if let Some(rest) = a.strip_prefix('/') { format!("-{rest}") } else { a }).collect()
}

/// Render each input file's source as a `;`-prefixed comment block, for
/// `-s`. Neither emitted format (`.ir`/`.asm`) carries per-statement line
/// numbers, so embedding is file-level rather than interleaved per line.
fn embedded_source_header(sources: &[(String, String)]) -> String {
    let mut out = String::new();
    for (name, text) in sources {
        out.push_str(&format!("; --- {name} ---\n"));
        for line in text.lines() {
            out.push_str("; ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn run() -> Result<i32, anyhow::Error> {
    let args = normalize_argv(std::env::args());
    let cli = Cli::try_parse_from(args).map_err(|e| {
        eprintln!("{e}");
        anyhow::anyhow!("bad arguments")
    })?;

    if cli.list_devices || cli.list_commands.is_some() {
        eprintln!("b1c: device listing requires a `-m MCU -l DIR` configuration pair");
        return Ok(1);
    }

    if cli.inputs.is_empty() {
        eprintln!("b1c: no input files");
        return Ok(1);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());
    pb.set_message("compiling...");

    let mut sources = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        match std::fs::read_to_string(path) {
            Ok(text) => sources.push((path.display().to_string(), text)),
            Err(e) => {
                pb.finish_and_clear();
                eprintln!("b1c: cannot read {}: {e}", path.display());
                return Ok(3);
            }
        }
    }

    let (program, _symtab, diag) = match b1c_core::compile(&sources, !cli.no_optimize) {
        Ok(out) => out,
        Err(e) => {
            pb.finish_and_clear();
            if cli.describe {
                eprintln!("b1c: error {}: {e}", e.code());
            } else {
                eprintln!("b1c: error {}", e.code());
            }
            return Ok(e.code() as i32);
        }
    };
    pb.finish_and_clear();

    for warning in diag.iter() {
        eprintln!("b1c: warning: {warning}");
    }

    if cli.compile_only {
        let mut ir_text = b1c_core::ir::text::render_program(&program);
        if cli.embed_source {
            ir_text = embedded_source_header(&sources) + &ir_text;
        }
        let out_path = cli.output.clone().unwrap_or_else(|| cli.inputs[0].with_extension("ir"));
        std::fs::write(&out_path, ir_text).map_err(|e| anyhow::anyhow!("cannot write {}: {e}", out_path.display()))?;
        return Ok(0);
    }

    let mut asm_text = codegen::Codegen::new().lower(&program);
    if cli.embed_source {
        asm_text = embedded_source_header(&sources) + &asm_text;
    }

    if cli.no_assemble {
        let out_path = cli.output.clone().unwrap_or_else(|| cli.inputs[0].with_extension("asm"));
        std::fs::write(&out_path, asm_text).map_err(|e| anyhow::anyhow!("cannot write {}: {e}", out_path.display()))?;
        return Ok(0);
    }

    if cli.target.to_uppercase() != "RV32" {
        eprintln!("b1c: target `{}` has no bundled backend; use -na and hand the `.asm` off manually", cli.target);
        return Ok(1);
    }

    let mut mem = MemoryMap::default();
    if let Some(s) = &cli.ram_start {
        mem.ram_start = parse_addr(s).ok_or_else(|| anyhow::anyhow!("bad -ram_start value `{s}`"))?;
    }
    if let Some(s) = &cli.rom_start {
        mem.rom_start = parse_addr(s).ok_or_else(|| anyhow::anyhow!("bad -rom_start value `{s}`"))?;
    }

    let mut extensions_spec = "IC".to_string();
    if let (Some(lib_dir), Some(mcu)) = (&cli.lib_dir, &cli.mcu) {
        let cfg_path = lib_dir.join(format!("{mcu}.cfg"));
        match std::fs::read_to_string(&cfg_path) {
            Ok(text) => {
                let cfg = rv32asm_core::config::McuConfig::parse(&text).map_err(|e| anyhow::anyhow!("{e}"))?;
                if let Some(ext) = cfg.extensions {
                    extensions_spec = ext;
                }
            }
            Err(e) => {
                eprintln!("b1c: cannot read {}: {e}", cfg_path.display());
                return Ok(3);
            }
        }
    }
    let extensions = Extensions {
        compressed: extensions_spec.contains('C'),
        mul_div: extensions_spec.contains('M'),
        zicsr: extensions_spec.contains('E') || extensions_spec.contains("ZMMUL"),
    };
    let catalog = build_catalog(&extensions, !cli.no_auto_compressed);

    let mut constants: HashMap<String, i64> = HashMap::new();
    if let Some(s) = &cli.ram_size {
        constants.insert("__RAM_SIZE".to_string(), parse_addr(s).ok_or_else(|| anyhow::anyhow!("bad -ram_size value `{s}`"))? as i64);
    }
    if let Some(s) = &cli.rom_size {
        constants.insert("__ROM_SIZE".to_string(), parse_addr(s).ok_or_else(|| anyhow::anyhow!("bad -rom_size value `{s}`"))? as i64);
    }
    if let Some(n) = cli.heap_size {
        constants.insert("__HEAP_SIZE".to_string(), n as i64);
    }
    if let Some(n) = cli.stack_size {
        constants.insert("__STACK_SIZE".to_string(), n as i64);
    }
    let output = match driver::assemble(&asm_text, &catalog, mem, &constants) {
        Ok(out) => out,
        Err(e) => {
            if cli.describe {
                eprintln!("b1c: assembler error {}: {e}", e.code());
            } else {
                eprintln!("b1c: assembler error {}", e.code());
            }
            return Ok(4);
        }
    };

    let out_path = cli.output.clone().unwrap_or_else(|| cli.inputs[0].with_extension("ihx"));
    std::fs::write(&out_path, &output.hex).map_err(|e| anyhow::anyhow!("cannot write {}: {e}", out_path.display()))?;

    if cli.memory_usage {
        println!("ROM: {} bytes used", output.rom_bytes);
        println!("RAM: {} bytes used", output.ram_bytes);
    }

    Ok(0)
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("b1c: {e}");
            ExitCode::from(1)
        }
    }
}
