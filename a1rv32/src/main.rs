//! `a1rv32` — RV32 assembler CLI.
//!
//! Reads RV32 assembly text, selects instruction encodings, lays out
//! sections and resolves labels, and writes an Intel HEX image.

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rv32asm_core::driver::{self, MemoryMap};
use rv32asm_core::instructions::{build_catalog, Extensions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

/// RV32 assembler: instruction selection, layout, Intel HEX emission.
#[derive(Parser)]
#[command(name = "a1rv32")]
#[command(about = "Assemble RV32 assembly into an Intel HEX image")]
#[command(version)]
struct Cli {
    /// Source files to assemble, concatenated in order.
    inputs: Vec<PathBuf>,

    /// Enable automatic section alignment.
    #[arg(short = 'a')]
    auto_align: bool,

    /// Print error descriptions alongside codes.
    #[arg(short = 'd')]
    describe: bool,

    /// Extensions to assume, e.g. `IC`, `IMC` (default `IC`).
    #[arg(long = "ex", default_value = "IC")]
    extensions: String,

    /// Enable the "fix addresses" re-layout pass (on by default internally).
    #[arg(short = 'f')]
    fix_addresses: bool,

    /// Library search directory for `<MCU>.cfg`/`<MCU>.io`.
    #[arg(short = 'l', value_name = "DIR")]
    lib_dir: Option<PathBuf>,

    /// Target MCU name (loads `<MCU>.cfg`/`<MCU>.io` from the library dir).
    #[arg(short = 'm', value_name = "MCU")]
    mcu: Option<String>,

    /// Print a memory usage report after assembling.
    #[arg(long = "mu")]
    memory_usage: bool,

    /// Forbid automatic compressed-instruction substitution.
    #[arg(long = "nci")]
    no_auto_compressed: bool,

    /// Output file (default: first input with a `.ihx` extension).
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

    /// Target architecture; only `RV32` is supported.
    #[arg(short = 't', default_value = "RV32")]
    target: String,
}

/// Accept `0x`-prefixed hex or plain decimal.
fn parse_addr(text: &str) -> Option<u32> {
    let t = text.trim();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        t.parse().ok()
    }
}

/// `clap` only recognizes `-`/`--`; normalize a legacy `/flag` spelling
/// to `-flag` before parsing, matching the historical assembler's CLI.
fn normalize_argv(args: impl Iterator<Item = String>) -> Vec<String> {
    args.map(|a| if let Some(rest) = a.strip_prefix('/') { format!("-{rest}") } else { a }).collect()
}

fn run() -> Result<i32, anyhow::Error> {
    let args = normalize_argv(std::env::args());
    let cli = Cli::try_parse_from(args).map_err(|e| {
        eprintln!("{e}");
        anyhow::anyhow!("bad arguments")
    })?;

    if cli.target.to_uppercase() != "RV32" {
        eprintln!("a1rv32: unsupported target `{}`", cli.target);
        return Ok(1);
    }

    if cli.inputs.is_empty() {
        eprintln!("a1rv32: no input files");
        return Ok(1);
    }

    let mut mem = MemoryMap::default();
    if let Some(s) = &cli.ram_start {
        mem.ram_start = parse_addr(s).ok_or_else(|| anyhow::anyhow!("bad -ram_start value `{s}`"))?;
    }
    if let Some(s) = &cli.rom_start {
        mem.rom_start = parse_addr(s).ok_or_else(|| anyhow::anyhow!("bad -rom_start value `{s}`"))?;
    }

    let mut extensions_spec = cli.extensions.clone();
    if let (Some(lib_dir), Some(mcu)) = (&cli.lib_dir, &cli.mcu) {
        let cfg_path = lib_dir.join(format!("{mcu}.cfg"));
        match std::fs::read_to_string(&cfg_path) {
            Ok(text) => {
                let cfg = rv32asm_core::config::McuConfig::parse(&text)
                    .map_err(|e| anyhow::anyhow!("{}", e))?;
                if let Some(ext) = cfg.extensions {
                    extensions_spec = ext;
                }
                log::debug!("loaded MCU config from {}", cfg_path.display());
            }
            Err(e) => {
                eprintln!("a1rv32: cannot read {}: {e}", cfg_path.display());
                return Ok(2);
            }
        }
    }

    let extensions = Extensions {
        compressed: extensions_spec.contains('C'),
        mul_div: extensions_spec.contains('M'),
        zicsr: extensions_spec.contains('E') || extensions_spec.contains("ZMMUL"),
    };
    let catalog = build_catalog(&extensions, !cli.no_auto_compressed);

    let mut source = String::new();
    for path in &cli.inputs {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                source.push_str(&text);
                source.push('\n');
            }
            Err(e) => {
                eprintln!("a1rv32: cannot read {}: {e}", path.display());
                return Ok(2);
            }
        }
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());
    pb.set_message("assembling...");

    let constants: HashMap<String, i64> = HashMap::new();
    let output = match driver::assemble(&source, &catalog, mem, &constants) {
        Ok(out) => out,
        Err(e) => {
            pb.finish_and_clear();
            if cli.describe {
                eprintln!("a1rv32: error {}: {e}", e.code());
            } else {
                eprintln!("a1rv32: error {}", e.code());
            }
            return Ok(3);
        }
    };
    pb.finish_and_clear();

    let out_path = cli.output.clone().unwrap_or_else(|| cli.inputs[0].with_extension("ihx"));
    if let Err(e) = std::fs::write(&out_path, &output.hex) {
        eprintln!("a1rv32: cannot write {}: {e}", out_path.display());
        return Ok(4);
    }

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
            eprintln!("a1rv32: {e}");
            ExitCode::from(1)
        }
    }
}
