//! Assembler driver (C6): load, select, layout, resolve, emit.
//!
//! Statements are laid out at a tentative size (the narrowest variant that
//! generally validates); PC-relative operands are then evaluated against
//! real addresses and re-checked. A statement whose real displacement no
//! longer fits its chosen variant is widened and the whole layout restarts,
//! bounded by §4.6's convergence rule. `.CODE`/`.INIT`/`.CONST` are placed
//! in ROM space, `.DATA`/`.HEAP`/`.STACK` in RAM space — the source has no
//! separate linker step, so the driver itself owns this split (see
//! DESIGN.md).

use std::collections::HashMap;

use log::debug;

use crate::catalog::{Catalog, Selection, VariantId};
use crate::csr::{csr_map, fence_map};
use crate::error::AsmError;
use crate::eval::{eval_atom, EvalContext};
use crate::ihex::{render, HexRegion};
use crate::layout::{SectionKind, SectionTable};
use crate::parser::{flatten_operand_texts, parse_line, signature, DataItem, Operand, ParsedLine, Statement};
use crate::registers::register_map;

/// Memory-map parameters the driver lays sections out against.
#[derive(Debug, Clone, Copy)]
pub struct MemoryMap {
    pub rom_start: u32,
    pub ram_start: u32,
}

impl Default for MemoryMap {
    fn default() -> MemoryMap {
        MemoryMap { rom_start: 0, ram_start: 0x2000_0000 }
    }
}

/// Outcome of a successful assembly.
pub struct AssembleOutput {
    pub hex: String,
    pub rom_bytes: u32,
    pub ram_bytes: u32,
}

struct Stmt {
    line: u32,
    section: SectionKind,
    kind: StmtKind,
    variant: Option<VariantId>,
    address: u32,
}

enum StmtKind {
    Instruction { mnemonic: String, operands: Vec<Operand> },
    Bytes(Vec<String>, u32),
    Str(String),
}

fn is_rom(kind: SectionKind) -> bool {
    matches!(kind, SectionKind::Code | SectionKind::Init | SectionKind::Const)
}

/// Assemble a complete source file against `catalog`, producing an Intel
/// HEX image. `constants` supplies predefined named constants (from the
/// MCU `.cfg` and any `-ram_*`/`-rom_*` command-line overrides already
/// folded in by the caller).
pub fn assemble(source: &str, catalog: &Catalog, mem: MemoryMap, constants: &HashMap<String, i64>) -> Result<AssembleOutput, AsmError> {
    let mut stmts: Vec<Stmt> = Vec::new();
    let mut label_at_stmt: HashMap<String, usize> = HashMap::new();
    let mut current_section: Option<SectionKind> = None;

    for (idx, raw_line) in source.lines().enumerate() {
        let lineno = idx as u32 + 1;
        let Some(ParsedLine { label, stmt }) = parse_line(raw_line, lineno)? else { continue };

        if let Some(name) = label {
            label_at_stmt.insert(name, stmts.len());
        }

        match stmt {
            None => {}
            Some(Statement::SectionBegin(kind)) => current_section = Some(kind),
            Some(Statement::Data(item)) => {
                let section = current_section.ok_or_else(|| AsmError::Syntax { line: lineno, detail: "data directive outside any section".into() })?;
                let kind = match item {
                    DataItem::Bytes(vals) => StmtKind::Bytes(vals, 1),
                    DataItem::Halves(vals) => StmtKind::Bytes(vals, 2),
                    DataItem::Words(vals) => StmtKind::Bytes(vals, 4),
                    DataItem::Str(s) => StmtKind::Str(s),
                };
                stmts.push(Stmt { line: lineno, section, kind, variant: None, address: 0 });
            }
            Some(Statement::Instruction { mnemonic, operands }) => {
                let section = current_section.ok_or_else(|| AsmError::Syntax { line: lineno, detail: "instruction outside any section".into() })?;
                stmts.push(Stmt { line: lineno, section, kind: StmtKind::Instruction { mnemonic, operands }, variant: None, address: 0 });
            }
        }
    }

    let registers = register_map();
    let csr = csr_map();
    let fence = fence_map();
    let mut labels: HashMap<String, i64> = HashMap::new();

    let max_passes = 256;
    for pass in 0..max_passes {
        let (rom_size, ram_size) = layout(&mut stmts, catalog, mem, &labels, &csr, &fence, &registers, constants)?;

        labels.clear();
        for (name, idx) in &label_at_stmt {
            let addr = stmts.get(*idx).map(|s| s.address).unwrap_or(mem.rom_start + rom_size);
            labels.insert(name.clone(), addr as i64);
        }

        let mut widened = false;
        for i in 0..stmts.len() {
            let (mnemonic, operands) = match &stmts[i].kind {
                StmtKind::Instruction { mnemonic, operands } => (mnemonic.clone(), operands.clone()),
                _ => continue,
            };
            let ctx = EvalContext { labels: &labels, csr: &csr, fence: &fence, registers: &registers, constants };
            let values = eval_operands(&operands, &ctx, stmts[i].line, stmts[i].address)?;
            let sig = signature(&mnemonic, &operands);
            // Addresses are already resolved at this point, so every
            // argument (PC-relative or not) is validated by the same
            // range/class check; no separate PC-relative mask is needed.
            let mask = vec![false; values.len()];

            match catalog.select(&sig, &values, &mask, stmts[i].variant)? {
                Selection::Found(_) | Selection::Fallback(_) => {}
                Selection::RetryWithVariant(v) => {
                    stmts[i].variant = Some(v);
                    widened = true;
                }
                Selection::Unknown => return Err(AsmError::InvalidInstruction(format!("{sig} at line {}", stmts[i].line))),
            }
        }

        if !widened {
            debug!("layout converged after {} pass(es)", pass + 1);
            return emit(&stmts, catalog, &labels, &csr, &fence, &registers, constants, mem, rom_size, ram_size);
        }
    }

    Err(AsmError::RelOutOfRange("layout did not converge within the bounded pass count".into()))
}

/// Evaluate an instruction's operands to concrete values, subtracting the
/// statement's own address from any operand that names a label (the
/// PC-relative resolve step of §4.6).
fn eval_operands(operands: &[Operand], ctx: &EvalContext, line: u32, address: u32) -> Result<Vec<i64>, AsmError> {
    let texts = flatten_operand_texts(operands);
    let mut values = Vec::with_capacity(texts.len());
    for t in &texts {
        let is_label = ctx.labels.contains_key(t.to_uppercase().as_str());
        let v = eval_atom(t, ctx)?.as_int().ok_or_else(|| AsmError::Eval { line, detail: format!("`{t}` is a string, not a number") })?;
        values.push(if is_label { v - address as i64 } else { v });
    }
    Ok(values)
}

/// Evaluate an operand for sizing purposes only: registers and constants
/// are real (they never depend on layout), but a forward-referenced label
/// is not resolvable yet, so it defaults to `0`. This lets register-class
/// predicates (e.g. the compressed 3-bit register field) validate
/// correctly during layout, while leaving PC-relative ranges to the
/// resolve step below, where a bad `0` guess is caught by the widening
/// retry instead of silently mis-sizing the statement.
fn probe_value(text: &str, ctx: &EvalContext) -> i64 {
    eval_atom(text, ctx).ok().and_then(|v| v.as_int()).unwrap_or(0)
}

/// Lay out every statement in source order, assigning each an address and
/// (for instructions) the smallest variant that looks generally valid with
/// best-effort argument values. Returns the final ROM and RAM sizes.
#[allow(clippy::too_many_arguments)]
fn layout(
    stmts: &mut [Stmt],
    catalog: &Catalog,
    mem: MemoryMap,
    labels: &HashMap<String, i64>,
    csr: &HashMap<String, i64>,
    fence: &HashMap<String, i64>,
    registers: &HashMap<String, i64>,
    constants: &HashMap<String, i64>,
) -> Result<(u32, u32), AsmError> {
    let ctx = EvalContext { labels, csr, fence, registers, constants };
    let mut rom = SectionTable::new();
    let mut ram = SectionTable::new();
    let mut rom_cursor = mem.rom_start;
    let mut ram_cursor = mem.ram_start;
    let mut current_rom: Option<SectionKind> = None;
    let mut current_ram: Option<SectionKind> = None;

    for s in stmts.iter_mut() {
        let table = if is_rom(s.section) { &mut rom } else { &mut ram };
        let current = if is_rom(s.section) { &mut current_rom } else { &mut current_ram };
        let cursor = if is_rom(s.section) { &mut rom_cursor } else { &mut ram_cursor };

        if *current != Some(s.section) {
            if current.is_some() {
                table.end(true)?;
            }
            *cursor = table.begin(s.section, *cursor)?;
            *current = Some(s.section);
        }

        let base = table.sections().last().map(|sec| sec.base + sec.size).unwrap_or(*cursor);
        s.address = base;

        let size = match &s.kind {
            StmtKind::Bytes(vals, unit) => vals.len() as u32 * unit,
            StmtKind::Str(text) => text.len() as u32 + 2,
            StmtKind::Instruction { mnemonic, operands } => {
                let sig = signature(mnemonic, operands);
                let texts = flatten_operand_texts(operands);
                let probed: Vec<i64> = texts.iter().map(|t| probe_value(t, &ctx)).collect();
                let mask = vec![false; probed.len()];
                match catalog.select(&sig, &probed, &mask, s.variant)? {
                    Selection::Found(e) | Selection::Fallback(e) => e.size_bytes() as u32,
                    Selection::RetryWithVariant(v) => {
                        s.variant = Some(v);
                        match catalog.select(&sig, &probed, &mask, Some(v))? {
                            Selection::Found(e) | Selection::Fallback(e) => e.size_bytes() as u32,
                            _ => return Err(AsmError::InvalidInstruction(format!("{sig} at line {}", s.line))),
                        }
                    }
                    Selection::Unknown => return Err(AsmError::InvalidInstruction(format!("{sig} at line {}", s.line))),
                }
            }
        };
        table.add_statement(size);
    }

    if current_rom.is_some() {
        rom.end(true)?;
    }
    if current_ram.is_some() {
        ram.end(true)?;
    }

    Ok((rom.total_size(), ram.total_size()))
}

/// Render every statement's final bytes. Statements within one region
/// (ROM or RAM) are visited in the same increasing-address order layout()
/// assigned them, so their encodings can simply be appended.
fn emit(
    stmts: &[Stmt],
    catalog: &Catalog,
    labels: &HashMap<String, i64>,
    csr: &HashMap<String, i64>,
    fence: &HashMap<String, i64>,
    registers: &HashMap<String, i64>,
    constants: &HashMap<String, i64>,
    mem: MemoryMap,
    rom_size: u32,
    ram_size: u32,
) -> Result<AssembleOutput, AsmError> {
    let mut rom_bytes: Vec<u8> = Vec::new();
    let mut ram_bytes: Vec<u8> = Vec::new();

    for s in stmts {
        let ctx = EvalContext { labels, csr, fence, registers, constants };
        let bytes = match &s.kind {
            StmtKind::Bytes(vals, unit) => {
                let mut out = Vec::new();
                for v in vals {
                    let n = eval_atom(v, &ctx)?.as_int().ok_or_else(|| AsmError::Eval { line: s.line, detail: format!("`{v}` is not numeric") })?;
                    out.extend_from_slice(&n.to_le_bytes()[..*unit as usize]);
                }
                out
            }
            StmtKind::Str(text) => {
                let mut out = Vec::with_capacity(text.len() + 2);
                out.push(text.len() as u8);
                out.extend_from_slice(text.as_bytes());
                out.push(0);
                out
            }
            StmtKind::Instruction { mnemonic, operands } => {
                let values = eval_operands(operands, &ctx, s.line, s.address)?;
                let sig = signature(mnemonic, operands);
                let mask = vec![false; values.len()];
                let enc = match catalog.select(&sig, &values, &mask, s.variant)? {
                    Selection::Found(e) => e,
                    _ => return Err(AsmError::InvalidInstruction(format!("{sig} at line {}", s.line))),
                };
                enc.template.render(&values)?
            }
        };

        if is_rom(s.section) {
            rom_bytes.extend_from_slice(&bytes);
        } else {
            ram_bytes.extend_from_slice(&bytes);
        }
    }

    let regions = [HexRegion { address: mem.rom_start, data: &rom_bytes }, HexRegion { address: mem.ram_start, data: &ram_bytes }];
    let hex = render(&regions);

    Ok(AssembleOutput { hex, rom_bytes: rom_size, ram_bytes: ram_size })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::{build_catalog, Extensions};

    #[test]
    fn assembles_straight_line_code() {
        let catalog = build_catalog(&Extensions { compressed: false, ..Default::default() }, false);
        let src = ".CODE\nADDI X5, X0, 1\nADDI X6, X0, 2\nADD X7, X5, X6\n";
        let out = assemble(src, &catalog, MemoryMap::default(), &HashMap::new()).unwrap();
        assert!(out.rom_bytes > 0);
        assert!(out.hex.starts_with(':'));
    }

    #[test]
    fn branch_to_forward_label_resolves() {
        let catalog = build_catalog(&Extensions { compressed: false, ..Default::default() }, false);
        let src = ".CODE\nBEQ X5, X6, DONE\nADDI X5, X5, 1\nDONE: ADD X0, X0, X0\n";
        let out = assemble(src, &catalog, MemoryMap::default(), &HashMap::new()).unwrap();
        assert!(out.rom_bytes >= 12);
    }

    #[test]
    fn unknown_mnemonic_is_an_error() {
        let catalog = build_catalog(&Extensions { compressed: false, ..Default::default() }, false);
        let src = ".CODE\nFROBNICATE X5\n";
        assert!(assemble(src, &catalog, MemoryMap::default(), &HashMap::new()).is_err());
    }

    #[test]
    fn string_constant_gets_length_prefix_and_terminator() {
        let catalog = build_catalog(&Extensions { compressed: false, ..Default::default() }, false);
        let src = ".CONST\n.STRING \"Hi\"\n";
        let out = assemble(src, &catalog, MemoryMap::default(), &HashMap::new()).unwrap();
        assert!(out.rom_bytes >= 4);
    }
}
