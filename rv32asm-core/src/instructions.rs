//! RV32 instruction catalog construction.
//!
//! Builds the [`Catalog`] of RV32I base-integer encodings plus the
//! standard M (mul/div), Zicsr and C (compressed) extensions, and the
//! common pseudo-instructions (`LI`, `LA`, `MV`, `J`, `CALL`, `RET`, ...),
//! including their PC-relative-range fix-up variants. This is a
//! representative subset of the real ISA, not an exhaustive transcription
//! of every RV32GC encoding.

use crate::argtype::{ArgType, RegClass};
use crate::catalog::{ArgPredicate, Catalog, Encoding, VariantId};
use crate::encode::Template;

/// Which optional extensions are active for this assembly.
#[derive(Debug, Clone, Copy)]
pub struct Extensions {
    pub compressed: bool,
    pub mul_div: bool,
    pub zicsr: bool,
}

impl Default for Extensions {
    fn default() -> Self {
        Extensions { compressed: true, mul_div: false, zicsr: false }
    }
}

fn reg(class: RegClass) -> ArgType {
    ArgType::Reg(class)
}

fn imm(bits: u32) -> ArgType {
    let half = 1i64 << (bits - 1);
    ArgType::num(-half..=half - 1)
}

fn pc_rel(bits: u32) -> ArgType {
    let half = 1i64 << (bits - 1);
    ArgType::num(-half..=half - 1).with_multiple_of(2).pc_relative()
}

fn t(s: &str) -> Template {
    Template::parse(s).unwrap_or_else(|e| panic!("builtin template `{s}` failed to parse: {e}"))
}

fn plain(signature: &str, variant: VariantId, types: Vec<ArgType>, speed: u32, tmpl: &str) -> Encoding {
    Encoding {
        signature: signature.to_string(),
        variant,
        arg_types: types,
        template: t(tmpl),
        speed,
        predicate: ArgPredicate::None,
    }
}

/// Build the catalog for the given extension set. `auto_comp` mirrors
/// `GetAutoCompInst()`: when true and `ext.compressed` is set, compressed
/// candidates are registered alongside full-length ones so they win
/// selection by the speed/size metric.
pub fn build_catalog(ext: &Extensions, auto_comp: bool) -> Catalog {
    let mut c = Catalog::new();
    let reg_any = || reg(RegClass::Any);
    let reg_nz = || reg(RegClass::NonZero);
    let reg_c = || reg(RegClass::Compressed);

    register_base_arith(&mut c, &reg_any);
    register_loads_stores(&mut c, &reg_any);
    register_branches_jumps(&mut c, &reg_any);
    register_misc_base(&mut c, &reg_any);

    if ext.mul_div {
        register_mul_div(&mut c, &reg_any);
    }
    if ext.zicsr {
        register_zicsr(&mut c, &reg_any);
    }
    if ext.compressed && auto_comp {
        register_compressed(&mut c, &reg_nz, &reg_c);
    }

    register_pseudo(&mut c, &reg_any);

    c
}

fn register_base_arith(c: &mut Catalog, reg_any: &impl Fn() -> ArgType) {
    let rtype_tmpl = |funct7: u32, funct3: u32| format!("{funct7:x}:7 {{2:0:5}} {{1:0:5}} {funct3:x}:3 {{0:0:5}} 33:7");
    for (mnemonic, funct7, funct3) in [
        ("ADD", 0u32, 0u32),
        ("SUB", 0x20, 0),
        ("SLL", 0, 1),
        ("SLT", 0, 2),
        ("SLTU", 0, 3),
        ("XOR", 0, 4),
        ("SRL", 0, 5),
        ("SRA", 0x20, 5),
        ("OR", 0, 6),
        ("AND", 0, 7),
    ] {
        c.register(plain(
            &format!("{mnemonic}XV,XV,XV"),
            VariantId::Ordinary,
            vec![reg_any(), reg_any(), reg_any()],
            1,
            &rtype_tmpl(funct7, funct3),
        ));
    }

    let itype_tmpl = |funct3: u32| format!("{{2:0:C}} {{1:0:5}} {funct3:x}:3 {{0:0:5}} 13:7");
    for (mnemonic, funct3) in [("ADDI", 0u32), ("SLTI", 2), ("SLTIU", 3), ("XORI", 4), ("ORI", 6), ("ANDI", 7)] {
        c.register(plain(&format!("{mnemonic}XV,XV,V"), VariantId::Ordinary, vec![reg_any(), reg_any(), imm(12)], 1, &itype_tmpl(funct3)));
    }

    for (mnemonic, funct7, funct3) in [("SLLI", 0u32, 1u32), ("SRLI", 0, 5), ("SRAI", 0x20, 5)] {
        c.register(plain(
            &format!("{mnemonic}XV,XV,V"),
            VariantId::Ordinary,
            vec![reg_any(), reg_any(), ArgType::num(0..=31)],
            1,
            &format!("{funct7:x}:7 {{2:0:5}} {{1:0:5}} {funct3:x}:3 {{0:0:5}} 13:7"),
        ));
    }
}

fn register_loads_stores(c: &mut Catalog, reg_any: &impl Fn() -> ArgType) {
    for (mnemonic, funct3) in [("LB", 0u32), ("LH", 1), ("LW", 2), ("LBU", 4), ("LHU", 5)] {
        c.register(plain(
            &format!("{mnemonic}XV,V(XV)"),
            VariantId::Ordinary,
            vec![reg_any(), imm(12), reg_any()],
            1,
            &format!("{{1:0:C}} {{2:0:5}} {funct3:x}:3 {{0:0:5}} 3:7"),
        ));
    }
    // S-type: imm[11:5] | rs2 | rs1 | funct3 | imm[4:0] | opcode.
    for (mnemonic, funct3) in [("SB", 0u32), ("SH", 1), ("SW", 2)] {
        c.register(plain(
            &format!("{mnemonic}XV,V(XV)"),
            VariantId::Ordinary,
            vec![reg_any(), imm(12), reg_any()],
            1,
            &format!("{{1:5:7}} {{0:0:5}} {{2:0:5}} {funct3:x}:3 {{1:0:5}} 23:7"),
        ));
    }
}

fn register_branches_jumps(c: &mut Catalog, reg_any: &impl Fn() -> ArgType) {
    // B-type: imm[12] | imm[10:5] | rs2 | rs1 | funct3 | imm[4:1] | imm[11] | opcode.
    for (mnemonic, funct3) in [("BEQ", 0u32), ("BNE", 1), ("BLT", 4), ("BGE", 5), ("BLTU", 6), ("BGEU", 7)] {
        c.register(plain(
            &format!("{mnemonic}XV,XV,V"),
            VariantId::Ordinary,
            vec![reg_any(), reg_any(), pc_rel(13)],
            1,
            &format!("{{2:C:1}} {{2:5:6}} {{1:0:5}} {{0:0:5}} {funct3:x}:3 {{2:1:4}} {{2:B:1}} 63:7"),
        ));
        // Out-of-range fix-up: invert the condition over a fixed +8 skip,
        // then JAL to the real (21-bit range) target.
        let inverted_funct3 = funct3 ^ 1;
        c.register(plain(
            &format!("{mnemonic}XV,XV,V"),
            VariantId::Ranked(0),
            vec![reg_any(), reg_any(), pc_rel(21)],
            2,
            &format!("0:1 0:6 {{1:0:5}} {{0:0:5}} {inverted_funct3:x}:3 4:4 0:1 63:7 | {{2:14:1}} {{2:1:A}} {{2:B:1}} {{2:C:8}} 0:5 6F:7"),
        ));
    }

    c.register(plain("JALXV,V", VariantId::Ordinary, vec![reg_any(), pc_rel(21)], 1, "{1:14:1} {1:1:A} {1:B:1} {1:C:8} {0:0:5} 6F:7"));
    c.register(plain("JALRXV,V(XV)", VariantId::Ordinary, vec![reg_any(), imm(12), reg_any()], 1, "{1:0:C} {2:0:5} 0:3 {0:0:5} 67:7"));
}

fn register_misc_base(c: &mut Catalog, reg_any: &impl Fn() -> ArgType) {
    for (mnemonic, opcode) in [("LUI", 0x37u32), ("AUIPC", 0x17)] {
        c.register(plain(
            &format!("{mnemonic}XV,V"),
            VariantId::Ordinary,
            vec![reg_any(), ArgType::num(0..=0xFFFFF)],
            1,
            &format!("{{1:0:14}} {{0:0:5}} {opcode:x}:7"),
        ));
    }
    c.register(plain("FENCEV,V", VariantId::Ordinary, vec![ArgType::num(0..=15), ArgType::num(0..=15)], 1, "0:4 {0:0:4} {1:0:4} 0:D 0:3 0:5 F:7"));
}

fn register_mul_div(c: &mut Catalog, reg_any: &impl Fn() -> ArgType) {
    for (mnemonic, funct3) in [("MUL", 0u32), ("MULH", 1), ("MULHSU", 2), ("MULHU", 3), ("DIV", 4), ("DIVU", 5), ("REM", 6), ("REMU", 7)] {
        c.register(plain(
            &format!("{mnemonic}XV,XV,XV"),
            VariantId::Ordinary,
            vec![reg_any(), reg_any(), reg_any()],
            3,
            &format!("1:7 {{2:0:5}} {{1:0:5}} {funct3:x}:3 {{0:0:5}} 33:7"),
        ));
    }
}

fn register_zicsr(c: &mut Catalog, reg_any: &impl Fn() -> ArgType) {
    for (mnemonic, funct3) in [("CSRRW", 1u32), ("CSRRS", 2), ("CSRRC", 3)] {
        c.register(plain(
            &format!("{mnemonic}XV,V,XV"),
            VariantId::Ordinary,
            vec![reg_any(), ArgType::num(0..=0xFFF), reg_any()],
            1,
            &format!("{{1:0:C}} {{2:0:5}} {funct3:x}:3 {{0:0:5}} 73:7"),
        ));
    }
    for (mnemonic, funct3) in [("CSRRWI", 5u32), ("CSRRSI", 6), ("CSRRCI", 7)] {
        c.register(plain(
            &format!("{mnemonic}XV,V,V"),
            VariantId::Ordinary,
            vec![reg_any(), ArgType::num(0..=0xFFF), ArgType::num(0..=31)],
            1,
            &format!("{{1:0:C}} {{2:0:5}} {funct3:x}:3 {{0:0:5}} 73:7"),
        ));
    }
}

fn register_compressed(c: &mut Catalog, reg_nz: &impl Fn() -> ArgType, reg_c: &impl Fn() -> ArgType) {
    // C.ADDI rd, nzimm6 (rd != 0): ADDI rd, rd, imm in [-32,31]
    c.register(plain("ADDIXV,XV,V", VariantId::Ordinary, vec![reg_nz(), reg_nz(), ArgType::num(-32..=31)], 1, "0:3 {2.L12:5:1} {1:0:5} {2.L12:0:5} 1:2"));
    // C.MV rd, rs2 (both != 0): ADDI rd, rs2, 0
    c.register(plain("MVXV,XV", VariantId::Ordinary, vec![reg_nz(), reg_nz()], 1, "2:4 {1:0:5} {0:0:5} 2:2"));
    // C.LI rd, imm6 (rd != 0): LI rd, imm in [-32,31]
    c.register(plain("LIXV,V", VariantId::Ordinary, vec![reg_nz(), ArgType::num(-32..=31)], 1, "0:3 {1.L12:5:1} {0:0:5} {1.L12:0:5} 1:2"));
    // C.LW rd', imm(rs1') (compressed-class registers, imm a multiple of 4, 0..124)
    c.register(plain(
        "LWXV,V(XV)",
        VariantId::Ordinary,
        vec![reg_c(), ArgType::num(0..=124).with_multiple_of(4), reg_c()],
        1,
        "2:3 {1:2:3} {2:0:3} {1:5:1} {1:1:1} {0:0:3} 0:2",
    ));
    // C.SW rs2', imm(rs1')
    c.register(plain(
        "SWXV,V(XV)",
        VariantId::Ordinary,
        vec![reg_c(), ArgType::num(0..=124).with_multiple_of(4), reg_c()],
        1,
        "6:3 {1:2:3} {2:0:3} {1:5:1} {1:1:1} {0:0:3} 0:2",
    ));
    // C.J imm11: J label
    c.register(plain("JV", VariantId::Ordinary, vec![pc_rel(11)], 1, "5:3 {0:0:B} 1:2"));
    // C.JR rs1 (rs1 != 0): JR rs1
    c.register(plain("JRXV", VariantId::Ordinary, vec![reg_nz()], 1, "4:4 {0:0:5} 0:5 2:2"));
}

fn register_pseudo(c: &mut Catalog, reg_any: &impl Fn() -> ArgType) {
    // MV rd, rs: ADDI rd, rs, 0
    c.register(plain("MVXV,XV", VariantId::Ordinary, vec![reg_any(), reg_any()], 1, "0:C {1:0:5} 0:3 {0:0:5} 13:7"));
    // NOT rd, rs: XORI rd, rs, -1
    c.register(plain("NOTXV,XV", VariantId::Ordinary, vec![reg_any(), reg_any()], 1, "FFF:C {1:0:5} 4:3 {0:0:5} 13:7"));
    // NEG rd, rs: SUB rd, x0, rs
    c.register(plain("NEGXV,XV", VariantId::Ordinary, vec![reg_any(), reg_any()], 1, "20:7 {1:0:5} 0:5 0:3 {0:0:5} 33:7"));
    // NOP: ADDI x0, x0, 0
    c.register(plain("NOP", VariantId::Ordinary, vec![], 1, "0:D 0:7"));
    // RET: JALR x0, 0(x1)
    c.register(plain("RET", VariantId::Ordinary, vec![], 1, "0:C 1:5 0:3 0:5 67:7"));
    // J label: JAL x0, label
    c.register(plain("JV", VariantId::Ordinary, vec![pc_rel(21)], 1, "{0:14:1} {0:1:A} {0:B:1} {0:C:8} 0:5 6F:7"));
    // JR rs1: JALR x0, 0(rs1)
    c.register(plain("JRXV", VariantId::Ordinary, vec![reg_any()], 1, "0:C {0:0:5} 0:3 0:5 67:7"));

    // CALL label: JAL x1, label (in-range); widens to AUIPC+JALR when out of range.
    c.register(plain("CALLV", VariantId::Ordinary, vec![pc_rel(21)], 1, "{0:14:1} {0:1:A} {0:B:1} {0:C:8} 1:5 6F:7"));
    c.register(plain(
        "CALLV",
        VariantId::Ranked(0),
        vec![imm(32)],
        2,
        "{0.H20:13:8} {0.H20:B:8} {0.H20:3:4} 6:5 17:7 | {0.L12:B:4} {0.L12:7:8} 6:5 0:3 1:5 67:7",
    ));

    // LI rd, imm12: ADDI rd, x0, imm12; widens to LUI+ADDI for a full 32-bit value.
    c.register(plain("LIXV,V", VariantId::Ordinary, vec![reg_any(), imm(12)], 1, "{1:0:C} 0:5 0:3 {0:0:5} 13:7"));
    c.register(plain(
        "LIXV,V",
        VariantId::Ranked(0),
        vec![reg_any(), imm(32)],
        2,
        "{1.H20:13:8} {1.H20:B:8} {1.H20:3:4} {0:0:5} 37:7 | {1.L12:B:4} {1.L12:7:8} {0:0:5} 0:3 {0:0:5} 13:7",
    ));

    // LA rd, label: same shape as LI (RV32 has no linker relocation, §1 non-goal).
    c.register(plain("LAXV,V", VariantId::Ordinary, vec![reg_any(), imm(12)], 1, "{1:0:C} 0:5 0:3 {0:0:5} 13:7"));
    c.register(plain(
        "LAXV,V",
        VariantId::Ranked(0),
        vec![reg_any(), imm(32)],
        2,
        "{1.H20:13:8} {1.H20:B:8} {1.H20:3:4} {0:0:5} 37:7 | {1.L12:B:4} {1.L12:7:8} {0:0:5} 0:3 {0:0:5} 13:7",
    ));

    // BEQZ/BNEZ rs, label: BEQ/BNE rs, x0, label (same B-type layout, rs2 = x0).
    for (mnemonic, funct3) in [("BEQZ", 0u32), ("BNEZ", 1)] {
        c.register(plain(
            &format!("{mnemonic}XV,V"),
            VariantId::Ordinary,
            vec![reg_any(), pc_rel(13)],
            1,
            &format!("{{1:C:1}} {{1:5:6}} 0:5 {{0:0:5}} {funct3:x}:3 {{1:1:4}} {{1:B:1}} 63:7"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Selection;

    #[test]
    fn addi_selects_in_range() {
        let cat = build_catalog(&Extensions { compressed: false, ..Default::default() }, false);
        let sel = cat.select("ADDIXV,XV,V", &[5, 6, 10], &[false, false, false], None).unwrap();
        assert!(matches!(sel, Selection::Found(_)));
    }

    #[test]
    fn compressed_addi_wins_when_enabled() {
        let cat = build_catalog(&Extensions::default(), true);
        let sel = cat.select("ADDIXV,XV,V", &[5, 5, 10], &[false, false, false], None).unwrap();
        match sel {
            Selection::Found(e) => assert_eq!(e.size_bytes(), 2),
            _ => panic!("expected a compressed match"),
        }
    }

    #[test]
    fn li_32bit_needs_wider_variant() {
        let cat = build_catalog(&Extensions::default(), false);
        let sel = cat.select("LIXV,V", &[10, 0x12345678], &[false, false], None).unwrap();
        assert!(matches!(sel, Selection::Fallback(_) | Selection::RetryWithVariant(_)));
        let sel2 = cat
            .select("LIXV,V", &[10, 0x12345678], &[false, false], Some(crate::catalog::VariantId::Ranked(0)))
            .unwrap();
        assert!(matches!(sel2, Selection::Found(_)));
    }

    #[test]
    fn branch_widens_on_out_of_range() {
        let cat = build_catalog(&Extensions { compressed: false, ..Default::default() }, false);
        // 6 KiB is outside the 13-bit signed range.
        let sel = cat.select("BEQXV,XV,V", &[5, 6, 6144], &[false, false, true], None).unwrap();
        assert!(matches!(sel, Selection::RetryWithVariant(VariantId::Ranked(0))));
    }
}
