//! Minimal IR-to-RV32-assembly-text lowering.
//!
//! This is a reduced stand-in for the out-of-scope "C1-style backend": it
//! covers straight-line arithmetic, comparisons, unconditional/conditional
//! jumps, calls, and I/O intrinsics against a fixed runtime ABI (`A0..A2`
//! argument registers, `T0`/`T1` scratch, return value in `A0`). Anything
//! outside that subset — subscripted/memory-mapped storage, `DATA`/`READ`/
//! `RESTORE`, multi-argument user-function calls, `DEF` bodies — is emitted
//! as a `; unsupported` comment rather than silently miscompiled, since a
//! full backend is explicitly out of scope.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use b1c_core::ir::{BinaryOp, CompareOp, Program, Stmt, UnaryOp};
use b1c_core::value::Value;

/// Turn an IR qualifier (`NS0::__VAR_A`) into a valid assembly label
/// (`NS0__VAR_A`) — labels may not contain `:`.
fn sanitize(name: &str) -> String {
    name.replace("::", "_")
}

/// A pending `Compare` result, consumed by the `JumpIfTrue`/`JumpIfFalse`
/// that immediately follows it in IR (§4.7's implicit condition).
#[derive(Clone, Copy)]
struct PendingCompare {
    op: CompareOp,
}

/// Lower a finished, optimized, type-checked `Program` into RV32 assembly
/// text suitable for `a1rv32`.
pub struct Codegen {
    out: String,
    pending: Option<PendingCompare>,
}

impl Codegen {
    pub fn new() -> Codegen {
        Codegen { out: String::new(), pending: None }
    }

    pub fn lower(mut self, program: &Program) -> String {
        self.emit_data_section(program);
        writeln!(self.out, ".CODE").unwrap();
        for stmt in &program.stmts {
            self.lower_stmt(stmt);
        }
        self.out
    }

    fn emit_data_section(&mut self, program: &Program) {
        let mut names = BTreeSet::new();
        for stmt in &program.stmts {
            match stmt {
                Stmt::GlobalAlloc { var, subs, .. } if subs.is_empty() => {
                    names.insert(var.clone());
                }
                Stmt::LocalAlloc { local, .. } => {
                    names.insert(local.clone());
                }
                Stmt::GlobalAlloc { var, .. } => {
                    writeln!(self.out, "; unsupported: subscripted global `{var}` (no array layout in the reduced backend)").unwrap();
                }
                Stmt::MappedAlloc { var, .. } => {
                    writeln!(self.out, "; unsupported: memory-mapped `{var}` (no ORG directive in the reduced backend)").unwrap();
                }
                _ => {}
            }
        }
        if names.is_empty() {
            return;
        }
        writeln!(self.out, ".DATA").unwrap();
        for name in names {
            writeln!(self.out, "{}: .WORD 0", sanitize(&name)).unwrap();
        }
    }

    /// Load a scalar `Value` into `reg`: an immediate for literals, a
    /// `LA`+`LW` pair for named storage.
    fn load(&mut self, v: &Value, reg: &str) {
        if let Ok(n) = v.text.parse::<i64>() {
            writeln!(self.out, "LI {reg}, {n}").unwrap();
        } else {
            let label = sanitize(&v.text);
            writeln!(self.out, "LA T1, {label}").unwrap();
            writeln!(self.out, "LW {reg}, 0(T1)").unwrap();
        }
    }

    fn store(&mut self, dst: &Value, reg: &str) {
        let label = sanitize(&dst.text);
        writeln!(self.out, "LA T1, {label}").unwrap();
        writeln!(self.out, "SW {reg}, 0(T1)").unwrap();
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Namespace(ns) => {
                writeln!(self.out, "; namespace {ns}").unwrap();
            }
            Stmt::Interrupt(name) => {
                writeln!(self.out, "; interrupt handler {name}").unwrap();
            }
            Stmt::Def { name, .. } => {
                writeln!(self.out, "; unsupported: DEF body for `{name}` (function bodies are not lowered by the reduced backend)").unwrap();
            }
            Stmt::Label(name) => {
                writeln!(self.out, "{}:", sanitize(name)).unwrap();
            }
            Stmt::GlobalAlloc { .. } | Stmt::MappedAlloc { .. } | Stmt::GlobalFree(_) | Stmt::LocalAlloc { .. } | Stmt::LocalFree(_) => {
                // Storage bookkeeping only; the flat `.DATA` layout has already reserved the slot.
            }
            Stmt::Assign { src, dst } => {
                if let ([value], [target]) = (src.as_slice(), dst.as_slice()) {
                    self.load(value, "T0");
                    self.store(target, "T0");
                } else {
                    writeln!(self.out, "; unsupported: multi-argument call assignment").unwrap();
                }
            }
            Stmt::Unary { op, a, dst } => {
                if let ([value], [target]) = (a.as_slice(), dst.as_slice()) {
                    self.load(value, "T0");
                    match op {
                        UnaryOp::Neg => writeln!(self.out, "SUB T0, X0, T0").unwrap(),
                        UnaryOp::Not => writeln!(self.out, "XORI T0, T0, -1").unwrap(),
                    }
                    self.store(target, "T0");
                } else {
                    writeln!(self.out, "; unsupported: subscripted unary operand").unwrap();
                }
            }
            Stmt::Binary { op, a, b, dst } => {
                if let ([va], [vb], [target]) = (a.as_slice(), b.as_slice(), dst.as_slice()) {
                    self.load(va, "T0");
                    self.load(vb, "T1");
                    match binary_mnemonic(*op) {
                        Some(mn) => writeln!(self.out, "{mn} T0, T0, T1").unwrap(),
                        None => {
                            writeln!(self.out, "; POW has no native RV32 instruction; dispatched to the runtime").unwrap();
                            writeln!(self.out, "MV A0, T0").unwrap();
                            writeln!(self.out, "MV A1, T1").unwrap();
                            writeln!(self.out, "CALL __RT_POW").unwrap();
                            writeln!(self.out, "MV T0, A0").unwrap();
                        }
                    }
                    self.store(target, "T0");
                } else {
                    writeln!(self.out, "; unsupported: subscripted binary operand").unwrap();
                }
            }
            Stmt::Compare { op, a, b } => {
                if let ([va], [vb]) = (a.as_slice(), b.as_slice()) {
                    self.load(va, "T0");
                    self.load(vb, "T1");
                    self.pending = Some(PendingCompare { op: *op });
                } else {
                    writeln!(self.out, "; unsupported: subscripted compare operand").unwrap();
                }
            }
            Stmt::Jump(label) => {
                writeln!(self.out, "J {}", sanitize(label)).unwrap();
            }
            Stmt::JumpIfTrue(label) => self.branch(label, false),
            Stmt::JumpIfFalse(label) => self.branch(label, true),
            Stmt::Call(label) => {
                writeln!(self.out, "CALL {}", sanitize(label)).unwrap();
            }
            Stmt::Return => {
                writeln!(self.out, "RET").unwrap();
            }
            Stmt::ReturnValue(v) => {
                self.load(v, "A0");
                writeln!(self.out, "RET").unwrap();
            }
            Stmt::TextOut { dev, expr } => {
                self.load(dev, "A0");
                for (i, v) in expr.iter().enumerate().take(1) {
                    let reg = if i == 0 { "A1" } else { "A2" };
                    self.load(v, reg);
                }
                writeln!(self.out, "CALL __RT_TEXT_OUT").unwrap();
            }
            Stmt::TextIn { dev, dst } => {
                self.load(dev, "A0");
                writeln!(self.out, "CALL __RT_TEXT_IN").unwrap();
                if let [target] = dst.as_slice() {
                    self.store(target, "A0");
                }
            }
            Stmt::Set { knob, val } => {
                self.load(val, "A0");
                writeln!(self.out, "CALL __RT_SET_{}", knob.to_uppercase()).unwrap();
            }
            Stmt::Ioctl { dev, cmd, arg } => {
                self.load(dev, "A0");
                self.load(cmd, "A1");
                if let Some(a) = arg {
                    self.load(a, "A2");
                }
                writeln!(self.out, "CALL __RT_IOCTL").unwrap();
            }
            Stmt::ErrorTrap { label, .. } => {
                writeln!(self.out, "BNEZ A0, {}", sanitize(label)).unwrap();
            }
            Stmt::End | Stmt::Stop => {
                writeln!(self.out, "CALL __RT_EXIT").unwrap();
            }
            Stmt::InlineAsm(text) => {
                writeln!(self.out, "{text}").unwrap();
            }
            Stmt::Get { .. } | Stmt::Put { .. } | Stmt::Transfer { .. } => {
                writeln!(self.out, "; unsupported: GET/PUT/TRANSFER range lowering").unwrap();
            }
            Stmt::ExtraArg(_) => {
                writeln!(self.out, "; unsupported: XARG decoration").unwrap();
            }
            Stmt::Data { .. } | Stmt::Read { .. } | Stmt::Restore { .. } => {
                writeln!(self.out, "; unsupported: DATA/READ/RESTORE (no runtime data table in the reduced backend)").unwrap();
            }
        }
    }

    fn branch(&mut self, label: &str, invert: bool) {
        let Some(p) = self.pending.take() else {
            writeln!(self.out, "; unsupported: conditional jump with no preceding Compare").unwrap();
            return;
        };
        let op = if invert { p.op.negate() } else { p.op };
        let mnemonic = match op {
            CompareOp::Eq => "BEQ T0, T1,",
            CompareOp::Ne => "BNE T0, T1,",
            CompareOp::Lt => "BLT T0, T1,",
            CompareOp::Ge => "BGE T0, T1,",
            CompareOp::Gt => "BLT T1, T0,",
            CompareOp::Le => "BGE T1, T0,",
        };
        writeln!(self.out, "{mnemonic} {}", sanitize(label)).unwrap();
    }
}

impl Default for Codegen {
    fn default() -> Codegen {
        Codegen::new()
    }
}

fn binary_mnemonic(op: BinaryOp) -> Option<&'static str> {
    match op {
        BinaryOp::Add => Some("ADD"),
        BinaryOp::Sub => Some("SUB"),
        BinaryOp::Mul => Some("MUL"),
        BinaryOp::Div => Some("DIV"),
        BinaryOp::Mod => Some("REM"),
        BinaryOp::And => Some("AND"),
        BinaryOp::Or => Some("OR"),
        BinaryOp::Xor => Some("XOR"),
        BinaryOp::Shl => Some("SLL"),
        BinaryOp::Shr => Some("SRL"),
        BinaryOp::Pow => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use b1c_core::value::ValueType;

    #[test]
    fn lowers_a_literal_assignment_to_a_store() {
        let mut program = Program::new();
        program.push(Stmt::GlobalAlloc { var: "NS0::__VAR_A".to_string(), ty: Value::new("", ValueType::Int), subs: vec![] });
        program.push(Stmt::Assign { src: vec![Value::int(5)], dst: vec![Value::new("NS0::__VAR_A", ValueType::Int)] });
        let text = Codegen::new().lower(&program);
        assert!(text.contains(".DATA"));
        assert!(text.contains("NS0__VAR_A: .WORD 0"));
        assert!(text.contains("LI T0, 5"));
        assert!(text.contains("SW T0, 0(T1)"));
    }

    #[test]
    fn lowers_a_compare_followed_by_jump_if_true() {
        let mut program = Program::new();
        program.push(Stmt::Compare { op: CompareOp::Lt, a: vec![Value::int(1)], b: vec![Value::int(2)] });
        program.push(Stmt::JumpIfTrue("NS0::__ULB_10".to_string()));
        let text = Codegen::new().lower(&program);
        assert!(text.contains("BLT T0, T1, NS0__ULB_10"));
    }

    #[test]
    fn pow_dispatches_to_the_runtime() {
        let mut program = Program::new();
        program.push(Stmt::Binary { op: BinaryOp::Pow, a: vec![Value::int(2)], b: vec![Value::int(3)], dst: vec![Value::new("NS0::__LCL_0", ValueType::Int)] });
        let text = Codegen::new().lower(&program);
        assert!(text.contains("CALL __RT_POW"));
    }
}
