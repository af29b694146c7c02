//! IR Optimizer (C10)
//!
//! This module provides optimization passes for the three-address IR (C7).
//! Each pass is a pure function over a statement vector returning whether
//! it changed anything; [`Optimizer::run_to_fixed_point`] drives every pass
//! in the fixed order of §4.10 until a round makes zero changes.
//!
//! # Optimization passes
//! - Label hygiene: unused label removal, duplicate label merge
//! - Control flow: dead code after terminators, redundant jump removal,
//!   comparison reduction
//! - Data flow: duplicate/self assignment removal, constant folding
//! - Storage: local/global allocation elimination and reuse (`locals`)
//! - Folding: immediate function-argument folding and `ABS`/`SGN` inline
//!   expansion (`folding`)
//!
//! Volatile variables, `CALL`/`END`/`RET`/`ERR`/user-function boundaries and
//! inline ASM are never reordered across; passes that cannot prove safety
//! around them leave the surrounding statements untouched.

pub mod folding;
pub mod locals;

use std::collections::HashSet;

use crate::ir::{BinaryOp, CompareOp, Program, Stmt, UnaryOp};
use crate::value::{Value, ValueType};

/// Per-round usage counts, rebuilt at the start of every fixed-point
/// iteration (§4.10 pass 17, "usage recomputation").
#[derive(Debug, Default)]
pub struct UsageStats {
    reads: std::collections::HashMap<String, u32>,
    writes: std::collections::HashMap<String, u32>,
}

impl UsageStats {
    pub fn compute(stmts: &[Stmt]) -> UsageStats {
        let mut stats = UsageStats::default();
        for s in stmts {
            for v in reads_of(s) {
                if !is_literal(v) {
                    *stats.reads.entry(v.text.clone()).or_insert(0) += 1;
                }
            }
            if let Some(w) = write_target(s) {
                if !is_literal(w) {
                    *stats.writes.entry(w.text.clone()).or_insert(0) += 1;
                }
            }
        }
        stats
    }

    pub fn read_count(&self, name: &str) -> u32 {
        *self.reads.get(name).unwrap_or(&0)
    }

    pub fn write_count(&self, name: &str) -> u32 {
        *self.writes.get(name).unwrap_or(&0)
    }
}

/// A canonical textual [`Value`] is a literal when its text parses as a
/// plain integer or is a quoted string (§3); anything else (a qualified
/// `NS::__VAR_`/`__LCL_` name) is a reference.
pub fn is_literal(v: &Value) -> bool {
    v.text.parse::<i64>().is_ok() || (v.text.starts_with('"') && v.text.ends_with('"') && v.text.len() >= 2)
}

fn literal_int(v: &Value) -> Option<i64> {
    v.text.parse::<i64>().ok()
}

/// Values read by a statement, including subscript/index operands of a
/// composite `Arg` (the base of a write target is excluded).
pub fn reads_of(stmt: &Stmt) -> Vec<&Value> {
    use Stmt::*;
    match stmt {
        Assign { src, dst } => chain_tail_reads(src, dst),
        Unary { a, dst, .. } => chain_tail_reads(a, dst),
        Binary { a, b, dst, .. } => {
            let mut v: Vec<&Value> = a.iter().chain(b.iter()).collect();
            if dst.len() > 1 {
                v.extend(dst[1..].iter());
            }
            v
        }
        Compare { a, b, .. } => a.iter().chain(b.iter()).collect(),
        ReturnValue(v) => vec![v],
        Read { dst, .. } | TextIn { dst, .. } => tail(dst),
        TextOut { expr, .. } => expr.iter().collect(),
        Get { dst, count, .. } => {
            let mut v = tail(dst);
            if let Some(c) = count {
                v.extend(c.iter());
            }
            v
        }
        Put { src, count, .. } => {
            let mut v: Vec<&Value> = src.iter().collect();
            if let Some(c) = count {
                v.extend(c.iter());
            }
            v
        }
        Transfer { dst, count, .. } => {
            let mut v = tail(dst);
            if let Some(c) = count {
                v.extend(c.iter());
            }
            v
        }
        ExtraArg(v) => vec![v],
        Set { val, .. } => vec![val],
        Ioctl { arg, .. } => arg.iter().collect(),
        ErrorTrap { cause, .. } => vec![cause],
        Data { values, .. } => values.iter().collect(),
        _ => Vec::new(),
    }
}

fn tail(arg: &[Value]) -> Vec<&Value> {
    if arg.len() > 1 {
        arg[1..].iter().collect()
    } else {
        Vec::new()
    }
}

fn chain_tail_reads<'a>(src: &'a [Value], dst: &'a [Value]) -> Vec<&'a Value> {
    let mut v: Vec<&Value> = src.iter().collect();
    if dst.len() > 1 {
        v.extend(dst[1..].iter());
    }
    v
}

/// The base variable/local a statement assigns into, if any.
pub fn write_target(stmt: &Stmt) -> Option<&Value> {
    use Stmt::*;
    match stmt {
        Assign { dst, .. } | Unary { dst, .. } | Binary { dst, .. } | Read { dst, .. } | TextIn { dst, .. } | Get { dst, .. } | Transfer { dst, .. } => dst.first(),
        _ => None,
    }
}

fn is_terminator(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Jump(_) | Stmt::Return | Stmt::End | Stmt::Stop)
}

/// Statements kept even inside an unreachable span (§4.10 pass 3):
/// declarations that later passes and codegen still need to see.
fn is_declaration_like(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::Data { .. } | Stmt::Def { .. } | Stmt::MappedAlloc { .. } | Stmt::Namespace(_) | Stmt::End | Stmt::Interrupt(_)
    ) || matches!(stmt, Stmt::GlobalAlloc { subs, .. } if !subs.is_empty())
}

/// Every label referenced as a jump/call/restore/error-trap target.
fn referenced_labels(stmts: &[Stmt]) -> HashSet<&str> {
    let mut out = HashSet::new();
    for s in stmts {
        match s {
            Stmt::Jump(l) | Stmt::JumpIfTrue(l) | Stmt::JumpIfFalse(l) | Stmt::Call(l) | Stmt::ErrorTrap { label: l, .. } => {
                out.insert(l.as_str());
            }
            Stmt::Restore { label: Some(l), .. } => {
                out.insert(l.as_str());
            }
            _ => {}
        }
    }
    out
}

fn retarget_label(stmts: &mut [Stmt], from: &str, to: &str) {
    for s in stmts.iter_mut() {
        match s {
            Stmt::Jump(l) | Stmt::JumpIfTrue(l) | Stmt::JumpIfFalse(l) | Stmt::Call(l) if l == from => *l = to.to_string(),
            Stmt::ErrorTrap { label, .. } if label == from => *label = to.to_string(),
            Stmt::Restore { label: Some(l), .. } if l == from => *l = to.to_string(),
            _ => {}
        }
    }
}

/// Drives the §4.10 pass list to a joint fixed point.
#[derive(Debug, Default)]
pub struct Optimizer {
    rounds: u32,
}

impl Optimizer {
    pub fn new() -> Optimizer {
        Optimizer::default()
    }

    pub fn rounds_run(&self) -> u32 {
        self.rounds
    }

    /// Run every pass in §4.10 order, looping until a round changes
    /// nothing. Preserves statement order and never reorders across
    /// `CALL`/`END`/`RET`/`ERR`/inline ASM boundaries.
    pub fn run_to_fixed_point(&mut self, program: &mut Program) {
        loop {
            self.rounds += 1;
            let usage = UsageStats::compute(&program.stmts);
            log::debug!("optimizer round {}: {} statements", self.rounds, program.stmts.len());

            let mut changed = false;
            changed |= unused_label_removal(&mut program.stmts);
            changed |= duplicate_label_merge(&mut program.stmts);
            changed |= dead_code_after_terminators(&mut program.stmts);
            changed |= redundant_jump_removal(&mut program.stmts);
            changed |= duplicate_assignment_removal(&mut program.stmts, &usage);
            changed |= self_assignment_removal(&mut program.stmts);
            changed |= comparison_reduction(&mut program.stmts);
            changed |= unary_constant_fold(&mut program.stmts);
            changed |= locals::local_variable_elimination(&mut program.stmts);
            changed |= locals::zero_init_dead_store_removal(&mut program.stmts);
            changed |= locals::local_reuse(&mut program.stmts);
            changed |= locals::variable_reuse(&mut program.stmts);
            changed |= algebraic_identities(&mut program.stmts);
            changed |= folding::immediate_function_folding(&mut program.stmts);
            changed |= folding::inline_abs_sgn(&mut program.stmts);
            changed |= locals::global_alloc_simplification(&mut program.stmts, &usage);

            if !changed {
                log::debug!("optimizer reached fixed point after {} round(s)", self.rounds);
                break;
            }
        }
    }
}

/// Pass 1: drop labels nothing jumps to.
fn unused_label_removal(stmts: &mut Vec<Stmt>) -> bool {
    let used: HashSet<String> = referenced_labels(stmts).into_iter().map(String::from).collect();
    let before = stmts.len();
    stmts.retain(|s| !matches!(s, Stmt::Label(name) if !used.contains(name.as_str())));
    stmts.len() != before
}

/// Pass 2: collapse a run of labels before the same statement into the
/// first; every reference to a dropped label is redirected.
fn duplicate_label_merge(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < stmts.len() {
        if let Stmt::Label(first) = &stmts[i] {
            let first = first.clone();
            let mut j = i + 1;
            while let Some(Stmt::Label(dup)) = stmts.get(j) {
                let dup = dup.clone();
                retarget_label(stmts, &dup, &first);
                changed = true;
                j += 1;
            }
            stmts.drain(i + 1..j);
        }
        i += 1;
    }
    changed
}

/// Pass 3: between a terminator and the next label, only declarations
/// survive — everything else is unreachable.
fn dead_code_after_terminators(stmts: &mut Vec<Stmt>) -> bool {
    let mut out = Vec::with_capacity(stmts.len());
    let mut unreachable = false;
    let mut changed = false;
    for s in stmts.drain(..) {
        if matches!(s, Stmt::Label(_)) {
            unreachable = false;
        }
        if unreachable && !is_declaration_like(&s) {
            changed = true;
            continue;
        }
        if is_terminator(&s) {
            unreachable = true;
        }
        out.push(s);
    }
    *stmts = out;
    changed
}

/// Pass 4: `JMP L` immediately before `L:` is a no-op; `JF/JT L; JMP/JT/JF
/// L2; L:` collapses into a single inverted conditional jump to `L2`.
fn redundant_jump_removal(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < stmts.len() {
        if let Stmt::Jump(l) = &stmts[i] {
            if matches!(stmts.get(i + 1), Some(Stmt::Label(l2)) if l2 == l) {
                stmts.remove(i);
                changed = true;
                continue;
            }
        }
        let collapse = match (&stmts.get(i), &stmts.get(i + 1), &stmts.get(i + 2)) {
            (Some(Stmt::JumpIfFalse(l1)), Some(Stmt::Jump(l2)), Some(Stmt::Label(l3))) if l1 == l3 => Some((l2.clone(), true)),
            (Some(Stmt::JumpIfTrue(l1)), Some(Stmt::Jump(l2)), Some(Stmt::Label(l3))) if l1 == l3 => Some((l2.clone(), false)),
            _ => None,
        };
        if let Some((target, invert_to_true)) = collapse {
            stmts[i] = if invert_to_true { Stmt::JumpIfTrue(target) } else { Stmt::JumpIfFalse(target) };
            stmts.remove(i + 1);
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}

/// Pass 5: a write to `V` with no read of `V` before the next write along
/// this linear block is dead. Conservative: resets at any label, call,
/// return or inline ASM (anything that could change control flow or read
/// everything).
fn duplicate_assignment_removal(stmts: &mut Vec<Stmt>, usage: &UsageStats) -> bool {
    let mut pending: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut to_remove = HashSet::new();
    for (i, s) in stmts.iter().enumerate() {
        if matches!(s, Stmt::Label(_) | Stmt::Call(_) | Stmt::Return | Stmt::InlineAsm(_) | Stmt::ErrorTrap { .. }) {
            pending.clear();
            continue;
        }
        for r in reads_of(s) {
            pending.remove(&r.text);
        }
        if let Some(w) = write_target(s) {
            if !is_literal(w) && usage.write_count(&w.text) > 1 {
                if let Some(&prev) = pending.get(&w.text) {
                    to_remove.insert(prev);
                }
                pending.insert(w.text.clone(), i);
            } else {
                pending.remove(&w.text);
            }
        }
    }
    if to_remove.is_empty() {
        return false;
    }
    let mut idx = 0;
    stmts.retain(|_| {
        let keep = !to_remove.contains(&idx);
        idx += 1;
        keep
    });
    true
}

/// Pass 6: `=,x,x` is a no-op; `=,A,B` followed immediately by `=,B,A`
/// makes the second one redundant.
fn self_assignment_removal(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < stmts.len() {
        if let Stmt::Assign { src, dst } = &stmts[i] {
            if src.len() == 1 && dst.len() == 1 && src[0].text == dst[0].text {
                stmts.remove(i);
                changed = true;
                continue;
            }
        }
        if let (Some(Stmt::Assign { src: s1, dst: d1 }), Some(Stmt::Assign { src: s2, dst: d2 })) = (stmts.get(i), stmts.get(i + 1)) {
            if s1.len() == 1 && d1.len() == 1 && s2.len() == 1 && d2.len() == 1 && s1[0].text == d2[0].text && d1[0].text == s2[0].text {
                stmts.remove(i + 1);
                changed = true;
                continue;
            }
        }
        i += 1;
    }
    changed
}

fn eval_compare(op: CompareOp, a: i64, b: i64) -> bool {
    match op {
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
        CompareOp::Lt => a < b,
        CompareOp::Gt => a > b,
        CompareOp::Le => a <= b,
        CompareOp::Ge => a >= b,
    }
}

fn eval_compare_identical(op: CompareOp) -> bool {
    matches!(op, CompareOp::Eq | CompareOp::Le | CompareOp::Ge)
}

/// Pass 7: a `Compare` with two literals, or with textually identical
/// operands, folds to a known boolean; the `JT`/`JF` reading it becomes an
/// unconditional `JMP` or is dropped.
fn comparison_reduction(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < stmts.len() {
        let verdict = match &stmts[i] {
            Stmt::Compare { op, a, b } if a.len() == 1 && b.len() == 1 => {
                if let (Some(x), Some(y)) = (literal_int(&a[0]), literal_int(&b[0])) {
                    Some(eval_compare(*op, x, y))
                } else if a[0].text == b[0].text {
                    Some(eval_compare_identical(*op))
                } else {
                    None
                }
            }
            _ => None,
        };
        let Some(result) = verdict else {
            i += 1;
            continue;
        };
        match stmts.get(i + 1) {
            Some(Stmt::JumpIfTrue(l)) => {
                let l = l.clone();
                stmts.remove(i);
                if result {
                    stmts[i] = Stmt::Jump(l);
                } else {
                    stmts.remove(i);
                }
                changed = true;
            }
            Some(Stmt::JumpIfFalse(l)) => {
                let l = l.clone();
                stmts.remove(i);
                if !result {
                    stmts[i] = Stmt::Jump(l);
                } else {
                    stmts.remove(i);
                }
                changed = true;
            }
            _ => {
                stmts.remove(i);
                changed = true;
            }
        }
    }
    changed
}

/// Pass 8: fold a unary op over a literal into a plain `Assign`.
fn unary_constant_fold(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    for s in stmts.iter_mut() {
        if let Stmt::Unary { op, a, dst } = s {
            if a.len() == 1 {
                if let Some(n) = literal_int(&a[0]) {
                    let folded = match op {
                        UnaryOp::Neg => -n,
                        UnaryOp::Not => !n,
                    };
                    *s = Stmt::Assign { src: vec![Value::int(folded)], dst: std::mem::take(dst) };
                    changed = true;
                }
            }
        }
    }
    changed
}

/// Pass 13: algebraic identities on literal operands (`+0`, `*1`, `*0`,
/// `/1`, `%1`, `*-1`) rewrite a `Binary` into a plain `Assign`.
fn algebraic_identities(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    for s in stmts.iter_mut() {
        if let Stmt::Binary { op, a, b, dst } = s {
            if a.len() != 1 || b.len() != 1 {
                continue;
            }
            let lit_a = literal_int(&a[0]);
            let lit_b = literal_int(&b[0]);
            if *op == BinaryOp::Mul && (lit_a == Some(-1) || lit_b == Some(-1)) {
                let operand = if lit_b == Some(-1) { a[0].clone() } else { b[0].clone() };
                *s = Stmt::Unary { op: UnaryOp::Neg, a: vec![operand], dst: std::mem::take(dst) };
                changed = true;
                continue;
            }
            let identity: Option<Value> = match (*op, lit_a, lit_b) {
                (BinaryOp::Add, _, Some(0)) => Some(a[0].clone()),
                (BinaryOp::Add, Some(0), _) => Some(b[0].clone()),
                (BinaryOp::Sub, _, Some(0)) => Some(a[0].clone()),
                (BinaryOp::Mul, _, Some(1)) => Some(a[0].clone()),
                (BinaryOp::Mul, Some(1), _) => Some(b[0].clone()),
                (BinaryOp::Mul, _, Some(0)) | (BinaryOp::Mul, Some(0), _) => Some(Value::int(0)),
                (BinaryOp::Div, _, Some(1)) => Some(a[0].clone()),
                (BinaryOp::Mod, _, Some(1)) => Some(Value::int(0)),
                _ => None,
            };
            if let Some(v) = identity {
                *s = Stmt::Assign { src: vec![v], dst: std::mem::take(dst) };
                changed = true;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    fn var(name: &str) -> Value {
        Value::new(name, ValueType::Int)
    }

    #[test]
    fn drops_labels_nothing_jumps_to() {
        let mut stmts = vec![Stmt::Label("L1".to_string()), Stmt::End];
        assert!(unused_label_removal(&mut stmts));
        assert_eq!(stmts, vec![Stmt::End]);
    }

    #[test]
    fn merges_contiguous_duplicate_labels() {
        let mut stmts = vec![Stmt::Label("A".to_string()), Stmt::Label("B".to_string()), Stmt::Jump("B".to_string())];
        assert!(duplicate_label_merge(&mut stmts));
        assert_eq!(stmts, vec![Stmt::Label("A".to_string()), Stmt::Jump("A".to_string())]);
    }

    #[test]
    fn removes_code_after_unconditional_jump() {
        let mut stmts = vec![Stmt::Jump("X".to_string()), Stmt::Assign { src: vec![Value::int(1)], dst: vec![var("NS0::__VAR_A")] }, Stmt::Label("X".to_string())];
        assert!(dead_code_after_terminators(&mut stmts));
        assert_eq!(stmts, vec![Stmt::Jump("X".to_string()), Stmt::Label("X".to_string())]);
    }

    #[test]
    fn removes_jump_immediately_before_its_own_label() {
        let mut stmts = vec![Stmt::Jump("X".to_string()), Stmt::Label("X".to_string())];
        assert!(redundant_jump_removal(&mut stmts));
        assert_eq!(stmts, vec![Stmt::Label("X".to_string())]);
    }

    #[test]
    fn collapses_skip_jump_into_inverted_conditional() {
        let mut stmts = vec![Stmt::JumpIfFalse("L".to_string()), Stmt::Jump("END".to_string()), Stmt::Label("L".to_string())];
        assert!(redundant_jump_removal(&mut stmts));
        assert_eq!(stmts[0], Stmt::JumpIfTrue("END".to_string()));
    }

    #[test]
    fn self_assignment_is_dropped() {
        let mut stmts = vec![Stmt::Assign { src: vec![var("NS0::__VAR_A")], dst: vec![var("NS0::__VAR_A")] }];
        assert!(self_assignment_removal(&mut stmts));
        assert!(stmts.is_empty());
    }

    #[test]
    fn comparison_of_literals_folds_to_jump() {
        let mut stmts = vec![Stmt::Compare { op: CompareOp::Lt, a: vec![Value::int(1)], b: vec![Value::int(2)] }, Stmt::JumpIfTrue("L".to_string())];
        assert!(comparison_reduction(&mut stmts));
        assert_eq!(stmts, vec![Stmt::Jump("L".to_string())]);
    }

    #[test]
    fn algebraic_identity_add_zero_becomes_assign() {
        let mut stmts = vec![Stmt::Binary { op: BinaryOp::Add, a: vec![var("NS0::__VAR_A")], b: vec![Value::int(0)], dst: vec![var("NS0::__VAR_B")] }];
        assert!(algebraic_identities(&mut stmts));
        assert!(matches!(&stmts[0], Stmt::Assign { src, .. } if src[0].text == "NS0::__VAR_A"));
    }
}
