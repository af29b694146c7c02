//! Storage lifetime passes (§4.10 passes 9–12, 16): eliminating
//! single-use temporaries, eliding redundant zero/empty-string
//! initializers, and collapsing a declaration pair with no live reads
//! left between it and its matching free.
//!
//! None of these passes cross a `CALL`/`RET`/`ERR`/inline-ASM boundary:
//! each operates on the statement span strictly between a declaration and
//! its matching free, bailing out the moment it sees one.

use crate::ir::Stmt;
use crate::value::Value;

use super::{is_literal, reads_of, write_target, UsageStats};

/// Find the index of the `LocalFree`/`GlobalFree` matching the
/// declaration at `start`, provided no other declaration of the same name
/// appears first and no call/return/inline-asm boundary is crossed.
/// Returns `None` when the span isn't safely analyzable.
fn matching_free(stmts: &[Stmt], start: usize, name: &str, is_local: bool) -> Option<usize> {
    for (offset, s) in stmts[start + 1..].iter().enumerate() {
        let i = start + 1 + offset;
        match s {
            Stmt::LocalFree(n) if is_local && n == name => return Some(i),
            Stmt::GlobalFree(n) if !is_local && n == name => return Some(i),
            Stmt::Call(_) | Stmt::Return | Stmt::InlineAsm(_) | Stmt::ErrorTrap { .. } => return None,
            _ => {}
        }
    }
    None
}

/// Pass 9: `LA L … LF L` where `L` is written then read at most once in
/// between collapses — the single read site's operand is replaced by the
/// write's source and the alloc/free/write disappear.
pub fn local_variable_elimination(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < stmts.len() {
        let Stmt::LocalAlloc { local, .. } = &stmts[i] else {
            i += 1;
            continue;
        };
        let name = local.clone();
        let Some(free_idx) = matching_free(stmts, i, &name, true) else {
            i += 1;
            continue;
        };

        let span = &stmts[i + 1..free_idx];
        let write_positions: Vec<usize> = span.iter().enumerate().filter(|(_, s)| write_target(s).is_some_and(|w| w.text == name)).map(|(k, _)| k).collect();
        let read_positions: Vec<usize> = span.iter().enumerate().filter(|(_, s)| reads_of(s).iter().any(|r| r.text == name)).map(|(k, _)| k).collect();

        if write_positions.len() == 1 && read_positions.len() <= 1 {
            let write_at = write_positions[0];
            let Stmt::Assign { src, dst } = &span[write_at] else {
                i += 1;
                continue;
            };
            if src.len() != 1 || dst.len() != 1 {
                i += 1;
                continue;
            }
            let replacement = src[0].clone();
            if let Some(&read_at) = read_positions.first() {
                if read_at == write_at {
                    i += 1;
                    continue;
                }
                replace_read(&mut stmts[i + 1 + read_at], &name, &replacement);
            }
            stmts.remove(free_idx);
            stmts.remove(i + 1 + write_at);
            stmts.remove(i);
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}

fn replace_read(stmt: &mut Stmt, name: &str, replacement: &Value) {
    let targets: &mut [Value] = match stmt {
        Stmt::Assign { src, .. } => src,
        Stmt::Unary { a, .. } => a,
        Stmt::Binary { a, .. } => a,
        Stmt::Compare { a, .. } => a,
        Stmt::TextOut { expr, .. } => expr,
        Stmt::Set { val, .. } => std::slice::from_mut(val),
        Stmt::Ioctl { arg: Some(a), .. } => std::slice::from_mut(a),
        _ => return,
    };
    for v in targets.iter_mut() {
        if v.text == name {
            *v = replacement.clone();
        }
    }
    if let Stmt::Binary { b, .. } = stmt {
        for v in b.iter_mut() {
            if v.text == name {
                *v = replacement.clone();
            }
        }
    }
    if let Stmt::Compare { b, .. } = stmt {
        for v in b.iter_mut() {
            if v.text == name {
                *v = replacement.clone();
            }
        }
    }
}

/// Pass 10: the first write of `0`/`""` to a scalar right after its
/// declaration is redundant — declarations start zeroed — and an
/// immediately repeated identical store is a no-op.
pub fn zero_init_dead_store_removal(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < stmts.len() {
        let decl_name = match &stmts[i] {
            Stmt::LocalAlloc { local, .. } => Some(local.clone()),
            Stmt::GlobalAlloc { var, subs, .. } if subs.is_empty() => Some(var.clone()),
            _ => None,
        };
        if let Some(name) = decl_name {
            if let Some(Stmt::Assign { src, dst }) = stmts.get(i + 1) {
                if dst.len() == 1 && dst[0].text == name && src.len() == 1 && is_zero_or_empty(&src[0]) {
                    stmts.remove(i + 1);
                    changed = true;
                    continue;
                }
            }
        }
        if let (Some(Stmt::Assign { src: s1, dst: d1 }), Some(Stmt::Assign { src: s2, dst: d2 })) = (stmts.get(i), stmts.get(i + 1)) {
            if s1.len() == 1 && d1.len() == 1 && s2.len() == 1 && d2.len() == 1 && d1[0].text == d2[0].text && s1[0].text == s2[0].text {
                stmts.remove(i + 1);
                changed = true;
                continue;
            }
        }
        i += 1;
    }
    changed
}

fn is_zero_or_empty(v: &Value) -> bool {
    v.text == "0" || v.text == "\"\""
}

/// Pass 11: a local allocated, written and freed entirely inside another
/// live local's lifetime — with compatible, non-overlapping use — folds
/// into that outer local, dropping its own `LA`/`LF`. Conservative
/// variant: only handles the case where the inner local is never read
/// (write-only scratch), which is always safe to drop.
pub fn local_reuse(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < stmts.len() {
        let Stmt::LocalAlloc { local, .. } = &stmts[i] else {
            i += 1;
            continue;
        };
        let name = local.clone();
        let Some(free_idx) = matching_free(stmts, i, &name, true) else {
            i += 1;
            continue;
        };
        let span = &stmts[i + 1..free_idx];
        let ever_read = span.iter().any(|s| reads_of(s).iter().any(|r| r.text == name));
        if !ever_read {
            stmts.remove(free_idx);
            stmts.remove(i);
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}

/// Pass 12: when a chain of ops writes through a local `L` and its final
/// write is immediately copied into a variable `E` with no further read
/// of `L`, retarget the chain's last write straight to `E`.
pub fn variable_reuse(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < stmts.len() {
        let Stmt::LocalAlloc { local, .. } = &stmts[i] else {
            i += 1;
            continue;
        };
        let name = local.clone();
        let Some(free_idx) = matching_free(stmts, i, &name, true) else {
            i += 1;
            continue;
        };
        let Some(Stmt::Assign { src, dst }) = stmts.get(free_idx - 1) else {
            i += 1;
            continue;
        };
        if src.len() != 1 || dst.len() != 1 || src[0].text != name || is_literal(&dst[0]) {
            i += 1;
            continue;
        }
        let target = dst[0].clone();
        let last_write = stmts[i + 1..free_idx - 1].iter().enumerate().rev().find(|(_, s)| write_target(s).is_some_and(|w| w.text == name)).map(|(k, _)| k);
        let Some(last_write) = last_write else {
            i += 1;
            continue;
        };
        let still_read_after = stmts[i + 1 + last_write + 1..free_idx - 1].iter().any(|s| reads_of(s).iter().any(|r| r.text == name));
        if still_read_after {
            i += 1;
            continue;
        }
        retarget_write(&mut stmts[i + 1 + last_write], &target);
        stmts.remove(free_idx - 1);
        stmts.remove(free_idx - 1);
        stmts.remove(i);
        changed = true;
    }
    changed
}

fn retarget_write(stmt: &mut Stmt, target: &Value) {
    let dst = match stmt {
        Stmt::Assign { dst, .. } | Stmt::Unary { dst, .. } | Stmt::Binary { dst, .. } => dst,
        _ => return,
    };
    if dst.len() == 1 {
        dst[0] = target.clone();
    }
}

/// Pass 16: a `GA`/`GF` pair around a non-subscripted scalar that is
/// never read (only ever, at most, written) is dead bookkeeping and is
/// dropped along with the pending writes inside it.
pub fn global_alloc_simplification(stmts: &mut Vec<Stmt>, usage: &UsageStats) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < stmts.len() {
        let Stmt::GlobalAlloc { var, subs, .. } = &stmts[i] else {
            i += 1;
            continue;
        };
        if !subs.is_empty() {
            i += 1;
            continue;
        }
        let name = var.clone();
        if usage.read_count(&name) > 0 {
            i += 1;
            continue;
        }
        let Some(free_idx) = matching_free(stmts, i, &name, false) else {
            i += 1;
            continue;
        };
        stmts.drain(i..=free_idx);
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    fn local(name: &str) -> Value {
        Value::new(name, ValueType::Int)
    }

    #[test]
    fn single_use_local_collapses_into_its_reader() {
        let mut stmts = vec![
            Stmt::LocalAlloc { local: "NS0::__LCL_0".to_string(), ty: Value::new("", ValueType::Int) },
            Stmt::Assign { src: vec![Value::int(5)], dst: vec![local("NS0::__LCL_0")] },
            Stmt::Assign { src: vec![local("NS0::__LCL_0")], dst: vec![local("NS0::__VAR_A")] },
            Stmt::LocalFree("NS0::__LCL_0".to_string()),
        ];
        assert!(local_variable_elimination(&mut stmts));
        assert_eq!(stmts.len(), 1);
        assert!(matches!(&stmts[0], Stmt::Assign { src, dst } if src[0].text == "5" && dst[0].text == "NS0::__VAR_A"));
    }

    #[test]
    fn zero_store_right_after_allocation_is_dropped() {
        let mut stmts = vec![
            Stmt::LocalAlloc { local: "NS0::__LCL_0".to_string(), ty: Value::new("", ValueType::Int) },
            Stmt::Assign { src: vec![Value::int(0)], dst: vec![local("NS0::__LCL_0")] },
        ];
        assert!(zero_init_dead_store_removal(&mut stmts));
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn write_only_local_is_removed_entirely() {
        let mut stmts = vec![
            Stmt::LocalAlloc { local: "NS0::__LCL_0".to_string(), ty: Value::new("", ValueType::Int) },
            Stmt::Assign { src: vec![Value::int(1)], dst: vec![local("NS0::__LCL_0")] },
            Stmt::LocalFree("NS0::__LCL_0".to_string()),
        ];
        assert!(local_reuse(&mut stmts));
        assert!(stmts.is_empty());
    }
}
