//! Function-call folding and small-function inline expansion (§4.10
//! passes 14–15): calls into `Value::Call`-shaped `Assign`s whose callee
//! is a recognized standard function are either evaluated immediately
//! (when the argument is a literal) or expanded into their equivalent
//! branchless/branchy IR (`ABS`, `SGN`) when it is not.

use crate::ir::{CompareOp, Stmt, UnaryOp};
use crate::value::{Value, ValueType};

use super::{is_literal, literal_int};

/// Standard functions with a single literal argument folded directly into
/// their result: `LEN`, `ASC`, `CHR$`, `VAL`, `CBYTE`/`CINT`/`CWRD`/`CLNG`,
/// `STR$` (the frontend strips the `$`/`%` return-type suffix from call
/// names the same way it does for variables, so these match on `CHR`/`STR`).
pub fn immediate_function_folding(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    for s in stmts.iter_mut() {
        let Stmt::Assign { src, dst } = s else { continue };
        let [head, arg] = src.as_slice() else { continue };
        if head.ty != ValueType::Label || !is_literal(arg) {
            continue;
        }
        let folded = match head.text.as_str() {
            "LEN" => string_literal_body(arg).map(|s| Value::int(s.chars().count() as i64)),
            "ASC" => string_literal_body(arg).and_then(|s| s.chars().next()).map(|c| Value::int(c as i64)),
            "CHR" => literal_int(arg).and_then(|n| char::from_u32(n as u32)).map(|c| Value::string(&c.to_string())),
            "VAL" => string_literal_body(arg).map(|s| Value::int(s.trim().parse().unwrap_or(0))),
            "CBYTE" | "CINT" | "CWRD" | "CLNG" => string_literal_body(arg).map(|s| Value::int(s.trim().parse().unwrap_or(0))),
            "STR" => literal_int(arg).map(|n| Value::string(&n.to_string())),
            _ => None,
        };
        if let Some(v) = folded {
            *s = Stmt::Assign { src: vec![v], dst: std::mem::take(dst) };
            changed = true;
        }
    }
    changed
}

fn string_literal_body(v: &Value) -> Option<String> {
    if v.ty != ValueType::String {
        return None;
    }
    v.text.strip_prefix('"').and_then(|s| s.strip_suffix('"')).map(|s| s.to_string())
}

/// `ABS`/`SGN` calls on a literal argument are evaluated directly; on a
/// variable argument they expand into the branchless/branchy sequences
/// §4.10 names (`ABS` conditional-negate, `SGN` 3-way select), using a
/// locally-scoped label counter so the pass needs no builder.
pub fn inline_abs_sgn(stmts: &mut Vec<Stmt>) -> bool {
    let mut changed = false;
    let mut counter = 0u32;
    let mut i = 0;
    while i < stmts.len() {
        let Stmt::Assign { src, dst } = &stmts[i] else {
            i += 1;
            continue;
        };
        let [head, arg] = src.as_slice() else {
            i += 1;
            continue;
        };
        if head.ty != ValueType::Label || dst.len() != 1 {
            i += 1;
            continue;
        }
        let dst0 = dst[0].clone();
        let arg0 = arg.clone();
        let expanded = match head.text.as_str() {
            "ABS" => Some(expand_abs(&arg0, &dst0, &mut counter)),
            "SGN" => Some(expand_sgn(&arg0, &dst0, &mut counter)),
            _ => None,
        };
        if let Some(replacement) = expanded {
            stmts.splice(i..i + 1, replacement.clone());
            i += replacement.len();
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}

fn expand_abs(arg: &Value, dst: &Value, counter: &mut u32) -> Vec<Stmt> {
    if let Some(n) = literal_int(arg) {
        return vec![Stmt::Assign { src: vec![Value::int(n.abs())], dst: vec![dst.clone()] }];
    }
    let skip = fresh_label(counter);
    vec![
        Stmt::Compare { op: CompareOp::Ge, a: vec![arg.clone()], b: vec![Value::int(0)] },
        Stmt::Assign { src: vec![arg.clone()], dst: vec![dst.clone()] },
        Stmt::JumpIfTrue(skip.clone()),
        Stmt::Unary { op: UnaryOp::Neg, a: vec![arg.clone()], dst: vec![dst.clone()] },
        Stmt::Label(skip),
    ]
}

fn expand_sgn(arg: &Value, dst: &Value, counter: &mut u32) -> Vec<Stmt> {
    if let Some(n) = literal_int(arg) {
        return vec![Stmt::Assign { src: vec![Value::int(n.signum())], dst: vec![dst.clone()] }];
    }
    let positive = fresh_label(counter);
    let done = fresh_label(counter);
    let negative = fresh_label(counter);
    vec![
        Stmt::Compare { op: CompareOp::Gt, a: vec![arg.clone()], b: vec![Value::int(0)] },
        Stmt::JumpIfTrue(positive.clone()),
        Stmt::Compare { op: CompareOp::Lt, a: vec![arg.clone()], b: vec![Value::int(0)] },
        Stmt::JumpIfTrue(negative.clone()),
        Stmt::Assign { src: vec![Value::int(0)], dst: vec![dst.clone()] },
        Stmt::Jump(done.clone()),
        Stmt::Label(negative),
        Stmt::Assign { src: vec![Value::int(-1)], dst: vec![dst.clone()] },
        Stmt::Jump(done.clone()),
        Stmt::Label(positive),
        Stmt::Assign { src: vec![Value::int(1)], dst: vec![dst.clone()] },
        Stmt::Label(done),
    ]
}

fn fresh_label(counter: &mut u32) -> String {
    let name = format!("__OPT_{counter}");
    *counter += 1;
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_of_literal_string_folds() {
        let mut stmts = vec![Stmt::Assign {
            src: vec![Value::new("LEN", ValueType::Label), Value::string("hey")],
            dst: vec![Value::new("NS0::__LCL_0", ValueType::Int)],
        }];
        assert!(immediate_function_folding(&mut stmts));
        assert!(matches!(&stmts[0], Stmt::Assign { src, .. } if src[0].text == "3"));
    }

    #[test]
    fn abs_of_literal_folds_directly() {
        let mut stmts = vec![Stmt::Assign { src: vec![Value::new("ABS", ValueType::Label), Value::int(-5)], dst: vec![Value::new("NS0::__LCL_0", ValueType::Int)] }];
        assert!(inline_abs_sgn(&mut stmts));
        assert_eq!(stmts.len(), 1);
        assert!(matches!(&stmts[0], Stmt::Assign { src, .. } if src[0].text == "5"));
    }

    #[test]
    fn abs_of_variable_expands_to_conditional_negate() {
        let v = Value::new("NS0::__VAR_X", ValueType::Int);
        let mut stmts = vec![Stmt::Assign { src: vec![Value::new("ABS", ValueType::Label), v.clone()], dst: vec![Value::new("NS0::__LCL_0", ValueType::Int)] }];
        assert!(inline_abs_sgn(&mut stmts));
        assert!(stmts.len() > 1);
        assert!(stmts.iter().any(|s| matches!(s, Stmt::Unary { op: UnaryOp::Neg, .. })));
    }
}
