//! Type inference & propagation (C11): an ascending one-pass binder run
//! after the optimizer reaches its fixed point. Rebinds every operand's
//! type from the symbol table, unifies `IIF` arm types, checks standard
//! function call arity/assignability, and injects default values for
//! unsupplied optional user-function arguments.

use crate::error::CompileError;
use crate::ir::{Program, Stmt};
use crate::symtab::SymbolTable;
use crate::value::{Value, ValueType};

/// Arity and argument type accepted by each standard function folded by
/// the optimizer (`optimizer::folding`) — used here only for arity/type
/// checking, not re-evaluation.
fn stdlib_signature(name: &str) -> Option<(usize, ValueType)> {
    match name {
        "LEN" | "ASC" => Some((1, ValueType::String)),
        "CHR" | "STR" => Some((1, ValueType::Int)),
        "VAL" => Some((1, ValueType::String)),
        "CBYTE" | "CINT" | "CWRD" | "CLNG" => Some((1, ValueType::String)),
        "ABS" | "SGN" => Some((1, ValueType::Int)),
        _ => None,
    }
}

/// Widest of two numeric types, BYTE < INT < WORD < LONG.
fn widest_numeric(a: ValueType, b: ValueType) -> ValueType {
    fn rank(t: ValueType) -> u8 {
        match t {
            ValueType::Byte => 0,
            ValueType::Int => 1,
            ValueType::Word => 2,
            ValueType::Long => 3,
            _ => 4,
        }
    }
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}

fn strip_ns_prefix(text: &str) -> (Option<usize>, &str) {
    if let Some(rest) = text.strip_prefix("NS") {
        if let Some(sep) = rest.find("::") {
            if let Ok(idx) = rest[..sep].parse::<usize>() {
                return (Some(idx), &rest[sep + 2..]);
            }
        }
    }
    (None, text)
}

/// Rebind a variable-reference `Value`'s type from the symbol table; a
/// literal or local temporary (whose type was fixed at `LocalAlloc` time)
/// passes through unchanged.
fn rebind(v: &mut Value, symtab: &SymbolTable, ns_idx: usize) {
    if crate::optimizer::is_literal(v) {
        if let Ok(n) = v.text.parse::<i64>() {
            v.ty = ValueType::narrowest_fit(n, v.ty == ValueType::Int);
        }
        return;
    }
    let (ns, rest) = strip_ns_prefix(&v.text);
    let resolve_ns = ns.unwrap_or(ns_idx);
    let raw_name = rest.strip_prefix("__VAR_").or_else(|| rest.strip_prefix("__MEM_"));
    let Some(name) = raw_name else { return };
    let rec = symtab.namespaces.get(resolve_ns).and_then(|n| n.vars.get(name)).or_else(|| symtab.globals.get(name));
    if let Some(rec) = rec {
        v.ty = rec.base_type;
    }
}

fn visit_stmt_values(stmt: &mut Stmt, mut f: impl FnMut(&mut Value)) {
    use Stmt::*;
    match stmt {
        Assign { src, dst } => {
            src.iter_mut().for_each(&mut f);
            dst.iter_mut().for_each(&mut f);
        }
        Unary { a, dst, .. } => {
            a.iter_mut().for_each(&mut f);
            dst.iter_mut().for_each(&mut f);
        }
        Binary { a, b, dst, .. } => {
            a.iter_mut().for_each(&mut f);
            b.iter_mut().for_each(&mut f);
            dst.iter_mut().for_each(&mut f);
        }
        Compare { a, b, .. } => {
            a.iter_mut().for_each(&mut f);
            b.iter_mut().for_each(&mut f);
        }
        ReturnValue(v) | ExtraArg(v) => f(v),
        Read { dst, .. } | TextIn { dst, .. } | Transfer { dst, .. } => dst.iter_mut().for_each(&mut f),
        TextOut { dev, expr } => {
            f(dev);
            expr.iter_mut().for_each(&mut f);
        }
        Get { dev, dst, count } => {
            f(dev);
            dst.iter_mut().for_each(&mut f);
            if let Some(c) = count {
                c.iter_mut().for_each(&mut f);
            }
        }
        Put { dev, src, count } => {
            f(dev);
            src.iter_mut().for_each(&mut f);
            if let Some(c) = count {
                c.iter_mut().for_each(&mut f);
            }
        }
        Set { val, .. } => f(val),
        Ioctl { dev, cmd, arg } => {
            f(dev);
            f(cmd);
            if let Some(a) = arg {
                f(a);
            }
        }
        ErrorTrap { cause, .. } => f(cause),
        Data { values, .. } => values.iter_mut().for_each(&mut f),
        _ => {}
    }
}

/// Unify an `IIF(cond, a, b)` call's two arms into a common result type,
/// erroring when exactly one arm is a string.
fn unify_iif(a: ValueType, b: ValueType) -> Result<ValueType, CompileError> {
    let a_str = a == ValueType::String;
    let b_str = b == ValueType::String;
    if a_str != b_str {
        return Err(CompileError::TypeMismatch { line: 0, detail: "IIF arms must both be numeric or both be STRING".to_string() });
    }
    if a_str {
        Ok(ValueType::String)
    } else {
        Ok(widest_numeric(a, b))
    }
}

fn literal_value_for(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        Value::int(n)
    } else {
        Value::string(text)
    }
}

/// Run type binding, IIF unification, standard-call checking and default
/// argument injection over the whole program.
pub fn infer_types(program: &mut Program, symtab: &SymbolTable) -> Result<(), CompileError> {
    let mut ns_idx = 0usize;
    for stmt in &mut program.stmts {
        if let Stmt::Namespace(name) = stmt {
            if let Some(n) = name.strip_prefix("NS").and_then(|s| s.parse::<usize>().ok()) {
                ns_idx = n;
            }
        }

        if let Stmt::Assign { src, dst } = stmt {
            if let [head, args @ ..] = src.as_slice() {
                if head.ty == ValueType::Label {
                    if head.text == "IIF" && args.len() == 3 {
                        let result_ty = unify_iif(args[1].ty, args[2].ty)?;
                        if let Some(d) = dst.first_mut() {
                            d.ty = result_ty;
                        }
                    } else if let Some((arity, arg_ty)) = stdlib_signature(&head.text) {
                        if args.len() != arity {
                            return Err(CompileError::TypeMismatch { line: 0, detail: format!("{} expects {arity} argument(s)", head.text) });
                        }
                        if !args[0].ty.assignable_to(arg_ty) {
                            return Err(CompileError::TypeMismatch { line: 0, detail: format!("{} argument type mismatch", head.text) });
                        }
                    } else if let Some(rec) = symtab.namespaces.get(ns_idx).and_then(|n| n.funcs.get(head.text.as_str())).or_else(|| symtab.global_funcs.get(head.text.as_str())) {
                        inject_defaults(src, rec.args.as_slice())?;
                    }
                }
            }
        }

        visit_stmt_values(stmt, |v| rebind(v, symtab, ns_idx));
    }
    Ok(())
}

fn inject_defaults(src: &mut Vec<Value>, params: &[(ValueType, bool, Option<String>)]) -> Result<(), CompileError> {
    let supplied = src.len() - 1;
    if supplied > params.len() {
        return Err(CompileError::TypeMismatch { line: 0, detail: "too many arguments".to_string() });
    }
    for param in &params[supplied..] {
        let (_, optional, default) = param;
        if !optional {
            return Err(CompileError::TypeMismatch { line: 0, detail: "missing required argument".to_string() });
        }
        let value = default.as_deref().map(literal_value_for).unwrap_or(Value::int(0));
        src.push(value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iif_with_mismatched_arm_types_errors() {
        let err = unify_iif(ValueType::Int, ValueType::String).unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch { .. }));
    }

    #[test]
    fn iif_with_numeric_arms_widens() {
        let ty = unify_iif(ValueType::Byte, ValueType::Long).unwrap();
        assert_eq!(ty, ValueType::Long);
    }

    #[test]
    fn missing_optional_argument_gets_its_default() {
        let mut src = vec![Value::new("GREET", ValueType::Label), Value::string("hi")];
        let params = vec![(ValueType::String, false, None), (ValueType::Int, true, Some("7".to_string()))];
        inject_defaults(&mut src, &params).unwrap();
        assert_eq!(src.len(), 3);
        assert_eq!(src[2].text, "7");
    }

    #[test]
    fn missing_required_argument_is_an_error() {
        let mut src = vec![Value::new("GREET", ValueType::Label)];
        let params = vec![(ValueType::String, false, None)];
        assert!(inject_defaults(&mut src, &params).is_err());
    }
}
