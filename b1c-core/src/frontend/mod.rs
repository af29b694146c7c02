//! BASIC front-end (C8): line-driven statement dispatch emitting IR (C7)
//! through the symbol manager (C9). Parsing runs twice per file — pass 1
//! collects function signatures, CONST/volatile/static/global DIMs and
//! OPTION bindings; pass 2 emits IR using those tables (§4.8).

pub mod expr;
pub mod lexer;

use std::collections::HashMap;

use self::expr::{Condition, Expr, Parser as ExprParser};
use self::lexer::{tokenize, Token};
use crate::error::{CompileError, Diagnostics, WarningKind};
use crate::ir::builder::Builder;
use crate::ir::{Arg, BinaryOp, CompareOp, Program, Stmt};
use crate::symtab::{FuncRecord, SymbolTable, VarRecord};
use crate::value::{Value, ValueType};

struct SourceLine {
    number: Option<u32>,
    text: String,
}

fn split_line_number(raw: &str) -> SourceLine {
    let trimmed = raw.trim_end();
    let mut chars = trimmed.char_indices();
    let mut end = 0;
    for (i, c) in chars.by_ref() {
        if c.is_ascii_digit() {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    if end > 0 {
        let number: u32 = trimmed[..end].parse().unwrap_or(0);
        SourceLine { number: Some(number), text: trimmed[end..].trim_start().to_string() }
    } else {
        SourceLine { number: None, text: trimmed.trim_start().to_string() }
    }
}

struct ForFrame {
    var: Value,
    limit: Value,
    step: Value,
    head: String,
    end: String,
    step_nonneg: bool,
}

struct WhileFrame {
    head: String,
    end: String,
}

struct IfFrame {
    end_label: String,
    next_label: Option<String>,
}

/// Mutable state threaded through one file's two passes.
struct FileState<'a> {
    builder: Builder,
    symtab: &'a mut SymbolTable,
    ns_idx: usize,
    for_stack: Vec<ForFrame>,
    while_stack: Vec<WhileFrame>,
    if_stack: Vec<IfFrame>,
    end_count: u32,
    /// Formal-argument substitution active while translating a `DEF` body;
    /// `None` outside of one. Shadows `symtab` lookups by clean name.
    arg_scope: Option<HashMap<String, Value>>,
}

/// Compile a set of BASIC source files into one linked [`Program`] plus
/// the [`SymbolTable`] built along the way (consumed by the optimizer's
/// companion type checker). Namespaces are assigned `NS<k>` in file order
/// (§4.9).
pub fn compile_files(sources: &[(String, String)]) -> Result<(Program, SymbolTable, Diagnostics), CompileError> {
    let mut symtab = SymbolTable::new();
    let mut diag = Diagnostics::default();
    let mut program = Program::new();

    for (file_name, text) in sources {
        let ns_idx = symtab.add_namespace(file_name.clone());
        let lines: Vec<SourceLine> = text.lines().map(split_line_number).collect();

        run_pass1(&lines, &mut symtab, ns_idx, &mut diag)?;

        let mut state = FileState {
            builder: Builder::new(SymbolTable::ns_prefix(ns_idx)),
            symtab: &mut symtab,
            ns_idx,
            for_stack: Vec::new(),
            while_stack: Vec::new(),
            if_stack: Vec::new(),
            end_count: 0,
            arg_scope: None,
        };

        let mut prev_number = 0u32;
        for line in &lines {
            if line.text.is_empty() {
                continue;
            }
            if let Some(n) = line.number {
                if n <= prev_number && prev_number != 0 {
                    return Err(CompileError::Syntax { line: n, detail: "line numbers must strictly ascend".to_string() });
                }
                prev_number = n;
                state.builder.label(state.builder.source_label(n));
            }
            let toks = tokenize(&line.text);
            dispatch_statement(&mut state, &toks, line.number.unwrap_or(prev_number))?;
        }

        if state.end_count == 0 {
            state.builder.emit(Stmt::End);
        }
        program.stmts.extend(state.builder.program.stmts);
    }

    Ok((program, symtab, diag))
}

/// Pass 1: register CONST/global/static/volatile DIMs, DEF signatures and
/// OPTION bindings; count `END` statements for the multiple-`END` warning.
fn run_pass1(lines: &[SourceLine], symtab: &mut SymbolTable, ns_idx: usize, diag: &mut Diagnostics) -> Result<(), CompileError> {
    let mut end_seen = false;
    for line in lines {
        if line.text.is_empty() {
            continue;
        }
        let toks = tokenize(&line.text);
        let Some(Token::Ident(kw)) = toks.first() else { continue };
        let lineno = line.number.unwrap_or(0);
        match kw.to_uppercase().as_str() {
            "DIM" => {
                pass1_dim(&toks, symtab, ns_idx, lineno, diag)?;
            }
            "OPTION" => {
                pass1_option(&toks, symtab, ns_idx, lineno)?;
            }
            "DEF" => {
                pass1_def(&toks, symtab, ns_idx, lineno);
            }
            "END" => {
                if end_seen {
                    diag.push(lineno, WarningKind::MultipleEnd);
                }
                end_seen = true;
            }
            _ => {}
        }
    }
    Ok(())
}

fn modifier_flags(toks: &[Token]) -> (bool, bool, bool, bool, usize) {
    let mut global = false;
    let mut volatile = false;
    let mut static_ = false;
    let mut const_ = false;
    let mut idx = 1;
    loop {
        match toks.get(idx) {
            Some(Token::Ident(w)) if w.eq_ignore_ascii_case("GLOBAL") => global = true,
            Some(Token::Ident(w)) if w.eq_ignore_ascii_case("VOLATILE") => volatile = true,
            Some(Token::Ident(w)) if w.eq_ignore_ascii_case("STATIC") => static_ = true,
            Some(Token::Ident(w)) if w.eq_ignore_ascii_case("CONST") => const_ = true,
            _ => break,
        }
        idx += 1;
    }
    (global, volatile, static_, const_, idx)
}

fn base_type_from_suffix(name: &str) -> ValueType {
    if name.ends_with('$') {
        ValueType::String
    } else if name.ends_with('%') {
        ValueType::Int
    } else {
        ValueType::Unknown
    }
}

fn clean_name(name: &str) -> String {
    name.trim_end_matches(['$', '%']).to_uppercase()
}

fn pass1_dim(toks: &[Token], symtab: &mut SymbolTable, ns_idx: usize, lineno: u32, diag: &mut Diagnostics) -> Result<(), CompileError> {
    let (global, volatile, static_, const_, mut idx) = modifier_flags(toks);
    let Some(Token::Ident(raw_name)) = toks.get(idx) else {
        return Err(CompileError::Syntax { line: lineno, detail: "DIM expects a name".to_string() });
    };
    idx += 1;
    let mut base_type = base_type_from_suffix(raw_name);
    let mut dims = Vec::new();

    if matches!(toks.get(idx), Some(Token::Sym(s)) if s == "(") {
        idx += 1;
        while !matches!(toks.get(idx), Some(Token::Sym(s)) if s == ")") {
            if let Some(Token::Number(n)) = toks.get(idx) {
                dims.push((0, *n));
                idx += 1;
            } else {
                idx += 1;
                continue;
            }
            if matches!(toks.get(idx), Some(Token::Sym(s)) if s == ",") {
                idx += 1;
            }
        }
        idx += 1;
    }

    if matches!(toks.get(idx), Some(Token::Ident(w)) if w.eq_ignore_ascii_case("AS")) {
        idx += 1;
        if let Some(Token::Ident(t)) = toks.get(idx) {
            base_type = type_from_keyword(t);
            idx += 1;
        }
    }
    if base_type == ValueType::Unknown {
        base_type = ValueType::Int;
    }

    let mut address = None;
    if matches!(toks.get(idx), Some(Token::Ident(w)) if w.eq_ignore_ascii_case("AT")) {
        if const_ {
            return Err(CompileError::ConstError { line: lineno, name: raw_name.clone(), detail: "CONST may not be placed at an explicit address".to_string() });
        }
        idx += 1;
        if let Some(Token::Number(n)) = toks.get(idx) {
            address = Some(*n);
            idx += 1;
        }
    }

    let mut init_values = Vec::new();
    if matches!(toks.get(idx), Some(Token::Sym(s)) if s == "=") {
        idx += 1;
        let mut line_parser = ExprParser::new(&toks[idx..], lineno);
        loop {
            let e = line_parser.parse_expr()?;
            init_values.push(literal_value_for_const(&e, raw_name, lineno)?);
            if line_parser.peek_is_sym(",") {
                line_parser.advance();
                continue;
            }
            break;
        }
    } else if const_ {
        return Err(CompileError::ConstError { line: lineno, name: raw_name.clone(), detail: "CONST requires an initializer".to_string() });
    }

    if static_ && dims.is_empty() {
        warn_static_non_subscripted(diag, lineno, raw_name);
    }

    let record = VarRecord {
        qualified_name: String::new(),
        base_type,
        dims,
        is_volatile: volatile,
        is_memory_mapped: address.is_some(),
        is_static: static_,
        is_const: const_,
        address,
        init_values,
    };
    symtab.declare_var(ns_idx, &clean_name(raw_name), record, global, lineno)?;
    Ok(())
}

/// `DIM`'s `= <initializer>[,<initializer>...]` clause accepts only
/// literals (or a negated numeric literal), not general expressions.
fn literal_value_for_const(e: &Expr, raw_name: &str, lineno: u32) -> Result<Value, CompileError> {
    match e {
        Expr::Num(n) => Ok(Value::int(*n)),
        Expr::Str(s) => Ok(Value::string(s)),
        Expr::Unary(crate::ir::UnaryOp::Neg, inner) => match inner.as_ref() {
            Expr::Num(n) => Ok(Value::int(-n)),
            _ => Err(CompileError::ConstError { line: lineno, name: raw_name.to_string(), detail: "initializer must be a literal".to_string() }),
        },
        _ => Err(CompileError::ConstError { line: lineno, name: raw_name.to_string(), detail: "initializer must be a literal".to_string() }),
    }
}

fn type_from_keyword(t: &str) -> ValueType {
    match t.to_uppercase().as_str() {
        "BYTE" => ValueType::Byte,
        "INT" | "INTEGER" => ValueType::Int,
        "WORD" => ValueType::Word,
        "LONG" => ValueType::Long,
        "STRING" => ValueType::String,
        _ => ValueType::Unknown,
    }
}

fn pass1_option(toks: &[Token], symtab: &mut SymbolTable, ns_idx: usize, lineno: u32) -> Result<(), CompileError> {
    let Some(Token::Ident(knob)) = toks.get(1) else { return Ok(()) };
    let ns = &mut symtab.namespaces[ns_idx];
    match knob.to_uppercase().as_str() {
        "BASE" => {
            if let Some(Token::Number(n)) = toks.get(2) {
                ns.option_base = *n;
            }
        }
        "EXPLICIT" => {
            ns.option_explicit = matches!(toks.get(2), Some(Token::Ident(w)) if w.eq_ignore_ascii_case("ON"));
        }
        "NOCHECK" => {
            ns.option_nocheck = matches!(toks.get(2), Some(Token::Ident(w)) if w.eq_ignore_ascii_case("ON"));
        }
        "INPUTDEVICE" => {
            if let Some(Token::Ident(dev)) = toks.get(2) {
                ns.input_device = Some(dev.to_uppercase());
            }
        }
        "OUTPUTDEVICE" => {
            if let Some(Token::Ident(dev)) = toks.get(2) {
                ns.output_device = Some(dev.to_uppercase());
            }
        }
        other => {
            return Err(CompileError::Syntax { line: lineno, detail: format!("unknown OPTION `{other}`") });
        }
    }
    Ok(())
}

fn pass1_def(toks: &[Token], symtab: &mut SymbolTable, ns_idx: usize, _lineno: u32) {
    let mut idx = 1;
    let global = matches!(toks.get(idx), Some(Token::Ident(w)) if w.eq_ignore_ascii_case("GLOBAL"));
    if global {
        idx += 1;
    }
    let Some(Token::Ident(name)) = toks.get(idx) else { return };
    idx += 1;
    let mut args = Vec::new();
    if matches!(toks.get(idx), Some(Token::Sym(s)) if s == "(") {
        idx += 1;
        while !matches!(toks.get(idx), Some(Token::Sym(s)) if s == ")") {
            if let Some(Token::Ident(argname)) = toks.get(idx) {
                idx += 1;
                let mut optional = false;
                let mut default = None;
                if matches!(toks.get(idx), Some(Token::Sym(s)) if s == "=") {
                    idx += 1;
                    optional = true;
                    default = match toks.get(idx) {
                        Some(Token::Number(n)) => Some(n.to_string()),
                        Some(Token::Str(s)) => Some(s.clone()),
                        _ => None,
                    };
                    idx += 1;
                }
                args.push((base_type_from_suffix(argname), optional, default));
                if matches!(toks.get(idx), Some(Token::Sym(s)) if s == ",") {
                    idx += 1;
                }
                continue;
            }
            idx += 1;
        }
        idx += 1;
    }
    let ret = base_type_from_suffix(name);
    symtab.declare_func(ns_idx, &clean_name(name), FuncRecord { public_name: clean_name(name), internal_name: String::new(), return_type: if ret == ValueType::Unknown { ValueType::Int } else { ret }, args, is_global: global }, global);
}

fn resolve_or_implicit_var(ps: &mut FileState, name: &str) -> Result<Value, CompileError> {
    let clean = clean_name(name);
    if let Some(scope) = &ps.arg_scope {
        if let Some(v) = scope.get(&clean) {
            return Ok(v.clone());
        }
    }
    if let Some(rec) = ps.symtab.resolve_var(ps.ns_idx, &clean) {
        return Ok(Value::new(rec.qualified_name.clone(), rec.base_type));
    }
    if ps.symtab.namespaces[ps.ns_idx].option_explicit {
        return Err(CompileError::UnknownIdentifier { line: 0, name: clean });
    }
    let ty = if base_type_from_suffix(name) == ValueType::Unknown { ValueType::Int } else { base_type_from_suffix(name) };
    let record = VarRecord {
        qualified_name: String::new(),
        base_type: ty,
        dims: Vec::new(),
        is_volatile: false,
        is_memory_mapped: false,
        is_static: false,
        is_const: false,
        address: None,
        init_values: Vec::new(),
    };
    let qualified = ps.symtab.declare_var(ps.ns_idx, &clean, record, false, 0)?;
    ps.builder.emit(Stmt::GlobalAlloc { var: qualified.clone(), ty: Value::new("", ty), subs: Vec::new() });
    Ok(Value::new(qualified, ty))
}

fn lower_expr_to_value(ps: &mut FileState, e: &Expr) -> Result<Value, CompileError> {
    match e {
        Expr::Num(n) => Ok(Value::int(*n)),
        Expr::Str(s) => Ok(Value::string(s)),
        Expr::Name(name) => resolve_or_implicit_var(ps, name),
        Expr::Call(name, args) => {
            let clean = clean_name(name);
            if let Some(rec) = ps.symtab.resolve_var(ps.ns_idx, &clean).cloned() {
                if !rec.dims.is_empty() {
                    let mut arg: Arg = vec![Value::new(rec.qualified_name.clone(), rec.base_type)];
                    for a in args {
                        arg.push(lower_expr_to_value(ps, a)?);
                    }
                    let local = ps.builder.fresh_local(Value::new("", rec.base_type));
                    let dst = vec![Value::new(local.clone(), rec.base_type)];
                    ps.builder.assign(arg, dst.clone());
                    return Ok(dst[0].clone());
                }
            }
            let mut values = Vec::new();
            for a in args {
                values.push(lower_expr_to_value(ps, a)?);
            }
            let mut arg: Arg = vec![Value::new(clean, ValueType::Label)];
            arg.extend(values);
            let local = ps.builder.fresh_local(Value::new("", ValueType::Int));
            let dst = vec![Value::new(local, ValueType::Int)];
            ps.builder.assign(arg, dst.clone());
            Ok(dst[0].clone())
        }
        Expr::Unary(op, inner) => {
            let v = lower_expr_to_value(ps, inner)?;
            let ty = v.ty;
            let local = ps.builder.fresh_local(Value::new("", ty));
            let dst = vec![Value::new(local, ty)];
            ps.builder.unary(*op, vec![v], dst.clone());
            Ok(dst[0].clone())
        }
        Expr::Binary(op, l, r) => {
            let lv = lower_expr_to_value(ps, l)?;
            let rv = lower_expr_to_value(ps, r)?;
            let ty = if *op == BinaryOp::Add && (lv.ty == ValueType::String || rv.ty == ValueType::String) {
                ValueType::String
            } else {
                ValueType::Int
            };
            let local = ps.builder.fresh_local(Value::new("", ty));
            let dst = vec![Value::new(local, ty)];
            ps.builder.binary(*op, vec![lv], vec![rv], dst.clone());
            Ok(dst[0].clone())
        }
    }
}

fn emit_condition(ps: &mut FileState, cond: &Condition) -> Result<(), CompileError> {
    let lv = lower_expr_to_value(ps, &cond.left)?;
    let rv = lower_expr_to_value(ps, &cond.right)?;
    ps.builder.compare(cond.op, vec![lv], vec![rv]);
    Ok(())
}

fn parse_lvalue(ps: &mut FileState, toks: &[Token]) -> Result<Arg, CompileError> {
    let mut p = ExprParser::new(toks, 0);
    let e = p.parse_expr()?;
    match e {
        Expr::Name(name) => {
            let v = resolve_or_implicit_var(ps, &name)?;
            Ok(vec![v])
        }
        Expr::Call(name, args) => {
            let clean = clean_name(&name);
            let base = resolve_or_implicit_var(ps, &clean)?;
            let mut arg: Arg = vec![base];
            for a in &args {
                arg.push(lower_expr_to_value(ps, a)?);
            }
            Ok(arg)
        }
        _ => Err(CompileError::Syntax { line: 0, detail: "expected an assignable reference".to_string() }),
    }
}

/// Pass 2's `DIM`: the declaration itself (name, dims, address, init
/// literals) was already recorded in pass 1 — this just emits the `GA`/`MA`
/// and any initializer assigns from that record. `toks` includes the `DIM`
/// keyword itself at index 0, matching [`modifier_flags`]'s convention.
fn stmt_dim(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let (_global, _volatile, _static_, _const_, idx) = modifier_flags(toks);
    let Some(Token::Ident(raw_name)) = toks.get(idx) else {
        return Err(CompileError::Syntax { line: lineno, detail: "DIM expects a name".to_string() });
    };
    let clean = clean_name(raw_name);
    let rec = ps.symtab.resolve_var(ps.ns_idx, &clean).cloned().ok_or_else(|| CompileError::Internal(format!("DIM `{clean}` missing its pass-1 record")))?;
    emit_dim_alloc(ps, &rec);
    Ok(())
}

fn emit_dim_alloc(ps: &mut FileState, rec: &VarRecord) {
    let subs: Vec<Arg> = rec.dims.iter().map(|&(lb, ub)| vec![Value::int(lb), Value::int(ub)]).collect();
    let ty = Value::new("", rec.base_type);
    let var = rec.qualified_name.clone();
    if let Some(address) = rec.address {
        ps.builder.emit(Stmt::MappedAlloc { var: var.clone(), ty, address: Value::int(address), subs });
    } else {
        ps.builder.emit(Stmt::GlobalAlloc { var: var.clone(), ty, subs });
    }
    if !rec.init_values.is_empty() {
        if rec.is_scalar() {
            ps.builder.assign(vec![rec.init_values[0].clone()], vec![Value::new(var, rec.base_type)]);
        } else {
            for (i, v) in rec.init_values.iter().enumerate() {
                ps.builder.assign(vec![v.clone()], vec![Value::new(var.clone(), rec.base_type), Value::int(i as i64)]);
            }
        }
    }
}

/// Pass 2's `DEF`: the signature was already recorded in pass 1 — this
/// emits the `DEF` line plus the translated body, with formal arguments
/// substituted as `__ARG_<i>`. The body's real `Label` is never jumped to
/// by a call site (calls stay on the existing opaque-call convention), so
/// it is deliberately wrapped in `Jump(skip)`/`Label(skip)` rather than
/// left to fall through into surrounding code. `toks` includes the `DEF`
/// keyword itself at index 0, matching [`pass1_def`]'s convention.
fn stmt_def(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let mut idx = 1;
    if matches!(toks.get(idx), Some(Token::Ident(w)) if w.eq_ignore_ascii_case("GLOBAL")) {
        idx += 1;
    }
    let Some(Token::Ident(name)) = toks.get(idx) else {
        return Err(CompileError::Syntax { line: lineno, detail: "DEF requires a name".to_string() });
    };
    idx += 1;
    let clean = clean_name(name);
    let rec = ps.symtab.resolve_func(ps.ns_idx, &clean).cloned().ok_or_else(|| CompileError::Internal(format!("DEF `{clean}` missing its pass-1 signature")))?;

    let mut argnames = Vec::new();
    if matches!(toks.get(idx), Some(Token::Sym(s)) if s == "(") {
        idx += 1;
        while !matches!(toks.get(idx), Some(Token::Sym(s)) if s == ")") {
            if let Some(Token::Ident(argname)) = toks.get(idx) {
                if argnames.len() < rec.args.len() {
                    argnames.push(clean_name(argname));
                }
            }
            idx += 1;
        }
        idx += 1;
    }
    if !matches!(toks.get(idx), Some(Token::Sym(s)) if s == "=") {
        return Err(CompileError::Syntax { line: lineno, detail: "DEF requires `= <expr>`".to_string() });
    }
    idx += 1;

    let ret = Value::new("", rec.return_type);
    let arg_sig: Vec<Value> = rec.args.iter().map(|(ty, _, _)| Value::new("", *ty)).collect();
    ps.builder.emit(Stmt::Def { name: rec.internal_name.clone(), ret, args: arg_sig });

    let skip = ps.builder.fresh_label();
    ps.builder.jump(skip.clone());
    ps.builder.label(rec.internal_name.clone());

    let mut scope = HashMap::new();
    for (i, (argname, (ty, _, _))) in argnames.iter().zip(rec.args.iter()).enumerate() {
        scope.insert(argname.clone(), Value::new(format!("{}::__ARG_{i}", rec.internal_name), *ty));
    }
    let prev_scope = ps.arg_scope.replace(scope);

    let mut p = ExprParser::new(&toks[idx..], lineno);
    let result = p.parse_expr().and_then(|e| lower_expr_to_value(ps, &e));

    ps.arg_scope = prev_scope;

    let v = result?;
    ps.builder.emit(Stmt::ReturnValue(v));
    ps.builder.emit(Stmt::Return);
    ps.builder.label(skip);
    Ok(())
}

enum IoKind {
    Get,
    Put,
    Transfer,
}

struct IoTarget {
    base: Arg,
    count: Option<Arg>,
}

/// Shared `#<dev>,<target>[USING XOR(...)]` parsing for `GET`/`PUT`/
/// `TRANSFER`. `toks` excludes the leading keyword.
fn io_stmt(ps: &mut FileState, toks: &[Token], lineno: u32, kind: IoKind) -> Result<(), CompileError> {
    let mut idx = 0;
    if !matches!(toks.get(idx), Some(Token::Sym(s)) if s == "#") {
        return Err(CompileError::Syntax { line: lineno, detail: "expected `#<dev>,`".to_string() });
    }
    idx += 1;
    let Some(Token::Ident(devname)) = toks.get(idx) else {
        return Err(CompileError::Syntax { line: lineno, detail: "expected a device name after `#`".to_string() });
    };
    idx += 1;
    if !matches!(toks.get(idx), Some(Token::Sym(s)) if s == ",") {
        return Err(CompileError::Syntax { line: lineno, detail: "expected `,` after device".to_string() });
    }
    idx += 1;

    let using_idx = toks[idx..].iter().position(|t| matches!(t, Token::Ident(w) if w.eq_ignore_ascii_case("USING"))).map(|p| p + idx);
    let target_end = using_idx.unwrap_or(toks.len());
    let target = parse_io_target(ps, &toks[idx..target_end], lineno)?;
    let dev = Value::new(devname.to_uppercase(), ValueType::Text);

    match kind {
        IoKind::Get => ps.builder.emit(Stmt::Get { dev, dst: target.base, count: target.count }),
        IoKind::Put => ps.builder.emit(Stmt::Put { dev, src: target.base, count: target.count }),
        IoKind::Transfer => ps.builder.emit(Stmt::Transfer { dev, dst: target.base, count: target.count }),
    }

    if let Some(ui) = using_idx {
        emit_using_xor(ps, &toks[ui + 1..], lineno)?;
    }
    Ok(())
}

/// A scalar lvalue, or an array range `A(lb TO ub)` lowered to a base
/// pointer plus a runtime-computed element count.
fn parse_io_target(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<IoTarget, CompileError> {
    if let Some(Token::Ident(name)) = toks.first() {
        if matches!(toks.get(1), Some(Token::Sym(s)) if s == "(") {
            let mut depth = 0i32;
            let mut to_pos = None;
            let mut close_pos = None;
            for (i, t) in toks.iter().enumerate().skip(1) {
                match t {
                    Token::Sym(s) if s == "(" => depth += 1,
                    Token::Sym(s) if s == ")" => {
                        depth -= 1;
                        if depth == 0 {
                            close_pos = Some(i);
                            break;
                        }
                    }
                    Token::Ident(w) if depth == 1 && w.eq_ignore_ascii_case("TO") => to_pos = Some(i),
                    _ => {}
                }
            }
            if let (Some(to_i), Some(close_i)) = (to_pos, close_pos) {
                let clean = clean_name(name);
                let base = resolve_or_implicit_var(ps, &clean)?;
                let mut lb_p = ExprParser::new(&toks[2..to_i], lineno);
                let lb_v = lower_expr_to_value(ps, &lb_p.parse_expr()?)?;
                let mut ub_p = ExprParser::new(&toks[to_i + 1..close_i], lineno);
                let ub_v = lower_expr_to_value(ps, &ub_p.parse_expr()?)?;
                let diff_local = ps.builder.fresh_local(Value::new("", ValueType::Int));
                ps.builder.binary(BinaryOp::Sub, vec![ub_v], vec![lb_v.clone()], vec![Value::new(diff_local.clone(), ValueType::Int)]);
                let count_local = ps.builder.fresh_local(Value::new("", ValueType::Int));
                ps.builder.binary(BinaryOp::Add, vec![Value::new(diff_local, ValueType::Int)], vec![Value::int(1)], vec![Value::new(count_local.clone(), ValueType::Int)]);
                let mut base_arg: Arg = vec![base];
                base_arg.push(lb_v);
                return Ok(IoTarget { base: base_arg, count: Some(vec![Value::new(count_local, ValueType::Int)]) });
            }
        }
    }
    let dst = parse_lvalue(ps, toks)?;
    Ok(IoTarget { base: dst, count: None })
}

/// `USING XOR(inMask, outMask)` — either mask may be omitted, but at least
/// one must be present. Encoded as `XARG` sentinels on the I/O statement
/// just emitted, the same decoration convention `PRINT`'s comma separators
/// use.
fn emit_using_xor(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    if !matches!(toks.first(), Some(Token::Ident(w)) if w.eq_ignore_ascii_case("XOR")) {
        return Err(CompileError::Syntax { line: lineno, detail: "expected XOR after USING".to_string() });
    }
    if !matches!(toks.get(1), Some(Token::Sym(s)) if s == "(") {
        return Err(CompileError::Syntax { line: lineno, detail: "XOR requires `(inMask, outMask)`".to_string() });
    }
    let close = toks.iter().rposition(|t| matches!(t, Token::Sym(s) if s == ")")).ok_or_else(|| CompileError::Syntax { line: lineno, detail: "XOR mask list is missing `)`".to_string() })?;
    let inner = &toks[2..close];
    let parts = split_top_level_commas(inner);
    if parts.len() != 2 {
        return Err(CompileError::Syntax { line: lineno, detail: "XOR expects `(inMask, outMask)`".to_string() });
    }
    let mut emitted_any = false;
    if !parts[0].is_empty() {
        let mut p = ExprParser::new(parts[0], lineno);
        let v = lower_expr_to_value(ps, &p.parse_expr()?)?;
        ps.builder.emit(Stmt::ExtraArg(Value::new(format!("XORIN={}", v.text), v.ty)));
        emitted_any = true;
    }
    if !parts[1].is_empty() {
        let mut p = ExprParser::new(parts[1], lineno);
        let v = lower_expr_to_value(ps, &p.parse_expr()?)?;
        ps.builder.emit(Stmt::ExtraArg(Value::new(format!("XOROUT={}", v.text), v.ty)));
        emitted_any = true;
    }
    if !emitted_any {
        return Err(CompileError::Syntax { line: lineno, detail: "USING XOR requires at least one mask".to_string() });
    }
    Ok(())
}

fn split_top_level_commas(toks: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, t) in toks.iter().enumerate() {
        match t {
            Token::Sym(s) if s == "(" => depth += 1,
            Token::Sym(s) if s == ")" => depth -= 1,
            Token::Sym(s) if s == "," && depth == 0 => {
                parts.push(&toks[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&toks[start..]);
    parts
}

fn stmt_get(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    io_stmt(ps, toks, lineno, IoKind::Get)
}

fn stmt_put(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    io_stmt(ps, toks, lineno, IoKind::Put)
}

fn stmt_transfer(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    io_stmt(ps, toks, lineno, IoKind::Transfer)
}

/// Computed branch: `ON <expr> GOTO/GOSUB line1[,line2...]`. Lowered as a
/// chain of `Compare{Eq}`/`JumpIfFalse` cases rather than a jump table,
/// matching the rest of the front-end's preference for explicit
/// comparisons over a dedicated dispatch IR form.
fn stmt_on(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let kind_idx = toks
        .iter()
        .position(|t| matches!(t, Token::Ident(w) if w.eq_ignore_ascii_case("GOTO") || w.eq_ignore_ascii_case("GOSUB")))
        .ok_or_else(|| CompileError::Syntax { line: lineno, detail: "ON requires GOTO or GOSUB".to_string() })?;
    let is_gosub = matches!(&toks[kind_idx], Token::Ident(w) if w.eq_ignore_ascii_case("GOSUB"));
    let mut sel_p = ExprParser::new(&toks[..kind_idx], lineno);
    let selector = lower_expr_to_value(ps, &sel_p.parse_expr()?)?;

    let mut targets = Vec::new();
    for part in toks[kind_idx + 1..].split(|t| matches!(t, Token::Sym(s) if s == ",")) {
        if let Some(Token::Number(n)) = part.first() {
            targets.push(*n);
        }
    }
    if targets.is_empty() {
        return Err(CompileError::Syntax { line: lineno, detail: "ON requires at least one target line".to_string() });
    }

    let end = ps.builder.fresh_label();
    for (i, target) in targets.iter().enumerate() {
        let case = (i + 1) as i64;
        ps.builder.compare(CompareOp::Eq, vec![selector.clone()], vec![Value::int(case)]);
        let next = ps.builder.fresh_label();
        ps.builder.jump_if_false(next.clone());
        let dest = ps.builder.source_label(*target as u32);
        if is_gosub {
            ps.builder.emit(Stmt::Call(dest));
            ps.builder.jump(end.clone());
        } else {
            ps.builder.jump(dest);
        }
        ps.builder.label(next);
    }
    ps.builder.label(end);
    Ok(())
}

/// `ERASE name[,name2...]` — forgets each named (array) variable.
fn stmt_erase(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let mut any = false;
    for part in toks.split(|t| matches!(t, Token::Sym(s) if s == ",")) {
        let Some(Token::Ident(name)) = part.first() else { continue };
        let clean = clean_name(name);
        let rec = ps.symtab.resolve_var(ps.ns_idx, &clean).cloned().ok_or_else(|| CompileError::UnknownIdentifier { line: lineno, name: clean.clone() })?;
        ps.builder.emit(Stmt::GlobalFree(rec.qualified_name));
        any = true;
    }
    if !any {
        return Err(CompileError::Syntax { line: lineno, detail: "ERASE requires at least one array name".to_string() });
    }
    Ok(())
}

fn dispatch_statement(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    if toks.is_empty() {
        return Ok(());
    }
    let kw = match &toks[0] {
        Token::Ident(k) => k.to_uppercase(),
        _ => String::new(),
    };
    match kw.as_str() {
        "OPTION" => Ok(()), // fully resolved in pass 1
        "DIM" => stmt_dim(ps, toks, lineno),
        "DEF" => stmt_def(ps, toks, lineno),
        "GET" => stmt_get(ps, &toks[1..], lineno),
        "PUT" => stmt_put(ps, &toks[1..], lineno),
        "TRANSFER" => stmt_transfer(ps, &toks[1..], lineno),
        "ON" => stmt_on(ps, &toks[1..], lineno),
        "ERASE" => stmt_erase(ps, &toks[1..], lineno),
        "LET" => stmt_assign(ps, &toks[1..], lineno),
        "IF" => stmt_if(ps, &toks[1..], lineno),
        "ELSEIF" => stmt_elseif(ps, &toks[1..], lineno),
        "ELSE" => stmt_else(ps, lineno),
        "ENDIF" => stmt_endif(ps, lineno),
        "FOR" => stmt_for(ps, &toks[1..], lineno),
        "NEXT" => stmt_next(ps, &toks[1..], lineno),
        "WHILE" => stmt_while(ps, &toks[1..], lineno),
        "WEND" => stmt_wend(ps, lineno),
        "GOTO" => stmt_goto(ps, &toks[1..], lineno),
        "GOSUB" => stmt_gosub(ps, &toks[1..], lineno),
        "RETURN" => {
            ps.builder.emit(Stmt::Return);
            Ok(())
        }
        "DATA" => stmt_data(ps, &toks[1..], lineno),
        "READ" => stmt_read(ps, &toks[1..], lineno),
        "RESTORE" => stmt_restore(ps, &toks[1..]),
        "PRINT" => stmt_print(ps, &toks[1..], lineno),
        "INPUT" => stmt_input(ps, &toks[1..], lineno),
        "IOCTL" => stmt_ioctl(ps, &toks[1..], lineno),
        "END" => {
            ps.end_count += 1;
            ps.builder.emit(Stmt::End);
            Ok(())
        }
        "BREAK" => {
            if let Some(f) = ps.for_stack.last() {
                ps.builder.jump(f.end.clone());
            } else if let Some(w) = ps.while_stack.last() {
                ps.builder.jump(w.end.clone());
            }
            Ok(())
        }
        "CONTINUE" => {
            if let Some(f) = ps.for_stack.last() {
                ps.builder.jump(f.head.clone());
            } else if let Some(w) = ps.while_stack.last() {
                ps.builder.jump(w.head.clone());
            }
            Ok(())
        }
        _ => stmt_assign(ps, toks, lineno), // bare `A = expr` is implicit LET
    }
}

fn stmt_assign(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let eq = toks.iter().position(|t| matches!(t, Token::Sym(s) if s == "=")).ok_or_else(|| CompileError::Syntax { line: lineno, detail: "expected assignment".to_string() })?;
    let lhs_toks = &toks[..eq];
    let rhs_toks = &toks[eq + 1..];

    let clean = match lhs_toks.first() {
        Some(Token::Ident(n)) => clean_name(n),
        _ => return Err(CompileError::Syntax { line: lineno, detail: "expected an lvalue".to_string() }),
    };
    if let Some(rec) = ps.symtab.resolve_var(ps.ns_idx, &clean) {
        if rec.is_const {
            return Err(CompileError::ConstError { line: lineno, name: clean, detail: "assignment to CONST is forbidden".to_string() });
        }
    }

    let dst = parse_lvalue(ps, lhs_toks)?;
    let mut rp = ExprParser::new(rhs_toks, lineno);
    let e = rp.parse_expr()?;
    let rv = lower_expr_to_value(ps, &e)?;
    ps.builder.assign(vec![rv], dst);
    Ok(())
}

fn stmt_if(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let then_idx = toks.iter().position(|t| matches!(t, Token::Ident(w) if w.eq_ignore_ascii_case("THEN"))).ok_or_else(|| CompileError::Syntax { line: lineno, detail: "IF requires THEN".to_string() })?;
    let mut cp = ExprParser::new(&toks[..then_idx], lineno);
    let cond = cp.parse_condition()?;
    let rest = &toks[then_idx + 1..];

    if let Some(Token::Number(target)) = rest.first() {
        emit_condition(ps, &cond)?;
        let else_idx = rest.iter().position(|t| matches!(t, Token::Ident(w) if w.eq_ignore_ascii_case("ELSE")));
        if let Some(ei) = else_idx {
            let else_label = ps.builder.source_label(match rest.get(ei + 1) {
                Some(Token::Number(n)) => *n as u32,
                _ => return Err(CompileError::Syntax { line: lineno, detail: "ELSE requires a line number".to_string() }),
            });
            ps.builder.jump_if_false(else_label);
        } else {
            let skip = ps.builder.fresh_label();
            ps.builder.jump_if_false(skip.clone());
            ps.builder.jump(ps.builder.source_label(*target as u32));
            ps.builder.label(skip);
            return Ok(());
        }
        ps.builder.jump(ps.builder.source_label(*target as u32));
        return Ok(());
    }

    emit_condition(ps, &cond)?;
    let next_label = ps.builder.fresh_label();
    let end_label = ps.builder.fresh_label();
    ps.builder.jump_if_false(next_label.clone());
    ps.if_stack.push(IfFrame { end_label, next_label: Some(next_label) });
    Ok(())
}

fn stmt_elseif(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let frame = ps.if_stack.pop().ok_or(CompileError::ElseWithoutIf { line: lineno })?;
    ps.builder.jump(frame.end_label.clone());
    if let Some(l) = frame.next_label {
        ps.builder.label(l);
    }
    let then_idx = toks.iter().position(|t| matches!(t, Token::Ident(w) if w.eq_ignore_ascii_case("THEN"))).ok_or(CompileError::Syntax { line: lineno, detail: "ELSEIF requires THEN".to_string() })?;
    let mut cp = ExprParser::new(&toks[..then_idx], lineno);
    let cond = cp.parse_condition()?;
    emit_condition(ps, &cond)?;
    let next_label = ps.builder.fresh_label();
    ps.builder.jump_if_false(next_label.clone());
    ps.if_stack.push(IfFrame { end_label: frame.end_label, next_label: Some(next_label) });
    Ok(())
}

fn stmt_else(ps: &mut FileState, lineno: u32) -> Result<(), CompileError> {
    let frame = ps.if_stack.pop().ok_or(CompileError::ElseWithoutIf { line: lineno })?;
    ps.builder.jump(frame.end_label.clone());
    if let Some(l) = frame.next_label {
        ps.builder.label(l);
    }
    ps.if_stack.push(IfFrame { end_label: frame.end_label, next_label: None });
    Ok(())
}

fn stmt_endif(ps: &mut FileState, lineno: u32) -> Result<(), CompileError> {
    let frame = ps.if_stack.pop().ok_or(CompileError::ElseWithoutIf { line: lineno })?;
    if let Some(l) = frame.next_label {
        ps.builder.label(l);
    }
    ps.builder.label(frame.end_label);
    Ok(())
}

fn stmt_for(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let Some(Token::Ident(varname)) = toks.first() else {
        return Err(CompileError::Syntax { line: lineno, detail: "FOR requires a control variable".to_string() });
    };
    let eq = toks.iter().position(|t| matches!(t, Token::Sym(s) if s == "=")).ok_or(CompileError::Syntax { line: lineno, detail: "FOR requires `=`".to_string() })?;
    let to_idx = toks.iter().position(|t| matches!(t, Token::Ident(w) if w.eq_ignore_ascii_case("TO"))).ok_or(CompileError::Syntax { line: lineno, detail: "FOR requires TO".to_string() })?;
    let step_idx = toks.iter().position(|t| matches!(t, Token::Ident(w) if w.eq_ignore_ascii_case("STEP")));

    let mut start_p = ExprParser::new(&toks[eq + 1..to_idx], lineno);
    let start_expr = start_p.parse_expr()?;
    let limit_end = step_idx.unwrap_or(toks.len());
    let mut limit_p = ExprParser::new(&toks[to_idx + 1..limit_end], lineno);
    let limit_expr = limit_p.parse_expr()?;
    let (step_expr, step_nonneg) = if let Some(si) = step_idx {
        let mut sp = ExprParser::new(&toks[si + 1..], lineno);
        let e = sp.parse_expr()?;
        let nonneg = !matches!(&e, Expr::Num(n) if *n < 0);
        (e, nonneg)
    } else {
        (Expr::Num(1), true)
    };

    let var = resolve_or_implicit_var(ps, varname)?;
    let start_v = lower_expr_to_value(ps, &start_expr)?;
    ps.builder.assign(vec![start_v], vec![var.clone()]);
    let limit_local = ps.builder.fresh_local(Value::new("", ValueType::Int));
    let limit_v = lower_expr_to_value(ps, &limit_expr)?;
    ps.builder.assign(vec![limit_v], vec![Value::new(limit_local.clone(), ValueType::Int)]);
    let step_local = ps.builder.fresh_local(Value::new("", ValueType::Int));
    let step_v = lower_expr_to_value(ps, &step_expr)?;
    ps.builder.assign(vec![step_v], vec![Value::new(step_local.clone(), ValueType::Int)]);

    let head = ps.builder.fresh_label();
    let end = ps.builder.fresh_label();
    ps.builder.label(head.clone());
    let cmp_op = if step_nonneg { crate::ir::CompareOp::Gt } else { crate::ir::CompareOp::Lt };
    ps.builder.compare(cmp_op, vec![var.clone()], vec![Value::new(limit_local.clone(), ValueType::Int)]);
    ps.builder.jump_if_true(end.clone());

    ps.for_stack.push(ForFrame {
        var,
        limit: Value::new(limit_local, ValueType::Int),
        step: Value::new(step_local, ValueType::Int),
        head,
        end,
        step_nonneg,
    });
    Ok(())
}

fn stmt_next(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let frame = ps.for_stack.pop().ok_or(CompileError::NextWithoutFor { line: lineno })?;
    if let Some(Token::Ident(name)) = toks.first() {
        let clean = clean_name(name);
        if !frame.var.text.ends_with(&format!("__VAR_{clean}")) && !frame.var.text.ends_with(&format!("__MEM_{clean}")) {
            return Err(CompileError::Syntax { line: lineno, detail: format!("NEXT {name} does not match enclosing FOR") });
        }
    }
    let local = ps.builder.fresh_local(Value::new("", ValueType::Int));
    ps.builder.binary(BinaryOp::Add, vec![frame.var.clone()], vec![frame.step], vec![Value::new(local.clone(), ValueType::Int)]);
    ps.builder.assign(vec![Value::new(local, ValueType::Int)], vec![frame.var]);
    ps.builder.jump(frame.head);
    ps.builder.label(frame.end);
    let _ = frame.limit;
    Ok(())
}

fn stmt_while(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let head = ps.builder.fresh_label();
    let end = ps.builder.fresh_label();
    ps.builder.label(head.clone());
    let mut cp = ExprParser::new(toks, lineno);
    let cond = cp.parse_condition()?;
    emit_condition(ps, &cond)?;
    ps.builder.jump_if_false(end.clone());
    ps.while_stack.push(WhileFrame { head, end });
    Ok(())
}

fn stmt_wend(ps: &mut FileState, lineno: u32) -> Result<(), CompileError> {
    let frame = ps.while_stack.pop().ok_or(CompileError::WendWithoutWhile { line: lineno })?;
    ps.builder.jump(frame.head);
    ps.builder.label(frame.end);
    Ok(())
}

fn stmt_goto(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let Some(Token::Number(n)) = toks.first() else { return Err(CompileError::Syntax { line: lineno, detail: "GOTO requires a line number".to_string() }) };
    ps.builder.jump(ps.builder.source_label(*n as u32));
    Ok(())
}

fn stmt_gosub(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let Some(Token::Number(n)) = toks.first() else { return Err(CompileError::Syntax { line: lineno, detail: "GOSUB requires a line number".to_string() }) };
    ps.builder.emit(Stmt::Call(ps.builder.source_label(*n as u32)));
    Ok(())
}

fn stmt_data(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let mut values = Vec::new();
    let mut p = ExprParser::new(toks, lineno);
    while !p.at_end() {
        let e = p.parse_expr()?;
        values.push(match e {
            Expr::Num(n) => Value::int(n),
            Expr::Str(s) => Value::string(&s),
            Expr::Name(n) => Value::new(n, ValueType::Unknown),
            _ => return Err(CompileError::Syntax { line: lineno, detail: "DATA accepts only literals".to_string() }),
        });
        if p.peek_is_sym(",") {
            p.advance();
        } else {
            break;
        }
    }
    ps.builder.emit(Stmt::Data { ns: ps.builder.namespace().to_string(), values });
    Ok(())
}

fn stmt_read(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let dst = parse_lvalue(ps, toks)?;
    let ns = ps.builder.namespace().to_string();
    let _ = lineno;
    ps.builder.emit(Stmt::Read { ns, dst });
    Ok(())
}

fn stmt_restore(ps: &mut FileState, toks: &[Token]) -> Result<(), CompileError> {
    let ns = ps.builder.namespace().to_string();
    let label = match toks.first() {
        Some(Token::Number(n)) => Some(ps.builder.source_label(*n as u32)),
        _ => None,
    };
    ps.builder.emit(Stmt::Restore { ns, label });
    Ok(())
}

fn stmt_print(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let dev = ps.symtab.namespaces[ps.ns_idx].output_device.clone().unwrap_or_else(|| "CONSOLE".to_string());
    let dev_value = Value::new(dev, ValueType::Text);
    if toks.is_empty() {
        ps.builder.emit(Stmt::TextOut { dev: dev_value, expr: vec![Value::string("")] });
        return Ok(());
    }
    let mut start = 0;
    let mut ended_with_separator = false;
    loop {
        let mut end = start;
        let mut depth = 0i32;
        while end < toks.len() {
            match &toks[end] {
                Token::Sym(s) if s == "(" => depth += 1,
                Token::Sym(s) if s == ")" => depth -= 1,
                Token::Sym(s) if (s == "," || s == ";") && depth == 0 => break,
                _ => {}
            }
            end += 1;
        }
        if end > start {
            let mut p = ExprParser::new(&toks[start..end], lineno);
            let e = p.parse_expr()?;
            let v = lower_expr_to_value(ps, &e)?;
            ps.builder.emit(Stmt::TextOut { dev: dev_value.clone(), expr: vec![v] });
        }
        if end < toks.len() {
            if matches!(&toks[end], Token::Sym(s) if s == ",") {
                ps.builder.emit(Stmt::ExtraArg(Value::new("TAB0", ValueType::Text)));
            }
            ended_with_separator = true;
            start = end + 1;
        } else {
            ended_with_separator = false;
            break;
        }
    }
    if !ended_with_separator {
        ps.builder.emit(Stmt::TextOut { dev: dev_value, expr: vec![Value::new("NL", ValueType::Text)] });
    }
    Ok(())
}

fn stmt_input(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let dev = ps.symtab.namespaces[ps.ns_idx].input_device.clone().unwrap_or_else(|| "CONSOLE".to_string());
    let dev_value = Value::new(dev, ValueType::Text);
    let mut idx = 0;
    if let Some(Token::Str(prompt)) = toks.first() {
        ps.builder.emit(Stmt::TextOut { dev: dev_value.clone(), expr: vec![Value::string(prompt)] });
        idx = 1;
        if matches!(toks.get(idx), Some(Token::Sym(s)) if s == ",") {
            idx += 1;
        }
    }
    for part in toks[idx..].split(|t| matches!(t, Token::Sym(s) if s == ",")) {
        if part.is_empty() {
            continue;
        }
        let dst = parse_lvalue(ps, part)?;
        let retry = ps.builder.fresh_label();
        ps.builder.label(retry.clone());
        ps.builder.emit(Stmt::Set { knob: "ERR".to_string(), val: Value::int(0) });
        ps.builder.emit(Stmt::TextIn { dev: dev_value.clone(), dst });
        ps.builder.emit(Stmt::ErrorTrap { cause: Value::string(""), label: retry });
    }
    let _ = lineno;
    Ok(())
}

fn stmt_ioctl(ps: &mut FileState, toks: &[Token], lineno: u32) -> Result<(), CompileError> {
    let Some(Token::Ident(dev)) = toks.first() else {
        return Err(CompileError::Syntax { line: lineno, detail: "IOCTL requires a device name".to_string() });
    };
    let Some(Token::Sym(_)) = toks.get(1) else {
        return Err(CompileError::Syntax { line: lineno, detail: "IOCTL requires a command".to_string() });
    };
    let Some(Token::Ident(cmd)) = toks.get(2) else {
        return Err(CompileError::Syntax { line: lineno, detail: "IOCTL requires a command".to_string() });
    };
    let arg = match toks.get(3) {
        Some(Token::Sym(s)) if s == "," => match toks.get(4) {
            Some(Token::Number(n)) => Some(Value::int(*n)),
            Some(Token::Str(s)) => Some(Value::string(s)),
            Some(Token::Ident(n)) => Some(Value::new(clean_name(n), ValueType::VarRef)),
            _ => None,
        },
        _ => None,
    };
    ps.builder.emit(Stmt::Ioctl { dev: Value::new(dev.to_uppercase(), ValueType::Text), cmd: Value::new(cmd.to_uppercase(), ValueType::Text), arg });
    Ok(())
}

fn warn_static_non_subscripted(diag: &mut Diagnostics, line: u32, name: &str) {
    diag.push(line, WarningKind::StaticNonSubscripted(name.to_string()));
}
